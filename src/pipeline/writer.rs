//! Program Writer
//!
//! Turns a finished program into compilable source for the render system's
//! target language. This is a structural walk of the IR: dependencies
//! become include lines, parameters become declarations, atoms become one
//! statement each in effective order. The writer makes no semantic
//! decisions; it branches on [`TargetLanguage`] for surface syntax only.

use std::fmt::Write;

use crate::ir::{
    Atom, AtomOp, BinOp, Builtin, Content, GpuType, Mask, Operand, Parameter, Program,
    Semantic, Stage,
};
use crate::rendersystem::TargetLanguage;

pub struct ProgramWriter;

impl ProgramWriter {
    /// Emit the program as source text.
    #[must_use]
    pub fn write(program: &Program, language: TargetLanguage) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// Generated by the Vesper runtime shader generator");

        match language {
            TargetLanguage::Glsl => {
                let _ = writeln!(out, "#version 330 core");
            }
            TargetLanguage::GlslEs => {
                let _ = writeln!(out, "#version 300 es");
                let _ = writeln!(out, "precision highp float;");
            }
            TargetLanguage::Hlsl => {}
        }

        for dependency in program.dependencies() {
            let extension = match language {
                TargetLanguage::Glsl | TargetLanguage::GlslEs => "glsl",
                TargetLanguage::Hlsl => "hlsl",
            };
            let _ = writeln!(out, "#include \"{dependency}.{extension}\"");
        }
        out.push('\n');

        for &id in program.uniforms() {
            let param = program.param(id);
            let ty = type_name(param.ty, language);
            match language {
                TargetLanguage::Glsl | TargetLanguage::GlslEs => {
                    let _ = writeln!(out, "uniform {ty} {};", param.name);
                }
                TargetLanguage::Hlsl => {
                    let _ = writeln!(out, "{ty} {};", param.name);
                }
            }
        }
        out.push('\n');

        match language {
            TargetLanguage::Glsl | TargetLanguage::GlslEs => {
                Self::write_glsl_entry(&mut out, program, language);
            }
            TargetLanguage::Hlsl => Self::write_hlsl_entry(&mut out, program),
        }
        out
    }

    fn write_glsl_entry(out: &mut String, program: &Program, language: TargetLanguage) {
        for &id in program.main().inputs() {
            let param = program.param(id);
            let _ = writeln!(out, "in {} {};", type_name(param.ty, language), param.name);
        }
        for &id in program.main().outputs() {
            let param = program.param(id);
            // Clip-space position maps onto the gl_Position system value.
            if param.content() == Some((Content::PositionProjectiveSpace, 0)) {
                let _ = writeln!(out, "#define {} gl_Position", param.name);
                continue;
            }
            let _ = writeln!(out, "out {} {};", type_name(param.ty, language), param.name);
        }

        let _ = writeln!(out, "\nvoid main()\n{{");
        for &id in program.main().locals() {
            let param = program.param(id);
            let _ = writeln!(out, "\t{} {};", type_name(param.ty, language), param.name);
        }
        for atom in program.main().ordered_atoms() {
            let _ = writeln!(out, "\t{}", statement(program, atom, language));
        }
        let _ = writeln!(out, "}}");
    }

    fn write_hlsl_entry(out: &mut String, program: &Program) {
        let mut signature = Vec::new();
        for &id in program.main().inputs() {
            let param = program.param(id);
            signature.push(format!(
                "in {} {} : {}",
                type_name(param.ty, TargetLanguage::Hlsl),
                param.name,
                hlsl_semantic(param, program.stage(), false),
            ));
        }
        for &id in program.main().outputs() {
            let param = program.param(id);
            signature.push(format!(
                "out {} {} : {}",
                type_name(param.ty, TargetLanguage::Hlsl),
                param.name,
                hlsl_semantic(param, program.stage(), true),
            ));
        }

        let _ = writeln!(out, "void main(\n\t{})\n{{", signature.join(",\n\t"));
        for &id in program.main().locals() {
            let param = program.param(id);
            let _ = writeln!(
                out,
                "\t{} {};",
                type_name(param.ty, TargetLanguage::Hlsl),
                param.name
            );
        }
        for atom in program.main().ordered_atoms() {
            let _ = writeln!(out, "\t{}", statement(program, atom, TargetLanguage::Hlsl));
        }
        let _ = writeln!(out, "}}");
    }
}

fn type_name(ty: GpuType, language: TargetLanguage) -> &'static str {
    let hlsl = language == TargetLanguage::Hlsl;
    match ty {
        GpuType::Float1 => "float",
        GpuType::Float2 => {
            if hlsl {
                "float2"
            } else {
                "vec2"
            }
        }
        GpuType::Float3 => {
            if hlsl {
                "float3"
            } else {
                "vec3"
            }
        }
        GpuType::Float4 => {
            if hlsl {
                "float4"
            } else {
                "vec4"
            }
        }
        GpuType::Int1 => "int",
        GpuType::Int2 => {
            if hlsl {
                "int2"
            } else {
                "ivec2"
            }
        }
        GpuType::Int3 => {
            if hlsl {
                "int3"
            } else {
                "ivec3"
            }
        }
        GpuType::Int4 => {
            if hlsl {
                "int4"
            } else {
                "ivec4"
            }
        }
        GpuType::Uint1 => "uint",
        GpuType::Uint2 => {
            if hlsl {
                "uint2"
            } else {
                "uvec2"
            }
        }
        GpuType::Uint3 => {
            if hlsl {
                "uint3"
            } else {
                "uvec3"
            }
        }
        GpuType::Uint4 => {
            if hlsl {
                "uint4"
            } else {
                "uvec4"
            }
        }
        GpuType::Mat3 => {
            if hlsl {
                "float3x3"
            } else {
                "mat3"
            }
        }
        GpuType::Mat4 => {
            if hlsl {
                "float4x4"
            } else {
                "mat4"
            }
        }
        GpuType::Sampler1d => "sampler1D",
        GpuType::Sampler2d => "sampler2D",
        GpuType::Sampler3d => "sampler3D",
        GpuType::SamplerCube => "samplerCube",
    }
}

fn hlsl_semantic(param: &Parameter, stage: Stage, is_output: bool) -> String {
    let Some((content, index)) = param.content() else {
        return "TEXCOORD15".into();
    };
    match content.semantic() {
        Semantic::Position => {
            if is_output {
                "SV_Position".into()
            } else {
                "POSITION".into()
            }
        }
        Semantic::Normal => "NORMAL".into(),
        Semantic::Color => {
            if stage == Stage::Fragment && is_output {
                "SV_Target".into()
            } else if content == Content::ColorSpecular {
                "COLOR1".into()
            } else {
                "COLOR0".into()
            }
        }
        Semantic::TexCoord => {
            if content == Content::FogFactor {
                "FOG".into()
            } else {
                format!("TEXCOORD{index}")
            }
        }
        Semantic::Tangent => "TANGENT".into(),
        Semantic::Binormal => "BINORMAL".into(),
        Semantic::BlendWeights => "BLENDWEIGHT".into(),
        Semantic::BlendIndices => "BLENDINDICES".into(),
    }
}

/// Operand reference with its swizzle suffix.
fn operand_ref(program: &Program, operand: &Operand) -> String {
    let param = program.param(operand.param);
    let full_width = param.ty.lane_count().unwrap_or(4);
    if operand.mask == Mask::ALL || operand.mask == Mask::from_width(full_width) {
        param.name.clone()
    } else {
        format!("{}.{}", param.name, operand.mask.swizzle())
    }
}

fn statement(program: &Program, atom: &Atom, language: TargetLanguage) -> String {
    let ops = atom.operands();
    let r = |operand: &Operand| operand_ref(program, operand);
    match atom.op() {
        AtomOp::Assign => format!("{} = {};", r(&ops[0]), r(&ops[1])),
        AtomOp::Binary(op) => {
            let symbol = match op {
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
            };
            format!("{} = {} {symbol} {};", r(&ops[0]), r(&ops[1]), r(&ops[2]))
        }
        AtomOp::Sample => {
            let sampler = program.param(ops[1].param);
            let intrinsic = match language {
                TargetLanguage::Glsl | TargetLanguage::GlslEs => "texture",
                TargetLanguage::Hlsl => match sampler.ty {
                    GpuType::Sampler1d => "tex1D",
                    GpuType::Sampler3d => "tex3D",
                    GpuType::SamplerCube => "texCUBE",
                    _ => "tex2D",
                },
            };
            format!(
                "{} = {intrinsic}({}, {});",
                r(&ops[0]),
                sampler.name,
                r(&ops[2])
            )
        }
        AtomOp::Invoke(builtin) => match builtin {
            Builtin::Normalize => format!("{} = normalize({});", r(&ops[0]), r(&ops[1])),
            Builtin::Saturate => {
                if language == TargetLanguage::Hlsl {
                    format!("{} = saturate({});", r(&ops[0]), r(&ops[1]))
                } else {
                    format!("{} = clamp({}, 0.0, 1.0);", r(&ops[0]), r(&ops[1]))
                }
            }
            Builtin::Lerp => {
                let intrinsic = if language == TargetLanguage::Hlsl {
                    "lerp"
                } else {
                    "mix"
                };
                format!(
                    "{} = {intrinsic}({}, {}, {});",
                    r(&ops[0]),
                    r(&ops[1]),
                    r(&ops[2]),
                    r(&ops[3])
                )
            }
            Builtin::Dot => format!("{} = dot({}, {});", r(&ops[0]), r(&ops[1]), r(&ops[2])),
        },
        AtomOp::Call(name) => {
            let args: Vec<String> = ops.iter().map(|operand| r(operand)).collect();
            format!("{name}({});", args.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AutoBinding, Content};

    fn transform_program() -> Program {
        let mut program = Program::new(Stage::Vertex);
        program.add_dependency("FFPLib_Transform");
        let wvp = program
            .resolve_uniform(AutoBinding::WorldViewProjMatrix, GpuType::Mat4)
            .unwrap();
        let pos_in = program
            .resolve_input(Content::PositionObjectSpace, 0, GpuType::Float4)
            .unwrap();
        let pos_out = program
            .resolve_output(Content::PositionProjectiveSpace, 0, GpuType::Float4)
            .unwrap();
        program.push_atom(
            Atom::new(
                AtomOp::Call("FFP_Transform".into()),
                100,
                [
                    Operand::read(wvp, Mask::ALL),
                    Operand::read(pos_in, Mask::ALL),
                    Operand::write(pos_out, Mask::ALL),
                ],
            )
            .unwrap(),
        );
        program
    }

    #[test]
    fn glsl_emission_contains_include_uniform_and_call() {
        let source = ProgramWriter::write(&transform_program(), TargetLanguage::Glsl);
        assert!(source.contains("#include \"FFPLib_Transform.glsl\""));
        assert!(source.contains("uniform mat4 worldviewproj_matrix;"));
        assert!(source.contains("in vec4 i_position_os0;"));
        assert!(
            source.contains("FFP_Transform(worldviewproj_matrix, i_position_os0, o_position_proj0);")
        );
    }

    #[test]
    fn hlsl_emission_uses_hlsl_types_and_semantics() {
        let source = ProgramWriter::write(&transform_program(), TargetLanguage::Hlsl);
        assert!(source.contains("#include \"FFPLib_Transform.hlsl\""));
        assert!(source.contains("float4x4 worldviewproj_matrix;"));
        assert!(source.contains("in float4 i_position_os0 : POSITION"));
        assert!(source.contains("out float4 o_position_proj0 : SV_Position"));
    }

    #[test]
    fn swizzles_follow_operand_masks() {
        let mut program = Program::new(Stage::Fragment);
        let color = program
            .resolve_output(Content::FragmentColor, 0, GpuType::Float4)
            .unwrap();
        let texcoord = program
            .resolve_input(Content::TextureCoordinate, 0, GpuType::Float4)
            .unwrap();
        program.push_atom(
            Atom::new(
                AtomOp::Assign,
                5200,
                [
                    Operand::write(color, Mask::X | Mask::Y),
                    Operand::read(texcoord, Mask::Z | Mask::W),
                ],
            )
            .unwrap(),
        );
        let source = ProgramWriter::write(&program, TargetLanguage::Glsl);
        assert!(source.contains("o_frag_color0.xy = i_texcoord0.zw;"));
    }
}
