//! Fixed-Function Texturing
//!
//! One instance per texture unit. The vertex side produces the unit's
//! texcoord (passed through, generated from an environment-map method, or
//! projected) and the fragment side samples the unit and folds the texel
//! into the running color.
//!
//! Blend lowering: when the unit's alpha blend is congruent with its color
//! blend (same operation, same sources, neither manual), one blend group
//! writes all four lanes. Otherwise the color group writes `xyz` and a
//! second group lowers the alpha blend into `w` alone.

use crate::errors::{Result, RtssError};
use crate::ir::{
    Atom, AtomOp, AutoBinding, Builtin, Content, GpuType, Mask, Operand, ParamId, ProgramSet,
};
use crate::pass::{
    BlendOp, BlendSource, EnvMapKind, LayerBlend, PassDescriptor, TextureEffect, TextureType,
    TextureUnitDesc,
};
use crate::rendersystem::SamplerCaps;
use crate::states::{BuildContext, specular_enabled, stage};

/// How the unit's texcoord is produced in the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexcoordCalc {
    Passthrough,
    EnvMapCurved,
    EnvMapPlanar,
    EnvMapNormal,
    EnvMapReflection,
    Projective,
}

impl TexcoordCalc {
    fn from_unit(unit: &TextureUnitDesc) -> TexcoordCalc {
        for effect in &unit.effects {
            match effect {
                TextureEffect::ProjectiveTexture => return TexcoordCalc::Projective,
                TextureEffect::EnvironmentMap(kind) => {
                    return match kind {
                        EnvMapKind::Curved => TexcoordCalc::EnvMapCurved,
                        EnvMapKind::Planar => TexcoordCalc::EnvMapPlanar,
                        EnvMapKind::Reflection => TexcoordCalc::EnvMapReflection,
                        EnvMapKind::Normal => TexcoordCalc::EnvMapNormal,
                    };
                }
            }
        }
        TexcoordCalc::Passthrough
    }

    /// Lane width of the vertex output texcoord.
    fn output_width(self, texture_type: TextureType) -> u32 {
        match self {
            TexcoordCalc::Passthrough => match texture_type {
                TextureType::Tex1d => 1,
                TextureType::Tex2d => 2,
                TextureType::Tex3d | TextureType::Cube => 3,
            },
            TexcoordCalc::EnvMapCurved | TexcoordCalc::EnvMapPlanar => 2,
            TexcoordCalc::EnvMapNormal | TexcoordCalc::EnvMapReflection => 3,
            // Projective sampling consumes the full four floats; the
            // divide always uses the w lane of the whole texcoord.
            TexcoordCalc::Projective => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TexturingState {
    unit_index: u32,
    unit: TextureUnitDesc,
    late_add_blend: bool,
    calc: TexcoordCalc,

    // Vertex side.
    world: Option<ParamId>,
    inv_transpose_world: Option<ParamId>,
    view: Option<ParamId>,
    texture_matrix: Option<ParamId>,
    texture_viewproj: Option<ParamId>,
    texcoord_in: Option<ParamId>,
    normal_in: Option<ParamId>,
    position_in: Option<ParamId>,
    texcoord_out: Option<ParamId>,

    // Fragment side.
    sampler: Option<ParamId>,
    texcoord_fs: Option<ParamId>,
    texel: Option<ParamId>,
    frag_color: Option<ParamId>,
    diffuse_fs: Option<ParamId>,
    specular_fs: Option<ParamId>,
    color_manual: Option<ParamId>,
    color_factor: Option<ParamId>,
    alpha_manual: Option<ParamId>,
    alpha_factor: Option<ParamId>,
}

impl TexturingState {
    pub const TYPE_TAG: &'static str = "FFP_Texturing";

    #[must_use]
    pub fn new(unit_index: u32, unit: TextureUnitDesc) -> TexturingState {
        let calc = TexcoordCalc::from_unit(&unit);
        TexturingState {
            unit_index,
            unit,
            late_add_blend: false,
            calc,
            world: None,
            inv_transpose_world: None,
            view: None,
            texture_matrix: None,
            texture_viewproj: None,
            texcoord_in: None,
            normal_in: None,
            position_in: None,
            texcoord_out: None,
            sampler: None,
            texcoord_fs: None,
            texel: None,
            frag_color: None,
            diffuse_fs: None,
            specular_fs: None,
            color_manual: None,
            color_factor: None,
            alpha_manual: None,
            alpha_factor: None,
        }
    }

    /// Script-facing template carrying only configuration.
    #[must_use]
    pub fn template(late_add_blend: bool) -> TexturingState {
        let mut state = TexturingState::new(0, TextureUnitDesc::default());
        state.late_add_blend = late_add_blend;
        state
    }

    #[must_use]
    pub fn unit_index(&self) -> u32 {
        self.unit_index
    }

    #[must_use]
    pub fn texcoord_calc(&self) -> TexcoordCalc {
        self.calc
    }

    #[must_use]
    pub fn late_add_blend(&self) -> bool {
        self.late_add_blend
    }

    pub fn copy_from(&mut self, other: &TexturingState) {
        self.late_add_blend = other.late_add_blend;
    }

    pub fn pre_add(&self, pass: &PassDescriptor) -> bool {
        (self.unit_index as usize) < pass.texture_units.len()
    }

    /// Sampler family the unit needs. Reflection mapping always samples a
    /// cube texture, whatever the unit declares.
    fn sampler_type(&self) -> GpuType {
        if self.calc == TexcoordCalc::EnvMapReflection {
            return GpuType::SamplerCube;
        }
        match self.unit.texture_type {
            TextureType::Tex1d => GpuType::Sampler1d,
            TextureType::Tex2d => GpuType::Sampler2d,
            TextureType::Tex3d => GpuType::Sampler3d,
            TextureType::Cube => GpuType::SamplerCube,
        }
    }

    fn sampler_cap(&self) -> SamplerCaps {
        match self.sampler_type() {
            GpuType::Sampler1d => SamplerCaps::TEX_1D,
            GpuType::Sampler2d => SamplerCaps::TEX_2D,
            GpuType::Sampler3d => SamplerCaps::TEX_3D,
            _ => SamplerCaps::CUBE,
        }
    }

    /// Whether one blend group can serve both color and alpha.
    fn blends_congruent(&self) -> bool {
        let color = &self.unit.color_blend;
        let alpha = &self.unit.alpha_blend;
        color.op == alpha.op
            && color.source1 == alpha.source1
            && color.source2 == alpha.source2
            && !color.uses_manual()
            && !alpha.uses_manual()
    }

    fn blend_stage(&self) -> u32 {
        if self.late_add_blend {
            stage::FS_LATE_BLEND
        } else {
            stage::FS_TEXTURING
        }
    }

    pub fn resolve_parameters(&mut self, set: &mut ProgramSet, ctx: &BuildContext) -> Result<()> {
        if !ctx.caps.sampler_types.contains(self.sampler_cap()) {
            return Err(RtssError::CapabilityMissing(format!(
                "sampler type {:?}",
                self.sampler_type()
            )));
        }

        let width = self.calc.output_width(self.unit.texture_type);
        let unit = self.unit_index;

        // Vertex side: uniforms dictated by the calc method, then the
        // coordinate flow.
        {
            let vs = &mut set.vertex;
            match self.calc {
                TexcoordCalc::Passthrough => {
                    if self.unit.texture_transform.is_some() {
                        self.texture_matrix =
                            Some(vs.resolve_uniform(AutoBinding::TextureMatrix(unit), GpuType::Mat4)?);
                    }
                    self.texcoord_in = Some(vs.resolve_input(
                        Content::TextureCoordinate,
                        self.unit.texcoord_set,
                        GpuType::float_vec(width),
                    )?);
                }
                TexcoordCalc::EnvMapCurved | TexcoordCalc::EnvMapNormal => {
                    self.inv_transpose_world = Some(vs.resolve_uniform(
                        AutoBinding::InverseTransposeWorldMatrix,
                        GpuType::Mat4,
                    )?);
                    self.view = Some(vs.resolve_uniform(AutoBinding::ViewMatrix, GpuType::Mat4)?);
                    self.normal_in =
                        Some(vs.resolve_input(Content::NormalObjectSpace, 0, GpuType::Float3)?);
                }
                TexcoordCalc::EnvMapPlanar => {
                    self.inv_transpose_world = Some(vs.resolve_uniform(
                        AutoBinding::InverseTransposeWorldMatrix,
                        GpuType::Mat4,
                    )?);
                    self.view = Some(vs.resolve_uniform(AutoBinding::ViewMatrix, GpuType::Mat4)?);
                    self.position_in =
                        Some(vs.resolve_input(Content::PositionObjectSpace, 0, GpuType::Float4)?);
                }
                TexcoordCalc::EnvMapReflection => {
                    self.world = Some(vs.resolve_uniform(AutoBinding::WorldMatrix, GpuType::Mat4)?);
                    self.inv_transpose_world = Some(vs.resolve_uniform(
                        AutoBinding::InverseTransposeWorldMatrix,
                        GpuType::Mat4,
                    )?);
                    self.view = Some(vs.resolve_uniform(AutoBinding::ViewMatrix, GpuType::Mat4)?);
                    self.position_in =
                        Some(vs.resolve_input(Content::PositionObjectSpace, 0, GpuType::Float4)?);
                    self.normal_in =
                        Some(vs.resolve_input(Content::NormalObjectSpace, 0, GpuType::Float3)?);
                }
                TexcoordCalc::Projective => {
                    self.texture_viewproj = Some(
                        vs.resolve_uniform(AutoBinding::TextureViewProjMatrix(unit), GpuType::Mat4)?,
                    );
                    self.position_in =
                        Some(vs.resolve_input(Content::PositionObjectSpace, 0, GpuType::Float4)?);
                }
            }
            self.texcoord_out = Some(vs.resolve_output(
                Content::TextureCoordinate,
                unit,
                GpuType::float_vec(width),
            )?);
        }

        // Fragment side: matching input, sampler, texel local, blend args.
        {
            let fs = &mut set.fragment;
            self.texcoord_fs = Some(fs.resolve_input(
                Content::TextureCoordinate,
                unit,
                GpuType::float_vec(width),
            )?);
            self.sampler =
                Some(fs.resolve_uniform(AutoBinding::TextureSampler(unit), self.sampler_type())?);
            self.texel = Some(fs.resolve_local(GpuType::Float4, &format!("texel{unit}"))?);
            self.frag_color = Some(fs.resolve_output(Content::FragmentColor, 0, GpuType::Float4)?);

            let congruent = self.blends_congruent();
            let blends = if congruent {
                [Some(self.unit.color_blend), None]
            } else {
                [Some(self.unit.color_blend), Some(self.unit.alpha_blend)]
            };
            for blend in blends.into_iter().flatten() {
                if blend.source1 == BlendSource::Diffuse
                    || blend.source2 == BlendSource::Diffuse
                    || blend.op == BlendOp::BlendDiffuseAlpha
                {
                    self.diffuse_fs =
                        Some(fs.resolve_input(Content::ColorDiffuse, 0, GpuType::Float4)?);
                }
                if blend.source1 == BlendSource::Specular || blend.source2 == BlendSource::Specular
                {
                    if !specular_enabled(ctx.pass) {
                        return Err(RtssError::internal(
                            "specular blend source without specular tracking",
                        ));
                    }
                    self.specular_fs =
                        Some(fs.resolve_input(Content::ColorSpecular, 0, GpuType::Float4)?);
                }
            }

            let color = self.unit.color_blend;
            if color.source1 == BlendSource::Manual || color.source2 == BlendSource::Manual {
                self.color_manual = Some(
                    fs.resolve_user_uniform(&format!("tu{unit}_color_manual"), GpuType::Float4)?,
                );
            }
            if color.op == BlendOp::BlendManual {
                self.color_factor = Some(
                    fs.resolve_user_uniform(&format!("tu{unit}_color_factor"), GpuType::Float1)?,
                );
            }
            if !congruent {
                let alpha = self.unit.alpha_blend;
                if alpha.source1 == BlendSource::Manual || alpha.source2 == BlendSource::Manual {
                    self.alpha_manual = Some(
                        fs.resolve_user_uniform(&format!("tu{unit}_alpha_manual"), GpuType::Float4)?,
                    );
                }
                if alpha.op == BlendOp::BlendManual {
                    self.alpha_factor = Some(
                        fs.resolve_user_uniform(&format!("tu{unit}_alpha_factor"), GpuType::Float1)?,
                    );
                }
            }
        }
        Ok(())
    }

    pub fn resolve_dependencies(&self, set: &mut ProgramSet) {
        set.vertex.add_dependency("FFPLib_Common");
        set.vertex.add_dependency("FFPLib_Texturing");
        set.fragment.add_dependency("FFPLib_Common");
        set.fragment.add_dependency("FFPLib_Texturing");
    }

    pub fn emit_atoms(&self, set: &mut ProgramSet, _ctx: &BuildContext) -> Result<()> {
        self.emit_texcoord(set)?;
        self.emit_sample(set)?;
        self.emit_blends(set)
    }

    // ── Vertex: texcoord generation ──────────────────────────────────────────

    fn emit_texcoord(&self, set: &mut ProgramSet) -> Result<()> {
        let vs = &mut set.vertex;
        let out = self.texcoord_out.expect("resolved");
        let out_mask = Mask::from_width(
            self.calc.output_width(self.unit.texture_type),
        );
        let xyz = Mask::X | Mask::Y | Mask::Z;

        let atom = match self.calc {
            TexcoordCalc::Passthrough => {
                let input = self.texcoord_in.expect("resolved");
                if let Some(matrix) = self.texture_matrix {
                    Atom::new(
                        AtomOp::Call("FFP_TransformTexCoord".into()),
                        stage::VS_TEXTURING,
                        [
                            Operand::read(matrix, Mask::ALL),
                            Operand::read(input, out_mask),
                            Operand::write(out, out_mask),
                        ],
                    )?
                } else {
                    Atom::new(
                        AtomOp::Assign,
                        stage::VS_TEXTURING,
                        [Operand::write(out, out_mask), Operand::read(input, out_mask)],
                    )?
                }
            }
            TexcoordCalc::EnvMapCurved => Atom::new(
                AtomOp::Call("FFP_GenerateTexCoord_EnvSphere".into()),
                stage::VS_TEXTURING,
                [
                    Operand::read(self.inv_transpose_world.expect("resolved"), Mask::ALL),
                    Operand::read(self.view.expect("resolved"), Mask::ALL),
                    Operand::read(self.normal_in.expect("resolved"), xyz),
                    Operand::write(out, out_mask),
                ],
            )?,
            TexcoordCalc::EnvMapPlanar => Atom::new(
                AtomOp::Call("FFP_GenerateTexCoord_EnvPlanar".into()),
                stage::VS_TEXTURING,
                [
                    Operand::read(self.inv_transpose_world.expect("resolved"), Mask::ALL),
                    Operand::read(self.view.expect("resolved"), Mask::ALL),
                    Operand::read(self.position_in.expect("resolved"), Mask::ALL),
                    Operand::write(out, out_mask),
                ],
            )?,
            TexcoordCalc::EnvMapNormal => Atom::new(
                AtomOp::Call("FFP_GenerateTexCoord_EnvNormal".into()),
                stage::VS_TEXTURING,
                [
                    Operand::read(self.inv_transpose_world.expect("resolved"), Mask::ALL),
                    Operand::read(self.view.expect("resolved"), Mask::ALL),
                    Operand::read(self.normal_in.expect("resolved"), xyz),
                    Operand::write(out, out_mask),
                ],
            )?,
            TexcoordCalc::EnvMapReflection => Atom::new(
                AtomOp::Call("FFP_GenerateTexCoord_EnvReflect".into()),
                stage::VS_TEXTURING,
                [
                    Operand::read(self.world.expect("resolved"), Mask::ALL),
                    Operand::read(self.inv_transpose_world.expect("resolved"), Mask::ALL),
                    Operand::read(self.view.expect("resolved"), Mask::ALL),
                    Operand::read(self.position_in.expect("resolved"), Mask::ALL),
                    Operand::read(self.normal_in.expect("resolved"), xyz),
                    Operand::write(out, out_mask),
                ],
            )?,
            TexcoordCalc::Projective => Atom::new(
                AtomOp::Call("FFP_GenerateTexCoord_Projection".into()),
                stage::VS_TEXTURING,
                [
                    Operand::read(self.texture_viewproj.expect("resolved"), Mask::ALL),
                    Operand::read(self.position_in.expect("resolved"), Mask::ALL),
                    Operand::write(out, out_mask),
                ],
            )?,
        };
        vs.push_atom(atom);
        Ok(())
    }

    // ── Fragment: sampling ───────────────────────────────────────────────────

    fn emit_sample(&self, set: &mut ProgramSet) -> Result<()> {
        let fs = &mut set.fragment;
        let texel = self.texel.expect("resolved");
        let sampler = self.sampler.expect("resolved");
        let texcoord = self.texcoord_fs.expect("resolved");
        let width = self.calc.output_width(self.unit.texture_type);

        let atom = if self.calc == TexcoordCalc::Projective {
            // The helper divides by the w of the full texcoord.
            Atom::new(
                AtomOp::Call("FFP_SampleTextureProj".into()),
                stage::FS_SAMPLING,
                [
                    Operand::read(sampler, Mask::ALL),
                    Operand::read(texcoord, Mask::ALL),
                    Operand::write(texel, Mask::ALL),
                ],
            )?
        } else {
            Atom::new(
                AtomOp::Sample,
                stage::FS_SAMPLING,
                [
                    Operand::write(texel, Mask::ALL),
                    Operand::read(sampler, Mask::ALL),
                    Operand::read(texcoord, Mask::from_width(width)),
                ],
            )?
        };
        fs.push_atom(atom);
        Ok(())
    }

    // ── Fragment: blending ───────────────────────────────────────────────────

    fn emit_blends(&self, set: &mut ProgramSet) -> Result<()> {
        let xyz = Mask::X | Mask::Y | Mask::Z;
        if self.blends_congruent() {
            self.emit_blend_group(set, &self.unit.color_blend, Mask::ALL, false)
        } else {
            self.emit_blend_group(set, &self.unit.color_blend, xyz, false)?;
            self.emit_blend_group(set, &self.unit.alpha_blend, Mask::W, true)
        }
    }

    /// Operand for one blend source argument, masked to the target lanes.
    fn source_operand(&self, source: BlendSource, mask: Mask, alpha_group: bool) -> Operand {
        let param = match source {
            BlendSource::Current => self.frag_color.expect("resolved"),
            BlendSource::Texture => self.texel.expect("resolved"),
            BlendSource::Diffuse => self.diffuse_fs.expect("resolved"),
            BlendSource::Specular => self.specular_fs.expect("resolved"),
            BlendSource::Manual => {
                if alpha_group {
                    self.alpha_manual.expect("resolved")
                } else {
                    self.color_manual.expect("resolved")
                }
            }
        };
        Operand::read(param, mask)
    }

    fn emit_blend_group(
        &self,
        set: &mut ProgramSet,
        blend: &LayerBlend,
        mask: Mask,
        alpha_group: bool,
    ) -> Result<()> {
        let fs = &mut set.fragment;
        let out = self.frag_color.expect("resolved");
        let blend_stage = self.blend_stage();
        let s1 = self.source_operand(blend.source1, mask, alpha_group);
        let s2 = self.source_operand(blend.source2, mask, alpha_group);

        let atom = match blend.op {
            BlendOp::Source1 => Atom::new(
                AtomOp::Assign,
                blend_stage,
                [Operand::write(out, mask), s1],
            )?,
            BlendOp::Source2 => Atom::new(
                AtomOp::Assign,
                blend_stage,
                [Operand::write(out, mask), s2],
            )?,
            BlendOp::Modulate => Atom::new(
                AtomOp::Binary(crate::ir::BinOp::Mul),
                blend_stage,
                [Operand::write(out, mask), s1, s2],
            )?,
            BlendOp::Add => Atom::new(
                AtomOp::Binary(crate::ir::BinOp::Add),
                blend_stage,
                [Operand::write(out, mask), s1, s2],
            )?,
            BlendOp::Subtract => Atom::new(
                AtomOp::Binary(crate::ir::BinOp::Sub),
                blend_stage,
                [Operand::write(out, mask), s1, s2],
            )?,
            BlendOp::ModulateX2 => Atom::new(
                AtomOp::Call("FFP_ModulateX2".into()),
                blend_stage,
                [s1, s2, Operand::write(out, mask)],
            )?,
            BlendOp::ModulateX4 => Atom::new(
                AtomOp::Call("FFP_ModulateX4".into()),
                blend_stage,
                [s1, s2, Operand::write(out, mask)],
            )?,
            BlendOp::AddSigned => Atom::new(
                AtomOp::Call("FFP_AddSigned".into()),
                blend_stage,
                [s1, s2, Operand::write(out, mask)],
            )?,
            BlendOp::AddSmooth => Atom::new(
                AtomOp::Call("FFP_AddSmooth".into()),
                blend_stage,
                [s1, s2, Operand::write(out, mask)],
            )?,
            BlendOp::DotProduct => Atom::new(
                AtomOp::Call("FFP_DotProduct".into()),
                blend_stage,
                [s1, s2, Operand::write(out, mask)],
            )?,
            BlendOp::BlendDiffuseAlpha => self.lerp_atom(
                out,
                mask,
                s1,
                s2,
                Operand::read(self.diffuse_fs.expect("resolved"), Mask::W),
            )?,
            BlendOp::BlendTextureAlpha => self.lerp_atom(
                out,
                mask,
                s1,
                s2,
                Operand::read(self.texel.expect("resolved"), Mask::W),
            )?,
            BlendOp::BlendCurrentAlpha => self.lerp_atom(
                out,
                mask,
                s1,
                s2,
                Operand::read(self.frag_color.expect("resolved"), Mask::W),
            )?,
            BlendOp::BlendManual => {
                let factor = if alpha_group {
                    self.alpha_factor.expect("resolved")
                } else {
                    self.color_factor.expect("resolved")
                };
                self.lerp_atom(out, mask, s1, s2, Operand::read(factor, Mask::X))?
            }
        };
        fs.push_atom(atom);
        Ok(())
    }

    /// `out = mix(s2, s1, weight)`: a weight of one selects source1.
    fn lerp_atom(
        &self,
        out: ParamId,
        mask: Mask,
        s1: Operand,
        s2: Operand,
        weight: Operand,
    ) -> Result<Atom> {
        Atom::new(
            AtomOp::Invoke(Builtin::Lerp),
            self.blend_stage(),
            [Operand::write(out, mask), s2, s1, weight],
        )
    }
}
