//! Fixed-Function Color Finalizer
//!
//! Seeds the fragment color from the interpolated diffuse, folds the
//! interpolated specular back in after the texture blends, and applies the
//! alpha-rejection test at the very end. On passes with lighting disabled
//! it also supplies the vertex base color from the surface diffuse.

use crate::errors::Result;
use crate::ir::{
    Atom, AtomOp, AutoBinding, BinOp, Content, GpuType, Mask, Operand, ParamId, ProgramSet,
};
use crate::pass::CompareFunc;
use crate::states::{BuildContext, specular_enabled, stage};

#[derive(Debug, Clone, Default)]
pub struct ColorState {
    surface_diffuse: Option<ParamId>,
    diffuse_out: Option<ParamId>,

    diffuse_in: Option<ParamId>,
    specular_in: Option<ParamId>,
    frag_color: Option<ParamId>,
    alpha_reject_value: Option<ParamId>,
}

impl ColorState {
    pub const TYPE_TAG: &'static str = "FFP_ColorFinalize";

    #[must_use]
    pub fn new() -> ColorState {
        ColorState::default()
    }

    pub fn copy_from(&mut self, _other: &ColorState) {
        // Configuration lives entirely in the pass snapshot.
    }

    fn reject_function(func: CompareFunc) -> &'static str {
        match func {
            CompareFunc::AlwaysFail => "FFP_AlphaTest_Never",
            CompareFunc::Less => "FFP_AlphaTest_Less",
            CompareFunc::LessEqual => "FFP_AlphaTest_LessEqual",
            CompareFunc::Equal => "FFP_AlphaTest_Equal",
            CompareFunc::NotEqual => "FFP_AlphaTest_NotEqual",
            CompareFunc::GreaterEqual => "FFP_AlphaTest_GreaterEqual",
            CompareFunc::Greater => "FFP_AlphaTest_Greater",
            CompareFunc::AlwaysPass => unreachable!("no test emitted for always-pass"),
        }
    }

    pub fn resolve_parameters(&mut self, set: &mut ProgramSet, ctx: &BuildContext) -> Result<()> {
        let vs = &mut set.vertex;
        self.diffuse_out = Some(vs.resolve_output(Content::ColorDiffuse, 0, GpuType::Float4)?);
        if !ctx.pass.lighting {
            self.surface_diffuse =
                Some(vs.resolve_uniform(AutoBinding::SurfaceDiffuse, GpuType::Float4)?);
        }

        let fs = &mut set.fragment;
        self.diffuse_in = Some(fs.resolve_input(Content::ColorDiffuse, 0, GpuType::Float4)?);
        if specular_enabled(ctx.pass) {
            self.specular_in = Some(fs.resolve_input(Content::ColorSpecular, 0, GpuType::Float4)?);
        }
        self.frag_color = Some(fs.resolve_output(Content::FragmentColor, 0, GpuType::Float4)?);
        if ctx.pass.alpha_reject.func != CompareFunc::AlwaysPass {
            self.alpha_reject_value =
                Some(fs.resolve_uniform(AutoBinding::AlphaRejectionValue, GpuType::Float1)?);
        }
        Ok(())
    }

    pub fn resolve_dependencies(&self, set: &mut ProgramSet) {
        set.vertex.add_dependency("FFPLib_Common");
        set.fragment.add_dependency("FFPLib_Common");
        if self.alpha_reject_value.is_some() {
            set.fragment.add_dependency("FFPLib_AlphaTest");
        }
    }

    pub fn emit_atoms(&self, set: &mut ProgramSet, ctx: &BuildContext) -> Result<()> {
        if let Some(surface_diffuse) = self.surface_diffuse {
            set.vertex.push_atom(Atom::new(
                AtomOp::Assign,
                stage::VS_COLOR,
                [
                    Operand::write(self.diffuse_out.expect("resolved"), Mask::ALL),
                    Operand::read(surface_diffuse, Mask::ALL),
                ],
            )?);
        }

        let fs = &mut set.fragment;
        let frag_color = self.frag_color.expect("resolved");

        fs.push_atom(Atom::new(
            AtomOp::Assign,
            stage::FS_COLOR_BEGIN,
            [
                Operand::write(frag_color, Mask::ALL),
                Operand::read(self.diffuse_in.expect("resolved"), Mask::ALL),
            ],
        )?);

        if let Some(specular_in) = self.specular_in {
            let xyz = Mask::X | Mask::Y | Mask::Z;
            fs.push_atom(Atom::new(
                AtomOp::Binary(BinOp::Add),
                stage::FS_COLOR_END,
                [
                    Operand::write(frag_color, xyz),
                    Operand::read(frag_color, xyz),
                    Operand::read(specular_in, xyz),
                ],
            )?);
        }

        if let Some(reject_value) = self.alpha_reject_value {
            fs.push_atom(Atom::new(
                AtomOp::Call(Self::reject_function(ctx.pass.alpha_reject.func).into()),
                stage::FS_POST_PROCESS,
                [
                    Operand::read(reject_value, Mask::X),
                    Operand::read(frag_color, Mask::W),
                ],
            )?);
        }
        Ok(())
    }
}
