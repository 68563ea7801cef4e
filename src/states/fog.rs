//! Fixed-Function Fog
//!
//! Per-vertex fog: the vertex stage computes an attenuation factor from
//! clip-space depth and the pass's fog curve, and the fragment stage blends
//! the fog color in after every color contribution has been folded.

use crate::errors::Result;
use crate::ir::{
    Atom, AtomOp, AutoBinding, Builtin, Content, GpuType, Mask, Operand, ParamId, ProgramSet,
};
use crate::pass::{FogMode, PassDescriptor};
use crate::states::{BuildContext, stage};

#[derive(Debug, Clone, Default)]
pub struct FogState {
    worldviewproj: Option<ParamId>,
    position_in: Option<ParamId>,
    fog_params: Option<ParamId>,
    factor_out: Option<ParamId>,

    factor_in: Option<ParamId>,
    fog_color: Option<ParamId>,
    frag_color: Option<ParamId>,
}

impl FogState {
    pub const TYPE_TAG: &'static str = "FFP_Fog";

    #[must_use]
    pub fn new() -> FogState {
        FogState::default()
    }

    pub fn copy_from(&mut self, _other: &FogState) {
        // The fog curve comes from the pass snapshot at emission time.
    }

    pub fn pre_add(&self, pass: &PassDescriptor) -> bool {
        pass.fog.mode != FogMode::None
    }

    fn curve_function(mode: FogMode) -> &'static str {
        match mode {
            FogMode::Linear => "FFP_VertexFog_Linear",
            FogMode::Exp => "FFP_VertexFog_Exp",
            FogMode::Exp2 => "FFP_VertexFog_Exp2",
            FogMode::None => unreachable!("fog state declined the pass"),
        }
    }

    pub fn resolve_parameters(&mut self, set: &mut ProgramSet, _ctx: &BuildContext) -> Result<()> {
        let vs = &mut set.vertex;
        self.worldviewproj =
            Some(vs.resolve_uniform(AutoBinding::WorldViewProjMatrix, GpuType::Mat4)?);
        self.fog_params = Some(vs.resolve_uniform(AutoBinding::FogParams, GpuType::Float4)?);
        self.position_in =
            Some(vs.resolve_input(Content::PositionObjectSpace, 0, GpuType::Float4)?);
        self.factor_out = Some(vs.resolve_output(Content::FogFactor, 0, GpuType::Float1)?);

        let fs = &mut set.fragment;
        self.factor_in = Some(fs.resolve_input(Content::FogFactor, 0, GpuType::Float1)?);
        self.fog_color = Some(fs.resolve_uniform(AutoBinding::FogColor, GpuType::Float4)?);
        self.frag_color = Some(fs.resolve_output(Content::FragmentColor, 0, GpuType::Float4)?);
        Ok(())
    }

    pub fn resolve_dependencies(&self, set: &mut ProgramSet) {
        set.vertex.add_dependency("FFPLib_Common");
        set.vertex.add_dependency("FFPLib_Fog");
        set.fragment.add_dependency("FFPLib_Common");
        set.fragment.add_dependency("FFPLib_Fog");
    }

    pub fn emit_atoms(&self, set: &mut ProgramSet, ctx: &BuildContext) -> Result<()> {
        set.vertex.push_atom(Atom::new(
            AtomOp::Call(Self::curve_function(ctx.pass.fog.mode).into()),
            stage::VS_FOG,
            [
                Operand::read(self.worldviewproj.expect("resolved"), Mask::ALL),
                Operand::read(self.position_in.expect("resolved"), Mask::ALL),
                Operand::read(self.fog_params.expect("resolved"), Mask::ALL),
                Operand::write(self.factor_out.expect("resolved"), Mask::X),
            ],
        )?);

        // A factor of one leaves the surface color untouched.
        let xyz = Mask::X | Mask::Y | Mask::Z;
        let frag_color = self.frag_color.expect("resolved");
        set.fragment.push_atom(Atom::new(
            AtomOp::Invoke(Builtin::Lerp),
            stage::FS_FOG,
            [
                Operand::write(frag_color, xyz),
                Operand::read(self.fog_color.expect("resolved"), xyz),
                Operand::read(frag_color, xyz),
                Operand::read(self.factor_in.expect("resolved"), Mask::X),
            ],
        )?);
        Ok(())
    }
}
