//! Fixed-Function Transform
//!
//! Vertex position transform into clip space. Also the place where the
//! point-sprite capability gate lives: a pass that needs point sprites on
//! hardware without them aborts the whole build.

use crate::errors::{Result, RtssError};
use crate::ir::{
    Atom, AtomOp, AutoBinding, Content, GpuType, Mask, Operand, ParamId, ProgramSet,
};
use crate::states::{BuildContext, stage};

#[derive(Debug, Clone, Default)]
pub struct TransformState {
    worldviewproj: Option<ParamId>,
    position_in: Option<ParamId>,
    position_out: Option<ParamId>,
}

impl TransformState {
    pub const TYPE_TAG: &'static str = "FFP_Transform";

    #[must_use]
    pub fn new() -> TransformState {
        TransformState::default()
    }

    pub fn copy_from(&mut self, _other: &TransformState) {
        // Stateless besides resolved handles; nothing to copy.
    }

    pub fn resolve_parameters(&mut self, set: &mut ProgramSet, ctx: &BuildContext) -> Result<()> {
        if ctx.pass.point_sprites && !ctx.caps.point_sprites {
            return Err(RtssError::CapabilityMissing("point sprites".into()));
        }

        let vs = &mut set.vertex;
        self.worldviewproj =
            Some(vs.resolve_uniform(AutoBinding::WorldViewProjMatrix, GpuType::Mat4)?);
        self.position_in =
            Some(vs.resolve_input(Content::PositionObjectSpace, 0, GpuType::Float4)?);
        self.position_out =
            Some(vs.resolve_output(Content::PositionProjectiveSpace, 0, GpuType::Float4)?);
        Ok(())
    }

    pub fn resolve_dependencies(&self, set: &mut ProgramSet) {
        set.vertex.add_dependency("FFPLib_Common");
        set.vertex.add_dependency("FFPLib_Transform");
    }

    pub fn emit_atoms(&self, set: &mut ProgramSet, _ctx: &BuildContext) -> Result<()> {
        let atom = Atom::new(
            AtomOp::Call("FFP_Transform".into()),
            stage::VS_TRANSFORM,
            [
                Operand::read(self.worldviewproj.expect("resolved"), Mask::ALL),
                Operand::read(self.position_in.expect("resolved"), Mask::ALL),
                Operand::write(self.position_out.expect("resolved"), Mask::ALL),
            ],
        )?;
        set.vertex.push_atom(atom);
        Ok(())
    }
}
