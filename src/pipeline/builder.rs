//! Program Builder
//!
//! Drives the composed sub-render-states through the three lowering phases
//! to populate a program pair:
//!
//! 1. **Resolve parameters**: uniforms and entry-function inputs/outputs.
//!    Duplicate requests across sub-render-states deliberately collapse
//!    onto shared parameter objects.
//! 2. **Resolve dependencies**: shader-library names accumulate as an
//!    ordered set per program.
//! 3. **Emit atoms**: each state appends atoms at its stage-order groups.
//!
//! A soft failure in any phase aborts the whole build; the facade then
//! falls back to the pass's original technique.

use crate::errors::Result;
use crate::ir::ProgramSet;
use crate::states::{BuildContext, RenderState};

pub struct ProgramBuilder;

impl ProgramBuilder {
    /// Lower a render state into a populated program pair.
    pub fn build(render_state: &mut RenderState, ctx: &BuildContext) -> Result<ProgramSet> {
        let mut set = ProgramSet::new();

        for state in render_state.states_mut() {
            state.resolve_parameters(&mut set, ctx)?;
        }
        for state in render_state.states() {
            state.resolve_dependencies(&mut set);
        }
        for state in render_state.states() {
            state.emit_atoms(&mut set, ctx)?;
        }

        set.vertex.validate()?;
        set.fragment.validate()?;

        log::debug!(
            "built program set: vs {} atoms / {} uniforms, fs {} atoms / {} uniforms",
            set.vertex.main().atoms().len(),
            set.vertex.uniforms().len(),
            set.fragment.main().atoms().len(),
            set.fragment.uniforms().len(),
        );
        Ok(set)
    }
}
