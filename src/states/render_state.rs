//! Render-State Composer
//!
//! Collects the applicable sub-render-states for a pass in canonical order.
//! Equal pass snapshots compose structurally equal render states, which is
//! what makes the downstream program hashes deterministic.

use crate::pass::PassDescriptor;
use crate::states::{Registry, SubRenderState};

/// Ordered sub-render-states plus the light counts a pass must handle.
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    states: Vec<SubRenderState>,
    /// Directional / point / spot counts from the scheme's per-pass cap.
    light_counts: [u32; 3],
}

impl RenderState {
    /// Compose the render state for a pass.
    ///
    /// Every registered factory is asked to contribute; contributions that
    /// decline `pre_add_to_render_state` are dropped; survivors are stable
    /// sorted by `(execution order, registration order)`.
    #[must_use]
    pub fn for_pass(
        registry: &Registry,
        pass: &PassDescriptor,
        light_counts: [u32; 3],
    ) -> RenderState {
        let mut states = Vec::new();
        for factory in registry.factories() {
            factory.create_or_retrieve(pass, &mut states);
        }
        states.retain(|state| state.pre_add_to_render_state(pass));
        states.sort_by_key(SubRenderState::execution_order);

        log::debug!(
            "composed render state: {} sub-render-states, lights {light_counts:?}",
            states.len()
        );
        RenderState {
            states,
            light_counts,
        }
    }

    #[must_use]
    pub fn states(&self) -> &[SubRenderState] {
        &self.states
    }

    pub(crate) fn states_mut(&mut self) -> &mut [SubRenderState] {
        &mut self.states
    }

    #[must_use]
    pub fn light_counts(&self) -> [u32; 3] {
        self.light_counts
    }

    /// Fold a script-provided instance into the composed state.
    ///
    /// Every existing state with the same type tag takes a value-copy of
    /// the template's configuration; if none matches, the template is
    /// appended in order.
    pub fn apply(&mut self, template: &SubRenderState) {
        let mut matched = false;
        for state in &mut self.states {
            if state.type_tag() == template.type_tag() {
                state.copy_from(template);
                matched = true;
            }
        }
        if !matched {
            self.states.push(template.clone());
            self.states.sort_by_key(SubRenderState::execution_order);
        }
    }
}
