//! Sub-Render-States
//!
//! A sub-render-state converts one facet of the fixed-function pass
//! description into shader IR. The set of built-ins is closed (transform,
//! lighting, texturing with one instance per texture unit, fog, and the
//! color finalizer) and dispatch is a tagged variant match: the three lowering
//! methods are total functions over the tag.
//!
//! Build flow: the composer collects and orders instances into a
//! [`RenderState`], then the program builder drives each instance through
//! resolve-parameters, resolve-dependencies, and emit-atoms.

mod color;
mod fog;
mod lighting;
mod registry;
mod render_state;
mod texturing;
mod transform;

pub use color::ColorState;
pub use fog::FogState;
pub use lighting::LightingState;
pub use registry::{PropertyDesc, Registry, SubRenderStateFactory};
pub use render_state::RenderState;
pub use texturing::{TexcoordCalc, TexturingState};
pub use transform::TransformState;

use crate::errors::Result;
use crate::ir::ProgramSet;
use crate::pass::PassDescriptor;
use crate::rendersystem::Capabilities;

/// Position of a sub-render-state on the composition axis. Ties between
/// equal orders are broken by factory registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum ExecutionOrder {
    Transform = 100,
    Lighting = 200,
    Texturing = 300,
    Fog = 400,
    ColorFinalize = 500,
    PostProcess = 600,
}

/// Stage-order keys grouping atoms inside the entry functions.
///
/// One shared axis covers both stages; each function only ever holds keys
/// of its own half. Within a group, emission order is preserved by the
/// stable sort.
pub mod stage {
    /// Packer-inserted decompositions run before everything else.
    pub const PRE_PROCESS: u32 = 0;
    pub const VS_TRANSFORM: u32 = 100;
    pub const VS_COLOR: u32 = 200;
    pub const VS_LIGHTING: u32 = 300;
    pub const VS_TEXTURING: u32 = 400;
    pub const VS_FOG: u32 = 500;
    /// Packer-inserted recombinations run after every vertex group.
    pub const VS_POST_PROCESS: u32 = 2000;
    pub const FS_PRE_PROCESS: u32 = 5000;
    pub const FS_COLOR_BEGIN: u32 = 5100;
    pub const FS_SAMPLING: u32 = 5150;
    pub const FS_TEXTURING: u32 = 5200;
    pub const FS_COLOR_END: u32 = 5300;
    /// Late-add texture blends: after the lighting contributions folded in
    /// at [`FS_COLOR_END`], before fog.
    pub const FS_LATE_BLEND: u32 = FS_COLOR_END + 51;
    pub const FS_FOG: u32 = 5400;
    pub const FS_POST_PROCESS: u32 = 6000;
}

/// Everything a lowering phase may consult besides the program set.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub pass: &'a PassDescriptor,
    pub caps: &'a Capabilities,
    /// Directional / point / spot light counts the pass must handle.
    pub light_counts: [u32; 3],
}

/// Whether the pass tracks a separate specular color through the pipeline.
pub(crate) fn specular_enabled(pass: &PassDescriptor) -> bool {
    pass.lighting && (pass.specular.x != 0.0 || pass.specular.y != 0.0 || pass.specular.z != 0.0)
}

/// One pluggable contributor to a generated program pair.
#[derive(Debug, Clone)]
pub enum SubRenderState {
    Transform(TransformState),
    Lighting(LightingState),
    Texturing(TexturingState),
    Fog(FogState),
    ColorFinalize(ColorState),
}

impl SubRenderState {
    /// Stable type tag, also the factory key in the registry.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            SubRenderState::Transform(_) => TransformState::TYPE_TAG,
            SubRenderState::Lighting(_) => LightingState::TYPE_TAG,
            SubRenderState::Texturing(_) => TexturingState::TYPE_TAG,
            SubRenderState::Fog(_) => FogState::TYPE_TAG,
            SubRenderState::ColorFinalize(_) => ColorState::TYPE_TAG,
        }
    }

    #[must_use]
    pub fn execution_order(&self) -> ExecutionOrder {
        match self {
            SubRenderState::Transform(_) => ExecutionOrder::Transform,
            SubRenderState::Lighting(_) => ExecutionOrder::Lighting,
            SubRenderState::Texturing(_) => ExecutionOrder::Texturing,
            SubRenderState::Fog(_) => ExecutionOrder::Fog,
            SubRenderState::ColorFinalize(_) => ExecutionOrder::ColorFinalize,
        }
    }

    /// Acceptance predicate: a declined instance is dropped from the
    /// render state before the build starts.
    #[must_use]
    pub fn pre_add_to_render_state(&self, pass: &PassDescriptor) -> bool {
        match self {
            SubRenderState::Transform(_) | SubRenderState::ColorFinalize(_) => true,
            SubRenderState::Lighting(_) => pass.lighting,
            SubRenderState::Texturing(state) => state.pre_add(pass),
            SubRenderState::Fog(state) => state.pre_add(pass),
        }
    }

    /// Value-copy of the configuration of `other` into `self`.
    ///
    /// Only configuration is copied, never resolved parameter handles;
    /// mismatched variants leave `self` untouched.
    pub fn copy_from(&mut self, other: &SubRenderState) {
        match (self, other) {
            (SubRenderState::Transform(dst), SubRenderState::Transform(src)) => {
                dst.copy_from(src);
            }
            (SubRenderState::Lighting(dst), SubRenderState::Lighting(src)) => dst.copy_from(src),
            (SubRenderState::Texturing(dst), SubRenderState::Texturing(src)) => dst.copy_from(src),
            (SubRenderState::Fog(dst), SubRenderState::Fog(src)) => dst.copy_from(src),
            (SubRenderState::ColorFinalize(dst), SubRenderState::ColorFinalize(src)) => {
                dst.copy_from(src);
            }
            _ => {}
        }
    }

    /// Phase R: resolve uniforms and entry-function inputs/outputs.
    pub fn resolve_parameters(&mut self, set: &mut ProgramSet, ctx: &BuildContext) -> Result<()> {
        match self {
            SubRenderState::Transform(state) => state.resolve_parameters(set, ctx),
            SubRenderState::Lighting(state) => state.resolve_parameters(set, ctx),
            SubRenderState::Texturing(state) => state.resolve_parameters(set, ctx),
            SubRenderState::Fog(state) => state.resolve_parameters(set, ctx),
            SubRenderState::ColorFinalize(state) => state.resolve_parameters(set, ctx),
        }
    }

    /// Phase D: register shader-library dependencies.
    pub fn resolve_dependencies(&self, set: &mut ProgramSet) {
        match self {
            SubRenderState::Transform(state) => state.resolve_dependencies(set),
            SubRenderState::Lighting(state) => state.resolve_dependencies(set),
            SubRenderState::Texturing(state) => state.resolve_dependencies(set),
            SubRenderState::Fog(state) => state.resolve_dependencies(set),
            SubRenderState::ColorFinalize(state) => state.resolve_dependencies(set),
        }
    }

    /// Phase E: append atoms at this state's stage-order groups.
    pub fn emit_atoms(&self, set: &mut ProgramSet, ctx: &BuildContext) -> Result<()> {
        match self {
            SubRenderState::Transform(state) => state.emit_atoms(set, ctx),
            SubRenderState::Lighting(state) => state.emit_atoms(set, ctx),
            SubRenderState::Texturing(state) => state.emit_atoms(set, ctx),
            SubRenderState::Fog(state) => state.emit_atoms(set, ctx),
            SubRenderState::ColorFinalize(state) => state.emit_atoms(set, ctx),
        }
    }
}
