//! Runtime shader generation for the Vesper engine.
//!
//! Given a material's fixed-function-style pass description, the generator
//! composes the applicable sub-render-states, lowers them into a symbolic
//! program pair, packs the vertex→fragment varyings against the hardware
//! budget, deduplicates the result in a content-addressed cache, and swaps
//! the compiled pair into a cloned technique before rendering.
//!
//! The engine proper stays on the other side of three narrow seams: the
//! [`pass::MaterialProvider`] it implements over its material system, the
//! [`rendersystem::RenderSystem`] it implements over its GPU backend, and
//! the optional material-script parsing surface on
//! [`states::Registry`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod generator;
pub mod ir;
pub mod pass;
pub mod pipeline;
pub mod rendersystem;
pub mod states;

pub use errors::{Result, RtssError};
pub use generator::{DEFAULT_SCHEME_NAME, EntryState, Scheme, ShaderGenerator};
pub use ir::{Program, ProgramSet};
pub use pass::{CompiledProgramId, MaterialProvider, PassDescriptor, TechniqueHandle};
pub use pipeline::{CompactPolicy, ProgramCache};
pub use rendersystem::{Capabilities, RenderSystem, TargetLanguage};
pub use states::{Registry, RenderState, SubRenderState};
