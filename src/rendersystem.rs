//! Render System Seam
//!
//! The generator treats the GPU backend as an external collaborator: it
//! reads the target shader language and the capability set, submits emitted
//! source for compilation, and releases compiled programs it no longer
//! references. No GPU API types cross this boundary.

use bitflags::bitflags;

use crate::errors::Result;
use crate::ir::Stage;
use crate::pass::CompiledProgramId;

/// Shader language the render system expects. A small closed set; the
/// writer branches on it for surface syntax only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLanguage {
    Glsl,
    GlslEs,
    Hlsl,
}

bitflags! {
    /// Sampler families the hardware can bind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SamplerCaps: u8 {
        const TEX_1D = 0b0001;
        const TEX_2D = 0b0010;
        const TEX_3D = 0b0100;
        const CUBE = 0b1000;
    }
}

/// Capability set the generator consults during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub point_sprites: bool,
    /// Number of float4 varying slots between vertex and fragment stages.
    pub max_varying_float4: u32,
    pub sampler_types: SamplerCaps,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            point_sprites: true,
            max_varying_float4: 8,
            sampler_types: SamplerCaps::all(),
        }
    }
}

/// The GPU backend the generator submits finalized programs to.
///
/// Compilation is treated as synchronous; the facade never installs a
/// partially compiled pair.
pub trait RenderSystem {
    fn target_language(&self) -> TargetLanguage;

    fn capabilities(&self) -> Capabilities;

    /// Compile emitted source for one stage.
    fn compile_program(
        &mut self,
        stage: Stage,
        source: &str,
        language: TargetLanguage,
    ) -> Result<CompiledProgramId>;

    /// Release a compiled program the cache has evicted.
    fn destroy_program(&mut self, id: CompiledProgramId);
}
