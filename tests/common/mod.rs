//! Shared test doubles: an in-memory material provider and a recording
//! render system.

// Each test binary pulls in the subset of helpers it needs.
#![allow(dead_code)]

use std::collections::HashMap;

use vesper_rtss::errors::{Result, RtssError};
use vesper_rtss::ir::{ProgramSet, Stage};
use vesper_rtss::pass::{
    CompiledProgramId, MaterialProvider, PassDescriptor, TechniqueHandle, TextureUnitDesc,
};
use vesper_rtss::pipeline::{CompactPolicy, ProgramBuilder, ProgramProcessor};
use vesper_rtss::rendersystem::{Capabilities, RenderSystem, TargetLanguage};
use vesper_rtss::states::{BuildContext, Registry, RenderState};

// ============================================================================
// Render system double
// ============================================================================

pub struct MockRenderSystem {
    pub language: TargetLanguage,
    pub caps: Capabilities,
    /// `(stage, source)` of every compile request, accepted or not.
    pub compile_requests: Vec<(Stage, String)>,
    pub destroyed: Vec<CompiledProgramId>,
    /// Reject compiles whose source contains this marker.
    pub reject_containing: Option<String>,
    /// Reject every compile of this stage.
    pub reject_stage: Option<Stage>,
    pub next_id: u64,
}

impl Default for MockRenderSystem {
    fn default() -> Self {
        MockRenderSystem {
            language: TargetLanguage::Glsl,
            caps: Capabilities::default(),
            compile_requests: Vec::new(),
            destroyed: Vec::new(),
            reject_containing: None,
            reject_stage: None,
            next_id: 1,
        }
    }
}

impl MockRenderSystem {
    pub fn compiles_of(&self, stage: Stage) -> usize {
        self.compile_requests
            .iter()
            .filter(|(s, _)| *s == stage)
            .count()
    }
}

impl RenderSystem for MockRenderSystem {
    fn target_language(&self) -> TargetLanguage {
        self.language
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn compile_program(
        &mut self,
        stage: Stage,
        source: &str,
        _language: TargetLanguage,
    ) -> Result<CompiledProgramId> {
        self.compile_requests.push((stage, source.to_owned()));
        if self.reject_stage == Some(stage) {
            return Err(RtssError::CompileFailed(format!("{stage:?} rejected")));
        }
        if let Some(marker) = &self.reject_containing
            && source.contains(marker.as_str())
        {
            return Err(RtssError::CompileFailed(format!(
                "unresolved include '{marker}'"
            )));
        }
        let id = CompiledProgramId(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    fn destroy_program(&mut self, id: CompiledProgramId) {
        self.destroyed.push(id);
    }
}

// ============================================================================
// Material provider double
// ============================================================================

#[derive(Default)]
pub struct MockProvider {
    pub passes: HashMap<String, PassDescriptor>,
    pub assigned: Vec<(TechniqueHandle, CompiledProgramId, CompiledProgramId)>,
    pub refuse_clone: bool,
    pub next_handle: u64,
}

impl MockProvider {
    pub fn with_pass(material: &str, pass: PassDescriptor) -> MockProvider {
        let mut provider = MockProvider::default();
        provider.passes.insert(material.to_owned(), pass);
        provider
    }

    pub fn set_pass(&mut self, material: &str, pass: PassDescriptor) {
        self.passes.insert(material.to_owned(), pass);
    }
}

impl MaterialProvider for MockProvider {
    fn pass_snapshot(
        &self,
        material: &str,
        _group: &str,
        pass_index: usize,
    ) -> Option<PassDescriptor> {
        if pass_index != 0 {
            return None;
        }
        self.passes.get(material).cloned()
    }

    fn clone_technique(
        &mut self,
        _material: &str,
        _group: &str,
        _scheme: &str,
    ) -> Option<TechniqueHandle> {
        if self.refuse_clone {
            return None;
        }
        self.next_handle += 1;
        Some(TechniqueHandle(self.next_handle))
    }

    fn assign_programs(
        &mut self,
        technique: TechniqueHandle,
        vertex: CompiledProgramId,
        fragment: CompiledProgramId,
    ) {
        self.assigned.push((technique, vertex, fragment));
    }
}

// ============================================================================
// Pass construction helpers
// ============================================================================

/// Pass with `n` plain 2D texture units and lighting disabled.
pub fn textured_pass(units: usize) -> PassDescriptor {
    PassDescriptor {
        lighting: false,
        texture_units: (0..units).map(|_| TextureUnitDesc::default()).collect(),
        ..PassDescriptor::default()
    }
}

/// Run compose → build → compact for a pass, outside the facade.
pub fn build_compacted(
    pass: &PassDescriptor,
    caps: &Capabilities,
    light_counts: [u32; 3],
    policy: CompactPolicy,
) -> Result<ProgramSet> {
    let registry = Registry::new();
    let mut render_state = RenderState::for_pass(&registry, pass, light_counts);
    let ctx = BuildContext {
        pass,
        caps,
        light_counts,
    };
    let mut set = ProgramBuilder::build(&mut render_state, &ctx)?;
    ProgramProcessor::compact_varyings(&mut set, policy, caps.max_varying_float4)?;
    Ok(set)
}

/// Run compose → build only (no compaction).
pub fn build_uncompacted(
    pass: &PassDescriptor,
    caps: &Capabilities,
    light_counts: [u32; 3],
) -> Result<ProgramSet> {
    let registry = Registry::new();
    let mut render_state = RenderState::for_pass(&registry, pass, light_counts);
    let ctx = BuildContext {
        pass,
        caps,
        light_counts,
    };
    ProgramBuilder::build(&mut render_state, &ctx)
}
