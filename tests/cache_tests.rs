//! Program Cache Tests
//!
//! Content-addressed deduplication and reference counting:
//! - identical structures intern once and share compiled programs
//! - refcounts rise on hits and fall back on release, evicting at zero
//! - compile rejections are cached negatively and fail fast afterwards
//! - vertex references taken before a fragment failure are rolled back

mod common;

use common::{MockRenderSystem, build_compacted, textured_pass};
use vesper_rtss::errors::RtssError;
use vesper_rtss::ir::Stage;
use vesper_rtss::pipeline::{CompactPolicy, ProgramCache};
use vesper_rtss::rendersystem::{Capabilities, RenderSystem, TargetLanguage};

fn built_set() -> vesper_rtss::ir::ProgramSet {
    build_compacted(
        &textured_pass(2),
        &Capabilities::default(),
        [0, 0, 0],
        CompactPolicy::High,
    )
    .unwrap()
}

// ============================================================================
// Dedup and refcounts
// ============================================================================

#[test]
fn identical_structures_intern_once() {
    let mut cache = ProgramCache::new();
    let mut rendersystem = MockRenderSystem::default();
    let language = rendersystem.target_language();

    let first = cache
        .intern(built_set(), &mut rendersystem, language)
        .unwrap();
    let second = cache
        .intern(built_set(), &mut rendersystem, language)
        .unwrap();

    assert_eq!(first, second, "hits return the same compiled pair");
    assert_eq!(cache.len(), 2, "one vertex and one fragment entry");
    assert_eq!(cache.refcount(first.vertex_hash), Some(2));
    assert_eq!(cache.refcount(first.fragment_hash), Some(2));
    assert_eq!(rendersystem.compiles_of(Stage::Vertex), 1);
    assert_eq!(rendersystem.compiles_of(Stage::Fragment), 1);
}

#[test]
fn release_evicts_at_zero_and_destroys() {
    let mut cache = ProgramCache::new();
    let mut rendersystem = MockRenderSystem::default();
    let language = rendersystem.target_language();

    let programs = cache
        .intern(built_set(), &mut rendersystem, language)
        .unwrap();
    cache
        .intern(built_set(), &mut rendersystem, language)
        .unwrap();

    cache.release(programs.vertex_hash, &mut rendersystem);
    assert_eq!(cache.refcount(programs.vertex_hash), Some(1));
    assert!(rendersystem.destroyed.is_empty());

    cache.release(programs.vertex_hash, &mut rendersystem);
    assert_eq!(cache.refcount(programs.vertex_hash), None);
    assert_eq!(rendersystem.destroyed, [programs.vertex_id]);
}

#[test]
fn different_structures_do_not_collide() {
    let mut cache = ProgramCache::new();
    let mut rendersystem = MockRenderSystem::default();
    let language = rendersystem.target_language();

    let two_units = cache
        .intern(built_set(), &mut rendersystem, language)
        .unwrap();
    let one_unit = cache
        .intern(
            build_compacted(
                &textured_pass(1),
                &Capabilities::default(),
                [0, 0, 0],
                CompactPolicy::High,
            )
            .unwrap(),
            &mut rendersystem,
            language,
        )
        .unwrap();

    assert_ne!(two_units.fragment_hash, one_unit.fragment_hash);
    assert_eq!(cache.len(), 4);
}

// ============================================================================
// Negative caching
// ============================================================================

#[test]
fn failed_compiles_are_cached_negatively() {
    let mut cache = ProgramCache::new();
    let mut rendersystem = MockRenderSystem {
        reject_stage: Some(Stage::Fragment),
        ..MockRenderSystem::default()
    };
    let language = TargetLanguage::Glsl;

    let first = cache.intern(built_set(), &mut rendersystem, language);
    assert!(matches!(first, Err(RtssError::CompileFailed(_))));
    assert_eq!(rendersystem.compiles_of(Stage::Fragment), 1);

    // The identical request fails fast without re-submitting the fragment.
    let second = cache.intern(built_set(), &mut rendersystem, language);
    assert!(matches!(second, Err(RtssError::CompileFailed(_))));
    assert_eq!(
        rendersystem.compiles_of(Stage::Fragment),
        1,
        "negative entry short-circuits the compile"
    );
}

#[test]
fn fragment_failure_rolls_back_the_vertex_reference() {
    let mut cache = ProgramCache::new();
    let mut rendersystem = MockRenderSystem {
        reject_stage: Some(Stage::Fragment),
        ..MockRenderSystem::default()
    };

    let result = cache.intern(built_set(), &mut rendersystem, TargetLanguage::Glsl);
    assert!(result.is_err());

    // Only the negative fragment entry remains; the vertex program was
    // released and destroyed rather than leaked.
    assert_eq!(cache.len(), 1);
    assert_eq!(rendersystem.destroyed.len(), 1);
}

#[test]
fn negative_entries_survive_release() {
    let mut cache = ProgramCache::new();
    let mut rendersystem = MockRenderSystem {
        reject_stage: Some(Stage::Fragment),
        ..MockRenderSystem::default()
    };
    let set = built_set();
    let fragment_hash = set.fragment.structural_hash();

    let _ = cache.intern(set, &mut rendersystem, TargetLanguage::Glsl);
    assert!(cache.is_failed(fragment_hash));

    cache.release(fragment_hash, &mut rendersystem);
    assert!(
        cache.is_failed(fragment_hash),
        "negative entries stay pinned for fail-fast"
    );
}

// ============================================================================
// Language routing
// ============================================================================

#[test]
fn emitted_source_follows_the_target_language() {
    let mut cache = ProgramCache::new();
    let mut rendersystem = MockRenderSystem {
        language: TargetLanguage::Hlsl,
        ..MockRenderSystem::default()
    };
    let language = rendersystem.target_language();

    cache
        .intern(built_set(), &mut rendersystem, language)
        .unwrap();
    let (_, vertex_source) = &rendersystem.compile_requests[0];
    assert!(vertex_source.contains("float4x4 worldviewproj_matrix;"));
    assert!(vertex_source.contains(".hlsl\""));
}
