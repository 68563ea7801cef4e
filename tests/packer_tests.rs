//! Varying Packer Tests
//!
//! Compaction of vertex→fragment varyings against the hardware float4
//! budget:
//! - pairwise merge of four two-wide texcoords
//! - 3+1 merge-table selection with a padded remainder slot
//! - operand rewrites (parameter references and shifted component masks)
//! - the Low-policy early exit versus always-pack High
//! - budget overflow surfacing as a compaction failure

mod common;

use common::{build_compacted, build_uncompacted, textured_pass};
use vesper_rtss::errors::RtssError;
use vesper_rtss::ir::{Content, GpuType, Mask, Program, Semantic};
use vesper_rtss::pass::{PassDescriptor, TextureType, TextureUnitDesc};
use vesper_rtss::pipeline::CompactPolicy;
use vesper_rtss::rendersystem::Capabilities;
use vesper_rtss::states::stage;

fn texcoord_outputs(program: &Program) -> Vec<(u32, GpuType)> {
    program
        .main()
        .outputs()
        .iter()
        .filter(|&&id| program.param(id).semantic() == Some(Semantic::TexCoord))
        .map(|&id| {
            let param = program.param(id);
            (param.content().unwrap().1, param.ty)
        })
        .collect()
}

/// Component mask of the coordinate operand of the `n`-th sample atom.
fn sample_coord_masks(program: &Program) -> Vec<(Mask, u32)> {
    program
        .main()
        .ordered_atoms()
        .into_iter()
        .filter(|atom| atom.stage() == stage::FS_SAMPLING)
        .map(|atom| {
            let coord = atom.operands()[2];
            let (_, slot_index) = program.param(coord.param).content().unwrap();
            (coord.mask, slot_index)
        })
        .collect()
}

fn pass_with_texture_types(types: &[TextureType]) -> PassDescriptor {
    PassDescriptor {
        lighting: false,
        texture_units: types
            .iter()
            .map(|&texture_type| TextureUnitDesc {
                texture_type,
                ..TextureUnitDesc::default()
            })
            .collect(),
        ..PassDescriptor::default()
    }
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn four_float2_units_merge_pairwise() {
    let caps = Capabilities::default();
    let set = build_compacted(&textured_pass(4), &caps, [0, 0, 0], CompactPolicy::High).unwrap();

    assert_eq!(
        texcoord_outputs(&set.vertex),
        [(0, GpuType::Float4), (1, GpuType::Float4)]
    );

    // Fragment reads of the original texcoords are rewritten onto the
    // merged parameters with shifted masks: xy / zw per slot.
    let masks = sample_coord_masks(&set.fragment);
    assert_eq!(
        masks,
        [
            (Mask::X | Mask::Y, 0),
            (Mask::Z | Mask::W, 0),
            (Mask::X | Mask::Y, 1),
            (Mask::Z | Mask::W, 1),
        ]
    );

    // No split locals were needed.
    assert!(
        set.vertex
            .main()
            .locals()
            .iter()
            .all(|&id| !set.vertex.param(id).name.ends_with("_pack"))
    );
    assert!(set.vertex.validate().is_ok());
    assert!(set.fragment.validate().is_ok());
}

#[test]
fn three_two_one_uses_the_merge_table_then_pads() {
    // Widths {3, 2, 1}: the table packs 3+1, the remainder pass pads the 2.
    let caps = Capabilities::default();
    let pass =
        pass_with_texture_types(&[TextureType::Tex3d, TextureType::Tex2d, TextureType::Tex1d]);
    let set = build_compacted(&pass, &caps, [0, 0, 0], CompactPolicy::High).unwrap();

    assert_eq!(
        texcoord_outputs(&set.vertex),
        [(0, GpuType::Float4), (1, GpuType::Float4)]
    );

    let masks = sample_coord_masks(&set.fragment);
    assert_eq!(
        masks,
        [
            // Unit 0 (three-wide) leads slot 0.
            (Mask::X | Mask::Y | Mask::Z, 0),
            // Unit 1 (two-wide) pads slot 1.
            (Mask::X | Mask::Y, 1),
            // Unit 2 (one-wide) fills the tail lane of slot 0.
            (Mask::W, 0),
        ]
    );

    assert!(
        set.vertex
            .main()
            .locals()
            .iter()
            .all(|&id| !set.vertex.param(id).name.ends_with("_pack"))
    );
}

// ============================================================================
// Policy
// ============================================================================

#[test]
fn low_policy_skips_packing_when_within_budget() {
    let caps = Capabilities::default();
    let pass = textured_pass(2);

    let low = build_compacted(&pass, &caps, [0, 0, 0], CompactPolicy::Low).unwrap();
    assert_eq!(
        texcoord_outputs(&low.vertex),
        [(0, GpuType::Float2), (1, GpuType::Float2)]
    );

    let high = build_compacted(&pass, &caps, [0, 0, 0], CompactPolicy::High).unwrap();
    assert_eq!(texcoord_outputs(&high.vertex), [(0, GpuType::Float4)]);
}

#[test]
fn high_policy_packs_even_when_within_budget() {
    // Naive layout is four slots with a cap of eight; High merges anyway
    // and the result still validates.
    let caps = Capabilities::default();
    let set = build_compacted(&textured_pass(4), &caps, [0, 0, 0], CompactPolicy::High).unwrap();

    assert_eq!(texcoord_outputs(&set.vertex).len(), 2);
    assert!(set.vertex.validate().is_ok());
    assert!(set.fragment.validate().is_ok());

    let samples = sample_coord_masks(&set.fragment);
    assert_eq!(samples.len(), 4, "every unit still samples once");
}

#[test]
fn low_policy_still_packs_over_budget() {
    let mut caps = Capabilities::default();
    caps.max_varying_float4 = 5;
    // Naive: 1 diffuse + 8 texcoord slots; packed: 1 + 4.
    let set = build_compacted(&textured_pass(8), &caps, [0, 0, 0], CompactPolicy::Low).unwrap();
    assert_eq!(texcoord_outputs(&set.vertex).len(), 4);
}

// ============================================================================
// Budget overflow
// ============================================================================

#[test]
fn impossible_budget_aborts() {
    let mut caps = Capabilities::default();
    caps.max_varying_float4 = 2;
    // 1 diffuse slot + minimum 2 texcoord slots > 2.
    let result = build_compacted(&textured_pass(4), &caps, [0, 0, 0], CompactPolicy::High);
    assert!(matches!(
        result,
        Err(RtssError::CompactionImpossible { required: 3, available: 2 })
    ));
}

#[test]
fn eight_units_fit_an_eight_slot_budget() {
    let caps = Capabilities::default();
    let set = build_compacted(&textured_pass(8), &caps, [0, 0, 0], CompactPolicy::High).unwrap();

    // Eight two-wide texcoords pack into four float4 slots.
    assert_eq!(texcoord_outputs(&set.vertex).len(), 4);
    assert_eq!(sample_coord_masks(&set.fragment).len(), 8);
}

// ============================================================================
// Fog factor participates in packing
// ============================================================================

#[test]
fn fog_factor_packs_with_texcoords() {
    let mut pass = textured_pass(1);
    pass.fog.mode = vesper_rtss::pass::FogMode::Exp2;
    let caps = Capabilities::default();

    let before = build_uncompacted(&pass, &caps, [0, 0, 0]).unwrap();
    let fog_outputs: Vec<_> = before
        .vertex
        .main()
        .outputs()
        .iter()
        .filter(|&&id| {
            before.vertex.param(id).content().map(|(c, _)| c) == Some(Content::FogFactor)
        })
        .collect();
    assert_eq!(fog_outputs.len(), 1);

    // After packing, the two-wide texcoord and the one-wide fog factor
    // share a single slot.
    let after = build_compacted(&pass, &caps, [0, 0, 0], CompactPolicy::High).unwrap();
    assert_eq!(texcoord_outputs(&after.vertex), [(0, GpuType::Float4)]);

    // The fog blend now reads the packed lane.
    let fog_blend = after
        .fragment
        .main()
        .ordered_atoms()
        .into_iter()
        .find(|atom| atom.stage() == stage::FS_FOG)
        .expect("fog blend survives packing");
    let factor = fog_blend.operands()[3];
    assert_eq!(factor.mask, Mask::Z, "shifted past the two texcoord lanes");
}
