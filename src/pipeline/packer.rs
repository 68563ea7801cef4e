//! Program Processor / Varying Packer
//!
//! Hardware caps the float4 slots interpolated between the vertex and
//! fragment stages; a naive lowering burns one slot per texture coordinate.
//! The packer rebuckets every texcoord-class varying by lane width, merges
//! them through a fixed table of preferred four-wide combinations, packs the
//! remainder into fresh slots (splitting a source across slot boundaries
//! when it does not fit), and rewrites every affected operand: parameter
//! references move to the merged varyings and component masks shift by the
//! source's lane offset. Atoms are never reordered.

use smallvec::SmallVec;

use crate::errors::{Result, RtssError};
use crate::ir::{
    Atom, AtomOp, Content, GpuType, Mask, Operand, ParamId, Parameter, Program, ProgramSet,
    Semantic,
};
use crate::states::stage;

/// How aggressively the packer compacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompactPolicy {
    /// Pack only when the naive layout exceeds the hardware budget.
    Low,
    /// Always pack, even when the naive layout already fits.
    High,
}

/// Preferred four-wide combinations, tried in order; each entry lists the
/// source widths it consumes. The trailing `[3]` lets three-wide varyings
/// keep a slot of their own.
const COMBINATIONS: &[&[u32]] = &[&[3, 1], &[2, 1, 1], &[4], &[2, 2], &[3]];

/// One landing site of a source inside the packed layout. An unsplit
/// source has a single part; a split source has one part per slot touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Part {
    slot: usize,
    /// Lane offset inside the slot.
    offset: u32,
    lanes: u32,
    /// First source lane this part carries.
    src_lane: u32,
}

/// Packed layout: slot widths plus, per source (in input order), the parts
/// it was placed into.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PackPlan {
    slot_widths: Vec<u32>,
    parts: Vec<SmallVec<[Part; 2]>>,
}

/// Greedy merge over [`COMBINATIONS`], then the remainder pass.
fn plan_pack(widths: &[u32]) -> PackPlan {
    let mut buckets: [Vec<usize>; 4] = Default::default();
    for (index, &width) in widths.iter().enumerate() {
        debug_assert!((1..=4).contains(&width));
        buckets[(width - 1) as usize].push(index);
    }
    // Consume FIFO within a width class.
    for bucket in &mut buckets {
        bucket.reverse();
    }

    let mut slot_widths = Vec::new();
    let mut parts: Vec<SmallVec<[Part; 2]>> = vec![SmallVec::new(); widths.len()];

    for combo in COMBINATIONS {
        loop {
            let mut needed = [0usize; 4];
            for &width in *combo {
                needed[(width - 1) as usize] += 1;
            }
            if needed
                .iter()
                .zip(&buckets)
                .any(|(&need, bucket)| bucket.len() < need)
            {
                break;
            }

            let slot = slot_widths.len();
            let mut offset = 0;
            for &width in *combo {
                let source = buckets[(width - 1) as usize].pop().expect("checked");
                parts[source].push(Part {
                    slot,
                    offset,
                    lanes: width,
                    src_lane: 0,
                });
                offset += width;
            }
            slot_widths.push(combo.iter().sum());
        }
    }

    // Remainder pass over the leftovers, in original source order.
    let mut leftovers: Vec<usize> = buckets.into_iter().flatten().collect();
    leftovers.sort_unstable();
    pack_remainder(&leftovers, widths, &mut slot_widths, &mut parts);

    PackPlan { slot_widths, parts }
}

/// Pack leftover sources into fresh four-wide slots, splitting a source
/// across consecutive slots when it does not fit the lanes left.
fn pack_remainder(
    leftovers: &[usize],
    widths: &[u32],
    slot_widths: &mut Vec<u32>,
    parts: &mut [SmallVec<[Part; 2]>],
) {
    let mut used = 4;
    for &source in leftovers {
        let mut remaining = widths[source];
        let mut src_lane = 0;
        while remaining > 0 {
            if used == 4 {
                slot_widths.push(4);
                used = 0;
            }
            let lanes = remaining.min(4 - used);
            parts[source].push(Part {
                slot: slot_widths.len() - 1,
                offset: used,
                lanes,
                src_lane,
            });
            used += lanes;
            remaining -= lanes;
            src_lane += lanes;
        }
    }
}

/// One packable varying: the vertex output and, when resolved, the
/// matching fragment input.
struct VaryingSource {
    vs_id: ParamId,
    fs_id: Option<ParamId>,
    width: u32,
    name: String,
}

pub struct ProgramProcessor;

impl ProgramProcessor {
    /// Compact the vertex→fragment varyings of a built program set.
    ///
    /// Fails with [`RtssError::CompactionImpossible`] when even the densest
    /// packing exceeds `max_slots`.
    pub fn compact_varyings(
        set: &mut ProgramSet,
        policy: CompactPolicy,
        max_slots: u32,
    ) -> Result<()> {
        let sources = collect_sources(set);
        let fixed_slots = fixed_slot_count(&set.vertex);

        if sources.is_empty() {
            if fixed_slots > max_slots {
                return Err(RtssError::CompactionImpossible {
                    required: fixed_slots,
                    available: max_slots,
                });
            }
            return Ok(());
        }

        let total_floats: u32 = sources.iter().map(|s| s.width).sum();
        let min_slots = fixed_slots + total_floats.div_ceil(4);
        if min_slots > max_slots {
            return Err(RtssError::CompactionImpossible {
                required: min_slots,
                available: max_slots,
            });
        }

        let naive_slots = fixed_slots + sources.len() as u32;
        if policy == CompactPolicy::Low && naive_slots <= max_slots {
            log::debug!("compaction skipped: {naive_slots}/{max_slots} slots used");
            return Ok(());
        }

        let widths: Vec<u32> = sources.iter().map(|s| s.width).collect();
        let plan = plan_pack(&widths);

        let packed_slots = fixed_slots + plan.slot_widths.len() as u32;
        if packed_slots > max_slots {
            return Err(RtssError::CompactionImpossible {
                required: packed_slots,
                available: max_slots,
            });
        }

        // Materialize one merged varying per slot on both sides.
        let vs_slots: Vec<ParamId> = plan
            .slot_widths
            .iter()
            .enumerate()
            .map(|(index, &width)| {
                set.vertex.add_output_raw(Parameter::output(
                    Content::TextureCoordinate,
                    index as u32,
                    GpuType::float_vec(width),
                ))
            })
            .collect();
        let fs_slots: Vec<ParamId> = plan
            .slot_widths
            .iter()
            .enumerate()
            .map(|(index, &width)| {
                set.fragment.add_input_raw(Parameter::input(
                    Content::TextureCoordinate,
                    index as u32,
                    GpuType::float_vec(width),
                ))
            })
            .collect();

        for (source, parts) in sources.iter().zip(&plan.parts) {
            if let [part] = parts.as_slice() {
                rewrite_refs(
                    &mut set.vertex,
                    source.vs_id,
                    vs_slots[part.slot],
                    part.offset,
                    source.width,
                );
                if let Some(fs_id) = source.fs_id {
                    rewrite_refs(
                        &mut set.fragment,
                        fs_id,
                        fs_slots[part.slot],
                        part.offset,
                        source.width,
                    );
                }
            } else {
                split_source(set, source, parts, &vs_slots, &fs_slots)?;
            }
        }

        for source in &sources {
            set.vertex.delete_output(source.vs_id);
            if let Some(fs_id) = source.fs_id {
                set.fragment.delete_input(fs_id);
            }
        }

        log::debug!(
            "compacted {} varyings into {} slots ({packed_slots}/{max_slots} total)",
            sources.len(),
            plan.slot_widths.len()
        );
        Ok(())
    }
}

/// Texcoord-class vertex outputs paired with their fragment inputs, in
/// output-list order.
fn collect_sources(set: &ProgramSet) -> Vec<VaryingSource> {
    let mut sources = Vec::new();
    for &vs_id in set.vertex.main().outputs() {
        let param = set.vertex.param(vs_id);
        if param.semantic() != Some(Semantic::TexCoord) {
            continue;
        }
        let width = param.ty.lane_count().expect("varyings are float vectors");
        let identity = param.content().expect("outputs carry content");
        let fs_id = set
            .fragment
            .main()
            .inputs()
            .iter()
            .copied()
            .find(|&id| set.fragment.param(id).content() == Some(identity));
        sources.push(VaryingSource {
            vs_id,
            fs_id,
            width,
            name: param.name.clone(),
        });
    }
    sources
}

/// Varying slots consumed by non-packable outputs (colors); clip-space
/// position is a system value and costs nothing.
fn fixed_slot_count(vertex: &Program) -> u32 {
    vertex
        .main()
        .outputs()
        .iter()
        .filter(|&&id| {
            !matches!(
                vertex.param(id).semantic(),
                Some(Semantic::Position | Semantic::TexCoord)
            )
        })
        .count() as u32
}

/// Repoint every reference of `old` at `new`, shifting masks by the lane
/// offset. A full mask is narrowed to the source width before shifting.
fn rewrite_refs(program: &mut Program, old: ParamId, new: ParamId, offset: u32, width: u32) {
    for atom in program.atoms_mut() {
        for operand in atom.operands_mut() {
            if operand.param == old {
                operand.param = new;
                let mask = if operand.mask == Mask::ALL && width < 4 {
                    Mask::from_width(width)
                } else {
                    operand.mask
                };
                operand.mask = mask.shifted_left(offset);
            }
        }
    }
}

/// Preserve the illusion of one logical varying for a source split across
/// slots: a local stands in on both sides, recombined into the merged
/// outputs after vertex emission and decomposed from the merged inputs
/// before first fragment use.
fn split_source(
    set: &mut ProgramSet,
    source: &VaryingSource,
    parts: &[Part],
    vs_slots: &[ParamId],
    fs_slots: &[ParamId],
) -> Result<()> {
    let ty = GpuType::float_vec(source.width);

    let vs_local = set
        .vertex
        .resolve_local(ty, &format!("{}_pack", source.name))?;
    rewrite_refs(&mut set.vertex, source.vs_id, vs_local, 0, source.width);
    for part in parts {
        set.vertex.push_atom(Atom::new(
            AtomOp::Assign,
            stage::VS_POST_PROCESS,
            [
                Operand::write(
                    vs_slots[part.slot],
                    Mask::from_width(part.lanes).shifted_left(part.offset),
                ),
                Operand::read(
                    vs_local,
                    Mask::from_width(part.lanes).shifted_left(part.src_lane),
                ),
            ],
        )?);
    }

    if let Some(fs_id) = source.fs_id {
        let fs_local = set
            .fragment
            .resolve_local(ty, &format!("{}_pack", source.name))?;
        rewrite_refs(&mut set.fragment, fs_id, fs_local, 0, source.width);
        for part in parts {
            set.fragment.push_atom(Atom::new(
                AtomOp::Assign,
                stage::FS_PRE_PROCESS,
                [
                    Operand::write(
                        fs_local,
                        Mask::from_width(part.lanes).shifted_left(part.src_lane),
                    ),
                    Operand::read(
                        fs_slots[part.slot],
                        Mask::from_width(part.lanes).shifted_left(part.offset),
                    ),
                ],
            )?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(parts: &SmallVec<[Part; 2]>) -> Part {
        assert_eq!(parts.len(), 1, "expected an unsplit source: {parts:?}");
        parts[0]
    }

    #[test]
    fn four_float2_merge_pairwise() {
        let plan = plan_pack(&[2, 2, 2, 2]);
        assert_eq!(plan.slot_widths, [4, 4]);
        assert_eq!(single(&plan.parts[0]), Part { slot: 0, offset: 0, lanes: 2, src_lane: 0 });
        assert_eq!(single(&plan.parts[1]), Part { slot: 0, offset: 2, lanes: 2, src_lane: 0 });
        assert_eq!(single(&plan.parts[2]), Part { slot: 1, offset: 0, lanes: 2, src_lane: 0 });
        assert_eq!(single(&plan.parts[3]), Part { slot: 1, offset: 2, lanes: 2, src_lane: 0 });
    }

    #[test]
    fn three_plus_one_wins_over_remainder() {
        // {3, 2, 1}: the 3+1 combination packs first, the 2 pads a fresh
        // four-wide remainder slot.
        let plan = plan_pack(&[3, 2, 1]);
        assert_eq!(plan.slot_widths, [4, 4]);
        assert_eq!(single(&plan.parts[0]), Part { slot: 0, offset: 0, lanes: 3, src_lane: 0 });
        assert_eq!(single(&plan.parts[2]), Part { slot: 0, offset: 3, lanes: 1, src_lane: 0 });
        assert_eq!(single(&plan.parts[1]), Part { slot: 1, offset: 0, lanes: 2, src_lane: 0 });
    }

    #[test]
    fn lone_three_keeps_its_own_slot() {
        let plan = plan_pack(&[3, 3]);
        assert_eq!(plan.slot_widths, [3, 3]);
    }

    #[test]
    fn two_one_one_combination() {
        let plan = plan_pack(&[1, 2, 1]);
        assert_eq!(plan.slot_widths, [4]);
        assert_eq!(single(&plan.parts[1]), Part { slot: 0, offset: 0, lanes: 2, src_lane: 0 });
        assert_eq!(single(&plan.parts[0]), Part { slot: 0, offset: 2, lanes: 1, src_lane: 0 });
        assert_eq!(single(&plan.parts[2]), Part { slot: 0, offset: 3, lanes: 1, src_lane: 0 });
    }

    #[test]
    fn remainder_splits_across_slot_boundaries() {
        // Drive the remainder pass directly with a leftover set the merge
        // table cannot produce, to exercise the split bookkeeping.
        let widths = [3, 2];
        let mut slot_widths = Vec::new();
        let mut parts: Vec<SmallVec<[Part; 2]>> = vec![SmallVec::new(); widths.len()];
        pack_remainder(&[0, 1], &widths, &mut slot_widths, &mut parts);

        assert_eq!(slot_widths, [4, 4]);
        assert_eq!(single(&parts[0]), Part { slot: 0, offset: 0, lanes: 3, src_lane: 0 });
        assert_eq!(
            parts[1].as_slice(),
            [
                Part { slot: 0, offset: 3, lanes: 1, src_lane: 0 },
                Part { slot: 1, offset: 0, lanes: 1, src_lane: 1 },
            ]
        );
    }

    #[test]
    fn single_width_two_pads_one_slot() {
        let plan = plan_pack(&[2]);
        assert_eq!(plan.slot_widths, [4]);
        assert_eq!(single(&plan.parts[0]), Part { slot: 0, offset: 0, lanes: 2, src_lane: 0 });
    }
}
