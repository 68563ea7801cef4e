//! Program Cache
//!
//! Content-addressed deduplication of finalized programs. The key is the
//! structural hash of the IR, never emitted text, so two materials whose
//! passes lower to the same structure share one compiled program per stage.
//!
//! Entries are reference counted: `intern` bumps the count on a hit and
//! finalizes (emit + compile) on a miss; `release` decrements and evicts at
//! zero, unregistering the compiled program from the render system. A
//! compile rejection is cached as a negative entry so identical requests
//! fail fast without re-emitting.

use rustc_hash::FxHashMap;

use crate::errors::{Result, RtssError};
use crate::ir::{Program, ProgramSet, Stage};
use crate::pass::CompiledProgramId;
use crate::pipeline::writer::ProgramWriter;
use crate::rendersystem::{RenderSystem, TargetLanguage};

#[derive(Debug)]
struct CacheEntry {
    stage: Stage,
    /// `None` marks a cached compile failure.
    compiled: Option<CompiledProgramId>,
    refcount: u32,
}

/// Cache references held by one generated technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternedPrograms {
    pub vertex_hash: u64,
    pub fragment_hash: u64,
    pub vertex_id: CompiledProgramId,
    pub fragment_id: CompiledProgramId,
}

/// Content-addressed store of finalized program pairs.
#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: FxHashMap<u64, CacheEntry>,
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> ProgramCache {
        ProgramCache::default()
    }

    /// Intern a finished program pair, consuming the builder's copy.
    ///
    /// Both halves are looked up by structural hash; hits bump the
    /// refcount, misses are emitted, compiled, and stored with refcount 1.
    /// A failed compile is stored as a negative entry and surfaces as
    /// [`RtssError::CompileFailed`], now and on every later identical
    /// request.
    pub fn intern(
        &mut self,
        set: ProgramSet,
        rendersystem: &mut dyn RenderSystem,
        language: TargetLanguage,
    ) -> Result<InternedPrograms> {
        set.vertex.validate()?;
        set.fragment.validate()?;

        let vertex_hash = set.vertex.structural_hash();
        let fragment_hash = set.fragment.structural_hash();

        let vertex_id = self.intern_one(&set.vertex, vertex_hash, rendersystem, language)?;
        let fragment_id =
            match self.intern_one(&set.fragment, fragment_hash, rendersystem, language) {
                Ok(id) => id,
                Err(err) => {
                    // Do not leak the vertex reference taken above.
                    self.release(vertex_hash, rendersystem);
                    return Err(err);
                }
            };

        Ok(InternedPrograms {
            vertex_hash,
            fragment_hash,
            vertex_id,
            fragment_id,
        })
    }

    fn intern_one(
        &mut self,
        program: &Program,
        hash: u64,
        rendersystem: &mut dyn RenderSystem,
        language: TargetLanguage,
    ) -> Result<CompiledProgramId> {
        if let Some(entry) = self.entries.get_mut(&hash) {
            return match entry.compiled {
                Some(id) => {
                    entry.refcount += 1;
                    log::debug!("program cache hit for {:?} {hash:#018x}", entry.stage);
                    Ok(id)
                }
                None => {
                    log::debug!("program cache negative hit for {hash:#018x}");
                    Err(RtssError::CompileFailed(format!(
                        "cached failure for program {hash:#018x}"
                    )))
                }
            };
        }

        let source = ProgramWriter::write(program, language);
        match rendersystem.compile_program(program.stage(), &source, language) {
            Ok(id) => {
                log::debug!(
                    "program cache miss: compiled {:?} {hash:#018x}",
                    program.stage()
                );
                self.entries.insert(
                    hash,
                    CacheEntry {
                        stage: program.stage(),
                        compiled: Some(id),
                        refcount: 1,
                    },
                );
                Ok(id)
            }
            Err(err) => {
                log::warn!(
                    "compilation failed for {:?} {hash:#018x}: {err}",
                    program.stage()
                );
                self.entries.insert(
                    hash,
                    CacheEntry {
                        stage: program.stage(),
                        compiled: None,
                        refcount: 0,
                    },
                );
                Err(RtssError::CompileFailed(err.to_string()))
            }
        }
    }

    /// Drop one reference to a cached program; at zero the entry is evicted
    /// and the compiled program destroyed. Negative entries stay pinned so
    /// they keep failing fast.
    pub fn release(&mut self, hash: u64, rendersystem: &mut dyn RenderSystem) {
        let Some(entry) = self.entries.get_mut(&hash) else {
            return;
        };
        let Some(id) = entry.compiled else {
            return;
        };
        debug_assert!(entry.refcount > 0, "release without matching intern");
        entry.refcount -= 1;
        if entry.refcount == 0 {
            self.entries.remove(&hash);
            rendersystem.destroy_program(id);
            log::debug!("evicted program {hash:#018x}");
        }
    }

    /// Number of cached entries, negative entries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Refcount of an entry, if present.
    #[must_use]
    pub fn refcount(&self, hash: u64) -> Option<u32> {
        self.entries.get(&hash).map(|entry| entry.refcount)
    }

    /// Whether the entry is a cached compile failure.
    #[must_use]
    pub fn is_failed(&self, hash: u64) -> bool {
        self.entries
            .get(&hash)
            .is_some_and(|entry| entry.compiled.is_none())
    }
}
