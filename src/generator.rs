//! Shader Generator Facade
//!
//! Public entry point of the runtime shader generation system. The
//! generator owns the factory registry, the scheme table, the program
//! cache, and one state-machine entry per `(material, group, scheme)`
//! technique it has produced:
//!
//! ```text
//! Uninitialized ──request──▶ Generated ──pass change──▶ Stale
//!       ▲                        ▲                        │
//!       │                        └───────rebuild──────────┘
//!       └─────────── explicit invalidate (any state)
//! ```
//!
//! Any surfaced build error is recoverable here: the entry parks in the
//! terminal `Failed` state, the failure is logged once, and every later
//! request falls back to the source material's original technique.
//!
//! All operations run on the render thread between frames; a build is an
//! atomic unit and entry versions grow monotonically.

use rustc_hash::FxHashMap;

use crate::errors::RtssError;
use crate::pass::{MaterialProvider, TechniqueHandle};
use crate::pipeline::{
    CompactPolicy, InternedPrograms, ProgramBuilder, ProgramCache, ProgramProcessor,
};
use crate::rendersystem::{RenderSystem, TargetLanguage};
use crate::states::{BuildContext, Registry, RenderState};

/// Name of the scheme installed at construction.
pub const DEFAULT_SCHEME_NAME: &str = "Default";

/// Per-scheme generation knobs.
#[derive(Debug, Clone, Copy)]
pub struct Scheme {
    /// Override of the render system's target language, if any.
    pub language_override: Option<TargetLanguage>,
    pub compact_policy: CompactPolicy,
    /// Directional / point / spot light counts granted to each pass.
    pub light_cap: [u32; 3],
}

impl Default for Scheme {
    fn default() -> Self {
        Scheme {
            language_override: None,
            compact_policy: CompactPolicy::High,
            light_cap: [2, 2, 2],
        }
    }
}

/// Lifecycle of one `(material, group, scheme)` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Uninitialized,
    Generated,
    Stale,
    /// Terminal: requests keep falling back to the original technique.
    Failed,
}

#[derive(Debug, Default)]
struct TechniqueEntry {
    state: Option<EntryState>,
    technique: Option<TechniqueHandle>,
    programs: Option<InternedPrograms>,
    version: u64,
}

impl TechniqueEntry {
    fn state(&self) -> EntryState {
        self.state.unwrap_or(EntryState::Uninitialized)
    }
}

type EntryKey = (String, String, String);

/// Process-wide shader generation state. Created once at engine
/// initialization, owned like any other renderer subsystem, torn down after
/// all materials using it are released.
pub struct ShaderGenerator {
    registry: Registry,
    cache: ProgramCache,
    schemes: FxHashMap<String, Scheme>,
    entries: FxHashMap<EntryKey, TechniqueEntry>,
}

impl Default for ShaderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderGenerator {
    /// Generator with the built-in factories and the default scheme.
    #[must_use]
    pub fn new() -> ShaderGenerator {
        let mut schemes = FxHashMap::default();
        schemes.insert(DEFAULT_SCHEME_NAME.to_owned(), Scheme::default());
        ShaderGenerator {
            registry: Registry::new(),
            cache: ProgramCache::new(),
            schemes,
            entries: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable registry access, for extension factories. Factories must be
    /// registered before the first build.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    #[must_use]
    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    /// Install or replace a scheme configuration.
    pub fn set_scheme(&mut self, name: &str, scheme: Scheme) {
        self.schemes.insert(name.to_owned(), scheme);
    }

    #[must_use]
    pub fn scheme(&self, name: &str) -> Option<&Scheme> {
        self.schemes.get(name)
    }

    /// Lifecycle state of an entry, if the generator has seen it.
    #[must_use]
    pub fn entry_state(&self, material: &str, group: &str, scheme: &str) -> Option<EntryState> {
        self.entries
            .get(&entry_key(material, group, scheme))
            .map(TechniqueEntry::state)
    }

    /// Build version of an entry; grows monotonically across rebuilds.
    #[must_use]
    pub fn entry_version(&self, material: &str, group: &str, scheme: &str) -> u64 {
        self.entries
            .get(&entry_key(material, group, scheme))
            .map_or(0, |entry| entry.version)
    }

    // ── Hook point ───────────────────────────────────────────────────────────

    /// Resolve the best technique for a material under a scheme.
    ///
    /// Returns the shader-generated technique clone when one exists or can
    /// be built; `None` means the caller must use the material's original
    /// technique.
    pub fn best_technique(
        &mut self,
        material: &str,
        group: &str,
        scheme_name: &str,
        provider: &mut dyn MaterialProvider,
        rendersystem: &mut dyn RenderSystem,
    ) -> Option<TechniqueHandle> {
        let Some(scheme) = self.schemes.get(scheme_name).copied() else {
            log::debug!("no scheme '{scheme_name}' registered; using original technique");
            return None;
        };
        let key = entry_key(material, group, scheme_name);

        match self.entries.get(&key).map(TechniqueEntry::state) {
            Some(EntryState::Generated) => {
                return self.entries[&key].technique;
            }
            Some(EntryState::Failed) => return None,
            Some(EntryState::Stale) => {
                // Old references go first so refcounts stay exact across
                // the invalidate-then-rebuild cycle.
                if let Some(programs) = self
                    .entries
                    .get_mut(&key)
                    .and_then(|entry| entry.programs.take())
                {
                    self.cache.release(programs.vertex_hash, rendersystem);
                    self.cache.release(programs.fragment_hash, rendersystem);
                }
            }
            Some(EntryState::Uninitialized) | None => {}
        }

        let Some(pass) = provider.pass_snapshot(material, group, 0) else {
            log::debug!("no pass snapshot for '{material}' ({group}); using original technique");
            return None;
        };

        let caps = rendersystem.capabilities();
        let language = scheme
            .language_override
            .unwrap_or_else(|| rendersystem.target_language());
        let light_counts = scheme.light_cap;

        let mut render_state = RenderState::for_pass(&self.registry, &pass, light_counts);
        let ctx = BuildContext {
            pass: &pass,
            caps: &caps,
            light_counts,
        };

        let built = ProgramBuilder::build(&mut render_state, &ctx).and_then(|mut set| {
            ProgramProcessor::compact_varyings(&mut set, scheme.compact_policy, caps.max_varying_float4)?;
            self.cache.intern(set, rendersystem, language)
        });

        let interned = match built {
            Ok(interned) => interned,
            Err(err) => {
                debug_assert!(
                    !matches!(err, RtssError::InternalInvariant(_)),
                    "internal invariant surfaced from build: {err}"
                );
                self.fail_entry(key, &err);
                return None;
            }
        };

        let Some(technique) = provider.clone_technique(material, group, scheme_name) else {
            self.cache.release(interned.vertex_hash, rendersystem);
            self.cache.release(interned.fragment_hash, rendersystem);
            self.fail_entry(key, &RtssError::CompileFailed("technique clone refused".into()));
            return None;
        };
        provider.assign_programs(technique, interned.vertex_id, interned.fragment_id);

        let entry = self.entries.entry(key).or_default();
        entry.state = Some(EntryState::Generated);
        entry.technique = Some(technique);
        entry.programs = Some(interned);
        entry.version += 1;
        log::debug!(
            "generated technique for '{material}' ({group}/{scheme_name}), version {}",
            entry.version
        );
        Some(technique)
    }

    fn fail_entry(&mut self, key: EntryKey, err: &RtssError) {
        let (material, group, scheme) = &key;
        log::error!(
            "shader generation failed for '{material}' ({group}/{scheme}), \
             falling back to the original technique: {err}"
        );
        let entry = self.entries.entry(key.clone()).or_default();
        entry.state = Some(EntryState::Failed);
        entry.technique = None;
        entry.programs = None;
    }

    // ── Invalidation ─────────────────────────────────────────────────────────

    /// Note that a pass (or one of its texture units) changed: generated
    /// entries of the material go stale and rebuild on their next request.
    pub fn notify_pass_changed(&mut self, material: &str, group: &str) {
        for ((entry_material, entry_group, _), entry) in &mut self.entries {
            if entry_material == material
                && entry_group == group
                && entry.state() == EntryState::Generated
            {
                entry.state = Some(EntryState::Stale);
            }
        }
    }

    /// Explicitly reset an entry from any state, releasing its cache
    /// references.
    pub fn invalidate(
        &mut self,
        material: &str,
        group: &str,
        scheme: &str,
        rendersystem: &mut dyn RenderSystem,
    ) {
        let key = entry_key(material, group, scheme);
        if let Some(entry) = self.entries.get_mut(&key) {
            if let Some(programs) = entry.programs.take() {
                self.cache.release(programs.vertex_hash, rendersystem);
                self.cache.release(programs.fragment_hash, rendersystem);
            }
            entry.state = Some(EntryState::Uninitialized);
            entry.technique = None;
        }
    }

    /// Tear down every entry, releasing all cache references. Called when
    /// the engine shuts the generator down after materials are released.
    pub fn invalidate_all(&mut self, rendersystem: &mut dyn RenderSystem) {
        let entries = std::mem::take(&mut self.entries);
        for (_, entry) in entries {
            if let Some(programs) = entry.programs {
                self.cache.release(programs.vertex_hash, rendersystem);
                self.cache.release(programs.fragment_hash, rendersystem);
            }
        }
    }
}

fn entry_key(material: &str, group: &str, scheme: &str) -> EntryKey {
    (material.to_owned(), group.to_owned(), scheme.to_owned())
}
