//! Program Cache
//!
//! Owner of every [`CompiledProgram`]. Programs live in a [`SlotMap`] and are
//! addressed through [`ProgramHandle`]s; synthesized programs are additionally
//! indexed by [`FeatureKey`] so that one permutation is only ever built once.
//!
//! # Reference counting
//!
//! Each entry carries the number of outstanding acquisitions. [`ProgramCache::get_or_create`]
//! and [`ProgramCache::acquire`] increment it, [`ProgramCache::release`] decrements it,
//! and the entry (with its backend objects) is destroyed when it reaches zero.
//!
//! User-authored programs are inserted with [`ProgramCache::insert_exclusive`]. They
//! share the storage but never the key index, so two materials with identical text
//! still get two programs.

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::RenderBackend;
use crate::renderer::command_list::CommandListRecorder;
use crate::renderer::program::{CompileOptions, CompiledProgram};
use crate::resources::feature_key::FeatureKey;

new_key_type! {
    /// Handle of a program owned by a [`ProgramCache`].
    pub struct ProgramHandle;
}

#[derive(Debug)]
struct CacheEntry {
    program: CompiledProgram,
    refs: usize,
}

#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: SlotMap<ProgramHandle, CacheEntry>,
    lookup: FxHashMap<FeatureKey, ProgramHandle>,
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Acquisition ──────────────────────────────────────────────────────────

    /// Returns the program for `key`, creating an uncompiled one on a miss.
    ///
    /// The returned handle holds one reference. Equal keys always yield the same
    /// handle while any reference is outstanding.
    pub fn get_or_create(&mut self, key: FeatureKey) -> Result<ProgramHandle> {
        if let Some(&handle) = self.lookup.get(&key)
            && let Some(entry) = self.programs.get_mut(handle)
        {
            entry.refs += 1;
            log::debug!("Program cache hit for {key} ({} refs)", entry.refs);
            return Ok(handle);
        }

        let program = CompiledProgram::synthesized(key)?;
        let handle = self.programs.insert(CacheEntry { program, refs: 1 });
        self.lookup.insert(key, handle);
        log::debug!("Program cache miss for {key}, created {handle:?}");
        Ok(handle)
    }

    /// Stores a program that is owned by a single referent and never shared by key.
    pub fn insert_exclusive(&mut self, program: CompiledProgram) -> ProgramHandle {
        let handle = self.programs.insert(CacheEntry { program, refs: 1 });
        log::debug!("Stored exclusive program {handle:?}");
        handle
    }

    /// Adds a reference to a live program.
    pub fn acquire(&mut self, handle: ProgramHandle) -> Result<()> {
        let entry = self
            .programs
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("program"))?;
        entry.refs += 1;
        Ok(())
    }

    /// Drops one reference. Returns `true` when this freed the program.
    ///
    /// Releasing a handle the cache no longer holds is a [`ShaderError::StaleRelease`]
    /// and never touches the backend.
    pub fn release(
        &mut self,
        handle: ProgramHandle,
        backend: &mut dyn RenderBackend,
    ) -> Result<bool> {
        let Some(entry) = self.programs.get_mut(handle) else {
            log::error!("Release of stale program handle {handle:?}");
            return Err(ShaderError::StaleRelease);
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(false);
        }

        let Some(mut entry) = self.programs.remove(handle) else {
            return Ok(false);
        };
        let key = entry.program.key();
        if self.lookup.get(&key) == Some(&handle) {
            self.lookup.remove(&key);
        }
        entry.program.release(backend);
        log::debug!("Destroyed program {key} ({handle:?})");
        Ok(true)
    }

    // ── Access ───────────────────────────────────────────────────────────────

    #[must_use]
    pub fn get(&self, handle: ProgramHandle) -> Option<&CompiledProgram> {
        self.programs.get(handle).map(|entry| &entry.program)
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: ProgramHandle) -> Option<&mut CompiledProgram> {
        self.programs.get_mut(handle).map(|entry| &mut entry.program)
    }

    /// Handle currently indexed under `key`, without taking a reference.
    #[must_use]
    pub fn lookup(&self, key: FeatureKey) -> Option<ProgramHandle> {
        self.lookup.get(&key).copied()
    }

    #[must_use]
    pub fn ref_count(&self, handle: ProgramHandle) -> usize {
        self.programs.get(handle).map_or(0, |entry| entry.refs)
    }

    #[must_use]
    pub fn contains(&self, handle: ProgramHandle) -> bool {
        self.programs.contains_key(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProgramHandle, &CompiledProgram)> {
        self.programs.iter().map(|(handle, entry)| (handle, &entry.program))
    }

    // ── Compilation ──────────────────────────────────────────────────────────

    pub fn compile(
        &mut self,
        handle: ProgramHandle,
        backend: &mut dyn RenderBackend,
        recorder: &mut CommandListRecorder,
        options: &CompileOptions,
    ) -> Result<()> {
        let program = self
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("program"))?;
        program.compile(backend, recorder, options)
    }

    /// Returns every program to `Uncompiled`, for example after a context change.
    pub fn invalidate_all(&mut self, backend: &mut dyn RenderBackend) {
        for entry in self.programs.values_mut() {
            entry.program.invalidate(backend);
        }
    }

    /// Checks that nothing is still referenced.
    ///
    /// Referenced programs are left alive and reported as
    /// [`ShaderError::StillReferenced`].
    pub fn teardown(&mut self) -> Result<()> {
        let count = self.programs.len();
        if count == 0 {
            return Ok(());
        }
        for (handle, entry) in &self.programs {
            log::error!(
                "Program {} ({handle:?}) still has {} references at teardown",
                entry.program.key(),
                entry.refs
            );
        }
        Err(ShaderError::StillReferenced {
            what: "programs",
            count,
        })
    }
}
