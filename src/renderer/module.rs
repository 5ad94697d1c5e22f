//! Shader Module
//!
//! The per-context object every compile and bind goes through. It is created once
//! per rendering context by the embedding application and owns:
//!
//! - the backend capabilities and vendor hints read at creation
//! - the [`ProgramCache`]
//! - the [`CommandListRecorder`] guarding the single-writer rule
//!
//! Nothing in the subsystem keeps global program state; functions that need the
//! cache take a `&mut ShaderModule`.

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::{BackendCaps, RenderBackend};
use crate::renderer::cache::{ProgramCache, ProgramHandle};
use crate::renderer::command_list::CommandListRecorder;
use crate::renderer::dialect::{Dialect, VendorHints, VendorId, select_dialect};
use crate::renderer::program::{CompileOptions, CompiledProgram, ProgramSources};
use crate::renderer::settings::ShaderModuleSettings;
use crate::resources::feature_key::FeatureKey;
use crate::utils::interner;

#[derive(Debug)]
pub struct ShaderModule {
    settings: ShaderModuleSettings,
    caps: BackendCaps,
    vendor: VendorId,
    hints: VendorHints,
    cache: ProgramCache,
    recorder: CommandListRecorder,
}

impl ShaderModule {
    /// Queries `backend` once for capabilities and vendor.
    pub fn new(settings: ShaderModuleSettings, backend: &dyn RenderBackend) -> Self {
        interner::preload_builtin_uniforms();
        let caps = backend.capabilities();
        let vendor = detect_vendor(&settings, backend);
        let hints = VendorHints::for_vendor(vendor);
        log::debug!("Shader module on {vendor:?} with {caps:?}");
        Self {
            settings,
            caps,
            vendor,
            hints,
            cache: ProgramCache::new(),
            recorder: CommandListRecorder::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Context information
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn settings(&self) -> &ShaderModuleSettings {
        &self.settings
    }

    #[must_use]
    pub fn capabilities(&self) -> BackendCaps {
        self.caps
    }

    #[must_use]
    pub fn vendor(&self) -> VendorId {
        self.vendor
    }

    #[must_use]
    pub fn hints(&self) -> VendorHints {
        self.hints
    }

    /// Dialect new programs will be synthesized in.
    pub fn dialect(&self) -> Result<Dialect> {
        select_dialect(self.caps, self.settings.preferred_dialect())
    }

    /// Whether materials should record their bind sequence.
    #[must_use]
    pub fn records_command_lists(&self) -> bool {
        self.settings.use_command_lists() && self.caps.contains(BackendCaps::COMMAND_LISTS)
    }

    #[must_use]
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            caps: self.caps,
            hints: self.hints,
            preferred_dialect: self.settings.preferred_dialect(),
            force_recompile: self.settings.force_recompile,
            use_command_lists: self.settings.use_command_lists(),
            log_sources: self.settings.log_sources,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    #[must_use]
    pub fn recorder(&self) -> &CommandListRecorder {
        &self.recorder
    }

    /// Cache and recorder together, for code that compiles while recording.
    pub fn parts_mut(&mut self) -> (&mut ProgramCache, &mut CommandListRecorder) {
        (&mut self.cache, &mut self.recorder)
    }

    #[must_use]
    pub fn program(&self, handle: ProgramHandle) -> Option<&CompiledProgram> {
        self.cache.get(handle)
    }

    // ------------------------------------------------------------------------
    // Programs
    // ------------------------------------------------------------------------

    /// Looks up or creates the program for `key` and compiles it.
    ///
    /// On success the caller holds one reference. A failed compile gives the
    /// reference back, so a freshly created program does not linger in the cache.
    pub fn acquire_program(
        &mut self,
        key: FeatureKey,
        backend: &mut dyn RenderBackend,
    ) -> Result<ProgramHandle> {
        let handle = self.cache.get_or_create(key)?;
        self.compile_held(handle, backend)
    }

    /// Stores and compiles a user-authored program owned by one material.
    pub fn acquire_user_program(
        &mut self,
        sources: ProgramSources,
        backend: &mut dyn RenderBackend,
    ) -> Result<ProgramHandle> {
        let program = CompiledProgram::from_sources(sources)?;
        let handle = self.cache.insert_exclusive(program);
        self.compile_held(handle, backend)
    }

    fn compile_held(
        &mut self,
        handle: ProgramHandle,
        backend: &mut dyn RenderBackend,
    ) -> Result<ProgramHandle> {
        let options = self.compile_options();
        match self
            .cache
            .compile(handle, backend, &mut self.recorder, &options)
        {
            Ok(()) => Ok(handle),
            Err(err) => {
                self.cache.release(handle, backend)?;
                Err(err)
            }
        }
    }

    /// Compiles a program the caller already holds. A no-op when it is compiled.
    pub fn compile_program(
        &mut self,
        handle: ProgramHandle,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let options = self.compile_options();
        self.cache
            .compile(handle, backend, &mut self.recorder, &options)
    }

    /// Adds a reference to a program already held.
    pub fn retain_program(&mut self, handle: ProgramHandle) -> Result<()> {
        self.cache.acquire(handle)
    }

    pub fn release_program(
        &mut self,
        handle: ProgramHandle,
        backend: &mut dyn RenderBackend,
    ) -> Result<bool> {
        self.cache.release(handle, backend)
    }

    /// Replaces the text of a user-authored program and recompiles it if it changed.
    pub fn replace_program_sources(
        &mut self,
        handle: ProgramHandle,
        sources: ProgramSources,
        backend: &mut dyn RenderBackend,
    ) -> Result<bool> {
        let options = self.compile_options();
        let program = self
            .cache
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("program"))?;
        if !program.replace_sources(backend, sources)? {
            return Ok(false);
        }
        program.compile(backend, &mut self.recorder, &options)?;
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Re-queries the backend after a context change and drops every backend object.
    ///
    /// Capabilities, vendor and vendor hints are all taken from the new context;
    /// a configured vendor override still wins. Programs recompile lazily with
    /// their fixed dialect; a program whose dialect is gone reports
    /// [`DialectUnavailable`](crate::errors::ShaderError::DialectUnavailable).
    pub fn refresh_capabilities(&mut self, backend: &mut dyn RenderBackend) {
        self.caps = backend.capabilities();
        self.vendor = detect_vendor(&self.settings, backend);
        self.hints = VendorHints::for_vendor(self.vendor);
        self.cache.invalidate_all(backend);
        log::debug!(
            "Shader module refreshed on {:?} with {:?}",
            self.vendor,
            self.caps
        );
    }

    /// Verifies that every program has been released.
    pub fn teardown(&mut self) -> Result<()> {
        self.cache.teardown()
    }
}

fn detect_vendor(settings: &ShaderModuleSettings, backend: &dyn RenderBackend) -> VendorId {
    settings
        .vendor_override
        .unwrap_or_else(|| VendorId::from_vendor_string(&backend.vendor()))
}
