//! Compiled Programs
//!
//! A [`CompiledProgram`] pairs the source text of one permutation (synthesized from a
//! [`FeatureKey`] or supplied by the user) with the backend objects built from it.
//!
//! # State machine
//!
//! ```text
//! Uncompiled ──compile()──▶ Compiling ──ok──▶ Compiled
//!     ▲                         │                │
//!     └────────── error ────────┘                │
//!     └──────── invalidate() / release() ────────┘
//! ```
//!
//! `compile()` on a `Compiled` program is a no-op unless forced. A failed compile
//! leaves nothing allocated on the backend.

use xxhash_rust::xxh3::xxh3_128;

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::{
    BackendCaps, CommandListId, ProgramBinding, ProgramObjectId, RenderBackend, ShaderObjectId,
    ShaderStage,
};
use crate::renderer::command_list::CommandListRecorder;
use crate::renderer::dialect::{Dialect, VendorHints, detect_source_dialect, select_dialect};
use crate::renderer::synth::{self, SynthesizedSource};
use crate::resources::feature_key::FeatureKey;
use crate::resources::uniforms::ShaderUniforms;
use crate::resources::version_tracker::ChangeTracker;

// ============================================================================
// Built-in uniforms
// ============================================================================

/// Constants every synthesized program may read at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinUniform {
    /// Rendered-to-original size ratio of the first bound texture.
    TextureScaling,
    /// Per-axis `0.5 / size` of the colour lookup table.
    LookupOffsets,
    /// Per-axis `(size - 1) / size` of the colour lookup table.
    LookupScales,
    /// Texel spacing used by finite-difference volume normals.
    NormalScaling,
    /// Viewport size of the previous depth layer.
    TextureSize,
}

impl BuiltinUniform {
    /// Uniform name in the modern dialect.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TextureScaling => "texture_scaling",
            Self::LookupOffsets => "lookup_offsets",
            Self::LookupScales => "lookup_scales",
            Self::NormalScaling => "normal_scaling",
            Self::TextureSize => "texturesize",
        }
    }

    /// `program.env[]` slot in the legacy dialect.
    #[must_use]
    pub const fn legacy_env_index(self) -> u32 {
        match self {
            Self::TextureScaling => 0,
            Self::LookupOffsets => 1,
            Self::LookupScales => 2,
            Self::NormalScaling => 3,
            Self::TextureSize => 4,
        }
    }

    /// Legacy program targets that read this parameter.
    #[must_use]
    pub const fn legacy_stages(self) -> &'static [ShaderStage] {
        match self {
            Self::TextureScaling => &[ShaderStage::Vertex, ShaderStage::Fragment],
            _ => &[ShaderStage::Fragment],
        }
    }
}

/// Texture unit of the previous depth layer.
pub const DEPTH_LAYER_UNIT: u32 = 3;

const SAMPLER_UNITS: [(&str, i32); 4] = [
    ("texture0", 0),
    ("texture1", 1),
    ("texture2", 2),
    ("samplertex", DEPTH_LAYER_UNIT as i32),
];

// ============================================================================
// Sources
// ============================================================================

const DEFAULT_MODERN_VERTEX: &str = "\
void main()
{
  gl_Position = ftransform();
  gl_FrontColor = gl_Color;
  gl_TexCoord[0] = gl_MultiTexCoord0;
}
";

const DEFAULT_MODERN_FRAGMENT: &str = "\
void main()
{
  gl_FragColor = gl_Color;
}
";

const DEFAULT_LEGACY_VERTEX: &str = "!!ARBvp1.0
DP4\t\tresult.position.x, state.matrix.mvp.row[0], vertex.position;
DP4\t\tresult.position.y, state.matrix.mvp.row[1], vertex.position;
DP4\t\tresult.position.z, state.matrix.mvp.row[2], vertex.position;
DP4\t\tresult.position.w, state.matrix.mvp.row[3], vertex.position;
MOV\t\tresult.color, vertex.color;
MOV\t\tresult.texcoord[0], vertex.texcoord[0];
END
";

const DEFAULT_LEGACY_FRAGMENT: &str = "!!ARBfp1.0
MOV\t\tresult.color, fragment.color;
END
";

/// Program text for each stage.
///
/// For user-authored programs a missing vertex or fragment string is replaced by a
/// pass-through in the same dialect as the string that is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramSources {
    pub vertex: Option<String>,
    pub fragment: Option<String>,
    pub geometry: Option<String>,
}

impl ProgramSources {
    #[must_use]
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: Some(vertex.into()),
            fragment: Some(fragment.into()),
            geometry: None,
        }
    }

    #[must_use]
    pub fn with_geometry(mut self, geometry: impl Into<String>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertex.is_none() && self.fragment.is_none() && self.geometry.is_none()
    }

    /// Dialect the supplied text is written in, or `None` when only defaults are used.
    ///
    /// Vertex and fragment text must agree, and a geometry stage needs the modern
    /// dialect.
    pub fn source_dialect(&self) -> Result<Option<Dialect>> {
        let vertex = self.vertex.as_deref().map(detect_source_dialect);
        let fragment = self.fragment.as_deref().map(detect_source_dialect);
        let dialect = match (vertex, fragment) {
            (Some(v), Some(f)) if v != f => {
                return Err(ShaderError::InvalidArgument(format!(
                    "vertex source is {v:?} but fragment source is {f:?}"
                )));
            }
            (Some(d), _) | (None, Some(d)) => Some(d),
            (None, None) => None,
        };
        if self.geometry.is_some() && dialect == Some(Dialect::Legacy) {
            return Err(ShaderError::InvalidArgument(
                "geometry stages need the modern dialect".into(),
            ));
        }
        Ok(dialect)
    }

    /// Text to compile for `dialect`, with defaults filled in.
    fn resolve(&self, dialect: Dialect) -> (&str, &str, Option<&str>) {
        let (vertex, fragment) = match dialect {
            Dialect::Legacy => (DEFAULT_LEGACY_VERTEX, DEFAULT_LEGACY_FRAGMENT),
            Dialect::Modern => (DEFAULT_MODERN_VERTEX, DEFAULT_MODERN_FRAGMENT),
        };
        (
            self.vertex.as_deref().unwrap_or(vertex),
            self.fragment.as_deref().unwrap_or(fragment),
            self.geometry.as_deref(),
        )
    }

    /// xxh3-128 over every stage, distinguishing absent from empty text.
    #[must_use]
    pub fn fingerprint(&self) -> u128 {
        let mut bytes = Vec::new();
        for stage in [&self.vertex, &self.fragment, &self.geometry] {
            match stage {
                Some(text) => {
                    bytes.push(1);
                    bytes.extend_from_slice(text.as_bytes());
                }
                None => bytes.push(0),
            }
            bytes.push(0xff);
        }
        xxh3_128(&bytes)
    }
}

impl From<SynthesizedSource> for ProgramSources {
    fn from(source: SynthesizedSource) -> Self {
        Self {
            vertex: Some(source.vertex),
            fragment: Some(source.fragment),
            geometry: source.geometry,
        }
    }
}

// ============================================================================
// Compiled program
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProgramState {
    #[default]
    Uncompiled,
    Compiling,
    Compiled,
}

/// Everything `compile()` needs to know about the context.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    pub caps: BackendCaps,
    pub hints: VendorHints,
    pub preferred_dialect: Option<Dialect>,
    pub force_recompile: bool,
    /// Record the activation sequence when the backend supports command lists.
    pub use_command_lists: bool,
    pub log_sources: bool,
}

impl CompileOptions {
    #[must_use]
    pub fn for_caps(caps: BackendCaps) -> Self {
        Self {
            caps,
            hints: VendorHints::default(),
            preferred_dialect: None,
            force_recompile: false,
            use_command_lists: true,
            log_sources: false,
        }
    }

    fn records_command_lists(&self) -> bool {
        self.use_command_lists && self.caps.contains(BackendCaps::COMMAND_LISTS)
    }
}

/// Backend objects owned by a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendObjects {
    Linked {
        program: ProgramObjectId,
        vertex: ShaderObjectId,
        fragment: ShaderObjectId,
        geometry: Option<ShaderObjectId>,
    },
    Assembly {
        vertex: ShaderObjectId,
        fragment: ShaderObjectId,
    },
}

impl BackendObjects {
    fn binding(self) -> ProgramBinding {
        match self {
            Self::Linked { program, .. } => ProgramBinding::Linked(program),
            Self::Assembly { vertex, fragment } => ProgramBinding::Assembly { vertex, fragment },
        }
    }

    fn destroy(self, backend: &mut dyn RenderBackend) {
        match self {
            Self::Linked {
                program,
                vertex,
                fragment,
                geometry,
            } => {
                backend.delete_program(program);
                backend.delete_shader(vertex);
                backend.delete_shader(fragment);
                if let Some(geometry) = geometry {
                    backend.delete_shader(geometry);
                }
            }
            Self::Assembly { vertex, fragment } => {
                backend.delete_shader(vertex);
                backend.delete_shader(fragment);
            }
        }
    }
}

/// Objects allocated so far by an in-progress compile, freed on failure.
#[derive(Default)]
struct PartialObjects {
    shaders: Vec<ShaderObjectId>,
    program: Option<ProgramObjectId>,
}

impl PartialObjects {
    fn destroy(self, backend: &mut dyn RenderBackend) {
        if let Some(program) = self.program {
            backend.delete_program(program);
        }
        for shader in self.shaders {
            backend.delete_shader(shader);
        }
    }
}

/// One shader permutation and its backend objects.
#[derive(Debug)]
pub struct CompiledProgram {
    key: FeatureKey,
    dialect: Option<Dialect>,
    sources: ProgramSources,
    fingerprint: u128,
    state: ProgramState,
    objects: Option<BackendObjects>,
    command_list: Option<CommandListId>,
    builds: ChangeTracker,
    /// Vendor hints the synthesized source was generated with.
    source_hints: Option<VendorHints>,
}

impl CompiledProgram {
    /// An uncompiled program whose source will be synthesized from `key`.
    ///
    /// The specified-strings sentinel is rejected; use [`CompiledProgram::from_sources`].
    pub fn synthesized(key: FeatureKey) -> Result<Self> {
        if key.is_specified_strings() {
            return Err(ShaderError::UserSourceSynthesis);
        }
        Ok(Self::empty(key, ProgramSources::default()))
    }

    /// An uncompiled user-authored program.
    pub fn from_sources(sources: ProgramSources) -> Result<Self> {
        sources.source_dialect()?;
        Ok(Self::empty(FeatureKey::SPECIFIED_STRINGS, sources))
    }

    fn empty(key: FeatureKey, sources: ProgramSources) -> Self {
        Self {
            key,
            dialect: None,
            fingerprint: sources.fingerprint(),
            sources,
            state: ProgramState::Uncompiled,
            objects: None,
            command_list: None,
            builds: ChangeTracker::new(),
            source_hints: None,
        }
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn key(&self) -> FeatureKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn is_user_source(&self) -> bool {
        self.key.is_specified_strings()
    }

    /// Dialect fixed by the first successful compile.
    #[inline]
    #[must_use]
    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ProgramState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.state == ProgramState::Compiled
    }

    /// Source text; empty for a synthesized program that has never compiled.
    #[must_use]
    pub fn sources(&self) -> &ProgramSources {
        &self.sources
    }

    #[must_use]
    pub fn fingerprint(&self) -> u128 {
        self.fingerprint
    }

    /// Bumped by every successful build.
    ///
    /// Anything recorded against this program's backend objects is stale once
    /// the generation moves past the value seen at recording time.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.builds.version()
    }

    #[must_use]
    pub fn command_list(&self) -> Option<CommandListId> {
        self.command_list
    }

    #[must_use]
    pub fn binding(&self) -> Option<ProgramBinding> {
        self.objects.map(BackendObjects::binding)
    }

    /// Linked program object, for uniform writes in the modern dialect.
    #[must_use]
    pub fn linked_program(&self) -> Option<ProgramObjectId> {
        match self.objects {
            Some(BackendObjects::Linked { program, .. }) => Some(program),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Builds the backend objects for this program.
    ///
    /// A no-op when already compiled unless `options.force_recompile` is set. On
    /// failure the state is `Uncompiled` and nothing stays allocated.
    pub fn compile(
        &mut self,
        backend: &mut dyn RenderBackend,
        recorder: &mut CommandListRecorder,
        options: &CompileOptions,
    ) -> Result<()> {
        if self.state == ProgramState::Compiled {
            if !options.force_recompile {
                return Ok(());
            }
            self.release(backend);
        }

        self.state = ProgramState::Compiling;
        match self.build(backend, recorder, options) {
            Ok(()) => {
                self.state = ProgramState::Compiled;
                Ok(())
            }
            Err(err) => {
                self.state = ProgramState::Uncompiled;
                match &err {
                    ShaderError::BackendCompile { .. } | ShaderError::Link { .. } => {
                        log::error!("Program {} failed: {err}", self.key);
                    }
                    _ => log::warn!("Program {} not compiled: {err}", self.key),
                }
                Err(err)
            }
        }
    }

    fn resolve_dialect(&self, options: &CompileOptions) -> Result<Dialect> {
        let fixed = match self.dialect {
            Some(dialect) => Some(dialect),
            None => self.sources.source_dialect()?.filter(|_| self.is_user_source()),
        };
        match fixed {
            Some(dialect) if dialect.is_supported(options.caps) => Ok(dialect),
            Some(dialect) => Err(ShaderError::DialectUnavailable(dialect)),
            None => select_dialect(options.caps, options.preferred_dialect),
        }
    }

    fn build(
        &mut self,
        backend: &mut dyn RenderBackend,
        recorder: &mut CommandListRecorder,
        options: &CompileOptions,
    ) -> Result<()> {
        let dialect = self.resolve_dialect(options)?;

        let stale = self.sources.source_dialect().ok().flatten() != Some(dialect)
            || self.source_hints != Some(options.hints);
        if !self.is_user_source() && stale {
            let source = synth::synthesize(self.key, dialect, options.hints)?;
            self.sources = source.into();
            self.fingerprint = self.sources.fingerprint();
            self.source_hints = Some(options.hints);
        }
        if options.log_sources {
            let (vertex, fragment, geometry) = self.sources.resolve(dialect);
            log::trace!("Program {} vertex source:\n{vertex}", self.key);
            log::trace!("Program {} fragment source:\n{fragment}", self.key);
            if let Some(geometry) = geometry {
                log::trace!("Program {} geometry source:\n{geometry}", self.key);
            }
        }

        let mut partial = PartialObjects::default();
        let objects = match self.allocate(backend, dialect, options.caps, &mut partial) {
            Ok(objects) => objects,
            Err(err) => {
                partial.destroy(backend);
                return Err(err);
            }
        };

        let command_list = if options.records_command_lists() {
            match record_activation(backend, recorder, objects) {
                Ok(list) => Some(list),
                Err(err) => {
                    objects.destroy(backend);
                    return Err(err);
                }
            }
        } else {
            None
        };

        self.dialect = Some(dialect);
        self.objects = Some(objects);
        self.command_list = command_list;
        self.builds.changed();
        log::debug!(
            "Compiled {dialect:?} program {} (command list: {})",
            self.key,
            command_list.is_some()
        );
        Ok(())
    }

    fn allocate(
        &self,
        backend: &mut dyn RenderBackend,
        dialect: Dialect,
        caps: BackendCaps,
        partial: &mut PartialObjects,
    ) -> Result<BackendObjects> {
        let (vertex_text, fragment_text, geometry_text) = self.sources.resolve(dialect);
        if geometry_text.is_some() && !caps.contains(BackendCaps::GEOMETRY_SHADERS) {
            return Err(ShaderError::InvalidArgument(
                "backend has no geometry stage".into(),
            ));
        }

        let vertex = compile_stage(backend, dialect, ShaderStage::Vertex, vertex_text, partial)?;
        let fragment =
            compile_stage(backend, dialect, ShaderStage::Fragment, fragment_text, partial)?;

        if dialect == Dialect::Legacy {
            return Ok(BackendObjects::Assembly { vertex, fragment });
        }

        let geometry = match geometry_text {
            Some(text) => Some(compile_stage(
                backend,
                dialect,
                ShaderStage::Geometry,
                text,
                partial,
            )?),
            None => None,
        };

        let program = backend
            .create_program()
            .ok_or_else(|| ShaderError::Resource("program object".into()))?;
        partial.program = Some(program);
        for shader in [Some(vertex), Some(fragment), geometry].into_iter().flatten() {
            backend.attach_shader(program, shader);
        }
        let report = backend.link_program(program);
        if !report.success {
            return Err(ShaderError::Link { log: report.log });
        }

        Ok(BackendObjects::Linked {
            program,
            vertex,
            fragment,
            geometry,
        })
    }

    /// Makes this program current, replaying its command list when it has one.
    pub fn activate(&self, backend: &mut dyn RenderBackend) -> Result<()> {
        let objects = match (self.state, self.objects) {
            (ProgramState::Compiled, Some(objects)) => objects,
            _ => return Err(ShaderError::NotCompiled),
        };
        match self.command_list {
            Some(list) => backend.call_command_list(list),
            None => activation_sequence(backend, objects),
        }
        Ok(())
    }

    /// Writes a built-in constant the way the program's dialect reads it.
    pub fn write_builtin(
        &self,
        backend: &mut dyn RenderBackend,
        uniform: BuiltinUniform,
        value: [f32; 4],
    ) {
        match self.objects {
            Some(BackendObjects::Linked { program, .. }) => {
                backend.set_uniform_f32(program, uniform.name(), &value);
            }
            Some(BackendObjects::Assembly { .. }) => {
                for stage in uniform.legacy_stages() {
                    backend.set_program_env(*stage, uniform.legacy_env_index(), value);
                }
            }
            None => {}
        }
    }

    /// Writes a user uniform set. Assembly programs have no named uniforms.
    pub fn write_uniforms(&self, backend: &mut dyn RenderBackend, uniforms: &ShaderUniforms) {
        if let Some(program) = self.linked_program() {
            uniforms.write_to(backend, program);
        }
    }

    /// Replaces the text of a user-authored program.
    ///
    /// Identical text keeps the program compiled. Different text frees the backend
    /// objects and returns the program to `Uncompiled`. Returns whether it changed.
    pub fn replace_sources(
        &mut self,
        backend: &mut dyn RenderBackend,
        sources: ProgramSources,
    ) -> Result<bool> {
        if !self.is_user_source() {
            return Err(ShaderError::InvalidArgument(format!(
                "program {} is synthesized, its sources cannot be replaced",
                self.key
            )));
        }
        let dialect = sources.source_dialect()?;
        let fingerprint = sources.fingerprint();
        if fingerprint == self.fingerprint {
            return Ok(false);
        }
        self.release(backend);
        self.dialect = dialect;
        self.sources = sources;
        self.fingerprint = fingerprint;
        Ok(true)
    }

    /// Drops the backend objects so the next `compile()` rebuilds them.
    ///
    /// Key, dialect and source text are kept.
    pub fn invalidate(&mut self, backend: &mut dyn RenderBackend) {
        if self.release(backend) {
            log::debug!("Invalidated program {}", self.key);
        }
    }

    /// Frees every backend object exactly once. Returns whether anything was freed.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) -> bool {
        let mut freed = false;
        if let Some(list) = self.command_list.take() {
            backend.delete_command_list(list);
            freed = true;
        }
        if let Some(objects) = self.objects.take() {
            objects.destroy(backend);
            freed = true;
        }
        self.state = ProgramState::Uncompiled;
        freed
    }
}

fn compile_stage(
    backend: &mut dyn RenderBackend,
    dialect: Dialect,
    stage: ShaderStage,
    source: &str,
    partial: &mut PartialObjects,
) -> Result<ShaderObjectId> {
    let shader = backend
        .create_shader(dialect, stage)
        .ok_or_else(|| ShaderError::Resource(format!("{stage:?} shader object")))?;
    partial.shaders.push(shader);
    let report = backend.compile_shader(shader, source);
    if report.success {
        Ok(shader)
    } else {
        Err(ShaderError::BackendCompile {
            stage,
            log: report.log,
        })
    }
}

/// Binds the program and points its samplers at their texture units.
fn activation_sequence(backend: &mut dyn RenderBackend, objects: BackendObjects) {
    backend.use_program(objects.binding());
    if let BackendObjects::Linked { program, .. } = objects {
        for (name, unit) in SAMPLER_UNITS {
            backend.set_uniform_i32(program, name, unit);
        }
    }
}

fn record_activation(
    backend: &mut dyn RenderBackend,
    recorder: &mut CommandListRecorder,
    objects: BackendObjects,
) -> Result<CommandListId> {
    let list = backend
        .create_command_list()
        .ok_or_else(|| ShaderError::Resource("command list".into()))?;
    if let Err(err) = recorder.record(backend, list, |backend| {
        activation_sequence(backend, objects);
        Ok(())
    }) {
        backend.delete_command_list(list);
        return Err(err);
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::RecordingBackend;

    fn options(backend: &RecordingBackend) -> CompileOptions {
        CompileOptions::for_caps(backend.capabilities())
    }

    fn textured_key() -> FeatureKey {
        FeatureKey::PER_PIXEL_LIGHTING | FeatureKey::colour_texture(2, 4, false).unwrap()
    }

    #[test]
    fn compile_is_idempotent() {
        let mut backend = RecordingBackend::full();
        let mut recorder = CommandListRecorder::new();
        let mut program = CompiledProgram::synthesized(textured_key()).unwrap();

        let opts = options(&backend);
        program.compile(&mut backend, &mut recorder, &opts).unwrap();
        assert!(program.is_compiled());
        assert_eq!(program.dialect(), Some(Dialect::Modern));
        let allocations = backend.allocations();

        let opts = options(&backend);
        program.compile(&mut backend, &mut recorder, &opts).unwrap();
        assert_eq!(backend.allocations(), allocations);
    }

    #[test]
    fn force_recompile_rebuilds_without_leaking() {
        let mut backend = RecordingBackend::full();
        let mut recorder = CommandListRecorder::new();
        let mut program = CompiledProgram::synthesized(textured_key()).unwrap();
        let opts = options(&backend);
        program.compile(&mut backend, &mut recorder, &opts).unwrap();
        let live = (backend.live_shaders(), backend.live_programs(), backend.live_command_lists());

        let forced = CompileOptions {
            force_recompile: true,
            ..options(&backend)
        };
        let allocations = backend.allocations();
        let generation = program.generation();
        program.compile(&mut backend, &mut recorder, &forced).unwrap();
        assert!(backend.allocations() > allocations);
        assert_eq!(program.generation(), generation + 1);
        assert_eq!(
            (backend.live_shaders(), backend.live_programs(), backend.live_command_lists()),
            live
        );
    }

    #[test]
    fn compile_failure_frees_partial_objects() {
        let mut backend = RecordingBackend::full();
        backend.fail_compile_containing(Some("gl_FragColor"));
        let mut recorder = CommandListRecorder::new();
        let mut program = CompiledProgram::synthesized(textured_key()).unwrap();

        let opts = options(&backend);
        let err = program
            .compile(&mut backend, &mut recorder, &opts)
            .unwrap_err();
        assert!(matches!(
            err,
            ShaderError::BackendCompile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert_eq!(program.state(), ProgramState::Uncompiled);
        assert_eq!(backend.live_shaders(), 0);
        assert_eq!(backend.live_programs(), 0);
        assert_eq!(program.dialect(), None);
    }

    #[test]
    fn link_failure_reports_log() {
        let mut backend = RecordingBackend::full();
        backend.set_fail_link(true);
        let mut recorder = CommandListRecorder::new();
        let mut program = CompiledProgram::synthesized(textured_key()).unwrap();

        let opts = options(&backend);
        let err = program
            .compile(&mut backend, &mut recorder, &opts)
            .unwrap_err();
        assert!(matches!(err, ShaderError::Link { ref log } if log.contains("varying")));
        assert_eq!(backend.live_shaders() + backend.live_programs(), 0);
    }

    #[test]
    fn refused_allocation_is_resource_error() {
        let mut backend = RecordingBackend::full();
        backend.set_refuse_allocations(true);
        let mut recorder = CommandListRecorder::new();
        let mut program = CompiledProgram::synthesized(textured_key()).unwrap();
        let opts = options(&backend);
        let err = program
            .compile(&mut backend, &mut recorder, &opts)
            .unwrap_err();
        assert!(matches!(err, ShaderError::Resource(_)));
    }

    #[test]
    fn legacy_program_binds_assembly_pair() {
        let mut backend = RecordingBackend::new(BackendCaps::LEGACY_PROGRAMS);
        let mut recorder = CommandListRecorder::new();
        let mut program = CompiledProgram::synthesized(textured_key()).unwrap();
        let opts = options(&backend);
        program.compile(&mut backend, &mut recorder, &opts).unwrap();

        assert_eq!(program.dialect(), Some(Dialect::Legacy));
        assert!(program.command_list().is_none());
        assert!(program.sources().vertex.as_deref().unwrap().starts_with("!!ARBvp1.0"));

        program.activate(&mut backend).unwrap();
        assert!(matches!(backend.active_program(), ProgramBinding::Assembly { .. }));

        program.write_builtin(&mut backend, BuiltinUniform::TextureScaling, [1.0, 2.0, 1.0, 1.0]);
        assert_eq!(
            backend.program_env(ShaderStage::Vertex, 0),
            Some([1.0, 2.0, 1.0, 1.0])
        );
        assert_eq!(
            backend.program_env(ShaderStage::Fragment, 0),
            Some([1.0, 2.0, 1.0, 1.0])
        );
    }

    #[test]
    fn command_list_replays_activation() {
        let mut backend = RecordingBackend::full();
        let mut recorder = CommandListRecorder::new();
        let mut program = CompiledProgram::synthesized(textured_key()).unwrap();
        let opts = options(&backend);
        program.compile(&mut backend, &mut recorder, &opts).unwrap();

        let list = program.command_list().unwrap();
        assert!(!recorder.is_recording());
        program.activate(&mut backend).unwrap();
        assert_eq!(backend.active_program(), program.binding().unwrap());

        let program_id = program.linked_program().unwrap();
        assert_eq!(backend.uniform(program_id, "texture0"), Some(&[0.0][..]));
        assert!(backend.command_list(list).is_some());
    }

    #[test]
    fn activate_requires_compile() {
        let mut backend = RecordingBackend::full();
        let program = CompiledProgram::synthesized(textured_key()).unwrap();
        assert!(matches!(
            program.activate(&mut backend),
            Err(ShaderError::NotCompiled)
        ));
    }

    #[test]
    fn release_frees_exactly_once() {
        let mut backend = RecordingBackend::full();
        let mut recorder = CommandListRecorder::new();
        let mut program = CompiledProgram::synthesized(textured_key()).unwrap();
        let opts = options(&backend);
        program.compile(&mut backend, &mut recorder, &opts).unwrap();

        assert!(program.release(&mut backend));
        assert!(!program.release(&mut backend));
        assert_eq!(backend.invalid_deletes(), 0);
        assert_eq!(backend.live_shaders() + backend.live_programs(), 0);
        assert_eq!(backend.live_command_lists(), 0);
    }

    #[test]
    fn sentinel_key_cannot_be_synthesized() {
        assert!(matches!(
            CompiledProgram::synthesized(FeatureKey::SPECIFIED_STRINGS),
            Err(ShaderError::UserSourceSynthesis)
        ));
    }

    #[test]
    fn user_sources_detect_dialect() {
        let legacy = ProgramSources::new("!!ARBvp1.0\nEND\n", "!!ARBfp1.0\nEND\n");
        assert_eq!(legacy.source_dialect().unwrap(), Some(Dialect::Legacy));

        let mixed = ProgramSources::new("!!ARBvp1.0\nEND\n", "void main() {}");
        assert!(matches!(
            mixed.source_dialect(),
            Err(ShaderError::InvalidArgument(_))
        ));

        let geometry = ProgramSources {
            vertex: Some("!!ARBvp1.0\nEND\n".into()),
            ..Default::default()
        }
        .with_geometry("void main() {}");
        assert!(geometry.source_dialect().is_err());
    }

    #[test]
    fn missing_fragment_falls_back_to_default() {
        let mut backend = RecordingBackend::full();
        let mut recorder = CommandListRecorder::new();
        let sources = ProgramSources {
            vertex: Some("!!ARBvp1.0\nMOV result.position, vertex.position;\nEND\n".into()),
            ..Default::default()
        };
        let mut program = CompiledProgram::from_sources(sources).unwrap();
        let opts = options(&backend);
        program.compile(&mut backend, &mut recorder, &opts).unwrap();

        assert_eq!(program.dialect(), Some(Dialect::Legacy));
        let fragment_compiled = backend.calls().iter().any(|call| match call {
            crate::renderer::backend::BackendCall::CreateShader { shader, stage, .. } => {
                *stage == ShaderStage::Fragment
                    && backend.shader_source(*shader) == Some(DEFAULT_LEGACY_FRAGMENT)
            }
            _ => false,
        });
        assert!(fragment_compiled);
    }

    #[test]
    fn user_program_on_unsupported_dialect() {
        let mut backend = RecordingBackend::new(BackendCaps::MODERN_SHADING);
        let mut recorder = CommandListRecorder::new();
        let mut program =
            CompiledProgram::from_sources(ProgramSources::new("!!ARBvp1.0\nEND\n", "!!ARBfp1.0\nEND\n"))
                .unwrap();
        let opts = options(&backend);
        assert!(matches!(
            program.compile(&mut backend, &mut recorder, &opts),
            Err(ShaderError::DialectUnavailable(Dialect::Legacy))
        ));
    }

    #[test]
    fn replacing_identical_sources_keeps_program_compiled() {
        let mut backend = RecordingBackend::full();
        let mut recorder = CommandListRecorder::new();
        let sources = ProgramSources::new("void main() { gl_Position = ftransform(); }", "void main() {}");
        let mut program = CompiledProgram::from_sources(sources.clone()).unwrap();
        let opts = options(&backend);
        program.compile(&mut backend, &mut recorder, &opts).unwrap();

        assert!(!program.replace_sources(&mut backend, sources).unwrap());
        assert!(program.is_compiled());

        let changed = ProgramSources::new("void main() { gl_Position = vec4(0.0); }", "void main() {}");
        assert!(program.replace_sources(&mut backend, changed).unwrap());
        assert_eq!(program.state(), ProgramState::Uncompiled);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn fingerprint_distinguishes_missing_from_empty() {
        let empty = ProgramSources {
            vertex: Some(String::new()),
            ..Default::default()
        };
        assert_ne!(empty.fingerprint(), ProgramSources::default().fingerprint());
    }
}
