//! Headless recording backend.
//!
//! [`RecordingBackend`] implements [`RenderBackend`] without a graphics context. It logs
//! every call, simulates the state the calls would leave behind (current program,
//! uniforms, texture units, command-list contents) and keeps track of live objects so
//! that leaks and double frees are observable. Failure injection covers the
//! error paths: compile failure on matching source, link failure and refused
//! allocations.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    BackendCaps, CommandListId, MaterialColours, ProgramBinding, ProgramObjectId,
    RenderBackend, ShaderObjectId, ShaderStage, StageReport,
};
use crate::renderer::dialect::Dialect;
use crate::resources::texture::TextureId;

/// One call made against a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateShader {
        shader: ShaderObjectId,
        dialect: Dialect,
        stage: ShaderStage,
    },
    CompileShader {
        shader: ShaderObjectId,
        success: bool,
    },
    DeleteShader(ShaderObjectId),
    CreateProgram(ProgramObjectId),
    AttachShader {
        program: ProgramObjectId,
        shader: ShaderObjectId,
    },
    LinkProgram {
        program: ProgramObjectId,
        success: bool,
    },
    DeleteProgram(ProgramObjectId),
    UseProgram(ProgramBinding),
    SetUniformI32 {
        program: ProgramObjectId,
        name: String,
        value: i32,
    },
    SetUniformF32 {
        program: ProgramObjectId,
        name: String,
        values: Vec<f32>,
    },
    SetProgramEnv {
        stage: ShaderStage,
        index: u32,
        value: [f32; 4],
    },
    SetMaterialColours(MaterialColours),
    PrepareTexture(TextureId),
    BindTexture {
        unit: u32,
        texture: Option<TextureId>,
    },
    CreateCommandList(CommandListId),
    BeginCommandList(CommandListId),
    EndCommandList,
    CallCommandList(CommandListId),
    DeleteCommandList(CommandListId),
}

#[derive(Debug)]
struct ShaderRecord {
    source: String,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    shaders: Vec<ShaderObjectId>,
    /// Sources of all attached stages, captured at link time.
    linked_source: String,
}

/// A [`RenderBackend`] that records instead of rendering.
#[derive(Debug)]
pub struct RecordingBackend {
    caps: BackendCaps,
    vendor: String,
    next_id: u32,

    calls: Vec<BackendCall>,
    shaders: FxHashMap<ShaderObjectId, ShaderRecord>,
    programs: FxHashMap<ProgramObjectId, ProgramRecord>,
    lists: FxHashMap<CommandListId, Vec<BackendCall>>,
    recording: Option<CommandListId>,

    // Simulated context state
    active: ProgramBinding,
    uniforms: FxHashMap<(ProgramObjectId, String), Vec<f32>>,
    env: FxHashMap<(ShaderStage, u32), [f32; 4]>,
    units: FxHashMap<u32, Option<TextureId>>,
    colours: Option<MaterialColours>,
    prepared: FxHashSet<TextureId>,

    // Failure injection
    fail_compile_containing: Option<String>,
    fail_link: bool,
    refuse_allocations: bool,

    // Diagnostics
    allocations: usize,
    invalid_deletes: usize,
    nested_recordings: usize,
}

impl RecordingBackend {
    #[must_use]
    pub fn new(caps: BackendCaps) -> Self {
        Self {
            caps,
            vendor: String::from("Recording"),
            next_id: 1,
            calls: Vec::new(),
            shaders: FxHashMap::default(),
            programs: FxHashMap::default(),
            lists: FxHashMap::default(),
            recording: None,
            active: ProgramBinding::FixedFunction,
            uniforms: FxHashMap::default(),
            env: FxHashMap::default(),
            units: FxHashMap::default(),
            colours: None,
            prepared: FxHashSet::default(),
            fail_compile_containing: None,
            fail_link: false,
            refuse_allocations: false,
            allocations: 0,
            invalid_deletes: 0,
            nested_recordings: 0,
        }
    }

    /// A backend advertising both dialects and command lists.
    #[must_use]
    pub fn full() -> Self {
        Self::new(
            BackendCaps::MODERN_SHADING | BackendCaps::LEGACY_PROGRAMS | BackendCaps::COMMAND_LISTS,
        )
    }

    #[must_use]
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn set_capabilities(&mut self, caps: BackendCaps) {
        self.caps = caps;
    }

    pub fn set_vendor(&mut self, vendor: impl Into<String>) {
        self.vendor = vendor.into();
    }

    /// Makes every shader whose source contains `needle` fail to compile.
    pub fn fail_compile_containing(&mut self, needle: Option<&str>) {
        self.fail_compile_containing = needle.map(str::to_owned);
    }

    pub fn set_fail_link(&mut self, fail: bool) {
        self.fail_link = fail;
    }

    pub fn set_refuse_allocations(&mut self, refuse: bool) {
        self.refuse_allocations = refuse;
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of logged calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    #[must_use]
    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    #[must_use]
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn live_command_lists(&self) -> usize {
        self.lists.len()
    }

    /// Total shader, program and command-list objects ever created.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Deletes issued for objects that were not alive.
    #[must_use]
    pub fn invalid_deletes(&self) -> usize {
        self.invalid_deletes
    }

    /// Times a command list was opened while another was recording.
    #[must_use]
    pub fn nested_recordings(&self) -> usize {
        self.nested_recordings
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    #[must_use]
    pub fn active_program(&self) -> ProgramBinding {
        self.active
    }

    #[must_use]
    pub fn uniform(&self, program: ProgramObjectId, name: &str) -> Option<&[f32]> {
        self.uniforms
            .get(&(program, name.to_owned()))
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn program_env(&self, stage: ShaderStage, index: u32) -> Option<[f32; 4]> {
        self.env.get(&(stage, index)).copied()
    }

    #[must_use]
    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.units.get(&unit).copied().flatten()
    }

    #[must_use]
    pub fn material_colours(&self) -> Option<&MaterialColours> {
        self.colours.as_ref()
    }

    #[must_use]
    pub fn is_prepared(&self, texture: TextureId) -> bool {
        self.prepared.contains(&texture)
    }

    #[must_use]
    pub fn shader_source(&self, shader: ShaderObjectId) -> Option<&str> {
        self.shaders.get(&shader).map(|record| record.source.as_str())
    }

    #[must_use]
    pub fn command_list(&self, list: CommandListId) -> Option<&[BackendCall]> {
        self.lists.get(&list).map(Vec::as_slice)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn allocate_id(&mut self) -> Option<u32> {
        if self.refuse_allocations {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.allocations += 1;
        Some(id)
    }

    /// Logs a call and either stores it in the open list or applies it.
    fn submit(&mut self, call: BackendCall) {
        self.calls.push(call.clone());
        match self.recording {
            Some(list) => {
                if let Some(contents) = self.lists.get_mut(&list) {
                    contents.push(call);
                }
            }
            None => self.apply(&call, 0),
        }
    }

    fn apply(&mut self, call: &BackendCall, depth: usize) {
        match call {
            BackendCall::UseProgram(binding) => self.active = *binding,
            BackendCall::SetUniformI32 { program, name, value } => {
                self.uniforms
                    .insert((*program, name.clone()), vec![*value as f32]);
            }
            BackendCall::SetUniformF32 { program, name, values } => {
                self.uniforms.insert((*program, name.clone()), values.clone());
            }
            BackendCall::SetProgramEnv { stage, index, value } => {
                self.env.insert((*stage, *index), *value);
            }
            BackendCall::SetMaterialColours(colours) => self.colours = Some(*colours),
            BackendCall::BindTexture { unit, texture } => {
                self.units.insert(*unit, *texture);
            }
            BackendCall::CallCommandList(list) if depth < 16 => {
                let contents = self.lists.get(list).cloned().unwrap_or_default();
                for nested in &contents {
                    self.apply(nested, depth + 1);
                }
            }
            _ => {}
        }
    }

    fn declares(&self, program: ProgramObjectId, name: &str) -> bool {
        self.programs
            .get(&program)
            .is_some_and(|record| record.linked_source.contains(name))
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::full()
    }
}

impl RenderBackend for RecordingBackend {
    fn capabilities(&self) -> BackendCaps {
        self.caps
    }

    fn vendor(&self) -> String {
        self.vendor.clone()
    }

    fn create_shader(&mut self, dialect: Dialect, stage: ShaderStage) -> Option<ShaderObjectId> {
        let shader = ShaderObjectId(self.allocate_id()?);
        self.shaders.insert(
            shader,
            ShaderRecord {
                source: String::new(),
            },
        );
        self.calls.push(BackendCall::CreateShader {
            shader,
            dialect,
            stage,
        });
        Some(shader)
    }

    fn compile_shader(&mut self, shader: ShaderObjectId, source: &str) -> StageReport {
        let Some(record) = self.shaders.get_mut(&shader) else {
            return StageReport::failed("invalid shader object");
        };
        record.source = source.to_owned();
        let failure = self
            .fail_compile_containing
            .as_deref()
            .filter(|needle| source.contains(needle));
        let report = match failure {
            Some(needle) => StageReport::failed(format!("0:1(1): error: rejected `{needle}`")),
            None => StageReport::ok(),
        };
        self.calls.push(BackendCall::CompileShader {
            shader,
            success: report.success,
        });
        report
    }

    fn delete_shader(&mut self, shader: ShaderObjectId) {
        if self.shaders.remove(&shader).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(BackendCall::DeleteShader(shader));
    }

    fn create_program(&mut self) -> Option<ProgramObjectId> {
        let program = ProgramObjectId(self.allocate_id()?);
        self.programs.insert(program, ProgramRecord::default());
        self.calls.push(BackendCall::CreateProgram(program));
        Some(program)
    }

    fn attach_shader(&mut self, program: ProgramObjectId, shader: ShaderObjectId) {
        if let Some(record) = self.programs.get_mut(&program) {
            record.shaders.push(shader);
        }
        self.calls.push(BackendCall::AttachShader { program, shader });
    }

    fn link_program(&mut self, program: ProgramObjectId) -> StageReport {
        let linked_source = match self.programs.get(&program) {
            Some(record) => record
                .shaders
                .iter()
                .filter_map(|shader| self.shaders.get(shader))
                .map(|shader| shader.source.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            None => return StageReport::failed("invalid program object"),
        };
        if let Some(record) = self.programs.get_mut(&program) {
            record.linked_source = linked_source;
        }
        let report = if self.fail_link {
            StageReport::failed("error: unresolved varying")
        } else {
            StageReport::ok()
        };
        self.calls.push(BackendCall::LinkProgram {
            program,
            success: report.success,
        });
        report
    }

    fn delete_program(&mut self, program: ProgramObjectId) {
        if self.programs.remove(&program).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(BackendCall::DeleteProgram(program));
    }

    fn use_program(&mut self, binding: ProgramBinding) {
        self.submit(BackendCall::UseProgram(binding));
    }

    fn set_uniform_i32(&mut self, program: ProgramObjectId, name: &str, value: i32) -> bool {
        if !self.declares(program, name) {
            return false;
        }
        self.submit(BackendCall::SetUniformI32 {
            program,
            name: name.to_owned(),
            value,
        });
        true
    }

    fn set_uniform_f32(&mut self, program: ProgramObjectId, name: &str, values: &[f32]) -> bool {
        if !self.declares(program, name) {
            return false;
        }
        self.submit(BackendCall::SetUniformF32 {
            program,
            name: name.to_owned(),
            values: values.to_vec(),
        });
        true
    }

    fn set_program_env(&mut self, stage: ShaderStage, index: u32, value: [f32; 4]) {
        self.submit(BackendCall::SetProgramEnv { stage, index, value });
    }

    fn set_material_colours(&mut self, colours: &MaterialColours) {
        self.submit(BackendCall::SetMaterialColours(*colours));
    }

    fn prepare_texture(&mut self, texture: TextureId) {
        self.prepared.insert(texture);
        self.calls.push(BackendCall::PrepareTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        self.submit(BackendCall::BindTexture { unit, texture });
    }

    fn create_command_list(&mut self) -> Option<CommandListId> {
        let list = CommandListId(self.allocate_id()?);
        self.lists.insert(list, Vec::new());
        self.calls.push(BackendCall::CreateCommandList(list));
        Some(list)
    }

    fn begin_command_list(&mut self, list: CommandListId) {
        if self.recording.is_some() {
            self.nested_recordings += 1;
        }
        if let Some(contents) = self.lists.get_mut(&list) {
            contents.clear();
        }
        self.recording = Some(list);
        self.calls.push(BackendCall::BeginCommandList(list));
    }

    fn end_command_list(&mut self) {
        self.recording = None;
        self.calls.push(BackendCall::EndCommandList);
    }

    fn call_command_list(&mut self, list: CommandListId) {
        self.submit(BackendCall::CallCommandList(list));
    }

    fn delete_command_list(&mut self, list: CommandListId) {
        if self.lists.remove(&list).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(BackendCall::DeleteCommandList(list));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaying_a_list_applies_its_state() {
        let mut backend = RecordingBackend::full();
        let list = backend.create_command_list().unwrap();
        backend.begin_command_list(list);
        backend.bind_texture(0, Some(TextureId(7)));
        backend.end_command_list();
        assert_eq!(backend.bound_texture(0), None);

        backend.call_command_list(list);
        assert_eq!(backend.bound_texture(0), Some(TextureId(7)));
    }

    #[test]
    fn double_delete_is_counted() {
        let mut backend = RecordingBackend::full();
        let shader = backend
            .create_shader(Dialect::Modern, ShaderStage::Vertex)
            .unwrap();
        backend.delete_shader(shader);
        backend.delete_shader(shader);
        assert_eq!(backend.invalid_deletes(), 1);
        assert_eq!(backend.live_shaders(), 0);
    }

    #[test]
    fn refused_allocation_returns_none() {
        let mut backend = RecordingBackend::full();
        backend.set_refuse_allocations(true);
        assert!(backend.create_program().is_none());
        assert_eq!(backend.allocations(), 0);
    }

    #[test]
    fn undeclared_uniform_is_ignored() {
        let mut backend = RecordingBackend::full();
        let shader = backend
            .create_shader(Dialect::Modern, ShaderStage::Fragment)
            .unwrap();
        backend.compile_shader(shader, "uniform vec4 tint;\nvoid main() {}\n");
        let program = backend.create_program().unwrap();
        backend.attach_shader(program, shader);
        assert!(backend.link_program(program).success);

        assert!(backend.set_uniform_f32(program, "tint", &[1.0, 0.0, 0.0, 1.0]));
        assert!(!backend.set_uniform_f32(program, "missing", &[1.0]));
        assert_eq!(backend.uniform(program, "tint"), Some(&[1.0, 0.0, 0.0, 1.0][..]));
    }
}
