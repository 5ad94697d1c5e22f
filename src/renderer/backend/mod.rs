//! Rendering backend seam.
//!
//! Everything the shader subsystem needs from the graphics API goes through
//! [`RenderBackend`]: capability probing, shader object lifecycle, program and
//! uniform binding, texture units and optional command-list recording. The trait is
//! deliberately small and synchronous; every call happens on the thread that owns
//! the rendering context.

pub mod recording;

use bitflags::bitflags;

use crate::renderer::dialect::Dialect;
use crate::resources::texture::TextureId;

pub use recording::{BackendCall, RecordingBackend};

bitflags! {
    /// Features advertised by a backend.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BackendCaps: u32 {
        /// GLSL shader objects and linked programs.
        const MODERN_SHADING = 1 << 0;
        /// Assembly-style vertex and fragment programs.
        const LEGACY_PROGRAMS = 1 << 1;
        /// Pre-recorded, replayable command lists.
        const COMMAND_LISTS = 1 << 2;
        /// A geometry stage for linked programs.
        const GEOMETRY_SHADERS = 1 << 3;
    }
}

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

/// Backend handle of a single compiled shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderObjectId(pub u32);

/// Backend handle of a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramObjectId(pub u32);

/// Backend handle of a recorded command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandListId(pub u32);

/// Outcome of a compile or link step, with the driver's info log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageReport {
    pub success: bool,
    pub log: String,
}

impl StageReport {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            log: String::new(),
        }
    }

    #[must_use]
    pub fn failed(log: impl Into<String>) -> Self {
        Self {
            success: false,
            log: log.into(),
        }
    }
}

/// What to make current for subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramBinding {
    /// A linked GLSL program.
    Linked(ProgramObjectId),
    /// A pair of assembly programs bound to their respective targets.
    Assembly {
        vertex: ShaderObjectId,
        fragment: ShaderObjectId,
    },
    /// Programmable stages off; fixed-function rendering.
    FixedFunction,
}

/// Fixed-function material colour state, RGBA per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialColours {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub emission: [f32; 4],
    pub specular: [f32; 4],
    /// Specular exponent in the backend's native range (0..=128).
    pub shininess: f32,
}

/// Graphics API primitives consumed by the shader subsystem.
///
/// Allocation calls return `None` when the backend cannot create the object. Uniform
/// setters return whether the named uniform exists in the program; writing a uniform
/// the program does not declare is not an error.
pub trait RenderBackend {
    // ------------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------------
    fn capabilities(&self) -> BackendCaps;

    /// The driver vendor string, used to select vendor hints.
    fn vendor(&self) -> String;

    // ------------------------------------------------------------------------
    // Shader objects
    // ------------------------------------------------------------------------
    fn create_shader(&mut self, dialect: Dialect, stage: ShaderStage) -> Option<ShaderObjectId>;

    /// Submits `source` to the shader object and compiles it.
    fn compile_shader(&mut self, shader: ShaderObjectId, source: &str) -> StageReport;

    fn delete_shader(&mut self, shader: ShaderObjectId);

    fn create_program(&mut self) -> Option<ProgramObjectId>;

    fn attach_shader(&mut self, program: ProgramObjectId, shader: ShaderObjectId);

    fn link_program(&mut self, program: ProgramObjectId) -> StageReport;

    fn delete_program(&mut self, program: ProgramObjectId);

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------
    fn use_program(&mut self, binding: ProgramBinding);

    fn set_uniform_i32(&mut self, program: ProgramObjectId, name: &str, value: i32) -> bool;

    /// Writes a float vector uniform of 1 to 4 components.
    fn set_uniform_f32(&mut self, program: ProgramObjectId, name: &str, values: &[f32]) -> bool;

    /// Writes an assembly program environment parameter.
    fn set_program_env(&mut self, stage: ShaderStage, index: u32, value: [f32; 4]);

    fn set_material_colours(&mut self, colours: &MaterialColours);

    /// Uploads or refreshes a texture so it can be bound later.
    fn prepare_texture(&mut self, texture: TextureId);

    /// Binds `texture` to `unit`, or disables texturing on the unit when `None`.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    // ------------------------------------------------------------------------
    // Command lists
    // ------------------------------------------------------------------------
    fn create_command_list(&mut self) -> Option<CommandListId>;

    /// Starts recording into `list`. Only one list may record at a time.
    fn begin_command_list(&mut self, list: CommandListId);

    fn end_command_list(&mut self);

    fn call_command_list(&mut self, list: CommandListId);

    fn delete_command_list(&mut self, list: CommandListId);
}
