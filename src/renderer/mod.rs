//! Program synthesis, caching and activation.
//!
//! - [`backend`]: the abstract GPU interface and the in-memory recorder
//! - [`synth`]: source text for a [`FeatureKey`](crate::FeatureKey)
//! - [`program`]: one compiled program and its activation
//! - [`cache`]: reference-counted program sharing by key
//! - [`module`]: the per-context [`ShaderModule`]
//! - [`material`] and [`oit`]: compiling, binding and layering materials

pub mod backend;
pub mod cache;
pub mod command_list;
pub mod dialect;
pub mod material;
pub mod module;
pub mod oit;
pub mod program;
pub mod settings;
pub mod synth;

pub use cache::{ProgramCache, ProgramHandle};
pub use command_list::CommandListRecorder;
pub use dialect::{Dialect, VendorHints, VendorId};
pub use material::{bind_material, compile_material, execute_material, release_material};
pub use module::ShaderModule;
pub use program::{BuiltinUniform, CompiledProgram, ProgramSources};
pub use settings::ShaderModuleSettings;
