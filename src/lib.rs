//! # Tinct Shaders
//!
//! Shader permutation synthesis, program caching and material activation for a
//! finite-element visualization toolkit.
//!
//! A [`Material`] describes how a surface is coloured: fixed-function colours,
//! up to four textures, an optional spectrum lookup and optional user uniforms.
//! Its properties are condensed into a [`FeatureKey`], and the [`ShaderModule`]
//! turns every distinct key into one shared, reference-counted GPU program.
//! Materials are owned by a [`MaterialModule`], which also delivers change
//! notifications and the standard palette.
//!
//! The GPU is reached exclusively through the [`RenderBackend`] trait.
//! [`RecordingBackend`] implements it in memory for tests and headless use.
//!
//! ```rust,ignore
//! use tinct::{MaterialModule, RecordingBackend, ShaderModule, ShaderModuleSettings};
//! use tinct::resources::material::{ShadingMode, TextureSlot};
//! use tinct::resources::texture::TextureInfo;
//!
//! let mut backend = RecordingBackend::full();
//! let mut shaders = ShaderModule::new(ShaderModuleSettings::default(), &backend);
//! let mut materials = MaterialModule::new();
//!
//! let handle = materials.create_material(Some("surface"))?;
//! materials.edit(handle, |m| {
//!     m.set_shading(ShadingMode::Synthesized);
//!     m.set_texture(TextureSlot::Colour, Some(TextureInfo::new(1, 2, 4).shared()))
//! })?;
//! materials.compile(handle, &mut shaders, &mut backend)?;
//! materials.execute(handle, &shaders, &mut backend)?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod utils;

pub use errors::{ErrorKind, Result, ShaderError};
pub use renderer::backend::{BackendCaps, RecordingBackend, RenderBackend};
pub use renderer::{Dialect, ProgramCache, ProgramHandle, ShaderModule, ShaderModuleSettings};
pub use resources::feature_key::FeatureKey;
pub use resources::material::{Material, MaterialHandle, MaterialModule};
pub use utils::interner;
