//! Client-side descriptions consumed by the renderer.
//!
//! Nothing here talks to the backend; textures, spectra and uniform sets are
//! provided by the embedding application through small traits.

pub mod feature_key;
pub mod material;
pub mod spectrum;
pub mod texture;
pub mod uniforms;
pub mod version_tracker;

pub use feature_key::FeatureKey;
pub use material::{Material, MaterialHandle, MaterialModule, ShadingMode, TextureSlot};
pub use spectrum::{SharedSpectrum, SpectrumInfo, SpectrumProvider};
pub use texture::{SharedTexture, TextureInfo, TextureProvider};
pub use uniforms::{ShaderUniforms, SharedUniforms};
