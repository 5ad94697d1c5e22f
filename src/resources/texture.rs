//! Texture provider interface.
//!
//! Textures are owned by an external image subsystem. Materials only hold shared
//! references to them through [`TextureProvider`] and read what shader selection and
//! binding need: dimension, component count, combine mode and sizes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identity of an external texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(pub u64);

/// Stable identity of the field a texture is evaluated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u64);

/// How texel colour combines with the lit surface colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombineMode {
    #[default]
    Modulate,
    /// Texel colour replaces the lit colour.
    Decal,
    Blend,
    Add,
}

/// Read-only view of an external texture.
pub trait TextureProvider: Send + Sync {
    fn id(&self) -> TextureId;

    /// 1, 2 or 3.
    fn dimension(&self) -> u32;

    /// 1 (intensity), 2 (intensity + alpha), 3 (RGB) or 4 (RGBA).
    fn component_count(&self) -> u32;

    fn combine_mode(&self) -> CombineMode {
        CombineMode::Modulate
    }

    /// Texel counts of the source image per axis. Unused axes are 0.
    fn pixel_sizes(&self) -> [u32; 3];

    /// Texel counts actually uploaded, which may be reduced for hardware limits.
    fn rendered_sizes(&self) -> [u32; 3] {
        self.pixel_sizes()
    }

    /// Physical extent of the texture in model coordinates.
    fn physical_size(&self) -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }

    /// Factor mapping model texture coordinates onto the uploaded image.
    ///
    /// Axes with at most one texel are left at 1.
    fn coordinate_scaling(&self) -> [f32; 4] {
        let original = self.pixel_sizes();
        let rendered = self.rendered_sizes();
        let physical = self.physical_size();
        let mut scaling = [1.0; 4];
        for axis in 0..3 {
            if original[axis] > 1 && rendered[axis] > 0 && physical[axis] > 0.0 {
                scaling[axis] =
                    original[axis] as f32 / (rendered[axis] as f32 * physical[axis]);
            }
        }
        scaling
    }
}

impl fmt::Debug for dyn TextureProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureProvider")
            .field("id", &self.id())
            .field("dimension", &self.dimension())
            .field("components", &self.component_count())
            .finish()
    }
}

pub type SharedTexture = Arc<dyn TextureProvider>;

/// A plain in-memory texture description.
///
/// Useful for tests and for embedders whose textures are fully described by their
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub id: TextureId,
    pub dimension: u32,
    pub components: u32,
    pub combine_mode: CombineMode,
    pub pixel_sizes: [u32; 3],
    pub rendered_sizes: [u32; 3],
}

impl TextureInfo {
    #[must_use]
    pub fn new(id: u64, dimension: u32, components: u32) -> Self {
        let mut sizes = [0; 3];
        for size in sizes.iter_mut().take(dimension.min(3) as usize) {
            *size = 64;
        }
        Self {
            id: TextureId(id),
            dimension,
            components,
            combine_mode: CombineMode::Modulate,
            pixel_sizes: sizes,
            rendered_sizes: sizes,
        }
    }

    #[must_use]
    pub fn with_combine_mode(mut self, mode: CombineMode) -> Self {
        self.combine_mode = mode;
        self
    }

    #[must_use]
    pub fn with_sizes(mut self, pixel: [u32; 3], rendered: [u32; 3]) -> Self {
        self.pixel_sizes = pixel;
        self.rendered_sizes = rendered;
        self
    }

    #[must_use]
    pub fn shared(self) -> SharedTexture {
        Arc::new(self)
    }
}

impl TextureProvider for TextureInfo {
    fn id(&self) -> TextureId {
        self.id
    }

    fn dimension(&self) -> u32 {
        self.dimension
    }

    fn component_count(&self) -> u32 {
        self.components
    }

    fn combine_mode(&self) -> CombineMode {
        self.combine_mode
    }

    fn pixel_sizes(&self) -> [u32; 3] {
        self.pixel_sizes
    }

    fn rendered_sizes(&self) -> [u32; 3] {
        self.rendered_sizes
    }
}
