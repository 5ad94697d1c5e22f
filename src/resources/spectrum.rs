//! Spectrum provider interface and colour-lookup remap.
//!
//! A spectrum maps data values to colours. When a material uses one as a colour
//! lookup, the spectrum's lookup table is uploaded as a texture and sampled from the
//! fragment program with the surface colour as coordinate. Linear filtering samples
//! texel centres, so the coordinate is remapped by [`LookupRemap`] to start in the
//! middle of the first texel and finish in the middle of the last.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::resources::texture::TextureId;

/// Stable identity of an external spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpectrumId(pub u64);

bitflags! {
    /// Colour channels a spectrum writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpectrumColourComponents: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const RGB = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
        const RGBA = Self::RGB.bits() | Self::ALPHA.bits();
    }
}

/// Read-only view of an external spectrum.
pub trait SpectrumProvider: Send + Sync {
    fn id(&self) -> SpectrumId;

    /// Number of data values the spectrum is evaluated from.
    fn number_of_data_components(&self) -> u32;

    fn colour_components(&self) -> SpectrumColourComponents;

    /// Lookup table texel counts per data component. Unused axes are 0.
    fn lookup_sizes(&self) -> [u32; 3];

    /// The uploaded lookup table, bound on texture unit 1.
    fn lookup_texture(&self) -> TextureId;
}

impl fmt::Debug for dyn SpectrumProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumProvider")
            .field("id", &self.id())
            .field("data_components", &self.number_of_data_components())
            .finish()
    }
}

pub type SharedSpectrum = Arc<dyn SpectrumProvider>;

/// Offset and scale applied to the lookup coordinate before the dependent sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupRemap {
    pub offsets: [f32; 4],
    pub scales: [f32; 4],
}

impl LookupRemap {
    /// Per axis `offset = 0.5 / size` and `scale = (size - 1) / size`.
    ///
    /// Unused components stay at offset 0, scale 1. A zero-sized axis is left as
    /// the identity.
    #[must_use]
    pub fn from_sizes(sizes: [u32; 3]) -> Self {
        let mut remap = Self::identity();
        for (axis, &size) in sizes.iter().enumerate() {
            if size > 0 {
                let size = size as f32;
                remap.offsets[axis] = 0.5 / size;
                remap.scales[axis] = (size - 1.0) / size;
            }
        }
        remap
    }

    #[must_use]
    pub fn identity() -> Self {
        Self {
            offsets: [0.0; 4],
            scales: [1.0; 4],
        }
    }
}

/// A plain in-memory spectrum description.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumInfo {
    pub id: SpectrumId,
    pub data_components: u32,
    pub colour_components: SpectrumColourComponents,
    pub lookup_sizes: [u32; 3],
    pub lookup_texture: TextureId,
}

impl SpectrumInfo {
    /// A single-component RGB spectrum with a 256-entry table.
    #[must_use]
    pub fn new(id: u64, lookup_texture: u64) -> Self {
        Self {
            id: SpectrumId(id),
            data_components: 1,
            colour_components: SpectrumColourComponents::RGB,
            lookup_sizes: [256, 0, 0],
            lookup_texture: TextureId(lookup_texture),
        }
    }

    #[must_use]
    pub fn with_data_components(mut self, count: u32, sizes: [u32; 3]) -> Self {
        self.data_components = count;
        self.lookup_sizes = sizes;
        self
    }

    #[must_use]
    pub fn with_colour_components(mut self, components: SpectrumColourComponents) -> Self {
        self.colour_components = components;
        self
    }

    #[must_use]
    pub fn shared(self) -> SharedSpectrum {
        Arc::new(self)
    }
}

impl SpectrumProvider for SpectrumInfo {
    fn id(&self) -> SpectrumId {
        self.id
    }

    fn number_of_data_components(&self) -> u32 {
        self.data_components
    }

    fn colour_components(&self) -> SpectrumColourComponents {
        self.colour_components
    }

    fn lookup_sizes(&self) -> [u32; 3] {
        self.lookup_sizes
    }

    fn lookup_texture(&self) -> TextureId {
        self.lookup_texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_centres_texels() {
        let remap = LookupRemap::from_sizes([256, 4, 0]);
        assert!((remap.offsets[0] - 0.5 / 256.0).abs() < 1e-7);
        assert!((remap.scales[0] - 255.0 / 256.0).abs() < 1e-7);
        assert!((remap.offsets[1] - 0.125).abs() < 1e-7);
        assert!((remap.scales[1] - 0.75).abs() < 1e-7);
        assert_eq!(remap.offsets[2], 0.0);
        assert_eq!(remap.scales[2], 1.0);
        assert_eq!(remap.scales[3], 1.0);
    }

    #[test]
    fn zero_sizes_are_identity() {
        assert_eq!(LookupRemap::from_sizes([0, 0, 0]), LookupRemap::identity());
    }
}
