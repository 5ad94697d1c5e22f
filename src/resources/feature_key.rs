//! Feature Keys
//!
//! A [`FeatureKey`] names one shader permutation. It is an integer bitmask whose bit
//! groups are mutually exclusive within a group and orthogonal across groups:
//!
//! | Group | Bits | Encoding |
//! |-------|------|----------|
//! | Lighting class | `GOURAUD_SHADING`, `PER_PIXEL_LIGHTING` | exactly one |
//! | Colour texture dimension | `COLOUR_TEXTURE_1/_2` | 1D = `_1`, 2D = `_2`, 3D = both |
//! | Colour texture components | `COLOUR_TEXTURE_OUTPUT_1/_2` | 1 = `_1`, 2 = `_2`, 3 = both, 4 = neither |
//! | Combine mode | `COLOUR_TEXTURE_DECAL` | set = decal, clear = modulate |
//! | Second texture | `SECOND_TEXTURE_1/_2`, `SECOND_TEXTURE_BUMPMAP` | dimension as above |
//! | Colour lookup channels | `DEPENDENT_TEXTURE_1..4` | red, green, blue, alpha |
//! | Colour lookup mode | `DEPENDENT_TEXTURE_COLOUR/_ALPHA/_1D_COMPONENT_LOOKUP` | |
//! | Lit volume | `LIT_VOLUME_*` | normal source and alpha scaling |
//! | OIT layer role | `ORDER_INDEPENDENT_FIRST_LAYER/_PEEL_LAYER` | at most one |
//!
//! The empty key is reserved for user-authored programs and never enters the cache.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Bitmask identifying one shader permutation. Doubles as the program cache key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct FeatureKey: u32 {
        const GOURAUD_SHADING = 1 << 0;
        const PER_PIXEL_LIGHTING = 1 << 1;

        const COLOUR_TEXTURE_1 = 1 << 2;
        const COLOUR_TEXTURE_2 = 1 << 3;
        const COLOUR_TEXTURE_OUTPUT_1 = 1 << 4;
        const COLOUR_TEXTURE_OUTPUT_2 = 1 << 5;
        const COLOUR_TEXTURE_DECAL = 1 << 6;

        const SECOND_TEXTURE_1 = 1 << 7;
        const SECOND_TEXTURE_2 = 1 << 8;
        const SECOND_TEXTURE_BUMPMAP = 1 << 9;

        const DEPENDENT_TEXTURE_1 = 1 << 10;
        const DEPENDENT_TEXTURE_2 = 1 << 11;
        const DEPENDENT_TEXTURE_3 = 1 << 12;
        const DEPENDENT_TEXTURE_4 = 1 << 13;
        const DEPENDENT_TEXTURE_COLOUR = 1 << 14;
        const DEPENDENT_TEXTURE_ALPHA = 1 << 15;
        const DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP = 1 << 16;

        const LIT_VOLUME_INTENSITY_NORMAL_TEXTURE = 1 << 17;
        const LIT_VOLUME_FINITE_DIFFERENCE_NORMAL = 1 << 18;
        const LIT_VOLUME_SCALE_ALPHA = 1 << 19;

        const ORDER_INDEPENDENT_FIRST_LAYER = 1 << 20;
        const ORDER_INDEPENDENT_PEEL_LAYER = 1 << 21;

        // Group masks
        const LIGHTING = Self::GOURAUD_SHADING.bits() | Self::PER_PIXEL_LIGHTING.bits();
        const COLOUR_TEXTURE = Self::COLOUR_TEXTURE_1.bits() | Self::COLOUR_TEXTURE_2.bits();
        const COLOUR_TEXTURE_OUTPUT =
            Self::COLOUR_TEXTURE_OUTPUT_1.bits() | Self::COLOUR_TEXTURE_OUTPUT_2.bits();
        const SECOND_TEXTURE = Self::SECOND_TEXTURE_1.bits() | Self::SECOND_TEXTURE_2.bits();
        const DEPENDENT_CHANNELS = Self::DEPENDENT_TEXTURE_1.bits()
            | Self::DEPENDENT_TEXTURE_2.bits()
            | Self::DEPENDENT_TEXTURE_3.bits()
            | Self::DEPENDENT_TEXTURE_4.bits();
        const DEPENDENT_MODE = Self::DEPENDENT_TEXTURE_COLOUR.bits()
            | Self::DEPENDENT_TEXTURE_ALPHA.bits()
            | Self::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP.bits();
        const LIT_VOLUME = Self::LIT_VOLUME_INTENSITY_NORMAL_TEXTURE.bits()
            | Self::LIT_VOLUME_FINITE_DIFFERENCE_NORMAL.bits()
            | Self::LIT_VOLUME_SCALE_ALPHA.bits();
        const ORDER_INDEPENDENT =
            Self::ORDER_INDEPENDENT_FIRST_LAYER.bits() | Self::ORDER_INDEPENDENT_PEEL_LAYER.bits();
    }
}

/// Splits a 1..=3 dimension into the two-bit group encoding.
fn encode_dimension(dimension: u32, bit_1: FeatureKey, bit_2: FeatureKey) -> Option<FeatureKey> {
    match dimension {
        1 => Some(bit_1),
        2 => Some(bit_2),
        3 => Some(bit_1 | bit_2),
        _ => None,
    }
}

fn decode_dimension(key: FeatureKey, bit_1: FeatureKey, bit_2: FeatureKey) -> Option<u32> {
    match (key.contains(bit_1), key.contains(bit_2)) {
        (false, false) => None,
        (true, false) => Some(1),
        (false, true) => Some(2),
        (true, true) => Some(3),
    }
}

impl FeatureKey {
    /// Sentinel for user-authored programs.
    pub const SPECIFIED_STRINGS: Self = Self::empty();

    /// The four colour-lookup channel bits in red, green, blue, alpha order.
    pub const DEPENDENT_CHANNEL_BITS: [Self; 4] = [
        Self::DEPENDENT_TEXTURE_1,
        Self::DEPENDENT_TEXTURE_2,
        Self::DEPENDENT_TEXTURE_3,
        Self::DEPENDENT_TEXTURE_4,
    ];

    #[inline]
    #[must_use]
    pub fn is_specified_strings(self) -> bool {
        self.is_empty()
    }

    /// Bits describing a primary colour texture.
    ///
    /// Returns `None` when the dimension is outside 1..=3 or the component count outside 1..=4.
    #[must_use]
    pub fn colour_texture(dimension: u32, components: u32, decal: bool) -> Option<Self> {
        let mut key = encode_dimension(dimension, Self::COLOUR_TEXTURE_1, Self::COLOUR_TEXTURE_2)?;
        key |= match components {
            1 => Self::COLOUR_TEXTURE_OUTPUT_1,
            2 => Self::COLOUR_TEXTURE_OUTPUT_2,
            3 => Self::COLOUR_TEXTURE_OUTPUT,
            4 => Self::empty(),
            _ => return None,
        };
        if decal {
            key |= Self::COLOUR_TEXTURE_DECAL;
        }
        Some(key)
    }

    /// Bits describing a second texture of the given dimension.
    #[must_use]
    pub fn second_texture(dimension: u32) -> Option<Self> {
        encode_dimension(dimension, Self::SECOND_TEXTURE_1, Self::SECOND_TEXTURE_2)
    }

    /// Dimension of the primary colour texture, if one is present.
    #[must_use]
    pub fn colour_texture_dimension(self) -> Option<u32> {
        decode_dimension(self, Self::COLOUR_TEXTURE_1, Self::COLOUR_TEXTURE_2)
    }

    /// Component count of the primary colour texture, if one is present.
    #[must_use]
    pub fn colour_texture_components(self) -> Option<u32> {
        self.colour_texture_dimension()?;
        let components = match (
            self.contains(Self::COLOUR_TEXTURE_OUTPUT_1),
            self.contains(Self::COLOUR_TEXTURE_OUTPUT_2),
        ) {
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
            (false, false) => 4,
        };
        Some(components)
    }

    /// Dimension of the second texture, if one is present.
    #[must_use]
    pub fn second_texture_dimension(self) -> Option<u32> {
        decode_dimension(self, Self::SECOND_TEXTURE_1, Self::SECOND_TEXTURE_2)
    }

    /// Indices (0 = red .. 3 = alpha) of the channels feeding the colour lookup.
    #[must_use]
    pub fn dependent_channels(self) -> impl Iterator<Item = usize> {
        Self::DEPENDENT_CHANNEL_BITS
            .into_iter()
            .enumerate()
            .filter(move |(_, bit)| self.contains(*bit))
            .map(|(index, _)| index)
    }

    #[must_use]
    pub fn dependent_channel_count(self) -> usize {
        self.intersection(Self::DEPENDENT_CHANNELS).bits().count_ones() as usize
    }

    #[inline]
    #[must_use]
    pub fn has_texture(self) -> bool {
        self.intersects(Self::COLOUR_TEXTURE | Self::SECOND_TEXTURE)
    }

    /// Copy of this key with the OIT role for `layer` (1 = first layer, >1 = peeling).
    ///
    /// Returns `None` for layer 0.
    #[must_use]
    pub fn with_order_independent_layer(self, layer: u32) -> Option<Self> {
        let role = match layer {
            0 => return None,
            1 => Self::ORDER_INDEPENDENT_FIRST_LAYER,
            _ => Self::ORDER_INDEPENDENT_PEEL_LAYER,
        };
        Some(self.difference(Self::ORDER_INDEPENDENT) | role)
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#08x}", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_texture_encoding_decodes() {
        for dimension in 1..=3 {
            for components in 1..=4 {
                let key = FeatureKey::GOURAUD_SHADING
                    | FeatureKey::colour_texture(dimension, components, false).unwrap();
                assert_eq!(key.colour_texture_dimension(), Some(dimension));
                assert_eq!(key.colour_texture_components(), Some(components));
            }
        }
        assert!(FeatureKey::colour_texture(4, 1, false).is_none());
        assert!(FeatureKey::colour_texture(2, 5, false).is_none());
    }

    #[test]
    fn no_colour_texture_has_no_components() {
        assert_eq!(FeatureKey::PER_PIXEL_LIGHTING.colour_texture_components(), None);
    }

    #[test]
    fn dependent_channels_in_order() {
        let key = FeatureKey::DEPENDENT_TEXTURE_3 | FeatureKey::DEPENDENT_TEXTURE_1;
        assert_eq!(key.dependent_channels().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(key.dependent_channel_count(), 2);
    }

    #[test]
    fn order_independent_layers() {
        let base = FeatureKey::GOURAUD_SHADING;
        assert_eq!(base.with_order_independent_layer(0), None);
        assert_eq!(
            base.with_order_independent_layer(1),
            Some(base | FeatureKey::ORDER_INDEPENDENT_FIRST_LAYER)
        );
        let peel = base.with_order_independent_layer(5).unwrap();
        assert_eq!(peel, base | FeatureKey::ORDER_INDEPENDENT_PEEL_LAYER);
        // Re-deriving from a layered key replaces the role.
        assert_eq!(
            peel.with_order_independent_layer(1),
            Some(base | FeatureKey::ORDER_INDEPENDENT_FIRST_LAYER)
        );
    }

    #[test]
    fn sentinel_is_empty() {
        assert!(FeatureKey::SPECIFIED_STRINGS.is_specified_strings());
        assert!(!FeatureKey::GOURAUD_SHADING.is_specified_strings());
    }
}
