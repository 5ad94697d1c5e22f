//! Decoding and validation of a feature key.
//!
//! A [`ShaderPlan`] is the typed form of a [`FeatureKey`]. Building one rejects every
//! bit combination the synthesizer cannot express, so the regions can assume a
//! consistent key.

use smallvec::SmallVec;

use crate::renderer::dialect::VendorHints;
use crate::resources::feature_key::FeatureKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lighting {
    Gouraud,
    PerPixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColourTexture {
    pub dimension: u32,
    pub components: u32,
    pub decal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondTexture {
    pub dimension: u32,
    pub bump_map: bool,
}

/// What the dependent lookup result replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutput {
    /// RGB from the lookup, alpha untouched.
    Colour,
    /// Alpha scaled by the lookup's first channel.
    Alpha,
    /// Whole colour from the lookup.
    ColourAndAlpha,
    /// Each selected channel looked up independently through a 1D table.
    PerComponent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColourLookup {
    /// Channel indices, red = 0 .. alpha = 3, ascending.
    pub channels: SmallVec<[usize; 4]>,
    pub output: LookupOutput,
}

impl ColourLookup {
    /// Channel letters in order, e.g. `"rb"`.
    #[must_use]
    pub fn swizzle(&self) -> String {
        self.channels.iter().map(|&c| CHANNEL_NAMES[c]).collect()
    }

    /// Channel letters padded with `r` to four, e.g. `"rbrr"`.
    #[must_use]
    pub fn padded_swizzle(&self) -> String {
        let mut swizzle = self.swizzle();
        while swizzle.len() < 4 {
            swizzle.push('r');
        }
        swizzle
    }

    #[must_use]
    pub fn input_count(&self) -> usize {
        self.channels.len()
    }
}

pub const CHANNEL_NAMES: [char; 4] = ['r', 'g', 'b', 'a'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeNormal {
    /// Normal stored in the `gba` channels of the colour texture.
    IntensityTexture,
    /// Normal estimated by central differences of the colour texture.
    FiniteDifference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LitVolume {
    pub normal: VolumeNormal,
    pub scale_alpha: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    First,
    Peel,
}

/// Typed, validated view of a feature key.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPlan {
    pub key: FeatureKey,
    pub lighting: Lighting,
    pub colour: Option<ColourTexture>,
    pub second: Option<SecondTexture>,
    pub lookup: Option<ColourLookup>,
    pub lit_volume: Option<LitVolume>,
    pub layer: Option<LayerRole>,
    pub hints: VendorHints,
}

impl ShaderPlan {
    /// Decodes `key`, returning the reason it cannot be synthesized on failure.
    pub fn new(key: FeatureKey, hints: VendorHints) -> Result<Self, String> {
        let lighting = match (
            key.contains(FeatureKey::GOURAUD_SHADING),
            key.contains(FeatureKey::PER_PIXEL_LIGHTING),
        ) {
            (true, false) => Lighting::Gouraud,
            (false, true) => Lighting::PerPixel,
            (false, false) => return Err("no lighting class selected".into()),
            (true, true) => return Err("both lighting classes selected".into()),
        };

        let colour = match key.colour_texture_dimension() {
            Some(dimension) => Some(ColourTexture {
                dimension,
                components: key.colour_texture_components().unwrap_or(4),
                decal: key.contains(FeatureKey::COLOUR_TEXTURE_DECAL),
            }),
            None => {
                if key.intersects(FeatureKey::COLOUR_TEXTURE_OUTPUT | FeatureKey::COLOUR_TEXTURE_DECAL) {
                    return Err("colour texture output bits without a colour texture".into());
                }
                None
            }
        };

        let second = match key.second_texture_dimension() {
            Some(dimension) => Some(SecondTexture {
                dimension,
                bump_map: key.contains(FeatureKey::SECOND_TEXTURE_BUMPMAP),
            }),
            None => {
                if key.contains(FeatureKey::SECOND_TEXTURE_BUMPMAP) {
                    return Err("bump mapping requires a second texture".into());
                }
                None
            }
        };

        let lookup = Self::decode_lookup(key)?;
        if lookup.is_some() && second.is_some() {
            return Err("second texture and colour lookup both need texture unit 1".into());
        }

        let lit_volume = Self::decode_lit_volume(key, colour)?;

        let layer = match (
            key.contains(FeatureKey::ORDER_INDEPENDENT_FIRST_LAYER),
            key.contains(FeatureKey::ORDER_INDEPENDENT_PEEL_LAYER),
        ) {
            (false, false) => None,
            (true, false) => Some(LayerRole::First),
            (false, true) => Some(LayerRole::Peel),
            (true, true) => return Err("first-layer and peel-layer bits both set".into()),
        };

        if lighting == Lighting::Gouraud {
            if second.is_some() {
                return Err("Gouraud shading has no second texture stage".into());
            }
            if lookup.is_some() {
                return Err("Gouraud shading has no colour lookup stage".into());
            }
            if lit_volume.is_some() {
                return Err("lit volumes require per-pixel lighting".into());
            }
        }

        Ok(Self {
            key,
            lighting,
            colour,
            second,
            lookup,
            lit_volume,
            layer,
            hints,
        })
    }

    fn decode_lookup(key: FeatureKey) -> Result<Option<ColourLookup>, String> {
        let channels: SmallVec<[usize; 4]> = key.dependent_channels().collect();
        let colour = key.contains(FeatureKey::DEPENDENT_TEXTURE_COLOUR);
        let alpha = key.contains(FeatureKey::DEPENDENT_TEXTURE_ALPHA);
        let per_component = key.contains(FeatureKey::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP);

        if channels.is_empty() {
            if colour || alpha || per_component {
                return Err("colour lookup mode set without lookup channels".into());
            }
            return Ok(None);
        }

        let output = match (colour, alpha, per_component) {
            (true, false, false) => LookupOutput::Colour,
            (false, true, false) => LookupOutput::Alpha,
            (true, true, false) => LookupOutput::ColourAndAlpha,
            (false, false, true) => LookupOutput::PerComponent,
            (false, false, false) => return Err("colour lookup channels without a lookup mode".into()),
            _ => return Err("per-component lookup combined with a colour/alpha lookup".into()),
        };
        if output != LookupOutput::PerComponent && channels.len() > 3 {
            return Err("a four-input colour lookup needs a 4D sampler".into());
        }
        Ok(Some(ColourLookup { channels, output }))
    }

    fn decode_lit_volume(
        key: FeatureKey,
        colour: Option<ColourTexture>,
    ) -> Result<Option<LitVolume>, String> {
        let intensity = key.contains(FeatureKey::LIT_VOLUME_INTENSITY_NORMAL_TEXTURE);
        let finite_difference = key.contains(FeatureKey::LIT_VOLUME_FINITE_DIFFERENCE_NORMAL);
        let scale_alpha = key.contains(FeatureKey::LIT_VOLUME_SCALE_ALPHA);

        let normal = match (intensity, finite_difference) {
            (false, false) => {
                if scale_alpha {
                    return Err("lit volume alpha scaling without a normal source".into());
                }
                return Ok(None);
            }
            (true, false) => VolumeNormal::IntensityTexture,
            (false, true) => VolumeNormal::FiniteDifference,
            (true, true) => return Err("two lit volume normal sources selected".into()),
        };
        let Some(colour) = colour else {
            return Err("lit volumes require a colour texture".into());
        };
        if normal == VolumeNormal::IntensityTexture && colour.components != 4 {
            return Err("intensity normals need a four-component colour texture".into());
        }
        Ok(Some(LitVolume {
            normal,
            scale_alpha,
        }))
    }

    #[inline]
    #[must_use]
    pub fn has_texture(&self) -> bool {
        self.colour.is_some() || self.second.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_layered(&self) -> bool {
        self.layer.is_some()
    }

    #[inline]
    #[must_use]
    pub fn peels(&self) -> bool {
        self.layer == Some(LayerRole::Peel)
    }

    #[inline]
    #[must_use]
    pub fn decal(&self) -> bool {
        self.colour.is_some_and(|colour| colour.decal)
    }

    #[inline]
    #[must_use]
    pub fn bump_mapped(&self) -> bool {
        self.second.is_some_and(|second| second.bump_map)
    }
}
