//! Materials
//!
//! A [`Material`] describes the appearance of a rendered surface: fixed-function
//! colours, up to four textures, an optional colour-lookup spectrum, user uniform
//! overrides and the toggles that select a synthesized program. Materials never talk
//! to the backend themselves; the driver in [`crate::renderer::material`] compiles and
//! binds them against a [`ShaderModule`](crate::renderer::module::ShaderModule).
//!
//! Every edit that can change what is drawn bumps the material's version and
//! returns it to [`CompileStatus::NotCompiled`].

mod macros;
pub mod module;
pub mod standard;

pub use module::{MaterialHandle, MaterialModule};

use bitflags::bitflags;
use glam::{DVec3, DVec4};

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::CommandListId;
use crate::renderer::cache::ProgramHandle;
use crate::renderer::program::ProgramSources;
use crate::resources::feature_key::FeatureKey;
use crate::resources::spectrum::{SharedSpectrum, SpectrumColourComponents, SpectrumId};
use crate::resources::texture::{CombineMode, FieldId, SharedTexture, TextureId};
use crate::resources::uniforms::{SharedUniforms, UniformSetId};
use crate::resources::version_tracker::ChangeTracker;

// ============================================================================
// Toggles
// ============================================================================

bitflags! {
    /// Colour channels fed through the spectrum lookup.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColourLookupChannels: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
    }
}

bitflags! {
    /// Lighting of intensity volumes rendered from the primary texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LitVolumeFlags: u8 {
        /// Normals are stored in the `gba` channels of the primary texture.
        const INTENSITY_NORMAL_TEXTURE = 1 << 0;
        /// Normals are estimated by central differences of the primary texture.
        const FINITE_DIFFERENCE_NORMAL = 1 << 1;
        /// Alpha is scaled by the normal magnitude.
        const SCALE_ALPHA = 1 << 2;
    }
}

/// How the material's program is obtained.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ShadingMode {
    /// No program; the backend's fixed-function pipeline.
    #[default]
    FixedFunction,
    /// A program synthesized from the material's feature toggles.
    Synthesized,
    /// A program compiled from caller-supplied text.
    UserSource(ProgramSources),
}

/// Tri-state compile status of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompileStatus {
    #[default]
    NotCompiled,
    /// Only the source field of a bound texture changed.
    ChildNotCompiled,
    Compiled,
}

// ============================================================================
// Texture slots
// ============================================================================

/// One of the four texture slots. Slot `n` binds to texture unit `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Primary colour texture, drives the colour texture key bits.
    Colour,
    /// Second texture, optionally a bump map. Shares unit 1 with the spectrum.
    Second,
    Third,
    Fourth,
}

impl TextureSlot {
    pub const ALL: [Self; 4] = [Self::Colour, Self::Second, Self::Third, Self::Fourth];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Colour => 0,
            Self::Second => 1,
            Self::Third => 2,
            Self::Fourth => 3,
        }
    }

    #[inline]
    #[must_use]
    pub const fn unit(self) -> u32 {
        self.index() as u32
    }
}

/// A texture bound to a slot, optionally fed by a live field.
#[derive(Debug, Clone)]
pub struct BoundTexture {
    pub texture: SharedTexture,
    /// Field the texture image is evaluated from. Changes to it are forwarded to the material.
    pub field: Option<FieldId>,
}

impl BoundTexture {
    #[inline]
    #[must_use]
    pub fn id(&self) -> TextureId {
        self.texture.id()
    }
}

// ============================================================================
// Material
// ============================================================================

#[derive(Debug)]
pub struct Material {
    pub(crate) name: Option<String>,

    ambient: DVec3,
    diffuse: DVec3,
    emission: DVec3,
    specular: DVec3,
    alpha: f64,
    shininess: f64,
    lit_volume_normal_scaling: DVec4,

    textures: [Option<BoundTexture>; 4],
    spectrum: Option<SharedSpectrum>,
    uniforms: Option<SharedUniforms>,

    shading: ShadingMode,
    per_pixel_lighting: bool,
    bump_mapping: bool,
    colour_lookup: ColourLookupChannels,
    lit_volume: LitVolumeFlags,

    // Compiled state, owned by the driver
    pub(crate) program: Option<ProgramHandle>,
    pub(crate) order_program: Option<ProgramHandle>,
    pub(crate) command_list: Option<CommandListId>,
    pub(crate) compile_status: CompileStatus,
    pub(crate) compiled_uniforms: Option<(UniformSetId, u64)>,
    /// Program generation the command list was recorded against.
    pub(crate) recorded_generation: Option<u64>,

    pub(crate) managed: bool,
    tracker: ChangeTracker,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            ambient: DVec3::ONE,
            diffuse: DVec3::ONE,
            emission: DVec3::ZERO,
            specular: DVec3::ZERO,
            alpha: 1.0,
            shininess: 0.0,
            lit_volume_normal_scaling: DVec4::ONE,
            textures: [None, None, None, None],
            spectrum: None,
            uniforms: None,
            shading: ShadingMode::FixedFunction,
            per_pixel_lighting: false,
            bump_mapping: false,
            colour_lookup: ColourLookupChannels::empty(),
            lit_volume: LitVolumeFlags::empty(),
            program: None,
            order_program: None,
            command_list: None,
            compile_status: CompileStatus::NotCompiled,
            compiled_uniforms: None,
            recorded_generation: None,
            managed: false,
            tracker: ChangeTracker::new(),
        }
    }
}

crate::impl_material_api!(
    Material,
    colours: [
        (ambient,  set_ambient,  "Ambient reflectance."),
        (diffuse,  set_diffuse,  "Diffuse reflectance, also the colour of unlit lines."),
        (emission, set_emission, "Emitted colour."),
        (specular, set_specular, "Specular reflectance."),
    ],
    scalars: [
        (alpha,     set_alpha,     "alpha",     "Opacity in [0, 1]."),
        (shininess, set_shininess, "shininess", "Specular exponent in [0, 1], scaled by 128 when bound."),
    ]
);

impl Material {
    /// A white, matte, fixed-function material.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Edit counter, bumped once per effective change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    /// Marks a change that invalidates the compiled state.
    fn touch(&mut self) {
        self.tracker.changed();
        self.compile_status = CompileStatus::NotCompiled;
    }

    /// Per-axis factors applied to lit-volume normals, 4th component unused.
    #[must_use]
    pub fn lit_volume_normal_scaling(&self) -> DVec4 {
        self.lit_volume_normal_scaling
    }

    pub fn set_lit_volume_normal_scaling(&mut self, scaling: DVec4) {
        if self.lit_volume_normal_scaling != scaling {
            self.lit_volume_normal_scaling = scaling;
            self.touch();
        }
    }

    // ------------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn texture(&self, slot: TextureSlot) -> Option<&BoundTexture> {
        self.textures[slot.index()].as_ref()
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureSlot, &BoundTexture)> {
        TextureSlot::ALL
            .into_iter()
            .filter_map(|slot| self.texture(slot).map(|bound| (slot, bound)))
    }

    /// Binds `texture` to `slot`, or clears the slot with `None`.
    ///
    /// Clearing the second texture also turns bump mapping off.
    pub fn set_texture(&mut self, slot: TextureSlot, texture: Option<SharedTexture>) -> Result<()> {
        self.set_bound_texture(slot, texture.map(|texture| BoundTexture { texture, field: None }))
    }

    /// Binds a texture whose image is evaluated from `field`.
    pub fn set_texture_from_field(
        &mut self,
        slot: TextureSlot,
        texture: SharedTexture,
        field: FieldId,
    ) -> Result<()> {
        self.set_bound_texture(
            slot,
            Some(BoundTexture {
                texture,
                field: Some(field),
            }),
        )
    }

    fn set_bound_texture(&mut self, slot: TextureSlot, bound: Option<BoundTexture>) -> Result<()> {
        if let Some(bound) = &bound {
            validate_texture(slot, &bound.texture)?;
        }
        let current = &self.textures[slot.index()];
        let unchanged = match (current, &bound) {
            (None, None) => true,
            (Some(a), Some(b)) => a.id() == b.id() && a.field == b.field,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }
        if slot == TextureSlot::Second && bound.is_none() {
            self.bump_mapping = false;
        }
        self.textures[slot.index()] = bound;
        self.touch();
        Ok(())
    }

    /// Whether any slot is fed by `field`.
    #[must_use]
    pub fn uses_field(&self, field: FieldId) -> bool {
        self.textures
            .iter()
            .flatten()
            .any(|bound| bound.field == Some(field))
    }

    /// Whether any slot holds `texture`.
    #[must_use]
    pub fn uses_texture(&self, texture: TextureId) -> bool {
        self.textures
            .iter()
            .flatten()
            .any(|bound| bound.id() == texture)
    }

    // ------------------------------------------------------------------------
    // Spectrum and uniforms
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn spectrum(&self) -> Option<&SharedSpectrum> {
        self.spectrum.as_ref()
    }

    pub fn set_spectrum(&mut self, spectrum: Option<SharedSpectrum>) {
        let unchanged = match (&self.spectrum, &spectrum) {
            (None, None) => true,
            (Some(a), Some(b)) => a.id() == b.id(),
            _ => false,
        };
        if !unchanged {
            self.spectrum = spectrum;
            self.touch();
        }
    }

    #[must_use]
    pub fn uses_spectrum(&self, spectrum: SpectrumId) -> bool {
        self.spectrum.as_ref().is_some_and(|s| s.id() == spectrum)
    }

    #[must_use]
    pub fn uniforms(&self) -> Option<&SharedUniforms> {
        self.uniforms.as_ref()
    }

    pub fn set_uniforms(&mut self, uniforms: Option<SharedUniforms>) {
        let id = |u: &SharedUniforms| u.read().id();
        let unchanged = match (&self.uniforms, &uniforms) {
            (None, None) => true,
            (Some(a), Some(b)) => id(a) == id(b),
            _ => false,
        };
        if !unchanged {
            self.uniforms = uniforms;
            self.touch();
        }
    }

    #[must_use]
    pub fn uses_uniforms(&self, set: UniformSetId) -> bool {
        self.uniforms.as_ref().is_some_and(|u| u.read().id() == set)
    }

    /// Identity and version of the attached uniform set right now.
    pub(crate) fn uniforms_snapshot(&self) -> Option<(UniformSetId, u64)> {
        self.uniforms.as_ref().map(|u| {
            let set = u.read();
            (set.id(), set.version())
        })
    }

    /// True when the uniform set was edited after the last compile.
    #[must_use]
    pub fn uniforms_stale(&self) -> bool {
        self.compiled_uniforms != self.uniforms_snapshot()
    }

    // ------------------------------------------------------------------------
    // Program selection
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn shading(&self) -> &ShadingMode {
        &self.shading
    }

    pub fn set_shading(&mut self, shading: ShadingMode) {
        if self.shading != shading {
            self.shading = shading;
            self.touch();
        }
    }

    /// Switches to a user-authored program.
    ///
    /// Stages left empty keep the text of the current user program, if any.
    pub fn set_program_sources(&mut self, sources: ProgramSources) -> Result<()> {
        let merged = match &self.shading {
            ShadingMode::UserSource(current) => ProgramSources {
                vertex: sources.vertex.or_else(|| current.vertex.clone()),
                fragment: sources.fragment.or_else(|| current.fragment.clone()),
                geometry: sources.geometry.or_else(|| current.geometry.clone()),
            },
            _ => sources,
        };
        merged.source_dialect()?;
        self.set_shading(ShadingMode::UserSource(merged));
        Ok(())
    }

    #[must_use]
    pub fn per_pixel_lighting(&self) -> bool {
        self.per_pixel_lighting
    }

    pub fn set_per_pixel_lighting(&mut self, enabled: bool) {
        if self.per_pixel_lighting != enabled {
            self.per_pixel_lighting = enabled;
            self.touch();
        }
    }

    #[must_use]
    pub fn bump_mapping(&self) -> bool {
        self.bump_mapping
    }

    /// Treats the second texture as a normal map. Requires a second texture.
    pub fn set_bump_mapping(&mut self, enabled: bool) -> Result<()> {
        if enabled && self.texture(TextureSlot::Second).is_none() {
            return Err(ShaderError::InvalidArgument(
                "bump mapping requires a second texture containing a normal map".into(),
            ));
        }
        if self.bump_mapping != enabled {
            self.bump_mapping = enabled;
            self.touch();
        }
        Ok(())
    }

    #[must_use]
    pub fn colour_lookup_channels(&self) -> ColourLookupChannels {
        self.colour_lookup
    }

    pub fn set_colour_lookup_channels(&mut self, channels: ColourLookupChannels) {
        if self.colour_lookup != channels {
            self.colour_lookup = channels;
            self.touch();
        }
    }

    #[must_use]
    pub fn lit_volume(&self) -> LitVolumeFlags {
        self.lit_volume
    }

    pub fn set_lit_volume(&mut self, flags: LitVolumeFlags) {
        if self.lit_volume != flags {
            self.lit_volume = flags;
            self.touch();
        }
    }

    // ------------------------------------------------------------------------
    // Compiled state
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn compile_status(&self) -> CompileStatus {
        self.compile_status
    }

    /// Handle of the program used for normal rendering.
    #[must_use]
    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    /// Program substituted while an OIT layer renders.
    #[must_use]
    pub fn order_program(&self) -> Option<ProgramHandle> {
        self.order_program
    }

    #[must_use]
    pub fn command_list(&self) -> Option<CommandListId> {
        self.command_list
    }

    /// Palette materials persist without external references.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// A bound field changed; the texture image must be re-evaluated.
    pub(crate) fn child_changed(&mut self) {
        if self.compile_status != CompileStatus::NotCompiled {
            self.compile_status = CompileStatus::ChildNotCompiled;
        }
    }

    /// An external dependency changed in a way that needs a full recompile.
    pub(crate) fn dependency_changed(&mut self) {
        self.compile_status = CompileStatus::NotCompiled;
    }

    // ------------------------------------------------------------------------
    // Feature key
    // ------------------------------------------------------------------------

    /// Derives the key of the synthesized program this material needs.
    ///
    /// Returns `None` for fixed-function and user-source materials. The result
    /// depends only on the current toggles, textures and spectrum.
    pub fn derive_feature_key(&self) -> Result<Option<FeatureKey>> {
        if self.shading != ShadingMode::Synthesized {
            return Ok(None);
        }

        let mut key = if self.per_pixel_lighting {
            FeatureKey::PER_PIXEL_LIGHTING
        } else {
            FeatureKey::GOURAUD_SHADING
        };

        if let Some(bound) = self.texture(TextureSlot::Colour) {
            let texture = &bound.texture;
            let decal = texture.combine_mode() == CombineMode::Decal;
            key |= FeatureKey::colour_texture(texture.dimension(), texture.component_count(), decal)
                .ok_or_else(|| unsupported(TextureSlot::Colour, texture))?;
        }

        if let Some(bound) = self.texture(TextureSlot::Second) {
            key |= FeatureKey::second_texture(bound.texture.dimension())
                .ok_or_else(|| unsupported(TextureSlot::Second, &bound.texture))?;
            if self.bump_mapping {
                key |= FeatureKey::SECOND_TEXTURE_BUMPMAP;
            }
        }

        if let Some(spectrum) = &self.spectrum {
            key |= lookup_bits(self.colour_lookup, spectrum);
        }

        if self.lit_volume.contains(LitVolumeFlags::INTENSITY_NORMAL_TEXTURE) {
            key |= FeatureKey::LIT_VOLUME_INTENSITY_NORMAL_TEXTURE;
        }
        if self.lit_volume.contains(LitVolumeFlags::FINITE_DIFFERENCE_NORMAL) {
            key |= FeatureKey::LIT_VOLUME_FINITE_DIFFERENCE_NORMAL;
        }
        if self.lit_volume.contains(LitVolumeFlags::SCALE_ALPHA) {
            key |= FeatureKey::LIT_VOLUME_SCALE_ALPHA;
        }

        Ok(Some(key))
    }
}

/// Dependent texture bits for the selected lookup channels of `spectrum`.
fn lookup_bits(channels: ColourLookupChannels, spectrum: &SharedSpectrum) -> FeatureKey {
    if channels.is_empty() {
        return FeatureKey::empty();
    }
    let mut key = FeatureKey::empty();
    for (index, bit) in FeatureKey::DEPENDENT_CHANNEL_BITS.into_iter().enumerate() {
        if channels.bits() & (1 << index) != 0 {
            key |= bit;
        }
    }

    let data_components = spectrum.number_of_data_components();
    let colours = spectrum.colour_components();
    // A scalar colour map writes only the channels it reads
    if data_components == 1 && !colours.contains(SpectrumColourComponents::ALPHA) {
        key |= FeatureKey::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP;
    } else if channels.bits().count_ones() == data_components {
        key |= if colours == SpectrumColourComponents::ALPHA {
            FeatureKey::DEPENDENT_TEXTURE_ALPHA
        } else if colours.contains(SpectrumColourComponents::ALPHA) {
            FeatureKey::DEPENDENT_TEXTURE_COLOUR | FeatureKey::DEPENDENT_TEXTURE_ALPHA
        } else {
            FeatureKey::DEPENDENT_TEXTURE_COLOUR
        };
    } else if data_components == 1 {
        key |= FeatureKey::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP;
    }
    key
}

fn unsupported(slot: TextureSlot, texture: &SharedTexture) -> ShaderError {
    ShaderError::UnsupportedTexture {
        slot: slot.index(),
        reason: format!(
            "{} component {}D texture",
            texture.component_count(),
            texture.dimension()
        ),
    }
}

fn validate_texture(slot: TextureSlot, texture: &SharedTexture) -> Result<()> {
    let ok = match slot {
        TextureSlot::Colour => {
            FeatureKey::colour_texture(texture.dimension(), texture.component_count(), false).is_some()
        }
        TextureSlot::Second => FeatureKey::second_texture(texture.dimension()).is_some(),
        TextureSlot::Third | TextureSlot::Fourth => (1..=3).contains(&texture.dimension()),
    };
    if ok {
        Ok(())
    } else {
        log::error!("Rejected texture {:?} for slot {slot:?}", texture.id());
        Err(unsupported(slot, texture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::spectrum::SpectrumInfo;
    use crate::resources::texture::TextureInfo;

    fn synthesized() -> Material {
        let mut material = Material::new();
        material.set_shading(ShadingMode::Synthesized);
        material
    }

    #[test]
    fn defaults_are_white_and_matte() {
        let material = Material::new();
        assert_eq!(material.ambient(), DVec3::ONE);
        assert_eq!(material.diffuse(), DVec3::ONE);
        assert_eq!(material.specular(), DVec3::ZERO);
        assert_eq!(material.alpha(), 1.0);
        assert_eq!(material.shininess(), 0.0);
        assert!(material.program().is_none());
        assert_eq!(material.compile_status(), CompileStatus::NotCompiled);
    }

    #[test]
    fn unchanged_value_does_not_bump_version() {
        let mut material = Material::new();
        let version = material.version();
        material.set_diffuse(DVec3::ONE);
        assert_eq!(material.version(), version);
        material.set_diffuse(DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(material.version(), version + 1);
    }

    #[test]
    fn shininess_is_range_checked() {
        let mut material = Material::new();
        material.set_shininess(0.25).unwrap();
        let err = material.set_shininess(-0.1).unwrap_err();
        assert!(matches!(err, ShaderError::ValueOutOfRange { attribute: "shininess", .. }));
        assert_eq!(material.shininess(), 0.25);
        assert!(material.set_alpha(f64::NAN).is_err());
    }

    #[test]
    fn fixed_function_has_no_key() {
        let material = Material::new();
        assert_eq!(material.derive_feature_key().unwrap(), None);
    }

    #[test]
    fn lighting_class_follows_toggle() {
        let mut material = synthesized();
        assert_eq!(
            material.derive_feature_key().unwrap(),
            Some(FeatureKey::GOURAUD_SHADING)
        );
        material.set_per_pixel_lighting(true);
        assert_eq!(
            material.derive_feature_key().unwrap(),
            Some(FeatureKey::PER_PIXEL_LIGHTING)
        );
    }

    #[test]
    fn decal_texture_sets_decal_bit() {
        let mut material = synthesized();
        let texture = TextureInfo::new(1, 3, 1)
            .with_combine_mode(CombineMode::Decal)
            .shared();
        material.set_texture(TextureSlot::Colour, Some(texture)).unwrap();
        let key = material.derive_feature_key().unwrap().unwrap();
        assert!(key.contains(FeatureKey::COLOUR_TEXTURE_DECAL));
        assert_eq!(key.colour_texture_dimension(), Some(3));
        assert_eq!(key.colour_texture_components(), Some(1));
    }

    #[test]
    fn unsupported_textures_are_rejected() {
        let mut material = synthesized();
        let err = material
            .set_texture(TextureSlot::Colour, Some(TextureInfo::new(1, 4, 4).shared()))
            .unwrap_err();
        assert!(matches!(err, ShaderError::UnsupportedTexture { slot: 0, .. }));
        assert!(material.texture(TextureSlot::Colour).is_none());
    }

    #[test]
    fn bump_mapping_needs_second_texture() {
        let mut material = synthesized();
        assert!(material.set_bump_mapping(true).is_err());
        assert!(!material.bump_mapping());

        material
            .set_texture(TextureSlot::Second, Some(TextureInfo::new(2, 2, 3).shared()))
            .unwrap();
        material.set_bump_mapping(true).unwrap();
        let key = material.derive_feature_key().unwrap().unwrap();
        assert!(key.contains(FeatureKey::SECOND_TEXTURE_2 | FeatureKey::SECOND_TEXTURE_BUMPMAP));

        material.set_texture(TextureSlot::Second, None).unwrap();
        assert!(!material.bump_mapping());
    }

    #[test]
    fn lookup_modes() {
        let mut material = synthesized();
        material.set_per_pixel_lighting(true);
        material.set_colour_lookup_channels(ColourLookupChannels::RED);

        let rgb = SpectrumInfo::new(1, 10).shared();
        material.set_spectrum(Some(rgb));
        let key = material.derive_feature_key().unwrap().unwrap();
        assert!(key.contains(
            FeatureKey::DEPENDENT_TEXTURE_1 | FeatureKey::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP
        ));
        assert!(!key.contains(FeatureKey::DEPENDENT_TEXTURE_COLOUR));

        let two_axes = SpectrumInfo::new(4, 13)
            .with_data_components(2, [64, 64, 0])
            .shared();
        material.set_spectrum(Some(two_axes));
        material.set_colour_lookup_channels(ColourLookupChannels::RED | ColourLookupChannels::GREEN);
        let key = material.derive_feature_key().unwrap().unwrap();
        assert!(key.contains(FeatureKey::DEPENDENT_TEXTURE_COLOUR));
        assert!(!key.contains(FeatureKey::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP));
        material.set_colour_lookup_channels(ColourLookupChannels::RED);

        let alpha_only = SpectrumInfo::new(2, 11)
            .with_colour_components(SpectrumColourComponents::ALPHA)
            .shared();
        material.set_spectrum(Some(alpha_only));
        let key = material.derive_feature_key().unwrap().unwrap();
        assert!(key.contains(FeatureKey::DEPENDENT_TEXTURE_ALPHA));
        assert!(!key.contains(FeatureKey::DEPENDENT_TEXTURE_COLOUR));

        let rgba = SpectrumInfo::new(3, 12)
            .with_colour_components(SpectrumColourComponents::RGBA)
            .shared();
        material.set_spectrum(Some(rgba));
        let key = material.derive_feature_key().unwrap().unwrap();
        assert!(key.contains(FeatureKey::DEPENDENT_TEXTURE_COLOUR | FeatureKey::DEPENDENT_TEXTURE_ALPHA));

        material.set_colour_lookup_channels(ColourLookupChannels::RED | ColourLookupChannels::BLUE);
        let key = material.derive_feature_key().unwrap().unwrap();
        assert!(key.contains(FeatureKey::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP));
        assert_eq!(key.dependent_channels().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn lookup_channels_without_spectrum_are_ignored() {
        let mut material = synthesized();
        material.set_colour_lookup_channels(ColourLookupChannels::GREEN);
        assert_eq!(
            material.derive_feature_key().unwrap(),
            Some(FeatureKey::GOURAUD_SHADING)
        );
    }

    #[test]
    fn user_sources_merge_missing_stages() {
        let mut material = Material::new();
        material
            .set_program_sources(ProgramSources::new("void main() {}", "void main() { }"))
            .unwrap();
        material
            .set_program_sources(ProgramSources {
                vertex: None,
                fragment: Some("void main() { discard; }".into()),
                geometry: None,
            })
            .unwrap();
        let ShadingMode::UserSource(sources) = material.shading() else {
            panic!("expected user sources");
        };
        assert_eq!(sources.vertex.as_deref(), Some("void main() {}"));
        assert_eq!(sources.fragment.as_deref(), Some("void main() { discard; }"));
        assert_eq!(material.derive_feature_key().unwrap(), None);
    }

    #[test]
    fn field_change_only_demotes_compiled_state() {
        let mut material = Material::new();
        material.child_changed();
        assert_eq!(material.compile_status(), CompileStatus::NotCompiled);
        material.compile_status = CompileStatus::Compiled;
        material.child_changed();
        assert_eq!(material.compile_status(), CompileStatus::ChildNotCompiled);
    }
}
