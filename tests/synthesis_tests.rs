//! Synthesis and Program Cache Tests
//!
//! Tests for:
//! - Program identity: equal keys share one program, distinct keys never do
//! - Determinism: the same key synthesizes byte-identical text in both dialects
//! - Idempotent compile: compiling a compiled program allocates nothing
//! - Derived keys: RGBA 2D Gouraud and red-channel spectrum lookups
//! - ShaderModuleSettings: serde round trip and defaults

use tinct::renderer::backend::{BackendCall, BackendCaps, RecordingBackend};
use tinct::renderer::dialect::{Dialect, VendorHints, VendorId};
use tinct::renderer::synth::synthesize;
use tinct::resources::material::{ColourLookupChannels, ShadingMode, TextureSlot};
use tinct::resources::spectrum::SpectrumInfo;
use tinct::resources::texture::TextureInfo;
use tinct::{FeatureKey, Material, ShaderError, ShaderModule, ShaderModuleSettings};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn modern_module() -> (RecordingBackend, ShaderModule) {
    init_logger();
    let backend = RecordingBackend::new(BackendCaps::MODERN_SHADING);
    let module = ShaderModule::new(ShaderModuleSettings::default(), &backend);
    (backend, module)
}

fn fragment_of(module: &ShaderModule, material: &Material) -> String {
    let handle = material.program().expect("material has a program");
    module
        .program(handle)
        .and_then(|program| program.sources().fragment.clone())
        .expect("compiled program has fragment text")
}

// ============================================================================
// Program identity
// ============================================================================

#[test]
fn equal_keys_share_one_program() -> anyhow::Result<()> {
    let (mut backend, mut module) = modern_module();
    let key = FeatureKey::GOURAUD_SHADING | FeatureKey::colour_texture(2, 3, false).unwrap();

    let a = module.acquire_program(key, &mut backend)?;
    let b = module.acquire_program(key, &mut backend)?;
    assert_eq!(a, b);
    assert_eq!(module.cache().ref_count(a), 2);

    let c = module.acquire_program(FeatureKey::PER_PIXEL_LIGHTING, &mut backend)?;
    assert_ne!(a, c);
    assert_eq!(module.cache().len(), 2);

    for handle in [a, b, c] {
        module.release_program(handle, &mut backend)?;
    }
    module.teardown()?;
    assert_eq!(backend.live_programs(), 0);
    assert_eq!(backend.live_shaders(), 0);
    Ok(())
}

#[test]
fn user_programs_are_never_shared() -> anyhow::Result<()> {
    let (mut backend, mut module) = modern_module();
    let sources = tinct::renderer::ProgramSources::new("void main() {}", "void main() {}");
    let a = module.acquire_user_program(sources.clone(), &mut backend)?;
    let b = module.acquire_user_program(sources, &mut backend)?;
    assert_ne!(a, b);
    assert!(module.cache().lookup(FeatureKey::SPECIFIED_STRINGS).is_none());

    module.release_program(a, &mut backend)?;
    module.release_program(b, &mut backend)?;
    Ok(())
}

// ============================================================================
// Determinism and idempotence
// ============================================================================

#[test]
fn synthesis_is_deterministic_in_both_dialects() {
    let keys = [
        FeatureKey::GOURAUD_SHADING | FeatureKey::colour_texture(2, 4, false).unwrap(),
        FeatureKey::PER_PIXEL_LIGHTING
            | FeatureKey::colour_texture(3, 1, false).unwrap()
            | FeatureKey::LIT_VOLUME_FINITE_DIFFERENCE_NORMAL,
        FeatureKey::PER_PIXEL_LIGHTING | FeatureKey::ORDER_INDEPENDENT_PEEL_LAYER,
    ];
    for key in keys {
        for dialect in [Dialect::Modern, Dialect::Legacy] {
            let first = synthesize(key, dialect, VendorHints::default()).unwrap();
            let second = synthesize(key, dialect, VendorHints::default()).unwrap();
            assert_eq!(first, second, "{key} in {dialect:?}");
        }
    }
}

#[test]
fn compiling_twice_allocates_nothing() -> anyhow::Result<()> {
    let (mut backend, mut module) = modern_module();
    let handle = module.acquire_program(FeatureKey::PER_PIXEL_LIGHTING, &mut backend)?;
    let allocations = backend.allocations();
    backend.clear_calls();

    module.compile_program(handle, &mut backend)?;
    assert_eq!(backend.allocations(), allocations);
    assert!(backend.calls().is_empty());

    module.release_program(handle, &mut backend)?;
    Ok(())
}

#[test]
fn specified_strings_key_is_rejected() {
    let err = synthesize(FeatureKey::SPECIFIED_STRINGS, Dialect::Modern, VendorHints::default())
        .unwrap_err();
    assert!(matches!(err, ShaderError::UserSourceSynthesis));
}

// ============================================================================
// Derived keys end to end
// ============================================================================

#[test]
fn rgba_2d_gouraud_material() -> anyhow::Result<()> {
    let (mut backend, mut module) = modern_module();
    let mut material = Material::new();
    material.set_shading(ShadingMode::Synthesized);
    material.set_texture(TextureSlot::Colour, Some(TextureInfo::new(1, 2, 4).shared()))?;

    let key = material.derive_feature_key()?.unwrap();
    assert_eq!(
        key,
        FeatureKey::GOURAUD_SHADING | FeatureKey::colour_texture(2, 4, false).unwrap()
    );

    tinct::renderer::compile_material(&mut module, &mut material, &mut backend)?;
    let fragment = fragment_of(&module, &material);
    assert!(fragment.contains("sampler2D texture0"));
    assert_eq!(fragment.matches("texture2D(").count(), 1);
    assert!(fragment.contains("vec4 tex = texture2D(texture0, vec2(gl_TexCoord[0]));"));
    assert!(fragment.contains("gl_FragColor = finalCol * tex;"));
    assert!(!fragment.contains("dependentlookup"));
    assert!(!fragment.contains("sampler1D texture1;"));
    assert!(!fragment.contains("sampler2D texture1;"));

    tinct::renderer::release_material(&mut module, &mut material, &mut backend)?;
    module.teardown()?;
    Ok(())
}

#[test]
fn red_channel_spectrum_lookup() -> anyhow::Result<()> {
    let (mut backend, mut module) = modern_module();
    let mut material = Material::new();
    material.set_shading(ShadingMode::Synthesized);
    material.set_per_pixel_lighting(true);
    material.set_spectrum(Some(SpectrumInfo::new(7, 70).shared()));
    material.set_colour_lookup_channels(ColourLookupChannels::RED);

    let key = material.derive_feature_key()?.unwrap();
    assert_eq!(
        key,
        FeatureKey::PER_PIXEL_LIGHTING
            | FeatureKey::DEPENDENT_TEXTURE_1
            | FeatureKey::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP
    );

    tinct::renderer::compile_material(&mut module, &mut material, &mut backend)?;
    let fragment = fragment_of(&module, &material);
    // One sample, written to the red channel only
    assert_eq!(fragment.matches("texture1D(").count(), 1);
    assert!(fragment.contains("color.r = dependentlookup.r;"));
    assert!(!fragment.contains("color.g = dependentlookup"));
    assert!(!fragment.contains("color.b = dependentlookup"));
    assert!(!fragment.contains(".rgb = dependentlookup"));
    assert!(!fragment.contains("color = dependentlookup"));

    // Lookup texture sits on unit 1
    tinct::renderer::execute_material(&module, &material, &mut backend)?;
    assert_eq!(backend.bound_texture(1).map(|id| id.0), Some(70));

    tinct::renderer::release_material(&mut module, &mut material, &mut backend)?;
    Ok(())
}

#[test]
fn component_lookup_writes_only_selected_channel() {
    let key = FeatureKey::PER_PIXEL_LIGHTING
        | FeatureKey::DEPENDENT_TEXTURE_1
        | FeatureKey::DEPENDENT_TEXTURE_1D_COMPONENT_LOOKUP;
    let fragment = synthesize(key, Dialect::Modern, VendorHints::default())
        .unwrap()
        .fragment;
    assert!(fragment.contains("color.r = dependentlookup.r;"));
    assert!(!fragment.contains("color.g = dependentlookup.r;"));
    assert!(!fragment.contains("color.rgb = dependentlookup.rgb;"));
}

#[test]
fn legacy_backend_gets_assembly_programs() -> anyhow::Result<()> {
    init_logger();
    let mut backend = RecordingBackend::new(BackendCaps::LEGACY_PROGRAMS);
    let mut module = ShaderModule::new(ShaderModuleSettings::default(), &backend);
    assert_eq!(module.dialect()?, Dialect::Legacy);

    let handle = module.acquire_program(FeatureKey::GOURAUD_SHADING, &mut backend)?;
    let program = module.program(handle).unwrap();
    assert_eq!(program.dialect(), Some(Dialect::Legacy));
    assert!(program.linked_program().is_none());
    assert_eq!(
        backend.count_calls(|call| matches!(call, BackendCall::LinkProgram { .. })),
        0
    );

    module.release_program(handle, &mut backend)?;
    Ok(())
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn settings_round_trip_through_json() -> anyhow::Result<()> {
    let settings = ShaderModuleSettings {
        use_command_lists: false,
        preferred_dialect: Some(Dialect::Legacy),
        vendor_override: Some(VendorId::Ati),
        force_recompile: true,
        log_sources: true,
    };
    let json = serde_json::to_string(&settings)?;
    let back: ShaderModuleSettings = serde_json::from_str(&json)?;
    assert_eq!(back, settings);
    Ok(())
}

#[test]
fn missing_settings_fields_take_defaults() -> anyhow::Result<()> {
    let settings: ShaderModuleSettings = serde_json::from_str(r#"{ "log_sources": true }"#)?;
    assert!(settings.log_sources);
    assert!(settings.use_command_lists);
    assert_eq!(settings.preferred_dialect, None);
    Ok(())
}
