//! Material Module Tests
//!
//! Tests for:
//! - Attribute validation: alpha in range is applied, out of range is rejected
//! - Program swapping when textures come and go
//! - Transparency layers always restore the material's own program
//! - Reference counting: shared programs outlive one material, nothing is freed twice
//! - Change batching and notifications
//! - Command list replay, including after a shared program was rebuilt

use glam::DVec3;

use tinct::renderer::backend::{
    BackendCall, BackendCaps, ProgramBinding, RecordingBackend, RenderBackend,
};
use tinct::resources::material::{CompileStatus, ShadingMode, TextureSlot};
use tinct::resources::texture::TextureInfo;
use tinct::resources::uniforms::ShaderUniforms;
use tinct::{FeatureKey, MaterialHandle, MaterialModule, ShaderError, ShaderModule, ShaderModuleSettings};

struct Fixture {
    backend: RecordingBackend,
    shaders: ShaderModule,
    materials: MaterialModule,
}

impl Fixture {
    fn new(caps: BackendCaps) -> Self {
        Self::with_settings(caps, ShaderModuleSettings::default())
    }

    fn with_settings(caps: BackendCaps, settings: ShaderModuleSettings) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = RecordingBackend::new(caps);
        let shaders = ShaderModule::new(settings, &backend);
        Self {
            backend,
            shaders,
            materials: MaterialModule::new(),
        }
    }

    fn modern() -> Self {
        Self::new(BackendCaps::MODERN_SHADING)
    }

    fn textured(&mut self, name: &str) -> MaterialHandle {
        let handle = self.materials.create_material(Some(name)).unwrap();
        self.materials
            .edit(handle, |m| {
                m.set_shading(ShadingMode::Synthesized);
                m.set_texture(TextureSlot::Colour, Some(TextureInfo::new(10, 2, 4).shared()))
            })
            .unwrap();
        self.compile(handle);
        handle
    }

    fn compile(&mut self, handle: MaterialHandle) {
        self.materials
            .compile(handle, &mut self.shaders, &mut self.backend)
            .unwrap();
    }

    fn release(&mut self, handle: MaterialHandle) -> bool {
        self.materials
            .release(handle, &mut self.shaders, &mut self.backend)
            .unwrap()
    }

    fn key_of(&self, handle: MaterialHandle) -> Option<FeatureKey> {
        let program = self.materials.get(handle)?.program()?;
        self.shaders.program(program).map(|p| p.key())
    }
}

// ============================================================================
// Attribute validation
// ============================================================================

#[test]
fn alpha_in_range_reaches_the_backend() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    let handle = fx.materials.create_material(None)?;
    fx.materials.edit(handle, |m| m.set_alpha(0.4))?;
    fx.compile(handle);
    fx.materials.execute(handle, &fx.shaders, &mut fx.backend)?;

    let colours = fx.backend.material_colours().unwrap();
    assert!((colours.diffuse[3] - 0.4).abs() < 1e-6);
    assert!((colours.ambient[3] - 0.4).abs() < 1e-6);
    assert!((colours.specular[3] - 1.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn alpha_out_of_range_is_rejected_unchanged() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    let handle = fx.materials.create_material(None)?;
    fx.materials.edit(handle, |m| m.set_alpha(0.4))?;
    fx.materials.take_notifications();

    let err = fx.materials.edit(handle, |m| m.set_alpha(1.7)).unwrap_err();
    assert!(matches!(err, ShaderError::ValueOutOfRange { attribute: "alpha", .. }));
    assert!((fx.materials.get(handle).unwrap().alpha() - 0.4).abs() < f64::EPSILON);
    assert!(fx.materials.take_notifications().is_empty());
    Ok(())
}

// ============================================================================
// Program swapping
// ============================================================================

#[test]
fn second_texture_set_and_cleared() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    let handle = fx.textured("layered");
    let plain_key = fx.key_of(handle).unwrap();

    fx.materials.edit(handle, |m| {
        m.set_per_pixel_lighting(true);
        m.set_texture(TextureSlot::Second, Some(TextureInfo::new(11, 2, 3).shared()))?;
        m.set_bump_mapping(true)
    })?;
    fx.compile(handle);
    let bumped = fx.key_of(handle).unwrap();
    assert!(bumped.contains(FeatureKey::SECOND_TEXTURE_2 | FeatureKey::SECOND_TEXTURE_BUMPMAP));
    assert_eq!(fx.shaders.cache().len(), 1);

    fx.materials.edit(handle, |m| {
        m.set_per_pixel_lighting(false);
        m.set_texture(TextureSlot::Second, None)
    })?;
    fx.compile(handle);
    assert!(!fx.materials.get(handle).unwrap().bump_mapping());
    assert_eq!(fx.key_of(handle), Some(plain_key));
    assert_eq!(fx.shaders.cache().len(), 1);

    assert!(fx.release(handle));
    assert!(fx.shaders.cache().is_empty());
    Ok(())
}

#[test]
fn failed_compile_keeps_previous_program() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    let handle = fx.textured("stubborn");
    let before = fx.materials.get(handle).unwrap().program();

    fx.backend.fail_compile_containing(Some("void main"));
    fx.materials.edit(handle, |m| {
        m.set_texture(TextureSlot::Colour, Some(TextureInfo::new(12, 3, 1).shared()))
    })?;
    let _ = fx.materials.compile(handle, &mut fx.shaders, &mut fx.backend);
    assert_eq!(fx.materials.get(handle).unwrap().program(), before);
    assert_eq!(fx.shaders.cache().len(), 1);
    Ok(())
}

// ============================================================================
// Transparency layers
// ============================================================================

#[test]
fn layers_restore_the_material_program() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    let handle = fx.textured("glass");
    let own = fx.materials.get(handle).unwrap().program();

    for layer in 1..=3 {
        let mut drew = false;
        fx.materials.render_layer(
            handle,
            layer,
            (320, 240),
            &mut fx.shaders,
            &mut fx.backend,
            |_| {
                drew = true;
                Ok(())
            },
        )?;
        assert!(drew);
        assert_eq!(fx.materials.get(handle).unwrap().program(), own);
    }

    let failed = fx.materials.render_layer(
        handle,
        2,
        (320, 240),
        &mut fx.shaders,
        &mut fx.backend,
        |_| Err(ShaderError::Resource("lost context".into())),
    );
    assert!(failed.is_err());
    assert_eq!(fx.materials.get(handle).unwrap().program(), own);

    fx.materials.finish_layers(&mut fx.shaders, &mut fx.backend)?;
    assert_eq!(fx.shaders.cache().len(), 1);
    Ok(())
}

// ============================================================================
// Reference counting
// ============================================================================

#[test]
fn shared_program_outlives_one_material() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    let a = fx.textured("a");
    let b = fx.textured("b");
    let program = fx.materials.get(a).unwrap().program().unwrap();
    assert_eq!(fx.materials.get(b).unwrap().program(), Some(program));
    assert_eq!(fx.shaders.cache().ref_count(program), 2);

    assert!(fx.release(a));
    assert!(fx.shaders.cache().contains(program));
    fx.materials.execute(b, &fx.shaders, &mut fx.backend)?;
    let linked = fx.shaders.program(program).unwrap().linked_program().unwrap();
    assert_eq!(fx.backend.active_program(), ProgramBinding::Linked(linked));

    assert!(fx.release(b));
    assert!(!fx.shaders.cache().contains(program));
    assert_eq!(fx.backend.invalid_deletes(), 0);
    assert_eq!(fx.backend.live_programs(), 0);

    fx.materials.teardown(&mut fx.shaders, &mut fx.backend)?;
    fx.shaders.teardown()?;
    Ok(())
}

#[test]
fn teardown_leaves_held_materials_alive() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    fx.materials.define_standard_materials()?;
    let held = fx.textured("held");

    let err = fx
        .materials
        .teardown(&mut fx.shaders, &mut fx.backend)
        .unwrap_err();
    assert!(matches!(err, ShaderError::StillReferenced { what: "materials", count: 1 }));
    assert!(fx.materials.get(held).is_some());
    assert!(fx.shaders.teardown().is_err());

    fx.release(held);
    fx.shaders.teardown()?;
    Ok(())
}

// ============================================================================
// Notifications
// ============================================================================

#[test]
fn batched_edits_notify_once_per_material() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    let a = fx.materials.create_material(Some("a"))?;
    let b = fx.materials.create_material(Some("b"))?;

    fx.materials.begin_change();
    fx.materials.edit(a, |m| {
        m.set_diffuse(DVec3::new(0.2, 0.3, 0.4));
        Ok(())
    })?;
    fx.materials.edit(a, |m| m.set_shininess(0.5))?;
    fx.materials.edit(b, |m| m.set_alpha(0.9))?;
    assert!(fx.materials.take_notifications().is_empty());
    fx.materials.end_change()?;

    assert_eq!(fx.materials.take_notifications(), vec![a, b]);
    Ok(())
}

#[test]
fn texture_change_forces_recompile() -> anyhow::Result<()> {
    let mut fx = Fixture::modern();
    let handle = fx.textured("watched");
    assert_eq!(
        fx.materials.get(handle).unwrap().compile_status(),
        CompileStatus::Compiled
    );
    fx.materials.take_notifications();

    assert_eq!(fx.materials.texture_changed(tinct::resources::texture::TextureId(10)), 1);
    assert_eq!(fx.materials.take_notifications(), vec![handle]);
    assert!(matches!(
        fx.materials.execute(handle, &fx.shaders, &mut fx.backend),
        Err(ShaderError::NotCompiled)
    ));
    fx.compile(handle);
    Ok(())
}

// ============================================================================
// Command lists
// ============================================================================

#[test]
fn execute_replays_the_recorded_list() -> anyhow::Result<()> {
    let mut fx = Fixture::new(BackendCaps::MODERN_SHADING | BackendCaps::COMMAND_LISTS);
    let handle = fx.textured("recorded");
    let list = fx.materials.get(handle).unwrap().command_list().unwrap();

    fx.backend.clear_calls();
    fx.materials.execute(handle, &fx.shaders, &mut fx.backend)?;
    assert_eq!(fx.backend.calls(), &[BackendCall::CallCommandList(list)]);

    let uniforms = {
        let mut set = ShaderUniforms::new();
        set.set_real_values("tint", &[0.5])?;
        set.shared()
    };
    fx.materials.edit(handle, |m| {
        m.set_uniforms(Some(uniforms.clone()));
        Ok(())
    })?;
    fx.compile(handle);
    uniforms.write().set_real_values("tint", &[0.75])?;

    // Stale uniform values bind directly until the next compile
    fx.backend.clear_calls();
    fx.materials.execute(handle, &fx.shaders, &mut fx.backend)?;
    assert_eq!(
        fx.backend
            .count_calls(|call| *call == BackendCall::CallCommandList(list)),
        0
    );
    assert!(fx.backend.material_colours().is_some());

    fx.release(handle);
    assert_eq!(fx.backend.live_command_lists(), 0);
    Ok(())
}

#[test]
fn rebuilt_shared_program_does_not_strand_other_lists() -> anyhow::Result<()> {
    let settings = ShaderModuleSettings {
        force_recompile: true,
        ..Default::default()
    };
    let mut fx = Fixture::with_settings(
        BackendCaps::MODERN_SHADING | BackendCaps::COMMAND_LISTS,
        settings,
    );
    let a = fx.textured("first");
    let b = fx.textured("second");
    let program = fx.materials.get(a).unwrap().program().unwrap();
    assert_eq!(fx.materials.get(b).unwrap().program(), Some(program));

    fx.materials.edit(a, |m| {
        m.set_diffuse(DVec3::new(0.1, 0.2, 0.3));
        Ok(())
    })?;
    fx.compile(a);
    let linked = fx.shaders.program(program).unwrap().linked_program().unwrap();

    // The list of `second` was recorded against the old program objects
    fx.backend.clear_calls();
    fx.materials.execute(b, &fx.shaders, &mut fx.backend)?;
    assert_eq!(fx.backend.active_program(), ProgramBinding::Linked(linked));
    assert_eq!(
        fx.backend
            .count_calls(|call| matches!(call, BackendCall::CallCommandList(_))),
        1
    );

    fx.compile(b);
    let list = fx.materials.get(b).unwrap().command_list().unwrap();
    fx.backend.use_program(ProgramBinding::FixedFunction);
    fx.backend.clear_calls();
    fx.materials.execute(b, &fx.shaders, &mut fx.backend)?;
    assert_eq!(fx.backend.calls(), &[BackendCall::CallCommandList(list)]);
    assert_eq!(fx.backend.active_program(), ProgramBinding::Linked(linked));
    assert_eq!(fx.backend.invalid_deletes(), 0);
    Ok(())
}
