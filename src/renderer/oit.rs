//! Order-independent transparency layers.
//!
//! Depth peeling renders the scene once per transparency layer. The first layer
//! renders normally but writes depth for the next pass; every later layer discards
//! fragments at or in front of the depth captured by the previous one. Each role
//! needs its own program permutation, so [`render_layer`] derives a layer key from
//! the material's normal key, substitutes that program for the duration of the
//! layer and always puts the material's own program back afterwards.
//!
//! The layer program stays referenced in the material's order program slot so
//! consecutive peel layers reuse it. [`finish_layers`] gives it back once the whole
//! transparency pass is done.

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::RenderBackend;
use crate::renderer::cache::ProgramHandle;
use crate::renderer::material::{bind_material, execute_material};
use crate::renderer::module::ShaderModule;
use crate::renderer::program::BuiltinUniform;
use crate::resources::feature_key::FeatureKey;
use crate::resources::material::{CompileStatus, Material, TextureSlot};

/// Key of the layer program for `material`, or `None` when it renders unchanged.
///
/// User-authored programs are never rewritten. A material without a program is
/// layered as a Gouraud program with its colour texture.
fn base_key(shader_module: &ShaderModule, material: &Material) -> Result<Option<FeatureKey>> {
    match material.program().and_then(|handle| shader_module.program(handle)) {
        Some(program) if program.is_user_source() => Ok(None),
        Some(program) => Ok(Some(program.key())),
        None => {
            let mut key = FeatureKey::GOURAUD_SHADING;
            if let Some(bound) = material.texture(TextureSlot::Colour) {
                let texture = &bound.texture;
                let decal = texture.combine_mode() == crate::resources::texture::CombineMode::Decal;
                key |= FeatureKey::colour_texture(texture.dimension(), texture.component_count(), decal)
                    .ok_or_else(|| ShaderError::UnsupportedTexture {
                        slot: TextureSlot::Colour.index(),
                        reason: "colour texture cannot be layered".into(),
                    })?;
            }
            Ok(Some(key))
        }
    }
}

/// Makes the material's order program slot hold the program for `key`.
fn order_program_for(
    shader_module: &mut ShaderModule,
    material: &mut Material,
    key: FeatureKey,
    backend: &mut dyn RenderBackend,
) -> Result<ProgramHandle> {
    if let Some(handle) = material.order_program
        && shader_module.program(handle).map(|p| p.key()) == Some(key)
    {
        shader_module.compile_program(handle, backend)?;
        return Ok(handle);
    }
    let handle = shader_module.acquire_program(key, backend)?;
    if let Some(old) = material.order_program.replace(handle) {
        shader_module.release_program(old, backend)?;
    }
    Ok(handle)
}

/// Renders one transparency layer of `material` through `draw`.
///
/// `layer` 1 is the first layer, every larger index peels. The material's program
/// reference after the call equals the one before it, whether or not the layer
/// rendered.
pub fn render_layer<F>(
    shader_module: &mut ShaderModule,
    material: &mut Material,
    layer: u32,
    viewport: (u32, u32),
    backend: &mut dyn RenderBackend,
    draw: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn RenderBackend) -> Result<()>,
{
    if layer == 0 {
        return Err(ShaderError::InvalidArgument(
            "transparency layers are numbered from 1".into(),
        ));
    }
    if material.compile_status() != CompileStatus::Compiled {
        return Err(ShaderError::NotCompiled);
    }

    let Some(base) = base_key(shader_module, material)? else {
        execute_material(shader_module, material, backend)?;
        return draw(backend);
    };
    let Some(key) = base.with_order_independent_layer(layer) else {
        return Err(ShaderError::InvalidArgument(format!("invalid layer {layer}")));
    };
    let layer_program = order_program_for(shader_module, material, key, backend)?;
    log::trace!("Layer {layer} of {:?} renders with {key}", material.name());

    let saved = material.program.replace(layer_program);
    let result = draw_layer(shader_module, material, viewport, backend, draw);
    material.program = saved;
    result
}

fn draw_layer<F>(
    shader_module: &ShaderModule,
    material: &Material,
    viewport: (u32, u32),
    backend: &mut dyn RenderBackend,
    draw: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn RenderBackend) -> Result<()>,
{
    bind_material(shader_module.cache(), material, material.program(), backend)?;
    if let Some(program) = material.program().and_then(|h| shader_module.program(h)) {
        let (width, height) = viewport;
        program.write_builtin(
            backend,
            BuiltinUniform::TextureSize,
            [width as f32, height as f32, 1.0, 1.0],
        );
    }
    draw(backend)
}

/// Releases the layer program held since the last [`render_layer`].
pub fn finish_layers(
    shader_module: &mut ShaderModule,
    material: &mut Material,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    match material.order_program.take() {
        Some(handle) => shader_module.release_program(handle, backend).map(|_| ()),
        None => Ok(()),
    }
}
