//! Material compile and execute driver.
//!
//! Materials are compiled in two phases. [`compile_material`] resolves the
//! material's program through the [`ShaderModule`], prepares every texture it binds
//! and, when the backend supports it, records the whole bind sequence into a command
//! list. [`execute_material`] then either replays that list or issues the bind calls
//! directly.
//!
//! Children are always compiled before the material's own list is opened, so no
//! second list is ever started while one is recording.

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::{CommandListId, MaterialColours, ProgramBinding, RenderBackend};
use crate::renderer::cache::{ProgramCache, ProgramHandle};
use crate::renderer::module::ShaderModule;
use crate::renderer::program::{BuiltinUniform, CompiledProgram};
use crate::resources::material::{CompileStatus, Material, ShadingMode, TextureSlot};
use crate::resources::spectrum::LookupRemap;

/// Brings `material` to [`CompileStatus::Compiled`].
///
/// The program reference is only swapped once the replacement compiled, so a
/// failure leaves the material on its previous program.
pub fn compile_material(
    shader_module: &mut ShaderModule,
    material: &mut Material,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    let status = material.compile_status();
    let records = shader_module.records_command_lists();
    let list_stale = records && recorded_list(shader_module.cache(), material).is_none();
    if status == CompileStatus::Compiled && !material.uniforms_stale() && !list_stale {
        return Ok(());
    }

    if status == CompileStatus::NotCompiled {
        if let Err(err) = update_program(shader_module, material, backend) {
            log::error!("Material {:?} failed to compile: {err}", material.name());
            return Err(err);
        }
    } else if let Some(handle) = material.program
        && (status == CompileStatus::ChildNotCompiled
            || !shader_module.program(handle).is_some_and(CompiledProgram::is_compiled))
    {
        shader_module.compile_program(handle, backend)?;
    }

    prepare_textures(material, backend);

    let rerecord = status == CompileStatus::NotCompiled
        || recorded_list(shader_module.cache(), material).is_none();
    if records && rerecord {
        record_material(shader_module, material, backend)?;
    }

    material.compiled_uniforms = material.uniforms_snapshot();
    material.compile_status = CompileStatus::Compiled;
    log::debug!("Compiled material {:?}", material.name());
    Ok(())
}

/// Points the material at the program its current state requires.
fn update_program(
    shader_module: &mut ShaderModule,
    material: &mut Material,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    let current = material.program.and_then(|handle| {
        shader_module
            .program(handle)
            .map(|program| (handle, program.key(), program.is_user_source()))
    });

    match material.shading().clone() {
        ShadingMode::FixedFunction => {
            if let Some(old) = material.program.take() {
                shader_module.release_program(old, backend)?;
            }
        }
        ShadingMode::Synthesized => {
            let Some(key) = material.derive_feature_key()? else {
                return Err(ShaderError::InvalidArgument(
                    "synthesized material derived no feature key".into(),
                ));
            };
            match current {
                Some((handle, current_key, false)) if current_key == key => {
                    shader_module.compile_program(handle, backend)?;
                }
                _ => {
                    let handle = shader_module.acquire_program(key, backend)?;
                    swap_program(shader_module, material, handle, backend)?;
                }
            }
        }
        ShadingMode::UserSource(sources) => match current {
            Some((handle, _, true)) => {
                shader_module.replace_program_sources(handle, sources, backend)?;
                shader_module.compile_program(handle, backend)?;
            }
            _ => {
                let handle = shader_module.acquire_user_program(sources, backend)?;
                swap_program(shader_module, material, handle, backend)?;
            }
        },
    }
    Ok(())
}

fn swap_program(
    shader_module: &mut ShaderModule,
    material: &mut Material,
    handle: ProgramHandle,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    if let Some(old) = material.program.replace(handle) {
        shader_module.release_program(old, backend)?;
    }
    Ok(())
}

fn prepare_textures(material: &Material, backend: &mut dyn RenderBackend) {
    for (_, bound) in material.textures() {
        backend.prepare_texture(bound.id());
    }
    if let Some(spectrum) = material.spectrum() {
        backend.prepare_texture(spectrum.lookup_texture());
    }
}

fn record_material(
    shader_module: &mut ShaderModule,
    material: &mut Material,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    let list = match material.command_list {
        Some(list) => list,
        None => {
            let list = backend
                .create_command_list()
                .ok_or_else(|| ShaderError::Resource("material command list".into()))?;
            material.command_list = Some(list);
            list
        }
    };

    let program = material.program;
    material.recorded_generation = None;
    let generation = {
        let material: &Material = material;
        let (cache, recorder) = shader_module.parts_mut();
        let cache: &ProgramCache = cache;
        recorder.record(backend, list, |backend| {
            bind_material(cache, material, program, backend)
        })?;
        program_generation(cache, program)
    };
    material.recorded_generation = generation;
    Ok(())
}

fn program_generation(cache: &ProgramCache, program: Option<ProgramHandle>) -> Option<u64> {
    program
        .and_then(|handle| cache.get(handle))
        .map(CompiledProgram::generation)
}

/// The material's command list, unless its program was rebuilt or its uniforms
/// edited since the list was recorded.
fn recorded_list(cache: &ProgramCache, material: &Material) -> Option<CommandListId> {
    let list = material.command_list?;
    let current = program_generation(cache, material.program);
    (!material.uniforms_stale() && current == material.recorded_generation).then_some(list)
}

/// Draw-time entry point: replays the recorded list while it is current, otherwise
/// binds directly.
pub fn execute_material(
    shader_module: &ShaderModule,
    material: &Material,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    if material.compile_status() != CompileStatus::Compiled {
        return Err(ShaderError::NotCompiled);
    }
    match recorded_list(shader_module.cache(), material) {
        Some(list) => {
            backend.call_command_list(list);
            Ok(())
        }
        None => bind_material(shader_module.cache(), material, material.program(), backend),
    }
}

/// Issues every bind call for `material`, activating `program` in place of its own.
pub fn bind_material(
    cache: &ProgramCache,
    material: &Material,
    program: Option<ProgramHandle>,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    backend.set_material_colours(&material_colours(material));

    let texture = |slot| material.texture(slot).map(|bound| bound.id());
    backend.bind_texture(TextureSlot::Colour.unit(), texture(TextureSlot::Colour));
    let unit_one = texture(TextureSlot::Second)
        .or_else(|| material.spectrum().map(|spectrum| spectrum.lookup_texture()));
    backend.bind_texture(TextureSlot::Second.unit(), unit_one);
    backend.bind_texture(TextureSlot::Third.unit(), texture(TextureSlot::Third));
    backend.bind_texture(TextureSlot::Fourth.unit(), texture(TextureSlot::Fourth));

    let Some(handle) = program else {
        backend.use_program(ProgramBinding::FixedFunction);
        return Ok(());
    };
    let program = cache
        .get(handle)
        .ok_or(ShaderError::InvalidHandle("program"))?;
    program.activate(backend)?;
    write_builtins(program, material, backend);
    if let Some(uniforms) = material.uniforms() {
        program.write_uniforms(backend, &uniforms.read());
    }
    Ok(())
}

fn material_colours(material: &Material) -> MaterialColours {
    let alpha = material.alpha() as f32;
    let rgba = |colour: glam::DVec3, alpha: f32| {
        let colour = colour.as_vec3();
        [colour.x, colour.y, colour.z, alpha]
    };
    MaterialColours {
        ambient: rgba(material.ambient(), alpha),
        diffuse: rgba(material.diffuse(), alpha),
        emission: rgba(material.emission(), 1.0),
        specular: rgba(material.specular(), 1.0),
        shininess: (material.shininess() * 128.0) as f32,
    }
}

/// Writes the bind-time constants derived from the material's textures and spectrum.
pub(crate) fn write_builtins(
    program: &CompiledProgram,
    material: &Material,
    backend: &mut dyn RenderBackend,
) {
    if let Some((_, bound)) = material.textures().next() {
        let scaling = bound.texture.coordinate_scaling();
        program.write_builtin(backend, BuiltinUniform::TextureScaling, scaling);
    }

    if let Some(spectrum) = material.spectrum() {
        let remap = LookupRemap::from_sizes(spectrum.lookup_sizes());
        program.write_builtin(backend, BuiltinUniform::LookupOffsets, remap.offsets);
        program.write_builtin(backend, BuiltinUniform::LookupScales, remap.scales);
    }

    if let Some(bound) = material.texture(TextureSlot::Colour) {
        let texture = &bound.texture;
        let dimension = texture.dimension() as usize;
        let original = texture.pixel_sizes();
        let rendered = texture.rendered_sizes();
        let factors = material.lit_volume_normal_scaling().as_vec4();
        let mut scaling = [1.0, 1.0, 1.0, 0.0];
        for axis in 0..3 {
            if axis < dimension && original[axis] > 0 && rendered[axis] > 0 {
                scaling[axis] = rendered[axis] as f32 / original[axis] as f32 * factors[axis];
            }
        }
        program.write_builtin(backend, BuiltinUniform::NormalScaling, scaling);
    }
}

/// Drops every backend resource and program reference the material holds.
pub fn release_material(
    shader_module: &mut ShaderModule,
    material: &mut Material,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    let mut result = Ok(());
    for handle in [material.program.take(), material.order_program.take()]
        .into_iter()
        .flatten()
    {
        if let Err(err) = shader_module.release_program(handle, backend) {
            result = Err(err);
        }
    }
    if let Some(list) = material.command_list.take() {
        backend.delete_command_list(list);
    }
    material.compiled_uniforms = None;
    material.recorded_generation = None;
    material.compile_status = CompileStatus::NotCompiled;
    result
}
