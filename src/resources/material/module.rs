//! Material Module
//!
//! Owner of every [`Material`] in a rendering context. Materials live in a
//! [`SlotMap`] addressed by [`MaterialHandle`], optionally under a unique name, with
//! an explicit reference count. A material is destroyed when its count reaches zero
//! unless it is managed (the standard palette), in which case it persists until
//! teardown.
//!
//! # Change notifications
//!
//! Every logical edit made through [`MaterialModule::edit`] that actually changes a
//! material produces exactly one notification. Between [`MaterialModule::begin_change`]
//! and the matching [`MaterialModule::end_change`] notifications are queued, one per
//! material, and flushed when the outermost batch closes. Delivered notifications are
//! collected with [`MaterialModule::take_notifications`].
//!
//! Texture, field, spectrum and uniform set changes are forwarded with the
//! `*_changed` methods; materials referencing the source are found by scanning
//! their slots, so no back-pointers are kept.

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::RenderBackend;
use crate::renderer::material::{compile_material, execute_material, release_material};
use crate::renderer::module::ShaderModule;
use crate::renderer::oit;
use crate::resources::material::Material;
use crate::resources::material::standard::{
    DEFAULT_MATERIAL, DEFAULT_SELECTED_MATERIAL, STANDARD_MATERIALS, selected_material,
};
use crate::resources::spectrum::SpectrumId;
use crate::resources::texture::{FieldId, TextureId};
use crate::resources::uniforms::UniformSetId;

new_key_type! {
    /// Handle of a material owned by a [`MaterialModule`].
    pub struct MaterialHandle;
}

#[derive(Debug)]
struct MaterialEntry {
    material: Material,
    refs: usize,
}

#[derive(Debug, Default)]
pub struct MaterialModule {
    materials: SlotMap<MaterialHandle, MaterialEntry>,
    names: FxHashMap<String, MaterialHandle>,

    change_depth: u32,
    pending: SmallVec<[MaterialHandle; 8]>,
    notifications: Vec<MaterialHandle>,
}

impl MaterialModule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Creation and lookup
    // ========================================================================

    /// Creates a default material. The caller holds the only reference.
    pub fn create_material(&mut self, name: Option<&str>) -> Result<MaterialHandle> {
        self.insert(Material::new(), name)
    }

    /// Takes ownership of a prepared material. The caller holds the only reference.
    pub fn insert(&mut self, mut material: Material, name: Option<&str>) -> Result<MaterialHandle> {
        if let Some(name) = name {
            self.check_name_free(name)?;
        }
        material.name = name.map(str::to_owned);
        let handle = self.materials.insert(MaterialEntry { material, refs: 1 });
        if let Some(name) = name {
            self.names.insert(name.to_owned(), handle);
        }
        log::debug!("Created material {name:?} ({handle:?})");
        Ok(handle)
    }

    fn check_name_free(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ShaderError::InvalidArgument("material names cannot be empty".into()));
        }
        if self.names.contains_key(name) {
            return Err(ShaderError::InvalidArgument(format!(
                "a material named `{name}` already exists"
            )));
        }
        Ok(())
    }

    /// Handle of the material called `name`, without taking a reference.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<MaterialHandle> {
        self.names.get(name).copied()
    }

    pub fn rename(&mut self, handle: MaterialHandle, name: &str) -> Result<()> {
        let entry = self
            .materials
            .get(handle)
            .ok_or(ShaderError::InvalidHandle("material"))?;
        if entry.material.name() == Some(name) {
            return Ok(());
        }
        self.check_name_free(name)?;

        let entry = self
            .materials
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("material"))?;
        if let Some(old) = entry.material.name.replace(name.to_owned()) {
            self.names.remove(&old);
        }
        self.names.insert(name.to_owned(), handle);
        self.notify(handle);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle).map(|entry| &entry.material)
    }

    pub(crate) fn get_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle).map(|entry| &mut entry.material)
    }

    #[must_use]
    pub fn ref_count(&self, handle: MaterialHandle) -> usize {
        self.materials.get(handle).map_or(0, |entry| entry.refs)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialHandle, &Material)> {
        self.materials
            .iter()
            .map(|(handle, entry)| (handle, &entry.material))
    }

    // ========================================================================
    // Reference counting
    // ========================================================================

    pub fn acquire(&mut self, handle: MaterialHandle) -> Result<()> {
        let entry = self
            .materials
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("material"))?;
        entry.refs += 1;
        Ok(())
    }

    /// Drops one reference. Returns `true` when this destroyed the material.
    pub fn release(
        &mut self,
        handle: MaterialHandle,
        shader_module: &mut ShaderModule,
        backend: &mut dyn RenderBackend,
    ) -> Result<bool> {
        let Some(entry) = self.materials.get_mut(handle) else {
            log::error!("Release of stale material handle {handle:?}");
            return Err(ShaderError::InvalidHandle("material"));
        };
        if entry.refs == 0 {
            log::error!("Material {:?} released without a reference", entry.material.name());
            return Err(ShaderError::InvalidArgument(
                "material released more times than it was acquired".into(),
            ));
        }
        entry.refs -= 1;
        if entry.refs > 0 || entry.material.is_managed() {
            return Ok(false);
        }
        self.destroy(handle, shader_module, backend)?;
        Ok(true)
    }

    /// Managed materials persist without references.
    ///
    /// Unmanaging an unreferenced material destroys it; returns whether it did.
    pub fn set_managed(
        &mut self,
        handle: MaterialHandle,
        managed: bool,
        shader_module: &mut ShaderModule,
        backend: &mut dyn RenderBackend,
    ) -> Result<bool> {
        let entry = self
            .materials
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("material"))?;
        entry.material.managed = managed;
        if managed || entry.refs > 0 {
            return Ok(false);
        }
        self.destroy(handle, shader_module, backend)?;
        Ok(true)
    }

    fn destroy(
        &mut self,
        handle: MaterialHandle,
        shader_module: &mut ShaderModule,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let Some(mut entry) = self.materials.remove(handle) else {
            return Err(ShaderError::InvalidHandle("material"));
        };
        if let Some(name) = entry.material.name() {
            self.names.remove(name);
        }
        self.pending.retain(|pending| *pending != handle);
        log::debug!("Destroyed material {:?} ({handle:?})", entry.material.name());
        release_material(shader_module, &mut entry.material, backend)
    }

    // ========================================================================
    // Standard materials
    // ========================================================================

    /// Defines the standard palette. Names already in use are left alone.
    pub fn define_standard_materials(&mut self) -> Result<()> {
        for entry in &STANDARD_MATERIALS {
            if self.names.contains_key(entry.name) {
                continue;
            }
            self.insert_managed(entry.build()?, entry.name)?;
        }
        Ok(())
    }

    /// The `default` material, created on first use.
    pub fn default_material(&mut self) -> Result<MaterialHandle> {
        match self.find_by_name(DEFAULT_MATERIAL) {
            Some(handle) => Ok(handle),
            None => self.insert_managed(Material::new(), DEFAULT_MATERIAL),
        }
    }

    /// The `default_selected` highlight material, created on first use.
    pub fn default_selected_material(&mut self) -> Result<MaterialHandle> {
        match self.find_by_name(DEFAULT_SELECTED_MATERIAL) {
            Some(handle) => Ok(handle),
            None => self.insert_managed(selected_material(), DEFAULT_SELECTED_MATERIAL),
        }
    }

    fn insert_managed(&mut self, mut material: Material, name: &str) -> Result<MaterialHandle> {
        material.managed = true;
        let handle = self.insert(material, Some(name))?;
        if let Some(entry) = self.materials.get_mut(handle) {
            entry.refs = 0;
        }
        Ok(handle)
    }

    // ========================================================================
    // Editing and notifications
    // ========================================================================

    /// Applies one logical edit to a material.
    ///
    /// A notification is produced if the material changed, even when `edit`
    /// returns an error part way through.
    pub fn edit<R, F>(&mut self, handle: MaterialHandle, edit: F) -> Result<R>
    where
        F: FnOnce(&mut Material) -> Result<R>,
    {
        let material = self
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("material"))?;
        let version = material.version();
        let result = edit(material);
        if material.version() != version {
            self.notify(handle);
        }
        result
    }

    /// Opens a batch. Batches nest.
    pub fn begin_change(&mut self) {
        self.change_depth += 1;
    }

    /// Closes a batch, delivering the queued notifications when it was the outermost.
    pub fn end_change(&mut self) -> Result<()> {
        if self.change_depth == 0 {
            return Err(ShaderError::InvalidArgument(
                "end_change without a matching begin_change".into(),
            ));
        }
        self.change_depth -= 1;
        if self.change_depth == 0 {
            self.notifications.extend(self.pending.drain(..));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_batching(&self) -> bool {
        self.change_depth > 0
    }

    fn notify(&mut self, handle: MaterialHandle) {
        if self.change_depth == 0 {
            self.notifications.push(handle);
        } else if !self.pending.contains(&handle) {
            self.pending.push(handle);
        }
    }

    /// Notifications delivered since the last call, in order.
    pub fn take_notifications(&mut self) -> Vec<MaterialHandle> {
        std::mem::take(&mut self.notifications)
    }

    /// Applies `change` to every material selected by `uses` and notifies it.
    fn forward<U, C>(&mut self, uses: U, change: C) -> usize
    where
        U: Fn(&Material) -> bool,
        C: Fn(&mut Material),
    {
        let affected: SmallVec<[MaterialHandle; 8]> = self
            .materials
            .iter_mut()
            .filter(|(_, entry)| uses(&entry.material))
            .map(|(handle, entry)| {
                change(&mut entry.material);
                handle
            })
            .collect();
        for handle in &affected {
            self.notify(*handle);
        }
        affected.len()
    }

    /// The field feeding a texture changed; only the texture image must be rebuilt.
    pub fn field_changed(&mut self, field: FieldId) -> usize {
        self.forward(|m| m.uses_field(field), Material::child_changed)
    }

    /// A bound texture changed, possibly its dimension or component count.
    pub fn texture_changed(&mut self, texture: TextureId) -> usize {
        self.forward(|m| m.uses_texture(texture), Material::dependency_changed)
    }

    pub fn spectrum_changed(&mut self, spectrum: SpectrumId) -> usize {
        self.forward(|m| m.uses_spectrum(spectrum), Material::dependency_changed)
    }

    pub fn uniforms_changed(&mut self, set: UniformSetId) -> usize {
        self.forward(|m| m.uses_uniforms(set), Material::dependency_changed)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    pub fn compile(
        &mut self,
        handle: MaterialHandle,
        shader_module: &mut ShaderModule,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let material = self
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("material"))?;
        compile_material(shader_module, material, backend)
    }

    pub fn execute(
        &self,
        handle: MaterialHandle,
        shader_module: &ShaderModule,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let material = self
            .get(handle)
            .ok_or(ShaderError::InvalidHandle("material"))?;
        execute_material(shader_module, material, backend)
    }

    /// Renders one transparency layer, see [`oit::render_layer`].
    pub fn render_layer<F>(
        &mut self,
        handle: MaterialHandle,
        layer: u32,
        viewport: (u32, u32),
        shader_module: &mut ShaderModule,
        backend: &mut dyn RenderBackend,
        draw: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut dyn RenderBackend) -> Result<()>,
    {
        let material = self
            .get_mut(handle)
            .ok_or(ShaderError::InvalidHandle("material"))?;
        oit::render_layer(shader_module, material, layer, viewport, backend, draw)
    }

    /// Ends a transparency pass for every material, releasing layer programs.
    pub fn finish_layers(
        &mut self,
        shader_module: &mut ShaderModule,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let mut result = Ok(());
        for entry in self.materials.values_mut() {
            if let Err(err) = oit::finish_layers(shader_module, &mut entry.material, backend) {
                result = Err(err);
            }
        }
        result
    }

    /// Re-queries the backend after a context change. Every material recompiles.
    pub fn refresh_capabilities(
        &mut self,
        shader_module: &mut ShaderModule,
        backend: &mut dyn RenderBackend,
    ) {
        shader_module.refresh_capabilities(backend);
        for entry in self.materials.values_mut() {
            if let Some(list) = entry.material.command_list.take() {
                backend.delete_command_list(list);
            }
            entry.material.dependency_changed();
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Destroys unreferenced managed materials and reports the rest.
    ///
    /// Materials still referenced by clients are left alive and reported as
    /// [`ShaderError::StillReferenced`].
    pub fn teardown(
        &mut self,
        shader_module: &mut ShaderModule,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let unreferenced: Vec<MaterialHandle> = self
            .materials
            .iter()
            .filter(|(_, entry)| entry.refs == 0)
            .map(|(handle, _)| handle)
            .collect();
        for handle in unreferenced {
            self.destroy(handle, shader_module, backend)?;
        }

        let count = self.materials.len();
        if count == 0 {
            return Ok(());
        }
        for (handle, entry) in &self.materials {
            log::error!(
                "Material {:?} ({handle:?}) still has {} references at teardown",
                entry.material.name(),
                entry.refs
            );
        }
        Err(ShaderError::StillReferenced {
            what: "materials",
            count,
        })
    }
}
