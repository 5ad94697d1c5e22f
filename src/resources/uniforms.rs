//! User uniform overrides.
//!
//! A [`ShaderUniforms`] set holds named float vectors that are written to a
//! material's program after the built-in uniforms on every bind. Sets are shared
//! between materials as [`SharedUniforms`]; editing a set bumps its version so
//! dependent materials can be recompiled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::{ProgramObjectId, RenderBackend};
use crate::resources::version_tracker::ChangeTracker;
use crate::utils::interner::{self, Symbol};

/// Stable identity of a uniform set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformSetId(pub u64);

static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

pub type UniformValues = SmallVec<[f64; 4]>;

#[derive(Debug)]
pub struct ShaderUniforms {
    id: UniformSetId,
    entries: Vec<(Symbol, UniformValues)>,
    tracker: ChangeTracker,
}

pub type SharedUniforms = Arc<RwLock<ShaderUniforms>>;

impl ShaderUniforms {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: UniformSetId(NEXT_SET_ID.fetch_add(1, Ordering::Relaxed)),
            entries: Vec::new(),
            tracker: ChangeTracker::new(),
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedUniforms {
        Arc::new(RwLock::new(self))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> UniformSetId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds or replaces a uniform with 1 to 4 components.
    pub fn set_real_values(&mut self, name: &str, values: &[f64]) -> Result<()> {
        if name.is_empty() {
            return Err(ShaderError::InvalidArgument("uniform name is empty".into()));
        }
        if values.is_empty() || values.len() > 4 {
            return Err(ShaderError::InvalidArgument(format!(
                "uniform `{name}` needs 1 to 4 components, got {}",
                values.len()
            )));
        }
        let symbol = interner::intern(name);
        let values = UniformValues::from_slice(values);
        match self.entries.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, existing)) if *existing == values => return Ok(()),
            Some((_, existing)) => *existing = values,
            None => self.entries.push((symbol, values)),
        }
        self.tracker.changed();
        Ok(())
    }

    #[must_use]
    pub fn get_real_values(&self, name: &str) -> Option<&[f64]> {
        let symbol = interner::get(name)?;
        self.entries
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, values)| values.as_slice())
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let index = interner::get(name)
            .and_then(|symbol| self.entries.iter().position(|(s, _)| *s == symbol))
            .ok_or_else(|| ShaderError::InvalidArgument(format!("no uniform named `{name}`")))?;
        self.entries.remove(index);
        self.tracker.changed();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[f64])> {
        self.entries
            .iter()
            .map(|(symbol, values)| (interner::resolve(*symbol), values.as_slice()))
    }

    /// Writes every uniform to `program`. Names the program does not declare are skipped.
    pub fn write_to(&self, backend: &mut dyn RenderBackend, program: ProgramObjectId) {
        for (name, values) in self.iter() {
            let floats: SmallVec<[f32; 4]> = values.iter().map(|v| *v as f32).collect();
            if !backend.set_uniform_f32(program, name, &floats) {
                log::trace!("Uniform `{name}` not declared by program {program:?}");
            }
        }
    }
}

impl Default for ShaderUniforms {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut uniforms = ShaderUniforms::new();
        uniforms.set_real_values("tint", &[0.5, 0.25]).unwrap();
        assert_eq!(uniforms.get_real_values("tint"), Some(&[0.5, 0.25][..]));

        uniforms.set_real_values("tint", &[1.0]).unwrap();
        assert_eq!(uniforms.get_real_values("tint"), Some(&[1.0][..]));
        assert_eq!(uniforms.len(), 1);

        uniforms.remove("tint").unwrap();
        assert!(uniforms.is_empty());
        assert!(uniforms.remove("tint").is_err());
    }

    #[test]
    fn component_count_is_checked() {
        let mut uniforms = ShaderUniforms::new();
        assert!(uniforms.set_real_values("v", &[]).is_err());
        assert!(uniforms.set_real_values("v", &[1.0; 5]).is_err());
        assert!(uniforms.get_real_values("v").is_none());
    }

    #[test]
    fn identical_write_does_not_bump_version() {
        let mut uniforms = ShaderUniforms::new();
        uniforms.set_real_values("gain", &[2.0]).unwrap();
        let version = uniforms.version();
        uniforms.set_real_values("gain", &[2.0]).unwrap();
        assert_eq!(uniforms.version(), version);
        uniforms.set_real_values("gain", &[3.0]).unwrap();
        assert_ne!(uniforms.version(), version);
    }

    #[test]
    fn sets_have_distinct_ids() {
        assert_ne!(ShaderUniforms::new().id(), ShaderUniforms::new().id());
    }
}
