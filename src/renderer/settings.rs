//! Shader Module Settings
//!
//! Configuration consumed once by [`ShaderModule::new`](crate::renderer::module::ShaderModule::new).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tinct::renderer::{ShaderModuleSettings, ShaderModule};
//! use tinct::renderer::dialect::Dialect;
//!
//! // Default: command lists where supported, modern dialect preferred
//! let settings = ShaderModuleSettings::default();
//!
//! // Force assembly programs and dump every synthesized source to the trace log
//! let settings = ShaderModuleSettings {
//!     preferred_dialect: Some(Dialect::Legacy),
//!     log_sources: true,
//!     ..Default::default()
//! };
//!
//! let module = ShaderModule::new(settings, &backend);
//! ```

use serde::{Deserialize, Serialize};

use crate::renderer::dialect::{Dialect, VendorId};

// ---------------------------------------------------------------------------
// ShaderModuleSettings
// ---------------------------------------------------------------------------

/// Global configuration for program synthesis and binding.
///
/// # Fields
///
/// | Field               | Description                                           | Default |
/// |---------------------|-------------------------------------------------------|---------|
/// | `use_command_lists` | Record a bind command list when the backend can       | `true`  |
/// | `preferred_dialect` | Dialect hint passed to the selector                   | `None`  |
/// | `vendor_override`   | Vendor used for hints instead of the backend string   | `None`  |
/// | `force_recompile`   | `compile()` rebuilds programs that are already compiled | `false` |
/// | `log_sources`       | Trace-log every synthesized source                    | `false` |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderModuleSettings {
    // === Binding ===
    /// Record material bind sequences into command lists.
    ///
    /// Ignored when the backend does not advertise
    /// [`COMMAND_LISTS`](crate::renderer::backend::BackendCaps::COMMAND_LISTS); materials
    /// then bind directly on every execute.
    pub use_command_lists: bool,

    // === Synthesis ===
    /// Dialect to emit when the backend supports it. `None` prefers the modern dialect.
    pub preferred_dialect: Option<Dialect>,

    /// Vendor whose hints drive the depth-peel comparison.
    ///
    /// `None` parses the backend's vendor string.
    pub vendor_override: Option<VendorId>,

    // === Diagnostics ===
    /// Rebuild programs on every compile, even when nothing changed.
    pub force_recompile: bool,

    /// Emit the full text of every synthesized program at trace level.
    pub log_sources: bool,
}

impl Default for ShaderModuleSettings {
    fn default() -> Self {
        Self {
            use_command_lists: true,
            preferred_dialect: None,
            vendor_override: None,
            force_recompile: false,
            log_sources: false,
        }
    }
}

impl ShaderModuleSettings {
    #[inline]
    #[must_use]
    pub fn use_command_lists(&self) -> bool {
        self.use_command_lists
    }

    #[inline]
    #[must_use]
    pub fn preferred_dialect(&self) -> Option<Dialect> {
        self.preferred_dialect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = ShaderModuleSettings::default();
        assert!(settings.use_command_lists());
        assert_eq!(settings.preferred_dialect(), None);
        assert!(!settings.force_recompile);
    }
}
