//! Shading dialects and vendor hints.
//!
//! Two textual dialects can be emitted: the legacy assembly-style vertex/fragment
//! programs (`!!ARBvp1.0` / `!!ARBfp1.0`) and the C-like GLSL dialect. The dialect is
//! chosen once per program from the backend capabilities, then passed down to the
//! synthesizer as a tagged value.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::BackendCaps;

/// Textual shader dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Assembly-style `ARB_vertex_program` / `ARB_fragment_program` text.
    Legacy,
    /// GLSL 1.10 text.
    Modern,
}

impl Dialect {
    /// Capability bit the backend must advertise for this dialect.
    #[must_use]
    pub fn required_capability(self) -> BackendCaps {
        match self {
            Self::Legacy => BackendCaps::LEGACY_PROGRAMS,
            Self::Modern => BackendCaps::MODERN_SHADING,
        }
    }

    #[must_use]
    pub fn is_supported(self, caps: BackendCaps) -> bool {
        caps.contains(self.required_capability())
    }
}

/// Picks the dialect to emit.
///
/// An explicit hint is honoured when the backend supports it. Otherwise the modern
/// dialect is preferred, then the legacy one. A backend offering neither yields
/// [`ShaderError::UnsupportedBackend`]; the caller is expected to fall back to
/// fixed-function rendering.
pub fn select_dialect(caps: BackendCaps, hint: Option<Dialect>) -> Result<Dialect> {
    if let Some(hint) = hint {
        if hint.is_supported(caps) {
            return Ok(hint);
        }
        log::warn!("Dialect hint {hint:?} not supported by backend, falling back");
    }
    [Dialect::Modern, Dialect::Legacy]
        .into_iter()
        .find(|dialect| dialect.is_supported(caps))
        .ok_or(ShaderError::UnsupportedBackend)
}

/// Detects the dialect a user-authored source string is written in.
///
/// Assembly programs always open with a `!!ARB` header; anything else is treated as GLSL.
#[must_use]
pub fn detect_source_dialect(source: &str) -> Dialect {
    if source.trim_start().starts_with("!!ARB") {
        Dialect::Legacy
    } else {
        Dialect::Modern
    }
}

// ----------------------------------------------------------------------------
// Vendor hints
// ----------------------------------------------------------------------------

/// Graphics driver vendor, parsed from the backend's vendor string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VendorId {
    Ati,
    Mesa,
    Intel,
    Microsoft,
    Nvidia,
    #[default]
    Unknown,
}

impl VendorId {
    #[must_use]
    pub fn from_vendor_string(vendor: &str) -> Self {
        match vendor.trim() {
            "ATI Technologies Inc." => Self::Ati,
            "Brian Paul" | "Mesa" | "Mesa/X.org" => Self::Mesa,
            "Intel" | "Intel Inc." => Self::Intel,
            "Microsoft Corporation" => Self::Microsoft,
            "NVIDIA Corporation" => Self::Nvidia,
            _ => Self::Unknown,
        }
    }
}

/// How the depth-peeling discard reads the previous layer's depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthCompare {
    /// Rectangle shadow sampler; the hardware performs the comparison.
    ShadowSampler,
    /// Plain rectangle sampler compared against the fragment depth in the shader.
    Manual,
}

/// Per-vendor adjustments applied by the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VendorHints {
    pub depth_compare: DepthCompare,
    /// Added to the fragment depth before comparing. Zero means no bias.
    pub depth_bias: f32,
}

impl VendorHints {
    #[must_use]
    pub fn for_vendor(vendor: VendorId) -> Self {
        match vendor {
            VendorId::Nvidia => Self {
                depth_compare: DepthCompare::ShadowSampler,
                depth_bias: 0.0,
            },
            VendorId::Ati => Self {
                depth_compare: DepthCompare::ShadowSampler,
                depth_bias: -0.0001,
            },
            VendorId::Mesa | VendorId::Intel | VendorId::Microsoft | VendorId::Unknown => {
                Self::default()
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn has_bias(&self) -> bool {
        self.depth_bias.abs() > f32::EPSILON
    }
}

impl Default for VendorHints {
    fn default() -> Self {
        Self {
            depth_compare: DepthCompare::Manual,
            depth_bias: 0.0,
        }
    }
}
