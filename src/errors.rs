//! Error Types
//!
//! This module defines the error type shared by every part of the shader subsystem.
//!
//! # Overview
//!
//! [`ShaderError`] covers every failure mode of the subsystem:
//! - invalid arguments and out-of-range material attributes
//! - feature combinations the chosen dialect cannot express
//! - backend compile and link diagnostics
//! - allocation failures and misuse of reference-counted objects
//!
//! Each variant belongs to exactly one [`ErrorKind`], which is what callers should
//! match on when deciding how to react. None of them is fatal: the worst outcome is
//! a material that renders unlit and untextured.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tinct::errors::{ErrorKind, Result};
//!
//! fn compile_everything() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::renderer::dialect::Dialect;
use crate::renderer::backend::ShaderStage;
use crate::resources::feature_key::FeatureKey;

/// Coarse classification of a [`ShaderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Null or invalid handles, out-of-range scalars, unsupported attributes.
    Argument,
    /// A feature combination that cannot be expressed in the chosen dialect.
    Synthesis,
    /// Shader or link diagnostics reported by the rendering backend.
    BackendCompile,
    /// Allocation or cache creation failure.
    Resource,
    /// Lifecycle misuse, such as destroying something that is still referenced.
    State,
    /// The backend offers neither shading dialect.
    UnsupportedBackend,
}

/// The main error type for the shader subsystem.
#[derive(Error, Debug)]
pub enum ShaderError {
    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// A scalar attribute was outside its permitted range. The stored value is unchanged.
    #[error("{attribute} must lie in [0, 1], got {value}")]
    ValueOutOfRange { attribute: &'static str, value: f64 },

    /// A generic invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A handle did not refer to a live object.
    #[error("Invalid {0} handle")]
    InvalidHandle(&'static str),

    /// A texture cannot be used in the requested slot.
    #[error("Texture unsupported in slot {slot}: {reason}")]
    UnsupportedTexture { slot: usize, reason: String },

    // ========================================================================
    // Synthesis Errors
    // ========================================================================
    /// The feature key cannot be turned into source for this dialect.
    #[error("Cannot synthesize {dialect:?} program for key {key}: {reason}")]
    Synthesis {
        key: FeatureKey,
        dialect: Dialect,
        reason: String,
    },

    /// Synthesis was requested for a user-authored program.
    #[error("User-authored programs are never synthesized")]
    UserSourceSynthesis,

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The backend supports neither the legacy nor the modern dialect.
    #[error("Backend supports no shading dialect")]
    UnsupportedBackend,

    /// A program was fixed to a dialect the backend no longer offers.
    #[error("Dialect {0:?} is unavailable on this backend")]
    DialectUnavailable(Dialect),

    /// A shader stage failed to compile.
    #[error("{stage:?} shader failed to compile:\n{log}")]
    BackendCompile { stage: ShaderStage, log: String },

    /// The program failed to link.
    #[error("Program failed to link:\n{log}")]
    Link { log: String },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The backend refused to allocate an object.
    #[error("Resource allocation failed: {0}")]
    Resource(String),

    // ========================================================================
    // State Errors
    // ========================================================================
    /// A command list was opened while another was still recording.
    #[error("A command list is already being recorded")]
    NestedRecording,

    /// A command list was closed without being opened.
    #[error("No command list is being recorded")]
    NotRecording,

    /// Objects were still referenced at teardown.
    #[error("{count} {what} still referenced at teardown")]
    StillReferenced { what: &'static str, count: usize },

    /// Execute was called on something that has not been compiled.
    #[error("Material has not been compiled")]
    NotCompiled,

    /// A release was issued for a program the cache no longer holds.
    #[error("Program released more times than it was acquired")]
    StaleRelease,
}

impl ShaderError {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValueOutOfRange { .. }
            | Self::InvalidArgument(_)
            | Self::InvalidHandle(_)
            | Self::UnsupportedTexture { .. } => ErrorKind::Argument,
            Self::Synthesis { .. } | Self::UserSourceSynthesis => ErrorKind::Synthesis,
            Self::UnsupportedBackend | Self::DialectUnavailable(_) => {
                ErrorKind::UnsupportedBackend
            }
            Self::BackendCompile { .. } | Self::Link { .. } => ErrorKind::BackendCompile,
            Self::Resource(_) => ErrorKind::Resource,
            Self::NestedRecording
            | Self::NotRecording
            | Self::StillReferenced { .. }
            | Self::NotCompiled
            | Self::StaleRelease => ErrorKind::State,
        }
    }
}

/// Alias for `Result<T, ShaderError>`.
pub type Result<T> = std::result::Result<T, ShaderError>;
