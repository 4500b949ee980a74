//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`UmbraError`] covers the failure modes the render core
//! reports explicitly:
//! - Configuration errors (shader compilation, unknown material templates)
//! - Precondition violations (blur pass counts, missing camera, zero sizes)
//! - Backend capability errors
//!
//! Soft limits such as the light caps of the global uniform block are *not*
//! errors; they are reported through
//! [`LightAdmission`](crate::renderer::LightAdmission) values and a log warning.
//!
//! # Usage
//!
//! ```rust,ignore
//! use umbra::errors::{UmbraError, Result};
//!
//! fn build() -> Result<()> {
//!     let material = library.create_material("default")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the Umbra renderer.
#[derive(Error, Debug)]
pub enum UmbraError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A shader program failed to compile or link.
    #[error("Shader '{name}' failed to compile: {reason}")]
    ShaderCompilation {
        /// Name of the shader program
        name: String,
        /// Backend-provided diagnostic
        reason: String,
    },

    /// A material was requested from a template name that is not registered.
    #[error("Material of template '{0}' requested, but template did not exist")]
    MaterialTemplateNotFound(String),

    /// A material handle no longer refers to a live material.
    #[error("Material handle is stale or was never issued")]
    InvalidMaterialHandle,

    /// A framebuffer could not be assembled from its attachments.
    #[error("Framebuffer incomplete: {0}")]
    IncompleteFramebuffer(String),

    /// Settings failed to parse.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    // ========================================================================
    // Precondition Violations
    // ========================================================================
    /// Separable blur requires an even pass count of at least two.
    #[error("Blur pass count must be even and >= 2, got {0}")]
    InvalidBlurPassCount(u32),

    /// A frame was rendered before a camera was set.
    #[error("No camera set before rendering")]
    MissingCamera,

    /// Render size must be non-zero in both dimensions.
    #[error("Invalid render size {width}x{height}")]
    InvalidRenderSize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// A frame stage was scheduled before one of its dependencies.
    #[error("Stage '{stage}' scheduled before its dependency '{missing}'")]
    StageOrder {
        /// Stage that was scheduled too early
        stage: &'static str,
        /// Dependency that had not run yet
        missing: &'static str,
    },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The graphics backend is not supported by this renderer.
    #[error("Unsupported graphics backend: {0}")]
    UnsupportedBackend(String),
}

/// Alias for `Result<T, UmbraError>`.
pub type Result<T> = std::result::Result<T, UmbraError>;
