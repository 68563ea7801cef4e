//! Error Types
//!
//! This module defines the error types used throughout the shader generator.
//!
//! # Overview
//!
//! The main error type [`RtssError`] covers all failure modes of a program
//! build:
//! - conflicting parameter requests between sub-render-states
//! - missing hardware capabilities
//! - varying budgets that cannot be met by the packer
//! - compile rejections reported by the render system
//! - malformed material-script properties
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, RtssError>`. Every build error is recoverable at
//! the generator facade: the affected technique entry falls back to the
//! source material's original technique.

use thiserror::Error;

use crate::ir::GpuType;

/// The main error type for the runtime shader generator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtssError {
    /// Two sub-render-states requested the same parameter with
    /// incompatible numeric types.
    #[error("parameter conflict on '{name}': resolved as {existing:?}, requested as {requested:?}")]
    ParameterConflict {
        /// Generated name of the contested parameter.
        name: String,
        /// Type the parameter was first resolved with.
        existing: GpuType,
        /// Type of the conflicting request.
        requested: GpuType,
    },

    /// A sub-render-state requires a capability the render system lacks.
    #[error("required capability missing: {0}")]
    CapabilityMissing(String),

    /// The vertex outputs cannot fit the hardware varying budget.
    #[error("varying compaction impossible: {required} float4 slots required, {available} available")]
    CompactionImpossible {
        /// Slots the packed layout would need.
        required: u32,
        /// Slots the hardware provides.
        available: u32,
    },

    /// The render system rejected an emitted program.
    #[error("program compilation failed: {0}")]
    CompileFailed(String),

    /// The material-script layer handed an unknown or malformed property.
    #[error("invalid script property: {0}")]
    InvalidScript(String),

    /// A structural invariant of the program model was violated.
    ///
    /// Programmer error: the generator facade asserts on it in debug builds
    /// and routes it through the same terminal failure path as
    /// [`RtssError::CompileFailed`] in release builds.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl RtssError {
    /// Build an [`RtssError::InternalInvariant`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        RtssError::InternalInvariant(message.into())
    }
}

/// Alias for `Result<T, RtssError>`.
pub type Result<T> = std::result::Result<T, RtssError>;
