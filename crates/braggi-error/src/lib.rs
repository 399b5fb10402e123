//! Error and result types shared by every Braggi crate.
//!
//! All fallible operations in the workspace return [`Result`], and every
//! failure is one of the [`BraggiError`] variants. Recoverable conditions
//! (propagation contradictions, validator fallbacks) are handled locally by
//! the solver and periscope; only terminal conditions reach callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, BraggiError>;

/// Every error the Braggi core can surface to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BraggiError {
    /// A region arena ran out of space. Fatal to the current parse.
    #[error("region allocation failed: requested {requested} bytes, {available} available")]
    AllocationFailure { requested: usize, available: usize },

    /// A pattern `Reference` named a pattern the library does not hold.
    #[error("pattern reference `{name}` does not resolve")]
    PatternResolution { name: String },

    /// Two patterns were registered under the same name.
    #[error("pattern `{name}` is already defined")]
    DuplicatePattern { name: String },

    /// A cell reached zero candidate states and the decision stack was empty.
    #[error("cell {cell} reached zero states")]
    Contradiction { cell: u32 },

    /// The solver hit its retry ceiling before the field settled.
    #[error("retry ceiling reached after {passes} passes; solution may be incomplete")]
    ExhaustedRetries { passes: u32 },

    /// A region-lifetime contract rejected a constraint.
    #[error("region-lifetime contract rejected constraint at cell {cell}")]
    ContractViolation { cell: u32 },

    /// `register_component` was called with the registry already full.
    #[error("component registry is full ({cap} types)")]
    ComponentRegistryFull { cap: usize },

    /// An entity id that is not alive was passed to the ECS.
    #[error("entity {entity} is not alive")]
    NoSuchEntity { entity: u32 },

    /// `realloc` was attempted on anything but the most recent allocation.
    #[error("realloc is only valid for the most recent allocation")]
    ReallocNotLast,

    /// A numeric argument fell outside its documented range.
    #[error("{what} out of range: {value}")]
    OutOfRange { what: String, value: String },

    /// An invariant the core relies on was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BraggiError {
    /// Build an [`BraggiError::Internal`] from anything string-like.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The machine-readable category reported alongside diagnostics.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AllocationFailure { .. } => ErrorCategory::Allocation,
            Self::PatternResolution { .. } | Self::DuplicatePattern { .. } => {
                ErrorCategory::Pattern
            }
            Self::Contradiction { .. } => ErrorCategory::Contradiction,
            Self::ExhaustedRetries { .. } => ErrorCategory::Exhausted,
            Self::ContractViolation { .. } => ErrorCategory::Contract,
            Self::ComponentRegistryFull { .. } | Self::NoSuchEntity { .. } => ErrorCategory::Ecs,
            Self::ReallocNotLast | Self::OutOfRange { .. } | Self::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Short machine-readable error category carried on user-visible errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Allocation,
    Pattern,
    Contradiction,
    Exhausted,
    Contract,
    Ecs,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Allocation => "allocation",
            Self::Pattern => "pattern",
            Self::Contradiction => "contradiction",
            Self::Exhausted => "exhausted",
            Self::Contract => "contract",
            Self::Ecs => "ecs",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Diagnostic severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Note => "note",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}
