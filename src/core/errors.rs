/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::limits::{
    ERROR_INTERNAL_ERROR, ERROR_INVALID_HANDLE, ERROR_INVALID_PARAMETER, ERROR_NOT_ENOUGH_MEMORY,
    ERROR_NOT_OWNER, ERROR_NOT_SUPPORTED,
};
use super::guard::GuardError;
use super::types::Handle;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::TryReserveError;
use thiserror::Error;

/// Errors surfaced by the synchronization layer
///
/// Every variant collapses to a numeric "last error" code via [`PalError::code`].
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PalError {
    #[error("Invalid parameter: {0}")]
    #[diagnostic(
        code(pal::invalid_parameter),
        help("Check the handle count (1 to 64) and that a wait-all set names each object once.")
    )]
    InvalidParameter(String),

    #[error("Invalid handle {0}")]
    #[diagnostic(
        code(pal::invalid_handle),
        help("The handle may be closed, or it names an object kind that cannot be waited on.")
    )]
    InvalidHandle(Handle),

    #[error("Not supported: {0}")]
    #[diagnostic(
        code(pal::not_supported),
        help("This build does not implement the requested wait mode.")
    )]
    NotSupported(String),

    #[error("Internal error: {0}")]
    #[diagnostic(
        code(pal::internal_error),
        help("An unexpected internal error occurred. Please report this issue.")
    )]
    Internal(String),

    #[error("Not enough memory: {0}")]
    #[diagnostic(
        code(pal::not_enough_memory),
        help("The wait set working arrays could not be allocated.")
    )]
    NotEnoughMemory(String),

    #[error("Attempt to release a mutex not owned by the caller")]
    #[diagnostic(
        code(pal::not_owner),
        help("Only the owning thread may release a mutex.")
    )]
    NotOwner,
}

impl PalError {
    /// Numeric "last error" code for this failure
    pub const fn code(&self) -> u32 {
        match self {
            PalError::InvalidParameter(_) => ERROR_INVALID_PARAMETER,
            PalError::InvalidHandle(_) => ERROR_INVALID_HANDLE,
            PalError::NotSupported(_) => ERROR_NOT_SUPPORTED,
            PalError::Internal(_) => ERROR_INTERNAL_ERROR,
            PalError::NotEnoughMemory(_) => ERROR_NOT_ENOUGH_MEMORY,
            PalError::NotOwner => ERROR_NOT_OWNER,
        }
    }

    /// Whether callers can usefully react to this error
    ///
    /// Internal failures are reported as a generic failure without detail.
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PalError::InvalidParameter(_) | PalError::InvalidHandle(_) | PalError::NotSupported(_)
        )
    }
}

impl From<TryReserveError> for PalError {
    fn from(err: TryReserveError) -> Self {
        PalError::NotEnoughMemory(err.to_string())
    }
}

impl From<GuardError> for PalError {
    fn from(err: GuardError) -> Self {
        PalError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for PalError {
    fn from(err: std::io::Error) -> Self {
        PalError::Internal(err.to_string())
    }
}

/// Result type for synchronization operations
pub type PalResult<T> = std::result::Result<T, PalError>;
