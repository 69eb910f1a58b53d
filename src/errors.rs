//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants map onto
//! four caller-facing outcomes (see [`ErrorKind`]); anything storage or upstream related is a
//! persistence failure and is never shown to clients in detail.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Operation did not commit within {after:?}")]
    Timeout { after: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Text generation failed: {message}")]
    Generation { message: String },
}

/// Caller-facing classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InsufficientStock,
    ConstraintViolation,
    Validation,
    PersistenceFailure,
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Timeout { .. }
            | Self::Io(_)
            | Self::Http(_)
            | Self::Generation { .. } => ErrorKind::PersistenceFailure,
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
