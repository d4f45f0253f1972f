//! Error types for the store.
//!
//! Every failure a caller can observe falls into one of four [`ErrorKind`]s.
//! Validation and unsupported-operation errors are raised locally and never
//! reach the cache client; transport errors carry the client's own error
//! value untouched; not-found is derived from an empty client response.

use crate::model::is_truthy;
use serde_json::Value;
use std::fmt;

/// Operations that exist on the store contract but are always rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsupportedOperation {
    Update,
    Filter,
}

impl fmt::Display for UnsupportedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedOperation::Update => write!(f, "Store.prototype.update()"),
            UnsupportedOperation::Filter => write!(f, "Store.prototype.filter()"),
        }
    }
}

/// Store error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No entry is stored under the key.
    #[error("Could not find cached item with key {key}")]
    NotFound { key: String },

    /// Required input is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The operation is part of the contract but never supported.
    #[error("{0} is not supported")]
    Unsupported(UnsupportedOperation),

    /// Failure reported by the cache client, passed through as-is.
    #[error(transparent)]
    Transport(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// No model with this name has been defined.
    #[error("model {0} is not defined")]
    UndefinedModel(String),

    /// Invalid store configuration.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Coarse classification of [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Unsupported,
    Transport,
}

impl Error {
    /// Wrap a cache client failure without altering it.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Validation(_) | Error::UndefinedModel(_) | Error::Config(_) => {
                ErrorKind::Validation
            }
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Transport(_) => ErrorKind::Transport,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The client's original error, if this is a transport error of type `E`.
    pub fn transport_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Transport(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Mapping of client outcomes
// ============================================================================

/// Map the outcome of a client read.
///
/// An explicit error is a transport error; an empty response, or one holding
/// `null`, `false`, `0` or an empty string, is `NotFound` for `key`.
pub(crate) fn map_read<E>(key: &str, outcome: std::result::Result<Option<Value>, E>) -> Result<Value>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match outcome {
        Err(e) => Err(Error::transport(e)),
        Ok(Some(value)) if is_truthy(&value) => Ok(value),
        Ok(_) => Err(Error::NotFound {
            key: key.to_string(),
        }),
    }
}

/// Map the outcome of a client write or delete.
pub(crate) fn map_write<T, E>(outcome: std::result::Result<T, E>) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    outcome.map_err(Error::transport)
}
