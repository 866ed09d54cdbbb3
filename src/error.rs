//! Error types for the volume group snapshot controllers

use thiserror::Error;

/// Main error type for volume group snapshot operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error that doesn't fall into a more specific bucket
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// A referenced object does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// Kind of the missing object
        kind: &'static str,
        /// Namespaced name of the missing object
        name: String,
    },

    /// A create hit an object with the same name
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// Kind of the conflicting object
        kind: &'static str,
        /// Namespaced name of the conflicting object
        name: String,
    },

    /// Optimistic concurrency check failed on update
    #[error("conflict updating {kind} {name}: {message}")]
    Conflict {
        /// Kind of the object being updated
        kind: &'static str,
        /// Namespaced name of the object being updated
        name: String,
        /// Message returned by the store
        message: String,
    },

    /// Label selector on a VolumeGroup can't be evaluated
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid controller configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Invariant violated inside the controller
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error for the given kind and name
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create an already-exists error for the given kind and name
    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Create a conflict error for the given kind and name
    pub fn conflict(kind: &'static str, name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid selector error with the given message
    pub fn invalid_selector(msg: impl Into<String>) -> Self {
        Self::InvalidSelector(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify a kube API error for the object `kind`/`name`.
    ///
    /// 404 becomes [`Error::NotFound`], 409 with reason `AlreadyExists` becomes
    /// [`Error::AlreadyExists`] and any other 409 becomes [`Error::Conflict`].
    pub fn from_kube(kind: &'static str, name: impl Into<String>, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref resp) if resp.code == 404 => Self::not_found(kind, name),
            kube::Error::Api(ref resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                Self::already_exists(kind, name)
            }
            kube::Error::Api(resp) if resp.code == 409 => {
                Self::conflict(kind, name, resp.message)
            }
            other => Self::Kube(other),
        }
    }

    /// Returns true if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is an already-exists error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true if this is an optimistic concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
