//! Association reconciliation error types

use thiserror::Error;

/// Errors surfaced by the reconciler and by `LinkApi` backends
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Association not found: {0}")]
    AssociationNotFound(String),

    #[error("Parent resource not found: {0}")]
    ParentNotFound(String),

    #[error("Association {association} is attached to {owner} and cannot be moved to {parent}")]
    ForeignAttachConflict {
        association: String,
        owner: String,
        parent: String,
    },

    #[error("Resource locked: {0}")]
    ResourceLocked(String),

    #[error("Lock on {resource} not released after {attempts} attempt(s): {source}")]
    LockTimeoutExceeded {
        resource: String,
        attempts: u32,
        source: Box<LinkError>,
    },

    #[error("Duplicate association {id} in {set} set")]
    DuplicateAssociation { id: String, set: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinkError {
    /// Whether the error is the transient lock condition `retry_on_lock` absorbs
    pub fn is_lock(&self) -> bool {
        matches!(self, LinkError::ResourceLocked(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LinkError::AssociationNotFound(_) | LinkError::ParentNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
