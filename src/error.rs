//! Error types shared by the service layer.
//!
//! Services return [`ServiceError`] and never catch; the resolver and
//! endpoint layers are the only places these are mapped to client-visible
//! results.

use thiserror::Error;

/// Failure raised by an owner-scoped service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The entity does not exist, or exists but belongs to another user.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller has no authenticated identity.
    #[error("unauthorized")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value the model cannot represent.
    #[error("invalid stored {entity} {id}: {reason}")]
    InvalidData {
        entity: &'static str,
        id: String,
        reason: String,
    },
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
