//! Error taxonomy of the entity layer

use thiserror::Error;

use crate::core::ConfigError;
use crate::entity::EntityId;
use crate::host::HostError;

/// Errors produced by renderers and the factory
#[derive(Error, Debug)]
pub enum RenderError {
    /// A record is missing its id, anchors or family payload
    #[error("invalid record '{id}': {reason}")]
    InvalidRecord {
        /// Offending record id (may be empty)
        id: String,
        /// What was wrong
        reason: String,
    },

    /// Update/remove target not registered
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Asynchronous primitive construction failed
    #[error("failed to load resource '{uri}' for entity '{id}': {reason}")]
    ResourceLoad {
        /// Entity whose add was rejected
        id: EntityId,
        /// Resource that failed
        uri: String,
        /// Host-reported reason
        reason: String,
    },

    /// The factory was asked for a family it has no registration for
    #[error("unsupported entity family: {0}")]
    UnsupportedFamily(String),

    /// Operation on a destroyed renderer
    #[error("renderer has been destroyed")]
    Destroyed,

    /// The rendering host rejected an operation
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RenderError {
    /// Shorthand for [`RenderError::InvalidRecord`]
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate
pub type RenderResult<T> = Result<T, RenderError>;
