//! Error types for the building engine.
//!
//! Placement failures are not errors in this sense: they are ordinary
//! [`PlacementValidationResult`](crate::validation::PlacementValidationResult)
//! values. The types here cover content loading, configuration and API misuse.

use thiserror::Error;

use crate::catalog::DefinitionId;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested building definition is not in the catalog.
    #[error("Unknown building definition: {0}")]
    UnknownDefinition(DefinitionId),

    /// The controller is in a state that refuses the requested action.
    #[error("Controller is busy in state {state:?}, cannot {action}")]
    ControllerBusy {
        /// State the controller was in.
        state: crate::controller::ControllerStateKind,
        /// The refused action.
        action: &'static str,
    },

    /// Catalog text failed to parse.
    #[error("Failed to parse building catalog: {0}")]
    CatalogParse(#[from] ron::error::SpannedError),

    /// Catalog parsed but its content is inconsistent.
    #[error("Invalid building catalog: {}", .0.join("; "))]
    InvalidCatalog(Vec<String>),

    /// Configuration text failed to parse.
    #[error("Failed to parse engine config: {0}")]
    ConfigParse(ron::error::SpannedError),

    /// Configuration parsed but holds an unusable value.
    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),

    /// No instance with this id is registered.
    #[error("Unknown building instance: {0}")]
    UnknownInstance(crate::registry::InstanceId),

    /// Two definitions share one id.
    #[error("Duplicate building definition: {0}")]
    DuplicateDefinition(DefinitionId),
}
