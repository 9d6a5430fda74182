//! Error types for the OData client.

use thiserror::Error;

/// Result type for all client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to an OData service.
#[derive(Error, Debug)]
pub enum Error {
    /// The service's metadata document is malformed or incomplete.
    #[error("metadata parse error: {0}")]
    MetadataParse(String),

    /// The requested service or entity set has not been registered.
    #[error("unknown entity set {entity_set:?} in service {service:?}")]
    UnknownEntity {
        /// Service name as passed to `register_service`.
        service: String,
        /// Entity set name requested.
        entity_set: String,
    },

    /// A filter expression references an unknown property or an
    /// incompatible literal.
    #[error("filter syntax error: {0}")]
    FilterSyntax(String),

    /// Invalid query argument or attempted key mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Token refresh failed twice.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network unreachable or malformed response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The session was closed and may not be used anymore.
    #[error("session is closed")]
    SessionClosed,
}

impl Error {
    /// Returns true if the error came from the transport layer rather than
    /// from client-side validation.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
