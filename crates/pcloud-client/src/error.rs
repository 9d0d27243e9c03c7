//! Client error types.
//!
//! Every variant carries enough context to diagnose the problem without a
//! debugger. Errors never include secret values or bearer tokens.

use crate::kind::Kind;

/// Errors that can occur while talking to the vault.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Missing or invalid client configuration.
    #[error("vault client config error: {0}")]
    Config(String),

    /// Authentication failed (401/403, or the identity service refused the
    /// client credentials).
    #[error("vault auth error: {0}")]
    Auth(String),

    /// The vault has no entity with this identifier.
    #[error("{kind} '{id}' not found in the vault")]
    NotFound { kind: Kind, id: String },

    /// The vault returned an HTTP error.
    #[error("vault API error {status_code}: {message}")]
    Api { status_code: u16, message: String },

    /// The identifier cannot name an entity of the requested kind.
    #[error("identifier '{id}' does not name a {kind}")]
    KindMismatch { kind: Kind, id: String },

    /// The safe was created but its seed member could not be added.
    #[error("safe '{safe_url_id}' created but seed member could not be added: {source}")]
    SeedMember {
        safe_url_id: String,
        #[source]
        source: Box<ClientError>,
    },

    /// The request timed out.
    #[error("vault request timed out")]
    Timeout,

    /// Network or HTTP client error.
    #[error("vault network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("vault json error: {0}")]
    Json(#[from] serde_json::Error),
}
