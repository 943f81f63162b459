//! Error types for the entitlement cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during cache and invalidation operations
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Tier Errors
    // =========================================================================
    /// Remote tier unreachable, timed out, or rejected the operation
    #[error("Remote tier unavailable for region '{region}': {reason}")]
    RemoteUnavailable { region: String, reason: String },

    /// Eviction of a single key failed; other keys in the same fan-out are
    /// unaffected
    #[error("Eviction failed for key '{key}' in region '{region}'")]
    EvictionFailed { region: String, key: String },

    // =========================================================================
    // Caller-Facing Errors
    // =========================================================================
    /// Caller-supplied loader failed on a double miss
    #[error("Loader failed for key '{key}': {source}")]
    Loader {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// JSON (de)serialization error from the typed helpers
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
