// ── SousChef Atoms: Error Types ────────────────────────────────────────────
// Single canonical error enum for the core, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by failure domain (store, upstream, config…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • A lookup miss is never an error: finders return `Option`.
//   • An invalid recipe selection is a normal reply, never an error.
//   • No variant carries secret material (API keys, passwords) in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// The persistence layer could not be reached or rejected a statement.
    /// Fatal for the current turn.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    /// A concurrent create for the same (kind, key) could not be resolved
    /// within the bounded number of attempts.
    #[error("Conflict: could not settle {kind} '{key}' after concurrent creates")]
    Conflict { kind: String, key: String },

    /// Classifier or catalog collaborator failed (API-level failure, bad
    /// status, open circuit, malformed payload).
    #[error("Upstream error: {service}: {message}")]
    Upstream { service: String, message: String },

    /// HTTP / network failure (reqwest layer), including timeouts.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport / bridge failure.
    #[error("Channel error: {channel}: {message}")]
    Channel { channel: String, message: String },

    /// Catch-all for errors that do not yet have a dedicated variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    /// Create an upstream error with service name and message.
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream { service: service.into(), message: message.into() }
    }

    /// Create a channel error with name and message.
    pub fn channel(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Channel { channel: channel.into(), message: message.into() }
    }

    /// Create a conflict error for a (kind, key) pair.
    pub fn conflict(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Conflict { kind: kind.into(), key: key.into() }
    }

    /// True when a collaborator (classifier, catalog) failed, including
    /// transport-level failures and timeouts.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Network(_))
    }

    /// True when the entity store failed.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Conflict { .. })
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All core operations return this type.
pub type EngineResult<T> = Result<T, EngineError>;
