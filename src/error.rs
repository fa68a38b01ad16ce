//! Error handling for the auxpow mining interface
//!
//! Every failure a mining client can observe has its own kind, so the RPC
//! layer can map it onto the historical JSON-RPC error codes.

use thiserror::Error;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the mining interface
#[derive(Error, Debug)]
pub enum Error {
    /// No peer-to-peer component is attached to the node
    #[error("Peer-to-peer functionality missing or disabled")]
    NetworkingDisabled,

    /// The node has no peers and is not mining on demand
    #[error("Node is not connected")]
    NotConnected,

    /// The node is still in initial block download
    #[error("Node is downloading blocks...")]
    StillSyncing,

    /// Compact difficulty bits of a candidate do not decode to a usable target
    #[error("Invalid difficulty bits {bits:08x} in block: {reason}")]
    MalformedDifficulty { bits: u32, reason: &'static str },

    /// Submitted hash or merkle root does not name an outstanding candidate
    #[error("{what} unknown")]
    UnknownKey { what: &'static str },

    /// Work payload has the wrong length
    #[error("Invalid size of data: {message}")]
    InvalidPayloadSize { message: String },

    /// Client supplied text that is not hex
    #[error("Invalid hex in {field}: {message}")]
    InvalidHex { field: &'static str, message: String },

    /// Auxiliary proof-of-work blob could not be decoded
    #[error("Malformed auxpow: {message}")]
    MalformedProof { message: String },

    /// Payout address is unparsable or belongs to another network
    #[error("Invalid payout address: {message}")]
    InvalidAddress { message: String },

    /// Block assembler could not produce a candidate
    #[error("Out of memory")]
    OutOfResources,

    /// A reconstructed block does not reproduce the key it was looked up by
    #[error("Internal inconsistency: {message}")]
    InternalInconsistency { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed difficulty error
    pub fn malformed_difficulty(bits: u32, reason: &'static str) -> Self {
        Self::MalformedDifficulty { bits, reason }
    }

    /// Create an unknown key error
    pub fn unknown_key(what: &'static str) -> Self {
        Self::UnknownKey { what }
    }

    /// Create an invalid payload size error
    pub fn invalid_payload_size(message: impl Into<String>) -> Self {
        Self::InvalidPayloadSize {
            message: message.into(),
        }
    }

    /// Create an invalid hex error
    pub fn invalid_hex(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidHex {
            field,
            message: message.into(),
        }
    }

    /// Create a malformed proof error
    pub fn malformed_proof(message: impl Into<String>) -> Self {
        Self::MalformedProof {
            message: message.into(),
        }
    }

    /// Create an invalid address error
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            message: message.into(),
        }
    }

    /// Create an internal inconsistency error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalInconsistency {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Gate failures clear up on their own once the node connects or syncs
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NotConnected | Error::StillSyncing)
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::NetworkingDisabled | Error::NotConnected | Error::StillSyncing => "gate",
            Error::MalformedDifficulty { .. } => "difficulty",
            Error::UnknownKey { .. } => "lookup",
            Error::InvalidPayloadSize { .. }
            | Error::InvalidHex { .. }
            | Error::MalformedProof { .. }
            | Error::InvalidAddress { .. } => "input",
            Error::OutOfResources => "resources",
            Error::InternalInconsistency { .. } => "internal",
            Error::Config { .. } => "config",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
        }
    }

    /// JSON-RPC error code reported to mining clients
    pub fn rpc_code(&self) -> i32 {
        match self {
            Error::NetworkingDisabled => -31,
            Error::NotConnected => -9,
            Error::StillSyncing => -10,
            Error::OutOfResources => -7,
            Error::UnknownKey { .. } | Error::InvalidPayloadSize { .. } | Error::InvalidHex { .. } => -8,
            Error::InvalidAddress { .. } => -5,
            Error::MalformedProof { .. } => -22,
            Error::MalformedDifficulty { .. } | Error::Config { .. } => -1,
            Error::InternalInconsistency { .. }
            | Error::Json(_)
            | Error::Yaml(_)
            | Error::Io(_) => -32603,
        }
    }
}
