//! Error types.
//!
//! Transport loss is not an error here: the client reconnects on its own.
//! Undecodable coordinator messages are logged by the event loop. Only bad
//! configuration, a denied login or a closed event stream reach the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Problems loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Encoding or decoding a typed coordinator message failed.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to encode message {type_id}: {source}")]
    Encode {
        type_id: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode message {type_id}: {source}")]
    Decode {
        type_id: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected message {expected}, got {actual}")]
    WrongType { expected: u32, actual: u32 },
}

/// A dispatched handler rejected its packet.
///
/// The event loop logs these and keeps running.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("coordinator reported failure: {0}")]
    Rejected(String),
}

/// Reasons the client stops running.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Login was refused. Never retried.
    #[error("login denied: {reason}")]
    LoginDenied { reason: String },

    /// The transport's event stream ended and no further events can arrive.
    #[error("transport event stream closed")]
    TransportClosed,
}
