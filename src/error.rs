//! Error types for the auto-responder.

use std::path::PathBuf;

/// Top-level error type. Every kind is fatal to the current run; nothing is
/// retried or degraded. The host decides whether to schedule another pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A rule record failed validation at load.
    #[error("rule is missing required field '{field}' in record: {record}")]
    Validation { field: &'static str, record: String },

    /// Opening or validating a mailbox session failed, or a protocol call on
    /// an established session failed.
    #[error("mailbox connection error: {0}")]
    Connection(String),

    /// An overview fetch returned a record count other than one.
    #[error("overview fetch for uid {uid} returned {count} records, expected exactly one")]
    Fetch { uid: u32, count: usize },

    /// The required reply template is missing or unreadable.
    #[error("reply template could not be read: {}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The outgoing transport rejected the reply.
    #[error("failed to send reply: {0}")]
    Send(String),

    /// Unknown flag kind or other caller mistake.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
