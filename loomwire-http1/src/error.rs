use thiserror::Error;

use crate::http1::{Callback, SyntaxError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The tokenizer rejected the input bytes.
    #[error("malformed input: {0}")]
    Syntax(#[from] SyntaxError),
    /// A callback arrived in an order the HTTP grammar cannot produce.
    #[error("protocol violation: {event} callback after {previous}")]
    ProtocolViolation { event: Callback, previous: Callback },
    /// Bytes were fed with no message in progress.
    #[error("no message in progress, call init() first")]
    NotInitialized,
    /// The tokenizer and adapter disagree on the callback contract.
    #[error("internal defect: {0}")]
    Defect(String),
}

impl ParseError {
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Defect(_))
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
