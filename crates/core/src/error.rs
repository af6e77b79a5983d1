// crates/core/src/error.rs
use std::string::FromUtf8Error;
use thiserror::Error;

/// Errors that can occur when decoding a durable status record
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated input decoding {field}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("invalid UTF-8 decoding {field}")]
    InvalidUtf8 {
        field: &'static str,
        #[source]
        source: FromUtf8Error,
    },

    #[error("unknown lifecycle state name: {name:?}")]
    UnknownState { name: String },
}
