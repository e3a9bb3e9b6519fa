use std::io;
use thiserror::Error;

/// Why a single reading could not be taken. Never fatal to the engine: the
/// affected field is degraded for that cycle and sampling continues.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("{what} unavailable: {source}")]
    SourceUnavailable {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("invalid {what} sample: {detail}")]
    InvalidSample { what: &'static str, detail: String },

    #[error("{what} refresh panicked")]
    Panicked { what: &'static str },
}

pub type Result<T> = std::result::Result<T, SampleError>;

impl SampleError {
    pub fn unavailable(what: &'static str, source: io::Error) -> Self {
        SampleError::SourceUnavailable { what, source }
    }

    pub fn invalid<S: Into<String>>(what: &'static str, detail: S) -> Self {
        SampleError::InvalidSample {
            what,
            detail: detail.into(),
        }
    }
}
