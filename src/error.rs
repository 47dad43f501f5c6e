use thiserror::Error;

/// Failure to obtain a quote from a [`crate::quote::QuoteSource`].
///
/// Cloneable so it can travel inside [`crate::runtime::AppEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("quote request failed: {0}")]
    Transport(String),

    #[error("quote service returned HTTP {0}")]
    Status(u16),

    #[error("quote service returned no usable data: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("stored story progress is unreadable: {0}")]
    StorageParse(#[from] serde_json::Error),

    #[error("could not encode story progress: {0}")]
    Encode(String),

    #[error("precondition violated: {0}")]
    Precondition(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
