use thiserror::Error;

/// Errors returned by the AEMET client, directory and fetcher.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("municipality not found: {0}")]
    NotFound(String),

    #[error("no data found for municipality {0}")]
    NoData(String),

    #[error("municipality data unavailable: {0}")]
    DataUnavailable(String),

    #[error("request failed after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

/// The failure category of an [`Error`], independent of how many retries
/// preceded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Transport,
    Decode,
    NotFound,
    NoData,
    DataUnavailable,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NoData(_) => ErrorKind::NoData,
            Error::DataUnavailable(_) => ErrorKind::DataUnavailable,
            Error::Exhausted { source, .. } => source.kind(),
        }
    }

    /// Number of attempts made before this error surfaced (1 unless retried).
    pub fn attempts(&self) -> u32 {
        match self {
            Error::Exhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    pub(crate) fn transport(url: &str, message: impl Into<String>) -> Self {
        Error::Transport { url: url.to_owned(), message: message.into() }
    }

    pub(crate) fn decode(url: &str, message: impl Into<String>) -> Self {
        Error::Decode { url: url.to_owned(), message: message.into() }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
