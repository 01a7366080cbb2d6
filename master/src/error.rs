//! Error types for master coordination operations.

use vireo_common::InvalidNameError;

/// Error type for registry and topology operations.
///
/// Registry errors are returned synchronously to the caller that violated
/// a precondition; none of them are fatal to the registry itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A channel is already registered for the client key. The caller
    /// decides whether to reject the new session or evict the old one;
    /// the registry never silently overwrites.
    DuplicateClient(String),

    /// No channel is registered for the client key. Usually a benign race
    /// between a disconnect and an in-flight notification.
    UnknownClient(String),

    /// The client's channel was closed while a send was in flight.
    ChannelClosed(String),

    /// An identifier failed validation.
    InvalidName(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateClient(key) => write!(f, "client key is already in use: {}", key),
            Error::UnknownClient(key) => write!(f, "client key is not in use: {}", key),
            Error::ChannelClosed(key) => write!(f, "client channel closed: {}", key),
            Error::InvalidName(msg) => write!(f, "invalid name: {}", msg),
        }
    }
}

impl From<InvalidNameError> for Error {
    fn from(err: InvalidNameError) -> Self {
        Error::InvalidName(err.message)
    }
}

/// Result type alias for master coordination operations.
pub type Result<T> = std::result::Result<T, Error>;
