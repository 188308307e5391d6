//! Error types shared by every timer operation.

use thiserror::Error;

/// Boxed error produced by a fallible duration producer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by interval timers and their helpers.
///
/// Every failure is reported synchronously by the call that caused it.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument was rejected, e.g. `sync()` with no members or a
    /// non-positive tick ceiling.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A duration producer failed while its duration was being resolved.
    #[error("duration producer failed: {0}")]
    DurationProducer(#[source] BoxError),

    /// A timer configuration document could not be parsed or encoded.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A snapshot could not be encoded as MessagePack.
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns true for [`Error::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Take back the error a duration producer failed with, if it is an `E`.
    ///
    /// Any other error, or a producer error of another type, is returned
    /// unchanged in `Err`.
    pub fn downcast_producer<E>(self) -> std::result::Result<E, Self>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::DurationProducer(source) => source
                .downcast::<E>()
                .map(|err| *err)
                .map_err(Self::DurationProducer),
            other => Err(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
