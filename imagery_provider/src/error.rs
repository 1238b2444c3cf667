//! Errors, and the channel through which they are reported to whoever listens.

use std::sync::{Arc, Mutex, PoisonError};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

use crate::tiling_scheme::TileId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{section} spatial reference WKID {wkid} is not supported")]
    UnsupportedSpatialReference { section: &'static str, wkid: u32 },

    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("could not decode image: {0}")]
    InvalidImage(String),

    #[error("invalid quadkey '{0}'")]
    InvalidQuadKey(String),

    #[error("tile {0:?} lies outside of the tiling scheme")]
    TileOutOfRange(TileId),
}

impl Error {
    pub(crate) fn transport(url: impl ToString, error: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }

    pub(crate) fn invalid_url(url: &str, error: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedSpatialReference { .. } => ErrorKind::UnsupportedSpatialReference,
            Error::MalformedMetadata(_) => ErrorKind::MalformedMetadata,
            Error::Transport { .. } => ErrorKind::TransportFailure,
            Error::InvalidUrl { .. } | Error::InvalidQuadKey(_) | Error::TileOutOfRange(_) => {
                ErrorKind::InvalidRequest
            }
            Error::InvalidImage(_) => ErrorKind::InvalidImage,
        }
    }
}

/// Coarse classification of [`Error`]s, for the listeners of [`ErrorEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Server reported a spatial reference which cannot be mapped onto a supported projection.
    /// Fatal for the provider construction.
    UnsupportedSpatialReference,
    /// Metadata document lacks something it must have. Fatal for the provider construction.
    MalformedMetadata,
    /// Server could not be reached, or answered with an error.
    TransportFailure,
    /// Request could not even be formed.
    InvalidRequest,
    /// Server answered with something which is not an image.
    InvalidImage,
}

/// Error raised on the [`ErrorEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct TileProviderError {
    pub kind: ErrorKind,
    /// Human readable message, naming the endpoint which failed.
    pub message: String,
    /// Tile being requested or picked, `None` for metadata failures.
    pub tile: Option<TileId>,
    pub error: Error,
}

/// Broadcasts [`TileProviderError`]s to all subscribers. Cloning gives a handle to the same
/// channel.
#[derive(Clone, Default)]
pub struct ErrorEvent {
    subscribers: Arc<Mutex<Vec<UnboundedSender<TileProviderError>>>>,
}

impl ErrorEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive all errors raised from now on.
    pub fn subscribe(&self) -> UnboundedReceiver<TileProviderError> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn raise(&self, error: TileProviderError) {
        // Dropped receivers are forgotten here.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.unbounded_send(error.clone()).is_ok());
    }

    /// Raise `error` which happened while accessing `endpoint`, and give it back so it can be
    /// propagated to the caller as well.
    pub(crate) fn report(&self, endpoint: &str, tile: Option<TileId>, error: Error) -> Error {
        let message = format!("An error occurred while accessing {endpoint}: {error}");
        log::warn!("{message}");

        self.raise(TileProviderError {
            kind: error.kind(),
            message,
            tile,
            error: error.clone(),
        });

        error
    }
}
