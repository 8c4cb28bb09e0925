//! Error types shared by the playback pipeline and its collaborators.

use std::fmt::{Display, Formatter};

/// Category of an externally visible playback error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source could not be opened or has no decodable streams.
    ResourceError,
    /// A seek request could not be executed.
    SeekError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceError => write!(f, "resource error"),
            Self::SeekError => write!(f, "seek error"),
        }
    }
}

/// Error raised by a media collaborator (backend, demuxer or decoder).
#[derive(Debug)]
pub enum MediaError {
    Io(std::io::Error),
    Unsupported(String),
    NoStreams,
    Decode(String),
    Seek(String),
    InvalidSource(String),
    Interrupted,
    NotInitialized,
}

impl MediaError {
    /// Return true when the error was caused by the interrupt token.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl Display for MediaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Unsupported(err) => write!(f, "unsupported media: {}", err),
            Self::NoStreams => write!(f, "no decodable streams found"),
            Self::Decode(err) => write!(f, "decode error: {}", err),
            Self::Seek(err) => write!(f, "seek failed: {}", err),
            Self::InvalidSource(err) => write!(f, "invalid source: {}", err),
            Self::Interrupted => write!(f, "operation interrupted"),
            Self::NotInitialized => {
                write!(f, "media registries not initialized, call lockstep_lib::init()")
            }
        }
    }
}

impl std::error::Error for MediaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MediaError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Last error surfaced by the player to its observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PlayerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn resource(err: &MediaError) -> Self {
        Self::new(ErrorKind::ResourceError, err.to_string())
    }

    pub(crate) fn seek(err: &MediaError) -> Self {
        Self::new(ErrorKind::SeekError, err.to_string())
    }
}

impl Display for PlayerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PlayerError {}
