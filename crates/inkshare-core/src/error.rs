//! Error types for the synchronization engine.
//!
//! None of these are fatal to a session: handlers drop the offending event,
//! log it, and leave roster and canvas invariants intact.

use thiserror::Error;

use crate::artist::ArtistId;
use crate::stroke::{StrokeHandle, StrokePhase};

/// Errors produced while applying drawing or session events.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An event referenced an artist that is not in the roster.
    #[error("Unknown artist: {0}")]
    UnknownArtist(ArtistId),
    /// A stroke operation was issued against a handle that is not building.
    #[error("Stroke {handle} is {state}, expected building")]
    InvalidStrokeState {
        handle: StrokeHandle,
        state: StrokePhase,
    },
    /// A message body could not be parsed.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    /// A pointer sample carried non-finite coordinates.
    #[error("Invalid pointer sample: ({x}, {y})")]
    InvalidSample { x: f64, y: f64 },
    /// The transport refused an outgoing message.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedMessage(err.to_string())
    }
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
