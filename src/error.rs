//! Error types for the panel.

use crate::models::NoteId;
use thiserror::Error;

/// Result alias for user-facing panel commands.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Failures of the key-value storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No storage area is reachable (e.g. storage disabled by the browser).
    #[error("storage unavailable")]
    Unavailable,

    #[error("storage read failed: {0}")]
    Read(String),

    #[error("storage write failed: {0}")]
    Write(String),

    #[error("stored data is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while creating or driving an embedded frame.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("could not create frame: {0}")]
    Create(String),

    #[error("could not observe frame size: {0}")]
    Observe(String),

    #[error("could not message frame: {0}")]
    Post(String),

    /// No live frame is registered for the note.
    #[error("no frame for note {0}")]
    Missing(NoteId),
}

/// Delivery failures of the cross-context transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Nobody is listening on the other side.
    #[error("receiving context is absent")]
    PeerAbsent,

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Invalid drag transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DragError {
    #[error("a drag gesture is already active")]
    GestureActive,

    #[error("note {0} is not in the list")]
    UnknownNote(NoteId),
}

/// Umbrella error for panel commands.
#[derive(Error, Debug)]
pub enum PanelError {
    /// Rejected URL input; the message is shown to the user.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Drag(#[from] DragError),
}
