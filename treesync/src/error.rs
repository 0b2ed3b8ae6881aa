use std::{io, path::PathBuf};

use thiserror::Error;
use treesync_core::{error::EventError, event::Event};

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Invalid path: '{0}'")]
    InvalidPath(String),
    #[error("Conflicting rename of '{0}' into '{1}': destination already exists")]
    ConflictingRename(String, String),
}

#[derive(Debug, Error)]
pub enum InvertError {
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("Unable to read final content of '{0}': {1}")]
    ReadContent(PathBuf, io::Error),
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Missing content for event '{0}'")]
    MissingContent(Event),
    #[error("Target of event '{0}' already exists")]
    AlreadyExists(Event),
    #[error("Target of event '{0}' is not of the expected type")]
    TypeMismatch(Event),
    #[error("Invalid path in event '{0}'")]
    InvalidPath(Event),
    #[error("Io error while applying event '{0}': {1}")]
    Io(Event, io::Error),
}

impl ApplyError {
    /// The event which failed to apply
    pub fn event(&self) -> &Event {
        match self {
            ApplyError::MissingContent(event)
            | ApplyError::AlreadyExists(event)
            | ApplyError::TypeMismatch(event)
            | ApplyError::InvalidPath(event)
            | ApplyError::Io(event, _) => event,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Invert error: {0}")]
    Invert(#[from] InvertError),
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),
    #[error("Related file io error for '{0}': {1}")]
    RelatedLocalFileIoError(PathBuf, io::Error),
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("Unable to index '{0}': {1}")]
    Index(PathBuf, walkdir::Error),
    #[error("Related file io error for '{0}': {1}")]
    Io(PathBuf, io::Error),
    #[error("Events channel closed")]
    ChannelClosed,
}
