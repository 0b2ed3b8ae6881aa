use std::path::PathBuf;

use thiserror::Error;

use crate::types::EventKind;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
    #[error("Missing destination path for moved event of '{0}'")]
    MissingDestination(String),
    #[error("Unexpected destination path '{2}' for {0} event of '{1}'")]
    UnexpectedDestination(EventKind, String, String),
    #[error("Unexpected content for {0} event of '{1}'")]
    UnexpectedContent(EventKind, String),
    #[error("Unsupported content type for '{0}': {1}")]
    UnsupportedContentType(String, String),
    #[error("Path '{0}' is outside of root '{1}'")]
    OutsideRoot(String, PathBuf),
    #[error("Line {0}: {1}")]
    Line(usize, Box<EventError>),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
}
