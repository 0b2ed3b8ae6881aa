use std::{fmt::Display, path::Path, str::FromStr};

use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::EventError,
    types::{EventKind, RelativeFilePath},
    utils::slash_path,
};

/// File payload carried by augmented `Modified` events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Content::Text(text),
            Err(error) => Content::Binary(error.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_value(&self) -> Value {
        match self {
            Content::Text(text) => Value::String(text.clone()),
            Content::Binary(bytes) => {
                Value::Array(bytes.iter().map(|byte| Value::from(*byte)).collect())
            }
        }
    }

    fn from_value(src_path: &str, value: Value) -> Result<Self, EventError> {
        match value {
            Value::String(text) => Ok(Content::Text(text)),
            Value::Array(values) => {
                let mut bytes = Vec::with_capacity(values.len());
                for value in values {
                    match value.as_u64() {
                        Some(byte) if byte <= u8::MAX as u64 => bytes.push(byte as u8),
                        _ => {
                            return Err(EventError::UnsupportedContentType(
                                src_path.to_string(),
                                format!("array item {}", value),
                            ))
                        }
                    }
                }
                Ok(Content::Binary(bytes))
            }
            other => Err(EventError::UnsupportedContentType(
                src_path.to_string(),
                json_type_name(&other).to_string(),
            )),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One filesystem change. Paths are forward slash separated and, once
/// normalized with [`Event::relative_to`], relative to the synchronized root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created {
        src_path: RelativeFilePath,
        is_directory: bool,
    },
    Deleted {
        src_path: RelativeFilePath,
        is_directory: bool,
    },
    Modified {
        src_path: RelativeFilePath,
        is_directory: bool,
        content: Option<Content>,
    },
    Moved {
        src_path: RelativeFilePath,
        dest_path: RelativeFilePath,
        is_directory: bool,
    },
}

impl Event {
    pub fn created(src_path: &str, is_directory: bool) -> Self {
        Self::Created {
            src_path: src_path.to_string(),
            is_directory,
        }
    }

    pub fn deleted(src_path: &str, is_directory: bool) -> Self {
        Self::Deleted {
            src_path: src_path.to_string(),
            is_directory,
        }
    }

    pub fn modified(src_path: &str, is_directory: bool) -> Self {
        Self::Modified {
            src_path: src_path.to_string(),
            is_directory,
            content: None,
        }
    }

    pub fn moved(src_path: &str, dest_path: &str, is_directory: bool) -> Self {
        Self::Moved {
            src_path: src_path.to_string(),
            dest_path: dest_path.to_string(),
            is_directory,
        }
    }

    /// Modified event of a file carrying its content
    pub fn with_content(src_path: &str, content: Content) -> Self {
        Self::Modified {
            src_path: src_path.to_string(),
            is_directory: false,
            content: Some(content),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Created { .. } => EventKind::Created,
            Event::Deleted { .. } => EventKind::Deleted,
            Event::Modified { .. } => EventKind::Modified,
            Event::Moved { .. } => EventKind::Moved,
        }
    }

    pub fn src_path(&self) -> &str {
        match self {
            Event::Created { src_path, .. }
            | Event::Deleted { src_path, .. }
            | Event::Modified { src_path, .. }
            | Event::Moved { src_path, .. } => src_path,
        }
    }

    pub fn dest_path(&self) -> Option<&str> {
        match self {
            Event::Moved { dest_path, .. } => Some(dest_path),
            _ => None,
        }
    }

    pub fn is_directory(&self) -> bool {
        match self {
            Event::Created { is_directory, .. }
            | Event::Deleted { is_directory, .. }
            | Event::Modified { is_directory, .. }
            | Event::Moved { is_directory, .. } => *is_directory,
        }
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            Event::Modified { content, .. } => content.as_ref(),
            _ => None,
        }
    }

    /// Source path, then destination path for moves
    pub fn paths(&self) -> Vec<&str> {
        let mut paths = vec![self.src_path()];
        if let Some(dest_path) = self.dest_path() {
            paths.push(dest_path);
        }
        paths
    }

    /// Same event with each of its paths passed through `map`
    pub fn try_map_paths<F>(self, mut map: F) -> Result<Self, EventError>
    where
        F: FnMut(&str) -> Result<RelativeFilePath, EventError>,
    {
        Ok(match self {
            Event::Created {
                src_path,
                is_directory,
            } => Event::Created {
                src_path: map(&src_path)?,
                is_directory,
            },
            Event::Deleted {
                src_path,
                is_directory,
            } => Event::Deleted {
                src_path: map(&src_path)?,
                is_directory,
            },
            Event::Modified {
                src_path,
                is_directory,
                content,
            } => Event::Modified {
                src_path: map(&src_path)?,
                is_directory,
                content,
            },
            Event::Moved {
                src_path,
                dest_path,
                is_directory,
            } => Event::Moved {
                src_path: map(&src_path)?,
                dest_path: map(&dest_path)?,
                is_directory,
            },
        })
    }

    /// Same event with paths made relative to `root`. Absolute paths must be
    /// located under `root`; relative ones are only normalized.
    pub fn relative_to(self, root: &Path) -> Result<Self, EventError> {
        self.try_map_paths(|path| relative_path(root, path))
    }
}

fn relative_path(root: &Path, path: &str) -> Result<RelativeFilePath, EventError> {
    let path_ = Path::new(path);
    let relative = if path_.is_absolute() {
        slash_path(
            path_
                .strip_prefix(root)
                .map_err(|_| EventError::OutsideRoot(path.to_string(), root.to_path_buf()))?,
        )
    } else {
        path.trim_start_matches("./").to_string()
    };

    if relative.split('/').any(|part| part == "..") {
        return Err(EventError::OutsideRoot(
            path.to_string(),
            root.to_path_buf(),
        ));
    }
    Ok(relative)
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let type_ = if self.is_directory() {
            "directory"
        } else {
            "file"
        };
        match self {
            Event::Moved {
                src_path,
                dest_path,
                ..
            } => write!(f, "{} {} {} -> {}", self.kind(), type_, src_path, dest_path),
            Event::Modified {
                src_path,
                content: Some(content),
                ..
            } => write!(
                f,
                "{} {} {} ({} bytes)",
                self.kind(),
                type_,
                src_path,
                content.len()
            ),
            _ => write!(f, "{} {} {}", self.kind(), type_, self.src_path()),
        }
    }
}

/// Serialized shape of an event, as exchanged with watchers and peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub event_type: String,
    #[serde(default)]
    pub is_directory: bool,
    pub src_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl Record {
    /// Decode into an event. Records of watcher notifications which are not
    /// changes (`opened`, `closed`) give `None`.
    pub fn into_event(self) -> Result<Option<Event>, EventError> {
        let kind = EventKind::from_str(&self.event_type)
            .map_err(|_| EventError::UnknownEventType(self.event_type.clone()))?;
        if !kind.is_change() {
            return Ok(None);
        }

        // Some watchers give an empty destination for events without one
        let dest_path = self.dest_path.filter(|dest_path| !dest_path.is_empty());
        if kind != EventKind::Moved {
            if let Some(dest_path) = dest_path {
                return Err(EventError::UnexpectedDestination(
                    kind,
                    self.src_path,
                    dest_path,
                ));
            }
        }
        if kind != EventKind::Modified && self.content.is_some() {
            return Err(EventError::UnexpectedContent(kind, self.src_path));
        }

        let src_path = self.src_path;
        let is_directory = self.is_directory;
        Ok(Some(match kind {
            EventKind::Created => Event::Created {
                src_path,
                is_directory,
            },
            EventKind::Deleted => Event::Deleted {
                src_path,
                is_directory,
            },
            EventKind::Modified => {
                let content = match self.content {
                    Some(value) => Some(Content::from_value(&src_path, value)?),
                    None => None,
                };
                Event::Modified {
                    src_path,
                    is_directory,
                    content,
                }
            }
            EventKind::Moved => Event::Moved {
                dest_path: dest_path
                    .ok_or_else(|| EventError::MissingDestination(src_path.clone()))?,
                src_path,
                is_directory,
            },
            EventKind::Closed | EventKind::Opened => return Ok(None),
        }))
    }
}

impl From<&Event> for Record {
    fn from(event: &Event) -> Self {
        Self {
            event_type: event.kind().to_string(),
            is_directory: event.is_directory(),
            src_path: event.src_path().to_string(),
            dest_path: event.dest_path().map(|dest_path| dest_path.to_string()),
            content: event.content().map(|content| content.to_value()),
        }
    }
}
