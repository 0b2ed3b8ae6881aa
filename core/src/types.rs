use std::fmt::Display;

use strum_macros::{AsRefStr, EnumString};

pub type RelativeFilePath = String;
pub type Changeset = Vec<crate::event::Event>;

/// Kind of a watcher record, as found in the `event_type` field.
///
/// `Closed` and `Opened` are emitted by some watchers but carry no change:
/// they decode to no event at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Created,
    Deleted,
    Modified,
    Moved,
    Closed,
    Opened,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl EventKind {
    pub fn is_change(&self) -> bool {
        match self {
            EventKind::Created | EventKind::Deleted | EventKind::Modified | EventKind::Moved => {
                true
            }
            EventKind::Closed | EventKind::Opened => false,
        }
    }
}
