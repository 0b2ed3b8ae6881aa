use crate::{
    error::EventError,
    event::{Event, Record},
};

/// Decode newline delimited json records. Blank lines and records which are
/// not changes are skipped.
pub fn parse_lines(raw: &str) -> Result<Vec<Event>, EventError> {
    let mut events = vec![];
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = serde_json::from_str::<Record>(line)
            .map_err(EventError::from)
            .and_then(Record::into_event)
            .map_err(|error| EventError::Line(index + 1, Box::new(error)))?;
        if let Some(event) = event {
            events.push(event);
        }
    }
    Ok(events)
}

/// Encode events as newline delimited json records
pub fn to_lines(events: &[Event]) -> Result<String, EventError> {
    let mut lines = String::new();
    for event in events {
        lines.push_str(&serde_json::to_string(&Record::from(event))?);
        lines.push('\n');
    }
    Ok(lines)
}
