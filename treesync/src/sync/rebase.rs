use std::path::Path;

use treesync_core::event::Event;

/// Keep events whose source path lies under one of `directories`. Paths are
/// kept as is, since content is still read from the original location.
pub fn filter_by_directory(events: &[Event], directories: &[String]) -> Vec<Event> {
    events
        .iter()
        .filter(|event| {
            let src_path = Path::new(event.src_path());
            directories
                .iter()
                .any(|directory| src_path.starts_with(directory))
        })
        .cloned()
        .collect()
}
