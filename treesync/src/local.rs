pub mod reducer;
pub mod watcher;
