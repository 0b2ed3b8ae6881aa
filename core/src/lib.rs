pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod types;
pub mod utils;

pub const CONFIG_FILE_NAME: &str = ".treesync.conf";
