use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufRead, BufReader},
    path::Path,
};

use walkdir::WalkDir;

use crate::{event::Content, types::RelativeFilePath};

pub fn strbool(value: &str) -> bool {
    ["true", "True", "t", "T", "1"].contains(&value)
}

/// Comma separated config value into a list of trimmed, non empty values
pub fn strlist(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}

// From https://stackoverflow.com/a/75443325/801924
pub fn md5_file(file_path: &Path) -> io::Result<String> {
    let f = File::open(file_path)?;
    let len = f.metadata()?.len();
    // Reasonable buffer size (1MB max)
    let buf_len = (len.min(1_000_000) as usize).max(1);
    let mut buf = BufReader::with_capacity(buf_len, f);
    let mut context = md5::Context::new();
    loop {
        let part = buf.fill_buf()?;
        if part.is_empty() {
            break;
        }
        context.consume(part);
        let part_len = part.len();
        buf.consume(part_len);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Read file content as text when it is valid utf-8, as raw bytes otherwise
pub fn read_content(file_path: &Path) -> io::Result<Content> {
    Ok(Content::from_bytes(fs::read(file_path)?))
}

/// Forward slash separated representation of a relative path
pub fn slash_path(path: &Path) -> RelativeFilePath {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<String>>()
        .join("/")
}

/// Every path under `root` (root excluded) with the md5 of its content, or
/// `None` for directories. Two trees with equal fingerprints hold the same
/// files with the same content.
pub fn tree_fingerprint(root: &Path) -> io::Result<BTreeMap<RelativeFilePath, Option<String>>> {
    let mut fingerprint = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let relative_path = match entry.path().strip_prefix(root) {
            Ok(relative_path) => slash_path(relative_path),
            Err(_) => continue,
        };
        let hash = if entry.file_type().is_dir() {
            None
        } else {
            Some(md5_file(entry.path())?)
        };
        fingerprint.insert(relative_path, hash);
    }
    Ok(fingerprint)
}
