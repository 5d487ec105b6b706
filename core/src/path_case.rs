//! Case-sensitive path resolution
//!
//! Our NTFS driver matches names case sensitively, while removable-media
//! loader paths are conventionally written in lowercase. Walk the path one
//! component at a time and substitute the spelling found on disk.

use crate::firmware::Directory;
use crate::Status;
use alloc::string::String;

/// Case-insensitive comparison, one char at a time.
fn eq_ignore_case(a: &str, b: &str) -> bool {
    let mut a = a.chars().flat_map(char::to_lowercase);
    let mut b = b.chars().flat_map(char::to_lowercase);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x == y => {}
            _ => return false,
        }
    }
}

/// Rewrite `path` (absolute, `\` separated) with the on-disk casing of each
/// component, starting from `root`.
///
/// Returns `INVALID_PARAMETER` for a relative path and `NOT_FOUND` when a
/// component does not exist. Directory read errors are passed through.
pub fn resolve_case<D: Directory>(root: &mut D, path: &str) -> Result<String, Status> {
    let relative = path.strip_prefix('\\').ok_or(Status::INVALID_PARAMETER)?;

    let mut resolved = String::with_capacity(path.len());
    for component in relative.split('\\').filter(|c| !c.is_empty()) {
        let parent = if resolved.is_empty() { "\\" } else { resolved.as_str() };
        let mut dir = root.open_dir(parent)?;

        let mut found = None;
        while let Some(entry) = dir.read_entry()? {
            if eq_ignore_case(&entry, component) {
                found = Some(entry);
                break;
            }
        }
        drop(dir);

        let entry = found.ok_or(Status::NOT_FOUND)?;
        resolved.push('\\');
        resolved.push_str(&entry);
    }

    if resolved.is_empty() {
        resolved.push('\\');
    }
    Ok(resolved)
}
