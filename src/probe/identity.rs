// Identity keys for observed devices
//
// Path identity ("/dev/video0") is stable across cycles for the same handle.
// Index identity ("Index_0") is positional: if the OS reorders devices between
// cycles, one physical camera can look disconnected while another appears.

use std::path::Path;

use crate::constants::{INDEX_IDENTITY_PREFIX, VIDEO_DEVICE_PREFIX};

/// Identity for a platform device path
pub fn path_identity(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Synthetic identity for an index-probed device
pub fn index_identity(index: u32) -> String {
    format!("{}{}", INDEX_IDENTITY_PREFIX, index)
}

/// "/dev/video12" -> 12. None unless the file name is "video" followed by digits.
pub fn os_index_from_path(path: &Path) -> Option<i64> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix(VIDEO_DEVICE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
