//! Container path checks used by mount validation.

use std::path::{Component, Path};

/// True for an absolute container path without `..` segments.
pub fn is_mount_target(path: &str) -> bool {
    let path = Path::new(path);
    path.is_absolute()
        && !path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
}

/// Key used to detect two mounts onto the same container directory.
pub fn mount_key(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
