//! Mountpoint path helpers

/// Whether a mount at `mountpoint` holds `dir`, comparing whole path components
pub fn contains_path(mountpoint: &str, dir: &str) -> bool {
    mountpoint == dir
        || mountpoint == "/"
        || dir
            .strip_prefix(mountpoint)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether `path` is already in canonical form: no empty, `.` or `..`
/// components and no trailing slash
pub fn is_canonical(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let relative = path.strip_prefix('/').unwrap_or(path);
    relative
        .split('/')
        .all(|c| !c.is_empty() && c != "." && c != "..")
}
