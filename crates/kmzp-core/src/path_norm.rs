/// Strip `?query`, then `#fragment`, then a single leading `/`.
pub fn normalize(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    let path = path.split('#').next().unwrap_or(path);
    path.strip_prefix('/').unwrap_or(path)
}

/// Final `/`-separated segment of an archive path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
