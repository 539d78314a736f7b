//! Route pattern normalisation.

/// Joins a base path and a leaf path into a normalised pattern.
///
/// Slashes are trimmed from both ends of both parts. The result always has
/// exactly one leading slash, no trailing slash, and is `/` when both parts
/// are empty.
///
/// ```
/// use kiri_core::path::join;
///
/// assert_eq!(join("/api/", "/users/"), "/api/users");
/// assert_eq!(join("", "health"), "/health");
/// assert_eq!(join("/", "/"), "/");
/// ```
#[must_use]
pub fn join(base: &str, leaf: &str) -> String {
    let base = base.trim_matches('/');
    let leaf = leaf.trim_matches('/');

    match (base.is_empty(), leaf.is_empty()) {
        (true, true) => "/".to_owned(),
        (false, true) => format!("/{base}"),
        (true, false) => format!("/{leaf}"),
        (false, false) => format!("/{base}/{leaf}"),
    }
}
