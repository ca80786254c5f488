//! Docker Hub `library/` namespace normalization.
//!
//! Official images on Docker Hub live under `library/`, but clients may
//! address them unqualified (`busybox` rather than `library/busybox`). Both
//! token scopes and manifest/blob paths are completed here. Neither function
//! does anything for registries other than the primary one.

/// Complete an auth scope such as `repository:busybox:pull`.
///
/// Rewrites only when the scope has exactly three colon-separated parts and
/// the resource name has no `/`.
pub fn normalize_scope(scope: &str, is_primary: bool) -> String {
    if !is_primary {
        return scope.to_string();
    }

    let parts: Vec<&str> = scope.split(':').collect();
    match parts.as_slice() {
        [kind, name, action] if !name.contains('/') => {
            format!("{}:library/{}:{}", kind, name, action)
        }
        _ => scope.to_string(),
    }
}

/// Complete a `/v2/<name>/<kind>/<reference>` path.
///
/// Returns `Some(path)` when the path must be rewritten; the caller answers
/// with a redirect to it instead of forwarding.
pub fn normalize_path(path: &str, is_primary: bool) -> Option<String> {
    if !is_primary {
        return None;
    }

    let mut segments: Vec<&str> = path.split('/').collect();
    if segments.len() != 5 {
        return None;
    }
    segments.insert(2, "library");
    Some(segments.join("/"))
}
