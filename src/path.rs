//! URL path helpers shared by the classifier and the self-link rewriter.

/// Split a URL path into its non-empty segments.
///
/// Leading and trailing slashes are ignored, so `"/ns/ns1/foo/"` yields
/// `["ns", "ns1", "foo"]` and `"/"` yields nothing.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}

/// Lexically clean a slash-separated path: collapse repeated slashes, drop `.` segments and
/// resolve `..` against the preceding segment. Rooted paths stay rooted.
#[must_use]
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join path elements with `/` and clean the result. Empty elements are ignored; joining only
/// empty elements yields an empty string.
#[must_use]
pub fn join_paths(elements: &[&str]) -> String {
    let non_empty: Vec<&str> = elements.iter().copied().filter(|e| !e.is_empty()).collect();
    if non_empty.is_empty() {
        return String::new();
    }
    clean_path(&non_empty.join("/"))
}
