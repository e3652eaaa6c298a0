/// Checks if a URL path matches a configured pattern
///
/// Patterns are compared case-insensitively and come in two forms:
/// 1. Plain: matches when the pattern occurs anywhere in the path
///    (`/api/` matches `/docs/api/v1/users`)
/// 2. Wildcard: `*` stands for any run of characters, and the literal pieces
///    must appear in order (`/docs/*/reference` matches
///    `/docs/v2/sdk/reference/index`)
///
/// An empty pattern never matches.
///
/// # Examples
///
/// ```
/// use ripple_ingest::url::matches_path_pattern;
///
/// assert!(matches_path_pattern("/faq", "/support/FAQ"));
/// assert!(matches_path_pattern("/docs/*/reference", "/docs/v2/reference"));
/// assert!(!matches_path_pattern("/changelog", "/blog/post"));
/// ```
pub fn matches_path_pattern(pattern: &str, path: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let path = path.to_lowercase();

    if pattern.trim_matches('*').is_empty() {
        return false;
    }

    let mut rest = path.as_str();
    for piece in pattern.split('*').filter(|p| !p.is_empty()) {
        match rest.find(piece) {
            Some(idx) => rest = &rest[idx + piece.len()..],
            None => return false,
        }
    }
    true
}
