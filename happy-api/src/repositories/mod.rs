pub mod favorite_repo;
pub mod menu_repo;
pub mod notification_repo;
pub mod restaurant_repo;
pub mod review_repo;
pub mod user_repo;

/// `ILIKE` pattern matching `term` anywhere, with wildcards in the term
/// escaped.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Blank search strings behave like an absent one.
pub fn search_term(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern)
}
