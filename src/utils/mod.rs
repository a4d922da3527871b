//! Common utilities and helper functions

pub mod error;
pub mod retry;

/// Check that a configured SQL identifier is safe to interpolate.
///
/// Accepts `name` or `schema.name` made of ASCII alphanumerics and `_`,
/// not starting with a digit.
pub fn is_sql_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').count() <= 2
        && name.split('.').all(|part| {
            !part.is_empty()
                && !part.starts_with(|c: char| c.is_ascii_digit())
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Normalize a proxy endpoint given as `host:port` into a URL.
pub fn normalize_proxy_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
