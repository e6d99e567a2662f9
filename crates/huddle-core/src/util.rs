//! Small helpers shared by the engine, auth and the CLI.

/// Trimmed text, or `None` when nothing is left.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Like [`normalize_text_option`], also dropping trailing slashes so routes
/// can be appended with a single `/`.
pub fn normalize_base_url_option(value: Option<String>) -> Option<String> {
    normalize_text_option(value.map(|url| url.trim().trim_end_matches('/').to_string()))
}

pub fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

/// First 180 characters of a response body, for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Unix time in seconds (session expiry)
pub fn unix_seconds_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Unix time in milliseconds (record and queue timestamps)
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_normalizes_to_none() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some("  Groceries ".to_string())),
            Some("Groceries".to_string())
        );
    }

    #[test]
    fn base_urls_lose_trailing_slashes() {
        assert_eq!(
            normalize_base_url_option(Some(" https://api.example.com// ".to_string())),
            Some("https://api.example.com".to_string())
        );
        assert_eq!(normalize_base_url_option(Some("/".to_string())), None);
    }

    #[test]
    fn only_http_schemes_count_as_urls() {
        assert!(is_http_url("http://localhost:8080"));
        assert!(is_http_url(" https://api.example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("api.example.com"));
    }

    #[test]
    fn compact_text_caps_long_bodies() {
        assert_eq!(compact_text(&"e".repeat(400)).len(), 180);
        assert_eq!(compact_text("  bad request  "), "bad request");
    }

    #[test]
    fn millisecond_clock_agrees_with_second_clock() {
        let seconds = unix_seconds_now();
        let millis = unix_millis_now();
        assert!((millis / 1000 - seconds).abs() <= 1);
    }
}
