//! URL helpers for building provider endpoints without doubled slashes.

/// Strip trailing slashes from a base URL.
pub fn normalize_base_url(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Join a base URL and an endpoint path.
pub fn construct_api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_without_duplicate_slashes() {
        assert_eq!(
            construct_api_url("https://api.example.com/v1/", "models/m:stream"),
            "https://api.example.com/v1/models/m:stream"
        );
        assert_eq!(
            construct_api_url("https://api.example.com/v1", "/models/m"),
            "https://api.example.com/v1/models/m"
        );
    }

    #[test]
    fn normalize_strips_only_trailing_slashes() {
        assert_eq!(normalize_base_url("https://x/"), "https://x");
        assert_eq!(normalize_base_url("https://x//"), "https://x");
        assert_eq!(normalize_base_url("https://x"), "https://x");
    }
}
