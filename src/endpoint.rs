//! URL helpers shared by the collaborator HTTP clients.

use reqwest::Url;

/// Parse `url`, defaulting to `https://` when no scheme is present, and drop trailing slashes.
pub(crate) fn normalize_base_url(url: &str) -> Result<String, String> {
    let trimmed = url.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let mut parsed = Url::parse(&with_scheme).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string().trim_end_matches('/').to_string())
}

/// Join a base URL and a relative path with exactly one separating slash.
pub(crate) fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https_scheme() {
        assert_eq!(
            normalize_base_url("search.example.org").unwrap(),
            "https://search.example.org"
        );
    }

    #[test]
    fn trailing_slashes_are_removed() {
        assert_eq!(
            normalize_base_url("http://127.0.0.1:9000/store/").unwrap(),
            "http://127.0.0.1:9000/store"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(normalize_base_url("http://").is_err());
    }

    #[test]
    fn joins_without_double_slashes() {
        assert_eq!(
            format_endpoint("http://host/", "/bucket/key"),
            "http://host/bucket/key"
        );
    }
}
