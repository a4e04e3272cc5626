//! LinkedIn profile URL recognition

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static PROFILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/in/[\w\-]+/?$)|(/pub/[\w\-]+/\w+/\w+/\w+/?$)")
        .expect("profile path pattern is valid")
});

const PROFILE_HOSTS: [&str; 2] = ["linkedin.com", "www.linkedin.com"];

/// Whether `value` looks like a LinkedIn profile URL.
///
/// A missing scheme is tolerated (`linkedin.com/in/jane` matches).
pub fn is_profile_url(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }

    let candidate = if value.starts_with("http://") || value.starts_with("https://") {
        value.to_string()
    } else {
        format!("https://{}", value)
    };

    let Ok(parsed) = Url::parse(&candidate) else {
        return false;
    };

    let host_ok = parsed
        .host_str()
        .map(|h| PROFILE_HOSTS.iter().any(|p| h.eq_ignore_ascii_case(p)))
        .unwrap_or(false);

    host_ok && PROFILE_PATH.is_match(parsed.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_profiles() {
        assert!(is_profile_url("https://www.linkedin.com/in/jane-doe"));
        assert!(is_profile_url("https://linkedin.com/in/alice/"));
        assert!(is_profile_url("http://www.linkedin.com/in/bob_smith-42"));
        assert!(is_profile_url("  https://www.LinkedIn.com/in/alice  "));
    }

    #[test]
    fn test_scheme_is_optional() {
        assert!(is_profile_url("linkedin.com/in/alice"));
        assert!(is_profile_url("www.linkedin.com/in/alice"));
    }

    #[test]
    fn test_public_profile_format() {
        assert!(is_profile_url(
            "https://www.linkedin.com/pub/jane-doe/12/345/678"
        ));
    }

    #[test]
    fn test_rejects_other_urls() {
        assert!(!is_profile_url(""));
        assert!(!is_profile_url("not a url"));
        assert!(!is_profile_url("https://example.com/in/alice"));
        assert!(!is_profile_url("https://uk.linkedin.com/in/alice"));
        assert!(!is_profile_url("https://www.linkedin.com/company/acme"));
        assert!(!is_profile_url("https://www.linkedin.com/in/"));
        assert!(!is_profile_url("https://www.linkedin.com/in/alice/details"));
    }
}
