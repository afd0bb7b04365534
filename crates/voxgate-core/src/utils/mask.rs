//! Masking for secrets and URLs that end up in logs or status responses.

/// Keep a short prefix and suffix of a secret.
///
/// Secrets of 12 characters or fewer are fully hidden.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Reduce a URL to scheme, host and path; query strings may carry tokens.
///
/// Unparseable input is returned as `<invalid url>` rather than echoed.
#[must_use]
pub fn mask_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) if parsed.host_str().is_some() => {
            let host = parsed.host_str().unwrap_or_default();
            let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
            format!("{}://{host}{port}{}", parsed.scheme(), parsed.path())
        }
        _ => "<invalid url>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("abcdefghijklmnop"), "abcd...mnop");
    }

    #[test]
    fn test_mask_url_drops_query() {
        assert_eq!(
            mask_url("wss://livekit.grok.com:443/rtc?access_token=secret"),
            "wss://livekit.grok.com/rtc"
        );
        assert_eq!(
            mask_url("http://127.0.0.1:9000/v1/chat/completions?x=1"),
            "http://127.0.0.1:9000/v1/chat/completions"
        );
        assert_eq!(mask_url("not a url"), "<invalid url>");
    }
}
