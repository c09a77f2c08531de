//! Small string helpers shared by the provider layer

/// Maximum length for provider error content carried into error messages
pub const MAX_ERROR_CONTENT_LEN: usize = 200;

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

const SECRET_MARKERS: &[&str] = &[
    "api_key",
    "apikey",
    "x-api-key",
    "secret",
    "password",
    "credential",
    "bearer",
    "token=",
    "sk-",
];

const REDACTED: &str = "[redacted]";

/// Provider text fit for error messages and logs: whitespace collapsed,
/// any word carrying a secret marker (and the word after it) replaced,
/// then capped at `MAX_ERROR_CONTENT_LEN` characters.
pub fn sanitize_provider_message(content: &str) -> String {
    let mut words: Vec<&str> = Vec::new();
    let mut redact_next = false;
    for word in content.split_whitespace() {
        let lower = word.to_lowercase();
        if SECRET_MARKERS.iter().any(|marker| lower.contains(marker)) {
            words.push(REDACTED);
            redact_next = true;
        } else if redact_next {
            words.push(REDACTED);
            redact_next = false;
        } else {
            words.push(word);
        }
    }
    truncate_str(&words.join(" "), MAX_ERROR_CONTENT_LEN).to_string()
}
