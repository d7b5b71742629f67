//! Logging infrastructure for Storagefs
//!
//! Structured logging goes through `tracing` when the `logging` feature is on.
//! URIs handed to the provider may carry SAS tokens in their query string, so
//! everything logged passes through [`LogConfig`] redaction first.
//!
//! # Log Levels
//!
//! - **WARN**: Remote failures surfaced to the host, children left behind by a recursive delete
//! - **INFO**: Root cache insertions, virtual directory creation and retirement
//! - **DEBUG**: Operation entry, not-found on probe paths
//! - **TRACE**: Individual remote listing pages

use std::borrow::Cow;
use std::collections::HashSet;

/// Configuration for logging behavior
///
/// By default SAS token parameters and account-key-like values are redacted.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to redact sensitive data from logs (default: true)
    pub redact_sensitive: bool,

    /// Query string parameter names to redact (case-insensitive)
    /// Default: the SAS token fields (`sig`, `sv`, `se`, ...)
    pub redact_query_params: HashSet<String>,

    /// Maximum length of logged values before truncation (default: 200)
    pub max_value_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        let mut redact_query_params = HashSet::new();
        for param in &[
            "sig", "sv", "se", "sp", "st", "spr", "srt", "ss", "sr", "skoid", "sktid", "sks",
            "skv", "skt", "ske",
        ] {
            redact_query_params.insert(param.to_string());
        }
        Self {
            redact_sensitive: true,
            redact_query_params,
            max_value_length: 200,
        }
    }
}

impl LogConfig {
    /// Create a new log configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable sensitive data redaction (UNSAFE - use only for debugging)
    pub fn unsafe_disable_redaction(mut self) -> Self {
        self.redact_sensitive = false;
        self
    }

    /// Add a query parameter name to redact
    pub fn redact_param(mut self, name: &str) -> Self {
        self.redact_query_params.insert(name.to_lowercase());
        self
    }

    /// Set maximum length for logged values
    pub fn max_value_length(mut self, len: usize) -> Self {
        self.max_value_length = len;
        self
    }

    /// Redact SAS parameters from a URI's query string.
    pub fn redact_uri<'a>(&self, uri: &'a str) -> Cow<'a, str> {
        if !self.redact_sensitive {
            return self.truncate(uri);
        }

        let Some((base, query)) = uri.split_once('?') else {
            return self.truncate(uri);
        };

        let redacted: Vec<String> = query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((name, value))
                    if self.redact_query_params.contains(&name.to_lowercase())
                        || is_likely_secret(value) =>
                {
                    format!("{name}=[REDACTED]")
                }
                _ => pair.to_string(),
            })
            .collect();

        let joined = format!("{}?{}", base, redacted.join("&"));
        Cow::Owned(self.truncate(&joined).into_owned())
    }

    /// Redact a value if it appears to be a key or token
    pub fn redact_value<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if self.redact_sensitive && is_likely_secret(value) {
            return Cow::Borrowed("[REDACTED]");
        }
        self.truncate(value)
    }

    /// Truncate value if it exceeds max length
    ///
    /// Handles UTF-8 char boundaries properly to avoid panics on multi-byte chars.
    fn truncate<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.len() <= self.max_value_length {
            Cow::Borrowed(value)
        } else {
            let mut end = self.max_value_length;
            while end > 0 && !value.is_char_boundary(end) {
                end -= 1;
            }
            Cow::Owned(format!(
                "{}...[truncated {} bytes]",
                &value[..end],
                value.len() - end
            ))
        }
    }
}

/// Check if a value looks like a storage account key or connection secret
///
/// Account keys are 64 random bytes, base64-encoded (88 chars, `==` padded).
fn is_likely_secret(value: &str) -> bool {
    let trimmed = value.trim();

    if trimmed.to_lowercase().contains("accountkey=") {
        return true;
    }

    trimmed.len() >= 40 && is_base64_like(trimmed) && is_high_entropy(trimmed)
}

/// Check if string looks like base64
fn is_base64_like(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=' || c == '%')
}

/// Simple entropy check - high ratio of unique chars suggests random data
fn is_high_entropy(s: &str) -> bool {
    let unique: HashSet<char> = s.chars().collect();
    unique.len() > 20
}

/// Sanitize a path for logging.
///
/// Escapes characters that could be used for log injection.
pub fn sanitize_for_log(input: &str) -> String {
    input
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect()
}

/// Format a URI for logging: redacted, then sanitized.
pub fn format_uri_for_log(uri: &str, config: &LogConfig) -> String {
    sanitize_for_log(&config.redact_uri(uri))
}
