//! Error taxonomy for extraction failures.
//!
//! The extraction engine only reports free-form error text, so every
//! classification decision lives in [`PATTERNS`]. Update that table, and only
//! that table, when upstream wording changes.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Content is private or gone; retrying cannot help
    Private,
    /// Upstream wants a logged-in session
    AuthRequired,
    Forbidden,
    RateLimited,
    NetworkUnreachable,
    MalformedUpstreamResponse,
    Unclassified,
}

/// Ordered (pattern, kind) table, matched case-insensitively, first hit wins.
///
/// Rate limiting is checked first: the upstream's throttling message also
/// mentions "login required" and "not available".
const PATTERNS: &[(&str, ErrorKind)] = &[
    ("rate-limit", ErrorKind::RateLimited),
    ("rate limit", ErrorKind::RateLimited),
    ("too many requests", ErrorKind::RateLimited),
    ("error 429", ErrorKind::RateLimited),
    ("private", ErrorKind::Private),
    ("video unavailable", ErrorKind::Private),
    ("has been removed", ErrorKind::Private),
    ("login required", ErrorKind::AuthRequired),
    ("log in", ErrorKind::AuthRequired),
    ("sign in", ErrorKind::AuthRequired),
    ("authentication", ErrorKind::AuthRequired),
    ("error 403", ErrorKind::Forbidden),
    ("forbidden", ErrorKind::Forbidden),
    ("address associated", ErrorKind::NetworkUnreachable),
    ("name or service not known", ErrorKind::NetworkUnreachable),
    ("temporary failure in name resolution", ErrorKind::NetworkUnreachable),
    ("network is unreachable", ErrorKind::NetworkUnreachable),
    ("connection refused", ErrorKind::NetworkUnreachable),
    ("connection reset", ErrorKind::NetworkUnreachable),
    ("timed out", ErrorKind::NetworkUnreachable),
    ("unable to extract", ErrorKind::MalformedUpstreamResponse),
    ("jsondecodeerror", ErrorKind::MalformedUpstreamResponse),
    ("expecting value", ErrorKind::MalformedUpstreamResponse),
    ("unexpected response", ErrorKind::MalformedUpstreamResponse),
    ("failed to parse", ErrorKind::MalformedUpstreamResponse),
];

const SNIPPET_CHARS: usize = 120;

pub fn classify(raw: &str) -> ErrorKind {
    let haystack = raw.to_lowercase();
    PATTERNS
        .iter()
        .find(|(pattern, _)| haystack.contains(pattern))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::Unclassified)
}

impl ErrorKind {
    /// Abandon immediately, remaining fingerprints are skipped
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Private | ErrorKind::AuthRequired)
    }

    /// Exhausting attempts on one of these escalates to the remote worker
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            ErrorKind::Forbidden
                | ErrorKind::RateLimited
                | ErrorKind::NetworkUnreachable
                | ErrorKind::MalformedUpstreamResponse
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Private => "private",
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NetworkUnreachable => "network_unreachable",
            ErrorKind::MalformedUpstreamResponse => "malformed_upstream_response",
            ErrorKind::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing text for a classified failure. Never contains the full raw
/// error; unclassified failures carry a short diagnostic snippet.
pub fn user_message(kind: ErrorKind, raw: &str) -> String {
    match kind {
        ErrorKind::Private => {
            "This content is private or unavailable and cannot be downloaded.".to_string()
        }
        ErrorKind::AuthRequired => {
            "This content requires a logged-in account and cannot be downloaded.".to_string()
        }
        ErrorKind::RateLimited => {
            "The source site is rate-limiting us. Try again in 5 minutes.".to_string()
        }
        ErrorKind::Forbidden => {
            "The source site is blocking this server. Try again later or use a different link."
                .to_string()
        }
        ErrorKind::NetworkUnreachable => {
            "Network/DNS error: the server cannot reach the source site right now. Please wait 2 minutes."
                .to_string()
        }
        ErrorKind::MalformedUpstreamResponse => {
            "The source site returned a response we could not read. Try again later.".to_string()
        }
        ErrorKind::Unclassified => match snippet(raw) {
            s if s.is_empty() => {
                "Download failed. Try a different link or wait a few minutes.".to_string()
            }
            s => format!("Download failed ({s}). Try a different link or wait a few minutes."),
        },
    }
}

/// First line of `raw`, without ANSI colour codes or the `ERROR:` prefix,
/// truncated to a fixed number of characters.
pub fn snippet(raw: &str) -> String {
    let plain = strip_ansi(raw);
    let line = plain.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let line = line.strip_prefix("ERROR:").map(str::trim_start).unwrap_or(line);

    if line.chars().count() <= SNIPPET_CHARS {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(SNIPPET_CHARS).collect();
    cut.push('…');
    cut
}

fn strip_ansi(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            // CSI sequence: ESC '[' params final-byte
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_messages() {
        let cases = [
            ("ERROR: [Instagram] ABC: This video is private", ErrorKind::Private),
            ("ERROR: Private video. Sign in if you've been granted access", ErrorKind::Private),
            ("ERROR: [Instagram] ABC: Login required to access this content", ErrorKind::AuthRequired),
            ("ERROR: unable to download video data: HTTP Error 403: Forbidden", ErrorKind::Forbidden),
            ("ERROR: HTTP Error 429: Too Many Requests", ErrorKind::RateLimited),
            (
                "ERROR: [Instagram] ABC: Requested content is not available, rate-limit reached or login required",
                ErrorKind::RateLimited,
            ),
            (
                "<urlopen error [Errno -5] No address associated with hostname>",
                ErrorKind::NetworkUnreachable,
            ),
            ("yt-dlp timed out after 300s", ErrorKind::NetworkUnreachable),
            ("ERROR: [Instagram] ABC: Unable to extract shared data", ErrorKind::MalformedUpstreamResponse),
            ("ERROR: Unsupported URL: https://example.com", ErrorKind::Unclassified),
        ];

        for (raw, expected) in cases {
            assert_eq!(classify(raw), expected, "raw: {raw}");
        }
    }

    #[test]
    fn fatal_and_blocking_are_disjoint() {
        let all = [
            ErrorKind::Private,
            ErrorKind::AuthRequired,
            ErrorKind::Forbidden,
            ErrorKind::RateLimited,
            ErrorKind::NetworkUnreachable,
            ErrorKind::MalformedUpstreamResponse,
            ErrorKind::Unclassified,
        ];
        for kind in all {
            assert!(!(kind.is_fatal() && kind.is_blocking()), "{kind}");
        }
        assert!(!ErrorKind::Unclassified.is_fatal());
        assert!(!ErrorKind::Unclassified.is_blocking());
    }

    #[test]
    fn snippet_is_cleaned_and_truncated() {
        let raw = format!("\u{1b}[0;31mERROR:\u{1b}[0m {}\nTraceback follows", "x".repeat(300));
        let s = snippet(&raw);
        assert!(s.starts_with("xxx"));
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 1);
        assert!(!s.contains("Traceback"));
    }

    #[test]
    fn unclassified_message_never_leaks_full_error() {
        let raw = format!("ERROR: boom {}", "secret ".repeat(100));
        let msg = user_message(ErrorKind::Unclassified, &raw);
        assert!(msg.starts_with("Download failed (boom"));
        assert!(msg.len() < raw.len());
        assert_eq!(
            user_message(ErrorKind::Unclassified, ""),
            "Download failed. Try a different link or wait a few minutes."
        );
    }
}
