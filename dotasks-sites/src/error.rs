//! Error types for the dotasks-sites crate.
//!
//! All errors use stable string messages suitable for notifications and
//! programmatic handling. Raw response bodies are kept in full on the
//! variants that carry them but are truncated in `Display` output.

/// Maximum number of characters of a raw response shown in error messages.
const RAW_DISPLAY_CHARS: usize = 200;

/// Errors that can occur while talking to a remote site.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// Transport-level failure: DNS, connect, TLS, timeout, body read.
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered with a non-2xx status.
    #[error("HTTP status {status}: {}", truncate_raw(.body))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// The remote answered 2xx but reported an application-level failure.
    #[error("API error: {0}")]
    Api(String),

    /// A response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// A page inside the reported timeline came back with no entries.
    #[error("empty page {page} of {pages}: {owner}")]
    EmptyPage {
        /// Timeline owner.
        owner: String,
        /// The empty page (1-based).
        page: u32,
        /// Page count derived from the reported total.
        pages: u64,
    },

    /// An expected token or capture group was absent from a page.
    #[error("failed to extract {what}: {}", truncate_raw(.raw))]
    Extraction {
        /// What was being extracted (e.g. `"reply formhash"`).
        what: String,
        /// The text that was searched.
        raw: String,
    },

    /// The remote rejected a submitted action (missing success marker).
    #[error("rejected by remote: {}", truncate_raw(.raw))]
    Rejected {
        /// The response text that lacked the success marker.
        raw: String,
    },

    /// The session is not signed in to the site.
    #[error("login required at {login_url}")]
    NeedsLogin {
        /// Page the user should open to sign in.
        login_url: String,
    },

    /// The challenge expression used an operator the evaluator does not know.
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// The challenge expression was malformed.
    #[error("malformed challenge: {0}")]
    Challenge(String),

    /// Invalid client or site configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SiteError {
    /// Whether the error is worth retrying on the same run.
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies and empty
    /// mid-timeline pages are transient; everything else reflects the
    /// remote's actual answer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Status { .. } | Self::Decode(_) | Self::EmptyPage { .. }
        )
    }
}

/// Shorten a raw response body for display, on a char boundary.
pub fn truncate_raw(raw: &str) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(RAW_DISPLAY_CHARS).collect();
    if chars.next().is_some() {
        format!("'{head}…'")
    } else {
        format!("'{head}'")
    }
}

/// Convenience type alias for dotasks-sites results.
pub type Result<T> = std::result::Result<T, SiteError>;
