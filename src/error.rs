//! Error types for the stakeholder meeting core.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`MeetingError::code()`].
//! Callers should branch on the code or the variant, never on Display text.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Missing credentials or invalid configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Upstream rejected the credentials (HTTP 401).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Upstream refused access to the resource (HTTP 403).
    pub const ACCESS_FORBIDDEN: &str = "ACCESS_FORBIDDEN";

    /// Upstream rate limit hit (HTTP 429).
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    /// Any other non-2xx upstream response.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// Connection, TLS or timeout failure before a response arrived.
    pub const TRANSPORT_FAILED: &str = "TRANSPORT_FAILED";

    /// Synthesis returned success with an empty body.
    pub const EMPTY_AUDIO: &str = "EMPTY_AUDIO";

    /// Completion returned no usable text.
    pub const EMPTY_COMPLETION: &str = "EMPTY_COMPLETION";

    /// No local speech engine is available on this platform.
    pub const LOCAL_SPEECH_UNSUPPORTED: &str = "LOCAL_SPEECH_UNSUPPORTED";

    /// The local speech engine ran but failed.
    pub const LOCAL_SPEECH_FAILED: &str = "LOCAL_SPEECH_FAILED";

    /// Audio could not be loaded or played.
    pub const PLAYBACK_FAILED: &str = "PLAYBACK_FAILED";

    /// The operation was cancelled by its caller.
    pub const CANCELLED: &str = "CANCELLED";

    /// Filesystem error.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Errors produced by the meeting core.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum MeetingError {
    /// Missing credentials or invalid configuration. Fatal for the
    /// dependent operation; never retried.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// HTTP 401 from an upstream service.
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    Auth(String),

    /// HTTP 403 from an upstream service.
    #[error("[{}] {}", error_codes::ACCESS_FORBIDDEN, .0)]
    Forbidden(String),

    /// HTTP 429 from an upstream service. The caller may retry later.
    #[error("[{}] {}", error_codes::RATE_LIMITED, .0)]
    RateLimited(String),

    /// Any other non-2xx upstream response.
    #[error("[{}] HTTP {status}: {message}", error_codes::REQUEST_FAILED)]
    Request {
        /// HTTP status code returned by the service.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Connection, TLS or timeout failure.
    #[error("[{}] {}", error_codes::TRANSPORT_FAILED, .0)]
    Transport(String),

    /// Synthesis succeeded with a zero-length body.
    #[error("[{}] {}", error_codes::EMPTY_AUDIO, .0)]
    EmptyAudio(String),

    /// Completion response carried no text.
    #[error("[{}] {}", error_codes::EMPTY_COMPLETION, .0)]
    EmptyCompletion(String),

    /// No local speech engine is installed.
    #[error("[{}] {}", error_codes::LOCAL_SPEECH_UNSUPPORTED, .0)]
    LocalSpeechUnsupported(String),

    /// Local speech engine failed.
    #[error("[{}] {}", error_codes::LOCAL_SPEECH_FAILED, .0)]
    LocalSpeech(String),

    /// Audio load or playback failure.
    #[error("[{}] {}", error_codes::PLAYBACK_FAILED, .0)]
    Playback(String),

    /// Cancelled through a cancellation token.
    #[error("[{}] {}", error_codes::CANCELLED, .0)]
    Cancelled(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl MeetingError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Auth(_) => error_codes::AUTH_FAILED,
            Self::Forbidden(_) => error_codes::ACCESS_FORBIDDEN,
            Self::RateLimited(_) => error_codes::RATE_LIMITED,
            Self::Request { .. } => error_codes::REQUEST_FAILED,
            Self::Transport(_) => error_codes::TRANSPORT_FAILED,
            Self::EmptyAudio(_) => error_codes::EMPTY_AUDIO,
            Self::EmptyCompletion(_) => error_codes::EMPTY_COMPLETION,
            Self::LocalSpeechUnsupported(_) => error_codes::LOCAL_SPEECH_UNSUPPORTED,
            Self::LocalSpeech(_) => error_codes::LOCAL_SPEECH_FAILED,
            Self::Playback(_) => error_codes::PLAYBACK_FAILED,
            Self::Cancelled(_) => error_codes::CANCELLED,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// Returns the human-readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Config(m)
            | Self::Auth(m)
            | Self::Forbidden(m)
            | Self::RateLimited(m)
            | Self::Transport(m)
            | Self::EmptyAudio(m)
            | Self::EmptyCompletion(m)
            | Self::LocalSpeechUnsupported(m)
            | Self::LocalSpeech(m)
            | Self::Playback(m)
            | Self::Cancelled(m) => m.clone(),
            Self::Request { message, .. } => message.clone(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// HTTP status associated with this error, when it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::RateLimited(_) => Some(429),
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller may reasonably retry the operation later.
    ///
    /// Nothing in this crate retries on its own; this only informs the UI.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Transport(_) | Self::EmptyAudio(_) => true,
            Self::Request { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// True for configuration errors (missing credentials and the like).
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Map an upstream HTTP error status to the matching variant.
    ///
    /// `service` names the upstream ("completion", "speech synthesis") and is
    /// prefixed to the message.
    pub fn from_status(service: &str, status: u16, detail: &str) -> Self {
        let detail = detail.trim();
        let detail = if detail.is_empty() {
            "no details".to_owned()
        } else {
            detail.to_owned()
        };
        match status {
            401 => Self::Auth(format!("{service} authentication failed: {detail}")),
            403 => Self::Forbidden(format!("{service} access forbidden: {detail}")),
            429 => Self::RateLimited(format!("{service} rate limited: {detail}")),
            _ => Self::Request {
                status,
                message: format!("{service} request failed: {detail}"),
            },
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MeetingError>;

/// Run `fut` unless `cancel` fires first.
///
/// A token that is already cancelled short-circuits without polling `fut`,
/// so no request is ever dispatched. Cancellation while in flight drops the
/// future, which aborts the underlying HTTP request.
pub async fn with_cancellation<T, F>(
    cancel: &tokio_util::sync::CancellationToken,
    what: &str,
    fut: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(MeetingError::Cancelled(format!("{what} cancelled before dispatch")));
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MeetingError::Cancelled(format!("{what} cancelled"))),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn display_includes_code_prefix() {
        let err = MeetingError::Config("completion API key missing".into());
        let display = format!("{err}");
        assert!(display.starts_with("[CONFIG_INVALID]"));
        assert!(display.contains("completion API key missing"));
    }

    #[test]
    fn status_mapping_covers_documented_codes() {
        assert!(matches!(
            MeetingError::from_status("speech synthesis", 401, "bad key"),
            MeetingError::Auth(_)
        ));
        assert!(matches!(
            MeetingError::from_status("speech synthesis", 403, ""),
            MeetingError::Forbidden(_)
        ));
        assert!(matches!(
            MeetingError::from_status("speech synthesis", 429, "slow down"),
            MeetingError::RateLimited(_)
        ));
        let other = MeetingError::from_status("speech synthesis", 502, "bad gateway");
        assert_eq!(other.status(), Some(502));
        assert_eq!(other.code(), "REQUEST_FAILED");
    }

    #[test]
    fn request_display_carries_status() {
        let err = MeetingError::from_status("completion", 500, "boom");
        let display = format!("{err}");
        assert!(display.contains("HTTP 500"));
        assert!(display.contains("boom"));
    }

    #[test]
    fn empty_detail_gets_placeholder() {
        let err = MeetingError::from_status("completion", 403, "   ");
        assert!(err.message().contains("no details"));
    }

    #[test]
    fn retryability() {
        assert!(!MeetingError::Config("x".into()).is_retryable());
        assert!(!MeetingError::Auth("x".into()).is_retryable());
        assert!(!MeetingError::Forbidden("x".into()).is_retryable());
        assert!(MeetingError::RateLimited("x".into()).is_retryable());
        assert!(MeetingError::Transport("x".into()).is_retryable());
        assert!(
            MeetingError::Request {
                status: 503,
                message: "x".into()
            }
            .is_retryable()
        );
        assert!(
            !MeetingError::Request {
                status: 400,
                message: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn all_codes_are_screaming_snake_case() {
        let errors = vec![
            MeetingError::Config("x".into()),
            MeetingError::Auth("x".into()),
            MeetingError::Forbidden("x".into()),
            MeetingError::RateLimited("x".into()),
            MeetingError::Request {
                status: 500,
                message: "x".into(),
            },
            MeetingError::Transport("x".into()),
            MeetingError::EmptyAudio("x".into()),
            MeetingError::EmptyCompletion("x".into()),
            MeetingError::LocalSpeechUnsupported("x".into()),
            MeetingError::LocalSpeech("x".into()),
            MeetingError::Playback("x".into()),
            MeetingError::Cancelled("x".into()),
        ];
        for err in &errors {
            let code = err.code();
            assert!(
                code.chars().all(|c| c.is_ascii_uppercase() || c == '_'),
                "code {code:?} is not SCREAMING_SNAKE_CASE"
            );
        }
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MeetingError>();
    }

    #[tokio::test]
    async fn cancelled_token_skips_future() {
        let cancel = tokio_util::sync::CancellationToken::new();
        cancel.cancel();
        let polled = std::sync::atomic::AtomicBool::new(false);
        let result: Result<()> = with_cancellation(&cancel, "synthesis", async {
            polled.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert_eq!(result.unwrap_err().code(), error_codes::CANCELLED);
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn in_flight_cancellation_wins() {
        let cancel = tokio_util::sync::CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result: Result<()> = with_cancellation(&cancel, "slow call", async {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(MeetingError::Cancelled(_))));
    }

    #[tokio::test]
    async fn uncancelled_future_completes() {
        let cancel = tokio_util::sync::CancellationToken::new();
        let value = with_cancellation(&cancel, "quick", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
