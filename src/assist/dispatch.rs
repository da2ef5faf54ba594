//! Retry-aware dispatch to the generation API
//!
//! One outbound call per attempt, at most three attempts total. Only
//! rate-limit failures are retried; the wait prefers a server-suggested
//! "retry in N seconds" hint and otherwise backs off as min(5 * attempt, 30)
//! seconds. The sleep is injectable so tests can observe waits without
//! real delay.

use super::client::{ModelError, TextModel};
use super::prompt::build_prompt;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Maximum attempts per dispatch, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

const BACKOFF_STEP_SECS: u64 = 5;
const BACKOFF_CAP_SECS: u64 = 30;

/// Terminal outcome of a dispatch invocation.
#[derive(Debug, Error)]
pub enum AssistError {
    /// Missing or empty message. Rejected before any outbound call.
    #[error("Message is required")]
    InvalidRequest,
    /// Upstream failure, including rate limiting after exhausting retries.
    /// The display text is the non-sensitive client-facing message; the
    /// source carries the full detail for server-side logs.
    #[error("Failed to get AI response")]
    Upstream(#[source] ModelError),
}

impl AssistError {
    /// Upstream error detail, safe to include in the 500 response body.
    pub fn detail(&self) -> Option<String> {
        match self {
            AssistError::Upstream(source) => Some(source.to_string()),
            AssistError::InvalidRequest => None,
        }
    }
}

/// Injectable suspension point for the retry wait.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Production sleeper: yields the task without blocking the runtime.
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Validate, build the prompt, and call the model with bounded retry.
pub async fn dispatch<M, S>(
    model: &M,
    sleeper: &S,
    message: &str,
    code: Option<&str>,
    language: Option<&str>,
) -> Result<String, AssistError>
where
    M: TextModel,
    S: Sleeper,
{
    if message.trim().is_empty() {
        return Err(AssistError::InvalidRequest);
    }

    let prompt = build_prompt(message, code, language);
    generate_with_retry(model, sleeper, &prompt)
        .await
        .map_err(|source| {
            log::error!("assist dispatch failed: {source}");
            AssistError::Upstream(source)
        })
}

async fn generate_with_retry<M, S>(
    model: &M,
    sleeper: &S,
    prompt: &str,
) -> Result<String, ModelError>
where
    M: TextModel,
    S: Sleeper,
{
    let mut attempt = 1u32;
    loop {
        match model.generate(prompt).await {
            Ok(text) => return Ok(text),
            Err(err) if attempt < MAX_ATTEMPTS && is_rate_limited(&err) => {
                let wait = retry_hint_secs(&err.to_string())
                    .unwrap_or_else(|| (BACKOFF_STEP_SECS * u64::from(attempt)).min(BACKOFF_CAP_SECS));
                log::warn!(
                    "rate limit on attempt {attempt}/{MAX_ATTEMPTS}, retrying in {wait}s: {err}"
                );
                sleeper.sleep(Duration::from_secs(wait)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Transient upstream throttling, detected from the error's message text.
fn is_rate_limited(err: &ModelError) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("429") || text.contains("too many requests")
}

/// Server-suggested wait parsed from the error text, e.g. "retry in 14.5s".
fn retry_hint_secs(text: &str) -> Option<u64> {
    static HINT: OnceLock<Regex> = OnceLock::new();
    let re = HINT.get_or_init(|| {
        Regex::new(r"(?i)retry in (\d+(?:\.\d+)?)\s*s").expect("valid retry-hint regex")
    });
    let secs: f64 = re.captures(text)?.get(1)?.as_str().parse().ok()?;
    if secs > 0.0 && secs < 300.0 {
        Some(secs.ceil() as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted model: pops one pre-arranged result per call.
    struct FakeModel {
        script: Mutex<VecDeque<Result<String, ModelError>>>,
        calls: AtomicUsize,
    }

    impl FakeModel {
        fn new(script: Vec<Result<String, ModelError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextModel for FakeModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("model called more times than scripted")
        }
    }

    /// Records requested waits instead of sleeping.
    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn waits(&self) -> Vec<Duration> {
            self.waits.lock().unwrap().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn rate_limit(msg: &str) -> ModelError {
        ModelError::Api(msg.to_string())
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_network_call() {
        let model = FakeModel::new(vec![]);
        let sleeper = RecordingSleeper::default();
        for message in ["", "   ", "\n\t"] {
            let result = dispatch(&model, &sleeper, message, None, None).await;
            assert!(matches!(result, Err(AssistError::InvalidRequest)));
        }
        assert_eq!(model.calls(), 0);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_single_attempt_success_returns_text_unmodified() {
        let model = FakeModel::new(vec![Ok("  raw model text\n".to_string())]);
        let sleeper = RecordingSleeper::default();
        let text = dispatch(&model, &sleeper, "help", Some("x"), Some("python"))
            .await
            .unwrap();
        assert_eq!(text, "  raw model text\n");
        assert_eq!(model.calls(), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_then_success_waits_between_attempts() {
        let model = FakeModel::new(vec![
            Err(rate_limit("429 Too Many Requests: quota exceeded")),
            Err(rate_limit("429 Too Many Requests: quota exceeded")),
            Ok("third time lucky".to_string()),
        ]);
        let sleeper = RecordingSleeper::default();
        let text = dispatch(&model, &sleeper, "why does this break?", None, None)
            .await
            .unwrap();
        assert_eq!(text, "third time lucky");
        assert_eq!(model.calls(), 3);
        // No server hint present, so min(5 * attempt, 30) applies.
        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
    }

    #[tokio::test]
    async fn test_server_retry_hint_preferred_over_backoff() {
        let model = FakeModel::new(vec![
            Err(rate_limit(
                "429 Too Many Requests: Please retry in 12.2s later",
            )),
            Ok("ok".to_string()),
        ]);
        let sleeper = RecordingSleeper::default();
        dispatch(&model, &sleeper, "q", None, None).await.unwrap();
        assert_eq!(sleeper.waits(), vec![Duration::from_secs(13)]);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_after_three_attempts() {
        let model = FakeModel::new(vec![
            Err(rate_limit("too many requests")),
            Err(rate_limit("too many requests")),
            Err(rate_limit("too many requests")),
        ]);
        let sleeper = RecordingSleeper::default();
        let result = dispatch(&model, &sleeper, "q", None, None).await;
        assert!(matches!(result, Err(AssistError::Upstream(_))));
        assert_eq!(model.calls(), 3);
        assert_eq!(sleeper.waits().len(), 2);
    }

    #[tokio::test]
    async fn test_non_rate_limit_error_fails_immediately() {
        let model = FakeModel::new(vec![Err(rate_limit("500 Internal Server Error: boom"))]);
        let sleeper = RecordingSleeper::default();
        let result = dispatch(&model, &sleeper, "q", None, None).await;
        assert!(matches!(result, Err(AssistError::Upstream(_))));
        assert_eq!(model.calls(), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_error_exposes_detail_but_fixed_message() {
        let model = FakeModel::new(vec![Err(rate_limit("401 Unauthorized: bad key"))]);
        let sleeper = RecordingSleeper::default();
        let err = dispatch(&model, &sleeper, "q", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to get AI response");
        assert_eq!(err.detail().unwrap(), "401 Unauthorized: bad key");
    }

    #[test]
    fn test_retry_hint_parsing() {
        assert_eq!(retry_hint_secs("Please retry in 7s"), Some(7));
        assert_eq!(retry_hint_secs("RETRY IN 2.1 seconds"), Some(3));
        assert_eq!(retry_hint_secs("retry later"), None);
        assert_eq!(retry_hint_secs("retry in 9999s"), None);
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(is_rate_limited(&rate_limit("429 Too Many Requests")));
        assert!(is_rate_limited(&rate_limit("Too Many Requests from peer")));
        assert!(!is_rate_limited(&rate_limit("503 Service Unavailable")));
        assert!(!is_rate_limited(&ModelError::EmptyCompletion));
    }
}
