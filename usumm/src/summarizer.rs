//! Video-to-article summarization with bounded retry.
//!
//! A summary is one multimodal generation request per attempt. Failures reported by the API
//! itself (overload, quota, 5xx) are retried with exponential backoff; anything else ends the
//! attempt loop straight away. The outcome is always a value: callers render
//! [`SummarizeError`] in place of the article instead of failing the page.

use crate::gemini::{ContentGenerator, GenerateError, GenerateRequest};
use std::sync::Arc;
use std::time::Duration;

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Wait before the second attempt. Doubles after every retry.
    pub base_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_wait: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("No response from AI model.")]
    EmptyResponse,
    #[error("{last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: GenerateError,
    },
    #[error("{0}")]
    Unexpected(#[source] GenerateError),
}

impl SummarizeError {
    /// Heading shown above the message when the error is rendered in place of an article.
    pub fn heading(&self) -> &'static str {
        match self {
            SummarizeError::EmptyResponse | SummarizeError::Exhausted { .. } => "AI Error",
            SummarizeError::Unexpected(_) => "Unexpected Error",
        }
    }
}

/// Everything the article page shows for one video.
#[derive(Debug)]
pub struct ArticleResult {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub article: Result<String, SummarizeError>,
}

/// Public watch URL of a video, which is also what the model is pointed at.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Instruction sent alongside the video.
pub fn blog_prompt(video_url: &str, channel_title: &str) -> String {
    format!(
        "Analyze the video: {video_url}\n\
         Write a professional blog post.\n\
         \n\
         CRITICAL: Return the response ONLY in raw HTML format.\n\
         DO NOT use Markdown (no ## or **).\n\
         Use ONLY these tags: <h1>, <h2>, <p>, <ul>, <li>.\n\
         \n\
         Structure:\n\
         1. <h1>[Catchy Blog Title]</h1>\n\
         2. <p>[Introduction mentioning {channel_title}]</p>\n\
         3. <h2>[Section Subheading]</h2>\n\
         4. <p>[Detailed content]</p>\n\
         ...\n"
    )
}

/// Removes markdown code fences the model adds despite being told not to.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```html", "").replace("```", "").trim().to_string()
}

pub struct Summarizer {
    generator: Arc<dyn ContentGenerator>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Summarizer {
    pub fn new(generator: Arc<dyn ContentGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Writes an HTML article about `video_id`, whose watch page is `video_url`.
    ///
    /// Sleeps `base_wait`, then twice that, and so on between attempts, but never after the
    /// last one.
    #[tracing::instrument(skip(self))]
    pub async fn summarize(
        &self,
        video_id: &str,
        channel_title: &str,
        video_url: &str,
    ) -> Result<String, SummarizeError> {
        let request = GenerateRequest {
            video_uri: video_url.to_string(),
            prompt: blog_prompt(video_url, channel_title),
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut wait = self.policy.base_wait;
        let mut attempt = 1;
        loop {
            match self.generator.generate(&request).await {
                Ok(Some(text)) => {
                    tracing::debug!(attempt, "model produced an article");
                    return Ok(strip_code_fences(&text));
                }
                Ok(None) => {
                    tracing::warn!(attempt, "model returned no text");
                    return Err(SummarizeError::EmptyResponse);
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= max_attempts {
                        tracing::error!(attempts = attempt, error = %e, "giving up on summary");
                        return Err(SummarizeError::Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                    tracing::warn!(attempt, ?wait, error = %e, "summary attempt failed, retrying");
                    tokio::time::sleep(wait).await;
                    wait = wait.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "summary failed");
                    return Err(SummarizeError::Unexpected(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    type Outcome = Result<Option<String>, GenerateError>;

    /// Replays a fixed list of outcomes and records when each call happened.
    struct Scripted {
        outcomes: Mutex<VecDeque<Outcome>>,
        calls: Mutex<Vec<Instant>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl Scripted {
        fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait::async_trait]
    impl ContentGenerator for Scripted {
        async fn generate(&self, request: &GenerateRequest) -> Outcome {
            self.calls.lock().unwrap().push(Instant::now());
            self.requests.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("generator called more often than scripted")
        }
    }

    fn overloaded() -> Outcome {
        Err(GenerateError::Api {
            code: 503,
            status: "UNAVAILABLE".into(),
            message: "The model is overloaded.".into(),
        })
    }

    fn summarizer(generator: Arc<Scripted>) -> Summarizer {
        Summarizer::new(generator, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_backoffs() {
        let generator = Scripted::new([
            overloaded(),
            overloaded(),
            Ok(Some("```html\n<h1>Title</h1>\n```".into())),
        ]);
        let start = Instant::now();

        let html = summarizer(generator.clone())
            .summarize("abc123", "Rust Channel", &watch_url("abc123"))
            .await
            .unwrap();

        assert_eq!(html, "<h1>Title</h1>");
        assert_eq!(
            generator.gaps(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_last_attempt_without_sleeping() {
        let generator = Scripted::new([overloaded(), overloaded(), overloaded()]);
        let start = Instant::now();

        let err = summarizer(generator.clone())
            .summarize("abc123", "Rust Channel", &watch_url("abc123"))
            .await
            .unwrap_err();

        assert!(matches!(err, SummarizeError::Exhausted { attempts: 3, .. }));
        assert_eq!(err.heading(), "AI Error");
        assert_eq!(err.to_string(), "503 UNAVAILABLE. The model is overloaded.");
        assert_eq!(generator.calls.lock().unwrap().len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_backoff_saturates() {
        let generator = Scripted::new([overloaded(), overloaded()]);
        let summarizer = Summarizer::new(
            generator.clone(),
            RetryPolicy {
                max_attempts: 2,
                base_wait: Duration::MAX,
            },
        );

        let err = summarizer
            .summarize("abc123", "Rust Channel", &watch_url("abc123"))
            .await
            .unwrap_err();

        assert!(matches!(err, SummarizeError::Exhausted { attempts: 2, .. }));
        assert_eq!(generator.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_response_is_not_retried() {
        let generator = Scripted::new([Ok(None)]);
        let start = Instant::now();

        let err = summarizer(generator.clone())
            .summarize("abc123", "Rust Channel", &watch_url("abc123"))
            .await
            .unwrap_err();

        assert!(matches!(err, SummarizeError::EmptyResponse));
        assert_eq!(err.to_string(), "No response from AI model.");
        assert_eq!(generator.calls.lock().unwrap().len(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn unclassified_failure_is_not_retried() {
        let generator = Scripted::new([Err(GenerateError::MissingApiKey)]);
        let start = Instant::now();

        let err = summarizer(generator.clone())
            .summarize("abc123", "Rust Channel", &watch_url("abc123"))
            .await
            .unwrap_err();

        assert!(matches!(err, SummarizeError::Unexpected(_)));
        assert_eq!(err.heading(), "Unexpected Error");
        assert_eq!(generator.calls.lock().unwrap().len(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy() {
        let generator = Scripted::new([overloaded()]);
        let summarizer = Summarizer::new(
            generator.clone(),
            RetryPolicy {
                max_attempts: 0,
                base_wait: Duration::from_secs(2),
            },
        );

        let err = summarizer.summarize("abc123", "x", &watch_url("abc123")).await.unwrap_err();
        assert!(matches!(err, SummarizeError::Exhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn request_points_at_the_video() {
        let generator = Scripted::new([Ok(Some("<p>hi</p>".into()))]);
        summarizer(generator.clone())
            .summarize("dQw4w9WgXcQ", "Rick Astley", &watch_url("dQw4w9WgXcQ"))
            .await
            .unwrap();

        let requests = generator.requests.lock().unwrap();
        assert_eq!(
            requests[0].video_uri,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert!(requests[0].prompt.contains("Rick Astley"));
        assert!(requests[0].prompt.contains("<h1>, <h2>, <p>, <ul>, <li>"));
    }

    #[test]
    fn fences_stripped_and_trimmed() {
        assert_eq!(
            strip_code_fences("  ```html\n<h1>T</h1>\n<p>x</p>\n```  \n"),
            "<h1>T</h1>\n<p>x</p>"
        );
        assert_eq!(strip_code_fences("<p>plain</p>"), "<p>plain</p>");
    }
}
