pub mod generator;
pub mod prompt;
pub mod verdict;

pub use generator::{GenerationParams, ModelError, OllamaClient, TextGenerator};
pub use verdict::{IssueKind, MalformedOutput, Reference, Verdict, VerdictStatus, decode_verdict};

use retrieve::Passage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Passages beyond this are dropped from the prompt; the chunk is never truncated.
pub const DEFAULT_MAX_PASSAGES: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const NO_CONTEXT_MESSAGE: &str = "No relevant information found in knowledge base";

/// Judges a chunk against retrieved passages with a generative model.
///
/// `analyze` never fails: service errors, timeouts and unparseable replies all
/// become an `error` verdict for the chunk, so one bad chunk cannot abort a run.
#[derive(Clone)]
pub struct Analyzer {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
    max_passages: usize,
    timeout: Duration,
    repair_attempts: usize,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            params: GenerationParams::default(),
            max_passages: DEFAULT_MAX_PASSAGES,
            timeout: DEFAULT_TIMEOUT,
            repair_attempts: 0,
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_max_passages(mut self, max_passages: usize) -> Self {
        self.max_passages = max_passages.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra "fix this JSON" round trips before giving up on a malformed reply.
    pub fn with_repair_attempts(mut self, repair_attempts: usize) -> Self {
        self.repair_attempts = repair_attempts;
        self
    }

    pub async fn analyze(&self, chunk: &str, passages: &[Passage]) -> Verdict {
        if passages.is_empty() {
            return Verdict::unknown(NO_CONTEXT_MESSAGE);
        }

        let top = &passages[..passages.len().min(self.max_passages)];
        let prompt = prompt::build_validation_prompt(chunk, top);

        let mut reply = match self.invoke(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Model invocation failed");
                return Verdict::error(format!("Model invocation failed: {e}"));
            }
        };

        let mut repairs = 0;
        loop {
            match decode_verdict(&reply) {
                Ok(verdict) => return verdict,
                Err(malformed) if repairs >= self.repair_attempts => {
                    let preview: String = reply.chars().take(100).collect();
                    warn!(error = %malformed, reply = %preview, "Failed to parse analysis response");
                    return Verdict::malformed(&malformed);
                }
                Err(malformed) => {
                    repairs += 1;
                    debug!(attempt = repairs, error = %malformed, "Asking model to repair its reply");

                    reply = match self.invoke(&prompt::build_repair_prompt(&reply)).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!(error = %e, "Model invocation failed during repair");
                            return Verdict::error(format!("Model invocation failed: {e}"));
                        }
                    };
                }
            }
        }
    }

    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        tokio::time::timeout(self.timeout, self.generator.generate(prompt, &self.params))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned replies in order and records every prompt.
    struct Scripted {
        replies: Mutex<Vec<Result<String, ModelError>>>,
        prompts: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(vec![Ok(r#"{"status": "valid"}"#.to_string())]),
                prompts: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError> {
            assert!(params.temperature <= 0.5);
            self.prompts.lock().unwrap().push(prompt.to_string());
            tokio::time::sleep(self.delay).await;
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ModelError::Decode("script exhausted".to_string())))
        }
    }

    fn passages(n: usize) -> Vec<Passage> {
        (1..=n).map(|i| Passage::new(format!("passage number {i}"))).collect()
    }

    #[tokio::test]
    async fn test_no_passages_skips_model() {
        let model = Scripted::new(vec![]);
        let analyzer = Analyzer::new(model.clone());

        let verdict = analyzer.analyze("Some claim.", &[]).await;

        assert_eq!(verdict.status, VerdictStatus::Unknown);
        assert_eq!(verdict.message, NO_CONTEXT_MESSAGE);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_reply_is_decoded() {
        let model = Scripted::new(vec![Ok(
            r#"{"status": "valid", "message": "Supported", "references": [], "suggestions": []}"#.to_string(),
        )]);
        let analyzer = Analyzer::new(model.clone());

        let verdict = analyzer.analyze("S3 buckets are regional.", &passages(2)).await;

        assert_eq!(verdict.status, VerdictStatus::Valid);
        assert_eq!(verdict.message, "Supported");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_becomes_error_verdict() {
        let model = Scripted::new(vec![Ok("The content looks mostly accurate to me.".to_string())]);
        let analyzer = Analyzer::new(model.clone());

        let verdict = analyzer.analyze("Claim.", &passages(1)).await;

        assert!(matches!(verdict.status, VerdictStatus::Error | VerdictStatus::Unknown));
        assert!(verdict.message.contains("parsing"));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_repair_attempt_recovers() {
        let model = Scripted::new(vec![
            Ok(r#"{"status": "major_issues", "message": "wrong"#.to_string()),
            Ok(r#"{"status": "major_issues", "message": "wrong"}"#.to_string()),
        ]);
        let analyzer = Analyzer::new(model.clone()).with_repair_attempts(1);

        let verdict = analyzer.analyze("Claim.", &passages(1)).await;

        assert_eq!(verdict.status, VerdictStatus::MajorIssues);
        assert_eq!(model.calls(), 2);
        assert!(model.prompts.lock().unwrap()[1].starts_with("The following JSON is invalid"));
    }

    #[tokio::test]
    async fn test_model_failure_becomes_error_verdict() {
        let model = Scripted::new(vec![Err(ModelError::Status {
            status: 429,
            body: "throttled".to_string(),
        })]);
        let analyzer = Analyzer::new(model);

        let verdict = analyzer.analyze("Claim.", &passages(1)).await;

        assert_eq!(verdict.status, VerdictStatus::Error);
        assert!(verdict.message.contains("429"));
    }

    #[tokio::test]
    async fn test_model_timeout_becomes_error_verdict() {
        let analyzer = Analyzer::new(Scripted::slow(Duration::from_millis(200)))
            .with_timeout(Duration::from_millis(10));

        let verdict = analyzer.analyze("Claim.", &passages(1)).await;

        assert_eq!(verdict.status, VerdictStatus::Error);
        assert!(verdict.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_excess_passages_are_dropped_not_the_chunk() {
        let model = Scripted::new(vec![Ok(r#"{"status": "valid"}"#.to_string())]);
        let analyzer = Analyzer::new(model.clone()).with_max_passages(3);
        let chunk = "x".repeat(5000);

        analyzer.analyze(&chunk, &passages(6)).await;

        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains(&chunk));
        assert!(prompt.contains("passage number 3"));
        assert!(!prompt.contains("passage number 4"));
    }
}
