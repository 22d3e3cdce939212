//! HTTP-backed adapters for the four external services.
//!
//! Each adapter POSTs to a configured base URL and maps non-2xx
//! responses to `GatewayError::Permanent`, connection/transport errors
//! to `GatewayError::Transient`, so the retry envelope in
//! [`crate::domain::retry`] can apply uniform policy regardless of
//! which service is being called.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use shared_types::{GatewayError, RateLimiter};

use crate::domain::retry::{with_retry, RetryConfig};
use crate::domain::types::{
    AnswerKeyVerification, QualityAssessment, ReconstructionResult, SolverOutcome,
};
use crate::ports::inbound::{AnswerKeyVerifier, QualityAssessor, QuestionSolver, Reconstructor};

/// Shared HTTP plumbing for a single external service endpoint.
struct HttpEndpoint {
    name: &'static str,
    client: Client,
    url: String,
    limiter: RateLimiter,
    retry: RetryConfig,
}

impl HttpEndpoint {
    fn new(name: &'static str, url: impl Into<String>, limiter: RateLimiter, retry: RetryConfig) -> Self {
        Self {
            name,
            client: Client::new(),
            url: url.into(),
            limiter,
            retry,
        }
    }

    async fn post_json<Req: Serialize + Sync, Resp: for<'de> serde::Deserialize<'de>>(
        &self,
        body: &Req,
    ) -> Result<Resp, GatewayError> {
        with_retry(self.name, &self.limiter, &self.retry, || async {
            let response = self
                .client
                .post(&self.url)
                .json(body)
                .send()
                .await
                .map_err(|e| GatewayError::Transient {
                    adapter: self.name.to_string(),
                    message: e.to_string(),
                })?;

            let status = response.status();
            if status.is_success() {
                response.json::<Resp>().await.map_err(|e| GatewayError::Permanent {
                    adapter: self.name.to_string(),
                    message: format!("malformed response body: {e}"),
                })
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(GatewayError::Transient {
                    adapter: self.name.to_string(),
                    message: format!("upstream status {status}"),
                })
            } else {
                Err(GatewayError::Permanent {
                    adapter: self.name.to_string(),
                    message: format!("upstream status {status}"),
                })
            }
        })
        .await
    }
}

/// HTTP-backed [`QualityAssessor`].
pub struct HttpQualityAssessor {
    endpoint: HttpEndpoint,
}

impl HttpQualityAssessor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            endpoint: HttpEndpoint::new(
                "quality_assessment",
                url,
                shared_types::rate_limiter::presets::quality_assessment(),
                RetryConfig::default(),
            ),
        }
    }

    /// Construct with an explicit retry policy and rate limiter, for
    /// callers wiring these from configuration rather than the presets.
    pub fn with_config(url: impl Into<String>, retry: RetryConfig, limiter: RateLimiter) -> Self {
        Self { endpoint: HttpEndpoint::new("quality_assessment", url, limiter, retry) }
    }
}

#[async_trait]
impl QualityAssessor for HttpQualityAssessor {
    async fn assess_quality(&self, image_bytes: &[u8]) -> Result<QualityAssessment, GatewayError> {
        use base64::Engine;
        let body = serde_json::json!({
            "image_base64": base64::engine::general_purpose::STANDARD.encode(image_bytes),
        });
        self.endpoint.post_json(&body).await
    }
}

/// HTTP-backed [`Reconstructor`].
pub struct HttpReconstructor {
    endpoint: HttpEndpoint,
}

impl HttpReconstructor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            endpoint: HttpEndpoint::new(
                "reconstruction",
                url,
                shared_types::rate_limiter::presets::reconstruction(),
                RetryConfig::default(),
            ),
        }
    }

    pub fn with_config(url: impl Into<String>, retry: RetryConfig, limiter: RateLimiter) -> Self {
        Self { endpoint: HttpEndpoint::new("reconstruction", url, limiter, retry) }
    }
}

#[async_trait]
impl Reconstructor for HttpReconstructor {
    async fn reconstruct(
        &self,
        damaged_image_bytes: &[u8],
        expected_rows: u32,
        expected_cols: u32,
    ) -> Result<ReconstructionResult, GatewayError> {
        use base64::Engine;
        let body = serde_json::json!({
            "image_base64": base64::engine::general_purpose::STANDARD.encode(damaged_image_bytes),
            "expected_rows": expected_rows,
            "expected_cols": expected_cols,
        });
        self.endpoint.post_json(&body).await
    }
}

/// HTTP-backed [`AnswerKeyVerifier`].
pub struct HttpAnswerKeyVerifier {
    endpoint: HttpEndpoint,
}

impl HttpAnswerKeyVerifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            endpoint: HttpEndpoint::new(
                "answer_key_verification",
                url,
                shared_types::rate_limiter::presets::answer_key_verification(),
                RetryConfig::default(),
            ),
        }
    }

    pub fn with_config(url: impl Into<String>, retry: RetryConfig, limiter: RateLimiter) -> Self {
        Self { endpoint: HttpEndpoint::new("answer_key_verification", url, limiter, retry) }
    }
}

#[async_trait]
impl AnswerKeyVerifier for HttpAnswerKeyVerifier {
    async fn verify_answer_key(
        &self,
        question_text: &str,
        proposed_answer: &str,
    ) -> Result<AnswerKeyVerification, GatewayError> {
        let body = serde_json::json!({
            "question_text": question_text,
            "proposed_answer": proposed_answer,
        });
        self.endpoint.post_json(&body).await
    }
}

/// HTTP-backed [`QuestionSolver`].
pub struct HttpQuestionSolver {
    endpoint: HttpEndpoint,
}

impl HttpQuestionSolver {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            endpoint: HttpEndpoint::new(
                "question_solving",
                url,
                shared_types::rate_limiter::presets::question_solving(),
                RetryConfig::default(),
            ),
        }
    }

    pub fn with_config(url: impl Into<String>, retry: RetryConfig, limiter: RateLimiter) -> Self {
        Self { endpoint: HttpEndpoint::new("question_solving", url, limiter, retry) }
    }
}

#[async_trait]
impl QuestionSolver for HttpQuestionSolver {
    async fn solve_question(
        &self,
        question_text: &str,
        subject: &str,
    ) -> Result<SolverOutcome, GatewayError> {
        let body = serde_json::json!({
            "question_text": question_text,
            "subject": subject,
        });
        self.endpoint.post_json(&body).await
    }
}
