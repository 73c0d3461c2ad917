use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::{OracleConfig, OracleError, OracleVerdict, RerankCandidate, RerankOracle, RequesterContext};

const TEMPERATURE: f64 = 0.2;
const MAX_TOKENS: u32 = 1800;
const MAX_RETRY_AFTER_SECS: u64 = 60;

const SYSTEM_PROMPT: &str = "You rerank an existing list of caregivers for an elderly care request. \
Never add caregivers and never change a caregiverId. Only adjust each score within +/-10 of its baseScore, \
keeping finalScore between 0 and 100. When information is missing, stay close to baseScore.";

/// Chat-completions client for an OpenAI-compatible endpoint (Groq by default).
#[derive(Clone)]
pub struct GroqRerankOracle {
    client: Client,
    config: OracleConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Entries are decoded one by one so a single bad entry only costs that candidate.
#[derive(Debug, Deserialize)]
struct RerankPayload {
    matches: Vec<serde_json::Value>,
}

impl GroqRerankOracle {
    pub fn new(config: OracleConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: point the client at a mock server.
    #[cfg(test)]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = endpoint.to_string();
        self
    }

    fn request_body(&self, ctx: &RequesterContext, candidates: &[RerankCandidate]) -> serde_json::Value {
        let user_prompt = json!({
            "careseeker": ctx,
            "candidates": candidates,
            "instructions": "Return JSON {\"matches\":[{\"caregiverId\",\"baseScore\",\"delta\",\"finalScore\",\"reasoning\",\"strengths\",\"concerns\",\"recommendation\"}]} with recommendation one of HIGHLY_RECOMMENDED, RECOMMENDED, CONSIDER, NOT_RECOMMENDED."
        });

        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt.to_string() }
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "response_format": { "type": "json_object" }
        })
    }

    async fn post_with_retry(&self, body: &serde_json::Value) -> Result<ChatResponse, OracleError> {
        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff_ms = self.config.retry_backoff_ms.saturating_mul(1u64 << attempt.min(6));
                warn!(attempt, backoff_ms, "retrying rerank after backoff");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }

            let response = match self
                .client
                .post(&self.config.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(OracleError::RequestError(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                return response
                    .json::<ChatResponse>()
                    .await
                    .map_err(|e| OracleError::Malformed(e.to_string()));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    if attempt < self.config.max_retries {
                        let wait = retry_after.min(MAX_RETRY_AFTER_SECS);
                        warn!(wait, "rerank rate-limited, waiting Retry-After");
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                }
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::HttpError { status, body });
        }

        Err(OracleError::MaxRetriesExceeded {
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }
}

/// Pulls `{matches: [...]}` out of the first choice's message content.
fn parse_verdicts(response: ChatResponse) -> Result<Vec<OracleVerdict>, OracleError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| OracleError::Malformed("response has no message content".into()))?;

    let payload: RerankPayload = serde_json::from_str(content.trim())
        .map_err(|e| OracleError::Malformed(format!("content is not a matches object: {e}")))?;

    let verdicts = payload
        .matches
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<OracleVerdict>(entry) {
            Ok(verdict) => Some(verdict),
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable rerank entry");
                None
            }
        })
        .collect();
    Ok(verdicts)
}

#[async_trait]
impl RerankOracle for GroqRerankOracle {
    #[instrument(skip(self, ctx, candidates), fields(candidates = candidates.len(), model = %self.config.model))]
    async fn rerank(
        &self,
        ctx: &RequesterContext,
        candidates: &[RerankCandidate],
    ) -> Result<Vec<OracleVerdict>, OracleError> {
        if !self.config.is_usable() {
            return Err(OracleError::NotConfigured);
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.request_body(ctx, candidates);
        let response = self.post_with_retry(&body).await?;
        let verdicts = parse_verdicts(response)?;
        debug!(verdicts = verdicts.len(), "rerank verdicts received");
        Ok(verdicts)
    }

    fn is_configured(&self) -> bool {
        self.config.is_usable()
    }

    fn provider(&self) -> String {
        format!("Groq ({})", self.config.model)
    }
}
