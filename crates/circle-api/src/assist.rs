//! Best-effort text suggestions from a generative language model.
//!
//! Nothing here returns an error to the caller: a missing key, a failed
//! request or a slow response all degrade to "no suggestion".

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use circle_core::prompts;
use circle_types::api::{DescriptionRequest, SuggestionResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Google Generative Language `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts joined.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", GEMINI_BASE_URL, self.model);
        let body = GenerateRequest {
            contents: [Content { parts: [Part { text: prompt }] }],
        };

        let response: GenerateResponse = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("generateContent request failed")?
            .error_for_status()?
            .json()
            .await
            .context("generateContent returned an unreadable body")?;

        response.text().ok_or_else(|| anyhow!("generateContent returned no text"))
    }
}

/// Wraps an optional generator with a deadline. Cheap to clone.
#[derive(Clone)]
pub struct Assistant {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl Assistant {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            generator: Some(generator),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            generator: None,
            timeout: Duration::ZERO,
        }
    }

    /// A trimmed suggestion, or `None`. A response arriving after the
    /// deadline is dropped.
    pub async fn suggest(&self, prompt: &str) -> Option<String> {
        let Some(generator) = &self.generator else {
            debug!("suggestion requested but no generator is configured");
            return None;
        };

        match tokio::time::timeout(self.timeout, generator.generate(prompt)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Ok(Err(e)) => {
                warn!("suggestion request failed: {:#}", e);
                None
            }
            Err(_) => {
                warn!("suggestion request abandoned after {:?}", self.timeout);
                None
            }
        }
    }
}

pub async fn describe(
    State(state): State<AppState>,
    Extension(_current): Extension<CurrentUser>,
    Json(req): Json<DescriptionRequest>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("Please enter a title first".into()));
    }

    let prompt = prompts::description_prompt(&req.title, req.kind);
    Ok(Json(SuggestionResponse {
        suggestion: state.assistant.suggest(&prompt).await,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct Canned(pub &'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Err(anyhow!("quota exceeded"))
        }
    }

    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".into())
        }
    }

    #[tokio::test]
    async fn suggestion_is_trimmed() {
        let assistant = Assistant::new(Arc::new(Canned("  See you at six!\n")), Duration::from_secs(1));
        assert_eq!(assistant.suggest("p").await.as_deref(), Some("See you at six!"));
    }

    #[tokio::test]
    async fn failures_degrade_to_none() {
        assert_eq!(Assistant::disabled().suggest("p").await, None);
        let failing = Assistant::new(Arc::new(Failing), Duration::from_secs(1));
        assert_eq!(failing.suggest("p").await, None);
        let blank = Assistant::new(Arc::new(Canned("   ")), Duration::from_secs(1));
        assert_eq!(blank.suggest("p").await, None);
    }

    #[tokio::test]
    async fn late_response_is_abandoned() {
        let slow = Assistant::new(Arc::new(Slow), Duration::from_millis(100));
        assert_eq!(slow.suggest("p").await, None);
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Fresh "},{"text":"bread. "}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Fresh bread."));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(empty.text(), None);
    }
}
