//! OpenAI-compatible model backend.
//!
//! Works with any OpenAI-compatible API (OpenAI, Azure OpenAI, Ollama,
//! vLLM, LocalAI). Diagnostic analysis and health reports go through
//! chat completions in JSON mode; the health visual goes through the
//! images endpoint; advisory sessions keep chat context across queries.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use portfolio::{
    FinancialHealth, HealthStatus, HealthVisual, Recommendation, RecommendedAction,
    SubscriptionRecord,
};

use super::traits::*;
use crate::stream::ReplyStream;

/// OpenAI-compatible backend.
pub struct OpenAiModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    image_model: String,
}

impl OpenAiModel {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            image_model: "gpt-image-1".to_string(),
        }
    }

    /// Create a backend for the OpenAI API.
    pub fn openai(model: &str, api_key: impl Into<String>) -> Self {
        Self::new("https://api.openai.com/v1", model, Some(api_key.into()))
    }

    /// Create a backend pointing to local Ollama.
    pub fn ollama(model: &str) -> Self {
        Self::new("http://localhost:11434/v1", model, None)
    }

    /// Override the model used for visual synthesis.
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Bearer {}", k))
    }

    /// Issue one chat completion and return the raw assistant content.
    async fn complete(
        &self,
        messages: Vec<WireMessage>,
        json_mode: bool,
    ) -> Result<String, ModelError> {
        complete_chat(
            &self.client,
            &self.base_url,
            self.auth_header(),
            &self.model,
            messages,
            json_mode,
        )
        .await
    }
}

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatRequest>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl WireMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormatRequest {
    #[serde(rename = "type")]
    format_type: String,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

/// Images endpoint request/response.
#[derive(Debug, Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    response_format: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: String,
}

/// Wire shape of one recommendation in the model's JSON output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationWire {
    subscription_name: String,
    action: RecommendedAction,
    reasoning: String,
    #[serde(default)]
    potential_saving: f64,
    #[serde(default)]
    confidence: f64,
}

/// Wire shape of the model's health report output.
#[derive(Debug, Deserialize)]
struct HealthWire {
    score: u8,
    #[serde(default)]
    status: Option<HealthStatus>,
    summary: String,
}

async fn complete_chat(
    client: &Client,
    base_url: &str,
    auth: Option<String>,
    model: &str,
    messages: Vec<WireMessage>,
    json_mode: bool,
) -> Result<String, ModelError> {
    let request = ChatRequest {
        model: model.to_string(),
        messages,
        temperature: Some(0.3),
        response_format: json_mode.then(|| ResponseFormatRequest {
            format_type: "json_object".to_string(),
        }),
        stream: false,
    };

    let mut http_request = client.post(format!("{}/chat/completions", base_url));
    if let Some(auth) = auth {
        http_request = http_request.header(header::AUTHORIZATION, auth);
    }

    let response = http_request
        .json(&request)
        .send()
        .await
        .map_err(|e| ModelError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited { retry_after_ms: None });
        }

        return Err(ModelError::RequestFailed(format!("HTTP {}: {}", status, body)));
    }

    let chat_response: ChatResponse = response
        .json()
        .await
        .map_err(|e| ModelError::ParseError(e.to_string()))?;

    chat_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ModelError::ParseError("No choices in response".to_string()))
}

fn snapshot_prompt(records: &[SubscriptionRecord]) -> String {
    let listing = serde_json::to_string_pretty(records).unwrap_or_default();
    format!("Current subscription portfolio:\n{}\n", listing)
}

#[async_trait]
impl ModelBackend for OpenAiModel {
    fn id(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        let mut request = self.client.get(&url);

        if let Some(auth) = self.auth_header() {
            request = request.header(header::AUTHORIZATION, auth);
        }

        request
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn analyze(
        &self,
        records: &[SubscriptionRecord],
    ) -> Result<Vec<Recommendation>, ModelError> {
        let system = "You are a subscription cost auditor. Respond with a JSON object \
                      {\"recommendations\": [...]} where each item has subscriptionName, \
                      action (Keep|Cancel|Downgrade|Review), reasoning, potentialSaving \
                      (monthly amount) and confidence (0.0-1.0).";
        let user = format!(
            "{}Recommend an action for every subscription.",
            snapshot_prompt(records)
        );

        let content = self
            .complete(vec![WireMessage::system(system), WireMessage::user(user)], true)
            .await?;

        #[derive(Deserialize)]
        struct AnalyzeWire {
            recommendations: Vec<RecommendationWire>,
        }

        let wire: AnalyzeWire = serde_json::from_str(&content)
            .map_err(|e| ModelError::ParseError(e.to_string()))?;

        Ok(wire
            .recommendations
            .into_iter()
            .map(|w| Recommendation {
                id: uuid::Uuid::new_v4().to_string(),
                subscription_name: w.subscription_name,
                action: w.action,
                reasoning: w.reasoning,
                potential_saving: w.potential_saving.max(0.0),
                confidence: w.confidence.clamp(0.0, 1.0),
            })
            .collect())
    }

    async fn health_report(
        &self,
        records: &[SubscriptionRecord],
    ) -> Result<FinancialHealth, ModelError> {
        let system = "You are a personal finance analyst. Respond with a JSON object \
                      with score (0-100), status (Critical|Sub-optimal|Good|Excellent) \
                      and a one-sentence summary.";
        let user = format!(
            "{}Score the overall financial health of this portfolio.",
            snapshot_prompt(records)
        );

        let content = self
            .complete(vec![WireMessage::system(system), WireMessage::user(user)], true)
            .await?;

        let wire: HealthWire = serde_json::from_str(&content)
            .map_err(|e| ModelError::ParseError(e.to_string()))?;

        Ok(FinancialHealth {
            score: wire.score.min(100),
            status: wire.status.unwrap_or_else(|| HealthStatus::from_score(wire.score)),
            summary: wire.summary,
        })
    }

    async fn health_visual(&self, health: &FinancialHealth) -> Result<HealthVisual, ModelError> {
        let request = ImageRequest {
            model: self.image_model.clone(),
            prompt: format!(
                "Minimal dashboard illustration of a financial health score of {} out of 100 ({:?}).",
                health.score, health.status
            ),
            response_format: "b64_json".to_string(),
        };

        let mut http_request = self.client.post(format!("{}/images/generations", self.base_url));
        if let Some(auth) = self.auth_header() {
            http_request = http_request.header(header::AUTHORIZATION, auth);
        }

        let response = http_request
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let image: ImageResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;

        let datum = image
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ParseError("No image in response".to_string()))?;

        Ok(HealthVisual {
            data_uri: format!("data:image/png;base64,{}", datum.b64_json),
            score: health.score,
        })
    }

    async fn open_session(
        &self,
        records: Vec<SubscriptionRecord>,
        health: Option<FinancialHealth>,
    ) -> Result<Box<dyn AdvisorBackend>, ModelError> {
        let mut system = format!(
            "You are a friendly subscription advisor.\n{}",
            snapshot_prompt(&records)
        );
        if let Some(health) = &health {
            system.push_str(&format!(
                "Current health score: {} ({:?}). {}\n",
                health.score, health.status, health.summary
            ));
        }

        Ok(Box::new(OpenAiAdvisor {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            auth: self.auth_header(),
            model: self.model.clone(),
            messages: vec![WireMessage::system(system)],
        }))
    }
}

/// Conversational session with chat context carried across queries.
struct OpenAiAdvisor {
    client: Client,
    base_url: String,
    auth: Option<String>,
    model: String,
    messages: Vec<WireMessage>,
}

#[async_trait]
impl AdvisorBackend for OpenAiAdvisor {
    async fn stream_query(&mut self, text: &str) -> Result<ReplyStream, ModelError> {
        self.messages.push(WireMessage::user(text));

        // Single-round completion wrapped as a one-chunk stream; SSE
        // streaming stays behind the same seam.
        let content = complete_chat(
            &self.client,
            &self.base_url,
            self.auth.clone(),
            &self.model,
            self.messages.clone(),
            false,
        )
        .await?;

        self.messages.push(WireMessage::assistant(content.clone()));
        Ok(ReplyStream::from_text(content))
    }
}
