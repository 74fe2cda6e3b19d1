use crate::config::OpenAiConfig;
use crate::entities::AnalysisVerdict;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
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

/// Structured verdict the model is asked to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVerdict {
    pub verdict: AnalysisVerdict,
    pub competition_score: f64,
    pub saturation_score: f64,
    pub launch_potential_score: f64,
    #[serde(default)]
    pub marketing_angles: Vec<String>,
    pub summary: String,
}

/// Input sent to the model for one product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductBrief<'a> {
    pub title: &'a str,
    pub source_url: &'a str,
    pub price_cents: Option<i64>,
    pub niche: Option<&'a str>,
}

#[derive(Clone)]
pub struct OpenAiService {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiService {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub async fn analyze_product(&self, brief: &ProductBrief<'_>) -> AppResult<ProductVerdict> {
        if self.config.api_key.is_empty() {
            return Err(AppError::ExternalApiError(
                "Analysis service is not configured".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "response_format": { "type": "json_object" },
            "temperature": 0.4,
            "messages": [
                {
                    "role": "system",
                    "content": "You evaluate AliExpress/Alibaba products for resale on Etsy. \
                        Reply with a JSON object with keys: verdict (launch|test|avoid), \
                        competition_score, saturation_score, launch_potential_score (numbers 0-10), \
                        marketing_angles (array of strings), summary (string)."
                },
                {
                    "role": "user",
                    "content": serde_json::to_string(brief)?
                }
            ]
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Chat completion failed ({status}): {error_text}"
            )));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::ExternalApiError("Empty chat completion".to_string()))?;

        parse_verdict(&content)
    }
}

/// Parses and sanity-checks the model output. Scores are clamped to 0-10.
pub fn parse_verdict(content: &str) -> AppResult<ProductVerdict> {
    let mut verdict: ProductVerdict = serde_json::from_str(content.trim()).map_err(|e| {
        AppError::ExternalApiError(format!("Malformed analysis returned by model: {e}"))
    })?;

    for score in [
        &mut verdict.competition_score,
        &mut verdict.saturation_score,
        &mut verdict.launch_potential_score,
    ] {
        if !score.is_finite() {
            return Err(AppError::ExternalApiError(
                "Model returned a non-numeric score".to_string(),
            ));
        }
        *score = score.clamp(0.0, 10.0);
    }
    verdict.marketing_angles.retain(|a| !a.trim().is_empty());
    Ok(verdict)
}
