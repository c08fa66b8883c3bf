use std::sync::Arc;

use reqwest::Client;
use serde_json::{Value, json};

use crate::{Error, Result, auth::TokenManager, retry};

const TEMPERATURE: f64 = 0.1;

/// Vertex AI Gemini client speaking the generateContent REST API.
///
/// Structured output is requested via `responseMimeType: application/json`;
/// the returned text is handed back raw, parsing belongs to the caller.
pub struct GeminiClient {
	model: String,
	retries: u32,
	url: String,
	http: Client,
	auth: Arc<TokenManager>,
}
impl GeminiClient {
	pub fn new(cfg: &anzsic_config::Settings, auth: Arc<TokenManager>) -> Result<Self> {
		let http = crate::build_client(cfg.llm_timeout_ms, cfg.https_proxy.as_deref())?;
		let url = format!(
			"https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent",
			location = cfg.gcp_location_id,
			project = cfg.gcp_project_id,
			model = cfg.gcp_gemini_model,
		);

		Ok(Self { model: cfg.gcp_gemini_model.clone(), retries: cfg.llm_retries, url, http, auth })
	}

	pub fn model_name(&self) -> &str {
		&self.model
	}

	pub async fn generate_json(&self, system_prompt: &str, user_message: &str) -> Result<String> {
		let payload = build_payload(system_prompt, user_message);
		let response = retry::post_json_with_retry(
			&self.http,
			&self.url,
			&self.auth,
			&payload,
			self.retries,
		)
		.await?;

		extract_text(&response)
	}
}

fn build_payload(system_prompt: &str, user_message: &str) -> Value {
	json!({
		"systemInstruction": {
			"parts": [{ "text": system_prompt }],
		},
		"contents": [
			{
				"role": "user",
				"parts": [{ "text": user_message }],
			}
		],
		"generationConfig": {
			"temperature": TEMPERATURE,
			"responseMimeType": "application/json",
		},
	})
}

fn extract_text(response: &Value) -> Result<String> {
	let text = response
		.get("candidates")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|candidate| candidate.get("content"))
		.and_then(|content| content.get("parts"))
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|part| part.get("text"))
		.and_then(|v| v.as_str())
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Gemini response contained no text part.".to_string(),
		})?;

	Ok(text.to_string())
}
