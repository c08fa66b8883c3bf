use std::sync::Arc;

use reqwest::Client;
use serde_json::{Value, json};

use crate::{Error, Result, auth::TokenManager, retry};

const TASK_QUERY: &str = "RETRIEVAL_QUERY";
const TASK_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";

/// Vertex AI text embedding client.
///
/// Queries and documents are embedded with distinct task types so short
/// queries and long catalogue texts land in a compatible space.
pub struct VertexEmbeddingClient {
	model: String,
	dimensions: u32,
	batch_size: usize,
	retries: u32,
	url: String,
	http: Client,
	auth: Arc<TokenManager>,
}
impl VertexEmbeddingClient {
	pub fn new(cfg: &anzsic_config::Settings, auth: Arc<TokenManager>) -> Result<Self> {
		let http = crate::build_client(cfg.embed_timeout_ms, cfg.https_proxy.as_deref())?;
		let url = format!(
			"https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:predict",
			location = cfg.gcp_location_id,
			project = cfg.gcp_project_id,
			model = cfg.gcp_embed_model,
		);

		Ok(Self {
			model: cfg.gcp_embed_model.clone(),
			dimensions: cfg.embed_dim,
			batch_size: cfg.embed_batch_size,
			retries: cfg.embed_retries,
			url,
			http,
			auth,
		})
	}

	pub fn model_name(&self) -> &str {
		&self.model
	}

	pub fn dimensions(&self) -> u32 {
		self.dimensions
	}

	pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
		self.embed_single(text, TASK_QUERY, None).await
	}

	pub async fn embed_document(&self, text: &str, title: Option<&str>) -> Result<Vec<f32>> {
		self.embed_single(text, TASK_DOCUMENT, title).await
	}

	/// Embeds documents in provider-sized chunks. A prediction that comes back
	/// malformed yields `None` in its slot instead of failing the batch.
	pub async fn embed_documents_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
		let mut all = Vec::with_capacity(texts.len());

		for chunk in texts.chunks(self.batch_size.max(1)) {
			let instances: Vec<Value> = chunk
				.iter()
				.map(|text| json!({ "content": text, "task_type": TASK_DOCUMENT }))
				.collect();
			let response = self.post(json!({ "instances": instances })).await?;
			let predictions = response
				.get("predictions")
				.and_then(|v| v.as_array())
				.cloned()
				.unwrap_or_default();

			for index in 0..chunk.len() {
				let parsed = predictions
					.get(index)
					.and_then(|prediction| parse_embedding_values(prediction).ok())
					.filter(|values: &Vec<f32>| values.len() == self.dimensions as usize);

				if parsed.is_none() {
					tracing::warn!(index, "Batch prediction missing or malformed.");
				}

				all.push(parsed);
			}
		}

		Ok(all)
	}

	async fn embed_single(
		&self,
		text: &str,
		task_type: &str,
		title: Option<&str>,
	) -> Result<Vec<f32>> {
		let mut instance = json!({ "content": text, "task_type": task_type });

		if let Some(title) = title.filter(|title| !title.is_empty()) {
			instance["title"] = json!(title);
		}

		let response = self.post(json!({ "instances": [instance] })).await?;
		let values = response
			.get("predictions")
			.and_then(|v| v.as_array())
			.and_then(|arr| arr.first())
			.map(parse_embedding_values)
			.transpose()?
			.ok_or_else(|| Error::InvalidResponse {
				message: "Embedding response is missing predictions.".to_string(),
			})?;

		if values.len() != self.dimensions as usize {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding has {} dimensions, expected {}.",
					values.len(),
					self.dimensions
				),
			});
		}

		Ok(values)
	}

	async fn post(&self, payload: Value) -> Result<Value> {
		retry::post_json_with_retry(&self.http, &self.url, &self.auth, &payload, self.retries)
			.await
	}
}

fn parse_embedding_values(prediction: &Value) -> Result<Vec<f32>> {
	let values = prediction
		.get("embeddings")
		.and_then(|v| v.get("values"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Prediction is missing embeddings.values.".to_string(),
		})?;
	let mut out = Vec::with_capacity(values.len());

	for value in values {
		let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
			message: "Embedding value must be numeric.".to_string(),
		})?;

		out.push(number as f32);
	}

	Ok(out)
}
