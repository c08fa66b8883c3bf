//! Reference port implementations: Vertex AI embeddings, Gemini, Postgres.
//!
//! Adapters translate provider- and storage-level errors into the shared
//! taxonomy; services above this line never see a transport type.

use std::{collections::HashMap, future::Future, sync::Arc};

use anzsic_domain::{CatalogueRecord, Error};
use anzsic_providers::{GeminiClient, TokenManager, VertexEmbeddingClient};
use anzsic_storage::{catalogue, db::Db};

use crate::{BoxFuture, DatabasePort, EmbeddingPort, LlmPort, Result};

pub struct VertexEmbeddingAdapter {
	client: VertexEmbeddingClient,
}
impl VertexEmbeddingAdapter {
	pub fn new(cfg: &anzsic_config::Settings, auth: Arc<TokenManager>) -> Result<Self> {
		let client = VertexEmbeddingClient::new(cfg, auth).map_err(embedding_error)?;

		Ok(Self { client })
	}
}
impl EmbeddingPort for VertexEmbeddingAdapter {
	fn model_name(&self) -> &str {
		self.client.model_name()
	}

	fn dimensions(&self) -> u32 {
		self.client.dimensions()
	}

	fn embed_query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { self.client.embed_query(text).await.map_err(embedding_error) })
	}

	fn embed_document<'a>(
		&'a self,
		text: &'a str,
		title: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			self.client.embed_document(text, title).await.map_err(embedding_error)
		})
	}

	fn embed_documents_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Option<Vec<f32>>>>> {
		Box::pin(async move {
			self.client.embed_documents_batch(texts).await.map_err(embedding_error)
		})
	}
}

pub struct GeminiLlmAdapter {
	client: GeminiClient,
}
impl GeminiLlmAdapter {
	pub fn new(cfg: &anzsic_config::Settings, auth: Arc<TokenManager>) -> Result<Self> {
		let client = GeminiClient::new(cfg, auth).map_err(llm_error)?;

		Ok(Self { client })
	}
}
impl LlmPort for GeminiLlmAdapter {
	fn model_name(&self) -> &str {
		self.client.model_name()
	}

	fn generate_json<'a>(
		&'a self,
		system_prompt: &'a str,
		user_message: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			self.client.generate_json(system_prompt, user_message).await.map_err(llm_error)
		})
	}
}

pub struct PostgresDatabaseAdapter {
	db: Db,
}
impl PostgresDatabaseAdapter {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}
impl DatabasePort for PostgresDatabaseAdapter {
	fn vector_search<'a>(
		&'a self,
		embedding: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<(String, u32)>>> {
		Box::pin(with_transport_retry(move || {
			catalogue::vector_search(&self.db.pool, embedding, limit)
		}))
	}

	fn fts_search<'a>(
		&'a self,
		query_text: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<(String, u32)>>> {
		Box::pin(with_transport_retry(move || {
			catalogue::fts_search(&self.db.pool, query_text, limit)
		}))
	}

	fn fetch_by_codes<'a>(
		&'a self,
		codes: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, CatalogueRecord>>> {
		Box::pin(with_transport_retry(move || catalogue::fetch_by_codes(&self.db.pool, codes)))
	}

	fn healthcheck<'a>(&'a self) -> BoxFuture<'a, Result<bool>> {
		Box::pin(with_transport_retry(move || catalogue::healthcheck(&self.db.pool)))
	}
}

/// Runs a storage operation, retrying exactly once when the failure looks
/// like a dropped connection; the pool hands the retry a fresh one.
async fn with_transport_retry<T, F, Fut>(op: F) -> Result<T>
where
	F: Fn() -> Fut,
	Fut: Future<Output = anzsic_storage::Result<T>>,
{
	match op().await {
		Ok(value) => Ok(value),
		Err(err) if err.is_transport() => {
			tracing::warn!(error = %err, "Database transport failure; retrying once.");

			op().await.map_err(database_error)
		},
		Err(err) => Err(database_error(err)),
	}
}

fn embedding_error(err: anzsic_providers::Error) -> Error {
	if err.is_authentication() {
		Error::Authentication { message: err.to_string() }
	} else {
		Error::Embedding { message: err.to_string() }
	}
}

fn llm_error(err: anzsic_providers::Error) -> Error {
	if err.is_authentication() {
		Error::Authentication { message: err.to_string() }
	} else {
		Error::Llm { message: err.to_string() }
	}
}

fn database_error(err: anzsic_storage::Error) -> Error {
	Error::Database { message: err.to_string() }
}
