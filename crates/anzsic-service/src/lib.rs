pub mod classifier;
pub mod prompts;
pub mod reranker;
pub mod retriever;
pub mod rrf;

mod adapters;

pub use adapters::{GeminiLlmAdapter, PostgresDatabaseAdapter, VertexEmbeddingAdapter};
pub use classifier::ClassifierPipeline;
pub use reranker::LlmReranker;
pub use retriever::HybridRetriever;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use anzsic_domain::{CatalogueRecord, Error};

pub type Result<T, E = Error> = std::result::Result<T, E>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text embedding capability consumed by Stage 1.
///
/// Any type with these methods qualifies; the pipeline never names a concrete
/// provider.
pub trait EmbeddingPort
where
	Self: Send + Sync,
{
	fn model_name(&self) -> &str;

	fn dimensions(&self) -> u32;

	/// Embeds a search query (retrieval-query orientation where the model
	/// distinguishes queries from documents).
	fn embed_query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;

	fn embed_document<'a>(
		&'a self,
		text: &'a str,
		title: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<f32>>>;

	fn embed_documents_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Option<Vec<f32>>>>>;
}

/// Hybrid search datastore capability.
///
/// Both searches return `(code, rank)` pairs with rank starting at 1 in the
/// backend's own order: cosine distance ascending for vectors, native
/// relevance descending for FTS.
pub trait DatabasePort
where
	Self: Send + Sync,
{
	fn vector_search<'a>(
		&'a self,
		embedding: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<(String, u32)>>>;

	fn fts_search<'a>(
		&'a self,
		query_text: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<(String, u32)>>>;

	/// Bulk hydration. The returned map carries no ordering guarantee; the
	/// retriever reorders against its own ranking.
	fn fetch_by_codes<'a>(
		&'a self,
		codes: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, CatalogueRecord>>>;

	fn healthcheck<'a>(&'a self) -> BoxFuture<'a, Result<bool>>;
}

/// LLM generation capability consumed by Stage 2. The returned string is
/// whatever the provider believes to be JSON; parsing belongs to the reranker.
pub trait LlmPort
where
	Self: Send + Sync,
{
	fn model_name(&self) -> &str;

	fn generate_json<'a>(
		&'a self,
		system_prompt: &'a str,
		user_message: &'a str,
	) -> BoxFuture<'a, Result<String>>;
}

/// Builds the fully wired reference pipeline: Vertex AI embeddings, Gemini
/// re-ranking and a Postgres hybrid store, all sharing one token manager.
pub async fn build_pipeline(cfg: anzsic_config::Settings) -> Result<ClassifierPipeline> {
	let auth = Arc::new(anzsic_providers::TokenManager::new(&cfg.gcloud_path));
	let embedding = Arc::new(VertexEmbeddingAdapter::new(&cfg, auth.clone())?);
	let llm = Arc::new(GeminiLlmAdapter::new(&cfg, auth)?);
	let db = anzsic_storage::db::Db::connect(&cfg)
		.await
		.map_err(|err| Error::Database { message: err.to_string() })?;
	let database = Arc::new(PostgresDatabaseAdapter::new(db));
	let retriever = HybridRetriever::new(database, embedding, &cfg);
	let reranker = LlmReranker::new(llm, &cfg);

	tracing::info!(
		embed_model = retriever.embed_model(),
		llm_model = reranker.model_name(),
		"Classifier pipeline ready."
	);

	Ok(ClassifierPipeline::new(retriever, reranker))
}
