use time::OffsetDateTime;

use anzsic_domain::{Candidate, ClassifyResponse, ClassifyResult, SearchMode, SearchRequest};

use crate::{HybridRetriever, LlmReranker, Result};

/// Two-stage classification pipeline.
///
/// Stateless per call and safe to share across concurrent callers to the
/// extent its adapters are; errors from either stage propagate unchanged.
pub struct ClassifierPipeline {
	retriever: HybridRetriever,
	reranker: LlmReranker,
}
impl ClassifierPipeline {
	pub fn new(retriever: HybridRetriever, reranker: LlmReranker) -> Self {
		Self { retriever, reranker }
	}

	/// Classifies an occupation or business description into ranked ANZSIC
	/// codes.
	pub async fn classify(&self, request: &SearchRequest) -> Result<ClassifyResponse> {
		tracing::info!(
			query = request.query(),
			mode = request.mode().as_str(),
			top_k = request.top_k(),
			pool_size = request.pool_size(),
			"Classifying."
		);

		let candidates = self.retriever.retrieve(request.query(), request.pool_size()).await?;
		let mut llm_model = String::new();
		let results = match request.mode() {
			SearchMode::Fast => fast_results(&candidates, request.top_k()),
			SearchMode::HighFidelity =>
				if candidates.is_empty() {
					Vec::new()
				} else {
					llm_model = self.reranker.model_name().to_string();

					self.reranker
						.rerank(request.query(), &candidates, request.top_k())
						.await?
				},
		};

		Ok(ClassifyResponse {
			query: request.query().to_string(),
			mode: request.mode(),
			top_k_requested: request.top_k(),
			candidates_retrieved: candidates.len() as u32,
			results,
			generated_at: OffsetDateTime::now_utc(),
			embed_model: self.retriever.embed_model().to_string(),
			llm_model,
		})
	}
}

/// FAST mode adapts candidates directly, synthesising a deterministic reason
/// from the fusion provenance.
fn fast_results(candidates: &[Candidate], top_k: u32) -> Vec<ClassifyResult> {
	candidates
		.iter()
		.take(top_k as usize)
		.enumerate()
		.map(|(i, candidate)| ClassifyResult {
			rank: i as u32 + 1,
			code: candidate.code.clone(),
			description: candidate.description.clone(),
			class_desc: candidate.class_desc.clone(),
			division_desc: candidate.division_desc.clone(),
			reason: format!(
				"RRF score {}; sources: {}",
				candidate.rrf_score,
				candidate.source_label()
			),
			rrf_score: candidate.rrf_score,
		})
		.collect()
}
