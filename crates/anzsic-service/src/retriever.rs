use std::sync::Arc;

use anzsic_domain::{Candidate, Error};

use crate::{DatabasePort, EmbeddingPort, Result, rrf};

/// Stage 1: hybrid retrieval.
///
/// Embeds the query, runs the vector and lexical searches concurrently, fuses
/// the two rankings with RRF, then hydrates the surviving codes in one bulk
/// fetch.
pub struct HybridRetriever {
	db: Arc<dyn DatabasePort>,
	embedder: Arc<dyn EmbeddingPort>,
	rrf_k: u32,
	allow_degraded: bool,
}
impl HybridRetriever {
	pub fn new(
		db: Arc<dyn DatabasePort>,
		embedder: Arc<dyn EmbeddingPort>,
		cfg: &anzsic_config::Settings,
	) -> Self {
		Self { db, embedder, rrf_k: cfg.rrf_k, allow_degraded: cfg.allow_degraded_retrieval }
	}

	pub fn embed_model(&self) -> &str {
		self.embedder.model_name()
	}

	/// Returns up to `pool_size` candidates ordered by fused score.
	pub async fn retrieve(&self, query: &str, pool_size: u32) -> Result<Vec<Candidate>> {
		tracing::info!(query, pool_size, "Retrieving candidates.");

		let embedding = self.embedder.embed_query(query).await?;

		if embedding.is_empty() {
			return Err(Error::Embedding {
				message: "Embedding provider returned an empty query vector.".to_string(),
			});
		}

		let (vector_outcome, fts_outcome) = tokio::join!(
			self.db.vector_search(&embedding, pool_size),
			self.db.fts_search(query, pool_size),
		);
		let (vector_hits, fts_hits) = self.resolve_search_outcomes(vector_outcome, fts_outcome)?;

		tracing::debug!(
			vector_hits = vector_hits.len(),
			fts_hits = fts_hits.len(),
			"Search streams joined."
		);

		let fused = rrf::fuse(&vector_hits, &fts_hits, self.rrf_k);
		let top: Vec<rrf::FusedHit> = fused.into_iter().take(pool_size as usize).collect();

		if top.is_empty() {
			return Ok(Vec::new());
		}

		let codes: Vec<String> = top.iter().map(|hit| hit.code.clone()).collect();
		let mut records = self.db.fetch_by_codes(&codes).await?;

		if records.is_empty() {
			return Err(Error::Retrieval {
				message: format!(
					"Hydration returned no records for {} fused codes.",
					codes.len()
				),
			});
		}

		let mut candidates = Vec::with_capacity(top.len());
		let mut missing = 0_u32;

		for hit in top {
			let Some(record) = records.remove(&hit.code) else {
				tracing::warn!(code = %hit.code, "Fused code missing from hydration result.");

				missing += 1;

				continue;
			};

			candidates.push(Candidate {
				code: record.code,
				description: record.description,
				class_desc: record.class_desc,
				group_desc: record.group_desc,
				subdivision_desc: record.subdivision_desc,
				division_desc: record.division_desc,
				class_exclusions: record.class_exclusions,
				enriched_text: record.enriched_text,
				rrf_score: round6(hit.rrf_score),
				in_vector: hit.in_vector,
				in_fts: hit.in_fts,
				vector_rank: hit.vector_rank,
				fts_rank: hit.fts_rank,
			});
		}

		if missing > 0 {
			tracing::warn!(missing, "Some fused codes did not hydrate.");
		}

		tracing::info!(
			candidates = candidates.len(),
			top_rrf = candidates.first().map(|c| c.rrf_score).unwrap_or_default(),
			"Retrieval complete."
		);

		Ok(candidates)
	}

	/// Strict by default: a single failed stream fails the whole call unless
	/// degraded retrieval was explicitly enabled in settings.
	fn resolve_search_outcomes(
		&self,
		vector_outcome: Result<Vec<(String, u32)>>,
		fts_outcome: Result<Vec<(String, u32)>>,
	) -> Result<(Vec<(String, u32)>, Vec<(String, u32)>)> {
		match (vector_outcome, fts_outcome) {
			(Ok(vector_hits), Ok(fts_hits)) => Ok((vector_hits, fts_hits)),
			(Ok(vector_hits), Err(err)) =>
				if self.allow_degraded {
					tracing::warn!(
						error = %err,
						"FTS search failed; continuing degraded with vector hits only."
					);

					Ok((vector_hits, Vec::new()))
				} else {
					Err(Error::Retrieval {
						message: format!("FTS search failed while vector search succeeded: {err}"),
					})
				},
			(Err(err), Ok(fts_hits)) =>
				if self.allow_degraded {
					tracing::warn!(
						error = %err,
						"Vector search failed; continuing degraded with FTS hits only."
					);

					Ok((Vec::new(), fts_hits))
				} else {
					Err(Error::Retrieval {
						message: format!("Vector search failed while FTS search succeeded: {err}"),
					})
				},
			(Err(vector_err), Err(fts_err)) => {
				tracing::error!(
					vector_error = %vector_err,
					fts_error = %fts_err,
					"Both search streams failed."
				);

				Err(vector_err)
			},
		}
	}
}

fn round6(value: f64) -> f64 {
	(value * 1e6).round() / 1e6
}
