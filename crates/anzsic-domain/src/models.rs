use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result};

pub const QUERY_MAX_CHARS: usize = 2_000;
pub const TOP_K_MAX: u32 = 20;
pub const POOL_SIZE_MIN: u32 = 5;
pub const POOL_SIZE_MAX: u32 = 100;
pub const DEFAULT_TOP_K: u32 = 5;
pub const DEFAULT_POOL_SIZE: u32 = 20;

/// Controls which pipeline stages run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
	/// Stage 1 only: hybrid retrieval fused with RRF.
	Fast,
	/// Stage 1 + Stage 2: retrieval followed by LLM re-ranking.
	#[default]
	HighFidelity,
}
impl SearchMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Fast => "fast",
			Self::HighFidelity => "high_fidelity",
		}
	}
}

/// Validated input to the classification pipeline.
///
/// Fields are private so an invalid request cannot be constructed; the only
/// way in is [`SearchRequest::new`], which trims the query and enforces the
/// range invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
	query: String,
	mode: SearchMode,
	top_k: u32,
	pool_size: u32,
}
impl SearchRequest {
	pub fn new(query: &str, mode: SearchMode, top_k: u32, pool_size: u32) -> Result<Self> {
		let query = query.trim();

		if query.is_empty() {
			return Err(Error::Configuration {
				message: "Query must be non-empty after trimming.".to_string(),
			});
		}
		if query.chars().count() > QUERY_MAX_CHARS {
			return Err(Error::Configuration {
				message: format!("Query must be at most {QUERY_MAX_CHARS} characters."),
			});
		}
		if top_k < 1 || top_k > TOP_K_MAX {
			return Err(Error::Configuration {
				message: format!("top_k must be between 1 and {TOP_K_MAX}."),
			});
		}
		if pool_size < POOL_SIZE_MIN || pool_size > POOL_SIZE_MAX {
			return Err(Error::Configuration {
				message: format!(
					"pool_size must be between {POOL_SIZE_MIN} and {POOL_SIZE_MAX}."
				),
			});
		}
		if pool_size < top_k {
			return Err(Error::Configuration {
				message: "pool_size must be greater than or equal to top_k.".to_string(),
			});
		}

		Ok(Self { query: query.to_string(), mode, top_k, pool_size })
	}

	/// Defaults: HIGH_FIDELITY mode, top_k 5, pool_size 20.
	pub fn with_defaults(query: &str) -> Result<Self> {
		Self::new(query, SearchMode::default(), DEFAULT_TOP_K, DEFAULT_POOL_SIZE)
	}

	pub fn query(&self) -> &str {
		&self.query
	}

	pub fn mode(&self) -> SearchMode {
		self.mode
	}

	pub fn top_k(&self) -> u32 {
		self.top_k
	}

	pub fn pool_size(&self) -> u32 {
		self.pool_size
	}
}

/// One catalogue row, as hydrated from the datastore.
///
/// Every field may be empty but is never absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueRecord {
	pub code: String,
	pub description: String,
	pub class_desc: String,
	pub group_desc: String,
	pub subdivision_desc: String,
	pub division_desc: String,
	pub class_exclusions: String,
	pub enriched_text: String,
}

/// A single code surfaced by Stage 1, with RRF provenance attached.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
	pub code: String,
	pub description: String,
	pub class_desc: String,
	pub group_desc: String,
	pub subdivision_desc: String,
	pub division_desc: String,
	pub class_exclusions: String,
	pub enriched_text: String,
	pub rrf_score: f64,
	pub in_vector: bool,
	pub in_fts: bool,
	pub vector_rank: Option<u32>,
	pub fts_rank: Option<u32>,
}
impl Candidate {
	/// Which search systems surfaced this candidate.
	pub fn source_label(&self) -> &'static str {
		match (self.in_vector, self.in_fts) {
			(true, true) => "both",
			(true, false) => "vector",
			(false, true) => "fts",
			(false, false) => "none",
		}
	}
}

/// A single ranked code in the final response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifyResult {
	pub rank: u32,
	pub code: String,
	pub description: String,
	pub class_desc: String,
	pub division_desc: String,
	pub reason: String,
	pub rrf_score: f64,
}

/// Complete output of one classify call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifyResponse {
	pub query: String,
	pub mode: SearchMode,
	pub top_k_requested: u32,
	pub candidates_retrieved: u32,
	pub results: Vec<ClassifyResult>,
	#[serde(with = "time::serde::rfc3339")]
	pub generated_at: OffsetDateTime,
	pub embed_model: String,
	pub llm_model: String,
}
