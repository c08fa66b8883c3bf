use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use anzsic_config::Settings;
use anzsic_domain::{
	Candidate, CatalogueRecord, Error, SearchMode, SearchRequest,
};
use anzsic_service::{
	BoxFuture, ClassifierPipeline, DatabasePort, EmbeddingPort, HybridRetriever, LlmPort,
	LlmReranker, Result, reranker::CatalogueReference,
};

const DIM: usize = 8;

fn settings(overrides: &[(&str, &str)]) -> Settings {
	let pairs: Vec<(String, String)> =
		overrides.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();

	Settings::from_lookup(move |key| {
		pairs.iter().find(|(candidate, _)| candidate == key).map(|(_, value)| value.clone())
	})
	.expect("Test settings must validate.")
}

fn record(code: &str) -> CatalogueRecord {
	CatalogueRecord {
		code: code.to_string(),
		description: format!("Description of {code}"),
		class_desc: format!("Class of {code}"),
		group_desc: format!("Group of {code}"),
		subdivision_desc: String::new(),
		division_desc: format!("Division of {code}"),
		class_exclusions: String::new(),
		enriched_text: String::new(),
	}
}

struct StubEmbedding;
impl EmbeddingPort for StubEmbedding {
	fn model_name(&self) -> &str {
		"stub-embedding"
	}

	fn dimensions(&self) -> u32 {
		DIM as u32
	}

	fn embed_query<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(vec![0.1; DIM]) })
	}

	fn embed_document<'a>(
		&'a self,
		_text: &'a str,
		_title: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(vec![0.1; DIM]) })
	}

	fn embed_documents_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Option<Vec<f32>>>>> {
		Box::pin(async move { Ok(vec![Some(vec![0.1; DIM]); texts.len()]) })
	}
}

struct FailingEmbedding;
impl EmbeddingPort for FailingEmbedding {
	fn model_name(&self) -> &str {
		"failing-embedding"
	}

	fn dimensions(&self) -> u32 {
		DIM as u32
	}

	fn embed_query<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			Err(Error::Embedding { message: "Provider unavailable.".to_string() })
		})
	}

	fn embed_document<'a>(
		&'a self,
		_text: &'a str,
		_title: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			Err(Error::Embedding { message: "Provider unavailable.".to_string() })
		})
	}

	fn embed_documents_batch<'a>(
		&'a self,
		_texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Option<Vec<f32>>>>> {
		Box::pin(async move {
			Err(Error::Embedding { message: "Provider unavailable.".to_string() })
		})
	}
}

#[derive(Default)]
struct ScriptedDatabase {
	vector_hits: Vec<(String, u32)>,
	fts_hits: Vec<(String, u32)>,
	records: HashMap<String, CatalogueRecord>,
	fail_vector: bool,
	fail_fts: bool,
}
impl ScriptedDatabase {
	fn new(
		vector_hits: &[(&str, u32)],
		fts_hits: &[(&str, u32)],
		record_codes: &[&str],
	) -> Self {
		Self {
			vector_hits: vector_hits
				.iter()
				.map(|(code, rank)| (code.to_string(), *rank))
				.collect(),
			fts_hits: fts_hits.iter().map(|(code, rank)| (code.to_string(), *rank)).collect(),
			records: record_codes
				.iter()
				.map(|code| (code.to_string(), record(code)))
				.collect(),
			..Self::default()
		}
	}
}
impl DatabasePort for ScriptedDatabase {
	fn vector_search<'a>(
		&'a self,
		_embedding: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<(String, u32)>>> {
		Box::pin(async move {
			if self.fail_vector {
				return Err(Error::Database { message: "Vector index offline.".to_string() });
			}

			Ok(self.vector_hits.iter().take(limit as usize).cloned().collect())
		})
	}

	fn fts_search<'a>(
		&'a self,
		_query_text: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<(String, u32)>>> {
		Box::pin(async move {
			if self.fail_fts {
				return Err(Error::Database { message: "FTS index offline.".to_string() });
			}

			Ok(self.fts_hits.iter().take(limit as usize).cloned().collect())
		})
	}

	fn fetch_by_codes<'a>(
		&'a self,
		codes: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, CatalogueRecord>>> {
		Box::pin(async move {
			Ok(codes
				.iter()
				.filter_map(|code| self.records.get(code).map(|r| (code.clone(), r.clone())))
				.collect())
		})
	}

	fn healthcheck<'a>(&'a self) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(true) })
	}
}

struct ScriptedLlm {
	responses: Mutex<VecDeque<Result<String>>>,
	calls: Arc<AtomicUsize>,
}
impl ScriptedLlm {
	fn new(responses: Vec<Result<String>>) -> Self {
		Self {
			responses: Mutex::new(responses.into_iter().collect()),
			calls: Arc::new(AtomicUsize::new(0)),
		}
	}
}
impl LlmPort for ScriptedLlm {
	fn model_name(&self) -> &str {
		"scripted-llm"
	}

	fn generate_json<'a>(
		&'a self,
		system_prompt: &'a str,
		_user_message: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		assert!(system_prompt.contains("JSON"), "System prompt must carry the JSON token.");

		let next = self
			.responses
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.pop_front()
			.expect("Unexpected LLM call.");

		Box::pin(async move { next })
	}
}

struct PipelineUnderTest {
	pipeline: ClassifierPipeline,
	llm_calls: Arc<AtomicUsize>,
}

fn build(
	db: ScriptedDatabase,
	llm: ScriptedLlm,
	reference: CatalogueReference,
	overrides: &[(&str, &str)],
) -> PipelineUnderTest {
	let cfg = settings(overrides);
	let llm_calls = llm.calls.clone();
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(StubEmbedding), &cfg);
	let reranker = LlmReranker::with_reference(Arc::new(llm), reference);

	PipelineUnderTest { pipeline: ClassifierPipeline::new(retriever, reranker), llm_calls }
}

fn assert_candidate_invariants(candidate: &Candidate) {
	assert!(candidate.in_vector || candidate.in_fts, "Candidate must come from a search.");
	assert_eq!(candidate.in_vector, candidate.vector_rank.is_some());
	assert_eq!(candidate.in_fts, candidate.fts_rank.is_some());
}

#[tokio::test]
async fn retrieval_orders_by_cross_system_agreement() {
	let db = ScriptedDatabase::new(
		&[("A", 1), ("B", 2), ("C", 3)],
		&[("A", 1), ("D", 2), ("B", 3)],
		&["A", "B", "C", "D"],
	);
	let cfg = settings(&[]);
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(StubEmbedding), &cfg);
	let candidates =
		retriever.retrieve("mobile mechanic", 20).await.expect("Retrieval must succeed.");
	let order: Vec<&str> = candidates.iter().map(|c| c.code.as_str()).collect();

	assert_eq!(order, vec!["A", "B", "D", "C"]);
	assert_eq!(candidates[0].rrf_score, 0.032787);
	assert!(candidates[0].in_vector && candidates[0].in_fts);
	assert_eq!(candidates[0].vector_rank, Some(1));
	assert_eq!(candidates[0].fts_rank, Some(1));

	for candidate in &candidates {
		assert_candidate_invariants(candidate);
	}
}

#[tokio::test]
async fn single_code_in_both_searches_fuses_once() {
	let db = ScriptedDatabase::new(&[("A", 1)], &[("A", 1)], &["A"]);
	let cfg = settings(&[]);
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(StubEmbedding), &cfg);
	let candidates = retriever.retrieve("solo", 20).await.expect("Retrieval must succeed.");

	assert_eq!(candidates.len(), 1);
	assert_eq!(candidates[0].source_label(), "both");
	assert_eq!(candidates[0].rrf_score, 0.032787);
}

#[tokio::test]
async fn fast_mode_skips_the_llm() {
	let db = ScriptedDatabase::new(
		&[("X", 1), ("Y", 2), ("Z", 3)],
		&[],
		&["X", "Y", "Z"],
	);
	let under_test = build(db, ScriptedLlm::new(vec![]), CatalogueReference::empty(), &[]);
	let request = SearchRequest::new("barista", SearchMode::Fast, 2, 20)
		.expect("Request must validate.");
	let response =
		under_test.pipeline.classify(&request).await.expect("Classify must succeed.");

	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 0);
	assert_eq!(response.results.len(), 2);
	assert_eq!(response.results[0].code, "X");
	assert_eq!(response.results[0].rank, 1);
	assert_eq!(response.results[1].rank, 2);
	assert!(response.results[0].reason.starts_with("RRF score "));
	assert!(response.results[0].reason.contains("sources: vector"));
	assert_eq!(response.llm_model, "");
	assert_eq!(response.embed_model, "stub-embedding");
	assert_eq!(response.candidates_retrieved, 3);
	assert_eq!(response.top_k_requested, 2);
	assert_eq!(response.mode, SearchMode::Fast);
}

#[tokio::test]
async fn fast_mode_with_empty_pool_returns_empty() {
	let db = ScriptedDatabase::new(&[], &[], &[]);
	let under_test = build(db, ScriptedLlm::new(vec![]), CatalogueReference::empty(), &[]);
	let request = SearchRequest::new("gibberish", SearchMode::Fast, 5, 20)
		.expect("Request must validate.");
	let response =
		under_test.pipeline.classify(&request).await.expect("Classify must succeed.");

	assert!(response.results.is_empty());
	assert_eq!(response.candidates_retrieved, 0);
	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn high_fidelity_happy_path_uses_model_ranking() {
	let db = ScriptedDatabase::new(
		&[("X", 1), ("Y", 2), ("Z", 3)],
		&[("Y", 1)],
		&["X", "Y", "Z"],
	);
	let llm = ScriptedLlm::new(vec![Ok(
		r#"[{"rank":1,"code":"Y","reason":"exact domain match"},{"rank":2,"code":"X","reason":"adjacent"}]"#
			.to_string(),
	)]);
	let under_test = build(db, llm, CatalogueReference::empty(), &[]);
	let request = SearchRequest::with_defaults("mobile mechanic").expect("Request must validate.");
	let response =
		under_test.pipeline.classify(&request).await.expect("Classify must succeed.");

	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 1);
	assert_eq!(response.results.len(), 2);
	assert_eq!(response.results[0].code, "Y");
	assert_eq!(response.results[0].reason, "exact domain match");
	assert_eq!(response.results[0].description, "Description of Y");
	assert_eq!(response.results[1].code, "X");
	assert_eq!(response.results[1].reason, "adjacent");
	assert_eq!(response.llm_model, "scripted-llm");
	assert!(response.results.len() <= request.top_k() as usize);
}

#[tokio::test]
async fn high_fidelity_with_empty_pool_never_calls_the_llm() {
	let db = ScriptedDatabase::new(&[], &[], &[]);
	let under_test = build(db, ScriptedLlm::new(vec![]), CatalogueReference::empty(), &[]);
	let request = SearchRequest::with_defaults("gibberish").expect("Request must validate.");
	let response =
		under_test.pipeline.classify(&request).await.expect("Classify must succeed.");

	assert!(response.results.is_empty());
	assert_eq!(response.llm_model, "");
	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_first_response_triggers_catalogue_fallback() {
	let db = ScriptedDatabase::new(&[("X", 1)], &[], &["X"]);
	let llm = ScriptedLlm::new(vec![
		Ok("[]".to_string()),
		Ok(r#"[{"rank":1,"code":"Q1234_01","reason":"CSV hit"}]"#.to_string()),
	]);
	let reference = CatalogueReference::from_entries([("Q1234_01", "Quarrying")]);
	let under_test = build(db, llm, reference, &[]);
	let request = SearchRequest::with_defaults("quarry operator").expect("Request must validate.");
	let response =
		under_test.pipeline.classify(&request).await.expect("Classify must succeed.");

	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 2);
	assert_eq!(response.results.len(), 1);
	assert_eq!(response.results[0].code, "Q1234_01");
	assert_eq!(response.results[0].rank, 1);
	assert_eq!(response.results[0].description, "Quarrying");
	assert_eq!(response.results[0].rrf_score, 0.0);
}

#[tokio::test]
async fn empty_after_fallback_is_a_valid_outcome() {
	let db = ScriptedDatabase::new(&[("X", 1)], &[], &["X"]);
	let llm = ScriptedLlm::new(vec![Ok("[]".to_string()), Ok("[]".to_string())]);
	let reference = CatalogueReference::from_entries([("Q1234_01", "Quarrying")]);
	let under_test = build(db, llm, reference, &[]);
	let request = SearchRequest::with_defaults("quarry operator").expect("Request must validate.");
	let response =
		under_test.pipeline.classify(&request).await.expect("Classify must succeed.");

	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 2);
	assert!(response.results.is_empty());
}

#[tokio::test]
async fn no_fallback_without_a_loaded_reference() {
	let db = ScriptedDatabase::new(&[("X", 1)], &[], &["X"]);
	let llm = ScriptedLlm::new(vec![Ok("[]".to_string())]);
	let under_test = build(db, llm, CatalogueReference::empty(), &[]);
	let request = SearchRequest::with_defaults("quarry operator").expect("Request must validate.");
	let response =
		under_test.pipeline.classify(&request).await.expect("Classify must succeed.");

	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 1);
	assert!(response.results.is_empty());
}

#[tokio::test]
async fn llm_transport_failure_propagates_without_fallback() {
	let db = ScriptedDatabase::new(&[("X", 1)], &[], &["X"]);
	let llm = ScriptedLlm::new(vec![Err(Error::Llm {
		message: "HTTP 500 after retries.".to_string(),
	})]);
	let under_test = build(db, llm, CatalogueReference::from_entries([("Q", "Q desc")]), &[]);
	let request = SearchRequest::with_defaults("mobile mechanic").expect("Request must validate.");
	let result = under_test.pipeline.classify(&request).await;

	assert!(matches!(result, Err(Error::Llm { .. })));
	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn one_failed_search_is_a_retrieval_error_by_default() {
	let mut db = ScriptedDatabase::new(&[("A", 1)], &[("A", 1), ("B", 2)], &["A", "B"]);

	db.fail_vector = true;

	let under_test = build(db, ScriptedLlm::new(vec![]), CatalogueReference::empty(), &[]);
	let request = SearchRequest::with_defaults("mobile mechanic").expect("Request must validate.");
	let result = under_test.pipeline.classify(&request).await;

	assert!(matches!(result, Err(Error::Retrieval { .. })));
	assert_eq!(under_test.llm_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn degraded_retrieval_opt_in_continues_with_surviving_stream() {
	let mut db = ScriptedDatabase::new(&[("A", 1), ("B", 2)], &[], &["A", "B"]);

	db.fail_fts = true;

	let cfg = settings(&[("ALLOW_DEGRADED_RETRIEVAL", "true")]);
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(StubEmbedding), &cfg);
	let candidates =
		retriever.retrieve("mobile mechanic", 20).await.expect("Degraded retrieval must succeed.");

	assert_eq!(candidates.len(), 2);
	assert!(candidates.iter().all(|c| c.in_vector && !c.in_fts));
}

#[tokio::test]
async fn both_searches_failing_is_a_database_error() {
	let mut db = ScriptedDatabase::new(&[("A", 1)], &[("A", 1)], &["A"]);

	db.fail_vector = true;
	db.fail_fts = true;

	let cfg = settings(&[]);
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(StubEmbedding), &cfg);
	let result = retriever.retrieve("mobile mechanic", 20).await;

	assert!(matches!(result, Err(Error::Database { .. })));
}

#[tokio::test]
async fn embedding_failure_aborts_retrieval() {
	let db = ScriptedDatabase::new(&[("A", 1)], &[], &["A"]);
	let cfg = settings(&[]);
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(FailingEmbedding), &cfg);
	let result = retriever.retrieve("mobile mechanic", 20).await;

	assert!(matches!(result, Err(Error::Embedding { .. })));
}

#[tokio::test]
async fn codes_missing_from_hydration_are_skipped() {
	// C fused but absent from the record store.
	let db = ScriptedDatabase::new(&[("A", 1), ("C", 2)], &[("A", 1)], &["A"]);
	let cfg = settings(&[]);
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(StubEmbedding), &cfg);
	let candidates =
		retriever.retrieve("mobile mechanic", 20).await.expect("Retrieval must succeed.");

	assert_eq!(candidates.len(), 1);
	assert_eq!(candidates[0].code, "A");
}

#[tokio::test]
async fn hydration_returning_nothing_is_a_retrieval_error() {
	let db = ScriptedDatabase::new(&[("A", 1), ("B", 2)], &[], &[]);
	let cfg = settings(&[]);
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(StubEmbedding), &cfg);
	let result = retriever.retrieve("mobile mechanic", 20).await;

	assert!(matches!(result, Err(Error::Retrieval { .. })));
}

#[tokio::test]
async fn pool_size_truncates_the_fused_list() {
	let vector: Vec<(String, u32)> =
		(0..30).map(|i| (format!("C{i:02}"), i + 1)).collect();
	let vector_refs: Vec<(&str, u32)> =
		vector.iter().map(|(code, rank)| (code.as_str(), *rank)).collect();
	let codes: Vec<&str> = vector.iter().map(|(code, _)| code.as_str()).collect();
	let db = ScriptedDatabase::new(&vector_refs, &[], &codes);
	let cfg = settings(&[]);
	let retriever = HybridRetriever::new(Arc::new(db), Arc::new(StubEmbedding), &cfg);
	let candidates =
		retriever.retrieve("many codes", 5).await.expect("Retrieval must succeed.");

	assert_eq!(candidates.len(), 5);
	assert_eq!(candidates[0].code, "C00");
}

#[tokio::test]
async fn results_never_exceed_top_k() {
	let db = ScriptedDatabase::new(
		&[("A", 1), ("B", 2), ("C", 3)],
		&[],
		&["A", "B", "C"],
	);
	// Model over-delivers five entries for top_k = 1.
	let llm = ScriptedLlm::new(vec![Ok(
		r#"[{"rank":1,"code":"A"},{"rank":2,"code":"B"},{"rank":3,"code":"C"},{"rank":4,"code":"A"},{"rank":5,"code":"B"}]"#
			.to_string(),
	)]);
	let under_test = build(db, llm, CatalogueReference::empty(), &[]);
	let request = SearchRequest::new("nurse", SearchMode::HighFidelity, 1, 20)
		.expect("Request must validate.");
	let response =
		under_test.pipeline.classify(&request).await.expect("Classify must succeed.");

	assert_eq!(response.results.len(), 1);
	assert_eq!(response.results[0].rank, 1);
}
