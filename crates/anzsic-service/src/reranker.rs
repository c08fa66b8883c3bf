use std::{collections::HashMap, path::Path, sync::Arc};

use serde_json::Value;

use anzsic_domain::{Candidate, ClassifyResult, Error};

use crate::{LlmPort, Result, prompts};

/// Stage 2: LLM re-ranking.
///
/// First attempt sends the compact candidate-only prompt. If the model comes
/// back with a syntactically valid but empty list, one fallback attempt
/// re-sends the prompt with the full catalogue reference appended, letting
/// the model pick any catalogue code. Transport and parse failures never
/// trigger the fallback.
pub struct LlmReranker {
	llm: Arc<dyn LlmPort>,
	reference: CatalogueReference,
}
impl LlmReranker {
	/// Loads the catalogue reference from `cfg.master_csv_path`. A missing or
	/// unreadable file disables the fallback instead of failing startup.
	pub fn new(llm: Arc<dyn LlmPort>, cfg: &anzsic_config::Settings) -> Self {
		Self::with_reference(llm, CatalogueReference::load(&cfg.master_csv_path))
	}

	pub fn with_reference(llm: Arc<dyn LlmPort>, reference: CatalogueReference) -> Self {
		Self { llm, reference }
	}

	pub fn model_name(&self) -> &str {
		self.llm.model_name()
	}

	/// Returns up to `top_k` results, best match first. Empty output is a
	/// legal business outcome reached only when both attempts rank nothing.
	pub async fn rerank(
		&self,
		query: &str,
		candidates: &[Candidate],
		top_k: u32,
	) -> Result<Vec<ClassifyResult>> {
		if candidates.is_empty() {
			tracing::warn!("Rerank called with no candidates.");

			return Ok(Vec::new());
		}

		let first = self.attempt(query, candidates, top_k, false).await?;

		if !first.is_empty() {
			return Ok(first);
		}
		if self.reference.is_empty() {
			tracing::warn!(
				query,
				"Model ranked no candidates and no catalogue reference is loaded."
			);

			return Ok(Vec::new());
		}

		tracing::warn!(query, "Model ranked no candidates; retrying with the catalogue reference.");

		let second = self.attempt(query, candidates, top_k, true).await?;

		if second.is_empty() {
			// Empty-after-fallback is handed to the caller as a valid outcome.
			tracing::error!(query, "Rerank produced no results after the catalogue fallback.");
		} else {
			tracing::info!(query, "Catalogue fallback produced results.");
		}

		Ok(second)
	}

	async fn attempt(
		&self,
		query: &str,
		candidates: &[Candidate],
		top_k: u32,
		include_reference: bool,
	) -> Result<Vec<ClassifyResult>> {
		let reference = include_reference.then(|| &self.reference);
		let system = prompts::build_system_prompt(reference.map(|r| r.lines()));
		let user = prompts::build_user_message(query, candidates, top_k);
		let raw = self.llm.generate_json(&system, &user).await?;

		parse_response(&raw, candidates, reference, top_k)
	}
}

/// Compact `code: description` listing of the whole catalogue, loaded once at
/// construction and reused across calls.
pub struct CatalogueReference {
	lines: String,
	descriptions: HashMap<String, String>,
}
impl CatalogueReference {
	pub fn empty() -> Self {
		Self { lines: String::new(), descriptions: HashMap::new() }
	}

	/// Reads the master CSV with `anzsic_code` and `anzsic_desc` columns.
	/// Failures are logged and produce an empty reference.
	pub fn load(path: &Path) -> Self {
		match Self::try_load(path) {
			Ok(reference) => {
				tracing::info!(
					path = %path.display(),
					entries = reference.descriptions.len(),
					"Catalogue reference loaded."
				);

				reference
			},
			Err(err) => {
				tracing::warn!(
					path = %path.display(),
					error = %err,
					"Catalogue reference unavailable; rerank fallback disabled."
				);

				Self::empty()
			},
		}
	}

	pub fn from_entries<I, S>(entries: I) -> Self
	where
		I: IntoIterator<Item = (S, S)>,
		S: Into<String>,
	{
		let mut lines = String::new();
		let mut descriptions = HashMap::new();

		for (code, description) in entries {
			let code = code.into();
			let description = description.into();

			if code.is_empty() || description.is_empty() {
				continue;
			}
			if !lines.is_empty() {
				lines.push('\n');
			}

			lines.push_str(&format!("{code}: {description}"));
			descriptions.insert(code, description);
		}

		Self { lines, descriptions }
	}

	pub fn is_empty(&self) -> bool {
		self.descriptions.is_empty()
	}

	pub fn lines(&self) -> &str {
		&self.lines
	}

	pub fn description(&self, code: &str) -> Option<&str> {
		self.descriptions.get(code).map(String::as_str)
	}

	fn try_load(path: &Path) -> std::result::Result<Self, csv::Error> {
		let mut reader = csv::Reader::from_path(path)?;
		let headers = reader.headers()?.clone();
		let code_idx = headers.iter().position(|h| h == "anzsic_code");
		let description_idx = headers.iter().position(|h| h == "anzsic_desc");
		let mut entries = Vec::new();

		for record in reader.records() {
			let record = record?;
			let code = code_idx
				.and_then(|idx| record.get(idx))
				.map(str::trim)
				.unwrap_or_default();
			let description = description_idx
				.and_then(|idx| record.get(idx))
				.map(str::trim)
				.unwrap_or_default();

			if !code.is_empty() && !description.is_empty() {
				entries.push((code.to_string(), description.to_string()));
			}
		}

		Ok(Self::from_entries(entries))
	}
}

struct ParsedEntry {
	rank: u32,
	code: String,
	reason: String,
}

/// Parses the model's JSON into enriched results.
///
/// Accepts a bare array or an object whose first array-valued field holds the
/// entries. Syntactically broken output is an LLM error; well-formed JSON of
/// the wrong shape is a rerank error. Unknown codes are dropped (unless the
/// catalogue reference vouches for them during fallback), duplicates keep the
/// first occurrence, output is truncated to `top_k` and ranks are reassigned
/// contiguously.
fn parse_response(
	raw: &str,
	candidates: &[Candidate],
	reference: Option<&CatalogueReference>,
	top_k: u32,
) -> Result<Vec<ClassifyResult>> {
	let parsed: Value = serde_json::from_str(raw.trim()).map_err(|err| Error::Llm {
		message: format!("Model response is not valid JSON: {err}"),
	})?;
	let items = match parsed {
		Value::Array(items) => items,
		Value::Object(map) => map
			.into_iter()
			.find_map(|(_, value)| match value {
				Value::Array(items) => Some(items),
				_ => None,
			})
			.ok_or_else(|| Error::Rerank {
				message: "Model response object contains no array field.".to_string(),
			})?,
		other => {
			return Err(Error::Rerank {
				message: format!("Model response has unexpected JSON type: {other}"),
			});
		},
	};
	let mut entries: Vec<ParsedEntry> = Vec::with_capacity(items.len());

	for (position, item) in items.into_iter().enumerate() {
		let Some(code) = item.get("code").and_then(Value::as_str).map(str::trim) else {
			tracing::warn!(position, "Skipping entry without a code field.");

			continue;
		};

		if code.is_empty() {
			tracing::warn!(position, "Skipping entry with a blank code.");

			continue;
		}

		let rank = item
			.get("rank")
			.and_then(Value::as_u64)
			.and_then(|rank| u32::try_from(rank).ok())
			.unwrap_or(position as u32 + 1);
		let reason = item
			.get("reason")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.trim()
			.to_string();

		entries.push(ParsedEntry { rank, code: code.to_string(), reason });
	}

	// Keep the first occurrence of each code before imposing rank order.
	let mut seen = std::collections::HashSet::new();

	entries.retain(|entry| seen.insert(entry.code.clone()));
	entries.sort_by_key(|entry| entry.rank);

	let by_code: HashMap<&str, &Candidate> =
		candidates.iter().map(|candidate| (candidate.code.as_str(), candidate)).collect();
	let mut results = Vec::new();

	for entry in entries {
		if results.len() == top_k as usize {
			break;
		}

		if let Some(candidate) = by_code.get(entry.code.as_str()) {
			results.push(ClassifyResult {
				rank: results.len() as u32 + 1,
				code: candidate.code.clone(),
				description: candidate.description.clone(),
				class_desc: candidate.class_desc.clone(),
				division_desc: candidate.division_desc.clone(),
				reason: entry.reason,
				rrf_score: candidate.rrf_score,
			});
		} else if let Some(description) =
			reference.and_then(|reference| reference.description(&entry.code))
		{
			// Fallback-only hit: the model reached outside the Stage-1 pool.
			results.push(ClassifyResult {
				rank: results.len() as u32 + 1,
				code: entry.code,
				description: description.to_string(),
				class_desc: String::new(),
				division_desc: String::new(),
				reason: entry.reason,
				rrf_score: 0.0,
			});
		} else {
			tracing::warn!(code = %entry.code, "Dropping ranked code unknown to this query.");
		}
	}

	Ok(results)
}
