mod error;

use std::{env, path::PathBuf};

pub use error::{Error, Result};

/// Immutable process-wide settings resolved from environment variables.
///
/// Load once at startup via [`Settings::load`] and share by reference; no
/// field is mutated after construction.
#[derive(Clone, Debug)]
pub struct Settings {
	// Datastore
	pub db_dsn: String,
	pub db_pool_max_conns: u32,
	// GCP provider family
	pub gcp_project_id: String,
	pub gcp_location_id: String,
	pub gcp_embed_model: String,
	pub gcp_gemini_model: String,
	pub gcloud_path: String,
	/// Corporate HTTPS proxy host:port. `None` means a direct connection.
	pub https_proxy: Option<String>,
	// Retrieval pipeline
	pub rrf_k: u32,
	pub retrieval_n: u32,
	pub top_k: u32,
	pub embed_dim: u32,
	pub embed_batch_size: usize,
	/// When one Stage-1 search fails while the other succeeds, continue with
	/// the surviving list instead of failing the call. Off by default: a
	/// single-stream pool silently loses the cross-system agreement signal
	/// that RRF ranks on.
	pub allow_degraded_retrieval: bool,
	// Retries and timeouts
	pub embed_retries: u32,
	pub llm_retries: u32,
	pub db_retries: u32,
	pub embed_timeout_ms: u64,
	pub llm_timeout_ms: u64,
	pub db_timeout_ms: u64,
	// Data paths
	pub master_csv_path: PathBuf,
}

impl Settings {
	/// Reads settings from the process environment, honoring a `.env` file in
	/// the working directory when present.
	pub fn load() -> Result<Self> {
		let _ = dotenvy::dotenv();

		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Builds settings through an arbitrary lookup. Tests use this with a map
	/// instead of mutating the process environment.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let cfg = Self {
			db_dsn: string(&lookup, "DB_DSN", "postgres://localhost/anzsic_db"),
			db_pool_max_conns: parse(&lookup, "DB_POOL_MAX_CONNS", 5)?,
			gcp_project_id: string(&lookup, "GCP_PROJECT_ID", ""),
			gcp_location_id: string(&lookup, "GCP_LOCATION_ID", "australia-southeast1"),
			gcp_embed_model: string(&lookup, "GCP_EMBED_MODEL", "text-embedding-005"),
			gcp_gemini_model: string(&lookup, "GCP_GEMINI_MODEL", "gemini-2.5-flash"),
			gcloud_path: string(&lookup, "GCLOUD_PATH", "gcloud"),
			https_proxy: optional(&lookup, "HTTPS_PROXY"),
			rrf_k: parse(&lookup, "RRF_K", 60)?,
			retrieval_n: parse(&lookup, "RETRIEVAL_N", 20)?,
			top_k: parse(&lookup, "TOP_K", 5)?,
			embed_dim: parse(&lookup, "EMBED_DIM", 768)?,
			embed_batch_size: parse(&lookup, "EMBED_BATCH_SIZE", 50)?,
			allow_degraded_retrieval: parse_bool(&lookup, "ALLOW_DEGRADED_RETRIEVAL", false)?,
			embed_retries: parse(&lookup, "EMBED_RETRIES", 3)?,
			llm_retries: parse(&lookup, "LLM_RETRIES", 3)?,
			db_retries: parse(&lookup, "DB_RETRIES", 3)?,
			embed_timeout_ms: parse(&lookup, "EMBED_TIMEOUT_MS", 5_000)?,
			llm_timeout_ms: parse(&lookup, "LLM_TIMEOUT_MS", 30_000)?,
			db_timeout_ms: parse(&lookup, "DB_TIMEOUT_MS", 5_000)?,
			master_csv_path: PathBuf::from(string(
				&lookup,
				"MASTER_CSV_PATH",
				"anzsic_master.csv",
			)),
		};

		validate(&cfg)?;

		Ok(cfg)
	}
}

pub fn validate(cfg: &Settings) -> Result<()> {
	if cfg.db_dsn.trim().is_empty() {
		return Err(validation("DB_DSN must be non-empty."));
	}
	if cfg.db_pool_max_conns == 0 {
		return Err(validation("DB_POOL_MAX_CONNS must be greater than zero."));
	}
	if cfg.gcp_embed_model.trim().is_empty() {
		return Err(validation("GCP_EMBED_MODEL must be non-empty."));
	}
	if cfg.gcp_gemini_model.trim().is_empty() {
		return Err(validation("GCP_GEMINI_MODEL must be non-empty."));
	}
	if cfg.gcloud_path.trim().is_empty() {
		return Err(validation("GCLOUD_PATH must be non-empty."));
	}
	if cfg.rrf_k == 0 {
		return Err(validation("RRF_K must be greater than zero."));
	}
	if cfg.embed_dim == 0 {
		return Err(validation("EMBED_DIM must be greater than zero."));
	}
	if cfg.embed_batch_size == 0 {
		return Err(validation("EMBED_BATCH_SIZE must be greater than zero."));
	}
	if cfg.top_k < 1 || cfg.top_k > 20 {
		return Err(validation("TOP_K must be between 1 and 20."));
	}
	if cfg.retrieval_n < 5 || cfg.retrieval_n > 100 {
		return Err(validation("RETRIEVAL_N must be between 5 and 100."));
	}
	if cfg.retrieval_n < cfg.top_k {
		return Err(validation("RETRIEVAL_N must be greater than or equal to TOP_K."));
	}

	for (label, value) in [
		("EMBED_RETRIES", cfg.embed_retries),
		("LLM_RETRIES", cfg.llm_retries),
		("DB_RETRIES", cfg.db_retries),
	] {
		if value == 0 {
			return Err(validation(&format!("{label} must be greater than zero.")));
		}
	}
	for (label, value) in [
		("EMBED_TIMEOUT_MS", cfg.embed_timeout_ms),
		("LLM_TIMEOUT_MS", cfg.llm_timeout_ms),
		("DB_TIMEOUT_MS", cfg.db_timeout_ms),
	] {
		if value == 0 {
			return Err(validation(&format!("{label} must be greater than zero.")));
		}
	}

	Ok(())
}

fn validation(message: &str) -> Error {
	Error::Validation { message: message.to_string() }
}

fn string<F>(lookup: &F, key: &'static str, default: &str) -> String
where
	F: Fn(&str) -> Option<String>,
{
	lookup(key).unwrap_or_else(|| default.to_string())
}

fn optional<F>(lookup: &F, key: &'static str) -> Option<String>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T>
where
	F: Fn(&str) -> Option<String>,
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	let Some(raw) = lookup(key) else {
		return Ok(default);
	};

	raw.trim().parse().map_err(|err: T::Err| Error::Parse { key, message: err.to_string() })
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool>
where
	F: Fn(&str) -> Option<String>,
{
	let Some(raw) = lookup(key) else {
		return Ok(default);
	};

	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		other => Err(Error::Parse { key, message: format!("Unrecognized boolean '{other}'.") }),
	}
}
