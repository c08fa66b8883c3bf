use std::collections::HashMap;

use sqlx::PgExecutor;

use crate::{Error, Result, models::CatalogueRow};
use anzsic_domain::CatalogueRecord;

/// Approximate nearest-neighbour search over the stored embeddings.
///
/// Returns `(code, rank)` pairs ordered by cosine distance ascending, rank
/// starting at 1.
pub async fn vector_search<'e, E>(
	executor: E,
	embedding: &[f32],
	limit: u32,
) -> Result<Vec<(String, u32)>>
where
	E: PgExecutor<'e>,
{
	if embedding.is_empty() {
		return Err(Error::InvalidArgument("Query embedding must be non-empty.".to_string()));
	}

	let vec_text = vector_to_pg(embedding);
	let rows: Vec<(String, i64)> = sqlx::query_as(
		"\
SELECT
	code,
	ROW_NUMBER() OVER (ORDER BY embedding <=> $1::text::vector) AS rank
FROM anzsic_codes
WHERE embedding IS NOT NULL
ORDER BY embedding <=> $1::text::vector
LIMIT $2",
	)
	.bind(vec_text.as_str())
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows.into_iter().map(|(code, rank)| (code, rank as u32)).collect())
}

/// Full-text search over the GIN-indexed tsvector column.
///
/// Returns `(code, rank)` pairs ordered by relevance descending, rank starting
/// at 1. Colloquial queries often match nothing; an empty list is normal.
pub async fn fts_search<'e, E>(
	executor: E,
	query_text: &str,
	limit: u32,
) -> Result<Vec<(String, u32)>>
where
	E: PgExecutor<'e>,
{
	let rows: Vec<(String, i64)> = sqlx::query_as(
		"\
SELECT
	code,
	ROW_NUMBER() OVER (ORDER BY ts_rank_cd(fts_vector, query) DESC) AS rank
FROM anzsic_codes, plainto_tsquery('english', $1) AS query
WHERE fts_vector @@ query
ORDER BY ts_rank_cd(fts_vector, query) DESC
LIMIT $2",
	)
	.bind(query_text)
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows.into_iter().map(|(code, rank)| (code, rank as u32)).collect())
}

/// Bulk record hydration by primary key. Codes missing from the catalogue are
/// absent from the returned map; the caller decides whether that is fatal.
pub async fn fetch_by_codes<'e, E>(
	executor: E,
	codes: &[String],
) -> Result<HashMap<String, CatalogueRecord>>
where
	E: PgExecutor<'e>,
{
	if codes.is_empty() {
		return Ok(HashMap::new());
	}

	let rows: Vec<CatalogueRow> = sqlx::query_as(
		"\
SELECT
	code,
	description,
	class_desc,
	group_desc,
	subdivision_desc,
	division_desc,
	class_exclusions,
	enriched_text
FROM anzsic_codes
WHERE code = ANY($1)",
	)
	.bind(codes)
	.fetch_all(executor)
	.await?;

	Ok(rows
		.into_iter()
		.map(|row| {
			let record = CatalogueRecord::from(row);

			(record.code.clone(), record)
		})
		.collect())
}

pub async fn healthcheck<'e, E>(executor: E) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(executor).await?;

	Ok(one == 1)
}

/// Renders an embedding as pgvector's bracketed text form so it can be bound
/// as text and cast with `::vector` in SQL.
pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}
