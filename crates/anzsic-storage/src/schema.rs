const SCHEMA: &str = "\
CREATE EXTENSION IF NOT EXISTS vector;

CREATE TABLE IF NOT EXISTS anzsic_codes (
	code TEXT PRIMARY KEY,
	description TEXT NOT NULL DEFAULT '',
	class_code TEXT NOT NULL DEFAULT '',
	class_desc TEXT NOT NULL DEFAULT '',
	group_code TEXT NOT NULL DEFAULT '',
	group_desc TEXT NOT NULL DEFAULT '',
	subdivision_desc TEXT NOT NULL DEFAULT '',
	division_desc TEXT NOT NULL DEFAULT '',
	class_exclusions TEXT NOT NULL DEFAULT '',
	enriched_text TEXT NOT NULL DEFAULT '',
	embedding vector(<VECTOR_DIM>),
	fts_vector tsvector GENERATED ALWAYS AS (
		to_tsvector('english', coalesce(enriched_text, '') || ' ' || coalesce(description, ''))
	) STORED
);

CREATE INDEX IF NOT EXISTS anzsic_codes_embedding_hnsw
	ON anzsic_codes USING hnsw (embedding vector_cosine_ops);

CREATE INDEX IF NOT EXISTS anzsic_codes_fts_gin
	ON anzsic_codes USING gin (fts_vector)";

pub fn render_schema(vector_dim: u32) -> String {
	SCHEMA.replace("<VECTOR_DIM>", &vector_dim.to_string())
}
