use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &anzsic_config::Settings) -> Result<Self> {
		let pool = PgPoolOptions::new()
			.max_connections(cfg.db_pool_max_conns)
			.acquire_timeout(Duration::from_millis(cfg.db_timeout_ms))
			.connect(&cfg.db_dsn)
			.await?;

		Ok(Self { pool })
	}

	/// Creates the catalogue table and its indexes if they do not exist.
	///
	/// Ingestion happens offline; the pipeline only ever reads. This exists so
	/// integration tests and dev environments can self-provision.
	pub async fn ensure_schema(&self, vector_dim: u32) -> Result<()> {
		let sql = schema::render_schema(vector_dim);
		let mut tx = self.pool.begin().await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
