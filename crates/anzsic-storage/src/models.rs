use anzsic_domain::CatalogueRecord;

/// Raw catalogue row. Text columns are nullable in externally ingested tables,
/// so everything lands as `Option` and is normalized on conversion.
#[derive(Debug, sqlx::FromRow)]
pub struct CatalogueRow {
	pub code: String,
	pub description: Option<String>,
	pub class_desc: Option<String>,
	pub group_desc: Option<String>,
	pub subdivision_desc: Option<String>,
	pub division_desc: Option<String>,
	pub class_exclusions: Option<String>,
	pub enriched_text: Option<String>,
}
impl From<CatalogueRow> for CatalogueRecord {
	fn from(row: CatalogueRow) -> Self {
		Self {
			code: row.code,
			description: row.description.unwrap_or_default(),
			class_desc: row.class_desc.unwrap_or_default(),
			group_desc: row.group_desc.unwrap_or_default(),
			subdivision_desc: row.subdivision_desc.unwrap_or_default(),
			division_desc: row.division_desc.unwrap_or_default(),
			class_exclusions: row.class_exclusions.unwrap_or_default(),
			enriched_text: row.enriched_text.unwrap_or_default(),
		}
	}
}
