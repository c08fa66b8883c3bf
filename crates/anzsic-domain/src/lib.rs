mod error;
mod models;

pub use error::{Error, Result};
pub use models::{
	Candidate, CatalogueRecord, ClassifyResponse, ClassifyResult, SearchMode, SearchRequest,
};
