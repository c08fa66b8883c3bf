pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy shared by every layer of the pipeline.
///
/// Adapters raise the matching leaf variant; services propagate without
/// wrapping. Interface shells are expected to map variants onto exit codes or
/// HTTP statuses at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error("Authentication error: {message}")]
	Authentication { message: String },
	#[error("Embedding provider error: {message}")]
	Embedding { message: String },
	#[error("LLM provider error: {message}")]
	Llm { message: String },
	#[error("Database error: {message}")]
	Database { message: String },
	#[error("Retrieval failed: {message}")]
	Retrieval { message: String },
	#[error("Rerank failed: {message}")]
	Rerank { message: String },
	#[error("Cancelled: {message}")]
	Cancelled { message: String },
}
