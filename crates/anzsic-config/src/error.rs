pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid value for {key}: {message}")]
	Parse { key: &'static str, message: String },
	#[error("{message}")]
	Validation { message: String },
}
