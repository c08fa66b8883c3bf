pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("{message}")]
	Authentication { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("HTTP {status}: {body}")]
	Status { status: u16, body: String },
	#[error("{message}")]
	Exhausted { message: String },
}
impl Error {
	pub fn is_authentication(&self) -> bool {
		matches!(self, Self::Authentication { .. })
	}
}
