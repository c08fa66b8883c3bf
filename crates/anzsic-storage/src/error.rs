#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}
impl Error {
	/// Whether the failure looks like a broken connection rather than a bad
	/// query; callers may retry such failures once on a fresh connection.
	pub fn is_transport(&self) -> bool {
		match self {
			Self::Sqlx(err) => matches!(
				err,
				sqlx::Error::Io(_)
					| sqlx::Error::PoolTimedOut
					| sqlx::Error::PoolClosed
					| sqlx::Error::WorkerCrashed
			),
			Self::InvalidArgument(_) => false,
		}
	}
}
