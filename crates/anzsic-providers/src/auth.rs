use std::time::{Duration, Instant};

use tokio::{process::Command, sync::Mutex, time};

use crate::{Error, Result};

/// Refresh this long before the token would expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(120);
/// GCP access tokens live for 3600 seconds; assumed conservatively rather
/// than parsed from the response.
const TOKEN_TTL: Duration = Duration::from_secs(3_600);
const GCLOUD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
struct TokenState {
	value: String,
	expires_at: Option<Instant>,
}
impl TokenState {
	fn needs_refresh(&self) -> bool {
		let Some(expires_at) = self.expires_at else {
			return true;
		};

		self.value.is_empty() || expires_at <= Instant::now() + TOKEN_REFRESH_MARGIN
	}
}

/// Caches one GCP access token for the whole provider family.
///
/// The state sits behind an async mutex held across the refresh, so concurrent
/// callers observe at most one in-flight `gcloud` invocation; late arrivals
/// re-check expiry under the lock and reuse the fresh token.
pub struct TokenManager {
	gcloud_path: String,
	state: Mutex<TokenState>,
}
impl TokenManager {
	pub fn new(gcloud_path: &str) -> Self {
		Self { gcloud_path: gcloud_path.to_string(), state: Mutex::new(TokenState::default()) }
	}

	/// Returns a valid access token, refreshing when the cached one is absent
	/// or within the refresh margin of expiry.
	pub async fn token(&self) -> Result<String> {
		let mut state = self.state.lock().await;

		if state.needs_refresh() {
			tracing::info!("Refreshing GCP access token.");

			state.value = self.fetch_token().await?;
			state.expires_at = Some(Instant::now() + TOKEN_TTL);
		}

		Ok(state.value.clone())
	}

	/// Forces the next `token()` call to fetch a fresh token. Called by
	/// adapters when a request comes back 401.
	pub async fn invalidate(&self) {
		let mut state = self.state.lock().await;

		state.expires_at = None;

		tracing::debug!("GCP access token invalidated.");
	}

	async fn fetch_token(&self) -> Result<String> {
		let output = time::timeout(
			GCLOUD_TIMEOUT,
			Command::new(&self.gcloud_path).args(["auth", "print-access-token"]).output(),
		)
		.await
		.map_err(|_| Error::Authentication {
			message: "gcloud timed out fetching an access token.".to_string(),
		})?
		.map_err(|err| Error::Authentication {
			message: format!("Failed to run '{}': {err}.", self.gcloud_path),
		})?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);

			return Err(Error::Authentication {
				message: format!(
					"gcloud auth print-access-token failed: {}.",
					stderr.trim()
				),
			});
		}

		let token = String::from_utf8_lossy(&output.stdout).trim().to_string();

		if token.is_empty() {
			return Err(Error::Authentication {
				message: "gcloud returned an empty access token.".to_string(),
			});
		}

		Ok(token)
	}
}
