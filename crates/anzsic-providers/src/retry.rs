use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time;

use crate::{Error, Result, auth::TokenManager};

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const BACKOFF_MULTIPLIER: u32 = 2;
const ERROR_BODY_MAX: usize = 300;

/// POSTs a JSON payload with a bearer token and returns the response body as
/// JSON.
///
/// Retry behavior:
/// - network failures, 429 and 5xx back off exponentially until the attempts
///   run out;
/// - 401 invalidates the cached token and retries at most once, then fails as
///   an authentication error;
/// - any other non-2xx status fails immediately.
pub(crate) async fn post_json_with_retry(
	http: &Client,
	url: &str,
	auth: &TokenManager,
	payload: &Value,
	attempts: u32,
) -> Result<Value> {
	let mut delay = INITIAL_BACKOFF;
	let mut refreshed_once = false;
	let mut last_error: Option<Error> = None;

	for attempt in 1..=attempts {
		let token = auth.token().await?;
		let response = match http.post(url).bearer_auth(&token).json(payload).send().await {
			Ok(response) => response,
			Err(err) => {
				tracing::warn!(
					attempt,
					attempts,
					error = %err,
					"HTTP request failed; backing off."
				);

				last_error = Some(err.into());

				if attempt < attempts {
					time::sleep(delay).await;

					delay *= BACKOFF_MULTIPLIER;
				}

				continue;
			},
		};
		let status = response.status();

		if status == StatusCode::UNAUTHORIZED {
			if refreshed_once {
				return Err(Error::Authentication {
					message: "Request rejected with 401 after a token refresh.".to_string(),
				});
			}

			tracing::warn!("Received 401; invalidating cached token and retrying.");
			auth.invalidate().await;

			refreshed_once = true;

			continue;
		}

		if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
			tracing::warn!(
				attempt,
				attempts,
				status = status.as_u16(),
				"Transient HTTP status; backing off."
			);

			last_error = Some(Error::Status {
				status: status.as_u16(),
				body: truncated_body(response).await,
			});

			if attempt < attempts {
				time::sleep(delay).await;

				delay *= BACKOFF_MULTIPLIER;
			}

			continue;
		}

		if !status.is_success() {
			return Err(Error::Status {
				status: status.as_u16(),
				body: truncated_body(response).await,
			});
		}

		return Ok(response.json().await?);
	}

	Err(Error::Exhausted {
		message: format!(
			"Request failed after {attempts} attempts: {}.",
			last_error.map(|err| err.to_string()).unwrap_or_else(|| "no response".to_string())
		),
	})
}

async fn truncated_body(response: reqwest::Response) -> String {
	let mut body = response.text().await.unwrap_or_default();

	if body.len() > ERROR_BODY_MAX {
		let mut end = ERROR_BODY_MAX;

		while !body.is_char_boundary(end) {
			end -= 1;
		}

		body.truncate(end);
	}

	body
}
