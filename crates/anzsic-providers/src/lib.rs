pub mod auth;
pub mod embedding;
pub mod llm;

mod error;
mod retry;

pub use auth::TokenManager;
pub use embedding::VertexEmbeddingClient;
pub use error::{Error, Result};
pub use llm::GeminiClient;

use std::time::Duration;

use reqwest::{Client, Proxy};

pub(crate) fn build_client(timeout_ms: u64, https_proxy: Option<&str>) -> Result<Client> {
	let mut builder = Client::builder().timeout(Duration::from_millis(timeout_ms));

	if let Some(proxy) = https_proxy {
		builder = builder.proxy(Proxy::https(format!("http://{proxy}"))?);
	}

	Ok(builder.build()?)
}
