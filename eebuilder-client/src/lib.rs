//! EE Builder HTTP Client
//!
//! A simple, type-safe HTTP client for the EE Builder orchestrator API.
//!
//! # Example
//!
//! ```no_run
//! use eebuilder_client::BuilderClient;
//! use eebuilder_core::dto::build::BuildRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BuilderClient::new("http://localhost:8000");
//!
//!     let build = client.submit_build(&BuildRequest::new(["minimal-ee"])).await?;
//!
//!     println!("Started build: {}", build.build_id);
//!     Ok(())
//! }
//! ```

mod builds;
mod environments;
pub mod error;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the EE Builder orchestrator API
#[derive(Debug, Clone)]
pub struct BuilderClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl BuilderClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API (e.g., "http://localhost:8000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!("API returned {}: {}", status, error_text);
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
