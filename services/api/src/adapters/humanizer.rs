//! services/api/src/adapters/humanizer.rs
//!
//! This module contains the adapter for the remote humanization API.
//! It implements the `HumanizerService` port from the `core` crate.

use async_trait::async_trait;
use humanizer_core::{
    domain::HumanizeParams,
    ports::{HumanizerService, PortError, PortResult},
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct SubmitRequest<'a> {
    content: &'a str,
    readability: &'a str,
    purpose: &'a str,
    strength: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
    output: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `HumanizerService` over the remote REST API.
///
/// The API key is held here and never leaves the server.
#[derive(Clone)]
pub struct HttpHumanizerAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpHumanizerAdapter {
    /// Creates a new `HttpHumanizerAdapter`.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Turns a non-2xx response into a port error. A 402 is kept distinct.
async fn error_for_status(response: reqwest::Response) -> PortError {
    let status = response.status();
    if status == StatusCode::PAYMENT_REQUIRED {
        return PortError::InsufficientCredits;
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Humanizer API returned {}: {}", status, body);
    PortError::Unexpected(format!("Humanizer API returned HTTP {}", status.as_u16()))
}

//=========================================================================================
// `HumanizerService` Trait Implementation
//=========================================================================================

#[async_trait]
impl HumanizerService for HttpHumanizerAdapter {
    async fn submit(&self, text: &str, params: &HumanizeParams) -> PortResult<String> {
        let request = SubmitRequest {
            content: text,
            readability: &params.readability,
            purpose: &params.purpose,
            strength: &params.strength,
            model: &params.model,
        };

        let response = self
            .client
            .post(self.url("submit"))
            .header("apikey", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed submit response: {}", e)))?;

        body.id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| PortError::Unexpected("Submit response carried no job id".to_string()))
    }

    async fn status(&self, job_id: &str) -> PortResult<Option<String>> {
        let response = self
            .client
            .post(self.url("document"))
            .header("apikey", &self.api_key)
            .json(&StatusRequest { id: job_id })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed status response: {}", e)))?;

        Ok(body.output.filter(|output| !output.trim().is_empty()))
    }
}
