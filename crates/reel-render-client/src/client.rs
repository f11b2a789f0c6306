//! Render service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::backend::RenderBackend;
use crate::error::{RenderError, RenderResult};
use crate::types::{ErrorBody, GenerateResponse, HealthResponse, RenderRequest, RenderedArtifact};

/// Configuration for the render client.
#[derive(Debug, Clone)]
pub struct RenderClientConfig {
    /// Base URL of the render service
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Bearer token, if the service requires one
    pub api_key: Option<String>,
}

impl Default for RenderClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            timeout: Duration::from_secs(600), // generation is slow
            api_key: None,
        }
    }
}

impl RenderClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("RENDER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8100".to_string()),
            timeout: Duration::from_secs(
                std::env::var("RENDER_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            api_key: std::env::var("RENDER_SERVICE_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

/// HTTP client for the render service.
pub struct HttpRenderClient {
    http: Client,
    config: RenderClientConfig,
}

impl HttpRenderClient {
    /// Create a new render client.
    pub fn new(config: RenderClientConfig) -> RenderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RenderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> RenderResult<Self> {
        Self::new(RenderClientConfig::from_env())
    }

    /// Check if the render service is healthy.
    pub async fn health_check(&self) -> RenderResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Render service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Render service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Send one generation request.
    pub async fn generate(&self, request: &RenderRequest) -> RenderResult<RenderedArtifact> {
        let url = format!("{}/v1/generate", self.config.base_url);

        debug!(
            reference_id = %request.reference_id,
            unit_index = request.unit_index,
            "Sending generation request to {}", url
        );

        let mut builder = self.http.post(&url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;
        let generated: GenerateResponse = serde_json::from_str(&body)?;
        into_artifact(generated)
    }

    fn map_transport_error(&self, error: reqwest::Error) -> RenderError {
        if error.is_timeout() {
            RenderError::Timeout(self.config.timeout.as_secs())
        } else {
            RenderError::Network(error)
        }
    }
}

#[async_trait]
impl RenderBackend for HttpRenderClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn render(&self, request: &RenderRequest) -> RenderResult<RenderedArtifact> {
        self.generate(request).await
    }
}

/// Map a non-success status to the error taxonomy.
fn classify_status(status: StatusCode, body: &str) -> RenderError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.to_string());
    let code = parsed.and_then(|b| b.code).unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return RenderError::RateLimited;
    }
    if status.is_server_error() {
        return RenderError::ServiceUnavailable(format!(
            "render service returned {}: {}",
            status, message
        ));
    }
    if code == "content_policy" || status == StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS {
        return RenderError::ContentPolicy(message);
    }
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        return RenderError::InvalidRequest(message);
    }

    RenderError::Rejected {
        status: status.as_u16(),
        message,
    }
}

fn into_artifact(response: GenerateResponse) -> RenderResult<RenderedArtifact> {
    let url = response
        .artifact_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| RenderError::InvalidResponse("missing artifact_url".to_string()))?;
    let duration = response
        .duration_seconds
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| RenderError::InvalidResponse("missing duration_seconds".to_string()))?;

    Ok(RenderedArtifact {
        url,
        duration_seconds: duration.round() as u32,
    })
}
