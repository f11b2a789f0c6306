//! HTTP credit store client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::store::{CreditStore, DeductionRequest, DeductionResult};

/// Configuration for the HTTP credit store.
#[derive(Debug, Clone)]
pub struct HttpCreditStoreConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl Default for HttpCreditStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8200".to_string(),
            timeout: Duration::from_secs(10),
            api_key: None,
        }
    }
}

impl HttpCreditStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CREDIT_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:8200".to_string()),
            timeout: Duration::from_secs(
                std::env::var("CREDIT_STORE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            api_key: std::env::var("CREDIT_STORE_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: u32,
}

#[derive(Debug, Default, Deserialize)]
struct InsufficientBody {
    #[serde(default)]
    balance: Option<u32>,
}

/// Credit store reached over HTTP.
///
/// Endpoints:
/// - `GET  {base}/v1/users/{user_id}/balance`
/// - `POST {base}/v1/users/{user_id}/deductions`
pub struct HttpCreditStore {
    http: Client,
    base_url: Url,
    config: HttpCreditStoreConfig,
}

impl HttpCreditStore {
    pub fn new(config: HttpCreditStoreConfig) -> LedgerResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            LedgerError::Config(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(LedgerError::Config(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LedgerError::unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    pub fn from_env() -> LedgerResult<Self> {
        Self::new(HttpCreditStoreConfig::from_env())
    }

    /// Build `{base}/v1/users/{user_id}/{suffix}` with `user_id` as a single
    /// escaped path segment.
    fn user_url(&self, user_id: &str, suffix: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "users", user_id, suffix]);
        }
        url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl CreditStore for HttpCreditStore {
    async fn get_balance(&self, user_id: &str) -> LedgerResult<u32> {
        let url = self.user_url(user_id, "balance");
        let response = self.authorized(self.http.get(url)).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LedgerError::user_not_found(user_id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, 0));
        }

        let body = response.text().await?;
        let parsed: BalanceResponse = serde_json::from_str(&body)?;
        Ok(parsed.balance)
    }

    async fn deduct(&self, request: &DeductionRequest) -> LedgerResult<DeductionResult> {
        let url = self.user_url(&request.user_id, "deductions");

        debug!(
            user_id = %request.user_id,
            reference_id = %request.reference_id,
            amount = request.amount,
            "Posting deduction"
        );

        let response = self
            .authorized(self.http.post(url).json(request))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LedgerError::user_not_found(&request.user_id));
        }
        if status == StatusCode::CONFLICT {
            return Err(LedgerError::DuplicateReference(request.reference_id.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, request.amount));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn classify_status(status: StatusCode, body: &str, required: u32) -> LedgerError {
    if status == StatusCode::PAYMENT_REQUIRED {
        let parsed: InsufficientBody = serde_json::from_str(body).unwrap_or_default();
        return LedgerError::InsufficientFunds {
            required,
            available: parsed.balance.unwrap_or(0),
        };
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return LedgerError::unavailable(format!("credit store returned {}: {}", status, body));
    }
    LedgerError::InvalidResponse(format!("unexpected status {}: {}", status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::CreditOperationType;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> HttpCreditStore {
        HttpCreditStore::new(HttpCreditStoreConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            api_key: Some("ledger-key".to_string()),
        })
        .unwrap()
    }

    fn request() -> DeductionRequest {
        DeductionRequest {
            user_id: "user-1".to_string(),
            amount: 45,
            description: "Produce 3 acts of 'Night Train'".to_string(),
            project_id: "project-9".to_string(),
            category: CreditOperationType::MovieProduction,
            reference_id: "batch-42".to_string(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_get_balance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users/user-1/balance"))
            .and(header("authorization", "Bearer ledger-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": 250})))
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).get_balance("user-1").await.unwrap(), 250);
    }

    #[tokio::test]
    async fn test_deduct_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/users/user-1/deductions"))
            .and(body_partial_json(json!({
                "reference_id": "batch-42",
                "amount": 45,
                "category": "movie_production"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transaction_id": "tx-1",
                "amount": 45,
                "balance_after": 155
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = store_for(&server).deduct(&request()).await.unwrap();
        assert_eq!(result.transaction_id, "tx-1");
        assert_eq!(result.balance_after, 155);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users/user-1/balance"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/users/user-1/deductions"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({"balance": 12})))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(store.get_balance("user-1").await.unwrap_err().is_unavailable());
        assert!(matches!(
            store.deduct(&request()).await.unwrap_err(),
            LedgerError::InsufficientFunds {
                required: 45,
                available: 12
            }
        ));
    }

    #[tokio::test]
    async fn test_conflict_is_duplicate_reference() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/users/user-1/deductions"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = store_for(&server).deduct(&request()).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateReference(r) if r == "batch-42"));
    }

    #[tokio::test]
    async fn test_user_id_is_escaped_into_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users/team%2Fa%3Fx=1/balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let balance = store_for(&server).get_balance("team/a?x=1").await.unwrap();
        assert_eq!(balance, 7);
    }

    #[test]
    fn test_user_url_keeps_base_path() {
        let store = HttpCreditStore::new(HttpCreditStoreConfig {
            base_url: "http://ledger.internal/api/".to_string(),
            ..HttpCreditStoreConfig::default()
        })
        .unwrap();

        assert_eq!(
            store.user_url("u 1", "deductions").as_str(),
            "http://ledger.internal/api/v1/users/u%201/deductions"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = HttpCreditStore::new(HttpCreditStoreConfig {
            base_url: "not a url".to_string(),
            ..HttpCreditStoreConfig::default()
        })
        .err()
        .unwrap();

        assert!(matches!(err, LedgerError::Config(_)));
        assert!(!err.is_unavailable());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let store = HttpCreditStore::new(HttpCreditStoreConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            api_key: None,
        })
        .unwrap();

        assert!(store.get_balance("user-1").await.unwrap_err().is_unavailable());
    }
}
