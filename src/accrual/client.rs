use crate::models::AccrualStatus;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fallback when a 429 carries no parseable Retry-After.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Transient probe failures: network trouble, undecodable bodies, 5xx.
/// The caller backs off and re-discovers; nothing here is terminal.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("accrual request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("accrual service answered {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeReply {
    /// The service knows the order; accrual is present only when it says so.
    Status {
        status: AccrualStatus,
        accrual: Option<Decimal>,
    },
    /// 429 — no worker may probe until the duration passes.
    RateLimited(Duration),
    /// The service does not know the order yet. Never terminal.
    NotFound,
}

#[derive(Debug, Deserialize)]
struct AccrualOrder {
    #[allow(dead_code)]
    order: String,
    status: AccrualStatus,
    accrual: Option<Decimal>,
}

/// Thin HTTP probe of `GET {base}/api/orders/{number}`.
pub struct AccrualClient {
    http: Client,
    base_url: String,
}

impl AccrualClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Exactly one request per call; retry policy lives with the caller.
    pub async fn probe(&self, order_number: &str) -> Result<ProbeReply, ProbeError> {
        let url = format!("{}/api/orders/{}", self.base_url, order_number);
        debug!(url = %url, "probing accrual status");

        let resp = self.http.get(&url).send().await?;

        match resp.status() {
            StatusCode::OK => {
                let body: AccrualOrder = resp.json().await?;
                Ok(ProbeReply::Status {
                    status: body.status,
                    accrual: body.accrual,
                })
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(ProbeReply::NotFound),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                Ok(ProbeReply::RateLimited(retry_after))
            }
            other => Err(ProbeError::Status(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, AccrualClient) {
        let server = MockServer::start().await;
        let client = AccrualClient::new(server.uri());
        (server, client)
    }

    #[tokio::test]
    async fn decodes_processed_order() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/orders/12345678903"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "12345678903",
                "status": "PROCESSED",
                "accrual": 150.0
            })))
            .mount(&server)
            .await;

        let reply = client.probe("12345678903").await.unwrap();
        assert_eq!(
            reply,
            ProbeReply::Status {
                status: AccrualStatus::Processed,
                accrual: Some(Decimal::from(150)),
            }
        );
    }

    #[tokio::test]
    async fn decodes_processing_without_accrual() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/orders/12345678903"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "12345678903",
                "status": "PROCESSING"
            })))
            .mount(&server)
            .await;

        let reply = client.probe("12345678903").await.unwrap();
        assert_eq!(
            reply,
            ProbeReply::Status {
                status: AccrualStatus::Processing,
                accrual: None,
            }
        );
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/orders/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        assert_eq!(client.probe("1").await.unwrap(), ProbeReply::NotFound);
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/orders/1"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .mount(&server)
            .await;

        assert_eq!(
            client.probe("1").await.unwrap(),
            ProbeReply::RateLimited(Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn rate_limit_defaults_to_sixty_seconds() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/orders/1"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "soon"))
            .mount(&server)
            .await;

        assert_eq!(
            client.probe("1").await.unwrap(),
            ProbeReply::RateLimited(DEFAULT_RETRY_AFTER)
        );
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/orders/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(matches!(
            client.probe("1").await,
            Err(ProbeError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
    }
}
