//! HTTP client for the trading backend.

use futures_util::future::BoxFuture;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::dto::{
    AiModelInfo, DEFAULT_HISTORY_LIMIT, ResponseMeta, SetAiModelRequest, SetAiModelResponse,
    TradingStatus,
};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::service::StatusSource;

/// Client for the backend's `/api` endpoints.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    /// Creates a client for `config.api_base_url` with the configured
    /// request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/trading/status`: current trading state, position, and price.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] on transport failure and
    /// [`ClientError::Api`] when the backend reports failure.
    pub async fn trading_status(&self) -> Result<TradingStatus, ClientError> {
        self.get_as("/api/trading/status").await
    }

    /// `GET /api/trading/data`: market and account data for the dashboard.
    ///
    /// # Errors
    ///
    /// See [`RestClient::trading_status`].
    pub async fn trading_data(&self) -> Result<Value, ClientError> {
        self.request(Method::GET, "/api/trading/data", None::<&()>).await
    }

    /// `GET /api/trading/history`: the most recent `limit` trades (default 50).
    ///
    /// Returns the `data` array of the response, or `null` if absent.
    ///
    /// # Errors
    ///
    /// See [`RestClient::trading_status`].
    pub async fn trading_history(&self, limit: Option<u32>) -> Result<Value, ClientError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let path = format!("/api/trading/history?limit={limit}");
        let mut body = self.request(Method::GET, &path, None::<&()>).await?;
        Ok(body
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// `POST /api/trading/start`: starts automated trading.
    ///
    /// # Errors
    ///
    /// See [`RestClient::trading_status`].
    pub async fn start_trading(&self) -> Result<Value, ClientError> {
        let body = self.request(Method::POST, "/api/trading/start", None::<&()>).await?;
        if body.get("analysis").is_none_or(Value::is_null) {
            tracing::debug!("trading started without an analysis result yet");
        }
        Ok(body)
    }

    /// `POST /api/trading/stop`: stops automated trading.
    ///
    /// # Errors
    ///
    /// See [`RestClient::trading_status`].
    pub async fn stop_trading(&self) -> Result<Value, ClientError> {
        self.request(Method::POST, "/api/trading/stop", None::<&()>).await
    }

    /// `GET /api/trading/scheduled-jobs`: pending analysis jobs.
    ///
    /// # Errors
    ///
    /// See [`RestClient::trading_status`].
    pub async fn scheduled_jobs(&self) -> Result<Value, ClientError> {
        self.request(Method::GET, "/api/trading/scheduled-jobs", None::<&()>)
            .await
    }

    /// `POST /api/trading/cancel-jobs`: cancels every pending job.
    ///
    /// # Errors
    ///
    /// See [`RestClient::trading_status`].
    pub async fn cancel_scheduled_jobs(&self) -> Result<Value, ClientError> {
        self.request(Method::POST, "/api/trading/cancel-jobs", None::<&()>)
            .await
    }

    /// `POST /api/trading/analyze-only`: runs an analysis without trading.
    ///
    /// # Errors
    ///
    /// See [`RestClient::trading_status`].
    pub async fn analyze_only(&self) -> Result<Value, ClientError> {
        self.request(Method::POST, "/api/trading/analyze-only", None::<&()>)
            .await
    }

    /// `GET /api/ai/model`: the analysis model in use.
    ///
    /// # Errors
    ///
    /// See [`RestClient::trading_status`].
    pub async fn ai_model(&self) -> Result<AiModelInfo, ClientError> {
        self.get_as("/api/ai/model").await
    }

    /// `POST /api/ai/model`: switches the analysis model.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 400 or 500 when the backend
    /// rejects `model`.
    pub async fn set_ai_model(&self, model: &str) -> Result<SetAiModelResponse, ClientError> {
        let body = self
            .request(
                Method::POST,
                "/api/ai/model",
                Some(&SetAiModelRequest { model }),
            )
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let body = self.request(Method::GET, path, None::<&()>).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Sends one request and unwraps the response envelope.
    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ClientError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.inspect_err(|e| {
            tracing::warn!(%method, path, error = %e, "request failed");
        })?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = parse_body(status, &bytes)?;

        let meta = ResponseMeta::from_body(&body);
        if !status.is_success() || !meta.is_success() {
            let message = meta.failure_message();
            tracing::warn!(%method, path, status = status.as_u16(), %message, "backend reported failure");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(%method, path, status = status.as_u16(), "request completed");
        Ok(body)
    }
}

/// Parses a response body. Error responses that are not JSON still map to
/// [`ClientError::Api`] so the status code is not lost.
fn parse_body(status: StatusCode, bytes: &[u8]) -> Result<Value, ClientError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(_) if !status.is_success() => Err(ClientError::Api {
            status: status.as_u16(),
            message: String::from_utf8_lossy(bytes).into_owned(),
        }),
        Err(e) => Err(e.into()),
    }
}

impl StatusSource for RestClient {
    fn fetch_status(&self) -> BoxFuture<'static, Result<Value, ClientError>> {
        let client = self.clone();
        Box::pin(async move {
            let status = client.trading_status().await?;
            Ok(serde_json::to_value(status)?)
        })
    }
}
