//! REST client for the combination service.
//!
//! Wraps the two endpoints the engine needs (submit, job status) using
//! [`reqwest`]. Every request carries the `x-api-key` header when a key is
//! configured.

use std::time::Duration;

use async_trait::async_trait;
use montage_core::combine::CombineRequest;
use montage_core::combine_job::StatusReport;
use montage_core::store::{CombineService, CombineServiceError};

use crate::messages::{CombinePayload, Envelope, JobStatusData, SubmitData};

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP client for one combination service deployment.
#[derive(Debug, Clone)]
pub struct CombineApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Errors from the combination service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum CombineApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Combination service error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// 2xx, but the envelope said `success: false` or lacked the data we need.
    #[error("Combination service response unusable: {0}")]
    Unsuccessful(String),
}

impl From<CombineApiError> for CombineServiceError {
    fn from(err: CombineApiError) -> Self {
        match err {
            CombineApiError::Request(e) if e.is_decode() => Self::Protocol(e.to_string()),
            CombineApiError::Request(e) => Self::Transport(e.to_string()),
            CombineApiError::ApiError { status, body } => Self::Rejected { status, body },
            CombineApiError::Unsuccessful(message) => Self::Protocol(message),
        }
    }
}

impl CombineApi {
    /// Build a client whose every request gives up after `timeout`.
    ///
    /// * `base_url` - e.g. `https://combine.example.com`, no trailing slash needed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CombineApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /api/combine-final-video`. Returns the service's job id.
    pub async fn submit_combine(&self, request: &CombineRequest) -> Result<String, CombineApiError> {
        let response = self
            .authorized(self.client.post(format!("{}/api/combine-final-video", self.base_url)))
            .json(&CombinePayload::from(request))
            .send()
            .await?;

        let envelope: Envelope<SubmitData> = Self::parse_response(response).await?;
        let data = Self::unwrap_envelope(envelope)?;
        data.job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CombineApiError::Unsuccessful("submit response has no job_id".into()))
    }

    /// `GET /api/job-status/{job_id}`.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusData, CombineApiError> {
        let response = self
            .authorized(self.client.get(format!("{}/api/job-status/{}", self.base_url, job_id)))
            .send()
            .await?;

        let envelope: Envelope<JobStatusData> = Self::parse_response(response).await?;
        Self::unwrap_envelope(envelope)
    }

    // ---- private helpers ----

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, CombineApiError> {
        if !envelope.success {
            return Err(CombineApiError::Unsuccessful("success flag is false".into()));
        }
        envelope
            .data
            .ok_or_else(|| CombineApiError::Unsuccessful("response has no data".into()))
    }

    /// Ensure the response has a success status code. On failure the body
    /// text is returned inside [`CombineApiError::ApiError`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CombineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CombineApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CombineApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl CombineService for CombineApi {
    async fn submit(&self, request: &CombineRequest) -> Result<String, CombineServiceError> {
        let job_id = self.submit_combine(request).await?;
        tracing::info!(project_id = request.project_id, job_id = %job_id, "Combine job submitted");
        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<StatusReport, CombineServiceError> {
        Ok(self.job_status(job_id).await?.into())
    }
}
