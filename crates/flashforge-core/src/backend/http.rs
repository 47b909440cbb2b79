//! reqwest-backed generation backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    BackendTarget, CompleteResponse, GenerationBackend, GenerationRequest, OpenedStream,
    RequestBody,
};
use crate::error::GenerationError;
use crate::stream::HttpChunkSource;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP backend. Streaming responses have no overall deadline (the session
/// applies an inactivity bound); complete responses use `request_timeout`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(request_timeout: Duration) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            request_timeout,
        })
    }

    pub(super) fn build_request(
        &self,
        target: BackendTarget<'_>,
        body: &RequestBody<'_>,
        accept: &str,
    ) -> RequestBuilder {
        self.http
            .post(target.endpoint.clone())
            .bearer_auth(target.token)
            .header(ACCEPT, accept)
            .json(body)
    }

    pub(super) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Turn a non-success response into an upstream error carrying its message
    pub(super) async fn handle_error_response(
        &self,
        response: Response,
    ) -> Result<Response, GenerationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|json| {
                json.get("error")
                    .or_else(|| json.get("message"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.trim().to_string());
        warn!("Backend returned {}: {}", status, message);
        if message.is_empty() {
            Err(GenerationError::Upstream(format!("HTTP {}", status)))
        } else {
            Err(GenerationError::Upstream(format!("HTTP {}: {}", status, message)))
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn open_stream(
        &self,
        target: BackendTarget<'_>,
        request: &GenerationRequest,
    ) -> Result<OpenedStream, GenerationError> {
        let body = RequestBody::new(request, true);
        info!(
            "Opening generation stream at {} ({} cards requested)",
            target.endpoint, request.count
        );
        let response = self
            .build_request(target, &body, "text/event-stream, text/plain")
            .send()
            .await?;
        let response = self.handle_error_response(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!("Stream opened, content-type: {:?}", content_type);

        Ok(OpenedStream {
            content_type,
            source: Box::new(HttpChunkSource::new(response)),
        })
    }

    async fn fetch_complete(
        &self,
        target: BackendTarget<'_>,
        request: &GenerationRequest,
    ) -> Result<CompleteResponse, GenerationError> {
        self.call_complete(target, request).await
    }
}
