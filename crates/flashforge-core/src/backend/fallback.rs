//! Non-streaming generation call
//!
//! Used when the caller has no incremental sink: one request, one JSON body.

use tracing::debug;

use super::{BackendTarget, CompleteResponse, GenerationRequest, HttpBackend, RequestBody};
use crate::error::GenerationError;

impl HttpBackend {
    /// POST with `stream: false` and parse `{flashcards, title?}`
    pub(super) async fn call_complete(
        &self,
        target: BackendTarget<'_>,
        request: &GenerationRequest,
    ) -> Result<CompleteResponse, GenerationError> {
        let body = RequestBody::new(request, false);
        let timeout = self.request_timeout();

        let response = self
            .build_request(target, &body, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;
        let response = self.handle_error_response(response).await?;

        let text = response.text().await.map_err(|e| classify(e, timeout))?;
        debug!("Complete response: {} bytes", text.len());

        serde_json::from_str::<CompleteResponse>(&text).map_err(|e| {
            GenerationError::Upstream(format!("unexpected response body ({}): {}", e, text))
        })
    }
}

fn classify(err: reqwest::Error, timeout: std::time::Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::Network(err.to_string())
    }
}
