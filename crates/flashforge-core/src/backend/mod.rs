//! Generation backend
//!
//! The session talks to the backend through [`GenerationBackend`], so the
//! endpoint and token are explicit per-session inputs rather than global
//! client state. [`HttpBackend`] is the reqwest implementation.

mod fallback;
mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub use http::HttpBackend;

use crate::error::GenerationError;
use crate::stream::ChunkSource;

/// What the caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Desired number of cards
    pub count: usize,
    /// Ask the backend for a title
    pub generate_title: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, count: usize) -> Self {
        Self {
            prompt: prompt.into(),
            count,
            generate_title: false,
        }
    }

    pub fn with_title(mut self, generate_title: bool) -> Self {
        self.generate_title = generate_title;
        self
    }
}

/// JSON body sent to the backend
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestBody<'a> {
    pub prompt: &'a str,
    pub count: usize,
    pub generate_title: bool,
    pub stream: bool,
}

impl<'a> RequestBody<'a> {
    pub fn new(request: &'a GenerationRequest, stream: bool) -> Self {
        Self {
            prompt: &request.prompt,
            count: request.count,
            generate_title: request.generate_title,
            stream,
        }
    }
}

/// Where and as whom a session talks to the backend
#[derive(Debug, Clone, Copy)]
pub struct BackendTarget<'a> {
    pub endpoint: &'a Url,
    pub token: &'a str,
}

/// A successfully opened streaming response
pub struct OpenedStream {
    /// Response `Content-Type`, used to pick the wire encoding
    pub content_type: Option<String>,
    pub source: Box<dyn ChunkSource>,
}

/// Raw card as returned by the non-streaming endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RawCard {
    pub question: String,
    pub answer: String,
}

/// Complete body of the non-streaming endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteResponse {
    pub flashcards: Vec<RawCard>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Backend that can stream cards or return them all at once
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start a streaming generation; resolves once response headers arrive
    async fn open_stream(
        &self,
        target: BackendTarget<'_>,
        request: &GenerationRequest,
    ) -> Result<OpenedStream, GenerationError>;

    /// Run a generation and wait for the complete JSON body
    async fn fetch_complete(
        &self,
        target: BackendTarget<'_>,
        request: &GenerationRequest,
    ) -> Result<CompleteResponse, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = GenerationRequest::new("photosynthesis", 8).with_title(true);
        let body = serde_json::to_value(RequestBody::new(&request, true)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "prompt": "photosynthesis",
                "count": 8,
                "generateTitle": true,
                "stream": true
            })
        );
    }

    #[test]
    fn test_complete_response_title_optional() {
        let body: CompleteResponse =
            serde_json::from_str(r#"{"flashcards": [{"question": "q", "answer": "a"}]}"#)
                .unwrap();
        assert_eq!(body.flashcards.len(), 1);
        assert!(body.title.is_none());
    }
}
