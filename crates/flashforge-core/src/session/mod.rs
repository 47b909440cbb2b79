//! Generation session
//!
//! Validates the request, confirms an authenticated identity and a configured
//! endpoint, then either streams cards through the decode/extract/emit
//! pipeline (when the caller supplies a sink) or waits for one complete body.
//! Each session is single-use: [`GenerationSession::state`] reports how the
//! run ended, and a second run is rejected.

pub mod cancellation;
pub mod pipeline;
pub mod state;

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

pub use cancellation::GenerationCancellation;
pub use pipeline::StreamDriver;
pub use state::SessionState;

use crate::auth::TokenProvider;
use crate::backend::{
    BackendTarget, CompleteResponse, GenerationBackend, GenerationRequest, HttpBackend,
};
use crate::config::GeneratorConfig;
use crate::emit::{CardSink, Emitter, SinkWarning};
use crate::error::{GenerationError, SessionFailure};
use crate::extract::Extracted;
use crate::stream::WireEncoding;
use crate::types::{clamp_title, Flashcard, GenerationResult};

/// Successful outcome of a session
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub result: GenerationResult,
    /// Sink failures collected while streaming
    pub sink_warnings: Vec<SinkWarning>,
    /// Encoding the stream was decoded with; None for a complete response
    pub encoding: Option<WireEncoding>,
}

/// One generation request, from validation to a result or a failure
pub struct GenerationSession {
    id: Uuid,
    config: GeneratorConfig,
    request: GenerationRequest,
    tokens: Arc<dyn TokenProvider>,
    backend: Option<Arc<dyn GenerationBackend>>,
    cancellation: GenerationCancellation,
    state: SessionState,
}

impl GenerationSession {
    pub fn new(
        config: GeneratorConfig,
        request: GenerationRequest,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            request,
            tokens,
            backend: None,
            cancellation: GenerationCancellation::new(),
            state: SessionState::Idle,
        }
    }

    /// Use a specific backend instead of the default HTTP one
    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Handle for cancelling this session from elsewhere
    pub fn cancellation(&self) -> GenerationCancellation {
        self.cancellation.clone()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// `Completed` or `Failed` once a run has finished
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Stream into `sink` when one is given, otherwise wait for a complete body
    pub async fn generate(
        &mut self,
        sink: Option<&mut dyn CardSink>,
    ) -> Result<GenerationReport, SessionFailure> {
        match sink {
            Some(sink) => self.stream(sink).await,
            None => self.fetch().await,
        }
    }

    /// Stream cards into `sink` as soon as each one is complete
    pub async fn stream(
        &mut self,
        sink: &mut dyn CardSink,
    ) -> Result<GenerationReport, SessionFailure> {
        let span = info_span!("generation", session = %self.id, mode = "stream");
        async move {
            let (backend, endpoint, token) = self.prepare().await?;
            self.transition(SessionState::Streaming);

            let target = BackendTarget {
                endpoint: &endpoint,
                token: &token,
            };
            let cancel = self.cancellation.child_token();
            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GenerationError::Cancelled),
                opened = tokio::time::timeout(
                    self.config.inactivity_timeout,
                    backend.open_stream(target, &self.request),
                ) => opened.unwrap_or_else(|_| {
                    Err(GenerationError::Timeout(self.config.inactivity_timeout))
                }),
            };
            let opened = match opened {
                Ok(opened) => opened,
                Err(error) => return Err(self.fail(error, GenerationResult::default(), Vec::new())),
            };

            let encoding = self.config.encoding.resolve(opened.content_type.as_deref());
            info!("Decoding stream as {}", encoding);
            let mut source = opened.source;
            let mut driver = StreamDriver::new(
                encoding,
                Some(sink),
                cancel,
                self.config.inactivity_timeout,
            );
            let outcome = driver.drive(source.as_mut()).await;
            // Releases the connection before the result is handed back
            drop(source);
            let (result, sink_warnings) = driver.into_parts();

            match outcome {
                Ok(()) => Ok(self.complete(result, sink_warnings, Some(encoding))),
                Err(error) => Err(self.fail(error, result, sink_warnings)),
            }
        }
        .instrument(span)
        .await
    }

    /// Non-streaming fallback: one request, one complete JSON body
    pub async fn fetch(&mut self) -> Result<GenerationReport, SessionFailure> {
        let span = info_span!("generation", session = %self.id, mode = "complete");
        async move {
            let (backend, endpoint, token) = self.prepare().await?;
            self.transition(SessionState::Streaming);

            let target = BackendTarget {
                endpoint: &endpoint,
                token: &token,
            };
            let cancel = self.cancellation.child_token();
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GenerationError::Cancelled),
                response = backend.fetch_complete(target, &self.request) => response,
            };

            match response.and_then(|body| collect_complete(body, &cancel)) {
                Ok(result) => Ok(self.complete(result, Vec::new(), None)),
                Err(error) => Err(self.fail(error, GenerationResult::default(), Vec::new())),
            }
        }
        .instrument(span)
        .await
    }

    /// Validating and Authenticating: everything that must hold before any
    /// network call
    async fn prepare(
        &mut self,
    ) -> Result<(Arc<dyn GenerationBackend>, Url, String), SessionFailure> {
        if self.state != SessionState::Idle {
            warn!("Session {} already ran (state: {})", self.id, self.state);
            return Err(SessionFailure::before_network(GenerationError::Validation(
                format!("session already {}", self.state),
            )));
        }
        self.transition(SessionState::Validating);
        if let Err(error) = self.validate() {
            return Err(self.fail_early(error));
        }

        self.transition(SessionState::Authenticating);
        let token = match self.tokens.session_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                return Err(self.fail_early(GenerationError::AuthenticationRequired(
                    "no signed-in identity".to_string(),
                )))
            }
            Err(e) => {
                return Err(
                    self.fail_early(GenerationError::AuthenticationRequired(format!("{:#}", e)))
                )
            }
        };
        let Some(endpoint) = self.config.endpoint.clone() else {
            return Err(self.fail_early(GenerationError::NotConfigured));
        };
        let backend = match self.backend.clone() {
            Some(backend) => backend,
            None => match HttpBackend::new(self.config.request_timeout) {
                Ok(backend) => Arc::new(backend),
                Err(error) => return Err(self.fail_early(error)),
            },
        };
        Ok((backend, endpoint, token))
    }

    fn validate(&self) -> Result<(), GenerationError> {
        let prompt_chars = self.request.prompt.chars().count();
        if prompt_chars > self.config.max_prompt_chars {
            return Err(GenerationError::Validation(format!(
                "prompt is {} characters, the limit is {}",
                prompt_chars, self.config.max_prompt_chars
            )));
        }
        if self.request.prompt.trim().is_empty() {
            return Err(GenerationError::Validation("prompt is empty".to_string()));
        }
        if self.request.count == 0 {
            return Err(GenerationError::Validation(
                "at least one card must be requested".to_string(),
            ));
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        let legal = self.state.can_transition_to(next);
        debug_assert!(legal, "illegal session transition {} -> {}", self.state, next);
        if !legal {
            error!("Illegal session transition {} -> {}", self.state, next);
        }
        info!("Session {} -> {}", self.state, next);
        self.state = next;
    }

    fn complete(
        &mut self,
        result: GenerationResult,
        sink_warnings: Vec<SinkWarning>,
        encoding: Option<WireEncoding>,
    ) -> GenerationReport {
        self.transition(SessionState::Completed);
        info!(
            "Generation complete: {} cards, title: {}, {} sink warnings",
            result.cards.len(),
            result.title.is_some(),
            sink_warnings.len()
        );
        GenerationReport {
            result,
            sink_warnings,
            encoding,
        }
    }

    fn fail(
        &mut self,
        error: GenerationError,
        partial: GenerationResult,
        sink_warnings: Vec<SinkWarning>,
    ) -> SessionFailure {
        self.transition(SessionState::Failed);
        match &error {
            GenerationError::Cancelled => {
                warn!("Generation cancelled after {} cards", partial.cards.len())
            }
            _ => error!(
                "Generation failed after {} cards: {}",
                partial.cards.len(),
                error
            ),
        }
        SessionFailure {
            error,
            partial,
            sink_warnings,
        }
    }

    fn fail_early(&mut self, error: GenerationError) -> SessionFailure {
        self.transition(SessionState::Failed);
        warn!("Generation rejected: {}", error);
        SessionFailure::before_network(error)
    }
}

/// Apply the same normalization as the streaming path to a complete body
fn collect_complete(
    body: CompleteResponse,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<GenerationResult, GenerationError> {
    let mut emitter = Emitter::new(None, cancel.clone());
    if let Some(title) = body.title.as_deref().and_then(clamp_title) {
        emitter.emit(Extracted::Title(title))?;
    }
    for raw in body.flashcards {
        let card = Flashcard::clamped(&raw.question, &raw.answer);
        if card.has_empty_field() {
            warn!("Card #{} has an empty question or answer", emitter.next_index());
        }
        emitter.emit(Extracted::Card {
            card,
            claimed_index: None,
        })?;
    }
    Ok(emitter.into_parts().0)
}
