//! In-order delivery of extracted cards to a caller-supplied sink
//!
//! Each card is handed to the sink exactly once with its sequence index, then
//! appended to the session result. A failing (or panicking) sink is recorded as
//! a warning and never stops extraction.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::extract::Extracted;
use crate::types::{Flashcard, GenerationResult};

/// Per-card receiver for incremental delivery
pub trait CardSink: Send {
    /// Called once per card, with indices 0, 1, 2, ...
    fn on_card(&mut self, card: &Flashcard, index: usize) -> anyhow::Result<()>;

    /// Called at most once, before the first card
    fn on_title(&mut self, _title: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<F> CardSink for F
where
    F: FnMut(&Flashcard, usize) -> anyhow::Result<()> + Send,
{
    fn on_card(&mut self, card: &Flashcard, index: usize) -> anyhow::Result<()> {
        self(card, index)
    }
}

/// Events forwarded by [`ChannelSink`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CardEvent {
    #[serde(rename = "title")]
    Title { title: String },

    #[serde(rename = "card")]
    Card { index: usize, card: Flashcard },
}

/// Sink that forwards every event over an unbounded channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CardEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<CardEvent>) -> Self {
        Self { tx }
    }
}

impl CardSink for ChannelSink {
    fn on_card(&mut self, card: &Flashcard, index: usize) -> anyhow::Result<()> {
        self.tx
            .send(CardEvent::Card {
                index,
                card: card.clone(),
            })
            .map_err(|_| anyhow::anyhow!("card receiver dropped"))
    }

    fn on_title(&mut self, title: &str) -> anyhow::Result<()> {
        self.tx
            .send(CardEvent::Title {
                title: title.to_string(),
            })
            .map_err(|_| anyhow::anyhow!("card receiver dropped"))
    }
}

/// A sink failure, reported after the stream completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkWarning {
    /// Card index the sink failed on; None for the title
    pub index: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for SinkWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(index) => write!(f, "sink failed on card #{}: {}", index, self.message),
            None => write!(f, "sink failed on title: {}", self.message),
        }
    }
}

/// Sequencing emitter, one per session
pub struct Emitter<'s> {
    sink: Option<&'s mut dyn CardSink>,
    cancel: CancellationToken,
    next_index: usize,
    result: GenerationResult,
    warnings: Vec<SinkWarning>,
}

impl<'s> Emitter<'s> {
    pub fn new(sink: Option<&'s mut dyn CardSink>, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            next_index: 0,
            result: GenerationResult::default(),
            warnings: Vec::new(),
        }
    }

    /// Index the next card will receive
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Deliver one extracted unit. Nothing is delivered once cancelled.
    pub fn emit(&mut self, item: Extracted) -> Result<(), GenerationError> {
        if self.cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        match item {
            Extracted::Title(title) => {
                debug!("Title captured: {}", title);
                if let Some(sink) = self.sink.as_deref_mut() {
                    if let Err(message) = guarded(|| sink.on_title(&title)) {
                        warn!("Sink failed on title: {}", message);
                        self.warnings.push(SinkWarning {
                            index: None,
                            message,
                        });
                    }
                }
                self.result.title = Some(title);
            }
            Extracted::Card {
                card,
                claimed_index,
            } => {
                let index = self.next_index;
                if let Some(claimed) = claimed_index {
                    if claimed != index {
                        return Err(GenerationError::ProtocolViolation {
                            expected: index,
                            received: claimed,
                        });
                    }
                }
                if let Some(sink) = self.sink.as_deref_mut() {
                    if let Err(message) = guarded(|| sink.on_card(&card, index)) {
                        warn!("Sink failed on card #{}: {}", index, message);
                        self.warnings.push(SinkWarning {
                            index: Some(index),
                            message,
                        });
                    }
                }
                debug!("Card #{} emitted", index);
                self.result.cards.push(card);
                self.next_index += 1;
            }
        }
        Ok(())
    }

    /// Everything delivered so far
    pub fn result(&self) -> &GenerationResult {
        &self.result
    }

    pub fn into_parts(self) -> (GenerationResult, Vec<SinkWarning>) {
        (self.result, self.warnings)
    }
}

/// Run a sink call, turning errors and panics into a message
fn guarded(call: impl FnOnce() -> anyhow::Result<()>) -> Result<(), String> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(panic) => Err(panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "sink panicked".to_string())),
    }
}
