//! Chunk → frame → record → sink pipeline
//!
//! The only suspension point is the wait for the next chunk. Each chunk is
//! decoded, extracted and emitted completely before the next one is requested.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::emit::{CardSink, Emitter, SinkWarning};
use crate::error::GenerationError;
use crate::extract::RecordExtractor;
use crate::stream::{ChunkSource, Frame, FrameDecoder, WireEncoding};
use crate::types::GenerationResult;

/// Drives one chunk source to completion
pub struct StreamDriver<'s> {
    decoder: FrameDecoder,
    extractor: RecordExtractor,
    emitter: Emitter<'s>,
    cancel: CancellationToken,
    inactivity_timeout: Duration,
    chunks: usize,
}

impl<'s> StreamDriver<'s> {
    pub fn new(
        encoding: WireEncoding,
        sink: Option<&'s mut dyn CardSink>,
        cancel: CancellationToken,
        inactivity_timeout: Duration,
    ) -> Self {
        Self {
            decoder: FrameDecoder::new(encoding),
            extractor: RecordExtractor::new(),
            emitter: Emitter::new(sink, cancel.clone()),
            cancel,
            inactivity_timeout,
            chunks: 0,
        }
    }

    /// Pull chunks until end of stream, cancellation, or a terminal fault
    pub async fn drive(&mut self, source: &mut dyn ChunkSource) -> Result<(), GenerationError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(GenerationError::Cancelled),
                next = tokio::time::timeout(self.inactivity_timeout, source.next_chunk()) => next,
            };
            let chunk = next.map_err(|_| GenerationError::Timeout(self.inactivity_timeout))??;

            match chunk {
                Some(bytes) => {
                    self.chunks += 1;
                    debug!("Chunk #{}: {} bytes", self.chunks, bytes.len());
                    let mut frames = Vec::new();
                    let decoded = self.decoder.decode(&bytes, &mut frames);
                    self.process(frames)?;
                    decoded?;
                }
                None => {
                    let mut frames = Vec::new();
                    let decoded = self.decoder.finish(&mut frames);
                    self.process(frames)?;
                    decoded?;
                    for item in self.extractor.finish() {
                        self.emitter.emit(item)?;
                    }
                    info!(
                        "Stream complete: {} chunks, {} cards ({})",
                        self.chunks,
                        self.emitter.next_index(),
                        self.decoder.encoding()
                    );
                    return Ok(());
                }
            }
        }
    }

    fn process(&mut self, frames: Vec<Frame>) -> Result<(), GenerationError> {
        for frame in frames {
            for item in self.extractor.extract(frame) {
                self.emitter.emit(item)?;
            }
        }
        Ok(())
    }

    pub fn into_parts(self) -> (GenerationResult, Vec<SinkWarning>) {
        self.emitter.into_parts()
    }
}
