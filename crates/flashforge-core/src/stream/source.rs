//! Chunk sources
//!
//! A chunk carries no alignment guarantee: it may hold several tokens, part of
//! one, or half of a multi-byte character.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::error::GenerationError;

/// Ordered asynchronous sequence of opaque byte chunks
#[async_trait]
pub trait ChunkSource: Send {
    /// Wait for the next chunk. `Ok(None)` signals end of stream; after end
    /// or an error the source keeps returning `Ok(None)`.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, GenerationError>;
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Chunk source over a streaming HTTP response body.
/// Dropping it releases the underlying connection.
pub struct HttpChunkSource {
    body: ByteStream,
    finished: bool,
    chunks: usize,
}

impl HttpChunkSource {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            body: Box::pin(response.bytes_stream()),
            finished: false,
            chunks: 0,
        }
    }
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, GenerationError> {
        if self.finished {
            return Ok(None);
        }
        match self.body.next().await {
            Some(Ok(bytes)) => {
                self.chunks += 1;
                Ok(Some(bytes))
            }
            Some(Err(e)) => {
                self.finished = true;
                Err(GenerationError::Network(e.to_string()))
            }
            None => {
                debug!("HTTP body ended after {} chunks", self.chunks);
                self.finished = true;
                Ok(None)
            }
        }
    }
}

/// In-memory chunk source, used for captured responses and tests
#[derive(Debug, Default)]
pub struct ReplayChunkSource {
    chunks: VecDeque<Bytes>,
    failure: Option<GenerationError>,
}

impl ReplayChunkSource {
    /// Replay the given chunks in order
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Re-chunk a whole body into pieces of at most `chunk_size` bytes,
    /// ignoring character boundaries
    pub fn split(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        let body: Bytes = body.into();
        let size = chunk_size.max(1);
        let mut chunks = VecDeque::new();
        let mut offset = 0;
        while offset < body.len() {
            let end = (offset + size).min(body.len());
            chunks.push_back(body.slice(offset..end));
            offset = end;
        }
        Self {
            chunks,
            failure: None,
        }
    }

    /// Raise `error` once the queued chunks are exhausted, instead of ending
    pub fn then_fail(mut self, error: GenerationError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl ChunkSource for ReplayChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, GenerationError> {
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(Some(chunk));
        }
        match self.failure.take() {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }
}
