//! Flashforge core
//!
//! Incremental flashcard extraction from a live generation stream:
//! chunks → frames → cards → sink, with exactly-once, in-order delivery.

pub mod auth;
pub mod backend;
pub mod config;
pub mod emit;
pub mod error;
pub mod extract;
pub mod session;
pub mod stream;
pub mod types;

pub use auth::{StaticToken, StoredToken, StoredTokenProvider, TokenProvider};
pub use backend::{GenerationBackend, GenerationRequest, HttpBackend};
pub use config::{EncodingPreference, GeneratorConfig};
pub use emit::{CardEvent, CardSink, ChannelSink, Emitter, SinkWarning};
pub use error::{GenerationError, SessionFailure};
pub use extract::{Extracted, RecordExtractor};
pub use session::{
    GenerationCancellation, GenerationReport, GenerationSession, SessionState, StreamDriver,
};
pub use stream::{ChunkSource, Frame, FrameDecoder, ReplayChunkSource, WireEncoding};
pub use types::{Flashcard, GenerationResult};
