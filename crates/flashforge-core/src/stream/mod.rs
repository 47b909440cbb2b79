//! Wire layer: chunk delivery and frame decoding
//!
//! - `source` - ordered asynchronous chunk delivery (HTTP body or replay)
//! - `flat` - format A, delimiter-marked text passed through as text fragments
//! - `event_stream` - format B, paired `event:` / `data:` lines with JSON payloads
//! - `frame` - the frame type and the per-session decoder selection

pub mod event_stream;
pub mod flat;
pub mod frame;
pub mod source;

pub use event_stream::EventStreamDecoder;
pub use flat::FlatTextDecoder;
pub use frame::{Frame, FrameDecoder, WireEncoding};
pub use source::{ChunkSource, HttpChunkSource, ReplayChunkSource};
