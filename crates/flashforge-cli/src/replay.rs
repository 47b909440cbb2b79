//! `flashforge replay`: feed a captured body through the pipeline offline

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use flashforge_core::{GenerationCancellation, ReplayChunkSource, StreamDriver};

use crate::cli::ReplayArgs;
use crate::output::{report_warnings, CardPrinter};

/// Local files never stall, but the driver still wants a bound
const REPLAY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(args: ReplayArgs) -> Result<ExitCode> {
    let body = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let encoding = args.encoding.resolve(Some(sniff_content_type(&body)));

    let mut source = ReplayChunkSource::split(body, args.chunk_size);
    let mut printer = CardPrinter::new(args.json);
    let cancellation = GenerationCancellation::new();
    let mut driver = StreamDriver::new(
        encoding,
        Some(&mut printer),
        cancellation.child_token(),
        REPLAY_TIMEOUT,
    );
    let outcome = driver.drive(&mut source).await;
    let (result, warnings) = driver.into_parts();
    report_warnings(&warnings);

    match outcome {
        Ok(()) => {
            eprintln!("{} cards ({} encoding)", result.cards.len(), encoding);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {} ({} cards extracted first)", e, result.cards.len());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Guess the content type a captured body was served with
fn sniff_content_type(body: &[u8]) -> &'static str {
    let text = String::from_utf8_lossy(&body[..body.len().min(256)]);
    let first = text.trim_start();
    if first.starts_with("event:") || first.starts_with(':') {
        "text/event-stream"
    } else {
        "text/plain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(b"event: card\ndata: {}\n"), "text/event-stream");
        assert_eq!(sniff_content_type(b": ping\n"), "text/event-stream");
        assert_eq!(sniff_content_type(b"TITLE: x\nCARD_START\n"), "text/plain");
        assert_eq!(sniff_content_type(b""), "text/plain");
    }
}
