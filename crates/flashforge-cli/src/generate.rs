//! `flashforge generate`

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use flashforge_core::{
    GenerationRequest, GenerationSession, GeneratorConfig, StaticToken, StoredTokenProvider,
    TokenProvider,
};
use tracing::{info, warn};

use crate::cli::GenerateArgs;
use crate::output::{report_warnings, CardPrinter};

pub const ENV_TOKEN: &str = "FLASHFORGE_TOKEN";

pub async fn run(args: GenerateArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let mut config = match config_path {
        Some(path) => GeneratorConfig::load_from(Some(path)),
        None => GeneratorConfig::load(),
    }
    .context("loading configuration")?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = Some(endpoint);
    }
    if let Some(encoding) = args.encoding {
        config.encoding = encoding;
    }
    if let Some(secs) = args.timeout {
        config.inactivity_timeout = Duration::from_secs(secs.max(1));
    }

    let tokens = resolve_tokens(args.token).await?;
    let request = GenerationRequest::new(args.prompt, args.count).with_title(args.title);
    let mut session = GenerationSession::new(config, request, tokens);
    info!("Starting session {}", session.id());

    let cancellation = session.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling generation");
            cancellation.cancel();
        }
    });

    let mut printer = CardPrinter::new(args.json);
    let outcome = if args.no_stream {
        session.fetch().await
    } else {
        session.stream(&mut printer).await
    };

    match outcome {
        Ok(report) => {
            if args.no_stream {
                printer.print_result(&report.result)?;
            }
            report_warnings(&report.sink_warnings);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            report_warnings(&failure.sink_warnings);
            eprintln!(
                "error: {} ({} cards delivered before the failure)",
                failure.error,
                failure.partial.cards.len()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// `--token`, then FLASHFORGE_TOKEN, then the stored token file
async fn resolve_tokens(flag: Option<String>) -> Result<Arc<dyn TokenProvider>> {
    if let Some(token) = flag.or_else(|| std::env::var(ENV_TOKEN).ok()) {
        return Ok(Arc::new(StaticToken::new(token)));
    }
    match StoredTokenProvider::default_path() {
        Some(path) => Ok(Arc::new(StoredTokenProvider::new(path).await?)),
        None => Ok(Arc::new(StaticToken::anonymous())),
    }
}
