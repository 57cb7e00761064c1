pub mod config;
pub mod errors;
pub mod executor;
pub mod mcp;
pub mod perception;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use crate::errors::DeskResult;
use crate::executor::dispatcher::ActionDispatcher;
use crate::executor::input::{EnigoBackend, InputBackend};
use crate::mcp::server::{serve_until, McpServer};
use crate::mcp::stdio_transport::StdioTransport;
use crate::perception::encoder::BudgetCodec;
use crate::perception::pipeline::ScreenshotCompositor;
use crate::perception::screenshot::XcapCapture;
use crate::perception::traits::{ImageCodec, ScreenCapture};

/// Runs the bridge over stdio until the client disconnects or Ctrl-C.
/// Callers should exit the process once this returns; see `main`.
pub async fn run() -> DeskResult<()> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cfg = config::load_config()?;

    let input: Arc<dyn InputBackend> = Arc::new(EnigoBackend::spawn(cfg.input)?);
    let capture: Arc<dyn ScreenCapture> = Arc::new(XcapCapture::new());
    let codec: Arc<dyn ImageCodec> = Arc::new(BudgetCodec::from_config(&cfg.screenshot));

    let compositor = ScreenshotCompositor::new(
        capture.clone(),
        input.clone(),
        codec,
        cfg.vision,
        cfg.marker,
        Duration::from_millis(cfg.screenshot.settle_delay_ms),
    );
    let dispatcher = ActionDispatcher::new(input.clone(), capture, compositor, cfg.vision, cfg.input);
    let server = McpServer::new(dispatcher, input, cfg.server.tool_name.clone());

    let mut transport = StdioTransport::stdio();
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let stopped = serve_until(&server, &mut transport, interrupt).await?;
    tracing::info!(?stopped, "deskbridge stopped");
    Ok(())
}
