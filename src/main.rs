//! agentchat-replay - replay a recorded agent run through the streaming core
//!
//! Usage: `agentchat-replay <run_id> [--history]`
//!
//! Without `--history` the recorded frame log `<run_id>.jsonl` is streamed
//! through the controller; with it the stored run `<run_id>.json` is opened.
//! The rendered conversation is printed to stdout as JSON.

use agentchat_stream::{ChatConfig, ChatController, FileTransport};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: agentchat-replay <run_id> [--history]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout is reserved for the snapshot
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentchat_stream=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut run_id = None;
    let mut history = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--history" => history = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ if run_id.is_none() => run_id = Some(arg),
            _ => return Err(format!("unexpected argument: {arg}\n{USAGE}").into()),
        }
    }
    let run_id = run_id.ok_or(USAGE)?;

    let config = ChatConfig::from_env();
    tracing::info!(
        run_dir = %config.run_dir.display(),
        default_source = %config.default_source,
        hidden = ?config.hidden_sources,
        "Configuration loaded"
    );

    let transport = Arc::new(FileTransport::new(config.run_dir.clone()));
    let controller = ChatController::new(transport, config);

    // Failures are already part of the conversation; report and keep going
    let outcome = if history {
        controller.open_run(&run_id).await
    } else {
        match controller.start_run(&run_id).await {
            Ok(_) => {
                controller.wait().await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    };
    if let Err(e) = outcome {
        tracing::error!(run_id = %run_id, error = %e, "Replay failed");
    }

    let snapshot = controller.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
