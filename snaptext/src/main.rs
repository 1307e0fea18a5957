use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snaptext::app::App;
use snaptext::capture::picker_channel;
use snaptext::config::Config;
use snaptext::repl::Repl;

#[derive(Parser)]
#[command(name = "snaptext")]
#[command(about = "Photograph or pick an image and read the text in it")]
struct Args {
    /// Read commands from a file instead of stdin
    #[arg(long)]
    script: Option<PathBuf>,

    /// Override OCR_MODEL (e.g. "local/tesseract", "openai/gpt-4o")
    #[arg(long)]
    ocr_model: Option<String>,

    /// Print `status` as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snaptext=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env();
    if let Some(model) = args.ocr_model {
        config.ocr.model = model;
    }

    tracing::info!("Initializing OCR provider: {}...", config.ocr.model);
    let (picker, source) = picker_channel();
    let app = App::from_config(config, Arc::new(source))?;

    if !app.config.camera.permission_granted {
        tracing::warn!("CAMERA_PERMISSION is denied - the camera will refuse to open");
    }

    let repl = Repl::new(app, picker, args.json);
    tokio::spawn(shutdown_signal(repl.shutdown_token()));

    match args.script {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            repl.run(BufReader::new(file)).await?;
        }
        None => {
            println!("snaptext ready. Type `help` for commands.");
            repl.run(BufReader::new(tokio::io::stdin())).await?;
        }
    }

    tracing::info!("Bye");
    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing running captures...");
    cancel_token.cancel();
}
