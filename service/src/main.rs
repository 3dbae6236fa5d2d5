//! `study-service` entry point.
//!
//! ## Commands
//!
//! - **`serve`** (default): open the store, start the HTTP API, shut down
//!   on Ctrl+C.
//! - **`import-patents <file>`**: replace the item catalogue from JSON.
//! - **`export --out <file> [--since YYYY-MM-DD]`**: write the
//!   consolidated per-participant CSV.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use clap::Subcommand;
use study_core::StudyStore;
use study_service::CompletionClient;
use study_service::ServiceConfig;
use study_service::export;
use study_service::import;
use study_store::SqliteStore;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(version, about = "Data collection backend for the patent ideation study")]
struct Cli {
    /// Path to a TOML config file (defaults to $STUDY_CONFIG, then ./study.toml)
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,

    /// Replace the patent catalogue with the rows of a JSON file
    ImportPatents {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Write one CSV row per participant
    Export {
        #[arg(short = 'o', long = "out", value_name = "FILE", default_value = "consolidated.csv")]
        out: PathBuf,

        /// Only participants whose intake was recorded on or after this date
        #[arg(long, value_name = "YYYY-MM-DD")]
        since: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before reading any override
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        return Err(err).context("loading .env");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let store = SqliteStore::open(&config.db_path, config.pool_size)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let store: Arc<dyn StudyStore> = Arc::new(store);

    let outcome = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, Arc::clone(&store)).await,
        Command::ImportPatents { file } => {
            let count = import::import_file(store.as_ref(), &file)
                .await
                .with_context(|| format!("importing {}", file.display()))?;
            tracing::info!(count, "import complete");
            Ok(())
        }
        Command::Export { out, since } => {
            let file = std::fs::File::create(&out)
                .with_context(|| format!("creating {}", out.display()))?;
            let rows = export::export_csv(store.as_ref(), since, file)
                .await
                .context("writing export")?;
            tracing::info!(rows, path = %out.display(), "export complete");
            Ok(())
        }
    };

    drop(store);
    tracing::info!("store closed");
    outcome
}

async fn serve(config: &ServiceConfig, store: Arc<dyn StudyStore>) -> Result<()> {
    tracing::info!("study-service v{} starting", env!("CARGO_PKG_VERSION"));

    if config.openai.api_key.is_none() {
        tracing::warn!("no OpenAI API key configured; completion requests are sent unauthenticated");
    }
    let completion =
        CompletionClient::new(&config.openai).context("building completion client")?;

    let app = study_service::router(study_service::AppState::new(store, completion));

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
