//! Refinery server: HTTP boundary for the content enrichment pipeline.
//!
//! Accepts validated batch-processing requests, runs them through the
//! pipeline orchestrator, and returns the batch response. All pipeline
//! failure is encoded in the response body; only malformed requests and
//! missing credentials surface as HTTP errors.

mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, middleware, web};
use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tracing::{info, warn};

use refinery_shared::{AppConfig, api_key, load_config, load_config_from};
use refinery_storage::LibsqlStore;

use routes::AppState;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Refinery: enrich scraped web content with AI-derived structure.
#[derive(Parser)]
#[command(
    name = "refinery",
    version,
    about = "Batch enrichment service: structure, keywords, and embeddings for scraped pages.",
    long_about = None,
)]
struct Cli {
    /// Bind address (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,

    /// Path to a config file (defaults to ~/.refinery/refinery.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "refinery=info",
        1 => "refinery=debug",
        _ => "refinery=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli);

    let config: AppConfig = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let key = api_key(&config);
    if key.is_none() {
        warn!(
            env_var = %config.openai.api_key_env,
            "OpenAI API key not set; /process requests will be rejected"
        );
    }

    let db_path = config.storage.resolved_db_path()?;
    let store = LibsqlStore::open(&db_path).await?;
    info!(path = %db_path.display(), "content store opened");

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let state = AppState::new(config, key, Arc::new(store))?;

    info!(%bind, "starting refinery server");
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(routes::json_config())
            .service(routes::health)
            .service(routes::process)
            .default_service(web::route().to(routes::not_found))
    })
    .bind(&bind)
    .map_err(|e| eyre!("failed to bind {bind}: {e}"))?
    .run()
    .await?;

    Ok(())
}
