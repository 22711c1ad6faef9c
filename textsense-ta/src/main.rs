//! textsense-ta - Text Analysis Microservice
//!
//! Boots sentiment, entity, emotion, and intent pipelines concurrently and
//! serves analysis requests while tolerating models that fail to load.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textsense_common::auth::authenticator_from_config;
use textsense_common::config::{ConfigResolver, ConfigSource, HUB_TOKEN_ENV_VAR};
use textsense_ta::bootstrap::Bootstrapper;
use textsense_ta::catalogue::specs_from_config;
use textsense_ta::orchestrator::{AnalysisLimits, AnalysisOrchestrator};
use textsense_ta::pipeline::hub::HubLoader;
use textsense_ta::registry::ModelRegistry;
use textsense_ta::{build_router, AppState};

/// Command-line arguments for textsense-ta
#[derive(Parser, Debug)]
#[command(name = "textsense-ta")]
#[command(about = "Text analysis microservice")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "TEXTSENSE_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short, long, env = "TEXTSENSE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the log level
    let (config, source) = ConfigResolver::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification immediately after tracing init
    info!(
        "Starting TextSense Text Analysis (textsense-ta) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &source {
        ConfigSource::Defaults => info!("No config file found, using compiled defaults"),
        other => match other.path() {
            Some(path) if path.exists() => info!("Config file: {}", path.display()),
            Some(path) => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            None => {}
        },
    }

    // Authentication
    let authenticator = authenticator_from_config(&config.auth)?;
    if !authenticator.is_enforcing() {
        warn!("API authentication disabled (auth.enabled = false)");
    } else if config.auth.tokens.is_empty() {
        warn!("No API tokens configured; every /text request will be rejected");
    } else {
        info!("✓ Loaded {} API token(s)", config.auth.tokens.len());
    }

    // Registry with every slot NotLoaded
    let specs = specs_from_config(&config.models)?;
    let registry = Arc::new(ModelRegistry::new(specs)?);

    let hub_token = config.resolve_hub_token();
    if hub_token.is_none() {
        warn!(
            "No {} configured; hub models will fail to load",
            HUB_TOKEN_ENV_VAR
        );
    }
    let loader = HubLoader::new(
        config.hub.base_url.clone(),
        hub_token,
        Duration::from_secs(config.hub.http_timeout_secs),
    )?;

    // Bootstrap in the background so /health and /text/models/status respond while loading
    let bootstrap = Bootstrapper::new(Arc::clone(&registry), Arc::new(loader))
        .with_load_timeout(config.bootstrap.load_timeout_secs.map(Duration::from_secs))
        .spawn();

    let shutdown = CancellationToken::new();
    let require_all_ready = config.bootstrap.require_all_ready;
    let monitor = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let report = bootstrap.await.context("Bootstrap task failed")?;
            for (category, reason) in &report.failed {
                warn!(category = %category, error = %reason, "Model unavailable");
            }
            if require_all_ready && !report.all_ready() {
                error!(
                    "bootstrap.require_all_ready is set and {} model(s) failed",
                    report.failed.len()
                );
                shutdown.cancel();
                anyhow::bail!("{} model(s) failed to load", report.failed.len());
            }
            Ok::<(), anyhow::Error>(())
        })
    };

    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        Arc::clone(&registry),
        AnalysisLimits::from(&config.analysis),
    ));
    let state = AppState::new(orchestrator, authenticator);
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("textsense-ta listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    if monitor.is_finished() {
        monitor.await.context("Bootstrap monitor failed")??;
    } else {
        monitor.abort();
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown on Ctrl+C, SIGTERM, or an internal fatal condition
async fn shutdown_signal(internal: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = internal.cancelled() => warn!("Shutting down after fatal bootstrap failure"),
    }
}
