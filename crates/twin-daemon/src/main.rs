//! twin-daemon entry point.
//!
//! Loads config and sets up tracing, then builds the reconciler context and
//! shared state, spawns the background tasks and starts the HTTP server.
//! Handlers live in `routes.rs`; shared state and the loop task in
//! `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};
use twin_config::{
    load_layered_yaml, report_unused_keys, resolve_connection_string, UnusedKeyPolicy,
};
use twin_daemon::{actuator::LoggingActuator, hub::LoopbackHub, routes, state};
use twin_reconcile::{inbound_queue, ReconcilerContext, ReconcilerSettings};

#[derive(Parser, Debug)]
#[command(name = "twin-daemon")]
#[command(about = "Outlet device twin reconciliation daemon", long_about = None)]
struct Cli {
    /// Config layers, base first; later files override earlier ones.
    #[arg(long = "config", value_name = "PATH")]
    config: Vec<String>,

    /// Override `daemon.bind_addr`.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Refuse to start when the config carries keys nothing reads.
    #[arg(long, default_value_t = false)]
    strict_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let cli = Cli::parse();

    let paths: Vec<&str> = cli.config.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths).context("config load failed")?;
    let policy = if cli.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = report_unused_keys(&loaded.config_json, policy)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(key = %ptr, "config key is not read by anything");
    }
    let cfg = loaded.twin()?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let connection = resolve_connection_string(&loaded.config_json)?;
    let device_id = connection
        .as_ref()
        .map(|cs| cs.device_id.clone())
        .or_else(|| cfg.device.device_id.clone());
    match &connection {
        Some(cs) => info!(host = %cs.host_name, device = %cs.device_id, "connection string resolved"),
        None => info!(
            env = %cfg.transport.connection_string_env,
            "no connection string; running against the loopback hub only"
        ),
    }

    let (inbound, rx) = inbound_queue(cfg.reconcile.inbound_queue_capacity);
    let ctx = ReconcilerContext::new(
        rx,
        ReconcilerSettings {
            aux_fields: cfg.telemetry.aux_fields.clone(),
        },
    );
    let shared = Arc::new(state::AppState::new(inbound.clone(), device_id, ctx.snapshot()));

    let hub = LoopbackHub::new(shared.bus.clone(), inbound, cfg.transport.auto_confirm);
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_reconcile_loop(
        Arc::clone(&shared),
        ctx,
        hub,
        LoggingActuator::new(),
        Duration::from_millis(cfg.reconcile.tick_interval_ms),
    );

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match cli.bind {
        Some(addr) => addr,
        None => cfg
            .daemon
            .bind_addr
            .parse()
            .with_context(|| format!("invalid daemon.bind_addr '{}'", cfg.daemon.bind_addr))?,
    };
    info!("twin-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
