// Framework bootstrap for the relay runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{
    create_object_handler, delete_object_handler, spawn_object_serializer, ws_handler,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{ObjectRegistry, ObjectSettings};

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state().await?;
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/objects", post(create_object_handler))
        .route("/objects/{object_id}", delete(delete_object_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

async fn build_state() -> Result<Arc<AppState>> {
    // Bad tuning would desynchronize every node, so refuse to start.
    let tuning = config::sync_tuning()
        .validate()
        .map_err(|e| std::io::Error::other(format!("invalid sync tuning: {e}")))?;
    let default_width = config::default_object_width();
    tracing::debug!(
        sync_period = tuning.sync_period,
        lerp_step = tuning.lerp_step,
        max_batch_width = ?tuning.max_batch_width,
        default_width = ?default_width,
        "sync tuning configured"
    );

    let object_registry = Arc::new(ObjectRegistry::new(ObjectSettings {
        input_channel_capacity: config::INPUT_CHANNEL_CAPACITY,
        delta_broadcast_capacity: config::DELTA_BROADCAST_CAPACITY,
        default_width,
        max_list_len: config::max_list_len(),
    }));

    // Nodes that connect without naming an object share this one.
    let default_object = object_registry
        .create_object(config::DEFAULT_OBJECT_ID.to_string(), None)
        .await
        .map_err(|e| std::io::Error::other(format!("failed to create default object: {e:?}")))?;
    spawn_object_serializer(&default_object);

    Ok(Arc::new(AppState {
        object_registry,
        default_object_id: default_object.object_id.clone(),
        tuning,
    }))
}
