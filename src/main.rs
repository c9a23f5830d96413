//! Halves Back binary entrypoint wiring REST, WebSocket, presence, and storage layers.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{BoxError, Router, error_handling::HandleErrorLayer, http::StatusCode};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use halves_back::{
    config::AppConfig,
    routes,
    services::presence_service,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let max_concurrent = config.max_concurrent_requests();
    let state = AppState::new(config);

    storage::spawn(state.clone()).await;
    tokio::spawn(presence_service::run_sweeper(state.clone()));

    let app = build_router(state, max_concurrent);

    let port = std::env::var("PORT")
        .or_else(|_| std::env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

mod storage {
    //! Storage backend selection: MongoDB under supervision when configured,
    //! the in-memory store otherwise.

    use std::sync::Arc;

    use tracing::info;

    use halves_back::{
        dao::memory::MemoryStore,
        services::storage_supervisor,
        state::SharedState,
    };

    /// Install a storage backend, preferring MongoDB when `MONGO_URI` is set.
    pub async fn spawn(state: SharedState) {
        #[cfg(feature = "mongo-store")]
        if let Ok(uri) = std::env::var("MONGO_URI") {
            spawn_mongo(state, uri);
            return;
        }

        state.set_store(Arc::new(MemoryStore::new())).await;
        storage_supervisor::on_store_ready(&state).await;
        info!("no MONGO_URI configured; using in-memory storage");
    }

    #[cfg(feature = "mongo-store")]
    fn spawn_mongo(state: SharedState, uri: String) {
        use halves_back::dao::{
            mongodb::{MongoConfig, MongoStore},
            storage::StorageError,
            store::Store,
        };

        let db_name = std::env::var("MONGO_DB").ok();
        tokio::spawn(storage_supervisor::run(state, move || {
            let uri = uri.clone();
            let db_name = db_name.clone();
            async move {
                let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                    .await
                    .map_err(StorageError::from)?;
                let store = MongoStore::connect(config)
                    .await
                    .map_err(StorageError::from)?;
                Ok(Arc::new(store) as Arc<dyn Store>)
            }
        }));
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState, max_concurrent: usize) -> Router<()> {
    routes::router(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .load_shed()
                .concurrency_limit(max_concurrent),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Map overload shedding to 503 and anything else to a generic 500.
async fn handle_middleware_error(err: BoxError) -> (StatusCode, &'static str) {
    if err.is::<tower::load_shed::error::Overloaded>() {
        (StatusCode::SERVICE_UNAVAILABLE, "server busy")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
