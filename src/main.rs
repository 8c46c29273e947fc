use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_hub::{
    config::Config,
    controllers,
    services::{showtime_clock::ShowtimeClock, sweeper::ExpirySweeper},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cinema Hub API");

    let port = config.app.port;
    let app_state = AppState::new(config).await?;

    // --- Фоновые задачи ---

    // Снятие неоплаченных броней и напоминания - каждую минуту
    let sweeper = ExpirySweeper::new(app_state.clone());
    task::spawn(async move {
        loop {
            sweeper.run_once().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    });

    // Часы жизненного цикла сеансов - каждую минуту
    let clock = ShowtimeClock::new(app_state.clone());
    task::spawn(async move {
        loop {
            clock.run_once().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    });

    // --- Веб-сервер ---

    let app = Router::new()
        .route("/", get(|| async { "Cinema Hub API v1.0" }))
        .route("/health", get(health))
        .nest("/api/v1", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.db.ping().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "database unreachable")
    }
}
