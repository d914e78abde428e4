mod boards;
mod config;
mod db;
mod frame;
mod gateway;
mod history;
mod owner;
mod routes;
mod services;
mod snapshot;
mod state;
mod surface;
mod whiteboard;

use std::sync::Arc;

use gateway::{MemoryGateway, PersistenceGateway, PgGateway};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();

    let gateway: Arc<dyn PersistenceGateway> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            Arc::new(PgGateway::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; boards are kept in memory only");
            Arc::new(MemoryGateway::new())
        }
    };

    let port = config.port;
    let state = state::AppState::new(gateway, config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "boardroom listening");
    axum::serve(listener, app).await.expect("server failed");
}
