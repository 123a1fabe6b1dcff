use std::{net::SocketAddr, sync::Arc};

mod app;
mod config;
mod db;
mod error;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState, users::mongo::MongoUsersStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "modmapper=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let (client, database) = db::connect(&config.mongo).await?;

    let state = AppState::new(Arc::new(MongoUsersStore::new(&database)));
    let app = app::build_app(state, &config.cors_origin)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let served = app::serve(app, addr).await;

    db::disconnect(client).await;
    served
}
