use std::time::Duration;

use anyhow::Context;
use mongodb::{bson::doc, options::ClientOptions, Client, Database};

use crate::config::MongoConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect and ping once so a bad URI fails startup instead of the first
/// request.
pub async fn connect(config: &MongoConfig) -> anyhow::Result<(Client, Database)> {
    let mut options = ClientOptions::parse(&config.uri)
        .await
        .context("parse MONGODB_URI")?;
    options.connect_timeout = Some(CONNECT_TIMEOUT);
    options.server_selection_timeout = Some(CONNECT_TIMEOUT);
    options
        .app_name
        .get_or_insert_with(|| env!("CARGO_PKG_NAME").to_string());

    let client = Client::with_options(options).context("build mongodb client")?;
    let db = client.database(&config.database);

    tokio::time::timeout(CONNECT_TIMEOUT, async {
        db.run_command(doc! { "ping": 1 }).await
    })
    .await
    .context("mongodb ping timed out")?
    .context("mongodb ping")?;

    tracing::info!(database = %config.database, "connected to mongodb");
    Ok((client, db))
}

pub async fn disconnect(client: Client) {
    let shutdown = async move { client.shutdown().await };
    match tokio::time::timeout(DISCONNECT_TIMEOUT, shutdown).await {
        Ok(()) => tracing::info!("mongodb client closed"),
        Err(_) => tracing::warn!("mongodb shutdown timed out"),
    }
}
