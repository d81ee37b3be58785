//! The ingest service: `POST /play` over Kafka.

use std::sync::Arc;

use shifumi::prelude::*;
use shifumi_log::{KafkaConfig, KafkaLog};

#[tokio::main]
async fn main() -> Result<(), ShifumiError> {
    shifumi::init_tracing();
    let config = ServiceConfig::from_env()?;
    tracing::info!(broker = %config.broker, "starting ingest service");

    let log = Arc::new(KafkaLog::connect(KafkaConfig::new(&config.broker))?);
    let server = ShifumiServer::builder()
        .config(&config)
        .bind(&config.ingest_addr)
        .build_ingest(log)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "ingest service listening");
    server.run_until(shifumi::shutdown_signal()).await?;
    Ok(())
}
