//! The game-logic service: round resolver and `GET /stats` over Kafka.

use std::sync::Arc;

use shifumi::prelude::*;
use shifumi_log::{KafkaConfig, KafkaLog};

#[tokio::main]
async fn main() -> Result<(), ShifumiError> {
    shifumi::init_tracing();
    let config = ServiceConfig::from_env()?;
    tracing::info!(broker = %config.broker, "starting game-logic service");

    let log = Arc::new(KafkaLog::connect(KafkaConfig::new(&config.broker))?);
    let server = ShifumiServer::builder()
        .config(&config)
        .bind(&config.logic_addr)
        .build_logic(log)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "game-logic service listening");
    server.run_until(shifumi::shutdown_signal()).await?;
    Ok(())
}
