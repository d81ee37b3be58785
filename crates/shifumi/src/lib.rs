//! # Shifumi
//!
//! Rock, paper, scissors over an append-only log.
//!
//! Two stateless HTTP services cooperate through two topics:
//!
//! - the **ingest** service validates `POST /play` requests against the
//!   latest published session snapshot and appends choice events;
//! - the **game-logic** service runs the round resolver, which applies
//!   choice events in log order and republishes the session after each,
//!   and streams snapshots on `GET /stats`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use shifumi::prelude::*;
//! use shifumi_log::MemoryLog;
//!
//! # async fn start() -> Result<(), ShifumiError> {
//! let log = Arc::new(MemoryLog::new());
//! let ingest = ShifumiServer::builder()
//!     .bind("127.0.0.1:8081")
//!     .build_ingest(Arc::clone(&log))
//!     .await?;
//! let logic = ShifumiServer::builder()
//!     .bind("127.0.0.1:8082")
//!     .build_logic(log)
//!     .await?;
//! tokio::spawn(logic.run());
//! ingest.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServiceConfig};
pub use error::ShifumiError;
pub use server::{Role, ShifumiServer, ShifumiServerBuilder};

use tracing_subscriber::EnvFilter;

pub mod prelude {
    pub use crate::{
        ConfigError, Role, ServiceConfig, ShifumiError, ShifumiServer,
        ShifumiServerBuilder,
    };
    pub use shifumi_engine::{EngineConfig, IngestError};
    pub use shifumi_log::EventLog;
    pub use shifumi_monitor::BackoffPolicy;
    pub use shifumi_protocol::{
        Choice, ChoiceRequest, ChoiceResponse, PlayerSlot, SessionId,
    };
    pub use shifumi_session::{Session, SessionStatus};
}

/// Installs the `fmt` subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Completes on ctrl-c. If the signal handler can't be installed, never
/// completes.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
