//! `ShifumiServer` builder and serve loop.
//!
//! Both services are built the same way: probe the log until it is
//! usable, bind, then serve. The game-logic service additionally runs the
//! round resolver next to the HTTP server for as long as it serves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use futures_util::future::BoxFuture;
use shifumi_engine::{
    ChoiceIngestor, EngineConfig, EngineError, LogBackedRepository,
    RoundResolver,
};
use shifumi_log::EventLog;
use shifumi_monitor::{AvailabilityConfig, AvailabilityMonitor, BackoffPolicy};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, IngestState, LogicState};
use crate::{ServiceConfig, ShifumiError};

/// Which service a server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// `POST /play`
    Ingest,
    /// `GET /stats` plus the round resolver.
    Logic,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Logic => "game-logic",
        }
    }
}

/// Builder for configuring and starting a shifumi service.
///
/// # Example
///
/// ```rust,ignore
/// use shifumi::prelude::*;
///
/// let server = ShifumiServer::builder()
///     .bind("0.0.0.0:8081")
///     .build_ingest(log)
///     .await?;
/// server.run().await
/// ```
pub struct ShifumiServerBuilder {
    bind_addr: String,
    engine: EngineConfig,
    probe: BackoffPolicy,
}

impl ShifumiServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8081".to_string(),
            engine: EngineConfig::default(),
            probe: BackoffPolicy::default(),
        }
    }

    /// Takes the read deadline and probe backoff from `config`. The bind
    /// address still has to be chosen per service.
    pub fn config(self, config: &ServiceConfig) -> Self {
        self.engine_config(config.engine_config())
            .probe_backoff(config.probe)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets topics, consumer groups and deadlines.
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    /// Sets the backoff of the startup availability probe.
    pub fn probe_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.probe = policy;
        self
    }

    /// Builds the ingest service over `log`.
    ///
    /// Blocks until the log is available.
    pub async fn build_ingest<L: EventLog>(
        self,
        log: Arc<L>,
    ) -> Result<ShifumiServer, ShifumiError> {
        self.wait_for_log(&log).await;
        let listener = TcpListener::bind(self.bind_addr.as_str()).await?;
        let (shutdown, _) = watch::channel(false);

        let state = Arc::new(IngestState {
            ingestor: ChoiceIngestor::new(log, &self.engine),
        });
        let router = Router::new()
            .route("/play", post(handler::play::<L>))
            .route("/health", get(handler::health))
            .with_state(state);

        Ok(ShifumiServer {
            role: Role::Ingest,
            listener,
            router,
            shutdown,
            resolver: None,
        })
    }

    /// Builds the game-logic service over `log`.
    ///
    /// Blocks until the log is available. The resolver recovers sessions
    /// it hasn't seen from the snapshot log.
    pub async fn build_logic<L: EventLog>(
        self,
        log: Arc<L>,
    ) -> Result<ShifumiServer, ShifumiError> {
        self.wait_for_log(&log).await;
        let listener = TcpListener::bind(self.bind_addr.as_str()).await?;
        let (shutdown, _) = watch::channel(false);

        let resolver = RoundResolver::new(
            LogBackedRepository::new(Arc::clone(&log), &self.engine),
            Arc::clone(&log),
            self.engine.clone(),
        );
        let resolver_shutdown = shutdown.subscribe();
        let resolver: BoxFuture<'static, Result<(), EngineError>> =
            Box::pin(async move { resolver.run(resolver_shutdown).await });

        let state = Arc::new(LogicState {
            log,
            config: self.engine,
            shutdown: shutdown.subscribe(),
        });
        let router = Router::new()
            .route("/stats", get(handler::stats::<L>))
            .route("/health", get(handler::health))
            .with_state(state);

        Ok(ShifumiServer {
            role: Role::Logic,
            listener,
            router,
            shutdown,
            resolver: Some(resolver),
        })
    }

    async fn wait_for_log<L: EventLog>(&self, log: &Arc<L>) {
        let config = AvailabilityConfig::new(self.engine.topics())
            .with_backoff(self.probe);
        AvailabilityMonitor::new(Arc::clone(log), config)
            .wait_until_available()
            .await;
    }
}

impl Default for ShifumiServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound shifumi service.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// serving.
pub struct ShifumiServer {
    role: Role,
    listener: TcpListener,
    router: Router,
    shutdown: watch::Sender<bool>,
    resolver: Option<BoxFuture<'static, Result<(), EngineError>>>,
}

impl ShifumiServer {
    /// Creates a new builder.
    pub fn builder() -> ShifumiServerBuilder {
        ShifumiServerBuilder::new()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until the process is terminated.
    pub async fn run(self) -> Result<(), ShifumiError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `signal` completes, then shuts down gracefully.
    ///
    /// Open `/stats` streams end, in-flight requests finish, and the
    /// resolver stops after the record it is handling.
    pub async fn run_until<F>(self, signal: F) -> Result<(), ShifumiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            role,
            listener,
            router,
            shutdown,
            resolver,
        } = self;
        let app = router
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        let resolver = resolver.map(tokio::spawn);
        tracing::info!(service = role.as_str(), addr = ?listener.local_addr().ok(), "shifumi server running");

        let graceful = async move {
            signal.await;
            tracing::info!(service = role.as_str(), "shutdown requested");
            shutdown.send_replace(true);
        };
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .await;

        if let Some(task) = resolver {
            match task.await {
                Ok(result) => result?,
                Err(e) => tracing::error!(error = %e, "resolver task failed"),
            }
        }
        served?;
        tracing::info!(service = role.as_str(), "shifumi server stopped");
        Ok(())
    }
}
