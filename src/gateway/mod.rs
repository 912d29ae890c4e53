//! HTTP gateway exposing the router, the agents and the orchestrator.
//!
//! One binary serves any single role or all of them at once. Every role
//! answers `/health`, `/metrics` and `/queues/{channel}`.

pub mod api;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router as HttpRouter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::agents::{create_registry, AgentRegistry};
use crate::config::{Config, GatewayConfig};
use crate::observability::{instrument_registry, MeteredQueue, MeteredRouter, Metrics};
use crate::orchestrator::{LocalTransport, Orchestrator};
use crate::queue::MessageQueue;
use crate::routing::{create_router, Router};

/// Which endpoints a gateway process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ServiceRole {
    #[default]
    All,
    Router,
    Technical,
    Account,
}

impl ServiceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Router => "router",
            Self::Technical => "technical",
            Self::Account => "account",
        }
    }
}

impl std::fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub role: ServiceRole,
    pub router: Arc<dyn Router>,
    pub agents: AgentRegistry,
    pub queue: Arc<dyn MessageQueue>,
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire the router, agents and in-process orchestrator over `queue`,
    /// with every component instrumented.
    pub fn new(config: &Config, queue: Arc<dyn MessageQueue>, role: ServiceRole) -> Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let queue: Arc<dyn MessageQueue> =
            Arc::new(MeteredQueue::new(queue, Arc::clone(&metrics)));
        let router: Arc<dyn Router> = Arc::new(MeteredRouter::new(
            create_router(config.classifier.clone(), Arc::clone(&queue)),
            Arc::clone(&metrics),
        ));
        let agents = instrument_registry(&create_registry(config, Arc::clone(&queue)), &metrics);
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(LocalTransport::new(
            Arc::clone(&router),
            agents.clone(),
        ))));

        Ok(Self {
            role,
            router,
            agents,
            queue,
            orchestrator,
            metrics,
        })
    }
}

/// Build the axum app for the state's role.
pub fn build_app(state: AppState, gateway: &GatewayConfig) -> HttpRouter {
    let common = HttpRouter::<AppState>::new()
        .route("/health", get(api::handle_health))
        .route("/metrics", get(api::handle_metrics))
        .route("/queues/{channel}", get(api::handle_queue_depth));

    let role_routes = match state.role {
        ServiceRole::Router => {
            HttpRouter::<AppState>::new().route("/route_ticket", post(api::handle_route_ticket))
        }
        ServiceRole::Technical => {
            HttpRouter::new().route("/handle_ticket", post(api::handle_technical_ticket))
        }
        ServiceRole::Account => {
            HttpRouter::new().route("/handle_ticket", post(api::handle_account_ticket))
        }
        ServiceRole::All => HttpRouter::new()
            .route("/route_ticket", post(api::handle_route_ticket))
            .route("/technical/handle_ticket", post(api::handle_technical_ticket))
            .route("/account/handle_ticket", post(api::handle_account_ticket))
            .route("/process", post(api::handle_process)),
    };

    common
        .merge(role_routes)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(gateway.body_limit_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    gateway.request_timeout_secs,
                ))),
        )
        .layer(middleware::map_response(api::json_error_bodies))
        .with_state(state)
}

/// Serve on an already-bound listener until the process is interrupted.
pub async fn serve(listener: TcpListener, app: HttpRouter) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("gateway server error")
}

/// Bind `host:port` and serve the state's role.
pub async fn run_gateway(config: &Config, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind gateway on {addr}"))?;
    let local_addr = listener.local_addr().context("listener has no local address")?;

    tracing::info!(
        role = %state.role,
        queue = state.queue.name(),
        "🎫 Ticket desk gateway listening on http://{local_addr}"
    );

    let app = build_app(state, &config.gateway);
    serve(listener, app).await
}
