// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP surface: WebSocket live-session endpoint, webhook ingress, and the
//! security/auth middleware stack shared by both.

pub mod auth;
pub mod security;
pub mod webhooks;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use aurora_config::{CorrelationConfig, GatewayConfig};
use aurora_secrets::SecretStore;
use aurora_store::Store;

use crate::control::service::GatewayService;
use auth::AuthState;
use ws::ClientLimiter;

/// State threaded through every HTTP/WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayService>,
    pub auth: AuthState,
    pub queue: Arc<aurora_queue::Queue>,
    pub secrets: Arc<SecretStore>,
    pub store: Arc<dyn Store>,
    pub correlation: CorrelationConfig,
    pub message_limiter: Arc<ClientLimiter>,
}

impl auth::AsAuthState for AppState {
    fn auth_state(&self) -> &AuthState {
        &self.auth
    }
}

pub fn router(state: AppState) -> Router {
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::bearer_auth_mw::<AppState>));

    let webhook_routes = Router::new().route("/webhooks/:tenant_id/:source", post(webhooks::webhook_handler));

    Router::new()
        .merge(ws_routes)
        .merge(webhook_routes)
        .layer(axum::middleware::from_fn(security::security_headers))
        .layer(axum::middleware::from_fn(security::csrf_guard))
        .with_state(state)
}

/// Binds `cfg.bind_addr` and serves until the process is signalled to stop.
pub async fn serve(cfg: &GatewayConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let addr: SocketAddr = cfg.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway HTTP server listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
