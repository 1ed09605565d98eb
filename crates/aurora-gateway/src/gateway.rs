// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Gateway startup — assembles every subsystem and starts them.
//!
//! # Startup sequence
//!
//! [`run`] performs these steps in order, then blocks on the HTTP server:
//!
//! 1. Connect the store and construct the secret store client.
//! 2. Construct the delayed-job queue and spawn its worker pool.
//! 3. Load or generate the HTTP bearer token; print it **once** if new.
//! 4. Construct [`GatewayService`] (the live-session registry).
//! 5. Start the Axum HTTPS/WS server (blocks until shutdown).
//!
//! # Token management
//!
//! ```text
//! First start:   token generated -> SHA-256 hash stored in token.yaml
//!                raw token printed once (save it!)
//! Clients:       Authorization: Bearer <token>
//! Rotate:        regenerate_token() -> old token immediately invalid
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use aurora_config::Config;
use aurora_secrets::SecretStore;
use aurora_store::{PgStore, Store};

use crate::control::service::{GatewayDeps, GatewayService};
use crate::crypto::token::StoredTokenFile;
use crate::http::{self, auth::AuthState, AppState};

/// Start the gateway. Runs until Ctrl+C or SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(PgStore::connect(&config.store).await?);
    let secrets = Arc::new(SecretStore::new(&config.secrets));

    let queue = Arc::new(aurora_queue::Queue::new(&config.queue));
    let worker_deps = aurora_queue::WorkerDeps {
        store: store.clone(),
        model_config: config.model.clone(),
        agent_config: Arc::new(config.agent.clone()),
        tools_config: config.tools.clone(),
        secrets: secrets.clone(),
        event_channel_capacity: config.gateway.event_channel_capacity,
    };
    let _workers = queue.spawn_workers(worker_deps, config.queue.worker_count);

    let token_path = default_token_path();
    let token_hash = if token_path.exists() {
        StoredTokenFile::load(&token_path)?.token_hash
    } else {
        info!("generating new gateway bearer token");
        let raw = StoredTokenFile::generate_and_save(&token_path)?;
        info!("=======================================================");
        info!("Gateway bearer token (shown once -- save it now!):");
        info!("  {}", raw.as_str());
        info!("=======================================================");
        StoredTokenFile::load(&token_path)?.token_hash
    };

    let gateway_deps = GatewayDeps {
        store: store.clone(),
        secrets: secrets.clone(),
        default_model: config.model.clone(),
        providers: config.providers.clone(),
        agent_config: Arc::new(config.agent.clone()),
        tools_config: config.tools.clone(),
        event_channel_capacity: config.gateway.event_channel_capacity,
    };
    let gateway_service = GatewayService::new(gateway_deps);

    let auth_state = AuthState::new(token_hash, config.gateway.rate_limit_per_minute, config.gateway.rate_limit_burst);

    let state = AppState {
        gateway: gateway_service,
        auth: auth_state,
        queue,
        secrets,
        store,
        correlation: config.correlation.clone(),
        message_limiter: http::ws::new_message_limiter(),
    };

    info!(bind = %config.gateway.bind_addr, "starting HTTP gateway");
    http::serve(&config.gateway, state).await?;

    Ok(())
}

/// Regenerate the HTTP bearer token, printing the new raw token once.
pub fn regenerate_token() -> anyhow::Result<()> {
    let token_path = default_token_path();
    let raw = StoredTokenFile::generate_and_save(&token_path)?;
    println!("New bearer token (save it now -- it won't be shown again):");
    println!("  {}", raw.as_str());
    println!();
    println!("Usage:  Authorization: Bearer {}", raw.as_str());
    Ok(())
}

fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aurora/gateway/token.yaml")
}
