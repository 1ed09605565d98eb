// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Read-through cached client for the external secret store.
//!
//! The store itself (Vault or an equivalent KV engine) is out of scope here —
//! this crate only speaks the read path tools need: fetch a tenant-scoped
//! secret by key, with a short-lived in-process cache so a burst of tool
//! calls during one investigation doesn't hammer the backend for the same
//! credential.

use std::sync::Mutex;
use std::time::Duration;

use cached::{Cached, TimedCache};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use aurora_config::SecretsConfig;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("secret store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("secret store returned malformed response")]
    Malformed,
}

fn cache_key(tenant_id: Uuid, key: &str) -> String {
    format!("{tenant_id}:{key}")
}

/// Thin client over the secret store's read API with a TTL cache keyed by
/// `(tenant_id, key)`.
pub struct SecretStore {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<TimedCache<String, String>>,
}

impl SecretStore {
    pub fn new(cfg: &SecretsConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("secret store http client"),
            base_url: cfg.base_url.clone(),
            cache: Mutex::new(TimedCache::with_lifespan(cfg.cache_ttl_secs)),
        }
    }

    /// Fetch a secret, serving from cache when present and unexpired.
    pub async fn get(&self, tenant_id: Uuid, key: &str) -> Result<String, SecretError> {
        let cache_key = cache_key(tenant_id, key);

        if let Some(hit) = self.cache.lock().unwrap().cache_get(&cache_key) {
            debug!(%tenant_id, key, "secret cache hit");
            return Ok(hit.clone());
        }

        let url = format!("{}/{}/{}", self.base_url, tenant_id, key);
        let resp = self.client.get(&url).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound(key.to_string()));
        }
        let resp = resp.error_for_status()?;

        #[derive(serde::Deserialize)]
        struct SecretResponse {
            value: String,
        }
        let body: SecretResponse = resp.json().await.map_err(|_| SecretError::Malformed)?;

        self.cache
            .lock()
            .unwrap()
            .cache_set(cache_key, body.value.clone());

        Ok(body.value)
    }

    /// Drop any cached value for `(tenant_id, key)`, forcing the next read
    /// to go to the backend. Used after a secret rotation is reported.
    pub fn invalidate(&self, tenant_id: Uuid, key: &str) {
        self.cache.lock().unwrap().cache_remove(&cache_key(tenant_id, key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SecretsConfig {
        SecretsConfig {
            base_url: "http://127.0.0.1:1/v1/secret".to_string(),
            cache_ttl_secs: 300,
        }
    }

    #[test]
    fn cache_key_scopes_by_tenant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(cache_key(a, "k"), cache_key(b, "k"));
    }

    #[tokio::test]
    async fn invalidate_on_empty_cache_is_a_no_op() {
        let store = SecretStore::new(&cfg());
        store.invalidate(Uuid::new_v4(), "anything");
    }

    #[tokio::test]
    async fn get_against_unreachable_host_is_a_request_error() {
        let store = SecretStore::new(&cfg());
        let err = store.get(Uuid::new_v4(), "aws/access_key").await.unwrap_err();
        assert!(matches!(err, SecretError::Request(_)));
    }
}
