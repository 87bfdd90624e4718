// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Network Reachability Probe and the shared network status cell.

use crate::error::{AppError, Result};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Best-effort "can the remote store be reached right now".
pub trait ReachabilityProbe: Send + Sync {
    fn is_reachable(&self) -> BoxFuture<'_, bool>;
}

/// Probe that sends a short-timeout request to the data service.
///
/// Any HTTP response, including an error status, counts as reachable. Only a
/// transport failure or timeout counts as unreachable.
pub struct HttpProbe {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpProbe {
    pub fn new(remote_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build probe client: {}", e)))?;
        Ok(Self {
            http,
            url: format!("{}/rest/v1/", remote_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }
}

impl ReachabilityProbe for HttpProbe {
    fn is_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self
                .http
                .head(&self.url)
                .header("apikey", &self.api_key)
                .send()
                .await
            {
                Ok(response) => {
                    tracing::debug!(status = %response.status(), "Remote store reachable");
                    true
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Remote store unreachable");
                    false
                }
            }
        })
    }
}

/// Last observed reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reachability {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Shared reachability cell, updated by probes and by observed connectivity
/// faults.
#[derive(Clone)]
pub struct NetworkStatus {
    tx: Arc<watch::Sender<Reachability>>,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(Reachability::Unknown);
        Self { tx: Arc::new(tx) }
    }
}

impl NetworkStatus {
    pub fn get(&self) -> Reachability {
        *self.tx.borrow()
    }

    pub fn is_offline(&self) -> bool {
        self.get() == Reachability::Offline
    }

    /// Record an observation and return the previous value.
    pub fn set(&self, reachability: Reachability) -> Reachability {
        let previous = self.tx.send_replace(reachability);
        if previous != reachability {
            tracing::info!(from = ?previous, to = ?reachability, "Reachability changed");
        }
        previous
    }

    /// Probe and record. Returns `(previous, current)`.
    pub async fn refresh(&self, probe: &dyn ReachabilityProbe) -> (Reachability, Reachability) {
        let current = if probe.is_reachable().await {
            Reachability::Online
        } else {
            Reachability::Offline
        };
        (self.set(current), current)
    }

    pub fn subscribe(&self) -> watch::Receiver<Reachability> {
        self.tx.subscribe()
    }
}
