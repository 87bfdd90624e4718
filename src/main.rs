// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PawTrack headless sync runner
//!
//! Hydrates every domain from the data directory and keeps the local copy in
//! sync with the hosted data service until interrupted.

use pawtrack::{
    config::Config,
    services::{Identity, IdentityProvider, NoopBreedAnalysis},
    SyncContext,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        remote = %config.remote_url,
        data_dir = %config.data_dir.display(),
        "Starting PawTrack sync runner"
    );

    // Session handed over by the host app, if any. Guest mode otherwise.
    let identity = Arc::new(match session_from_env() {
        Some(identity) => IdentityProvider::signed_in(identity),
        None => IdentityProvider::guest(),
    });
    tracing::info!(
        authenticated = identity.is_authenticated(),
        "Identity initialized"
    );

    let context = SyncContext::from_config(&config, identity, Arc::new(NoopBreedAnalysis))?;
    let tasks = context.start(config.poll_interval).await;
    tracing::info!(
        poll_secs = config.poll_interval.as_secs(),
        unsynced = context.orchestrator.has_unsynced_changes().await,
        "Sync runner ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    tasks.abort();
    Ok(())
}

fn session_from_env() -> Option<Identity> {
    let user_id = std::env::var("PAWTRACK_USER_ID").ok()?;
    let access_token = std::env::var("PAWTRACK_ACCESS_TOKEN").ok()?;
    Some(Identity {
        user_id,
        access_token,
    })
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pawtrack=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
