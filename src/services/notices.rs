// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transient, auto-dismissing user notices.

use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// A write was kept locally and will sync on reconnect.
    OfflineWillSync,
    /// A manual sync was requested while unreachable.
    YouAreOffline,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::OfflineWillSync => "You're offline. Changes will sync automatically.",
            Notice::YouAreOffline => "You're offline. Try again when you're back online.",
        }
    }

    pub fn dismiss_after(self) -> Duration {
        Duration::from_secs(3)
    }
}

/// Notice fan-out. Nobody listening is fine.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }
}

impl Notifier {
    pub fn notify(&self, notice: Notice) {
        tracing::debug!(?notice, "Notice");
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}
