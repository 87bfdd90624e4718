// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity Provider.
//!
//! Holds the current authenticated identity (or none, for guest mode) and a
//! refresh trigger that increments on every login and logout. Sign-in flows
//! live outside the core; they only call [`IdentityProvider::sign_in`] and
//! [`IdentityProvider::sign_out`].

use tokio::sync::watch;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub access_token: String,
}

/// Snapshot published to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    pub identity: Option<Identity>,
    pub refresh_trigger: u64,
}

/// Current identity plus change notifications.
pub struct IdentityProvider {
    tx: watch::Sender<IdentityState>,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::guest()
    }
}

impl IdentityProvider {
    /// Provider starting in guest mode.
    pub fn guest() -> Self {
        let (tx, _rx) = watch::channel(IdentityState::default());
        Self { tx }
    }

    /// Provider starting signed in.
    pub fn signed_in(identity: Identity) -> Self {
        let provider = Self::guest();
        provider.sign_in(identity);
        provider
    }

    /// Log in, replacing any previous identity.
    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(user_id = %identity.user_id, "Identity signed in");
        self.tx.send_modify(|state| {
            state.identity = Some(identity);
            state.refresh_trigger += 1;
        });
    }

    /// Log out. Local data stays on the device.
    pub fn sign_out(&self) {
        tracing::info!("Identity signed out");
        self.tx.send_modify(|state| {
            state.identity = None;
            state.refresh_trigger += 1;
        });
    }

    /// Replace the access token of the current session without a refresh.
    pub fn update_access_token(&self, access_token: impl Into<String>) {
        let access_token = access_token.into();
        self.tx.send_if_modified(|state| match state.identity.as_mut() {
            Some(identity) => {
                identity.access_token = access_token;
                true
            }
            None => false,
        });
    }

    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().identity.is_some()
    }

    /// Increments on every login and logout.
    pub fn refresh_trigger(&self) -> u64 {
        self.tx.borrow().refresh_trigger
    }

    /// Identity and refresh trigger read together.
    pub fn snapshot(&self) -> IdentityState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: "user-1".to_string(),
            access_token: "token-1".to_string(),
        }
    }

    #[test]
    fn test_refresh_trigger_increments_on_login_and_logout() {
        let provider = IdentityProvider::guest();
        assert!(!provider.is_authenticated());
        assert_eq!(provider.refresh_trigger(), 0);

        provider.sign_in(identity());
        assert!(provider.is_authenticated());
        assert_eq!(provider.refresh_trigger(), 1);

        provider.sign_out();
        assert!(provider.current().is_none());
        assert_eq!(provider.refresh_trigger(), 2);
    }

    #[test]
    fn test_token_update_keeps_trigger() {
        let provider = IdentityProvider::signed_in(identity());
        provider.update_access_token("token-2");
        assert_eq!(provider.current().unwrap().access_token, "token-2");
        assert_eq!(provider.refresh_trigger(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let provider = IdentityProvider::guest();
        let mut rx = provider.subscribe();
        provider.sign_in(identity());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().refresh_trigger, 1);
    }
}
