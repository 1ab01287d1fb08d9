//! In-process identity provider for local development and tests.
//!
//! Starting a sign-in only records the pending redirect; the OAuth callback
//! is played by `complete_redirect`, which issues a session and broadcasts
//! `SignedIn` the same way a hosted provider would after the round trip.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use super::{AuthEvent, AuthNotification, IdentityProvider, Session};
use crate::error::AuthError;

const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Identity claims delivered by the OAuth callback.
#[derive(Debug, Clone, Default)]
pub struct OAuthClaims {
    pub subject_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub name: Option<String>,
}

/// A sign-in that has left for the provider and not yet come back.
#[derive(Debug, Clone)]
pub struct PendingRedirect {
    pub provider: String,
    pub redirect_to: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
struct LocalState {
    session: Option<Session>,
    pending: Option<PendingRedirect>,
}

pub struct LocalIdentityProvider {
    state: RwLock<LocalState>,
    tx: broadcast::Sender<AuthNotification>,
    reachable: AtomicBool,
    session_ttl: chrono::Duration,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            state: RwLock::new(LocalState::default()),
            tx,
            reachable: AtomicBool::new(true),
            session_ttl: chrono::Duration::hours(1),
        }
    }

    /// Simulate the provider going offline. Sign-in and sign-out requests
    /// fail while unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub async fn pending_redirect(&self) -> Option<PendingRedirect> {
        self.state.read().await.pending.clone()
    }

    /// Finish the OAuth round trip: issue a session and broadcast `SignedIn`.
    pub async fn complete_redirect(&self, claims: OAuthClaims) -> Result<Session, AuthError> {
        if claims.subject_id.trim().is_empty() {
            return Err(AuthError::SessionLookup(
                "callback carried no subject id".to_string(),
            ));
        }

        let session = self.issue(&claims);
        {
            let mut state = self.state.write().await;
            match state.pending.take() {
                Some(pending) => debug!(
                    user_id = %claims.subject_id,
                    provider = %pending.provider,
                    waited_ms = (Utc::now() - pending.started_at).num_milliseconds(),
                    "Callback matched pending redirect"
                ),
                None => debug!(user_id = %claims.subject_id, "Callback completed without a pending redirect"),
            }
            state.session = Some(session.clone());
        }

        info!(user_id = %session.subject_id, "Local provider issued session");
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Re-issue the current session's token and broadcast `TokenRefreshed`.
    pub async fn refresh(&self) -> Option<Session> {
        let refreshed = {
            let mut state = self.state.write().await;
            let current = state.session.as_mut()?;
            current.access_token = SecretString::from(Uuid::new_v4().to_string());
            current.expires_at = Some(Utc::now() + self.session_ttl);
            current.clone()
        };
        self.emit(AuthEvent::TokenRefreshed, Some(refreshed.clone()));
        Some(refreshed)
    }

    fn issue(&self, claims: &OAuthClaims) -> Session {
        Session {
            access_token: SecretString::from(Uuid::new_v4().to_string()),
            subject_id: claims.subject_id.clone(),
            email: claims.email.clone(),
            display_name: Session::display_name_from_claims(
                claims.full_name.as_deref(),
                claims.name.as_deref(),
            ),
            expires_at: Some(Utc::now() + self.session_ttl),
        }
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        // Ok if nobody is subscribed yet
        let _ = self.tx.send(AuthNotification { event, session });
    }

    fn ensure_reachable(&self) -> Result<(), String> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("identity provider unreachable".to_string())
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn initiate_oauth_sign_in(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        self.ensure_reachable()
            .map_err(|reason| AuthError::Initiation {
                provider: provider.to_string(),
                reason,
            })?;

        let mut state = self.state.write().await;
        state.pending = Some(PendingRedirect {
            provider: provider.to_string(),
            redirect_to: redirect_to.to_string(),
            started_at: Utc::now(),
        });
        debug!(provider, redirect_to, "OAuth redirect pending");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.ensure_reachable().map_err(AuthError::SignOut)?;

        {
            let mut state = self.state.write().await;
            state.session = None;
            state.pending = None;
        }
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let state = self.state.read().await;
        Ok(state
            .session
            .as_ref()
            .filter(|s| !s.is_expired(Utc::now()))
            .cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthNotification> {
        self.tx.subscribe()
    }
}
