//! Identity provider contract: OAuth sign-in, sign-out, sessions and the
//! stream of session-change notifications.

pub mod local;

pub use local::{LocalIdentityProvider, OAuthClaims};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::AuthError;

/// Kind of session-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    InitialSession,
    TokenRefreshed,
    UserUpdated,
}

impl std::fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::InitialSession => "INITIAL_SESSION",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        };
        write!(f, "{s}")
    }
}

/// A session issued by the identity provider. Read-only to the application.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub subject_id: String,
    pub email: String,
    pub display_name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Display name from identity claims: `full_name`, then `name`, then empty.
    pub fn display_name_from_claims(full_name: Option<&str>, name: Option<&str>) -> String {
        full_name
            .filter(|s| !s.trim().is_empty())
            .or(name.filter(|s| !s.trim().is_empty()))
            .unwrap_or_default()
            .to_string()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// One entry of the provider's notification stream.
#[derive(Debug, Clone)]
pub struct AuthNotification {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Begin the OAuth redirect flow with `provider`, returning to `redirect_to`.
    async fn initiate_oauth_sign_in(&self, provider: &str, redirect_to: &str)
    -> Result<(), AuthError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The session currently held, if any.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Subscribe to session-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthNotification>;
}
