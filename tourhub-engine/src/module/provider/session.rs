//! Provider session (auth token) lifecycle

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::transport::{Credentials, ProviderTransport};
use crate::clock::Clock;
use crate::error::{AuthError, TransportError};

/// The currently held provider token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True when the token is expired or will expire within `lead`
    pub fn needs_refresh(&self, now: DateTime<Utc>, lead: TimeDelta) -> bool {
        self.is_expired(now) || self.expires_at - now < lead
    }
}

/// Token validity as reported to the stats endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    Absent,
    Valid { expires_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
}

impl AuthState {
    pub fn is_valid(&self) -> bool {
        matches!(self, AuthState::Valid { .. })
    }
}

/// Owns the provider token and refreshes it before it runs out.
///
/// Refreshes are serialised by `refresh_gate`: callers that queue behind an
/// in-progress refresh re-check the session once they get the gate and reuse
/// its outcome, token or error, instead of authenticating again.
pub struct SessionManager {
    transport: Arc<dyn ProviderTransport>,
    credentials: Credentials,
    clock: Arc<dyn Clock>,
    refresh_lead: TimeDelta,
    default_lifetime: TimeDelta,
    auth_timeout: Duration,
    session: RwLock<Option<AuthSession>>,
    refresh_gate: Mutex<()>,
    /// Bumped when an authentication attempt finishes, whatever its outcome
    attempts: AtomicU64,
    last_failure: RwLock<Option<AuthError>>,
    refresh_count: AtomicU64,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        credentials: Credentials,
        clock: Arc<dyn Clock>,
        refresh_lead: TimeDelta,
        default_lifetime: TimeDelta,
        auth_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            credentials,
            clock,
            refresh_lead,
            default_lifetime,
            auth_timeout,
            session: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            attempts: AtomicU64::new(0),
            last_failure: RwLock::new(None),
            refresh_count: AtomicU64::new(0),
        }
    }

    /// Return a usable token, authenticating first if needed
    pub async fn acquire_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.usable_token().await {
            return Ok(token);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;
        if let Some(token) = self.usable_token().await {
            debug!("Provider session refreshed by a concurrent caller");
            return Ok(token);
        }

        // An attempt finished while we queued and left no token: share its error
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(e) = self.last_failure.read().await.clone() {
                debug!("Reusing authentication failure from a concurrent caller");
                return self.current_or(e).await;
            }
        }

        match self.authenticate().await {
            Ok(token) => Ok(token),
            Err(e) => self.current_or(e).await,
        }
    }

    /// A near-expiry token is still better than none
    async fn current_or(&self, error: AuthError) -> Result<String, AuthError> {
        let now = self.clock.now();
        let current = self.session.read().await.clone();
        match current {
            Some(session) if !session.is_expired(now) => {
                warn!(
                    "Provider session refresh failed ({}), keeping token valid until {}",
                    error, session.expires_at
                );
                Ok(session.token)
            }
            _ => Err(error),
        }
    }

    /// Re-authenticate after the provider refused `stale_token`.
    ///
    /// When another caller has already replaced the stale token, the new one is
    /// returned without a second authentication call.
    pub async fn force_refresh(&self, stale_token: &str) -> Result<String, AuthError> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(token) = self.usable_token().await {
            if token != stale_token {
                return Ok(token);
            }
        }

        *self.session.write().await = None;
        self.authenticate().await
    }

    /// Forget the held token; the next caller authenticates from scratch
    pub async fn invalidate(&self) {
        let _gate = self.refresh_gate.lock().await;
        if self.session.write().await.take().is_some() {
            info!("Provider session dropped");
        }
    }

    pub async fn auth_state(&self) -> AuthState {
        let now = self.clock.now();
        match self.session.read().await.as_ref() {
            None => AuthState::Absent,
            Some(session) if session.is_expired(now) => AuthState::Expired {
                expired_at: session.expires_at,
            },
            Some(session) => AuthState::Valid {
                expires_at: session.expires_at,
            },
        }
    }

    /// Number of successful authentications since start
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    async fn usable_token(&self) -> Option<String> {
        let now = self.clock.now();
        self.session
            .read()
            .await
            .as_ref()
            .filter(|session| !session.needs_refresh(now, self.refresh_lead))
            .map(|session| session.token.clone())
    }

    /// Callers must hold `refresh_gate`
    async fn authenticate(&self) -> Result<String, AuthError> {
        let result = self.request_token().await;
        *self.last_failure.write().await = result.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::Release);
        result
    }

    async fn request_token(&self) -> Result<String, AuthError> {
        if !self.credentials.is_configured() {
            return Err(AuthError::MissingCredentials);
        }

        debug!("Authenticating against provider as '{}'", self.credentials.username);
        let grant = match tokio::time::timeout(
            self.auth_timeout,
            self.transport.authenticate(&self.credentials),
        )
        .await
        {
            Ok(result) => result.map_err(auth_error_from_transport)?,
            Err(_) => return Err(AuthError::Transport(TransportError::Timeout.to_string())),
        };

        let token = grant.token.trim().to_string();
        if token.is_empty() {
            return Err(AuthError::InvalidResponse("empty token".to_string()));
        }

        let now = self.clock.now();
        let expires_at = grant
            .expires_in_seconds
            .filter(|seconds| *seconds > 0)
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .or_else(|| now.checked_add_signed(self.default_lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        *self.session.write().await = Some(AuthSession {
            token: token.clone(),
            expires_at,
        });
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        info!("Provider session established, expires at {}", expires_at);

        Ok(token)
    }
}

fn auth_error_from_transport(error: TransportError) -> AuthError {
    match error {
        TransportError::Status(code) if (400..500).contains(&code) => AuthError::Rejected(code),
        TransportError::Decode(message) => AuthError::InvalidResponse(message),
        other => AuthError::Transport(other.to_string()),
    }
}
