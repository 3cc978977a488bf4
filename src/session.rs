//! Per-request principal resolution.
//!
//! A [`SessionProvider`] answers "who sent this request?" from whatever
//! backs sessions (signed tokens, a session store). [`SessionResolver`]
//! wraps a provider and turns its answer into an `Option<Principal>`:
//!
//! - a session carrying a recognized role becomes a [`Principal`];
//! - a session carrying an unrecognized role, or an empty user id, is
//!   rejected and yields `None`;
//! - no session, a provider error, or a lookup timeout all count as "no
//!   session". Outside production that resolves to the configured fallback
//!   admin; in production it resolves to `None`.
//!
//! The resolver never returns an error. Callers only ever see a principal or
//! its absence.

use std::sync::Arc;
use std::time::Duration;

use hyper::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Config, Environment};
use crate::error::Result;
use crate::permission::Role;
use crate::principal::Principal;
use crate::router::BoxFuture;

/// Raw session data as reported by a provider.
///
/// `role` stays a string here; it becomes a [`Role`] only after validation
/// in [`SessionResolver::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Source of session records.
pub trait SessionProvider: Send + Sync {
    /// Return the session attached to a request, or `None` if there is none.
    ///
    /// Errors are for transport or verification failures.
    fn current_session<'a>(
        &'a self,
        headers: &'a HeaderMap,
    ) -> BoxFuture<'a, Result<Option<SessionRecord>>>;
}

/// Resolves the principal for each request.
pub struct SessionResolver {
    provider: Arc<dyn SessionProvider>,
    environment: Environment,
    fallback: Principal,
    lookup_timeout: Duration,
}

impl SessionResolver {
    /// Create a resolver for the given environment with default fallback
    /// identity and lookup timeout.
    pub fn new(provider: Arc<dyn SessionProvider>, environment: Environment) -> Self {
        let auth = crate::config::Auth::default();
        Self {
            provider,
            environment,
            fallback: Principal::fallback(&auth.fallback),
            lookup_timeout: Duration::from_millis(auth.session_timeout_ms),
        }
    }

    /// Create a resolver from loaded configuration.
    pub fn from_config(provider: Arc<dyn SessionProvider>, config: &Config) -> Self {
        Self {
            provider,
            environment: config.environment,
            fallback: Principal::fallback(&config.auth.fallback),
            lookup_timeout: Duration::from_millis(config.auth.session_timeout_ms),
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Resolve the principal for a request.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let lookup = tokio::time::timeout(self.lookup_timeout, self.provider.current_session(headers));

        let record = match lookup.await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!("Session lookup failed: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "Session lookup timed out after {}ms",
                    self.lookup_timeout.as_millis()
                );
                None
            }
        };

        match record {
            Some(SessionRecord {
                user_id,
                role: Some(role),
                department,
            }) => validate(user_id, &role, department),
            _ => self.without_session(),
        }
    }

    fn without_session(&self) -> Option<Principal> {
        if self.environment.is_production() {
            return None;
        }
        debug!(
            "No session; using {} fallback principal {}",
            self.environment, self.fallback.id
        );
        Some(self.fallback.clone())
    }
}

fn validate(user_id: String, role: &str, department: Option<String>) -> Option<Principal> {
    if user_id.is_empty() {
        warn!("Rejecting session with empty user id");
        return None;
    }
    let Some(role) = Role::parse(role) else {
        warn!("Rejecting session for {user_id}: unrecognized role {role:?}");
        return None;
    };
    Some(Principal {
        id: user_id,
        role,
        department,
    })
}
