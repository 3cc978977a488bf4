//! Session resolution scenarios across environments.

use std::sync::Arc;

use hyper::http::HeaderMap;
use tollgate::permission::require_role;
use tollgate::router::BoxFuture;
use tollgate::{
    Environment, Error, Role, SessionProvider, SessionRecord, SessionResolver, has_required_role,
};

/// Provider with no session for anyone.
struct Nobody;

impl SessionProvider for Nobody {
    fn current_session<'a>(
        &'a self,
        _headers: &'a HeaderMap,
    ) -> BoxFuture<'a, tollgate::Result<Option<SessionRecord>>> {
        Box::pin(async { Ok(None) })
    }
}

/// Provider whose backing store is down.
struct Unavailable;

impl SessionProvider for Unavailable {
    fn current_session<'a>(
        &'a self,
        _headers: &'a HeaderMap,
    ) -> BoxFuture<'a, tollgate::Result<Option<SessionRecord>>> {
        Box::pin(async { Err(Error::Session("connection refused".into())) })
    }
}

#[tokio::test]
async fn production_without_session_has_no_principal() {
    let resolver = SessionResolver::new(Arc::new(Nobody), Environment::Production);
    let principal = resolver.resolve(&HeaderMap::new()).await;
    assert!(principal.is_none());

    for role in Role::ALL {
        assert!(matches!(
            require_role(principal.clone(), role),
            Err(Error::Unauthorized)
        ));
    }
}

#[tokio::test]
async fn development_without_session_gets_fallback_admin() {
    let resolver = SessionResolver::new(Arc::new(Nobody), Environment::Development);
    let principal = resolver.resolve(&HeaderMap::new()).await;

    let fallback = principal.clone().unwrap();
    assert_eq!(fallback.role, Role::Admin);
    assert!(has_required_role(Some(&fallback), Role::Admin));
    assert!(require_role(principal, Role::Member).is_ok());
}

#[tokio::test]
async fn provider_outage_never_escapes_the_resolver() {
    let production = SessionResolver::new(Arc::new(Unavailable), Environment::Production);
    assert!(production.resolve(&HeaderMap::new()).await.is_none());

    let development = SessionResolver::new(Arc::new(Unavailable), Environment::Development);
    let principal = development.resolve(&HeaderMap::new()).await.unwrap();
    assert_eq!(principal.role, Role::Admin);
}

#[tokio::test]
async fn each_resolution_builds_a_fresh_principal() {
    let resolver = SessionResolver::new(Arc::new(Nobody), Environment::Test);
    let first = resolver.resolve(&HeaderMap::new()).await.unwrap();
    let second = resolver.resolve(&HeaderMap::new()).await.unwrap();
    assert_eq!(first, second);
}
