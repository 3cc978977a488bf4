//! Route groups.
//!
//! Each area of the budget API (accounts, campaigns, ...) is a [`Module`]
//! that registers its own handlers. Every handler is expected to start with
//! [`Context::require_role`](crate::Context::require_role), so the access
//! rules stay next to the route they guard.
//!
//! ```ignore
//! use tollgate::{Module, Role, Router};
//!
//! pub struct CampaignsModule;
//!
//! impl Module for CampaignsModule {
//!     fn name(&self) -> &'static str {
//!         "campaigns"
//!     }
//!
//!     fn routes(&self, router: &mut Router) {
//!         router.delete("/api/campaigns/{id}", |ctx| async move {
//!             ctx.require_role(Role::Manager).await?;
//!             Ok(tollgate::response::no_content())
//!         });
//!     }
//! }
//! ```

use tracing::debug;

use crate::router::Router;

/// A group of routes mounted together.
pub trait Module: Send + Sync {
    /// Short name used in startup logs.
    fn name(&self) -> &'static str;

    fn routes(&self, router: &mut Router);
}

/// Register every module on a fresh router.
pub fn mount(modules: &[&dyn Module]) -> Router {
    let mut router = Router::new();
    for module in modules {
        module.routes(&mut router);
        debug!("Mounted {} routes", module.name());
    }
    router
}
