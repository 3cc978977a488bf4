//! Tollgate - access control for the campaign budget API.
//!
//! Every route in the budget application answers two questions before it
//! touches data: *who is asking* and *are they allowed*. This crate owns both:
//!
//! - **Session**: resolves the request's [`Principal`] from a pluggable
//!   [`SessionProvider`], with an admin fallback outside production
//! - **Permission**: role ordering (`member < manager < admin`) and the
//!   account-management rules built on it
//! - **Auth**: JWT tokens and the token-backed session provider
//! - **Config**: Layered configuration (file → env → CLI), including the
//!   deployment environment
//! - **Router / Server**: hyper-based HTTP boundary mapping refusals to
//!   401/403
//! - **Users**: account administration routes guarded by the rules above
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tollgate::{JwtSessions, Loader, Overrides, UsersModule};
//!
//! #[tokio::main]
//! async fn main() -> tollgate::Result<()> {
//!     let config = Loader::new("BUDGET").load(None, &Overrides::default())?;
//!
//!     let db = tollgate::db::open(&config.database.url).await?;
//!     let router = tollgate::module::mount(&[&UsersModule]);
//!
//!     let sessions = Arc::new(JwtSessions::new(config.auth.clone())?);
//!     tollgate::server::run(config, Some(db), router.into_handle(), sessions).await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod module;
pub mod permission;
pub mod principal;
pub mod response;
pub mod router;
pub mod server;
pub mod session;
pub mod users;

// Re-export main types at crate root
pub use auth::JwtSessions;
pub use config::{Config, Environment, Loader, Overrides};
pub use db::Handle as DbHandle;
pub use error::{Error, Result};
pub use module::Module;
pub use permission::{Role, can_manage_user, has_required_role};
pub use principal::Principal;
pub use router::{Context, Router};
pub use session::{SessionProvider, SessionRecord, SessionResolver};
pub use users::UsersModule;

// Re-export commonly used dependencies for convenience
pub use hyper::Method;
pub use serde_json::json;
