//! Account storage backends.
//!
//! The `database.url` setting picks one of three libsql backends, see
//! [`Backend::parse`]. [`open`] connects and brings the schema up to date,
//! which is what the server and the integration tests use.

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::info;

use crate::error::{Error, Result};

/// Shared database handle.
pub type Handle = Arc<Database>;

/// Where account data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend<'a> {
    /// Turso over the network. Needs `TURSO_AUTH_TOKEN`.
    Remote(&'a str),
    /// Scratch database dropped with the handle.
    Memory,
    /// SQLite file on disk.
    File(&'a str),
}

impl<'a> Backend<'a> {
    /// Classify a `database.url` value.
    ///
    /// `libsql://` and `https://` are remote, `:memory:` is in-memory, and
    /// anything else is a file path with an optional `sqlite://` or `file:`
    /// prefix.
    pub fn parse(url: &'a str) -> Self {
        if url.starts_with("libsql://") || url.starts_with("https://") {
            Backend::Remote(url)
        } else if url == ":memory:" {
            Backend::Memory
        } else {
            Backend::File(
                url.strip_prefix("sqlite://")
                    .or_else(|| url.strip_prefix("file:"))
                    .unwrap_or(url),
            )
        }
    }
}

/// Connect to the backend named by `url`.
pub async fn connect(url: &str) -> Result<Handle> {
    let db = match Backend::parse(url) {
        Backend::Remote(url) => {
            let token = std::env::var("TURSO_AUTH_TOKEN").map_err(|_| {
                Error::Config("TURSO_AUTH_TOKEN not set for remote database".into())
            })?;
            Builder::new_remote(url.to_string(), token).build().await?
        }
        Backend::Memory => Builder::new_local(":memory:").build().await?,
        Backend::File(path) => Builder::new_local(path).build().await?,
    };
    Ok(Arc::new(db))
}

/// Connect and create the account tables.
pub async fn open(url: &str) -> Result<Handle> {
    let db = connect(url).await?;
    crate::users::migrate(&connection(&db)?).await?;
    info!("Account store ready ({:?})", Backend::parse(url));
    Ok(db)
}

/// Open a connection on a shared handle.
pub fn connection(db: &Database) -> Result<Connection> {
    Ok(db.connect()?)
}
