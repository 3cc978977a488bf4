//! The hyper front door.
//!
//! [`start`] fixes the deployment environment into a [`SessionResolver`]
//! once, then serves every request through the router with it. Transport
//! limits are enforced before a handler ever sees the request:
//!
//! - bodies over [`MAX_BODY_SIZE`] get 413, declared or streamed
//! - connections over [`MAX_CONNECTIONS`] get 503
//! - headers must arrive within [`HEADER_READ_TIMEOUT`]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::{CONTENT_LENGTH, HeaderValue, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, SharedConfig};
use crate::error::{Error, Result};
use crate::response::{self, HttpResponse};
use crate::router::{Context, RouteMatch, RouterHandle};
use crate::session::{SessionProvider, SessionResolver};

/// Largest accepted request body, in bytes.
pub const MAX_BODY_SIZE: usize = 1_048_576;

/// Connections served at once; the rest are answered with 503.
pub const MAX_CONNECTIONS: usize = 128;

/// Time allowed for a client to finish sending request headers.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a request needs, shared across connections.
pub struct State {
    pub config: SharedConfig,
    pub db: Option<crate::db::Handle>,
    pub router: Arc<RouterHandle>,
    pub sessions: Arc<SessionResolver>,
}

/// Handle to a running server.
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl Server {
    /// The bound address. Useful with port 0.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the accept loop.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        join(self.task).await
    }
}

async fn join(task: JoinHandle<Result<()>>) -> Result<()> {
    task.await
        .map_err(|e| Error::Internal(format!("Accept loop stopped abnormally: {e}")))?
}

fn with_standard_headers(mut response: HttpResponse) -> HttpResponse {
    let headers = response.headers_mut();
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}

fn too_large() -> HttpResponse {
    response::error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
}

/// Collect the body, refusing anything over [`MAX_BODY_SIZE`].
///
/// A declared `Content-Length` is checked first so oversized uploads are
/// refused without reading them; chunked bodies hit the `Limited` cap.
async fn read_body(
    headers: &hyper::HeaderMap,
    body: Incoming,
) -> std::result::Result<Bytes, HttpResponse> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_SIZE) {
        return Err(too_large());
    }

    Limited::new(body, MAX_BODY_SIZE)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|_| too_large())
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<State>,
) -> std::result::Result<HttpResponse, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match read_body(&parts.headers, body).await {
        Ok(body) => body,
        Err(rejection) => return Ok(with_standard_headers(rejection)),
    };

    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let response = match state.router.match_route(&method, &path) {
        RouteMatch::Matched { handler, params } => {
            let ctx = Context {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                params,
                body,
                db: state.db.clone(),
                config: Arc::clone(&state.config),
                sessions: Arc::clone(&state.sessions),
            };
            handler(ctx).await.unwrap_or_else(Error::into_response)
        }
        RouteMatch::MethodNotAllowed => {
            response::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        RouteMatch::NotFound => response::error(StatusCode::NOT_FOUND, "Not found"),
    };

    debug!("{method} {path} -> {}", response.status().as_u16());
    Ok(with_standard_headers(response))
}

fn connection_builder() -> auto::Builder<TokioExecutor> {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT);
    builder
}

fn serve(stream: TcpStream, remote: SocketAddr, state: Arc<State>, semaphore: &Arc<Semaphore>) {
    let io = TokioIo::new(stream);

    let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
        warn!("Connection limit reached, rejecting {remote}");
        tokio::spawn(async move {
            let service = service_fn(|_req: Request<Incoming>| async {
                Ok::<_, Infallible>(with_standard_headers(response::error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service unavailable",
                )))
            });
            let builder = connection_builder();
            let _ = builder.serve_connection(io, service).await;
        });
        return;
    };

    tokio::spawn(async move {
        let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));
        let builder = connection_builder();
        if let Err(e) = builder.serve_connection(io, service).await {
            error!("Error serving connection from {remote}: {e}");
        }
        drop(permit);
    });
}

/// Bind, start accepting connections, and return a handle.
///
/// The session resolver is built here from `config`, so the deployment
/// environment is fixed for the lifetime of the server.
pub async fn start(
    config: Config,
    db: Option<crate::db::Handle>,
    router: Arc<RouterHandle>,
    provider: Arc<dyn SessionProvider>,
) -> Result<Server> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let sessions = Arc::new(SessionResolver::from_config(provider, &config));
    if !config.environment.is_production() {
        warn!(
            "Running in {} mode: requests without a session act as admin {}",
            config.environment, config.auth.fallback.user_id
        );
    }

    let state = Arc::new(State {
        config: Arc::new(config),
        db,
        router,
        sessions,
    });
    info!("Budget API listening on http://{addr}");

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let semaphore = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote) = accepted?;
                    serve(stream, remote, Arc::clone(&state), &semaphore);
                }
                _ = &mut shutdown_rx => break,
            }
        }
        Ok(())
    });

    Ok(Server {
        addr,
        shutdown_tx,
        task,
    })
}

/// Serve until the accept loop exits.
pub async fn run(
    config: Config,
    db: Option<crate::db::Handle>,
    router: Arc<RouterHandle>,
    provider: Arc<dyn SessionProvider>,
) -> Result<()> {
    let server = start(config, db, router, provider).await?;
    join(server.task).await
}
