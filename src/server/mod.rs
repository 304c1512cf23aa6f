//! Async TCP acceptor using Tokio.
//!
//! Binds a listening socket, accepts connections forever, and runs one
//! Tokio task per connection: parse the request head, dispatch to the
//! first matching handler, close. The task set is bounded by a semaphore
//! whose permits are reclaimed when a task finishes, so slot bookkeeping
//! never grows with connection count.
//!
//! The runtime is tokio's multi-threaded scheduler: a handler that
//! suspends (e.g. `tokio::time::sleep`) parks only its own task, and
//! other connections keep making progress in parallel.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::handler::{DispatchError, Fallback, Handler, Registry};
use crate::http::{response, ParseError, ParseLimits, RequestHead, Status, Version};

/// Bind host used when none is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Bind port used when none is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// Concurrent-connection cap used when none is configured.
const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Errors produced by the server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

// Per-connection failure, logged by the spawned task. Parse failures are
// answered with an error response inside `handle_connection` and do not
// surface here.
#[derive(Debug, Error)]
enum ConnectionError {
    #[error("dispatch error: {0}")]
    Dispatch(DispatchError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configures and builds a [`Server`].
///
/// Handlers are tried in the order they were added; the set is frozen
/// once [`bind`](Self::bind) is called.
///
/// # Examples
///
/// ```rust,no_run
/// use spry::http::Status;
/// use spry::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::builder()
///         .port(8080)
///         .handler(
///             |ctx| Ok(ctx.uri() == "/"),
///             |mut ctx| async move {
///                 ctx.respond(Status::Ok, None, "Hello, World!\n").await?;
///                 Ok(())
///             },
///         )
///         .bind()
///         .await?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct Builder {
    host: String,
    port: u16,
    handlers: Vec<Handler>,
    fallback: Fallback,
    limits: ParseLimits,
    max_connections: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            handlers: Vec::new(),
            fallback: Fallback::default(),
            limits: ParseLimits::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Builder {
    /// Sets the bind host. Default: `127.0.0.1`.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the bind port. Default: `8080`. Use `0` to let the OS pick
    /// (the bound port is available from [`Server::local_addr`]).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Appends a handler. Registration order is dispatch order.
    #[must_use]
    pub fn handler<P, A, F>(mut self, predicate: P, action: A) -> Self
    where
        P: Fn(&Context) -> Result<bool, DispatchError> + Send + Sync + 'static,
        A: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        self.handlers.push(Handler::new(predicate, action));
        self
    }

    /// Sets the no-match policy. Default: respond `404 Not Found`.
    #[must_use]
    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sets the request-head parse limits.
    #[must_use]
    pub fn limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Caps the number of concurrently handled connections. Accepting
    /// pauses while the cap is reached and resumes as tasks finish.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Binds the listening socket and freezes the handler list.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(self) -> Result<Server, ServerError> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(Server {
            listener,
            local_addr,
            registry: Arc::new(Registry::new(self.handlers, self.fallback)),
            limits: self.limits,
            connection_permits: Arc::new(Semaphore::new(self.max_connections)),
        })
    }
}

/// The spry HTTP server: a bound listener plus the frozen handler
/// registry.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    limits: ParseLimits,
    connection_permits: Arc<Semaphore>,
}

impl Server {
    /// Starts a [`Builder`] with default configuration.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections and handles each in its own task, forever.
    ///
    /// No single connection's outcome stops the loop: accept errors are
    /// logged and skipped, and per-connection failures end only that
    /// connection's task.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] only if the listener itself becomes
    /// unusable.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(address = %self.local_addr, handlers = self.registry.len(), "spry listening");

        loop {
            // Owned permit: reclaimed automatically when the task ends.
            let Ok(permit) = Arc::clone(&self.connection_permits).acquire_owned().await else {
                // The semaphore is never closed while the server runs.
                return Ok(());
            };

            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let registry = Arc::clone(&self.registry);
            let limits = self.limits;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, registry, limits).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
                drop(permit);
            });
        }
    }
}

/// Handles one connection: parse the head, dispatch once, close.
///
/// A parse failure that is not an I/O error gets a well-formed error
/// response (`413` when a limit was hit, `400` otherwise) before the
/// close, so the peer is never left with a silent reset for its own
/// malformed input.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<Registry>,
    limits: ParseLimits,
) -> Result<(), ConnectionError> {
    let mut stream = BufReader::new(stream);

    let head = match RequestHead::read(&mut stream, &limits).await {
        Ok(head) => head,
        Err(ParseError::Connection(e)) => {
            debug!(peer = %peer_addr, error = %e, "connection failed before request completed");
            return Ok(());
        }
        Err(e) => {
            let status = match e {
                ParseError::RequestTooLarge => Status::PayloadTooLarge,
                _ => Status::BadRequest,
            };
            warn!(peer = %peer_addr, error = %e, code = status.as_u16(), "bad request");
            // The request's version never parsed, so answer as HTTP/1.1.
            let reply = response::encode(
                Version::Http11,
                status,
                None,
                format!("{}: {e}\n", status.canonical_reason()).as_bytes(),
            );
            stream.write_all(&reply).await?;
            stream.flush().await?;
            // Unread request bytes left in the kernel receive queue turn the
            // close into a TCP RST, which can destroy the reply before the
            // peer reads it. Stop sending, then swallow what the peer
            // already sent, bounded so a firehose peer cannot pin the task.
            stream.shutdown().await?;
            drain(&mut stream).await;
            return Ok(());
        }
    };

    debug!(
        peer = %peer_addr,
        method = %head.method(),
        uri = %head.uri(),
        "dispatching request"
    );

    let ctx = Context::new(head, stream, peer_addr);
    registry.dispatch(ctx).await.map_err(ConnectionError::Dispatch)
}

/// Byte budget for discarding a rejected request before closing.
const DRAIN_LIMIT: u64 = 256 * 1024;

/// Time budget for the same drain.
const DRAIN_WINDOW: Duration = Duration::from_secs(2);

// Discards whatever the peer is still sending, up to the drain budgets.
// Errors here are irrelevant: the reply is already out and the connection
// is closing either way.
async fn drain(stream: &mut BufReader<TcpStream>) {
    let _ = tokio::time::timeout(
        DRAIN_WINDOW,
        tokio::io::copy(&mut (&mut *stream).take(DRAIN_LIMIT), &mut tokio::io::sink()),
    )
    .await;
}
