//! Handler registration and dispatch.
//!
//! A [`Handler`] is an ordered pair of a predicate and an action. The
//! [`Registry`] holds them in registration order and is immutable for the
//! server's lifetime; dispatch walks the list and the first handler whose
//! predicate returns `true` consumes the [`Context`] — no fallthrough, no
//! priority beyond order.
//!
//! When nothing matches, the [`Fallback`] policy decides between a
//! standard response (default `404 Not Found`) and a silent drop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::http::Status;

/// Error produced by a predicate or action, propagated to the owning
/// connection task. Type-erased so application handlers can surface any
/// error type.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// A predicate deciding whether its handler should service a [`Context`].
///
/// Predicates only inspect the context; they must not consume body bytes
/// or write to the connection.
pub type Predicate = Arc<dyn Fn(&Context) -> Result<bool, DispatchError> + Send + Sync>;

/// Type-erased, heap-allocated async action. Takes the [`Context`] by
/// value: a context is handed to at most one action, ever.
pub type Action = Arc<
    dyn Fn(Context) -> Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send>>
        + Send
        + Sync,
>;

/// One registered (predicate, action) pair.
///
/// # Examples
///
/// ```
/// use spry::handler::Handler;
/// use spry::http::Status;
///
/// let handler = Handler::new(
///     |ctx| Ok(ctx.uri() == "/ping"),
///     |mut ctx| async move {
///         ctx.respond(Status::Ok, None, "pong\n").await?;
///         Ok(())
///     },
/// );
/// ```
pub struct Handler {
    predicate: Predicate,
    action: Action,
}

impl Handler {
    /// Builds a handler from a predicate closure and an async action.
    ///
    /// Both are taken with direct `Fn` bounds so plain, unannotated
    /// closures infer their argument types at the call site; the action's
    /// future is boxed here, not by the caller.
    pub fn new<P, A, F>(predicate: P, action: A) -> Self
    where
        P: Fn(&Context) -> Result<bool, DispatchError> + Send + Sync + 'static,
        A: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            action: Arc::new(move |ctx| Box::pin(action(ctx))),
        }
    }
}

/// Behavior when no registered predicate matches a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Write a bare response with the given status (reason phrase as body)
    /// and close. The default is `Status::NotFound`.
    Respond(Status),
    /// Close the connection without writing anything.
    Drop,
}

impl Default for Fallback {
    fn default() -> Self {
        Self::Respond(Status::NotFound)
    }
}

/// The immutable, ordered handler list plus the no-match policy.
///
/// Built once at server construction and shared read-only across all
/// connection tasks, so no synchronization is needed.
pub struct Registry {
    handlers: Vec<Handler>,
    fallback: Fallback,
}

impl Registry {
    /// Builds a registry from handlers in registration order.
    pub fn new(handlers: Vec<Handler>, fallback: Fallback) -> Self {
        Self { handlers, fallback }
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatches `ctx` to the first handler whose predicate returns
    /// `true`, consuming the context.
    ///
    /// Predicates run in registration order. A predicate or action error
    /// propagates immediately and no further handlers are tried. When no
    /// predicate matches, the [`Fallback`] policy applies.
    pub async fn dispatch(&self, mut ctx: Context) -> Result<(), DispatchError> {
        for handler in &self.handlers {
            if (handler.predicate)(&ctx)? {
                return (handler.action)(ctx).await;
            }
        }

        match self.fallback {
            Fallback::Respond(status) => {
                debug!(uri = %ctx.uri(), %status, "no handler matched, sending fallback response");
                ctx.respond(status, None, status.canonical_reason()).await?;
                Ok(())
            }
            Fallback::Drop => {
                debug!(uri = %ctx.uri(), "no handler matched, dropping connection");
                Ok(())
            }
        }
    }
}
