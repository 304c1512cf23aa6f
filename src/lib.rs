//! # spry
//!
//! A minimal async HTTP/1.x server primitive written in Rust.
//!
//! spry accepts TCP connections, parses the request line and headers into
//! a [`Context`], and dispatches it to the first registered handler whose
//! predicate matches. The handler writes the status line, headers, and
//! body back on the same connection, which is then closed — one request
//! per connection, no keep-alive, no body framing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spry::http::Status;
//! use spry::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .host("127.0.0.1")
//!         .port(8080)
//!         .handler(
//!             |ctx| Ok(ctx.uri() == "/"),
//!             |mut ctx| async move {
//!                 ctx.respond(Status::Ok, None, "Hello, World!\n").await?;
//!                 Ok(())
//!             },
//!         )
//!         .bind()
//!         .await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod handler;
pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::Context;
pub use handler::{DispatchError, Fallback, Handler, Registry};
pub use http::{Headers, Method, ParseError, ParseLimits, Status, Version};
pub use server::{Builder, Server, ServerError};
