//! Minimal spry server: `GET /` answers with a greeting, everything else
//! falls back to `404 Not Found`.
//!
//! Run with `cargo run --example hello_world`, then:
//!
//! ```text
//! curl -v http://127.0.0.1:8080/
//! ```

use spry::http::{Method, Status};
use spry::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spry=debug".into()),
        )
        .init();

    let server = Server::builder()
        .host("127.0.0.1")
        .port(8080)
        .handler(
            |ctx| Ok(ctx.method() == Method::Get && ctx.uri() == "/"),
            |mut ctx| async move {
                ctx.respond(Status::Ok, None, "Hello, World!\n").await?;
                Ok(())
            },
        )
        .bind()
        .await?;

    println!("Listening on http://{}", server.local_addr());
    server.run().await?;
    Ok(())
}
