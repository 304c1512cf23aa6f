//! End-to-end tests over real loopback sockets.
//!
//! Each test binds an in-process server on port 0, speaks raw HTTP/1.x
//! over a `TcpStream`, and reads the reply until the server closes the
//! connection (there is no Content-Length; close delimits the body).

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use spry::http::{ParseLimits, Status};
use spry::server::Builder;
use spry::{Fallback, Method};

/// Binds the configured server on an ephemeral port and runs it in the
/// background, returning the bound address.
async fn start(builder: Builder) -> SocketAddr {
    let server = builder.port(0).bind().await.expect("bind failed");
    let addr = server.local_addr();
    tokio::spawn(server.run());
    addr
}

/// Sends `raw` and returns everything the server writes back before
/// closing the connection.
async fn send(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect failed");
    stream.write_all(raw).await.expect("write failed");
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.expect("read failed");
    reply
}

fn hello_builder() -> Builder {
    Builder::default().handler(
        |ctx| Ok(ctx.uri() == "/"),
        |mut ctx| async move {
            ctx.respond(Status::Ok, None, "Hello, World!\n").await?;
            Ok(())
        },
    )
}

#[tokio::test]
async fn hello_world_round_trip() {
    let addr = start(hello_builder()).await;
    let reply = send(addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    assert_eq!(reply, b"HTTP/1.1 200 OK\r\n\r\nHello, World!\n");
}

#[tokio::test]
async fn first_matching_handler_answers() {
    let builder = Builder::default()
        .handler(
            |ctx| Ok(ctx.uri() == "/a"),
            |mut ctx| async move {
                ctx.respond(Status::Ok, None, "handler a").await?;
                Ok(())
            },
        )
        .handler(
            |ctx| Ok(ctx.uri() == "/b"),
            |mut ctx| async move {
                ctx.respond(Status::Ok, None, "handler b").await?;
                Ok(())
            },
        );
    let addr = start(builder).await;

    let reply = send(addr, b"GET /b HTTP/1.1\r\n\r\n").await;
    assert!(reply.ends_with(b"handler b"));
    let reply = send(addr, b"GET /a HTTP/1.1\r\n\r\n").await;
    assert!(reply.ends_with(b"handler a"));
}

#[tokio::test]
async fn predicate_can_match_on_method() {
    let builder = Builder::default().handler(
        |ctx| Ok(ctx.method() == Method::Option),
        |mut ctx| async move {
            ctx.respond(Status::NoContent, None, "").await?;
            Ok(())
        },
    );
    let addr = start(builder).await;

    let reply = send(addr, b"OPTION /anything HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply, b"HTTP/1.1 204 No Content\r\n\r\n");

    // The standard plural spelling is outside the accepted set.
    let reply = send(addr, b"OPTIONS /anything HTTP/1.1\r\n\r\n").await;
    assert!(reply.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn unmatched_request_gets_404_by_default() {
    let addr = start(hello_builder()).await;
    let reply = send(addr, b"GET /missing HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply, b"HTTP/1.1 404 Not Found\r\n\r\nNot Found");
}

#[tokio::test]
async fn drop_fallback_closes_silently() {
    let addr = start(hello_builder().fallback(Fallback::Drop)).await;
    let reply = send(addr, b"GET /missing HTTP/1.1\r\n\r\n").await;
    assert!(reply.is_empty());
}

#[tokio::test]
async fn malformed_request_line_gets_400() {
    let addr = start(hello_builder()).await;
    let reply = send(addr, b"GET /\r\n\r\n").await;
    let text = String::from_utf8(reply).unwrap();
    assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n\r\nBad Request: "));
    assert!(text.contains("malformed request line"));
}

#[tokio::test]
async fn oversized_request_gets_413() {
    let builder = hello_builder().limits(ParseLimits {
        max_line_len: 64,
        max_headers: 100,
    });
    let addr = start(builder).await;
    // Far more than the server's read buffer: the reply must survive the
    // unread remainder sitting in the kernel receive queue at close time.
    let raw = format!("GET /{} HTTP/1.1\r\n\r\n", "x".repeat(64 * 1024));
    let reply = send(addr, raw.as_bytes()).await;
    assert!(reply.starts_with(b"HTTP/1.1 413 Payload Too Large\r\n"));
}

#[tokio::test]
async fn handler_error_closes_the_connection_only() {
    let builder = Builder::default()
        .handler(
            |ctx| Ok(ctx.uri() == "/boom"),
            |_ctx| async move { Err::<(), spry::DispatchError>("handler failed".into()) },
        )
        .handler(
            |ctx| Ok(ctx.uri() == "/ok"),
            |mut ctx| async move {
                ctx.respond(Status::Ok, None, "still alive").await?;
                Ok(())
            },
        );
    let addr = start(builder).await;

    // Failing handler: task aborts, connection closes with nothing written.
    let reply = send(addr, b"GET /boom HTTP/1.1\r\n\r\n").await;
    assert!(reply.is_empty());

    // The accept loop survives and keeps serving.
    let reply = send(addr, b"GET /ok HTTP/1.1\r\n\r\n").await;
    assert!(reply.ends_with(b"still alive"));
}

#[tokio::test]
async fn handler_can_read_raw_body_bytes() {
    let builder = Builder::default().handler(
        |ctx| Ok(ctx.method() == Method::Post),
        |mut ctx| async move {
            let mut buf = [0u8; 256];
            let n = ctx.read_body(&mut buf).await?;
            let echo = format!("got {n} bytes: {}", String::from_utf8_lossy(&buf[..n]));
            ctx.respond(Status::Ok, None, echo).await?;
            Ok(())
        },
    );
    let addr = start(builder).await;

    let reply = send(addr, b"POST /upload HTTP/1.1\r\nHost: a\r\n\r\nsome payload").await;
    assert!(reply.ends_with(b"got 12 bytes: some payload"));
}

#[tokio::test]
async fn connection_slots_are_reclaimed() {
    let addr = start(hello_builder().max_connections(1)).await;

    // With a single slot, back-to-back requests only succeed if the
    // permit is returned when the previous task finishes.
    for _ in 0..3 {
        let reply = send(addr, b"GET / HTTP/1.1\r\n\r\n").await;
        assert_eq!(reply, b"HTTP/1.1 200 OK\r\n\r\nHello, World!\n");
    }
}

#[tokio::test]
async fn slow_handler_does_not_delay_other_connections() {
    let builder = Builder::default()
        .handler(
            |ctx| Ok(ctx.uri() == "/slow"),
            |mut ctx| async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                ctx.respond(Status::Ok, None, "slow done").await?;
                Ok(())
            },
        )
        .handler(
            |ctx| Ok(ctx.uri() == "/fast"),
            |mut ctx| async move {
                ctx.respond(Status::Ok, None, "fast done").await?;
                Ok(())
            },
        );
    let addr = start(builder).await;

    let slow = tokio::spawn(async move { send(addr, b"GET /slow HTTP/1.1\r\n\r\n").await });
    // Give the slow connection time to be accepted and parked in its sleep.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let reply = send(addr, b"GET /fast HTTP/1.1\r\n\r\n").await;
    let elapsed = started.elapsed();

    assert!(reply.ends_with(b"fast done"));
    assert!(
        elapsed < Duration::from_secs(1),
        "fast response took {elapsed:?}, blocked behind the slow handler"
    );

    let slow_reply = slow.await.unwrap();
    assert!(slow_reply.ends_with(b"slow done"));
}
