//! Per-connection request context.
//!
//! A [`Context`] pairs one parsed [`RequestHead`] with the connection it
//! arrived on. It is created only after the head has parsed completely,
//! is handed to at most one handler (enforced by ownership — actions
//! consume it), and closes the connection when dropped.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::http::{response, Headers, Method, RequestHead, Status, Version};

/// One parsed request plus its underlying connection.
///
/// The stream is bidirectional: reads pull whatever raw bytes follow the
/// header block, writes emit the response. There is no body framing —
/// [`read_body`](Self::read_body) gives no length guarantee and simply
/// surfaces what the peer sent or end-of-stream.
pub struct Context {
    head: RequestHead,
    stream: BufReader<TcpStream>,
    peer_addr: SocketAddr,
}

impl Context {
    pub(crate) fn new(head: RequestHead, stream: BufReader<TcpStream>, peer_addr: SocketAddr) -> Self {
        Self {
            head,
            stream,
            peer_addr,
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> Method {
        self.head.method()
    }

    /// Returns the raw request URI, exactly as it appeared on the wire.
    pub fn uri(&self) -> &str {
        self.head.uri()
    }

    /// Returns the request protocol version.
    pub fn version(&self) -> Version {
        self.head.version()
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        self.head.headers()
    }

    /// Returns the peer's socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Writes a complete response onto the connection: status line (using
    /// the request's version), optional header block, blank line, body.
    ///
    /// No `Content-Length` is added for the caller; the peer learns the
    /// body's end from connection close.
    ///
    /// # Errors
    ///
    /// Any write or flush failure is surfaced as-is; nothing is retried.
    pub async fn respond(
        &mut self,
        status: Status,
        headers: Option<&Headers>,
        body: impl AsRef<[u8]>,
    ) -> io::Result<()> {
        let bytes = response::encode(self.head.version(), status, headers, body.as_ref());
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await
    }

    /// Reads raw bytes following the header block into `buf`, returning
    /// the number of bytes read (`0` at end of stream).
    ///
    /// The parser performs no body framing, so there is no way to know in
    /// advance how many bytes the peer will send; callers that trust a
    /// `Content-Length` header do so at their own risk.
    pub async fn read_body(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.head.method())
            .field("uri", &self.head.uri())
            .field("version", &self.head.version())
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ParseLimits;
    use tokio::net::TcpListener;

    // Builds a Context from a real loopback connection carrying `raw`.
    // Returns the client half for inspecting what the server writes back.
    async fn context_for(raw: &[u8]) -> (Context, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(raw).await.unwrap();

        let (server_side, peer_addr) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(server_side);
        let head = RequestHead::read(&mut stream, &ParseLimits::default())
            .await
            .unwrap();
        (Context::new(head, stream, peer_addr), client)
    }

    #[tokio::test]
    async fn accessors_reflect_parsed_head() {
        let (ctx, _client) =
            context_for(b"GET /status HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert_eq!(ctx.method(), Method::Get);
        assert_eq!(ctx.uri(), "/status");
        assert_eq!(ctx.version(), Version::Http11);
        assert_eq!(ctx.headers().get("Host"), Some("localhost"));
    }

    #[tokio::test]
    async fn respond_writes_wire_format() {
        let (mut ctx, mut client) = context_for(b"GET / HTTP/1.1\r\n\r\n").await;
        ctx.respond(Status::Ok, None, "Hello, World!\n").await.unwrap();
        drop(ctx); // close so the client sees EOF

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"HTTP/1.1 200 OK\r\n\r\nHello, World!\n");
    }

    #[tokio::test]
    async fn read_body_returns_unframed_bytes() {
        let (mut ctx, _client) =
            context_for(b"POST /upload HTTP/1.1\r\nHost: a\r\n\r\nraw payload").await;
        let mut buf = [0u8; 64];
        let n = ctx.read_body(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"raw payload");
    }
}
