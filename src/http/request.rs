//! HTTP/1.x request-head parsing.
//!
//! The parser reads the request line and header block off a buffered byte
//! stream, one `\n`-delimited line at a time (a trailing `\r` is
//! stripped), and produces a [`RequestHead`] or a [`ParseError`]. It never
//! consumes body bytes: anything after the blank line is left on the
//! stream for the handler to read raw.
//!
//! Every read is bounded by [`ParseLimits`] so a peer that never sends a
//! line terminator cannot grow the buffer without bound.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::{Headers, Method, Version};

/// Errors that can occur while parsing a request head.
///
/// None of these are retried; each one aborts the owning connection.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The method token is outside the closed [`Method`] set.
    #[error("method not valid: {0:?}")]
    MethodNotValid(String),

    /// The version token is outside the closed [`Version`] set.
    #[error("version not valid: {0:?}")]
    VersionNotValid(String),

    /// The request line does not consist of exactly three
    /// space-separated, non-empty tokens.
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// A line exceeded [`ParseLimits::max_line_len`] or the header block
    /// exceeded [`ParseLimits::max_headers`].
    #[error("request line or header block exceeds configured limits")]
    RequestTooLarge,

    /// The underlying stream failed, including the peer closing the
    /// connection before the head completed.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
}

/// Bounds enforced while reading a request head.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    /// Maximum bytes of a single line on the wire, `\n` terminator
    /// excluded (a trailing `\r` counts against the budget).
    pub max_line_len: usize,
    /// Maximum number of header lines, repeated names included.
    pub max_headers: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_line_len: 8192,
            max_headers: 100,
        }
    }
}

/// A fully parsed request line and header block.
///
/// A `RequestHead` is only ever constructed complete: a head that reaches
/// dispatch has a valid method, URI, version, and header map, or parsing
/// has already failed.
///
/// # Examples
///
/// ```
/// use spry::http::{Method, ParseLimits, RequestHead, Version};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut raw: &[u8] = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
/// let head = RequestHead::read(&mut raw, &ParseLimits::default())
///     .await
///     .unwrap();
///
/// assert_eq!(head.method(), Method::Get);
/// assert_eq!(head.uri(), "/index.html");
/// assert_eq!(head.version(), Version::Http11);
/// assert_eq!(head.headers().get("Host"), Some("example.com"));
/// # }
/// ```
#[derive(Debug)]
pub struct RequestHead {
    method: Method,
    uri: String,
    version: Version,
    headers: Headers,
}

impl RequestHead {
    /// Reads and parses one request head from `reader`.
    ///
    /// The stream is left positioned immediately after the blank line
    /// terminating the header block; no body framing is performed.
    ///
    /// # Errors
    ///
    /// - [`ParseError::MalformedRequestLine`] — the request line does not
    ///   split into exactly three non-empty tokens on single spaces.
    /// - [`ParseError::MethodNotValid`] / [`ParseError::VersionNotValid`]
    ///   — a token outside the closed wire set.
    /// - [`ParseError::RequestTooLarge`] — a limit in `limits` was hit.
    /// - [`ParseError::Connection`] — the stream failed or the peer
    ///   closed it before the head completed.
    pub async fn read<R>(reader: &mut R, limits: &ParseLimits) -> Result<Self, ParseError>
    where
        R: AsyncBufRead + Unpin,
    {
        let request_line = read_line(reader, limits.max_line_len).await?;

        let mut tokens = request_line.split(' ');
        let (Some(method), Some(uri), Some(version), None) =
            (tokens.next(), tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(ParseError::MalformedRequestLine(request_line));
        };
        if method.is_empty() || uri.is_empty() || version.is_empty() {
            return Err(ParseError::MalformedRequestLine(request_line));
        }

        let method: Method = method.parse()?;
        let version: Version = version.parse()?;
        let uri = uri.to_owned();

        let mut headers = Headers::new();
        let mut header_lines = 0usize;
        loop {
            let line = read_line(reader, limits.max_line_len).await?;
            // An empty line (after `\r` stripping) terminates the header block.
            if line.is_empty() {
                break;
            }

            // Every line counts, even one overwriting an earlier name, so a
            // peer repeating a header forever still hits the limit.
            header_lines += 1;
            if header_lines > limits.max_headers {
                return Err(ParseError::RequestTooLarge);
            }

            // Split on the first `:`; a lone leading space in the value is
            // trimmed. A line with no `:` becomes a name with an empty value.
            let (name, value) = line.split_once(':').unwrap_or((line.as_str(), ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            headers.insert(name, value);
        }

        Ok(Self {
            method,
            uri,
            version,
            headers,
        })
    }

    /// Returns the request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the raw request URI, verbatim from the wire (no query-string
    /// or path-segment decomposition).
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the parsed header map.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

/// Reads one `\n`-terminated line, strips the terminator (and a trailing
/// `\r` if present), and decodes it lossily as UTF-8.
///
/// Fails with [`ParseError::RequestTooLarge`] when more than `max_len`
/// bytes arrive without a terminator, and with [`ParseError::Connection`]
/// (`UnexpectedEof`) when the stream ends mid-line or before the line
/// starts.
async fn read_line<R>(reader: &mut R, max_len: usize) -> Result<String, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    // One extra byte of budget for the `\n` terminator itself.
    let mut limited = (&mut *reader).take(max_len as u64 + 1);
    limited.read_until(b'\n', &mut raw).await?;

    if raw.last() != Some(&b'\n') {
        if raw.len() > max_len {
            return Err(ParseError::RequestTooLarge);
        }
        return Err(ParseError::Connection(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed the connection before the request head completed",
        )));
    }

    raw.pop();
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
