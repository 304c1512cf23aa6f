//! HTTP/1.x response serialization.
//!
//! [`encode`] produces the full wire image of a response: status line,
//! header block, blank line, raw body. Every line uses the single
//! canonical `\r\n` terminator.
//!
//! No `Content-Length` header is generated. With no body framing, the
//! peer can only discover the end of the body from connection close; this
//! is a deliberate, documented limitation of the protocol surface.

use bytes::{BufMut, BytesMut};

use super::{Headers, Status, Version};

/// Serializes a response into a [`BytesMut`] ready to be written to the
/// connection.
///
/// The layout is:
///
/// ```text
/// <version> <code> <reason>\r\n
/// <name>: <value>\r\n          (zero or more)
/// \r\n
/// <raw body bytes>
/// ```
///
/// # Examples
///
/// ```
/// use spry::http::{response, Status, Version};
///
/// let bytes = response::encode(Version::Http11, Status::Ok, None, b"Hello, World!\n");
/// assert_eq!(&bytes[..], b"HTTP/1.1 200 OK\r\n\r\nHello, World!\n");
/// ```
pub fn encode(
    version: Version,
    status: Status,
    headers: Option<&Headers>,
    body: &[u8],
) -> BytesMut {
    let header_count = headers.map_or(0, Headers::len);
    let estimated_size = 64 + header_count * 64 + body.len();
    let mut buf = BytesMut::with_capacity(estimated_size);

    // Status line
    buf.put(
        format!(
            "{} {} {}\r\n",
            version.as_str(),
            status.as_u16(),
            status.canonical_reason()
        )
        .as_bytes(),
    );

    // Header block
    if let Some(headers) = headers {
        for (name, value) in headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
    }

    // Header/body separator
    buf.put(&b"\r\n"[..]);

    if !body.is_empty() {
        buf.put(body);
    }

    buf
}
