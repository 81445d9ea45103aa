//! Opening handshake (RFC 6455 Section 4).
//!
//! Pure request/response handling shared by the dialer and the upgrader:
//! key exchange, head parsing, upgrade validation and response writing. The
//! I/O around it lives in [`client`](crate::client) and [`server`](crate::server).

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, HandshakeError, Result};
use crate::random::RandomSource;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version spoken.
pub const WS_VERSION: &str = "13";

/// Decoded length of a `Sec-WebSocket-Key` nonce.
pub const NONCE_LEN: usize = 16;

/// Headers that may appear at most once in an upgrade request.
const SINGLETON_HEADERS: [&str; 5] = [
    "host",
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
];

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsconn::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Base64 of a fresh 16-byte nonce, for use as `Sec-WebSocket-Key`.
pub fn generate_key(random: &mut dyn RandomSource) -> String {
    let mut nonce = [0u8; NONCE_LEN];
    random.fill_bytes(&mut nonce);
    BASE64.encode(nonce)
}

/// Offset just past the `\r\n\r\n` that ends an HTTP head, if present.
#[must_use]
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Whether a comma-separated header value contains `token` (case-insensitive).
#[must_use]
pub fn header_has_token(value: &str, token: &str) -> bool {
    value.split(',').any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Validate the Origin header against a list of allowed origins.
///
/// An empty `allowed` list accepts any origin, including none.
///
/// # Errors
///
/// Returns [`HandshakeError::OriginRejected`] if the list is non-empty and
/// `origin` is missing or not in it.
pub fn validate_origin(
    origin: Option<&str>,
    allowed: &[String],
) -> std::result::Result<(), HandshakeError> {
    if allowed.is_empty() {
        return Ok(());
    }
    match origin {
        Some(o) if allowed.iter().any(|a| a == o) => Ok(()),
        Some(o) => Err(HandshakeError::OriginRejected(o.to_string())),
        None => Err(HandshakeError::OriginRejected("(none)".to_string())),
    }
}

/// Parse header lines into a map keyed by lowercase name.
///
/// Stops at the first empty line. Names in `singletons` must not repeat.
fn parse_headers<'a, I>(lines: I, singletons: &[&str]) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(HandshakeError::Malformed(format!("bad header line: {line}")).into());
        };
        let name = name.trim().to_ascii_lowercase();
        if singletons.contains(&name.as_str()) && headers.contains_key(&name) {
            return Err(HandshakeError::Malformed(format!("duplicate header: {name}")).into());
        }
        headers.insert(name, value.trim().to_string());
    }

    Ok(headers)
}

/// Reject header values that would allow response splitting.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

fn head_text(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data)
        .map_err(|_| HandshakeError::Malformed("head is not valid UTF-8".into()).into())
}

/// A parsed HTTP upgrade request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request method, as sent.
    pub method: String,
    /// Request target (path and query).
    pub target: String,
    headers: HashMap<String, String>,
}

impl HandshakeRequest {
    /// Parse a request head (request line and headers).
    ///
    /// Only the syntax is checked here; see [`validate_upgrade_headers`]
    /// and [`validate_key`] for the upgrade rules.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Malformed`] for a missing or malformed
    /// request line, a non-HTTP/1.1 version, a malformed header line, or a
    /// duplicated singleton header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut lines = head_text(data)?.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| HandshakeError::Malformed("empty request".into()))?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let [method, target, version] = parts.as_slice() else {
            return Err(HandshakeError::Malformed(format!("bad request line: {request_line}")).into());
        };
        if *version != "HTTP/1.1" {
            return Err(HandshakeError::Malformed(format!("expected HTTP/1.1, got {version}")).into());
        }

        Ok(Self {
            method: (*method).to_string(),
            target: (*target).to_string(),
            headers: parse_headers(lines, &SINGLETON_HEADERS)?,
        })
    }

    /// Parse a request head with size limit.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` if data exceeds max_size
    /// - Other handshake errors as per `parse()`
    pub fn parse_with_limit(data: &[u8], max_size: usize) -> Result<Self> {
        if data.len() > max_size {
            return Err(Error::HandshakeTooLarge {
                size: data.len(),
                max: max_size,
            });
        }
        Self::parse(data)
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Ordered upgrade checks over any header source.
///
/// `header` looks up a header value by name (case-insensitive).
///
/// # Errors
///
/// The first failing check: Connection, Upgrade, method, version.
pub fn validate_upgrade_headers<'a>(
    method: &str,
    header: impl Fn(&str) -> Option<&'a str>,
) -> std::result::Result<(), HandshakeError> {
    if !header("connection").is_some_and(|v| header_has_token(v, "upgrade")) {
        return Err(HandshakeError::WrongConnectionHeader);
    }
    if !header("upgrade").is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket")) {
        return Err(HandshakeError::WrongUpgradeHeader);
    }
    if method != "GET" {
        return Err(HandshakeError::WrongMethod(method.to_string()));
    }
    if header("sec-websocket-version").map(str::trim) != Some(WS_VERSION) {
        return Err(HandshakeError::WrongVersion);
    }
    Ok(())
}

/// Check that a `Sec-WebSocket-Key` is present and decodes to 16 bytes.
///
/// # Errors
///
/// [`HandshakeError::MissingKey`] or [`HandshakeError::InvalidKey`].
pub fn validate_key(key: Option<&str>) -> std::result::Result<&str, HandshakeError> {
    let key = key.map(str::trim).ok_or(HandshakeError::MissingKey)?;
    match BASE64.decode(key) {
        Ok(nonce) if nonce.len() == NONCE_LEN => Ok(key),
        _ => Err(HandshakeError::InvalidKey),
    }
}

/// First comma-separated value of a `Sec-WebSocket-Protocol` header.
#[must_use]
pub fn first_protocol(value: Option<&str>) -> Option<&str> {
    value
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Client upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    /// `Host` header value (host, plus port if not the default).
    pub host: String,
    /// Request target: path and optional query.
    pub target: String,
    /// Base64 nonce sent as `Sec-WebSocket-Key`.
    pub key: String,
}

impl ClientRequest {
    /// Serialize the request head.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeaderValue` if a field contains CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        validate_header_value("Host", &self.host)?;
        validate_header_value("request target", &self.target)?;
        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.target).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        buf.extend_from_slice(format!("Sec-WebSocket-Version: {WS_VERSION}\r\n").as_bytes());
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// The server's `101 Switching Protocols` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The selected Sec-WebSocket-Protocol (optional).
    pub protocol: Option<String>,
    /// The echoed Sec-WebSocket-Extensions value (optional).
    pub extension: Option<String>,
}

impl HandshakeResponse {
    /// Response accepting the given client key.
    #[must_use]
    pub fn for_key(key: &str) -> Self {
        Self {
            accept: compute_accept_key(key),
            protocol: None,
            extension: None,
        }
    }

    /// Write the HTTP response to a buffer.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeaderValue` if protocol or extension contain CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());

        if let Some(ref proto) = self.protocol {
            validate_header_value("Sec-WebSocket-Protocol", proto)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {proto}\r\n").as_bytes());
        }

        if let Some(ref ext) = self.extension {
            validate_header_value("Sec-WebSocket-Extensions", ext)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Extensions: {ext}\r\n").as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// A parsed response head, as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    headers: HashMap<String, String>,
}

impl ResponseHead {
    /// Parse a response head (status line and headers).
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Malformed`] if the status line is missing or
    /// unparseable.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut lines = head_text(data)?.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| HandshakeError::Malformed("empty response".into()))?;
        let mut parts = status_line.split_whitespace();
        let status = match (parts.next(), parts.next()) {
            (Some(version), Some(code)) if version.starts_with("HTTP/") => code
                .parse::<u16>()
                .map_err(|_| HandshakeError::Malformed(format!("bad status line: {status_line}")))?,
            _ => {
                return Err(
                    HandshakeError::Malformed(format!("bad status line: {status_line}")).into(),
                );
            }
        };

        Ok(Self {
            status,
            headers: parse_headers(lines, &[])?,
        })
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Check that this response completes the handshake started with `key`.
    ///
    /// # Errors
    ///
    /// [`HandshakeError::BadStatus`] for anything but 101,
    /// [`HandshakeError::AcceptMismatch`] for a missing or wrong accept value.
    pub fn verify(&self, key: &str) -> std::result::Result<(), HandshakeError> {
        if self.status != 101 {
            return Err(HandshakeError::BadStatus(self.status));
        }
        match self.header("sec-websocket-accept") {
            Some(accept) if accept == compute_accept_key(key) => Ok(()),
            _ => Err(HandshakeError::AcceptMismatch),
        }
    }
}
