//! Server side of the opening handshake.
//!
//! [`Upgrader`] validates an upgrade request, takes over the transport from
//! the HTTP layer through [`HttpExchange`] and answers with `101 Switching
//! Protocols`. [`RawHttpExchange`] is the built-in HTTP layer for servers
//! that accept plain sockets.
//!
//! A rejected upgrade leaves the exchange untouched; sending an error
//! response is up to the HTTP layer.

use std::future::Future;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::client::{DEFAULT_HANDSHAKE_TIMEOUT, into_handshake, seeded_rng};
use crate::codec::head::read_head;
use crate::config::{Config, Limits};
use crate::connection::{Connection, Role};
use crate::error::{Error, HandshakeError, Result};
use crate::protocol::HandshakeRequest;
use crate::protocol::handshake::{
    HandshakeResponse, first_protocol, validate_key, validate_origin, validate_upgrade_headers,
};
use crate::random::{OsRandom, RandomSource};

/// An HTTP request that may be turned into a WebSocket connection.
///
/// Implemented by whatever HTTP layer accepted the request. The upgrader
/// only reads the method and headers, then takes the transport with
/// [`hijack`](Self::hijack).
pub trait HttpExchange {
    /// The byte stream handed over on hijack.
    type Io;

    fn method(&self) -> &str;

    /// Header value by case-insensitive name.
    fn header(&self, name: &str) -> Option<&str>;

    /// Take exclusive ownership of the transport, together with any bytes
    /// already read past the request head.
    ///
    /// # Errors
    ///
    /// [`HandshakeError::HijackFailed`] if the HTTP layer cannot let go of it.
    fn hijack(self) -> std::result::Result<(Self::Io, BytesMut), HandshakeError>;
}

/// An HTTP/1.1 request head read directly off a stream.
#[derive(Debug)]
pub struct RawHttpExchange<T> {
    io: T,
    request: HandshakeRequest,
    leftover: BytesMut,
}

impl<T: AsyncRead + Unpin> RawHttpExchange<T> {
    /// Read and parse one request head from `io`.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` past `limits.max_handshake_size`
    /// - `HandshakeError::Malformed` for an unparseable head
    /// - `HandshakeError::Transport` if the stream fails or ends first
    pub async fn read(mut io: T, limits: &Limits) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(1024);
        let head = read_head(&mut io, &mut buf, limits)
            .await
            .map_err(into_handshake)?;
        let request = HandshakeRequest::parse_with_limit(&head, limits.max_handshake_size)?;
        Ok(Self {
            io,
            request,
            leftover: buf,
        })
    }
}

impl<T> RawHttpExchange<T> {
    #[must_use]
    pub fn request(&self) -> &HandshakeRequest {
        &self.request
    }

    /// Give the stream back, e.g. to write an error response.
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T> HttpExchange for RawHttpExchange<T> {
    type Io = T;

    fn method(&self) -> &str {
        &self.request.method
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    fn hijack(self) -> std::result::Result<(T, BytesMut), HandshakeError> {
        Ok((self.io, self.leftover))
    }
}

type OriginCheck = Box<dyn Fn(Option<&str>) -> bool + Send + Sync>;

/// Accepts upgrade requests.
///
/// An `Upgrader` holds no per-request state and can be shared between
/// tasks behind an `Arc`.
///
/// ## Example
///
/// ```rust,ignore
/// use wsconn::{Upgrader, server::RawHttpExchange};
///
/// let upgrader = Upgrader::new().with_allowed_origins(["https://example.com"]);
/// let (stream, _) = listener.accept().await?;
/// let mut conn = upgrader.accept(stream).await?;
/// ```
pub struct Upgrader {
    config: Config,
    timeout: Duration,
    check_origin: Option<OriginCheck>,
    extension: Option<String>,
    random: Mutex<Box<dyn RandomSource>>,
}

impl std::fmt::Debug for Upgrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgrader")
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .field("check_origin", &self.check_origin.is_some())
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl Default for Upgrader {
    fn default() -> Self {
        Self::new()
    }
}

impl Upgrader {
    /// Upgrader accepting any origin, with no extension and a 45 second
    /// handshake timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::server(),
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            check_origin: None,
            extension: None,
            random: Mutex::new(Box::new(OsRandom)),
        }
    }

    /// Configuration applied to every accepted connection.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bound on reading the request and writing the `101` response.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Predicate over the request's `Origin` header (`None` if absent).
    #[must_use]
    pub fn with_check_origin<F>(mut self, check: F) -> Self
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.check_origin = Some(Box::new(check));
        self
    }

    /// Accept only requests whose `Origin` is one of `origins`.
    #[must_use]
    pub fn with_allowed_origins<I, S>(self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: Vec<String> = origins.into_iter().map(Into::into).collect();
        self.with_check_origin(move |origin| validate_origin(origin, &allowed).is_ok())
    }

    /// Value echoed as `Sec-WebSocket-Extensions` on every upgrade.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Source seeding the mask generator of accepted connections.
    #[must_use]
    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Mutex::new(Box::new(random));
        self
    }

    /// Validate `exchange`, take its transport and answer `101`.
    ///
    /// Checks run in order and the first failure is returned: `Connection`
    /// header, `Upgrade` header, method, version, origin, key.
    ///
    /// # Errors
    ///
    /// - `Error::Handshake` for a failed check or a failed hijack
    /// - `Error::InvalidHeaderValue` if the configured extension contains CR/LF
    /// - `HandshakeError::Transport` if the response cannot be written
    /// - `HandshakeError::Timeout` if writing it outlasts the upgrade timeout
    pub async fn upgrade<E>(&self, exchange: E) -> Result<Connection<E::Io>>
    where
        E: HttpExchange,
        E::Io: AsyncRead + AsyncWrite + Unpin,
    {
        self.upgrade_by(exchange, Instant::now() + self.timeout).await
    }

    /// Read an upgrade request off `stream` and upgrade it, all within the
    /// upgrade timeout.
    ///
    /// # Errors
    ///
    /// As [`RawHttpExchange::read`] and [`upgrade`](Self::upgrade), and
    /// `HandshakeError::Timeout` if the client is too slow.
    pub async fn accept<T>(&self, stream: T) -> Result<Connection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let deadline = Instant::now() + self.timeout;
        let exchange = within(deadline, RawHttpExchange::read(stream, &self.config.limits)).await?;
        self.upgrade_by(exchange, deadline).await
    }

    async fn upgrade_by<E>(&self, exchange: E, deadline: Instant) -> Result<Connection<E::Io>>
    where
        E: HttpExchange,
        E::Io: AsyncRead + AsyncWrite + Unpin,
    {
        let response = match self.prepare(&exchange) {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "upgrade rejected");
                return Err(err);
            }
        };
        let mut head = Vec::with_capacity(256);
        response.write(&mut head)?;

        let (mut io, leftover) = exchange.hijack().inspect_err(|err| {
            warn!(error = %err, "hijack failed");
        })?;
        within(deadline, async {
            io.write_all(&head).await.map_err(transport)?;
            io.flush().await.map_err(transport)
        })
        .await?;

        debug!(
            role = %Role::Server,
            protocol = response.protocol.as_deref(),
            extension = response.extension.as_deref(),
            "upgrade complete"
        );

        let rng = seeded_rng(&mut **self.random.lock());
        Ok(Connection::from_parts(io, Role::Server, self.config.clone(), leftover, rng))
    }

    fn prepare<E: HttpExchange>(&self, exchange: &E) -> Result<HandshakeResponse> {
        validate_upgrade_headers(exchange.method(), |name| exchange.header(name))?;

        if let Some(check) = &self.check_origin {
            let origin = exchange.header("origin");
            if !check(origin) {
                return Err(HandshakeError::OriginRejected(origin.unwrap_or("(none)").to_owned()).into());
            }
        }

        let key = validate_key(exchange.header("sec-websocket-key"))?;
        let mut response = HandshakeResponse::for_key(key);
        response.protocol = first_protocol(exchange.header("sec-websocket-protocol")).map(str::to_owned);
        response.extension = self.extension.clone();
        Ok(response)
    }
}

async fn within<F, O>(deadline: Instant, op: F) -> Result<O>
where
    F: Future<Output = Result<O>>,
{
    match timeout_at(deadline, op).await {
        Ok(result) => result,
        Err(_) => {
            debug!(role = %Role::Server, "handshake timed out");
            Err(HandshakeError::Timeout.into())
        }
    }
}

fn transport(err: std::io::Error) -> Error {
    HandshakeError::Transport(err.to_string()).into()
}
