//! Client side of the opening handshake.
//!
//! [`Dialer`] connects over TCP, sends the upgrade request and verifies the
//! server's `101` answer. [`client_handshake`] runs the same exchange over a
//! stream the caller already has.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::{Host, Url};

use crate::codec::head::read_head;
use crate::config::Config;
use crate::connection::{Connection, Role};
use crate::error::{Error, HandshakeError, Result};
use crate::protocol::handshake::{ClientRequest, ResponseHead, generate_key};
use crate::random::{MaskRng, OsRandom, RandomSource};

/// How long `dial` waits for connect, request and response together.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(45);

/// Opens client connections.
///
/// ## Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use wsconn::Dialer;
///
/// let mut dialer = Dialer::new().with_timeout(Duration::from_secs(5));
/// let conn = dialer.dial("ws://127.0.0.1:9001/chat").await?;
/// ```
pub struct Dialer {
    timeout: Duration,
    config: Config,
    random: Box<dyn RandomSource>,
}

impl std::fmt::Debug for Dialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialer")
            .field("timeout", &self.timeout)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Dialer {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialer {
    /// Dialer with a 45 second handshake timeout and OS randomness.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            config: Config::client(),
            random: Box::new(OsRandom),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configuration applied to every dialed connection.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Source for handshake nonces. Mask keys of dialed connections are
    /// seeded from it too.
    #[must_use]
    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Connect to `url` and complete the opening handshake.
    ///
    /// # Errors
    ///
    /// `Error::Handshake` with:
    /// - `InvalidUrl` / `UnsupportedScheme` for anything but `ws://` or `http://`
    /// - `Transport` if connecting or exchanging the handshake fails
    /// - `Timeout` if it all takes longer than the dial timeout
    /// - `BadStatus` / `AcceptMismatch` if the server does not accept
    ///
    /// and `Error::HandshakeTooLarge` for an oversized response head.
    pub async fn dial(&mut self, url: &str) -> Result<Connection<TcpStream>> {
        let url = parse_url(url)?;
        let host = connect_host(&url)?;
        let port = url.port_or_known_default().unwrap_or(80);
        let timeout = self.timeout;

        let handshake = async {
            let stream = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|err| HandshakeError::Transport(err.to_string()))?;
            client_handshake(stream, &url, self.config.clone(), &mut *self.random).await
        };

        match tokio::time::timeout(timeout, handshake).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%url, ?timeout, "handshake timed out");
                Err(HandshakeError::Timeout.into())
            }
        }
    }
}

/// Dial `url` with a default [`Dialer`].
///
/// # Errors
///
/// As [`Dialer::dial`].
pub async fn dial(url: &str) -> Result<Connection<TcpStream>> {
    Dialer::new().dial(url).await
}

/// Run the client handshake for `url` over an already connected `stream`.
///
/// Bytes the server sent after its response head are kept and decoded as
/// the first frames of the connection.
///
/// # Errors
///
/// As [`Dialer::dial`], minus the timeout; wrap the call to bound it.
pub async fn client_handshake<T>(
    mut stream: T,
    url: &Url,
    config: Config,
    random: &mut dyn RandomSource,
) -> Result<Connection<T>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let request = request_for(url, generate_key(random))?;
    let mut head = Vec::with_capacity(256);
    request.write(&mut head)?;

    stream.write_all(&head).await.map_err(transport)?;
    stream.flush().await.map_err(transport)?;

    let mut buf = BytesMut::with_capacity(1024);
    let response = read_head(&mut stream, &mut buf, &config.limits)
        .await
        .map_err(into_handshake)?;
    let response = ResponseHead::parse(&response)?;
    response.verify(&request.key)?;

    debug!(role = %Role::Client, %url, leftover = buf.len(), "handshake complete");

    let rng = seeded_rng(random);
    Ok(Connection::from_parts(stream, Role::Client, config, buf, rng))
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|err| HandshakeError::InvalidUrl(format!("{raw}: {err}")))?;
    match url.scheme() {
        "ws" | "http" => Ok(url),
        other => Err(HandshakeError::UnsupportedScheme(other.to_owned()).into()),
    }
}

/// Address to connect to. IPv6 literals lose the brackets the URL and the
/// Host header carry.
fn connect_host(url: &Url) -> Result<String> {
    match url.host() {
        Some(Host::Ipv6(addr)) => Ok(addr.to_string()),
        Some(Host::Ipv4(addr)) => Ok(addr.to_string()),
        Some(Host::Domain(domain)) => Ok(domain.to_owned()),
        None => Err(HandshakeError::InvalidUrl(format!("{url}: missing host")).into()),
    }
}

fn request_for(url: &Url, key: String) -> Result<ClientRequest> {
    let host = url
        .host_str()
        .ok_or_else(|| HandshakeError::InvalidUrl(format!("{url}: missing host")))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };
    let target = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_owned(),
    };
    Ok(ClientRequest { host, target, key })
}

/// Per-connection mask generator drawn from the dialer's source.
pub(crate) fn seeded_rng(random: &mut dyn RandomSource) -> Box<dyn RandomSource> {
    let mut seed = [0u8; 8];
    random.fill_bytes(&mut seed);
    Box::new(MaskRng::from_seed(u64::from_le_bytes(seed)))
}

fn transport(err: std::io::Error) -> Error {
    HandshakeError::Transport(err.to_string()).into()
}

/// Transport failures while reading the head are handshake failures.
pub(crate) fn into_handshake(err: Error) -> Error {
    match err {
        Error::Io { message, .. } => HandshakeError::Transport(message).into(),
        other => other,
    }
}
