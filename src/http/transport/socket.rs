//! Blocking socket transport
//!
//! Opens a plain `TcpStream` per request, writes the request, reads until the
//! server closes the connection and parses what came back. The exchange
//! helpers here are shared with the stream transport.

use super::{option_seconds, option_usize, unknown_option, Transport, TransportState};
use crate::http::session::{HttpSession, SessionOps, DEFAULT_TIMEOUT};
use crate::http::{Error, HttpMessage, Message, Request, Result, CRLF, DEFAULT_HTTP_PORT};
use bytes::{BufMut, BytesMut};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// Default size of a single read
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Socket transport options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// Connect and per-read timeout
    pub timeout: Duration,
    /// Upper bound on the bytes requested by a single read
    pub buffer_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        SocketOptions {
            timeout: DEFAULT_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl SocketOptions {
    /// Defaults, or an all-zero base when `use_defaults` is false
    pub fn with_defaults(use_defaults: bool) -> Self {
        if use_defaults {
            SocketOptions::default()
        } else {
            SocketOptions {
                timeout: Duration::ZERO,
                buffer_size: 0,
            }
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Merge `socket_timeout` (seconds) and `socket_buffer_size` overrides
    pub fn with_overrides<I, K, V>(mut self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            if !self.apply(key.as_ref(), value.as_ref())? {
                return Err(unknown_option(key.as_ref()));
            }
        }
        Ok(self)
    }

    /// Apply one override, `Ok(false)` when the key is not a socket option
    pub(crate) fn apply(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "socket_timeout" => self.timeout = option_seconds(key, value)?,
            "socket_buffer_size" => self.buffer_size = option_usize(key, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Zero means no timeout
    pub(crate) fn io_timeout(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }
}

/// Host and port a request is sent to
pub(crate) fn endpoint(request: &Request) -> Result<(String, u16)> {
    let uri = request.uri();
    let host = uri
        .host()
        .ok_or_else(|| Error::InvalidArgument(format!("request target {:?} has no host", uri.as_str())))?;

    Ok((host.to_string(), uri.port().unwrap_or(DEFAULT_HTTP_PORT)))
}

/// Resolve `host:port`, reporting failures as connection errors
pub(crate) fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::Connection {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(Error::Connection {
            host: host.to_string(),
            port,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved"),
        });
    }

    Ok(addrs)
}

/// Wire bytes for a socket exchange.
///
/// `Host` and `Connection: close` are filled in when absent, since the
/// response is framed by the server closing the connection, and the header
/// block is always terminated.
pub(crate) fn frame_request(request: &Request, host: &str, port: u16) -> BytesMut {
    let mut framed = request.clone();
    let headers = framed.headers_mut();

    if !headers.has("Host") {
        let authority = request
            .uri()
            .authority()
            .unwrap_or_else(|| format!("{}:{}", host, port));
        headers.set_known("Host", authority);
    }
    if !headers.has("Connection") {
        headers.set_known("Connection", "close");
    }

    let mut wire = framed.to_wire();
    if framed.body().is_empty() {
        wire.put_slice(CRLF.as_bytes());
    }
    wire
}

/// Write the request and read the response until the peer closes
pub(crate) fn exchange<S: SessionOps>(
    session: &mut HttpSession<S>,
    wire: &[u8],
    buffer_size: usize,
) -> Result<Message> {
    session.write_all(wire)?;
    trace!(bytes = wire.len(), "request written");

    let data = session.read_to_end(buffer_size)?;
    trace!(bytes = data.len(), "response read");

    Message::parse_bytes(&data)
}

/// Run an exchange and close the session whatever the outcome
pub(crate) fn exchange_and_close<S: SessionOps>(
    mut session: HttpSession<S>,
    wire: &[u8],
    buffer_size: usize,
) -> Result<Message> {
    let result = exchange(&mut session, wire, buffer_size);

    if let Err(e) = session.close() {
        debug!(error = %e, "error while closing connection");
    }
    debug!("connection closed");

    result
}

/// Blocking socket transport
#[derive(Debug, Default)]
pub struct SocketTransport {
    options: SocketOptions,
    state: TransportState,
}

impl SocketTransport {
    /// Create a transport with default options
    pub fn new() -> Self {
        SocketTransport::default()
    }

    /// Create a transport with the given options
    pub fn with_options(options: SocketOptions) -> Self {
        SocketTransport {
            options,
            state: TransportState::Idle,
        }
    }

    pub fn options(&self) -> &SocketOptions {
        &self.options
    }

    fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let mut last_error = None;

        for addr in resolve(host, port)? {
            let attempt = match self.options.io_timeout() {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(host = %host, port, "connected");
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(Error::Connection {
            host: host.to_string(),
            port,
            source: last_error
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses")),
        })
    }
}

impl Transport for SocketTransport {
    fn send_request(&mut self, request: &Request) -> Result<Message> {
        let (host, port) = endpoint(request)?;
        let stream = self.connect(&host, port)?;

        let mut session = crate::http::session::from_tcp_stream(stream);
        session.set_timeout(self.options.io_timeout());

        let wire = frame_request(request, &host, port);
        exchange_and_close(session, &wire, self.options.buffer_size)
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn set_state(&mut self, state: TransportState) {
        self.state = state;
    }
}
