//! Stream socket transport
//!
//! Like the socket transport, but the connection is a socket2 stream socket
//! so that TCP level options can be tuned before connecting.

use super::socket::{endpoint, exchange_and_close, frame_request, resolve, SocketOptions};
use super::{option_bool, option_seconds, option_usize, unknown_option, Transport, TransportState};
use crate::http::session::from_tcp_stream;
use crate::http::{Error, Message, Request, Result};
use socket2::{Domain, Protocol, SockAddr, Socket, TcpKeepalive, Type};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::debug;

/// Stream transport options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    pub socket: SocketOptions,
    /// `TCP_NODELAY`
    pub nodelay: bool,
    /// Idle time before keepalive probes; `None` leaves keepalive off
    pub keepalive: Option<Duration>,
    /// `SO_RCVBUF`
    pub recv_buffer_size: Option<usize>,
    /// `SO_SNDBUF`
    pub send_buffer_size: Option<usize>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            socket: SocketOptions::default(),
            nodelay: true,
            keepalive: None,
            recv_buffer_size: None,
            send_buffer_size: None,
        }
    }
}

impl StreamOptions {
    /// Defaults, or an empty base when `use_defaults` is false
    pub fn with_defaults(use_defaults: bool) -> Self {
        if use_defaults {
            StreamOptions::default()
        } else {
            StreamOptions {
                socket: SocketOptions::with_defaults(false),
                nodelay: false,
                keepalive: None,
                recv_buffer_size: None,
                send_buffer_size: None,
            }
        }
    }

    pub fn nodelay(mut self, value: bool) -> Self {
        self.nodelay = value;
        self
    }

    pub fn keepalive(mut self, time: Duration) -> Self {
        self.keepalive = Some(time);
        self
    }

    /// Merge socket and `stream_*` overrides
    pub fn with_overrides<I, K, V>(mut self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if self.socket.apply(key, value)? {
                continue;
            }
            match key {
                "stream_nodelay" => self.nodelay = option_bool(key, value)?,
                "stream_keepalive" => {
                    let time = option_seconds(key, value)?;
                    self.keepalive = if time.is_zero() { None } else { Some(time) };
                }
                "stream_recv_buffer_size" => self.recv_buffer_size = Some(option_usize(key, value)?),
                "stream_send_buffer_size" => self.send_buffer_size = Some(option_usize(key, value)?),
                _ => return Err(unknown_option(key)),
            }
        }
        Ok(self)
    }

    fn configure(&self, socket: &Socket) -> std::io::Result<()> {
        socket.set_nodelay(self.nodelay)?;

        if let Some(time) = self.keepalive {
            socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(time))?;
        }
        if let Some(size) = self.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }

        Ok(())
    }
}

/// Stream socket transport
#[derive(Debug, Default)]
pub struct StreamTransport {
    options: StreamOptions,
    state: TransportState,
}

impl StreamTransport {
    /// Create a transport with default options
    pub fn new() -> Self {
        StreamTransport::default()
    }

    /// Create a transport with the given options
    pub fn with_options(options: StreamOptions) -> Self {
        StreamTransport {
            options,
            state: TransportState::Idle,
        }
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    fn open(&self, addr: SocketAddr) -> std::io::Result<Socket> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        self.options.configure(&socket)?;

        let addr = SockAddr::from(addr);
        match self.options.socket.io_timeout() {
            Some(timeout) => socket.connect_timeout(&addr, timeout)?,
            None => socket.connect(&addr)?,
        }

        Ok(socket)
    }

    fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let mut last_error = None;

        for addr in resolve(host, port)? {
            match self.open(addr) {
                Ok(socket) => {
                    debug!(host = %host, port, nodelay = self.options.nodelay, "stream connected");
                    return Ok(TcpStream::from(socket));
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

impl Transport for StreamTransport {
    fn send_request(&mut self, request: &Request) -> Result<Message> {
        let (host, port) = endpoint(request)?;
        let stream = self.connect(&host, port)?;

        let mut session = from_tcp_stream(stream);
        session.set_timeout(self.options.socket.io_timeout());

        let wire = frame_request(request, &host, port);
        exchange_and_close(session, &wire, self.options.socket.buffer_size)
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn set_state(&mut self, state: TransportState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = StreamOptions::default();
        assert!(options.nodelay);
        assert_eq!(options.keepalive, None);
        assert_eq!(options.socket.buffer_size, 1024);
        assert!(!StreamOptions::with_defaults(false).nodelay);
    }

    #[test]
    fn test_overrides() {
        let options = StreamOptions::default()
            .with_overrides([
                ("socket_timeout", "2"),
                ("stream_nodelay", "off"),
                ("stream_keepalive", "30"),
                ("stream_recv_buffer_size", "65536"),
            ])
            .unwrap();

        assert_eq!(options.socket.timeout, Duration::from_secs(2));
        assert!(!options.nodelay);
        assert_eq!(options.keepalive, Some(Duration::from_secs(30)));
        assert_eq!(options.recv_buffer_size, Some(65536));
        assert_eq!(options.send_buffer_size, None);

        assert!(matches!(
            StreamOptions::default().with_overrides([("stream_linger", "1")]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_configure_socket() {
        let options = StreamOptions::default().keepalive(Duration::from_secs(60));
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
        options.configure(&socket).unwrap();

        assert!(socket.nodelay().unwrap());
        assert!(socket.keepalive().unwrap());
    }
}
