//! TLS session operations
//!
//! This module implements the SessionOps trait for TLS connections,
//! enabling transparent switching between plain TCP and TLS I/O.

use super::config::{TlsConfig, TlsError};
use crate::http::session::{poll_fd, PollEvents, SessionOps};
use crate::http::{Error, Result as HttpResult};
use openssl::ssl::{ErrorCode, Ssl, SslStream};
use std::io::Write;
use std::net::{IpAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;
use tracing::debug;

/// TLS session operations
///
/// Implements SessionOps trait for TLS-encrypted connections.
/// Wraps an OpenSSL SslStream and provides poll/read/write/close operations.
pub struct TlsSessionOps {
    stream: SslStream<TcpStream>,
    failed: bool,
}

impl TlsSessionOps {
    /// Create a client TLS connection (perform handshake)
    pub fn connect(tcp_stream: TcpStream, config: &TlsConfig, host: &str) -> Result<Self, TlsError> {
        let mut ssl = Ssl::new(&config.ctx)?;

        let servername = config.servername.as_deref().unwrap_or(host);

        // SNI is only sent for names, never for literal addresses
        if servername.parse::<IpAddr>().is_err() {
            ssl.set_hostname(servername)?;
        }

        if config.verify_peer && config.verify_host {
            ssl.param_mut().set_host(servername)?;
        }

        let ssl_stream = ssl
            .connect(tcp_stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("Connection to {} failed: {}", host, e)))?;

        debug!(
            "TLS handshake with {} done ({})",
            host,
            ssl_stream.ssl().version_str()
        );

        Ok(TlsSessionOps {
            stream: ssl_stream,
            failed: false,
        })
    }

    /// Negotiated protocol version (`TLSv1.3`)
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    /// Check if TLS failed
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Get reference to underlying TCP stream
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }
}

impl SessionOps for TlsSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> HttpResult<bool> {
        // Decrypted bytes may already be buffered inside OpenSSL
        if matches!(events, PollEvents::Read | PollEvents::Both) && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }

        poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        match self.stream.ssl_read(buf) {
            Ok(n) => Ok(n),
            // peer closed without close_notify, or sent it
            Err(e)
                if e.code() == ErrorCode::ZERO_RETURN
                    || (e.code() == ErrorCode::SYSCALL && e.io_error().is_none()) =>
            {
                Ok(0)
            }
            Err(e) => {
                self.failed = true;
                Err(Error::Io(e.into_io_error().unwrap_or_else(|e| {
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
                })))
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        self.stream.write(buf).map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn close(&mut self) -> HttpResult<()> {
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        use std::net::Shutdown;
        match self.stream.get_mut().shutdown(Shutdown::Both) {
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Error::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::pkey::PKey;
    use openssl::ssl::{SslAcceptor, SslMethod};
    use openssl::x509::X509;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    const CERT: &str = include_str!("../../../tests/common/example_com.pem");

    fn acceptor() -> SslAcceptor {
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
        builder.set_certificate(&X509::from_pem(CERT.as_bytes()).unwrap()).unwrap();
        builder.set_private_key(&PKey::private_key_from_pem(CERT.as_bytes()).unwrap()).unwrap();
        builder.build()
    }

    #[test]
    fn test_tls_client_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = acceptor();

        let server_handle = thread::spawn(move || {
            let (tcp_stream, _) = listener.accept().unwrap();
            let mut tls = acceptor.accept(tcp_stream).unwrap();

            let mut buf = [0u8; 5];
            tls.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"Hello");

            tls.write_all(b"World").unwrap();
            tls.shutdown().ok();
        });

        let config = TlsConfig::client().verify_peer(false).build().unwrap();
        let tcp_stream = TcpStream::connect(addr).unwrap();
        let mut session = config.connect(tcp_stream, "example.com").unwrap();

        assert!(!session.failed());
        assert!(session.version().starts_with("TLS"));

        assert_eq!(SessionOps::write(&mut session, b"Hello").unwrap(), 5);

        let mut received = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            let n = SessionOps::read(&mut session, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"World");

        session.close().unwrap();
        server_handle.join().unwrap();
    }

    #[test]
    fn test_tls_verify_peer_rejects_self_signed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = acceptor();

        let server_handle = thread::spawn(move || {
            let (tcp_stream, _) = listener.accept().unwrap();
            // the client aborts the handshake
            assert!(acceptor.accept(tcp_stream).is_err());
        });

        let config = TlsConfig::client().verify_peer(true).build().unwrap();
        let tcp_stream = TcpStream::connect(addr).unwrap();
        let result = config.connect(tcp_stream, "example.com");
        assert!(matches!(result, Err(TlsError::HandshakeFailed(_))));

        server_handle.join().unwrap();
    }
}
