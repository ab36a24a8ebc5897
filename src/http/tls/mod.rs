//! TLS support for HTTP connections
//!
//! The native transport reaches `https` targets through this module. It
//! uses the session operations abstraction pattern:
//!
//! 1. `TlsConfig` holds client TLS settings (versions, verification, CA bundle)
//! 2. `TlsSessionOps` implements the `SessionOps` trait for encrypted I/O
//! 3. The request/response exchange is unchanged; it transparently uses TLS operations
//!
//! # Examples
//!
//! ```no_run
//! use httpwire::http::tls::{TlsConfig, TlsVersion};
//! use httpwire::http::HttpSession;
//! use std::net::TcpStream;
//!
//! let tls_config = TlsConfig::client()
//!     .version_range(TlsVersion::Tls12, TlsVersion::Tls13)
//!     .verify_peer(true)
//!     .verify_host(true)
//!     .build()
//!     .unwrap();
//!
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let tls_session = tls_config.connect(tcp_stream, "example.com").unwrap();
//! let mut session = HttpSession::new(tls_session);
//! session.write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n").unwrap();
//! ```

pub mod config;
pub mod session;

pub use config::{ClientConfigBuilder, TlsConfig, TlsError, TlsVersion};
pub use session::TlsSessionOps;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
