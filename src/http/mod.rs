//! HTTP/1.x message model and transports
//!
//! This module converts between raw HTTP/1.x wire text and structured
//! messages, and sends requests through interchangeable blocking transports.
//!
//! # Architecture
//!
//! - `HeaderCollection` owns label normalization and header-block (de)serialization
//! - `parser` recognizes a raw message and splits it into start line, headers and body
//! - `Request` / `Response` are the typed messages, joined by the `Message` enum
//! - `Transport` is the "send a request, block for the response" contract; it is
//!   implemented over a plain blocking socket, a socket2 stream socket and a
//!   native TLS-capable client handle
//! - `UserAgent` keeps named transports and runs hooks around every send
//!
//! All socket I/O goes through the `SessionOps` abstraction, so plain TCP and
//! TLS connections share the same read/write code.
//!
//! # Examples
//!
//! ```no_run
//! use httpwire::http::{Request, UserAgent, Uri};
//! use httpwire::http::transport::SocketTransport;
//!
//! let mut agent = UserAgent::new();
//! agent.register("socket", SocketTransport::new()).unwrap();
//!
//! let request = Request::builder()
//!     .uri(Uri::parse("http://127.0.0.1:8080/index.html").unwrap())
//!     .header("Accept", "text/html")
//!     .build()
//!     .unwrap();
//!
//! let response = agent.send(request, None).unwrap();
//! assert_eq!(response.status().code(), 200);
//! ```

pub mod headers;
pub mod message;
pub mod parser;
pub mod session;
pub mod tls;
pub mod transport;
pub mod uri;
pub mod user_agent;

pub use headers::{FieldValue, HeaderCollection, HeaderInput};
pub use message::{HttpMessage, Message, Method, Request, Response, Status};
pub use parser::{MessageKind, RawMessage};
pub use session::{HttpSession, SessionOps};
pub use transport::{Transport, TransportState};
pub use uri::Uri;
pub use user_agent::UserAgent;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid header label: {0:?}")]
    InvalidLabel(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(u16),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Header {0} does not exist")]
    NotFound(String),

    #[error("Index {index} for header {label} does not exist")]
    IndexOutOfRange { label: String, index: usize },

    #[error("Malformed headers: {0}")]
    MalformedHeaders(String),

    #[error("Not an HTTP message")]
    NotAnHttpMessage,

    #[error("Could not connect to {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout")]
    Timeout,

    #[error("Transport error ({code}): {message}")]
    Transport { code: u32, message: String },

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Unknown transport: {0}")]
    UnknownTransport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),
}

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Default protocol version of a new message
pub const DEFAULT_VERSION: &str = "1.1";

/// Default separator used when joining multi-valued headers
pub const DEFAULT_SEPARATOR: &str = ",";

/// CRLF line ending
pub const CRLF: &str = "\r\n";
