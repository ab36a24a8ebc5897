//! Native client transport
//!
//! The transport drives a reusable [`NativeHandle`], a small client handle in
//! the style of classic easy-handle HTTP libraries: per-request settings
//! (method, URL, header list, user agent, body, accepted encodings) are set on
//! the handle, the request is performed, and the handle is reset. The handle
//! keeps its TLS connector between requests, speaks `https` through openssl
//! and decodes gzip and deflate bodies.
//!
//! Failures are reported with numeric error codes:
//!
//! | code | meaning                        |
//! |------|--------------------------------|
//! | 1    | unsupported protocol           |
//! | 3    | malformed URL                  |
//! | 6    | could not resolve host         |
//! | 7    | could not connect              |
//! | 23   | body could not be written out  |
//! | 28   | operation timed out            |
//! | 35   | TLS connect error              |
//! | 55   | failed sending data            |
//! | 56   | failure receiving data         |
//! | 61   | unrecognized content encoding  |
//!
//! Codes 23 and 61 are encoding related; the transport retries those once with
//! content encoding turned off. Bodies are handed over as raw bytes, so a
//! binary body is never an error.

use super::{option_bool, option_seconds, option_usize, unknown_option, Transport, TransportState};
use crate::http::session::{HttpSession, SessionOps, DEFAULT_TIMEOUT};
use crate::http::tls::TlsConfig;
use crate::http::{
    Error, HttpMessage, Message, Method, Request, Result, Uri, CRLF, DEFAULT_HTTPS_PORT,
    DEFAULT_HTTP_PORT, DEFAULT_SEPARATOR, DEFAULT_VERSION,
};
use bytes::{BufMut, Bytes, BytesMut};
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use std::fmt;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const UNSUPPORTED_PROTOCOL: u32 = 1;
pub const URL_MALFORMAT: u32 = 3;
pub const COULDNT_RESOLVE_HOST: u32 = 6;
pub const COULDNT_CONNECT: u32 = 7;
pub const WRITE_ERROR: u32 = 23;
pub const OPERATION_TIMEDOUT: u32 = 28;
pub const SSL_CONNECT_ERROR: u32 = 35;
pub const SEND_ERROR: u32 = 55;
pub const RECV_ERROR: u32 = 56;
pub const BAD_CONTENT_ENCODING: u32 = 61;

/// Encodings requested when the `encoding` option is empty
const SUPPORTED_ENCODINGS: &str = "gzip, deflate";

/// Native transport options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeOptions {
    /// Per-operation timeout once connected
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Verify the server certificate chain
    pub verify_peer: bool,
    /// Verify that the certificate matches the host name
    pub verify_host: bool,
    /// Accepted content encodings: `""` for every supported encoding,
    /// `"identity"` or `"none"` to turn decoding off
    pub encoding: Option<String>,
    /// CA bundle for peer verification
    pub ca_file: Option<PathBuf>,
    /// User agent sent when the request carries none
    pub user_agent: Option<String>,
    pub buffer_size: usize,
}

impl Default for NativeOptions {
    fn default() -> Self {
        NativeOptions {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_TIMEOUT,
            verify_peer: false,
            verify_host: false,
            encoding: Some(String::new()),
            ca_file: None,
            user_agent: None,
            buffer_size: 8192,
        }
    }
}

impl NativeOptions {
    /// Defaults, or an empty base when `use_defaults` is false
    pub fn with_defaults(use_defaults: bool) -> Self {
        if use_defaults {
            NativeOptions::default()
        } else {
            NativeOptions {
                timeout: Duration::ZERO,
                connect_timeout: Duration::ZERO,
                verify_peer: false,
                verify_host: false,
                encoding: None,
                ca_file: None,
                user_agent: None,
                buffer_size: 0,
            }
        }
    }

    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    pub fn verify_host(mut self, verify: bool) -> Self {
        self.verify_host = verify;
        self
    }

    pub fn encoding(mut self, encoding: Option<&str>) -> Self {
        self.encoding = encoding.map(str::to_string);
        self
    }

    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Merge plain key/value overrides
    pub fn with_overrides<I, K, V>(mut self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "timeout" => self.timeout = option_seconds(key, value)?,
                "connect_timeout" => self.connect_timeout = option_seconds(key, value)?,
                "ssl_verifypeer" => self.verify_peer = option_bool(key, value)?,
                "ssl_verifyhost" => self.verify_host = option_bool(key, value)?,
                "encoding" => self.encoding = Some(value.to_string()),
                "cainfo" => self.ca_file = Some(PathBuf::from(value)),
                "useragent" => self.user_agent = Some(value.to_string()),
                "buffer_size" => self.buffer_size = option_usize(key, value)?,
                _ => return Err(unknown_option(key)),
            }
        }
        Ok(self)
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

/// Whether an `encoding` setting asks for decoded bodies
fn decoding_enabled(encoding: Option<&str>) -> bool {
    match encoding {
        Some(value) => {
            let value = value.trim();
            !value.eq_ignore_ascii_case("identity") && !value.eq_ignore_ascii_case("none")
        }
        None => false,
    }
}

/// Failure of a handle operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleError {
    pub code: u32,
    pub message: String,
}

impl HandleError {
    fn new(code: u32, message: impl Into<String>) -> Self {
        HandleError {
            code,
            message: message.into(),
        }
    }

    /// Encoding related failures, worth one retry without encoding
    pub fn is_encoding_error(&self) -> bool {
        self.code == WRITE_ERROR || self.code == BAD_CONTENT_ENCODING
    }
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.code, self.message)
    }
}

impl From<HandleError> for Error {
    fn from(e: HandleError) -> Self {
        Error::Transport {
            code: e.code,
            message: e.message,
        }
    }
}

type HandleResult<T> = std::result::Result<T, HandleError>;

/// Map a session failure to a handle error code
fn io_failure(e: Error, code: u32, what: &str) -> HandleError {
    match e {
        Error::Timeout => HandleError::new(OPERATION_TIMEDOUT, format!("timed out {}", what)),
        other => HandleError::new(code, format!("failed {}: {}", what, other)),
    }
}

/// Reusable client handle
#[derive(Default)]
pub struct NativeHandle {
    tls: Option<TlsConfig>,
    method: Method,
    url: Uri,
    version: Option<String>,
    headers: Vec<String>,
    user_agent: Option<String>,
    body: Option<Bytes>,
    nobody: bool,
    encoding: Option<String>,
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("tls", &self.tls.is_some())
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl NativeHandle {
    pub fn new() -> Self {
        NativeHandle::default()
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn set_url(&mut self, url: Uri) {
        self.url = url;
    }

    pub fn set_version(&mut self, version: &str) {
        self.version = Some(version.to_string());
    }

    /// Header lines, `Label: value`
    pub fn set_headers(&mut self, headers: Vec<String>) {
        self.headers = headers;
    }

    pub fn set_user_agent(&mut self, user_agent: Option<String>) {
        self.user_agent = user_agent;
    }

    /// Body to upload, sent with a `Content-Length`
    pub fn set_body(&mut self, body: Option<Bytes>) {
        self.body = body;
    }

    /// Skip the response body
    pub fn set_nobody(&mut self, nobody: bool) {
        self.nobody = nobody;
    }

    pub fn set_encoding(&mut self, encoding: Option<String>) {
        self.encoding = encoding;
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Drop the per-request settings, keeping the TLS connector
    pub fn reset(&mut self) {
        let tls = self.tls.take();
        *self = NativeHandle {
            tls,
            ..NativeHandle::default()
        };
    }

    fn has_header(&self, label: &str) -> bool {
        self.headers.iter().any(|line| {
            line.split(':')
                .next()
                .map(|name| name.trim().eq_ignore_ascii_case(label))
                .unwrap_or(false)
        })
    }

    /// Wire bytes of the configured request, in origin form
    fn request_bytes(&self) -> HandleResult<BytesMut> {
        let mut lines = vec![format!(
            "{} {} HTTP/{}",
            self.method,
            self.url.path_and_query(),
            self.version.as_deref().unwrap_or(DEFAULT_VERSION)
        )];

        if !self.has_header("Host") {
            let host = self
                .url
                .authority()
                .ok_or_else(|| HandleError::new(URL_MALFORMAT, "URL has no host"))?;
            lines.push(format!("Host: {}", host));
        }
        if let Some(user_agent) = &self.user_agent {
            if !self.has_header("User-Agent") {
                lines.push(format!("User-Agent: {}", user_agent));
            }
        }
        if decoding_enabled(self.encoding.as_deref()) && !self.has_header("Accept-Encoding") {
            let encoding = self.encoding.as_deref().unwrap_or("").trim();
            let accepted = if encoding.is_empty() { SUPPORTED_ENCODINGS } else { encoding };
            lines.push(format!("Accept-Encoding: {}", accepted));
        }

        lines.extend(self.headers.iter().cloned());

        if let Some(body) = &self.body {
            if !self.has_header("Content-Length") {
                lines.push(format!("Content-Length: {}", body.len()));
            }
        }
        if !self.has_header("Connection") {
            lines.push("Connection: close".to_string());
        }

        let head = lines.join(CRLF);
        let body = self.body.as_deref().unwrap_or_default();

        let mut wire = BytesMut::with_capacity(head.len() + 4 + body.len());
        wire.put_slice(head.as_bytes());
        wire.put_slice(CRLF.as_bytes());
        wire.put_slice(CRLF.as_bytes());
        wire.put_slice(body);
        Ok(wire)
    }

    fn tls_config(&mut self, options: &NativeOptions) -> HandleResult<&TlsConfig> {
        if self.tls.is_none() {
            let mut builder = TlsConfig::client()
                .verify_peer(options.verify_peer)
                .verify_host(options.verify_host);
            if let Some(path) = &options.ca_file {
                builder = builder.ca_file(path);
            }
            let config = builder
                .build()
                .map_err(|e| HandleError::new(SSL_CONNECT_ERROR, e.to_string()))?;
            self.tls = Some(config);
        }

        self.tls
            .as_ref()
            .ok_or_else(|| HandleError::new(SSL_CONNECT_ERROR, "TLS is not configured"))
    }

    fn connect(&self, host: &str, port: u16, options: &NativeOptions) -> HandleResult<TcpStream> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| HandleError::new(COULDNT_RESOLVE_HOST, format!("could not resolve {}: {}", host, e)))?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            let attempt = match non_zero(options.connect_timeout) {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(e) if e.kind() == io::ErrorKind::TimedOut => {
                HandleError::new(OPERATION_TIMEDOUT, format!("connect to {}:{} timed out", host, port))
            }
            Some(e) => HandleError::new(COULDNT_CONNECT, format!("could not connect to {}:{}: {}", host, port, e)),
            None => HandleError::new(COULDNT_RESOLVE_HOST, format!("could not resolve {}", host)),
        })
    }

    /// Perform the configured request, returning the raw response
    pub fn perform(&mut self, options: &NativeOptions) -> HandleResult<BytesMut> {
        let secure = match self.url.scheme() {
            Some("http") => false,
            Some("https") => true,
            Some(other) => {
                return Err(HandleError::new(
                    UNSUPPORTED_PROTOCOL,
                    format!("protocol {:?} not supported", other),
                ))
            }
            None => {
                return Err(HandleError::new(
                    URL_MALFORMAT,
                    format!("URL {:?} is not absolute", self.url.as_str()),
                ))
            }
        };

        let host = self
            .url
            .host()
            .ok_or_else(|| HandleError::new(URL_MALFORMAT, "URL has no host"))?
            .to_string();
        let port = self
            .url
            .port()
            .unwrap_or(if secure { DEFAULT_HTTPS_PORT } else { DEFAULT_HTTP_PORT });

        let wire = self.request_bytes()?;
        let stream = self.connect(&host, port, options)?;
        debug!(host = %host, port, secure, "native handle connected");

        let raw = if secure {
            let tls = self.tls_config(options)?;
            let session = tls
                .connect(stream, &host)
                .map_err(|e| HandleError::new(SSL_CONNECT_ERROR, e.to_string()))?;
            roundtrip(HttpSession::new(session), &wire, options)?
        } else {
            roundtrip(HttpSession::new(crate::http::session::FdSessionOps::new(stream)), &wire, options)?
        };

        self.finish(raw)
    }

    /// Split the raw response and drop or decode the body
    fn finish(&self, mut raw: BytesMut) -> HandleResult<BytesMut> {
        let head_len = split_head(&raw).0.len();
        let body = raw.split_off(head_len);
        let head = std::str::from_utf8(&raw)
            .map_err(|_| HandleError::new(RECV_ERROR, "response header is not text"))?;

        if self.nobody {
            return Ok(raw);
        }

        if decoding_enabled(self.encoding.as_deref()) {
            if let Some(encoding) = content_encoding(head) {
                let decoded = decode_body(Some(encoding.as_str()), &body)?;
                trace!(encoding = %encoding, bytes = decoded.len(), "decoded body");
                raw.put_slice(&decoded);
                return Ok(raw);
            }
        }

        raw.unsplit(body);
        Ok(raw)
    }
}

/// Write the request, read the response and close the session
fn roundtrip<S: SessionOps>(
    mut session: HttpSession<S>,
    wire: &[u8],
    options: &NativeOptions,
) -> HandleResult<BytesMut> {
    session.set_timeout(non_zero(options.timeout));

    let result = session
        .write_all(wire)
        .map_err(|e| io_failure(e, SEND_ERROR, "sending request"))
        .and_then(|_| {
            session
                .read_to_end(options.buffer_size)
                .map_err(|e| io_failure(e, RECV_ERROR, "receiving response"))
        });

    if let Err(e) = session.close() {
        debug!(error = %e, "error while closing connection");
    }

    let raw = result?;
    trace!(bytes = raw.len(), "native handle read response");
    Ok(raw)
}

/// Split raw bytes after the blank line ending the header block
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = raw.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);

    let end = match (crlf, lf) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => raw.len(),
    };

    raw.split_at(end)
}

fn content_encoding(head: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (label, value) = line.split_once(':')?;
        if label.trim().eq_ignore_ascii_case("Content-Encoding") {
            Some(value.trim().to_ascii_lowercase())
        } else {
            None
        }
    })
}

fn decode_body(encoding: Option<&str>, body: &[u8]) -> HandleResult<Vec<u8>> {
    let bad = |e: io::Error| HandleError::new(BAD_CONTENT_ENCODING, format!("error decoding body: {}", e));

    let mut decoded = Vec::new();
    match encoding {
        None | Some("") | Some("identity") => return Ok(body.to_vec()),
        Some("gzip") | Some("x-gzip") => {
            GzDecoder::new(body).read_to_end(&mut decoded).map_err(bad)?;
        }
        Some("deflate") => {
            // zlib wrapped, with raw deflate streams as fallback
            if ZlibDecoder::new(body).read_to_end(&mut decoded).is_err() {
                decoded.clear();
                DeflateDecoder::new(body).read_to_end(&mut decoded).map_err(bad)?;
            }
        }
        Some(other) => {
            return Err(HandleError::new(
                BAD_CONTENT_ENCODING,
                format!("unrecognized content encoding: {}", other),
            ))
        }
    }

    Ok(decoded)
}

/// Native client transport
#[derive(Debug, Default)]
pub struct NativeTransport {
    options: NativeOptions,
    handle: NativeHandle,
    state: TransportState,
}

impl NativeTransport {
    /// Create a transport with default options
    pub fn new() -> Self {
        NativeTransport::default()
    }

    /// Create a transport with the given options
    pub fn with_options(options: NativeOptions) -> Self {
        NativeTransport {
            options,
            handle: NativeHandle::new(),
            state: TransportState::Idle,
        }
    }

    pub fn options(&self) -> &NativeOptions {
        &self.options
    }

    /// Load the request into the handle
    fn prepare(&mut self, request: &Request) {
        let handle = &mut self.handle;
        let method = request.method();

        handle.set_method(method);
        handle.set_url(request.uri().clone());
        handle.set_version(request.version());
        handle.set_headers(request.headers().string_list(DEFAULT_SEPARATOR));
        handle.set_user_agent(self.options.user_agent.clone());
        handle.set_encoding(self.options.encoding.clone());

        match method {
            Method::Post | Method::Put => handle.set_body(Some(Bytes::copy_from_slice(request.body()))),
            Method::Head => handle.set_nobody(true),
            _ => {}
        }
    }
}

impl Transport for NativeTransport {
    fn send_request(&mut self, request: &Request) -> Result<Message> {
        self.prepare(request);

        let result = match self.handle.perform(&self.options) {
            Err(e) if e.is_encoding_error() => {
                warn!(code = e.code, error = %e.message, "retrying without content encoding");
                self.handle.set_encoding(Some("identity".to_string()));
                self.handle.perform(&self.options)
            }
            other => other,
        };

        self.handle.reset();

        let raw = result?;
        Message::parse_bytes(&raw)
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn set_state(&mut self, state: TransportState) {
        self.state = state;
    }
}
