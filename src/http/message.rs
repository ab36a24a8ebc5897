//! HTTP message types
//!
//! This module defines the core types for HTTP requests and responses, the
//! closed method and status tables, and conversion from raw wire text.
//! Bodies are raw bytes; only the start line and the header block are text.

use super::parser::{self, MessageKind, StartLine};
use super::{Error, HeaderCollection, HeaderInput, Result, Uri, CRLF, DEFAULT_SEPARATOR, DEFAULT_VERSION};
use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    Options,
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
    Trace,
    Connect,
}

impl Method {
    /// Every method token, in table order
    pub const ALL: [Method; 8] = [
        Method::Options,
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Trace,
        Method::Connect,
    ];

    /// Convert method to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }

    /// Check if a token is in the method table (case-sensitive)
    pub fn is_valid(token: &str) -> bool {
        Method::ALL.iter().any(|m| m.as_str() == token)
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status code table with RFC 2616 reason phrases
const REASONS: &[(u16, &str)] = &[
    // Informational
    (100, "Continue"),
    (101, "Switching Protocols"),
    // Success
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Information"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    // Redirection
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (305, "Use Proxy"),
    (307, "Temporary Redirect"),
    // Client error
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Time-out"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Request Entity Too Large"),
    (414, "Request-URI Too Large"),
    (415, "Unsupported Media Type"),
    (416, "Requested range not satisfiable"),
    (417, "Expectation Failed"),
    // Server error
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Time-out"),
    (505, "HTTP Version not supported"),
];

/// HTTP status code
///
/// Only codes present in the status table can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a new status code
    pub fn new(code: u16) -> Result<Self> {
        if Status::is_valid(code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(code))
        }
    }

    /// Check if a code is in the status table
    pub fn is_valid(code: u16) -> bool {
        Status::reason(code).is_some()
    }

    /// Reason phrase of a code in the status table
    pub fn reason(code: u16) -> Option<&'static str> {
        REASONS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, phrase)| *phrase)
    }

    /// Reason phrase, optionally prefixed by the code (`"200 OK"`)
    pub fn phrase(code: u16, with_code: bool) -> Result<String> {
        let reason = Status::reason(code).ok_or(Error::InvalidStatus(code))?;
        Ok(if with_code {
            format!("{} {}", code, reason)
        } else {
            reason.to_string()
        })
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        Status::reason(self.code).unwrap_or("")
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Check if this is a success status (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Check if this is a redirection status (3xx)
    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Check if this is a client error status (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// Check if this is a server error status (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub const CONTINUE: Status = Status { code: 100 };
    pub const SWITCHING_PROTOCOLS: Status = Status { code: 101 };
    pub const OK: Status = Status { code: 200 };
    pub const CREATED: Status = Status { code: 201 };
    pub const ACCEPTED: Status = Status { code: 202 };
    pub const NON_AUTHORITATIVE_INFORMATION: Status = Status { code: 203 };
    pub const NO_CONTENT: Status = Status { code: 204 };
    pub const RESET_CONTENT: Status = Status { code: 205 };
    pub const PARTIAL_CONTENT: Status = Status { code: 206 };
    pub const MULTIPLE_CHOICES: Status = Status { code: 300 };
    pub const MOVED_PERMANENTLY: Status = Status { code: 301 };
    pub const FOUND: Status = Status { code: 302 };
    pub const SEE_OTHER: Status = Status { code: 303 };
    pub const NOT_MODIFIED: Status = Status { code: 304 };
    pub const USE_PROXY: Status = Status { code: 305 };
    pub const TEMPORARY_REDIRECT: Status = Status { code: 307 };
    pub const BAD_REQUEST: Status = Status { code: 400 };
    pub const UNAUTHORIZED: Status = Status { code: 401 };
    pub const PAYMENT_REQUIRED: Status = Status { code: 402 };
    pub const FORBIDDEN: Status = Status { code: 403 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const METHOD_NOT_ALLOWED: Status = Status { code: 405 };
    pub const NOT_ACCEPTABLE: Status = Status { code: 406 };
    pub const PROXY_AUTHENTICATION_REQUIRED: Status = Status { code: 407 };
    pub const REQUEST_TIME_OUT: Status = Status { code: 408 };
    pub const CONFLICT: Status = Status { code: 409 };
    pub const GONE: Status = Status { code: 410 };
    pub const LENGTH_REQUIRED: Status = Status { code: 411 };
    pub const PRECONDITION_FAILED: Status = Status { code: 412 };
    pub const REQUEST_ENTITY_TOO_LARGE: Status = Status { code: 413 };
    pub const REQUEST_URI_TOO_LARGE: Status = Status { code: 414 };
    pub const UNSUPPORTED_MEDIA_TYPE: Status = Status { code: 415 };
    pub const REQUESTED_RANGE_NOT_SATISFIABLE: Status = Status { code: 416 };
    pub const EXPECTATION_FAILED: Status = Status { code: 417 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };
    pub const NOT_IMPLEMENTED: Status = Status { code: 501 };
    pub const BAD_GATEWAY: Status = Status { code: 502 };
    pub const SERVICE_UNAVAILABLE: Status = Status { code: 503 };
    pub const GATEWAY_TIME_OUT: Status = Status { code: 504 };
    pub const HTTP_VERSION_NOT_SUPPORTED: Status = Status { code: 505 };
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// Version, headers and body shared by every message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parts {
    version: String,
    headers: HeaderCollection,
    body: Bytes,
}

impl Default for Parts {
    fn default() -> Self {
        Parts {
            version: DEFAULT_VERSION.to_string(),
            headers: HeaderCollection::new(),
            body: Bytes::new(),
        }
    }
}

/// Capabilities common to requests and responses
pub trait HttpMessage {
    fn parts(&self) -> &Parts;

    fn parts_mut(&mut self) -> &mut Parts;

    /// Start line, CRLF included
    fn start_line(&self) -> String;

    /// Get the HTTP version (`1.1`)
    fn version(&self) -> &str {
        &self.parts().version
    }

    fn set_version(&mut self, version: &str) {
        self.parts_mut().version = version.to_string();
    }

    /// Get the headers
    fn headers(&self) -> &HeaderCollection {
        &self.parts().headers
    }

    /// Get mutable headers
    fn headers_mut(&mut self) -> &mut HeaderCollection {
        &mut self.parts_mut().headers
    }

    fn set_headers(&mut self, headers: HeaderCollection) {
        self.parts_mut().headers = headers;
    }

    /// Get the body
    fn body(&self) -> &[u8] {
        &self.parts().body
    }

    /// Body as text, with invalid UTF-8 sequences replaced
    fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body())
    }

    /// Set the body
    fn set_body(&mut self, body: impl Into<Bytes>)
    where
        Self: Sized,
    {
        self.parts_mut().body = body.into();
    }

    /// Byte length of the body, optionally recorded as `Content-Length`
    fn body_length(&mut self, set_header: bool) -> usize {
        let length = self.parts().body.len();
        if set_header {
            self.headers_mut().set_known("Content-Length", length);
        }
        length
    }

    /// Convert the message to wire format
    ///
    /// The header block is only written when there are headers, and the
    /// blank line is only written when there is a body.
    fn to_wire(&self) -> BytesMut {
        let start = self.start_line();
        let headers = self.headers();
        let body = self.body();

        let mut wire = BytesMut::with_capacity(start.len() + body.len() + 64);
        wire.put_slice(start.as_bytes());

        if !headers.is_empty() {
            wire.put_slice(headers.build(true, DEFAULT_SEPARATOR).as_bytes());
            wire.put_slice(CRLF.as_bytes());
        }

        if !body.is_empty() {
            wire.put_slice(CRLF.as_bytes());
            wire.put_slice(body);
        }

        wire
    }

    /// Wire format as text, with a binary body rendered lossily
    fn to_wire_string(&self) -> String {
        String::from_utf8_lossy(&self.to_wire()).into_owned()
    }
}

/// HTTP request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    parts: Parts,
    method: Method,
    uri: Uri,
}

impl Request {
    /// Create a new `GET` request with an empty target
    pub fn new() -> Self {
        Request::default()
    }

    /// Create a request carrying `body`, with defaults elsewhere
    pub fn forge(body: impl Into<Bytes>) -> Self {
        let mut request = Request::new();
        request.parts.body = body.into();
        request
    }

    /// Create a builder for constructing requests
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Get the request method
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Set the method from its token, which must be in the method table
    pub fn set_method_str(&mut self, method: &str) -> Result<()> {
        self.method = method.parse()?;
        Ok(())
    }

    /// Get the request URI
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    /// Check that `text` is a valid request message
    pub fn validate(text: &str) -> bool {
        parser::kind(text) == MessageKind::Request
    }

    /// Parse a raw request message
    pub fn parse(text: &str) -> Result<Self> {
        match Message::parse(text)? {
            Message::Request(request) => Ok(request),
            Message::Response(_) => Err(Error::NotAnHttpMessage),
        }
    }
}

impl HttpMessage for Request {
    fn parts(&self) -> &Parts {
        &self.parts
    }

    fn parts_mut(&mut self) -> &mut Parts {
        &mut self.parts
    }

    fn start_line(&self) -> String {
        format!("{} {} HTTP/{}{}", self.method, self.uri, self.parts.version, CRLF)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

/// HTTP response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    parts: Parts,
    status: Status,
}

impl Response {
    /// Create a new `200 OK` response
    pub fn new() -> Self {
        Response::default()
    }

    /// Create a response carrying `body`, with defaults elsewhere
    pub fn forge(body: impl Into<Bytes>) -> Self {
        let mut response = Response::new();
        response.parts.body = body.into();
        response
    }

    /// Create a builder for constructing responses
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// Set the status code, which must be in the status table
    pub fn set_status(&mut self, code: u16) -> Result<()> {
        self.status = Status::new(code)?;
        Ok(())
    }

    /// Check that `text` is a valid response message
    pub fn validate(text: &str) -> bool {
        parser::kind(text) == MessageKind::Response
    }

    /// Parse a raw response message
    pub fn parse(text: &str) -> Result<Self> {
        match Message::parse(text)? {
            Message::Response(response) => Ok(response),
            Message::Request(_) => Err(Error::NotAnHttpMessage),
        }
    }
}

impl HttpMessage for Response {
    fn parts(&self) -> &Parts {
        &self.parts
    }

    fn parts_mut(&mut self) -> &mut Parts {
        &mut self.parts
    }

    fn start_line(&self) -> String {
        format!("HTTP/{} {}{}", self.parts.version, self.status, CRLF)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

/// A request or a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    /// Check that `text` is a valid HTTP message of either kind
    pub fn validate(text: &str) -> bool {
        parser::validate(text).is_some()
    }

    /// Classify raw text as a request, a response or neither
    pub fn kind_of(text: &str) -> MessageKind {
        parser::kind(text)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request(_) => MessageKind::Request,
            Message::Response(_) => MessageKind::Response,
        }
    }

    /// Parse a raw message into a request or a response
    pub fn parse(text: &str) -> Result<Self> {
        Message::parse_bytes(text.as_bytes())
    }

    /// Parse raw bytes; the start line and header block must be UTF-8 text
    ///
    /// A request target is kept as received, so any target the grammar
    /// accepts parses even when it is not a well-formed URI.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = parser::validate_bytes(bytes).ok_or(Error::NotAnHttpMessage)?;

        let parts = Parts {
            version: raw.version().to_string(),
            headers: HeaderCollection::parse(raw.headers, false, DEFAULT_SEPARATOR)?,
            body: Bytes::copy_from_slice(raw.body),
        };

        Ok(match raw.start {
            StartLine::Request { method, target, .. } => Message::Request(Request {
                parts,
                method,
                uri: Uri::opaque(target),
            }),
            StartLine::Response { status, .. } => Message::Response(Response {
                parts,
                status: Status::new(status)?,
            }),
        })
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Message::Response(response) => Some(response),
            Message::Request(_) => None,
        }
    }

    pub fn into_request(self) -> Option<Request> {
        match self {
            Message::Request(request) => Some(request),
            Message::Response(_) => None,
        }
    }
}

impl HttpMessage for Message {
    fn parts(&self) -> &Parts {
        match self {
            Message::Request(request) => request.parts(),
            Message::Response(response) => response.parts(),
        }
    }

    fn parts_mut(&mut self) -> &mut Parts {
        match self {
            Message::Request(request) => request.parts_mut(),
            Message::Response(response) => response.parts_mut(),
        }
    }

    fn start_line(&self) -> String {
        match self {
            Message::Request(request) => request.start_line(),
            Message::Response(response) => response.start_line(),
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

/// Options shared by both builders; header errors are reported by `build`
#[derive(Debug, Default)]
struct PartsBuilder {
    version: Option<String>,
    headers: HeaderCollection,
    body: Bytes,
    error: Option<Error>,
}

impl PartsBuilder {
    fn header(&mut self, label: &str, value: HeaderInput) {
        if self.error.is_none() {
            if let Err(e) = self.headers.append(label, value) {
                self.error = Some(e);
            }
        }
    }

    fn pairs<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderInput>,
    {
        if self.error.is_none() {
            match HeaderCollection::from_pairs(pairs) {
                Ok(headers) => self.headers = headers,
                Err(e) => self.error = Some(e),
            }
        }
    }

    fn build(self) -> Result<Parts> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Parts {
            version: self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            headers: self.headers,
            body: self.body,
        })
    }
}

/// Builder for HTTP requests
#[derive(Debug, Default)]
pub struct RequestBuilder {
    parts: PartsBuilder,
    method: Method,
    uri: Uri,
}

impl RequestBuilder {
    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the URI
    pub fn uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    /// Set the HTTP version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.parts.version = Some(version.into());
        self
    }

    /// Add a header
    pub fn header(mut self, label: &str, value: impl Into<HeaderInput>) -> Self {
        self.parts.header(label, value.into());
        self
    }

    /// Replace the headers with a ready collection
    pub fn headers(mut self, headers: HeaderCollection) -> Self {
        self.parts.headers = headers;
        self
    }

    /// Replace the headers with raw label/value pairs
    pub fn header_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderInput>,
    {
        self.parts.pairs(pairs);
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.parts.body = body.into();
        self
    }

    /// Build the request
    pub fn build(self) -> Result<Request> {
        Ok(Request {
            parts: self.parts.build()?,
            method: self.method,
            uri: self.uri,
        })
    }
}

/// Builder for HTTP responses
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    parts: PartsBuilder,
    status: Option<u16>,
}

impl ResponseBuilder {
    /// Set the status code
    pub fn status(mut self, code: u16) -> Self {
        self.status = Some(code);
        self
    }

    /// Set the HTTP version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.parts.version = Some(version.into());
        self
    }

    /// Add a header
    pub fn header(mut self, label: &str, value: impl Into<HeaderInput>) -> Self {
        self.parts.header(label, value.into());
        self
    }

    /// Replace the headers with a ready collection
    pub fn headers(mut self, headers: HeaderCollection) -> Self {
        self.parts.headers = headers;
        self
    }

    /// Replace the headers with raw label/value pairs
    pub fn header_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderInput>,
    {
        self.parts.pairs(pairs);
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.parts.body = body.into();
        self
    }

    /// Build the response
    pub fn build(self) -> Result<Response> {
        let status = match self.status {
            Some(code) => Status::new(code)?,
            None => Status::OK,
        };
        Ok(Response {
            parts: self.parts.build()?,
            status,
        })
    }
}
