//! Request transports
//!
//! A transport performs the network I/O for one request: it writes the
//! request, blocks until the complete response has arrived and parses it.
//! Three backends are provided:
//!
//! - [`SocketTransport`]: a plain blocking `TcpStream`
//! - [`StreamTransport`]: a socket2 stream socket with tunable socket options
//! - [`NativeTransport`]: a reusable client handle with TLS and content decoding
//!
//! Every backend opens a fresh connection per send and releases it on every
//! exit path.

pub mod native;
pub mod socket;
pub mod stream;

pub use native::{NativeHandle, NativeOptions, NativeTransport};
pub use socket::{SocketOptions, SocketTransport};
pub use stream::{StreamOptions, StreamTransport};

use super::{Error, Message, Request, Response, Result};
use std::time::Duration;
use tracing::debug;

/// Lifecycle of a transport: `Idle -> Sending -> (Idle | Failed)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Idle,
    Sending,
    Failed,
}

/// The "send a request, block for the response" contract
pub trait Transport {
    /// Backend specific exchange.
    ///
    /// Implementations return the parsed message read back from the peer;
    /// [`Transport::send`] checks that it is a response.
    fn send_request(&mut self, request: &Request) -> Result<Message>;

    fn state(&self) -> TransportState;

    fn set_state(&mut self, state: TransportState);

    /// Whether the backend can be used on this system
    fn is_available(&self) -> bool {
        true
    }

    /// Send a request and wait for its response
    fn send(&mut self, request: &Request) -> Result<Response> {
        self.set_state(TransportState::Sending);

        let result = self.send_request(request).and_then(|message| match message {
            Message::Response(response) => Ok(response),
            Message::Request(_) => Err(Error::ContractViolation(
                "transport returned a request where a response was expected".to_string(),
            )),
        });

        match &result {
            Ok(response) => {
                debug!(status = response.status().code(), "response received");
                self.set_state(TransportState::Idle);
            }
            Err(e) => {
                debug!(error = %e, "send failed");
                self.set_state(TransportState::Failed);
            }
        }

        result
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_request(&mut self, request: &Request) -> Result<Message> {
        (**self).send_request(request)
    }

    fn state(&self) -> TransportState {
        (**self).state()
    }

    fn set_state(&mut self, state: TransportState) {
        (**self).set_state(state)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn send(&mut self, request: &Request) -> Result<Response> {
        (**self).send(request)
    }
}

fn invalid_option(key: &str, value: &str) -> Error {
    Error::InvalidArgument(format!("invalid value {:?} for option {}", value, key))
}

/// Whole seconds, as written in a plain options mapping
pub(crate) fn option_seconds(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| invalid_option(key, value))
}

pub(crate) fn option_usize(key: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| invalid_option(key, value))
}

/// `1`/`0`, `true`/`false`, `on`/`off`, `yes`/`no`
pub(crate) fn option_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" | "" => Ok(false),
        _ => Err(invalid_option(key, value)),
    }
}

pub(crate) fn unknown_option(key: &str) -> Error {
    Error::InvalidArgument(format!("unknown transport option: {}", key))
}
