//! User agent
//!
//! A `UserAgent` keeps named transports, nominates a default one and runs the
//! before-send and after-receive hooks around every request it sends.

use super::transport::Transport;
use super::{Error, HttpMessage, Request, Response, Result};
use indexmap::IndexMap;
use std::fmt;
use tracing::debug;

/// Called with the outgoing request and the name of the transport about to be used
pub type BeforeSendHook = Box<dyn FnMut(&mut Request, &mut String)>;

/// Called with the received response and the name of the transport that was used
pub type AfterReceiveHook = Box<dyn FnMut(&mut Response, &mut String)>;

/// Named transports plus the hooks run around a send
pub struct UserAgent {
    name: String,
    version: String,
    specs: String,
    transports: IndexMap<String, Box<dyn Transport>>,
    default_transport: Option<String>,
    before_send: Option<BeforeSendHook>,
    after_receive: Option<AfterReceiveHook>,
}

impl Default for UserAgent {
    fn default() -> Self {
        UserAgent {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            specs: String::new(),
            transports: IndexMap::new(),
            default_transport: None,
            before_send: None,
            after_receive: None,
        }
    }
}

impl UserAgent {
    pub fn new() -> Self {
        UserAgent::default()
    }

    /// Set the name and version announced in the `User-Agent` header
    pub fn identity(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.name = name.into();
        self.version = version.into();
        self
    }

    /// Free-form comment appended to the user agent string
    pub fn specs(mut self, specs: impl Into<String>) -> Self {
        self.specs = specs.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Register a transport under `name`.
    ///
    /// The first registered transport becomes the default. Registering an
    /// existing name replaces that transport.
    pub fn register<T>(&mut self, name: &str, transport: T) -> Result<()>
    where
        T: Transport + 'static,
    {
        if name.is_empty() {
            return Err(Error::InvalidArgument("transport name must not be empty".to_string()));
        }
        if !transport.is_available() {
            return Err(Error::InvalidArgument(format!("transport {} is not available", name)));
        }

        self.transports.insert(name.to_string(), Box::new(transport));
        if self.default_transport.is_none() {
            self.default_transport = Some(name.to_string());
        }

        debug!(transport = name, "transport registered");
        Ok(())
    }

    /// Nominate the transport used when `send` is not given a name
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.transports.contains_key(name) {
            return Err(Error::UnknownTransport(name.to_string()));
        }
        self.default_transport = Some(name.to_string());
        Ok(())
    }

    pub fn default_transport(&self) -> Option<&str> {
        self.default_transport.as_deref()
    }

    /// Look up a registered transport
    pub fn transport(&self, name: &str) -> Result<&dyn Transport> {
        self.transports
            .get(name)
            .map(|transport| &**transport)
            .ok_or_else(|| Error::UnknownTransport(name.to_string()))
    }

    /// Registered transport names, in registration order
    pub fn transport_names(&self) -> impl Iterator<Item = &str> {
        self.transports.keys().map(String::as_str)
    }

    /// Install the hook run before a request is sent
    pub fn on_before_send<F>(&mut self, hook: F)
    where
        F: FnMut(&mut Request, &mut String) + 'static,
    {
        self.before_send = Some(Box::new(hook));
    }

    /// Install the hook run after a response is received
    pub fn on_after_receive<F>(&mut self, hook: F)
    where
        F: FnMut(&mut Response, &mut String) + 'static,
    {
        self.after_receive = Some(Box::new(hook));
    }

    /// Send a request through the named transport, or the default one.
    ///
    /// The before-send hook may rewrite both the request and the transport
    /// name; the name is resolved after it ran.
    pub fn send(&mut self, mut request: Request, transport: Option<&str>) -> Result<Response> {
        let mut name = match transport {
            Some(name) => name.to_string(),
            None => self
                .default_transport
                .clone()
                .ok_or_else(|| Error::UnknownTransport("no transport registered".to_string()))?,
        };

        if let Some(hook) = self.before_send.as_mut() {
            hook(&mut request, &mut name);
        }

        let agent = self.to_string();
        request.headers_mut().set_known("User-Agent", agent);

        let transport = self
            .transports
            .get_mut(&name)
            .ok_or_else(|| Error::UnknownTransport(name.clone()))?;

        debug!(transport = %name, method = %request.method(), uri = %request.uri(), "dispatching request");
        let mut response = transport.send(&request)?;

        if let Some(hook) = self.after_receive.as_mut() {
            hook(&mut response, &mut name);
        }

        Ok(response)
    }
}

impl fmt::Display for UserAgent {
    /// `name/version specs`, without trailing whitespace
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let agent = format!("{}/{} {}", self.name, self.version, self.specs);
        f.write_str(agent.trim_end())
    }
}

impl fmt::Debug for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAgent")
            .field("agent", &self.to_string())
            .field("transports", &self.transports.keys().collect::<Vec<_>>())
            .field("default_transport", &self.default_transport)
            .field("before_send", &self.before_send.is_some())
            .field("after_receive", &self.after_receive.is_some())
            .finish()
    }
}
