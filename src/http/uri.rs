//! Request target URIs
//!
//! A thin wrapper over [`::http::Uri`]. Messages carry the target opaquely and
//! render it verbatim, transports read its host, port and path. Both absolute
//! URIs (`http://host:port/path?query`) and origin-form targets (`/path`) are
//! accepted.

use super::{Error, Result, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
use ::http::uri::{self, Authority};
use std::fmt;
use std::str::FromStr;

/// Request target
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Uri {
    raw: String,
    parsed: Option<uri::Uri>,
}

impl Uri {
    /// Parse a URI or origin-form target
    ///
    /// The empty string gives the empty target. An absolute URI must name a
    /// host, and an explicit port must fit in 16 bits.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Uri::default());
        }

        let parsed = uri::Uri::try_from(raw)
            .map_err(|e| Error::InvalidArgument(format!("invalid URI {:?}: {}", raw, e)))?;

        match (parsed.scheme_str(), parsed.host(), parsed.authority()) {
            (Some(_), None | Some(""), _) => {
                return Err(Error::InvalidArgument(format!("URI {:?} has no host", raw)))
            }
            (_, _, Some(authority)) if !port_is_valid(authority) => {
                return Err(Error::InvalidArgument(format!("invalid port in {:?}", raw)))
            }
            _ => {}
        }

        Ok(Uri {
            raw: raw.to_string(),
            parsed: Some(parsed),
        })
    }

    /// Keep `raw` as an opaque target
    ///
    /// Components are available when `raw` also parses as a URI; otherwise
    /// the target only renders verbatim.
    pub fn opaque(raw: &str) -> Self {
        Uri::parse(raw).unwrap_or_else(|_| Uri {
            raw: raw.to_string(),
            parsed: None,
        })
    }

    /// Parsed form, absent for the empty target and unparsable opaque ones
    pub fn as_http(&self) -> Option<&uri::Uri> {
        self.parsed.as_ref()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.parsed.as_ref()?.scheme_str()
    }

    /// Host, without the brackets of an IPv6 literal
    pub fn host(&self) -> Option<&str> {
        let host = self.parsed.as_ref()?.host()?;
        Some(
            host.strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host),
        )
    }

    /// Explicit port, or the scheme's default port
    pub fn port(&self) -> Option<u16> {
        self.parsed
            .as_ref()?
            .port_u16()
            .or_else(|| self.default_port())
    }

    /// Path, `/` when an absolute URI has none
    pub fn path(&self) -> &str {
        self.parsed.as_ref().map(uri::Uri::path).unwrap_or("")
    }

    pub fn query(&self) -> Option<&str> {
        self.parsed.as_ref()?.query()
    }

    /// Origin-form target (`/path?query`) for the request line
    pub fn path_and_query(&self) -> String {
        match self.query() {
            Some(query) => format!("{}?{}", self.path(), query),
            None => self.path().to_string(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.scheme().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// `Host` header value: the host, with the port when it is not the default
    pub fn authority(&self) -> Option<String> {
        let parsed = self.parsed.as_ref()?;
        let host = parsed.host()?;
        Some(match parsed.port_u16() {
            Some(port) if Some(port) != self.default_port() => format!("{}:{}", host, port),
            _ => host.to_string(),
        })
    }

    fn default_port(&self) -> Option<u16> {
        match self.scheme() {
            Some("http") => Some(DEFAULT_HTTP_PORT),
            Some("https") => Some(DEFAULT_HTTPS_PORT),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// A port given after the host must parse as `u16`
fn port_is_valid(authority: &Authority) -> bool {
    let host_port = authority.as_str().rsplit('@').next().unwrap_or_default();
    let after_host = host_port.rsplit(']').next().unwrap_or_default();
    !after_host.contains(':') || authority.port_u16().is_some()
}

impl From<uri::Uri> for Uri {
    fn from(parsed: uri::Uri) -> Self {
        Uri {
            raw: parsed.to_string(),
            parsed: Some(parsed),
        }
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
