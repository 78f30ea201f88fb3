//! Minimal URL handling for the schemes the client speaks.

use crate::network::error::Error;
use core::fmt;

/// URL scheme. `ws`/`wss` ride on an HTTP(S) connection for the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `http://`
    Http,
    /// `https://`
    Https,
    /// `ws://`
    Ws,
    /// `wss://`
    Wss,
}

impl Scheme {
    fn parse(s: &str) -> Option<Self> {
        [Scheme::Http, Scheme::Https, Scheme::Ws, Scheme::Wss]
            .into_iter()
            .find(|scheme| scheme.as_str().eq_ignore_ascii_case(s))
    }

    /// Lowercase scheme name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }

    /// Whether connections for this scheme use TLS.
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Https | Scheme::Wss)
    }

    /// 443 for secure schemes, 80 otherwise.
    pub fn default_port(&self) -> u16 {
        if self.is_secure() { 443 } else { 80 }
    }
}

/// A parsed `scheme://host[:port][/path]` URL.
///
/// The path keeps any query string verbatim and defaults to `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    /// Scheme, matched case-insensitively.
    pub scheme: Scheme,
    /// Host name or address, without the port.
    pub host: String,
    /// Explicit port, or the scheme default.
    pub port: u16,
    /// Path and query, always starting with `/`.
    pub path: String,
}

impl Url {
    /// Parses `input` after trimming surrounding whitespace.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();
        let (scheme, rest) = input.split_once("://").ok_or(Error::UnsupportedScheme)?;
        let scheme = Scheme::parse(scheme).ok_or(Error::UnsupportedScheme)?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| Error::ProtocolError)?),
            None => (authority, scheme.default_port()),
        };
        if host.is_empty() {
            return Err(Error::ProtocolError);
        }

        Ok(Self {
            scheme,
            host: host.to_owned(),
            port,
            path: path.to_owned(),
        })
    }

    /// `scheme://host` plus `:port` when it differs from the default.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.authority())
    }

    /// `host` plus `:port` when it differs from the default.
    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Resolves a redirect target against this URL.
    ///
    /// A target with one of `absolute_schemes` is used as is; anything else
    /// is taken as a path on this URL's origin, gaining a leading `/` if it
    /// lacks one.
    pub fn resolve(&self, target: &str, absolute_schemes: &[Scheme]) -> String {
        let target = target.trim();
        let is_absolute = target.split_once("://").is_some_and(|(scheme, _)| {
            Scheme::parse(scheme).is_some_and(|s| absolute_schemes.contains(&s))
        });
        if is_absolute {
            target.to_owned()
        } else if target.starts_with('/') {
            format!("{}{target}", self.origin())
        } else {
            format!("{}/{target}", self.origin())
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin(), self.path)
    }
}
