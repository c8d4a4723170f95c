//! Connection String Parsing
//!
//! Parses `[identity@][host][:port]` into a [`ConnectionTarget`].

use std::fmt;
use std::net::IpAddr;

use log::debug;

use crate::error::BootstrapResult;

/// Port used when the connection string omits one
pub const DEFAULT_NODE_PORT: u16 = 2448;

/// Host part of a connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    /// No host given; means "the local default"
    Unspecified,
    /// `localhost` or a loopback IP literal, kept as written
    Loopback(String),
    /// Any other host name or address
    Named(String),
}

impl Host {
    pub fn classify(raw: &str) -> Self {
        if raw.is_empty() {
            return Host::Unspecified;
        }
        let is_loopback = raw.eq_ignore_ascii_case("localhost")
            || raw
                .parse::<IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false);
        if is_loopback {
            Host::Loopback(raw.to_string())
        } else {
            Host::Named(raw.to_string())
        }
    }

    /// True when the host refers to this machine
    pub fn is_local(&self) -> bool {
        matches!(self, Host::Unspecified | Host::Loopback(_))
    }

    /// Host as written; empty for [`Host::Unspecified`]
    pub fn as_str(&self) -> &str {
        match self {
            Host::Unspecified => "",
            Host::Loopback(h) | Host::Named(h) => h,
        }
    }

    /// Host usable in a dialable address
    pub fn dial_name(&self) -> &str {
        match self {
            Host::Unspecified => "localhost",
            Host::Loopback(h) | Host::Named(h) => h,
        }
    }
}

/// Parsed connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub identity: String,
    pub host: Host,
    pub port: u16,
}

impl ConnectionTarget {
    /// Parse `[identity@][host][:port]`.
    ///
    /// Identity is split at the first `@` and port at the last `:`. A
    /// bracketed IPv6 host loses its brackets; an unbracketed host with
    /// several colons is taken whole. An unusable port falls back to
    /// [`DEFAULT_NODE_PORT`], so every input yields a target.
    pub fn parse(input: &str) -> BootstrapResult<Self> {
        let (identity, rest) = match input.split_once('@') {
            Some((identity, rest)) => (identity, rest),
            None => ("", input),
        };

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            match bracketed.split_once(']') {
                Some((host, tail)) => (host, tail.strip_prefix(':')),
                None => (rest, None),
            }
        } else {
            match rest.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => (rest, None),
                Some((host, port)) => (host, Some(port)),
                None => (rest, None),
            }
        };

        let port = match port {
            None | Some("") => DEFAULT_NODE_PORT,
            Some(raw) => parse_port(raw),
        };

        let target = Self {
            identity: identity.to_string(),
            host: Host::classify(host),
            port,
        };
        debug!("Parsed connection string '{}' as {:?}", input, target);
        Ok(target)
    }

    pub fn has_identity(&self) -> bool {
        !self.identity.is_empty()
    }

    /// Address of the remote node in `identity@host:port` form
    pub fn remote_address(&self) -> RemoteAddress {
        RemoteAddress {
            identity: self.identity.clone(),
            host: self.host.dial_name().to_string(),
            port: self.port,
        }
    }
}

fn parse_port(raw: &str) -> u16 {
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => {
            debug!("Ignoring unusable port '{}', using {}", raw, DEFAULT_NODE_PORT);
            DEFAULT_NODE_PORT
        }
        Ok(port) => port,
    }
}

/// Fully specified remote node address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddress {
    pub identity: String,
    pub host: String,
    pub port: u16,
}

impl RemoteAddress {
    /// `host:port` suitable for a TCP dial
    pub fn socket_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identity, self.socket_address())
    }
}
