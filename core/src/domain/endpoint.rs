//! Endpoint domain model.

use std::net::IpAddr;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

/// Host used when an endpoint string carries only a port.
pub const DEFAULT_HOST: &str = "localhost";

/// A TCP listening address: host name or IP literal plus a non-zero port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint, rejecting an empty host or port 0.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host: String = host.into();
        let host = host.trim();
        // Accept "[::1]" as well as "::1".
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(Error::InvalidEndpoint("host must not be empty".to_string()));
        }
        if port == 0 {
            return Err(Error::InvalidEndpoint(format!(
                "port must be in 1..=65535 for host {}",
                host
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Endpoint on [`DEFAULT_HOST`].
    pub fn local(port: u16) -> Result<Self> {
        Self::new(DEFAULT_HOST, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The host parsed as an IP literal, if it is one.
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// Whether the endpoint refers to this machine.
    ///
    /// Only these endpoints can be answered from the local socket table.
    pub fn is_local(&self) -> bool {
        if self.host.eq_ignore_ascii_case(DEFAULT_HOST) {
            return true;
        }
        match self.ip() {
            Some(ip) => ip.is_loopback() || ip.is_unspecified(),
            None => false,
        }
    }

    /// `HOST:PORT` form suitable for bind-address environment variables.
    ///
    /// IPv6 literals are bracketed.
    pub fn to_bind_string(&self) -> String {
        match self.ip() {
            Some(IpAddr::V6(_)) => format!("[{}]:{}", self.host, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_bind_string())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Parse `HOST:PORT`, `[V6]:PORT` or a bare `PORT` (host defaults to `localhost`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidEndpoint(format!("cannot parse endpoint '{}'", s));

        if let Ok(port) = s.parse::<u16>() {
            return Self::local(port);
        }

        let (host, port_str) = if s.starts_with('[') {
            let bracket_end = s.find(']').ok_or_else(invalid)?;
            let rest = &s[bracket_end + 1..];
            let port_str = rest.strip_prefix(':').ok_or_else(invalid)?;
            (&s[1..bracket_end], port_str)
        } else {
            let last_colon = s.rfind(':').ok_or_else(invalid)?;
            let host = &s[..last_colon];
            // An unbracketed IPv6 literal is ambiguous.
            if host.contains(':') {
                return Err(invalid());
            }
            (host, &s[last_colon + 1..])
        };

        let port: u16 = port_str.parse().map_err(|_| invalid())?;
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        Self::new(host, port)
    }
}
