//! Target identifiers and host/port derivation.

/// Port assumed when the target string carries none, or an unparsable one.
const DEFAULT_PORT: u16 = 80;

/// A monitored endpoint, identified by its raw `host[:port]` string.
///
/// Identity is the raw string: `"example.org"` and `"example.org:80"` are two
/// distinct targets even though they probe the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    hostname: String,
    host: String,
    port: u16,
}

impl Target {
    /// Parse a raw target string.
    ///
    /// The segment before the first `:` is the host; the segment after the
    /// last `:` is the port, falling back to 80 when absent or unparsable.
    pub fn parse(hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let host = hostname.split(':').next().unwrap_or_default().to_string();
        let port = match hostname.rsplit_once(':') {
            Some((_, p)) => p.parse().unwrap_or(DEFAULT_PORT),
            None => DEFAULT_PORT,
        };
        Self {
            hostname,
            host,
            port,
        }
    }

    /// The raw identifier, as given by the user.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Host part used for the socket connect.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part used for the socket connect.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the raw identifier is empty (rejected at the controller
    /// boundary, never probed).
    pub fn is_empty(&self) -> bool {
        self.hostname.is_empty()
    }

    /// `host:port` form handed to the connector.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hostname)
    }
}
