//! Cluster client configuration.

use std::time::Duration;

use crate::core::node::NodeOptions;
use crate::proto::error::{Error, Result};

const DEFAULT_MAX_CONNS: usize = 10;

/// Configuration for [`ClusterClient`](crate::cluster::ClusterClient).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use shardis::ClusterOptions;
///
/// let opts = ClusterOptions::new(["127.0.0.1:7000", "127.0.0.1:7001"])
///     .password("secret")
///     .max_conns(16)
///     .dial_timeout(Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClusterOptions {
    addrs: Vec<String>,
    password: Option<String>,
    max_conns: usize,
    pool_size: usize,
    dial_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl ClusterOptions {
    /// Creates options with a seed list of `host:port` addresses.
    ///
    /// `redis://` URLs are accepted and reduced to their `host:port` form.
    pub fn new<I, T>(addrs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            addrs: addrs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the password sent as AUTH to every node.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Caps the number of cached node connections. Values below 1 fall back
    /// to the default of 10.
    pub fn max_conns(mut self, max_conns: usize) -> Self {
        self.max_conns = max_conns;
        self
    }

    /// Bounds the in-flight request queue of each node connection.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Limit for establishing a TCP connection.
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = Some(timeout);
        self
    }

    /// Limit for each socket read.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Limit for each socket write.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Idle period after which a node connection shuts itself down.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Effective connection cache capacity.
    pub(crate) fn conn_limit(&self) -> usize {
        if self.max_conns < 1 {
            DEFAULT_MAX_CONNS
        } else {
            self.max_conns
        }
    }

    /// Projects the per-node options handed to the connector.
    pub(crate) fn node_options(&self) -> NodeOptions {
        NodeOptions {
            password: self.password.clone(),
            pool_size: self.pool_size,
            dial_timeout: self.dial_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            idle_timeout: self.idle_timeout,
        }
    }

    /// Normalized, deduplicated seed addresses.
    pub(crate) fn seed_addrs(&self) -> Result<Vec<String>> {
        let mut seeds = Vec::with_capacity(self.addrs.len());
        for raw in &self.addrs {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let addr = normalize_addr(raw)?;
            if !seeds.contains(&addr) {
                seeds.push(addr);
            }
        }
        Ok(seeds)
    }
}

/// Reduces a seed entry to `host:port`, going through the URL parser when a
/// scheme is present.
fn normalize_addr(raw: &str) -> Result<String> {
    if !raw.contains("://") {
        return Ok(raw.to_string());
    }
    let parsed = url::Url::parse(raw).map_err(|_| Error::InvalidArgument {
        message: format!("invalid address: {raw}"),
    })?;
    if parsed.scheme() != "redis" && parsed.scheme() != "rediss" {
        return Err(Error::InvalidArgument {
            message: format!("unsupported scheme: {}", parsed.scheme()),
        });
    }
    let host = parsed.host_str().ok_or_else(|| Error::InvalidArgument {
        message: format!("missing host: {raw}"),
    })?;
    let port = parsed.port().unwrap_or(6379);
    Ok(format!("{host}:{port}"))
}
