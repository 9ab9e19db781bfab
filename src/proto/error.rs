use std::io;

use thiserror::Error;

/// Result type alias for shardis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a Redis Cluster.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred while dialing or exchanging frames.
    ///
    /// The router treats every IO error as transient and retries the
    /// command on the next untried node before surfacing it.
    #[error("io error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The peer violated the RESP framing rules.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// The server returned an error reply.
    ///
    /// The message is the verbatim error text, including MOVED and ASK
    /// redirects that the router could not act on.
    #[error("server error: {message}")]
    Server {
        /// Error text from the server.
        message: String,
    },

    /// Authentication failed.
    #[error("authentication failed")]
    Auth,

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// No seed addresses were supplied and none were learned.
    #[error("redis cluster: missing addresses")]
    NoAddresses,

    /// A `CLUSTER SLOTS` reply did not match the expected shape.
    ///
    /// Fails the reload attempt against that node; the next known address
    /// is tried.
    #[error("redis cluster: invalid slot info: {message}")]
    InvalidTopology {
        /// Description of the malformed entry.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_io() {
        let err = Error::from(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(err.to_string().contains("io error"));
    }

    #[test]
    fn display_server_keeps_text_verbatim() {
        let err = Error::Server {
            message: "MOVED 3999 127.0.0.1:7002".to_string(),
        };
        assert_eq!(err.to_string(), "server error: MOVED 3999 127.0.0.1:7002");
    }

    #[test]
    fn display_no_addresses() {
        assert_eq!(
            Error::NoAddresses.to_string(),
            "redis cluster: missing addresses"
        );
    }

    #[test]
    fn display_invalid_topology() {
        let err = Error::InvalidTopology {
            message: "slot range is not an array".to_string(),
        };
        assert!(err.to_string().starts_with("redis cluster: invalid slot info"));
    }
}
