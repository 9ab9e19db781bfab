//! Single-node client support.
//!
//! ## Modules
//!
//! - [`command`] - Command builders
//! - [`connection`] - Framed stream handling
//! - [`node`] - The per-node client and the connector seam used by the router

pub mod command;
pub mod connection;
pub mod node;
