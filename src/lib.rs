//! # Shardis
//!
//! Redis Cluster client for Rust. Commands are routed to the owning shard by
//! CRC-16 hash slot, MOVED and ASK redirects are followed transparently, and
//! per-node connections are reused through a bounded LRU cache.
//!
//! ## Example
//!
//! ```no_run
//! use shardis::{ClusterClient, ClusterOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let opts = ClusterOptions::new(["127.0.0.1:7000", "127.0.0.1:7001"]);
//!     let client = ClusterClient::connect(opts).await?;
//!     client.set("user:{1000}:name", "kim").await?;
//!     let name = client.get("user:{1000}:name").await?;
//!     println!("{:?}", name);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod cluster;
pub mod core;
pub mod proto;

pub use crate::cluster::options::ClusterOptions;
pub use crate::cluster::slot::key_slot;
pub use crate::cluster::ClusterClient;
pub use crate::core::command::Cmd;
pub use crate::proto::error::{Error, Result};
pub use crate::proto::frame::Frame;
