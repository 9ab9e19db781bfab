//! CLUSTER SLOTS reply parsing.

use crate::cluster::slot::SLOT_COUNT;
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// One decoded CLUSTER SLOTS entry: a slot interval and the nodes serving it.
///
/// `addrs[0]` is the master, the remainder are replicas. Immutable once
/// parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    /// First slot of the range, inclusive.
    pub start: u16,
    /// Last slot of the range, inclusive.
    pub end: u16,
    /// Node addresses as `host:port`, master first.
    pub addrs: Vec<String>,
}

/// Parses a CLUSTER SLOTS reply into slot range records.
///
/// The reply must be an array of `[start, end, [host, port], ...]` entries.
/// Any deviation fails the whole parse with [`Error::InvalidTopology`], which
/// in turn fails the reload attempt against that node.
pub fn parse_cluster_slots(reply: Frame) -> Result<Vec<SlotRange>> {
    let entries = match reply {
        Frame::Array(entries) => entries,
        _ => return Err(invalid("reply is not an array")),
    };

    let mut ranges = Vec::with_capacity(entries.len());
    for entry in entries {
        let items = entry
            .as_array()
            .ok_or_else(|| invalid("slot range is not an array"))?;
        if items.len() < 3 {
            return Err(invalid("slot range has fewer than 3 elements"));
        }

        let start = slot_bound(&items[0])?;
        let end = slot_bound(&items[1])?;

        let mut addrs = Vec::with_capacity(items.len() - 2);
        for item in &items[2..] {
            addrs.push(node_addr(item)?);
        }

        ranges.push(SlotRange { start, end, addrs });
    }
    Ok(ranges)
}

fn slot_bound(frame: &Frame) -> Result<u16> {
    match frame.as_int() {
        Some(n) if (0..=i64::from(SLOT_COUNT)).contains(&n) => Ok(n as u16),
        Some(n) => Err(invalid(&format!("slot bound {n} out of range"))),
        None => Err(invalid("slot bound is not an integer")),
    }
}

/// Decodes a `[host, port]` pair into its canonical `host:port` form.
fn node_addr(frame: &Frame) -> Result<String> {
    let pair = frame
        .as_array()
        .ok_or_else(|| invalid("node entry is not an array"))?;
    if pair.len() != 2 {
        return Err(invalid("node entry is not a host/port pair"));
    }

    let host = pair[0]
        .as_bulk()
        .and_then(|data| std::str::from_utf8(data).ok())
        .ok_or_else(|| invalid("node host is not a string"))?;
    if host.is_empty() {
        return Err(invalid("node host is empty"));
    }

    let port = match pair[1].as_int() {
        Some(port) if port >= 1 => port,
        _ => return Err(invalid("node port is not a positive integer")),
    };

    Ok(join_host_port(host, port))
}

/// Joins host and port, bracketing IPv6 hosts.
fn join_host_port(host: &str, port: i64) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidTopology {
        message: message.to_string(),
    }
}
