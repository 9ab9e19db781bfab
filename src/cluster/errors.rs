//! Classification of node errors for the dispatch loop.
//!
//! Redis Cluster signals redirects through error replies:
//! `MOVED <slot> <host>:<port>` when a slot has permanently moved and
//! `ASK <slot> <host>:<port>` while a slot is migrating.

use crate::proto::error::Error;

/// What the dispatch loop should do with a node error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    /// Transport failure; try the next untried address.
    Net,
    /// Permanent redirect; retarget and flag a topology reload.
    Moved {
        /// Slot named by the redirect.
        slot: u16,
        /// Node now owning the slot.
        addr: String,
    },
    /// One-shot migration redirect; retarget with an ASKING prefix.
    Ask {
        /// Slot named by the redirect.
        slot: u16,
        /// Node importing the slot.
        addr: String,
    },
    /// Anything else is surfaced to the caller as-is.
    Other,
}

impl ErrorClass {
    /// Classifies a node error.
    pub(crate) fn of(err: &Error) -> Self {
        match err {
            Error::Io { .. } => ErrorClass::Net,
            Error::Server { message } => classify_server_text(message),
            _ => ErrorClass::Other,
        }
    }
}

/// Splits redirect text of the form `MOVED 3999 127.0.0.1:7002`.
///
/// Text that does not split into exactly three tokens, or whose slot is not
/// a number, is not a redirect.
fn classify_server_text(message: &str) -> ErrorClass {
    let parts: Vec<&str> = message.splitn(3, char::is_whitespace).collect();
    if parts.len() != 3 {
        return ErrorClass::Other;
    }
    let Ok(slot) = parts[1].parse::<u16>() else {
        return ErrorClass::Other;
    };
    let addr = parts[2].to_string();
    match parts[0] {
        "MOVED" => ErrorClass::Moved { slot, addr },
        "ASK" => ErrorClass::Ask { slot, addr },
        _ => ErrorClass::Other,
    }
}
