use bytes::Bytes;

use crate::proto::frame::Frame;

/// A command ready to be sent to Redis.
///
/// Built as an argument vector and serialized as a RESP array. Commands are
/// cloneable so the router can re-dispatch one after a redirect.
///
/// # Example
///
/// ```
/// use shardis::core::command::Cmd;
///
/// let cmd = Cmd::new("SET").arg("key").arg("value");
/// assert_eq!(cmd.name(), Some("SET"));
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a new command with the given name.
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument.
    #[inline]
    pub fn arg<T: Into<Bytes>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Returns the argument vector, command name first.
    #[inline]
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Returns the command name when it is valid UTF-8.
    pub fn name(&self) -> Option<&str> {
        self.args.first().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Converts the command into a RESP array frame.
    #[inline]
    pub fn into_frame(self) -> Frame {
        Frame::Array(
            self.args
                .into_iter()
                .map(|arg| Frame::BulkString(Some(arg)))
                .collect(),
        )
    }
}

/// Creates a GET command.
#[inline]
pub fn get(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("GET").arg(key)
}

/// Creates a SET command.
#[inline]
pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("SET").arg(key).arg(value)
}

/// Creates a DEL command.
#[inline]
pub fn del(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("DEL").arg(key)
}

/// Creates an EXISTS command.
#[inline]
pub fn exists(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("EXISTS").arg(key)
}

/// Creates an INCR command.
#[inline]
pub fn incr(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("INCR").arg(key)
}

/// Creates an AUTH command.
#[inline]
pub fn auth(password: impl Into<Bytes>) -> Cmd {
    Cmd::new("AUTH").arg(password)
}

/// Creates the ASKING sentinel sent ahead of a command that follows an ASK
/// redirect.
#[inline]
pub fn asking() -> Cmd {
    Cmd::new("ASKING")
}

/// Creates a CLUSTER SLOTS command, the topology discovery query.
#[inline]
pub fn cluster_slots() -> Cmd {
    Cmd::new("CLUSTER").arg("SLOTS")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_frame_shape() {
        let frame = get("foo").into_frame();
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::BulkString(Some(Bytes::from("GET"))),
                Frame::BulkString(Some(Bytes::from("foo"))),
            ])
        );
    }

    #[test]
    fn cluster_slots_args() {
        let cmd = cluster_slots();
        assert_eq!(cmd.args().len(), 2);
        assert_eq!(cmd.name(), Some("CLUSTER"));
    }

    #[test]
    fn asking_is_a_bare_command() {
        let cmd = asking();
        assert_eq!(cmd.args().len(), 1);
        assert_eq!(cmd.name(), Some("ASKING"));
    }

    #[test]
    fn clone_preserves_args() {
        let cmd = set("k".to_string(), "v".to_string());
        let copy = cmd.clone();
        assert_eq!(cmd.args(), copy.args());
    }
}
