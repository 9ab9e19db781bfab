use bytes::Bytes;

/// A RESP (Redis Serialization Protocol) frame.
///
/// Covers the RESP2 value types:
/// - SimpleString: status replies like "OK"
/// - Error: error replies from the server
/// - Integer: numeric replies
/// - BulkString: binary-safe string data
/// - Array: command argument vectors and nested replies
/// - Null: the "no value" reply
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (+OK).
    SimpleString(Vec<u8>),
    /// Error (-ERR).
    Error(Vec<u8>),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar).
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...).
    Array(Vec<Frame>),
    /// Null ($-1 or *-1).
    Null,
}

impl Frame {
    /// Returns true for the server's "no value" reply.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null | Frame::BulkString(None))
    }

    /// Borrows the elements of an Array frame.
    pub fn as_array(&self) -> Option<&[Frame]> {
        match self {
            Frame::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Extracts an Integer frame.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Frame::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrows the payload of a non-null BulkString frame.
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            Frame::BulkString(Some(data)) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_detection() {
        assert!(Frame::Null.is_null());
        assert!(Frame::BulkString(None).is_null());
        assert!(!Frame::BulkString(Some(Bytes::from("x"))).is_null());
        assert!(!Frame::Integer(0).is_null());
    }

    #[test]
    fn accessors() {
        let frame = Frame::Array(vec![Frame::Integer(7)]);
        assert_eq!(frame.as_array().unwrap().len(), 1);
        assert_eq!(frame.as_array().unwrap()[0].as_int(), Some(7));
        assert!(frame.as_int().is_none());

        let bulk = Frame::BulkString(Some(Bytes::from("hello")));
        assert_eq!(bulk.as_bulk().unwrap().as_ref(), b"hello");
        assert!(Frame::Null.as_bulk().is_none());
    }
}
