use bytes::{BufMut, BytesMut};

use crate::proto::frame::Frame;

/// A RESP encoder that serializes [`Frame`] values into a reusable buffer.
///
/// Multiple frames may be encoded back to back before [`take`](Encoder::take)
/// is called, which is how pipelined commands end up in a single write.
///
/// # Example
///
/// ```
/// use shardis::proto::codec::Encoder;
/// use shardis::proto::frame::Frame;
///
/// let mut encoder = Encoder::new();
/// encoder.encode(&Frame::SimpleString(b"OK".to_vec()));
/// assert_eq!(encoder.take().as_ref(), b"+OK\r\n");
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates an encoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the RESP serialization of `frame` to the internal buffer.
    pub fn encode(&mut self, frame: &Frame) {
        match frame {
            Frame::SimpleString(s) => self.line(b'+', s),
            Frame::Error(e) => self.line(b'-', e),
            Frame::Integer(n) => self.line(b':', n.to_string().as_bytes()),
            Frame::BulkString(None) => self.buf.put_slice(b"$-1\r\n"),
            Frame::BulkString(Some(data)) => {
                self.line(b'$', data.len().to_string().as_bytes());
                self.buf.put_slice(data);
                self.buf.put_slice(b"\r\n");
            }
            Frame::Array(items) => {
                self.line(b'*', items.len().to_string().as_bytes());
                for item in items {
                    self.encode(item);
                }
            }
            Frame::Null => self.buf.put_slice(b"$-1\r\n"),
        }
    }

    /// Takes the accumulated bytes, leaving the encoder empty and reusable.
    pub fn take(&mut self) -> BytesMut {
        self.buf.split()
    }

    fn line(&mut self, tag: u8, payload: &[u8]) {
        self.buf.put_u8(tag);
        self.buf.put_slice(payload);
        self.buf.put_slice(b"\r\n");
    }
}
