use bytes::{Buf, Bytes, BytesMut};

use crate::proto::frame::Frame;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// A streaming RESP decoder.
///
/// Feed raw bytes with [`append`](Decoder::append) as they arrive, then call
/// [`decode`](Decoder::decode). Incomplete input yields `Ok(None)` and leaves
/// the buffer untouched, so a frame split across reads decodes once the rest
/// arrives.
///
/// # Example
///
/// ```
/// use shardis::proto::codec::Decoder;
/// use shardis::proto::frame::Frame;
///
/// let mut decoder = Decoder::new();
/// decoder.append(b"+OK\r\n");
/// assert_eq!(decoder.decode().unwrap(), Some(Frame::SimpleString(b"OK".to_vec())));
/// ```
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
}

impl Decoder {
    /// Creates a decoder with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a decoder with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Appends raw bytes received from the network.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Attempts to decode one complete frame from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed and `Err` on malformed
    /// input. Decoded bytes are consumed; partial frames are not.
    pub fn decode(&mut self) -> Result<Option<Frame>, String> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        match parse_frame(&self.buf, self.max_frame_size)? {
            Some((frame, used)) => {
                self.buf.advance(used);
                Ok(Some(frame))
            }
            None => {
                if self.buf.len() > self.max_frame_size {
                    return Err("buffer exceeded maximum frame size".to_string());
                }
                Ok(None)
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses one frame starting at `buf[0]` without consuming input.
///
/// Returns the frame and the number of bytes it occupies, or `None` when the
/// input is incomplete.
fn parse_frame(buf: &[u8], max_len: usize) -> Result<Option<(Frame, usize)>, String> {
    let Some(&tag) = buf.first() else {
        return Ok(None);
    };
    let Some((line, header)) = split_line(buf) else {
        return Ok(None);
    };
    match tag {
        b'+' => Ok(Some((Frame::SimpleString(line.to_vec()), header))),
        b'-' => Ok(Some((Frame::Error(line.to_vec()), header))),
        b':' => Ok(Some((Frame::Integer(parse_int(line)?), header))),
        b'$' => {
            let declared = parse_int(line)?;
            if declared == -1 {
                return Ok(Some((Frame::BulkString(None), header)));
            }
            let len = usize::try_from(declared)
                .map_err(|_| format!("invalid bulk string length: {declared}"))?;
            if len > max_len {
                return Err("bulk string length exceeds maximum frame size".to_string());
            }
            if buf.len() < header + len + 2 {
                return Ok(None);
            }
            let data = Bytes::copy_from_slice(&buf[header..header + len]);
            Ok(Some((Frame::BulkString(Some(data)), header + len + 2)))
        }
        b'*' => {
            let declared = parse_int(line)?;
            if declared == -1 {
                return Ok(Some((Frame::Null, header)));
            }
            let len = usize::try_from(declared)
                .map_err(|_| format!("invalid array length: {declared}"))?;
            let mut items = Vec::with_capacity(len.min(64));
            let mut used = header;
            for _ in 0..len {
                match parse_frame(&buf[used..], max_len)? {
                    Some((item, item_len)) => {
                        items.push(item);
                        used += item_len;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Frame::Array(items), used)))
        }
        other => Err(format!("unknown frame type: {}", other as char)),
    }
}

/// Splits the payload between the tag byte and the first CRLF.
///
/// Returns the payload and the total length including tag and CRLF.
fn split_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let end = buf.windows(2).position(|pair| pair == b"\r\n")?;
    Some((&buf[1..end], end + 2))
}

fn parse_int(line: &[u8]) -> Result<i64, String> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("invalid integer: {}", String::from_utf8_lossy(line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_simple_string() {
        let mut decoder = Decoder::new();
        decoder.append(b"+OK\r\n");
        assert_eq!(
            decoder.decode().unwrap(),
            Some(Frame::SimpleString(b"OK".to_vec()))
        );
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn decode_error() {
        let mut decoder = Decoder::new();
        decoder.append(b"-MOVED 3999 127.0.0.1:7002\r\n");
        assert_eq!(
            decoder.decode().unwrap(),
            Some(Frame::Error(b"MOVED 3999 127.0.0.1:7002".to_vec()))
        );
    }

    #[test]
    fn decode_integer() {
        let mut decoder = Decoder::new();
        decoder.append(b":-17\r\n");
        assert_eq!(decoder.decode().unwrap(), Some(Frame::Integer(-17)));
    }

    #[test]
    fn decode_bulk_string() {
        let mut decoder = Decoder::new();
        decoder.append(b"$5\r\nhello\r\n");
        assert_eq!(
            decoder.decode().unwrap(),
            Some(Frame::BulkString(Some(Bytes::from("hello"))))
        );
    }

    #[test]
    fn decode_null_bulk_string() {
        let mut decoder = Decoder::new();
        decoder.append(b"$-1\r\n");
        assert_eq!(decoder.decode().unwrap(), Some(Frame::BulkString(None)));
    }

    #[test]
    fn decode_null_array() {
        let mut decoder = Decoder::new();
        decoder.append(b"*-1\r\n");
        assert_eq!(decoder.decode().unwrap(), Some(Frame::Null));
    }

    #[test]
    fn decode_nested_array() {
        let mut decoder = Decoder::new();
        decoder.append(b"*2\r\n:0\r\n*2\r\n$9\r\n127.0.0.1\r\n:7000\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Integer(0),
                Frame::Array(vec![
                    Frame::BulkString(Some(Bytes::from("127.0.0.1"))),
                    Frame::Integer(7000),
                ]),
            ])
        );
    }

    #[test]
    fn partial_line_is_retained() {
        let mut decoder = Decoder::new();
        decoder.append(b"+OK\r");
        assert_eq!(decoder.decode().unwrap(), None);
        decoder.append(b"\n");
        assert_eq!(
            decoder.decode().unwrap(),
            Some(Frame::SimpleString(b"OK".to_vec()))
        );
    }

    #[test]
    fn partial_array_is_retained() {
        let mut decoder = Decoder::new();
        decoder.append(b"*2\r\n$3\r\nfoo\r\n");
        assert_eq!(decoder.decode().unwrap(), None);
        decoder.append(b"$3\r\nbar\r\n");
        assert_eq!(
            decoder.decode().unwrap(),
            Some(Frame::Array(vec![
                Frame::BulkString(Some(Bytes::from("foo"))),
                Frame::BulkString(Some(Bytes::from("bar"))),
            ]))
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut decoder = Decoder::new();
        decoder.append(b"?what\r\n");
        assert!(decoder.decode().is_err());
    }

    #[test]
    fn oversized_bulk_string_is_rejected() {
        let mut decoder = Decoder::with_max_frame_size(16);
        decoder.append(b"$100\r\n");
        assert!(decoder.decode().is_err());
    }

    #[test]
    fn pipelined_frames_decode_in_order() {
        let mut decoder = Decoder::new();
        decoder.append(b"+OK\r\n:2\r\n");
        assert_eq!(
            decoder.decode().unwrap(),
            Some(Frame::SimpleString(b"OK".to_vec()))
        );
        assert_eq!(decoder.decode().unwrap(), Some(Frame::Integer(2)));
        assert_eq!(decoder.decode().unwrap(), None);
    }
}
