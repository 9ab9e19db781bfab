use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::proto::codec::{Decoder, Encoder};
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// A framed connection to a single Redis server.
///
/// Wraps an async byte stream and speaks RESP on top of it, applying the
/// configured read and write timeouts to each operation.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    decoder: Decoder,
    encoder: Encoder,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a connection with no timeouts configured.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            encoder: Encoder::new(),
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Configures per-operation read and write timeouts.
    pub fn with_timeouts(
        mut self,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }

    /// Writes a single frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_frames(std::slice::from_ref(frame)).await
    }

    /// Writes a batch of frames in one flush.
    ///
    /// This is how a pipeline reaches the server in a single round trip.
    pub async fn write_frames(&mut self, frames: &[Frame]) -> Result<()> {
        for frame in frames {
            self.encoder.encode(frame);
        }
        let data = self.encoder.take();
        match self.write_timeout {
            Some(limit) => timeout(limit, self.stream.write_all(&data))
                .await
                .map_err(|_| elapsed("write timed out"))??,
            None => self.stream.write_all(&data).await?,
        }
        Ok(())
    }

    /// Reads one complete frame, buffering partial input as needed.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self
                .decoder
                .decode()
                .map_err(|message| Error::Protocol { message })?
            {
                return Ok(frame);
            }

            let mut buf = [0u8; 4096];
            let read = match self.read_timeout {
                Some(limit) => timeout(limit, self.stream.read(&mut buf))
                    .await
                    .map_err(|_| elapsed("read timed out"))??,
                None => self.stream.read(&mut buf).await?,
            };
            if read == 0 {
                return Err(Error::from(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )));
            }
            self.decoder.append(&buf[..read]);
        }
    }
}

fn elapsed(what: &str) -> Error {
    Error::from(io::Error::new(io::ErrorKind::TimedOut, what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::{TcpListener, TcpStream};

    #[tokio::test]
    async fn ping_pong_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            let frame = conn.read_frame().await.unwrap();
            assert_eq!(
                frame,
                Frame::Array(vec![Frame::BulkString(Some(Bytes::from("PING")))])
            );
            conn.write_frame(&Frame::SimpleString(b"PONG".to_vec()))
                .await
                .unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::new(stream);
        conn.write_frame(&Frame::Array(vec![Frame::BulkString(Some(Bytes::from(
            "PING",
        )))]))
        .await
        .unwrap();
        assert_eq!(
            conn.read_frame().await.unwrap(),
            Frame::SimpleString(b"PONG".to_vec())
        );

        server.await.unwrap();
    }

    #[tokio::test]
    async fn batched_frames_arrive_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            assert_eq!(conn.read_frame().await.unwrap(), Frame::Integer(1));
            assert_eq!(conn.read_frame().await.unwrap(), Frame::Integer(2));
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::new(stream);
        conn.write_frames(&[Frame::Integer(1), Frame::Integer(2)])
            .await
            .unwrap();

        server.await.unwrap();
    }

    #[tokio::test]
    async fn eof_is_an_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::new(stream);
        let err = conn.read_frame().await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn read_timeout_fires_when_server_is_silent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn =
            Connection::new(stream).with_timeouts(Some(Duration::from_millis(50)), None);
        let err = conn.read_frame().await.unwrap_err();
        match err {
            Error::Io { source } => assert_eq!(source.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {other}"),
        }
    }
}
