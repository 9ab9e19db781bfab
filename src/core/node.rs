use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::timeout;
use tracing::debug;

use crate::core::command::{self, Cmd};
use crate::core::connection::Connection;
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Configuration handed to a connector for every node it dials.
///
/// Projected from the cluster options, one copy per address.
#[derive(Debug, Clone, Default)]
pub struct NodeOptions {
    /// Optional password sent as AUTH right after the dial.
    pub password: Option<String>,
    /// Bounds the number of in-flight requests queued on one node
    /// connection. Values below 1 fall back to the default of 10.
    pub pool_size: usize,
    /// Limit for establishing the TCP connection.
    pub dial_timeout: Option<Duration>,
    /// Limit for each read off the socket.
    pub read_timeout: Option<Duration>,
    /// Limit for each write to the socket.
    pub write_timeout: Option<Duration>,
    /// Idle period after which the connection shuts itself down.
    pub idle_timeout: Option<Duration>,
}

impl NodeOptions {
    fn queue_depth(&self) -> usize {
        if self.pool_size < 1 {
            DEFAULT_QUEUE_DEPTH
        } else {
            self.pool_size
        }
    }
}

/// A client for one Redis node.
///
/// The router only ever sees this capability: execute a command, execute a
/// short pipeline, release the transport. Server error replies surface as
/// [`Error::Server`] with the verbatim text; a null reply is an Ok
/// [`Frame::Null`].
pub trait NodeClient: Clone + Send + Sync + 'static {
    /// Executes one command and returns its reply.
    fn process(&self, cmd: Cmd) -> impl Future<Output = Result<Frame>> + Send;

    /// Executes several commands in one round trip.
    ///
    /// Returns exactly one result per command, in order; each command
    /// carries its own error.
    fn pipeline(&self, cmds: Vec<Cmd>) -> impl Future<Output = Vec<Result<Frame>>> + Send;

    /// Releases the underlying transport. Idempotent.
    fn close(&self);
}

/// Factory for node clients, keyed by `host:port` address.
///
/// The connection cache invokes this outside of its critical section, so a
/// cold address may be dialed twice concurrently; the cache keeps one of the
/// results and closes the other.
pub trait Connector: Send + Sync + 'static {
    /// The node client type this connector produces.
    type Node: NodeClient;

    /// Dials `addr` and prepares a ready-to-use node client.
    fn connect(&self, addr: &str) -> impl Future<Output = Result<Self::Node>> + Send;
}

struct Request {
    frames: Vec<Frame>,
    reply: oneshot::Sender<Vec<Result<Frame>>>,
}

/// The production [`NodeClient`]: a handle to a dedicated connection task.
///
/// Requests are queued over a channel; the task writes each batch of frames
/// in one flush and reads the matching number of replies, so pipelined
/// commands keep their per-command results. Handles are cheap to clone and
/// share one connection.
#[derive(Clone)]
pub struct RedisNode {
    addr: String,
    sender: mpsc::Sender<Request>,
    shutdown: Arc<Notify>,
}

impl RedisNode {
    /// Returns the address this node client is connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn request(&self, cmds: Vec<Cmd>) -> Vec<Result<Frame>> {
        let count = cmds.len();
        let frames = cmds.into_iter().map(Cmd::into_frame).collect();
        let (reply, response) = oneshot::channel();
        if self
            .sender
            .send(Request { frames, reply })
            .await
            .is_err()
        {
            return (0..count).map(|_| Err(closed())).collect();
        }
        match response.await {
            Ok(results) => results,
            Err(_) => (0..count).map(|_| Err(closed())).collect(),
        }
    }
}

impl NodeClient for RedisNode {
    async fn process(&self, cmd: Cmd) -> Result<Frame> {
        self.request(vec![cmd])
            .await
            .pop()
            .unwrap_or_else(|| Err(closed()))
    }

    async fn pipeline(&self, cmds: Vec<Cmd>) -> Vec<Result<Frame>> {
        self.request(cmds).await
    }

    fn close(&self) {
        self.shutdown.notify_one();
    }
}

impl std::fmt::Debug for RedisNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisNode").field("addr", &self.addr).finish()
    }
}

/// [`Connector`] that dials plain TCP and authenticates when configured.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    opts: NodeOptions,
}

impl TcpConnector {
    /// Creates a connector applying `opts` to every dialed node.
    pub fn new(opts: NodeOptions) -> Self {
        Self { opts }
    }
}

impl Connector for TcpConnector {
    type Node = RedisNode;

    async fn connect(&self, addr: &str) -> Result<RedisNode> {
        debug!(%addr, "dialing node");
        let stream = match self.opts.dial_timeout {
            Some(limit) => timeout(limit, TcpStream::connect(addr))
                .await
                .map_err(|_| {
                    Error::from(io::Error::new(io::ErrorKind::TimedOut, "dial timed out"))
                })??,
            None => TcpStream::connect(addr).await?,
        };
        let mut conn = Connection::new(stream)
            .with_timeouts(self.opts.read_timeout, self.opts.write_timeout);

        if let Some(password) = &self.opts.password {
            conn.write_frame(&command::auth(password.clone()).into_frame())
                .await?;
            if let Frame::Error(_) = conn.read_frame().await? {
                return Err(Error::Auth);
            }
        }

        let (sender, receiver) = mpsc::channel(self.opts.queue_depth());
        let shutdown = Arc::new(Notify::new());
        tokio::spawn(run_connection(
            conn,
            receiver,
            shutdown.clone(),
            self.opts.idle_timeout,
        ));

        Ok(RedisNode {
            addr: addr.to_string(),
            sender,
            shutdown,
        })
    }
}

/// Connection task: serves queued requests until shutdown, idle expiry, all
/// handles dropped, or a transport failure.
async fn run_connection(
    mut conn: Connection<TcpStream>,
    mut receiver: mpsc::Receiver<Request>,
    shutdown: Arc<Notify>,
    idle_timeout: Option<Duration>,
) {
    loop {
        let request = tokio::select! {
            _ = shutdown.notified() => None,
            request = next_request(&mut receiver, idle_timeout) => request,
        };
        let Some(Request { frames, reply }) = request else {
            return;
        };

        let count = frames.len();
        let mut results = Vec::with_capacity(count);
        if let Err(err) = conn.write_frames(&frames).await {
            fill_failed(&mut results, count, &err);
            let _ = reply.send(results);
            return;
        }
        for _ in 0..count {
            match conn.read_frame().await {
                Ok(frame) => results.push(reply_of(frame)),
                Err(err) => {
                    fill_failed(&mut results, count, &err);
                    let _ = reply.send(results);
                    return;
                }
            }
        }
        let _ = reply.send(results);
    }
}

async fn next_request(
    receiver: &mut mpsc::Receiver<Request>,
    idle_timeout: Option<Duration>,
) -> Option<Request> {
    match idle_timeout {
        Some(limit) => timeout(limit, receiver.recv()).await.ok().flatten(),
        None => receiver.recv().await,
    }
}

/// Converts a server reply into a per-command result.
fn reply_of(frame: Frame) -> Result<Frame> {
    match frame {
        Frame::Error(text) => Err(Error::Server {
            message: String::from_utf8_lossy(&text).into_owned(),
        }),
        other => Ok(other),
    }
}

/// Pads the remaining pipeline slots after a transport failure.
fn fill_failed(results: &mut Vec<Result<Frame>>, count: usize, err: &Error) {
    while results.len() < count {
        results.push(Err(replicate(err)));
    }
}

fn replicate(err: &Error) -> Error {
    match err {
        Error::Io { source } => {
            Error::from(io::Error::new(source.kind(), source.to_string()))
        }
        Error::Protocol { message } => Error::Protocol {
            message: message.clone(),
        },
        other => Error::Protocol {
            message: other.to_string(),
        },
    }
}

fn closed() -> Error {
    Error::from(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "node connection closed",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::TcpListener;

    async fn serve_one(listener: TcpListener, script: Vec<Frame>) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(stream);
        for reply in script {
            conn.read_frame().await.unwrap();
            conn.write_frame(&reply).await.unwrap();
        }
    }

    #[tokio::test]
    async fn process_returns_server_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(serve_one(
            listener,
            vec![Frame::BulkString(Some(Bytes::from("bar")))],
        ));

        let connector = TcpConnector::default();
        let node = connector.connect(&addr).await.unwrap();
        let frame = node.process(command::get("foo".to_string())).await.unwrap();
        assert_eq!(frame, Frame::BulkString(Some(Bytes::from("bar"))));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn error_reply_surfaces_verbatim() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(serve_one(
            listener,
            vec![Frame::Error(b"MOVED 866 127.0.0.1:7002".to_vec())],
        ));

        let connector = TcpConnector::default();
        let node = connector.connect(&addr).await.unwrap();
        let err = node
            .process(command::get("foo".to_string()))
            .await
            .unwrap_err();
        match err {
            Error::Server { message } => assert_eq!(message, "MOVED 866 127.0.0.1:7002"),
            other => panic!("expected server error, got {other}"),
        }

        server.await.unwrap();
    }

    #[tokio::test]
    async fn pipeline_keeps_per_command_results() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            conn.read_frame().await.unwrap();
            conn.read_frame().await.unwrap();
            conn.write_frames(&[
                Frame::SimpleString(b"OK".to_vec()),
                Frame::BulkString(Some(Bytes::from("value"))),
            ])
            .await
            .unwrap();
        });

        let connector = TcpConnector::default();
        let node = connector.connect(&addr).await.unwrap();
        let results = node
            .pipeline(vec![command::asking(), command::get("k".to_string())])
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Frame::SimpleString(b"OK".to_vec())
        );
        assert_eq!(
            results[1].as_ref().unwrap(),
            &Frame::BulkString(Some(Bytes::from("value")))
        );

        server.await.unwrap();
    }

    #[tokio::test]
    async fn close_breaks_the_handle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _keep = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            // Hold the socket open without replying.
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let connector = TcpConnector::default();
        let node = connector.connect(&addr).await.unwrap();
        node.close();
        node.close();
        // Give the connection task a moment to observe the shutdown.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = node
            .process(command::get("foo".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn dial_failure_is_an_io_error() {
        let connector = TcpConnector::default();
        // Port 1 is reserved and almost certainly closed.
        let err = connector.connect("127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn auth_failure_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(serve_one(
            listener,
            vec![Frame::Error(b"ERR invalid password".to_vec())],
        ));

        let connector = TcpConnector::new(NodeOptions {
            password: Some("nope".to_string()),
            ..NodeOptions::default()
        });
        let err = connector.connect(&addr).await.unwrap_err();
        assert!(matches!(err, Error::Auth));

        server.await.unwrap();
    }

    #[test]
    fn queue_depth_defaults() {
        assert_eq!(NodeOptions::default().queue_depth(), 10);
        let opts = NodeOptions {
            pool_size: 32,
            ..NodeOptions::default()
        };
        assert_eq!(opts.queue_depth(), 32);
    }
}
