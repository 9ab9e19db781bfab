//! The routing client.
//!
//! A [`ClusterClient`] owns the slot table, the known address set, and the
//! connection cache behind one reader/writer lock. Dispatch holds the lock
//! as a reader so the whole redirect loop observes a consistent topology
//! snapshot; reloads hold it as a writer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cluster::cache::ConnLru;
use crate::cluster::errors::ErrorClass;
use crate::cluster::options::ClusterOptions;
use crate::cluster::slot::{key_slot, SLOT_COUNT};
use crate::cluster::topology::{parse_cluster_slots, SlotRange};
use crate::core::command::{self, Cmd};
use crate::core::node::{Connector, NodeClient, TcpConnector};
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// Maximum number of hops a single command may take through MOVED, ASK, and
/// network retries before its last error is surfaced.
pub const MAX_REDIRECTS: usize = 16;

/// A Redis Cluster client.
///
/// Routes each command to the node owning its hash slot, follows MOVED and
/// ASK redirects, retries transient network failures on alternate nodes, and
/// keeps per-node connections in a bounded LRU cache. Cloning is cheap and
/// clones share all state; any number of tasks may dispatch concurrently.
pub struct ClusterClient<C: Connector = TcpConnector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ClusterClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ClusterClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient").finish_non_exhaustive()
    }
}

struct Inner<C: Connector> {
    connector: C,
    state: RwLock<State<C::Node>>,
    reload_due: AtomicBool,
}

/// Topology snapshot: slot table, known addresses, connection cache.
struct State<N> {
    /// One cell per hash slot; `None` means the route is unknown.
    slots: Vec<Option<Arc<[String]>>>,
    /// Seeds plus every address learned from topology reloads. Shuffled
    /// after each install so topology queries and network fallbacks spread
    /// across nodes.
    addrs: Vec<String>,
    conns: Mutex<ConnLru<N>>,
}

impl<N: NodeClient> State<N> {
    fn new(addrs: Vec<String>, max_conns: usize) -> Self {
        Self {
            slots: vec![None; SLOT_COUNT as usize],
            addrs,
            conns: Mutex::new(ConnLru::new(max_conns)),
        }
    }

    /// Closes every cached connection and forgets all routes.
    fn reset(&mut self) {
        self.conns.get_mut().clear();
        self.slots.fill(None);
    }

    /// Installs a freshly parsed slot table and learns its addresses.
    fn install(&mut self, ranges: Vec<SlotRange>) {
        let mut known: HashSet<String> = self.addrs.iter().cloned().collect();
        for range in ranges {
            let SlotRange { start, end, addrs } = range;
            let shared: Arc<[String]> = addrs.into();
            // The table index is exclusive of 16384 while a parsed bound may
            // name it.
            for slot in start..=end.min(SLOT_COUNT - 1) {
                self.slots[slot as usize] = Some(shared.clone());
            }
            for addr in shared.iter() {
                if known.insert(addr.clone()) {
                    self.addrs.push(addr.clone());
                }
            }
        }

        let mut rng = rand::thread_rng();
        for i in 0..self.addrs.len() {
            let j = rng.gen_range(0..=i);
            self.addrs.swap(i, j);
        }
    }

    /// Current master address for a slot, when known.
    fn slot_addr(&self, slot: u16) -> Option<String> {
        self.slots
            .get(slot as usize)?
            .as_ref()
            .and_then(|addrs| addrs.first().cloned())
    }

    /// First known address not yet tried by this dispatch.
    fn next_untried(&self, tried: &HashSet<String>) -> Option<String> {
        self.addrs.iter().find(|addr| !tried.contains(*addr)).cloned()
    }
}

impl ClusterClient<TcpConnector> {
    /// Connects to a cluster through its seed addresses.
    ///
    /// Performs an initial topology load against the seeds. Fails with
    /// [`Error::NoAddresses`] when the seed list is empty and no addresses
    /// were learned.
    pub async fn connect(opts: ClusterOptions) -> Result<Self> {
        let connector = TcpConnector::new(opts.node_options());
        Self::connect_with(connector, opts).await
    }
}

impl<C: Connector> ClusterClient<C> {
    /// Connects through a custom [`Connector`].
    pub async fn connect_with(connector: C, opts: ClusterOptions) -> Result<Self> {
        let seeds = opts.seed_addrs()?;
        let client = Self::new(connector, seeds, opts.conn_limit());
        client.reload().await?;
        if client.inner.state.read().await.addrs.is_empty() {
            return Err(Error::NoAddresses);
        }
        Ok(client)
    }

    fn new(connector: C, addrs: Vec<String>, max_conns: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                state: RwLock::new(State::new(addrs, max_conns)),
                reload_due: AtomicBool::new(false),
            }),
        }
    }

    /// Hashes `key` and dispatches `cmd` to the owning shard.
    pub async fn route(&self, key: &str, cmd: Cmd) -> Result<Frame> {
        self.process(key_slot(key), cmd).await
    }

    /// Dispatches a command to the node owning `slot`.
    ///
    /// Follows up to [`MAX_REDIRECTS`] MOVED and ASK hops, retrying network
    /// failures on the next untried address. A MOVED reply flags the
    /// topology as stale; the reload runs at the start of the next dispatch
    /// rather than mid-flight, so the current command still completes
    /// against the node the redirect named.
    pub async fn process(&self, slot: u16, cmd: Cmd) -> Result<Frame> {
        if self.reload_pending() {
            if let Err(err) = self.reload().await {
                warn!(%err, "topology reload failed, dispatching with stale routes");
            }
        }

        let state = self.inner.state.read().await;
        let mut ask = false;
        let mut tried: HashSet<String> = HashSet::new();
        let mut addr = state.slot_addr(slot).unwrap_or_default();
        let mut attempt = 0;

        loop {
            tried.insert(addr.clone());

            let outcome = match self.node_for(&state, &addr).await {
                Ok(node) => {
                    if ask {
                        // The importing node only honours the command when
                        // an ASKING sentinel precedes it in the same round
                        // trip. The sentinel's own reply is ignored.
                        ask = false;
                        let mut replies = node
                            .pipeline(vec![command::asking(), cmd.clone()])
                            .await;
                        replies.pop().unwrap_or_else(|| {
                            Err(Error::Protocol {
                                message: "empty pipeline reply".to_string(),
                            })
                        })
                    } else {
                        node.process(cmd.clone()).await
                    }
                }
                Err(err) => Err(err),
            };

            let err = match outcome {
                Ok(frame) => return Ok(frame),
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= MAX_REDIRECTS {
                return Err(err);
            }

            match ErrorClass::of(&err) {
                ErrorClass::Net => match state.next_untried(&tried) {
                    Some(next) => {
                        debug!(%addr, next = %next, "node unreachable, trying next address");
                        addr = next;
                    }
                    None => return Err(err),
                },
                ErrorClass::Moved {
                    slot: moved,
                    addr: target,
                } => {
                    debug!(slot = moved, %target, "following MOVED redirect");
                    self.force_reload();
                    addr = target;
                }
                ErrorClass::Ask {
                    slot: asked,
                    addr: target,
                } => {
                    debug!(slot = asked, %target, "following ASK redirect");
                    ask = true;
                    addr = target;
                }
                ErrorClass::Other => return Err(err),
            }
        }
    }

    /// Closes all cached connections and forgets the slot table. Idempotent.
    pub async fn close(&self) {
        let mut state = self.inner.state.write().await;
        state.reset();
    }

    /// Current master address for a slot, when known.
    pub async fn master_for_slot(&self, slot: u16) -> Option<String> {
        self.inner.state.read().await.slot_addr(slot)
    }

    /// Every address currently known, seeds and learned nodes alike.
    pub async fn known_addrs(&self) -> Vec<String> {
        self.inner.state.read().await.addrs.clone()
    }

    /// Whether every one of the 16384 slots has a known route.
    pub async fn is_fully_covered(&self) -> bool {
        let state = self.inner.state.read().await;
        state.slots.iter().all(|cell| cell.is_some())
    }

    /// Fetches the cached client for `addr`, dialing on a miss.
    ///
    /// The dial happens outside the cache lock, so two tasks may race to a
    /// cold address; the cache keeps one result and closes the other.
    async fn node_for(&self, state: &State<C::Node>, addr: &str) -> Result<C::Node> {
        if let Some(node) = state.conns.lock().get(addr) {
            return Ok(node);
        }
        let node = self.inner.connector.connect(addr).await?;
        Ok(state.conns.lock().add(addr, node))
    }

    /// Closes all connections and rebuilds the slot table from the first
    /// known address that answers `CLUSTER SLOTS`.
    async fn reload(&self) -> Result<()> {
        let mut state = self.inner.state.write().await;
        let addrs = state.addrs.clone();
        debug!(known = addrs.len(), "reloading cluster topology");

        let mut last_err = None;
        for addr in addrs {
            state.reset();
            match self.fetch_slot_ranges(&addr).await {
                Ok(ranges) => {
                    state.install(ranges);
                    return Ok(());
                }
                Err(err) => {
                    debug!(%addr, %err, "topology query failed");
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Queries one node for the slot table over a transient connection.
    async fn fetch_slot_ranges(&self, addr: &str) -> Result<Vec<SlotRange>> {
        let node = self.inner.connector.connect(addr).await?;
        let reply = node.process(command::cluster_slots()).await;
        node.close();
        parse_cluster_slots(reply?)
    }

    fn reload_pending(&self) -> bool {
        self.inner.reload_due.swap(false, Ordering::SeqCst)
    }

    fn force_reload(&self) {
        self.inner.reload_due.store(true, Ordering::SeqCst);
    }
}

impl<C: Connector> ClusterClient<C> {
    /// Gets the value of a key. Returns `None` when the key does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match self.route(key, command::get(key.to_string())).await? {
            Frame::BulkString(data) => Ok(data),
            Frame::Null => Ok(None),
            other => Err(unexpected("GET", &other)),
        }
    }

    /// Sets the value of a key.
    pub async fn set(&self, key: &str, value: impl Into<Bytes>) -> Result<()> {
        self.route(key, command::set(key.to_string(), value))
            .await
            .map(|_| ())
    }

    /// Deletes a key. Returns the number of keys removed.
    pub async fn del(&self, key: &str) -> Result<i64> {
        match self.route(key, command::del(key.to_string())).await? {
            Frame::Integer(n) => Ok(n),
            other => Err(unexpected("DEL", &other)),
        }
    }

    /// Checks whether a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.route(key, command::exists(key.to_string())).await? {
            Frame::Integer(n) => Ok(n > 0),
            other => Err(unexpected("EXISTS", &other)),
        }
    }

    /// Increments the integer value of a key by one.
    pub async fn incr(&self, key: &str) -> Result<i64> {
        match self.route(key, command::incr(key.to_string())).await? {
            Frame::Integer(n) => Ok(n),
            other => Err(unexpected("INCR", &other)),
        }
    }
}

fn unexpected(cmd: &str, frame: &Frame) -> Error {
    Error::Protocol {
        message: format!("unexpected reply to {cmd}: {frame:?}"),
    }
}
