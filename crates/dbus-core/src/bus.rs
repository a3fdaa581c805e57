//! In-memory bus
//!
//! A [`Bus`] routes messages between the [`BusConnection`]s attached to it.
//! Every connection owns an inbox; its dispatch loop drains the inbox and
//! hands each message to the pending-reply table, the object registered at
//! the message path or the signal filters.
//!
//! ```text
//!   BusConnection ──send──► Bus::route ──► peer inbox ──► dispatch loop
//!                                                           │
//!                      ┌────────────────────────────────────┼──────────────┐
//!                      ▼                                    ▼              ▼
//!               pending replies                    object at path   signal filters
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use crate::connection::{Connection, ConnectionConfig, FilterId, MessageHandler};
use crate::error::{Error, MethodError, Result};
use crate::message::{CallMessage, ErrorMessage, Message, MessageType};
use crate::names;
use crate::types::ObjectPath;

struct BusInner {
    guid: String,
    next_id: AtomicU64,
    peers: RwLock<HashMap<String, mpsc::UnboundedSender<Message>>>,
    /// Well-known name -> unique name of the owner
    names: RwLock<HashMap<String, String>>,
}

/// In-process message router
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Create a new bus with a fresh GUID
    pub fn new() -> Self {
        let guid = uuid::Uuid::new_v4().simple().to_string();
        info!("Starting in-memory bus {}", guid);
        Self {
            inner: Arc::new(BusInner {
                guid,
                next_id: AtomicU64::new(1),
                peers: RwLock::new(HashMap::new()),
                names: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Bus identifier
    pub fn guid(&self) -> &str {
        &self.inner.guid
    }

    /// Attach a new connection with the default configuration
    pub fn connect(&self) -> Arc<BusConnection> {
        self.connect_with_config(ConnectionConfig::default())
    }

    /// Attach a new connection with `config`
    pub fn connect_with_config(&self, config: ConnectionConfig) -> Arc<BusConnection> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let unique_name = format!(":1.{}", id);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.peers.write().insert(unique_name.clone(), tx);
        debug!("Connection {} attached", unique_name);

        Arc::new(BusConnection {
            bus: self.clone(),
            unique_name,
            config,
            serial: AtomicU32::new(1),
            objects: RwLock::new(HashMap::new()),
            filters: RwLock::new(BTreeMap::new()),
            next_filter: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            inbox: Mutex::new(Some(rx)),
            closed: AtomicBool::new(false),
            stats: ConnectionStats::default(),
        })
    }

    /// Number of attached connections
    pub fn peer_count(&self) -> usize {
        self.inner.peers.read().len()
    }

    /// Resolve a unique or well-known name to a unique name
    fn resolve(&self, name: &str) -> Option<String> {
        if self.inner.peers.read().contains_key(name) {
            return Some(name.to_string());
        }
        self.inner.names.read().get(name).cloned()
    }

    fn deliver(&self, unique_name: &str, msg: Message) -> bool {
        let peers = self.inner.peers.read();
        match peers.get(unique_name) {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    fn route(&self, msg: Message) {
        match msg.destination() {
            Some(destination) => match self.resolve(destination) {
                Some(unique) => {
                    trace!("Routing {:?} serial={} to {}", msg.kind(), msg.serial(), unique);
                    if !self.deliver(&unique, msg) {
                        debug!("Peer {} went away during delivery", unique);
                    }
                }
                None => self.bounce_unknown_service(msg),
            },
            None => match msg.kind() {
                MessageType::Signal => {
                    let peers = self.inner.peers.read();
                    trace!("Broadcasting signal to {} peers", peers.len());
                    for tx in peers.values() {
                        let _ = tx.send(msg.clone());
                    }
                }
                MessageType::MethodCall => {
                    // Calls without a destination go back to the caller
                    if let Some(sender) = msg.sender().map(str::to_string) {
                        self.deliver(&sender, msg);
                    }
                }
                _ => debug!("Dropping {:?} without destination", msg.kind()),
            },
        }
    }

    fn bounce_unknown_service(&self, msg: Message) {
        let destination = msg.destination().unwrap_or_default().to_string();
        warn!("No owner for destination {}", destination);
        if msg.kind() != MessageType::MethodCall || msg.no_reply_expected() {
            return;
        }
        let Some(sender) = msg.sender().map(str::to_string) else {
            return;
        };
        let err = MethodError::new(
            names::SERVICE_UNKNOWN,
            format!("the name {} was not provided by any service", destination),
        );
        let mut reply: Message = ErrorMessage::reply_to(&msg, &err).into();
        reply.set_sender(names::BUS_NAME);
        self.deliver(&sender, reply);
    }

    fn request_name(&self, name: &str, owner: &str) -> bool {
        let mut names = self.inner.names.write();
        match names.get(name) {
            Some(current) => current == owner,
            None => {
                names.insert(name.to_string(), owner.to_string());
                info!("Name {} acquired by {}", name, owner);
                true
            }
        }
    }

    fn release_name(&self, name: &str, owner: &str) -> bool {
        let mut names = self.inner.names.write();
        if names.get(name).map(String::as_str) == Some(owner) {
            names.remove(name);
            true
        } else {
            false
        }
    }

    fn detach(&self, unique_name: &str) {
        self.inner.peers.write().remove(unique_name);
        self.inner.names.write().retain(|_, owner| owner != unique_name);
        debug!("Connection {} detached", unique_name);
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-connection statistics
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub calls_dispatched: AtomicU64,
    pub signals_dispatched: AtomicU64,
    pub replies_matched: AtomicU64,
    pub unknown_object: AtomicU64,
}

impl ConnectionStats {
    /// Copy the current counters
    pub fn snapshot(&self) -> ConnectionStatsSnapshot {
        ConnectionStatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            calls_dispatched: self.calls_dispatched.load(Ordering::Relaxed),
            signals_dispatched: self.signals_dispatched.load(Ordering::Relaxed),
            replies_matched: self.replies_matched.load(Ordering::Relaxed),
            unknown_object: self.unknown_object.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of connection statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub calls_dispatched: u64,
    pub signals_dispatched: u64,
    pub replies_matched: u64,
    pub unknown_object: u64,
}

struct SignalFilter {
    path: Option<ObjectPath>,
    handler: Weak<dyn MessageHandler>,
}

/// A connection attached to a [`Bus`]
pub struct BusConnection {
    bus: Bus,
    unique_name: String,
    config: ConnectionConfig,
    serial: AtomicU32,
    objects: RwLock<HashMap<ObjectPath, Weak<dyn MessageHandler>>>,
    filters: RwLock<BTreeMap<u64, SignalFilter>>,
    next_filter: AtomicU64,
    pending: Mutex<HashMap<u32, oneshot::Sender<Message>>>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    closed: AtomicBool,
    stats: ConnectionStats,
}

impl BusConnection {
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Start the dispatch loop on the current runtime
    ///
    /// The loop holds only a weak reference; it ends when the connection is
    /// closed or dropped.
    pub fn spawn(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let mut rx = self.inbox.lock().take().ok_or(Error::AlreadyRunning)?;
        let weak = Arc::downgrade(self);
        let name = self.unique_name.clone();
        debug!("Starting dispatch loop for {}", name);

        Ok(tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let Some(conn) = weak.upgrade() else {
                    break;
                };
                conn.dispatch(msg);
            }
            debug!("Dispatch loop for {} finished", name);
        }))
    }

    /// Dispatch everything already queued, without a running loop
    ///
    /// Returns the number of messages dispatched. Does nothing once
    /// [`spawn`](Self::spawn) has taken the inbox.
    pub fn dispatch_pending(&self) -> usize {
        let mut count = 0;
        loop {
            let next = match self.inbox.lock().as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            match next {
                Some(msg) => {
                    self.dispatch(msg);
                    count += 1;
                }
                None => return count,
            }
        }
    }

    /// Dispatch one inbound message; returns whether anything consumed it
    pub fn dispatch(&self, msg: Message) -> bool {
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        match msg.kind() {
            MessageType::MethodReturn | MessageType::Error => self.dispatch_reply(msg),
            MessageType::MethodCall => self.dispatch_call(msg),
            MessageType::Signal => self.dispatch_signal(&msg),
        }
    }

    fn dispatch_reply(&self, msg: Message) -> bool {
        let Some(reply_serial) = msg.reply_serial() else {
            warn!("Reply without reply serial from {:?}", msg.sender());
            return false;
        };
        let waiter = self.pending.lock().remove(&reply_serial);
        match waiter {
            Some(tx) => {
                self.stats.replies_matched.fetch_add(1, Ordering::Relaxed);
                // The waiter may have given up already
                tx.send(msg).is_ok()
            }
            None => {
                debug!("Unmatched reply for serial {}", reply_serial);
                false
            }
        }
    }

    fn dispatch_call(&self, msg: Message) -> bool {
        let handler = msg
            .path()
            .and_then(|path| self.objects.read().get(path).cloned())
            .and_then(|weak| weak.upgrade());

        if let Some(handler) = handler {
            self.stats.calls_dispatched.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Dispatching {}.{} on {:?}",
                msg.interface().unwrap_or("*"),
                msg.member().unwrap_or_default(),
                msg.path()
            );
            if handler.handle_message(&msg) {
                return true;
            }
        }

        self.stats.unknown_object.fetch_add(1, Ordering::Relaxed);
        let path = msg.path().map(ObjectPath::to_string).unwrap_or_default();
        warn!("No object handled call to {} from {:?}", path, msg.sender());
        if !msg.no_reply_expected() {
            let err = MethodError::unknown_object(format!("no object at path {}", path));
            if let Err(e) = self.send(ErrorMessage::reply_to(&msg, &err).into()) {
                warn!("Failed to send unknown object error: {}", e);
            }
        }
        false
    }

    fn dispatch_signal(&self, msg: &Message) -> bool {
        let handlers: Vec<Arc<dyn MessageHandler>> = {
            let mut filters = self.filters.write();
            filters.retain(|_, f| f.handler.strong_count() > 0);
            filters
                .values()
                .filter(|f| f.path.is_none() || f.path.as_ref() == msg.path())
                .filter_map(|f| f.handler.upgrade())
                .collect()
        };
        self.stats.signals_dispatched.fetch_add(1, Ordering::Relaxed);

        let mut handled = false;
        for handler in handlers {
            handled |= handler.handle_message(msg);
        }
        handled
    }

    fn next_serial(&self) -> u32 {
        loop {
            let serial = self.serial.fetch_add(1, Ordering::Relaxed);
            if serial != 0 {
                return serial;
            }
        }
    }

    fn send_with_serial(&self, mut msg: Message, serial: u32) -> Result<u32> {
        if self.is_closed() {
            return Err(Error::Disconnected);
        }
        msg.set_serial(serial);
        msg.set_sender(self.unique_name.clone());
        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bus.route(msg);
        Ok(serial)
    }

    /// Acquire a well-known name; `false` when another connection owns it
    pub fn request_name(&self, name: &str) -> Result<bool> {
        if self.is_closed() {
            return Err(Error::Disconnected);
        }
        Ok(self.bus.request_name(name, &self.unique_name))
    }

    /// Give up a well-known name; `false` if not owned
    pub fn release_name(&self, name: &str) -> bool {
        self.bus.release_name(name, &self.unique_name)
    }

    /// Detach from the bus and fail every waiting call
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.bus.detach(&self.unique_name);
        let dropped = {
            let mut pending = self.pending.lock();
            let n = pending.len();
            pending.clear();
            n
        };
        if dropped > 0 {
            debug!("Dropped {} pending replies on close of {}", dropped, self.unique_name);
        }
    }
}

/// Reply slot held by one outstanding call
struct PendingSlot<'a> {
    pending: &'a Mutex<HashMap<u32, oneshot::Sender<Message>>>,
    serial: u32,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.pending.lock().remove(&self.serial).is_some() {
            trace!("Released reply slot for serial {}", self.serial);
        }
    }
}

#[async_trait]
impl Connection for BusConnection {
    fn unique_name(&self) -> &str {
        &self.unique_name
    }

    fn send(&self, msg: Message) -> Result<u32> {
        let serial = self.next_serial();
        self.send_with_serial(msg, serial)
    }

    async fn send_with_reply(&self, call: CallMessage, timeout: Option<Duration>) -> Result<Message> {
        let serial = self.next_serial();
        let rx = {
            let mut pending = self.pending.lock();
            if pending.len() >= self.config.max_pending_replies {
                return Err(Error::TooManyPending(self.config.max_pending_replies));
            }
            let (tx, rx) = oneshot::channel();
            pending.insert(serial, tx);
            rx
        };
        // released on every exit, including a dropped future
        let _slot = PendingSlot {
            pending: &self.pending,
            serial,
        };

        self.send_with_serial(call.into(), serial)?;

        match timeout.or(self.config.default_timeout) {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(_)) => Err(Error::Disconnected),
                Err(_) => {
                    debug!("Call serial {} timed out after {:?}", serial, limit);
                    Err(Error::Timeout)
                }
            },
            None => rx.await.map_err(|_| Error::Disconnected),
        }
    }

    fn register_object(&self, path: &ObjectPath, handler: Weak<dyn MessageHandler>) -> Result<()> {
        let mut objects = self.objects.write();
        if let Some(existing) = objects.get(path) {
            if existing.strong_count() > 0 {
                return Err(Error::PathInUse(path.to_string()));
            }
        }
        debug!("Registered object {} on {}", path, self.unique_name);
        objects.insert(path.clone(), handler);
        Ok(())
    }

    fn unregister_object(&self, path: &ObjectPath) -> bool {
        let removed = self.objects.write().remove(path).is_some();
        if removed {
            debug!("Unregistered object {} on {}", path, self.unique_name);
        }
        removed
    }

    fn add_signal_filter(&self, path: Option<ObjectPath>, handler: Weak<dyn MessageHandler>) -> FilterId {
        let id = self.next_filter.fetch_add(1, Ordering::Relaxed);
        self.filters.write().insert(id, SignalFilter { path, handler });
        FilterId(id)
    }

    fn remove_signal_filter(&self, id: FilterId) -> bool {
        self.filters.write().remove(&id.0).is_some()
    }

    fn name_owner(&self, name: &str) -> Option<String> {
        self.bus.resolve(name)
    }
}

impl Drop for BusConnection {
    fn drop(&mut self) {
        self.close();
    }
}
