//! Common test utilities and fixtures

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use dbus_core::{Bus, BusConnection, ObjectPath, Signature};
use dbus_object::{InterfaceAdaptor, InterfaceBuilder, ObjectAdaptor, ObjectProxy, PropertyAccess};

pub const SERVICE: &str = "com.example.BoxService";
pub const BOX_INTERFACE: &str = "com.example.Box";
pub const BOX_PATH: &str = "/t";

static INIT: Once = Once::new();

/// Initialize logging for tests
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("dbus_object=debug".parse().unwrap()),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn box_path() -> ObjectPath {
    ObjectPath::new(BOX_PATH).unwrap()
}

/// A bus with a server connection owning [`SERVICE`] and a client connection
pub struct BusPair {
    pub bus: Bus,
    pub server: Arc<BusConnection>,
    pub client: Arc<BusConnection>,
}

impl BusPair {
    pub fn new() -> Self {
        init_logging();
        let bus = Bus::new();
        let server = bus.connect();
        let client = bus.connect();
        server.spawn().unwrap();
        client.spawn().unwrap();
        assert!(server.request_name(SERVICE).unwrap());
        Self { bus, server, client }
    }

    /// Proxy for the box object as seen from the client
    pub fn proxy(&self) -> Arc<ObjectProxy> {
        ObjectProxy::new(self.client.clone(), box_path(), Some(SERVICE.to_string())).unwrap()
    }
}

/// `com.example.Box` with an uninitialized read-write `size` property
pub fn box_interface() -> InterfaceBuilder {
    InterfaceAdaptor::builder(BOX_INTERFACE).property(
        "size",
        Signature::of::<u32>(),
        PropertyAccess::ReadWrite,
        None,
    )
}

/// Export `interface` at [`BOX_PATH`] on the server connection
pub fn export_box(pair: &BusPair, interface: InterfaceBuilder) -> Arc<ObjectAdaptor> {
    ObjectAdaptor::builder(pair.server.clone(), box_path())
        .service(SERVICE)
        .interface(interface)
        .build()
        .unwrap()
}

/// Thread-safe counters for concurrent scenarios
pub struct ConcurrentStats {
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub latencies: Mutex<Vec<Duration>>,
}

impl ConcurrentStats {
    pub fn new() -> Self {
        Self {
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            latencies: Mutex::new(Vec::new()),
        }
    }

    pub fn record_success(&self, started: Instant) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.latencies.lock().push(started.elapsed());
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn max_latency(&self) -> Duration {
        self.latencies.lock().iter().copied().max().unwrap_or_default()
    }
}

/// Error name of a remote error reply, `None` for local failures
pub fn remote_error_name(err: &dbus_object::ObjectError) -> Option<&str> {
    match err {
        dbus_object::ObjectError::Method(e) => Some(e.name()),
        _ => None,
    }
}
