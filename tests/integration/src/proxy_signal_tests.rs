//! Proxy and Signal Tests - Remote Objects Seen from a Client
//!
//! These tests cover the client half and the object registry:
//! - Signals routed to interface stubs by path, interface and sender
//! - Stub disconnection and proxy teardown
//! - Objects exported and withdrawn through an object server

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use dbus_core::{names, Connection, ObjectPath, SignalMessage};
use dbus_object::{ObjectProxy, ObjectServer, PropertyAccess, PROPERTIES_INTERFACE};

/// Test: signals from the exported object reach the connected stub
#[tokio::test]
async fn test_signal_reaches_stub() {
    let pair = BusPair::new();
    let object = export_box(&pair, box_interface());
    let proxy = pair.proxy();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    proxy.connect_signal(BOX_INTERFACE, "Opened", move |signal| {
        let _ = tx.send(signal.reader().read::<String>().unwrap());
    });

    object
        .emit_signal(SignalMessage::new(box_path(), BOX_INTERFACE, "Opened").with_arg("lid".to_string()))
        .unwrap();
    assert_eq!(rx.recv().await.unwrap(), "lid");
}

/// Test: only the owner of the service name is listened to
#[tokio::test]
async fn test_signal_from_other_sender_ignored() {
    let pair = BusPair::new();
    let object = export_box(&pair, box_interface());
    let intruder = pair.bus.connect();
    intruder.spawn().unwrap();

    let proxy = pair.proxy();
    let seen = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let counter = seen.clone();
    proxy.connect_signal(BOX_INTERFACE, "Opened", move |signal| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(signal.sender().map(str::to_string));
    });

    intruder
        .send(SignalMessage::new(box_path(), BOX_INTERFACE, "Opened").into())
        .unwrap();
    object
        .emit_signal(SignalMessage::new(box_path(), BOX_INTERFACE, "Opened"))
        .unwrap();

    let sender = rx.recv().await.unwrap();
    assert_eq!(sender.as_deref(), Some(pair.server.unique_name()));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

/// Test: signals for another path or a disconnected member are not delivered
#[tokio::test]
async fn test_signal_filtering() {
    let pair = BusPair::new();
    let object = export_box(&pair, box_interface());
    pair.server
        .send(SignalMessage::new(ObjectPath::new("/other").unwrap(), BOX_INTERFACE, "Opened").into())
        .unwrap();

    let proxy = pair.proxy();
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = opened.clone();
    proxy.connect_signal(BOX_INTERFACE, "Opened", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    proxy.connect_signal(BOX_INTERFACE, "Closed", move |_| {
        let _ = tx.send(());
    });

    assert!(proxy.interface(BOX_INTERFACE).disconnect_signal("Opened"));
    object
        .emit_signal(SignalMessage::new(box_path(), BOX_INTERFACE, "Opened"))
        .unwrap();
    object
        .emit_signal(SignalMessage::new(box_path(), BOX_INTERFACE, "Closed"))
        .unwrap();

    rx.recv().await.unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 0);
}

/// Test: a dropped proxy stops listening
#[tokio::test]
async fn test_dropped_proxy_stops_listening() {
    let pair = BusPair::new();
    let object = export_box(&pair, box_interface());
    let seen = Arc::new(AtomicUsize::new(0));

    let proxy = pair.proxy();
    let counter = seen.clone();
    proxy.connect_signal(BOX_INTERFACE, "Opened", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    drop(proxy);

    // a second proxy proves delivery still works for live listeners
    let witness = pair.proxy();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    witness.connect_signal(BOX_INTERFACE, "Opened", move |_| {
        let _ = tx.send(());
    });

    object
        .emit_signal(SignalMessage::new(box_path(), BOX_INTERFACE, "Opened"))
        .unwrap();
    rx.recv().await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

/// Test: objects exported through a server answer until withdrawn
#[tokio::test]
async fn test_object_server_lifecycle() {
    let pair = BusPair::new();
    let server = ObjectServer::new(pair.server.clone());
    for name in ["small", "large"] {
        let path = ObjectPath::new(format!("/boxes/{}", name)).unwrap();
        let builder = server.adaptor(path).service(SERVICE).interface(
            box_interface().property(
                "name",
                dbus_core::Signature::of::<String>(),
                PropertyAccess::Read,
                Some(dbus_core::Variant::new(name.to_string())),
            ),
        );
        server.export(builder).unwrap();
    }
    assert_eq!(server.from_path_prefix("/boxes").len(), 2);

    let large = ObjectProxy::with_config(
        pair.client.clone(),
        ObjectPath::new("/boxes/large").unwrap(),
        Some(SERVICE.to_string()),
        dbus_object::ProxyConfig::default().timeout(Duration::from_secs(1)),
    )
    .unwrap();
    let call = large
        .method_call(PROPERTIES_INTERFACE, "Get")
        .with_arg(BOX_INTERFACE.to_string())
        .with_arg("name".to_string());
    let reply = large.invoke_method(call.clone()).await.unwrap();
    let value: dbus_core::Variant = reply.reader().read().unwrap();
    assert_eq!(value.get::<String>().unwrap(), "large");

    let withdrawn = server.unexport(&ObjectPath::new("/boxes/large").unwrap());
    assert!(withdrawn.is_some());
    let err = large.invoke_method(call).await.unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_OBJECT));

    server.shutdown();
    assert!(server.is_empty());
}

/// Test: introspection lists the declared interfaces and the overlay
#[tokio::test]
async fn test_introspection() {
    let pair = BusPair::new();
    let object = export_box(
        &pair,
        box_interface()
            .method("Open", |ctx| Ok(dbus_object::Reply::Return(ctx.reply())))
            .signal("Opened", Vec::new()),
    );

    let interfaces = object.introspect();
    let declared: Vec<&str> = interfaces.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(declared, vec![BOX_INTERFACE, PROPERTIES_INTERFACE]);

    let boxed = &interfaces[0];
    assert!(boxed.method("Open").is_some());
    assert_eq!(boxed.signals.len(), 1);
    let size = boxed.property("size").unwrap();
    assert_eq!(size.signature.as_str(), "u");
    assert_eq!(size.access, PropertyAccess::ReadWrite);

    let props = &interfaces[1];
    assert_eq!(props.method("Get").unwrap().args.len(), 3);
}
