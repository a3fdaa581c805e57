//! Dispatch Tests - Routing Calls to Exported Objects
//!
//! These tests drive method calls through the in-memory bus:
//! - Interface and member resolution, with and without an interface name
//! - Error replies for unknown objects, interfaces and methods
//! - Handler errors carried back to the caller
//! - Many concurrent callers against a single object

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use common::*;
use dbus_core::{names, CallMessage, MethodError, ObjectPath, Value};
use dbus_object::{InterfaceAdaptor, ObjectAdaptor, ObjectProxy};

fn counting_interface(calls: Arc<AtomicU64>) -> dbus_object::InterfaceBuilder {
    box_interface()
        .method("Add", move |ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            let mut args = ctx.args();
            let a: u32 = args.read()?;
            let b: u32 = args.read()?;
            ctx.reply_with(a + b)
        })
        .method("Jam", |_| {
            Err(MethodError::new("com.example.Error.Jammed", "lid is stuck"))
        })
}

/// Test: an unknown member is answered with UnknownMethod
#[tokio::test]
async fn test_unknown_method() {
    let pair = BusPair::new();
    let _object = export_box(&pair, box_interface());
    let proxy = pair.proxy();

    let err = proxy
        .invoke_method(proxy.method_call(BOX_INTERFACE, "Frobnicate"))
        .await
        .unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_METHOD));
}

/// Test: an unknown interface is answered with UnknownInterface
#[tokio::test]
async fn test_unknown_interface() {
    let pair = BusPair::new();
    let _object = export_box(&pair, box_interface());
    let proxy = pair.proxy();

    let err = proxy
        .invoke_method(proxy.method_call("com.example.Crate", "Open"))
        .await
        .unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_INTERFACE));
}

/// Test: a path nobody exported is answered by the connection itself
#[tokio::test]
async fn test_unknown_object() {
    let pair = BusPair::new();
    let _object = export_box(&pair, box_interface());
    let stray = ObjectProxy::new(
        pair.client.clone(),
        ObjectPath::new("/nowhere").unwrap(),
        Some(SERVICE.to_string()),
    )
    .unwrap();

    let err = stray
        .invoke_method(stray.method_call(BOX_INTERFACE, "Add"))
        .await
        .unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_OBJECT));
}

/// Test: a call without interface goes to the first interface that has the member
#[tokio::test]
async fn test_call_without_interface() {
    let pair = BusPair::new();
    let first = InterfaceAdaptor::builder("com.example.First")
        .method("Which", |ctx| ctx.reply_with("first".to_string()));
    let second = InterfaceAdaptor::builder("com.example.Second")
        .method("Which", |ctx| ctx.reply_with("second".to_string()))
        .method("Only", |ctx| ctx.reply_with("second".to_string()));
    let _object = ObjectAdaptor::builder(pair.server.clone(), box_path())
        .interface(first)
        .interface(second)
        .build()
        .unwrap();
    let proxy = pair.proxy();

    let reply = proxy.invoke_method(CallMessage::new("Which")).await.unwrap();
    assert_eq!(reply.reader().read::<String>().unwrap(), "first");

    let reply = proxy.invoke_method(CallMessage::new("Only")).await.unwrap();
    assert_eq!(reply.reader().read::<String>().unwrap(), "second");

    let err = proxy.invoke_method(CallMessage::new("Nothing")).await.unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_METHOD));
}

/// Test: handler errors keep their name and message
#[tokio::test]
async fn test_handler_error_reply() {
    let pair = BusPair::new();
    let _object = export_box(&pair, counting_interface(Arc::new(AtomicU64::new(0))));
    let proxy = pair.proxy();

    let err = proxy
        .invoke_method(proxy.method_call(BOX_INTERFACE, "Jam"))
        .await
        .unwrap_err();
    match err {
        dbus_object::ObjectError::Method(e) => {
            assert_eq!(e.name(), "com.example.Error.Jammed");
            assert_eq!(e.message(), "lid is stuck");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // wrong argument types never reach the arithmetic
    let err = proxy
        .interface(BOX_INTERFACE)
        .call("Add", vec![Value::from("one"), Value::from("two")])
        .await
        .unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::INVALID_ARGS));
}

/// Test: many concurrent callers each get their own reply
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls() {
    const NUM_CALLERS: u32 = 64;

    let pair = BusPair::new();
    let calls = Arc::new(AtomicU64::new(0));
    let _object = export_box(&pair, counting_interface(calls.clone()));
    let proxy = pair.proxy();
    let stats = Arc::new(ConcurrentStats::new());

    let futures = (0..NUM_CALLERS).map(|i| {
        let proxy = proxy.clone();
        let stats = stats.clone();
        async move {
            let started = Instant::now();
            let call = proxy
                .method_call(BOX_INTERFACE, "Add")
                .with_arg(i)
                .with_arg(1000u32);
            match proxy.invoke_method(call).await {
                Ok(reply) => {
                    assert_eq!(reply.reader().read::<u32>().unwrap(), i + 1000);
                    stats.record_success(started);
                }
                Err(e) => {
                    eprintln!("Caller {} failed: {}", i, e);
                    stats.record_failure();
                }
            }
        }
    });
    join_all(futures).await;

    assert_eq!(stats.successes(), NUM_CALLERS as u64);
    assert_eq!(stats.failures(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), NUM_CALLERS as u64);
    assert_eq!(
        pair.client.stats().snapshot().replies_matched,
        NUM_CALLERS as u64
    );
    println!("Max latency: {:?}", stats.max_latency());
}

/// Test: a call flagged no-reply runs but is never answered
#[tokio::test]
async fn test_no_reply_call() {
    let pair = BusPair::new();
    let calls = Arc::new(AtomicU64::new(0));
    let _object = export_box(&pair, counting_interface(calls.clone()));
    let proxy = pair.proxy();

    proxy
        .invoke_method_noreply(
            proxy
                .method_call(BOX_INTERFACE, "Add")
                .with_arg(1u32)
                .with_arg(2u32),
        )
        .unwrap();
    let reply = proxy
        .invoke_method(
            proxy
                .method_call(BOX_INTERFACE, "Add")
                .with_arg(3u32)
                .with_arg(4u32),
        )
        .await
        .unwrap();
    assert_eq!(reply.reader().read::<u32>().unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(pair.client.stats().snapshot().replies_matched, 1);
}
