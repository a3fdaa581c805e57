//! Properties Tests - Remote Get, Set and GetAll
//!
//! These tests go through `org.freedesktop.DBus.Properties` end to end:
//! - Uninitialized, missing and typed values
//! - Change notifications observed by a proxy
//! - Observers that adjust values on the way in
//! - Interfaces backed by a custom property provider

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use common::*;
use dbus_core::{names, MethodError, Signature, Variant};
use dbus_object::{
    ExportedObject, InterfaceAdaptor, ObjectAdaptor, PropertiesProxy, PropertyAccess,
    PropertyDict, PropertyObserver, PropertyProvider,
};

/// Test: the Box walkthrough, from uninitialized size to GetAll
#[tokio::test]
async fn test_box_size_walkthrough() {
    let pair = BusPair::new();
    let _object = export_box(&pair, box_interface());
    let props = PropertiesProxy::new(pair.proxy());

    let err = props.get(BOX_INTERFACE, "size").await.unwrap_err();
    match err {
        dbus_object::ObjectError::Method(e) => {
            assert_eq!(e.name(), names::FAILED);
            assert_eq!(e.message(), "requested property has not been initialized");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    props.set(BOX_INTERFACE, "size", Variant::new(5u32)).await.unwrap();
    assert_eq!(props.get_as::<u32>(BOX_INTERFACE, "size").await.unwrap(), 5);

    let all = props.get_all(BOX_INTERFACE).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all["size"], Variant::new(5u32));
}

/// Test: missing interfaces and properties have distinct errors
#[tokio::test]
async fn test_missing_targets() {
    let pair = BusPair::new();
    let _object = export_box(&pair, box_interface());
    let props = PropertiesProxy::new(pair.proxy());

    let err = props.get("com.example.Crate", "size").await.unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_INTERFACE));

    let err = props.get(BOX_INTERFACE, "weight").await.unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_PROPERTY));

    let err = props.get_all("com.example.Crate").await.unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_INTERFACE));
}

/// Test: rejected writes leave the stored value alone
#[tokio::test]
async fn test_rejected_writes() {
    let pair = BusPair::new();
    let interface = box_interface().property(
        "label",
        Signature::of::<String>(),
        PropertyAccess::Read,
        Some(Variant::new("crate".to_string())),
    );
    let _object = export_box(&pair, interface);
    let props = PropertiesProxy::new(pair.proxy());

    props.set(BOX_INTERFACE, "size", Variant::new(5u32)).await.unwrap();

    let err = props
        .set(BOX_INTERFACE, "size", Variant::new("large".to_string()))
        .await
        .unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::INVALID_SIGNATURE));

    let err = props
        .set(BOX_INTERFACE, "label", Variant::new("other".to_string()))
        .await
        .unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::PROPERTY_READ_ONLY));

    assert_eq!(props.get_as::<u32>(BOX_INTERFACE, "size").await.unwrap(), 5);
    assert_eq!(props.get_as::<String>(BOX_INTERFACE, "label").await.unwrap(), "crate");
}

/// Test: a successful Set is announced to proxies
#[tokio::test]
async fn test_properties_changed_reaches_proxy() {
    let pair = BusPair::new();
    let _object = export_box(&pair, box_interface());
    let props = PropertiesProxy::new(pair.proxy());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    props.on_properties_changed(move |event| {
        let _ = tx.send(event.clone());
    });

    props.set(BOX_INTERFACE, "size", Variant::new(9u32)).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.interface, BOX_INTERFACE);
    assert_eq!(event.changed.len(), 1);
    assert_eq!(event.changed["size"], Variant::new(9u32));
    assert!(event.invalidated.is_empty());
}

/// Caps sizes at 100 and remembers what it saw
#[derive(Default)]
struct CappingObserver {
    log: Mutex<Vec<String>>,
}

impl PropertyObserver for CappingObserver {
    fn on_get_property(&self, _interface: &str, property: &str, value: &Variant) {
        self.log.lock().push(format!("get {} {:?}", property, value.get::<u32>().ok()));
    }

    fn on_set_property(&self, _interface: &str, property: &str, value: &mut Variant) {
        if let Ok(size) = value.get::<u32>() {
            if size > 100 {
                *value = Variant::new(100u32);
            }
        }
        self.log.lock().push(format!("set {}", property));
    }
}

/// Test: the observer can rewrite a value before it is stored
#[tokio::test]
async fn test_observer_adjusts_value() {
    let pair = BusPair::new();
    let observer = Arc::new(CappingObserver::default());
    let _object = ObjectAdaptor::builder(pair.server.clone(), box_path())
        .interface(box_interface())
        .observer(observer.clone())
        .build()
        .unwrap();
    let props = PropertiesProxy::new(pair.proxy());

    props.set(BOX_INTERFACE, "size", Variant::new(500u32)).await.unwrap();
    assert_eq!(props.get_as::<u32>(BOX_INTERFACE, "size").await.unwrap(), 100);

    let log = observer.log.lock().clone();
    assert_eq!(log, vec!["set size".to_string(), "get size Some(100)".to_string()]);
}

/// Read-only temperature computed on demand
struct Thermometer {
    celsius: Mutex<i32>,
}

impl PropertyProvider for Thermometer {
    fn get_property(&self, name: &str) -> Result<Option<Variant>, MethodError> {
        Ok(match name {
            "celsius" => Some(Variant::new(*self.celsius.lock())),
            "fahrenheit" => Some(Variant::new(*self.celsius.lock() * 9 / 5 + 32)),
            _ => None,
        })
    }

    fn set_property(&self, name: &str, _value: Variant) -> Result<(), MethodError> {
        match name {
            "celsius" | "fahrenheit" => Err(MethodError::property_read_only(format!(
                "{} is measured, not set",
                name
            ))),
            _ => Err(MethodError::unknown_property("requested property not found")),
        }
    }

    fn get_all_properties(&self) -> PropertyDict {
        ["celsius", "fahrenheit"]
            .into_iter()
            .filter_map(|name| {
                self.get_property(name)
                    .ok()
                    .flatten()
                    .map(|value| (name.to_string(), value))
            })
            .collect()
    }
}

/// Test: an interface can serve properties from its own provider
#[tokio::test]
async fn test_custom_provider() {
    let pair = BusPair::new();
    let thermometer = Arc::new(Thermometer {
        celsius: Mutex::new(20),
    });
    let interface = InterfaceAdaptor::builder("com.example.Thermometer").properties(thermometer.clone());
    let object = ObjectAdaptor::builder(pair.server.clone(), box_path())
        .interface(interface)
        .build()
        .unwrap();
    let props = PropertiesProxy::new(pair.proxy());

    assert_eq!(props.get_as::<i32>("com.example.Thermometer", "fahrenheit").await.unwrap(), 68);
    *thermometer.celsius.lock() = 100;
    let all = props.get_all("com.example.Thermometer").await.unwrap();
    assert_eq!(all["celsius"], Variant::new(100i32));
    assert_eq!(all["fahrenheit"], Variant::new(212i32));

    let err = props
        .set("com.example.Thermometer", "celsius", Variant::new(0i32))
        .await
        .unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::PROPERTY_READ_ONLY));

    // the overlay stays reachable until the object is unregistered
    object.unregister_obj();
    let err = props.get("com.example.Thermometer", "celsius").await.unwrap_err();
    assert_eq!(remote_error_name(&err), Some(names::UNKNOWN_OBJECT));
}
