//! Box Service Demo
//!
//! Starts an in-memory bus, exports a Box object at `/t` and drives it from
//! a proxy on a second connection.
//!
//! USAGE:
//!   box-service [OPTIONS]
//!
//! EXAMPLES:
//!   box-service                          # Default size and delay
//!   box-service --size 12 --delay-ms 50  # Custom values
//!   box-service --verbose                # Show dispatch logging

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dbus_core::{names, Bus, Connection, MethodError, ObjectPath, Signature, Value, Variant};
use dbus_object::{
    ContinuationTag, InterfaceAdaptor, InterfaceBuilder, ObjectAdaptor, ObjectError, ObjectProxy,
    PropertiesProxy, PropertyAccess, Reply,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const SERVICE: &str = "com.example.BoxService";
const BOX_INTERFACE: &str = "com.example.Box";

#[derive(Parser, Debug)]
#[command(name = "box-service")]
#[command(version)]
#[command(about = "Exports a Box object and exercises it through a proxy")]
struct Args {
    /// Size written through the Properties interface
    #[arg(long, default_value_t = 5)]
    size: u32,

    /// Delay before a deferred Resize is answered
    #[arg(long, default_value_t = 10)]
    delay_ms: u64,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

/// `com.example.Box`: a `size` property and a `Resize` method answered later
fn box_interface(delay: Duration) -> InterfaceBuilder {
    let next_tag = Arc::new(AtomicU64::new(1));
    InterfaceAdaptor::builder(BOX_INTERFACE)
        .property("size", Signature::of::<u32>(), PropertyAccess::ReadWrite, None)
        .method("Resize", move |ctx| {
            let size: u32 = ctx.args().read()?;
            let tag = ContinuationTag::new(next_tag.fetch_add(1, Ordering::Relaxed))
                .ok_or_else(|| MethodError::failed("continuation tags exhausted"))?;
            let interface = ctx.interface().clone();
            let mut continuation = ctx.return_later(tag)?;
            info!("Resize to {} parked as {}", size, tag);

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let previous = interface
                    .get_property("size")
                    .ok()
                    .flatten()
                    .and_then(|v| v.get::<u32>().ok())
                    .unwrap_or_default();
                let outcome = match interface.set_property("size", Variant::new(size)) {
                    Ok(()) => {
                        continuation.writer().append(previous);
                        continuation.return_now()
                    }
                    Err(e) => continuation.return_error(e),
                };
                if let Err(e) = outcome {
                    warn!("Could not answer Resize: {}", e);
                }
            });
            Ok(Reply::Later)
        })
}

async fn run(args: Args) -> Result<(), ObjectError> {
    let bus = Bus::new();
    let server = bus.connect();
    let client = bus.connect();
    server.spawn()?;
    client.spawn()?;
    server.request_name(SERVICE)?;
    let path = ObjectPath::new("/t")?;

    let object = ObjectAdaptor::builder(server.clone(), path.clone())
        .service(SERVICE)
        .interface(box_interface(Duration::from_millis(args.delay_ms)))
        .build()?;

    println!("========================================================");
    println!("                 Box Service Demo");
    println!("========================================================");
    println!("  Bus GUID:  {}", bus.guid());
    println!("  Service:   {} ({})", SERVICE, server.unique_name());
    println!("  Client:    {}", client.unique_name());
    println!("  Object:    {}", path);
    for interface in object.introspect() {
        println!("  Interface: {}", interface.name);
    }
    println!("========================================================");

    let proxy = ObjectProxy::new(client.clone(), path, Some(SERVICE.to_string()))?;
    let props = PropertiesProxy::new(proxy.clone());
    props.on_properties_changed(|event| {
        info!("PropertiesChanged on {}: {:?}", event.interface, event.changed.keys());
    });

    match props.get(BOX_INTERFACE, "size").await {
        Err(ObjectError::Method(e)) => println!("[GET]    size -> {} ({})", e.name(), e.message()),
        other => println!("[GET]    size -> {:?}", other),
    }

    props.set(BOX_INTERFACE, "size", Variant::new(args.size)).await?;
    println!("[SET]    size = {}", args.size);
    println!("[GET]    size -> {}", props.get_as::<u32>(BOX_INTERFACE, "size").await?);

    let reply = proxy
        .interface(BOX_INTERFACE)
        .call("Resize", vec![Value::UInt32(args.size * 2)])
        .await?;
    let previous: u32 = reply.reader().read()?;
    println!(
        "[CALL]   Resize({}) answered after {}ms, previous size {}",
        args.size * 2,
        args.delay_ms,
        previous
    );

    let all = props.get_all(BOX_INTERFACE).await?;
    for (name, value) in &all {
        println!("[GETALL] {} = {:?}", name, value.value());
    }

    match proxy
        .invoke_method(proxy.method_call(BOX_INTERFACE, "Frobnicate"))
        .await
    {
        Err(ObjectError::Method(e)) if e.name() == names::UNKNOWN_METHOD => {
            println!("[CALL]   Frobnicate -> {}", e.message());
        }
        other => warn!("Unexpected Frobnicate outcome: {:?}", other),
    }

    let stats = server.stats().snapshot();
    println!("========================================================");
    println!(
        "  Server: {} calls dispatched, {} messages sent",
        stats.calls_dispatched, stats.messages_sent
    );
    let stats = client.stats().snapshot();
    println!(
        "  Client: {} replies matched, {} signals dispatched",
        stats.replies_matched, stats.signals_dispatched
    );
    println!("========================================================");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    run(args).await?;
    Ok(())
}
