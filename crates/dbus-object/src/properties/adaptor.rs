//! Server side of the Properties interface

use std::sync::Arc;
use tracing::{debug, warn};
use dbus_core::{MethodError, Variant};
use crate::adaptor::{CallContext, InterfaceAdaptor, InterfaceBuilder, MethodResult, Reply};
use crate::introspection::IntrospectedArgument;
use crate::properties::PropertyDict;

pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Hooks around remote property access
///
/// `on_get_property` sees the value about to be returned. `on_set_property`
/// sees the proposed value before the interface stores it and may adjust it.
pub trait PropertyObserver: Send + Sync {
    fn on_get_property(&self, _interface: &str, _property: &str, _value: &Variant) {}

    fn on_set_property(&self, _interface: &str, _property: &str, _value: &mut Variant) {}
}

/// The Properties interface every object carries
pub struct PropertiesAdaptor;

impl PropertiesAdaptor {
    /// The standard Properties interface with Get, Set and GetAll
    pub fn interface() -> InterfaceBuilder {
        InterfaceAdaptor::builder(PROPERTIES_INTERFACE)
            .method_with_args(
                "Get",
                vec![
                    IntrospectedArgument::input::<String>("interface_name"),
                    IntrospectedArgument::input::<String>("property_name"),
                    IntrospectedArgument::output::<Variant>("value"),
                ],
                Self::get,
            )
            .method_with_args(
                "Set",
                vec![
                    IntrospectedArgument::input::<String>("interface_name"),
                    IntrospectedArgument::input::<String>("property_name"),
                    IntrospectedArgument::input::<Variant>("value"),
                ],
                Self::set,
            )
            .method_with_args(
                "GetAll",
                vec![
                    IntrospectedArgument::input::<String>("interface_name"),
                    IntrospectedArgument::output::<PropertyDict>("properties"),
                ],
                Self::get_all,
            )
            .signal(
                "PropertiesChanged",
                vec![
                    IntrospectedArgument::output::<String>("interface_name"),
                    IntrospectedArgument::output::<PropertyDict>("changed_properties"),
                    IntrospectedArgument::output::<Vec<String>>("invalidated_properties"),
                ],
            )
    }

    fn target<'a>(ctx: &CallContext<'a>, name: &str) -> Result<&'a Arc<InterfaceAdaptor>, MethodError> {
        ctx.find_interface(name)
            .ok_or_else(|| MethodError::unknown_interface("requested interface not found"))
    }

    fn get(ctx: &CallContext<'_>) -> MethodResult {
        let mut args = ctx.args();
        let interface_name: String = args.read()?;
        let property_name: String = args.read()?;
        debug!("Requesting property {} on interface {}", property_name, interface_name);

        let interface = Self::target(ctx, &interface_name)?;
        let value = interface
            .get_property(&property_name)?
            .ok_or_else(|| MethodError::unknown_property("requested property not found"))?;
        if value.signature().is_empty() {
            return Err(MethodError::failed("requested property has not been initialized"));
        }

        if let Some(observer) = ctx.object().observer() {
            observer.on_get_property(&interface_name, &property_name, &value);
        }
        ctx.reply_with(value)
    }

    fn set(ctx: &CallContext<'_>) -> MethodResult {
        let mut args = ctx.args();
        let interface_name: String = args.read()?;
        let property_name: String = args.read()?;
        let mut value: Variant = args.read()?;
        debug!("Setting property {} on interface {}", property_name, interface_name);

        let interface = Self::target(ctx, &interface_name)?;
        if let Some(observer) = ctx.object().observer() {
            observer.on_set_property(&interface_name, &property_name, &mut value);
        }
        interface.set_property(&property_name, value.clone())?;

        if ctx.object().config().emit_properties_changed {
            let mut changed = PropertyDict::new();
            changed.insert(property_name, value);
            if let Err(e) = ctx.object().properties_changed(&interface_name, changed, Vec::new()) {
                warn!("Failed to emit PropertiesChanged for {}: {}", interface_name, e);
            }
        }
        Ok(Reply::Return(ctx.reply()))
    }

    fn get_all(ctx: &CallContext<'_>) -> MethodResult {
        let interface_name: String = ctx.args().read()?;
        let interface = Self::target(ctx, &interface_name)?;
        ctx.reply_with(interface.get_all_properties())
    }
}
