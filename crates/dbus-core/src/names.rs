//! Well-known bus names and error names

/// Name used as sender for errors generated by the bus router itself
pub const BUS_NAME: &str = "org.freedesktop.DBus";

pub const FAILED: &str = "org.freedesktop.DBus.Error.Failed";
pub const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
pub const TIMEOUT: &str = "org.freedesktop.DBus.Error.Timeout";
pub const DISCONNECTED: &str = "org.freedesktop.DBus.Error.Disconnected";
pub const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
pub const UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
pub const UNKNOWN_INTERFACE: &str = "org.freedesktop.DBus.Error.UnknownInterface";
pub const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
pub const UNKNOWN_PROPERTY: &str = "org.freedesktop.DBus.Error.UnknownProperty";
pub const PROPERTY_READ_ONLY: &str = "org.freedesktop.DBus.Error.PropertyReadOnly";
pub const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
pub const INVALID_SIGNATURE: &str = "org.freedesktop.DBus.Error.InvalidSignature";
pub const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";
