//! Message model
//!
//! The four message kinds of the bus protocol share one [`Message`]
//! representation: a header carrying the routing and correlation fields and a
//! body of self-describing [`Value`]s. Typed views ([`CallMessage`],
//! [`ReturnMessage`], [`ErrorMessage`], [`SignalMessage`]) add the
//! constructors and setters that make sense for each kind.

use std::ops::Deref;
use crate::error::{Error, MethodError, Result};
use crate::types::{ObjectPath, Signature};
use crate::value::{BusType, Value};

/// Message kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Header {
    serial: u32,
    reply_serial: Option<u32>,
    path: Option<ObjectPath>,
    interface: Option<String>,
    member: Option<String>,
    error_name: Option<String>,
    destination: Option<String>,
    sender: Option<String>,
    no_reply_expected: bool,
}

/// A bus message of any kind
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    kind: MessageType,
    header: Header,
    body: Vec<Value>,
}

impl Message {
    fn new(kind: MessageType) -> Self {
        Self {
            kind,
            header: Header::default(),
            body: Vec::new(),
        }
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Serial assigned by the sending connection, 0 until sent
    pub fn serial(&self) -> u32 {
        self.header.serial
    }

    pub fn reply_serial(&self) -> Option<u32> {
        self.header.reply_serial
    }

    pub fn path(&self) -> Option<&ObjectPath> {
        self.header.path.as_ref()
    }

    pub fn interface(&self) -> Option<&str> {
        self.header.interface.as_deref()
    }

    pub fn member(&self) -> Option<&str> {
        self.header.member.as_deref()
    }

    pub fn error_name(&self) -> Option<&str> {
        self.header.error_name.as_deref()
    }

    pub fn destination(&self) -> Option<&str> {
        self.header.destination.as_deref()
    }

    pub fn sender(&self) -> Option<&str> {
        self.header.sender.as_deref()
    }

    pub fn no_reply_expected(&self) -> bool {
        self.header.no_reply_expected
    }

    /// Body signature, derived from the body values
    pub fn signature(&self) -> Signature {
        let sig: String = self
            .body
            .iter()
            .map(|v| v.signature().to_string())
            .collect();
        Signature::new_unchecked(sig)
    }

    pub fn body(&self) -> &[Value] {
        &self.body
    }

    /// Cursor over the body values
    pub fn reader(&self) -> MessageReader<'_> {
        MessageReader::new(&self.body)
    }

    pub fn set_serial(&mut self, serial: u32) {
        self.header.serial = serial;
    }

    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.header.sender = Some(sender.into());
    }

    pub fn set_destination(&mut self, destination: Option<String>) {
        self.header.destination = destination;
    }

    /// Check for a method call to `interface.member`
    pub fn is_method_call(&self, interface: &str, member: &str) -> bool {
        self.kind == MessageType::MethodCall
            && self.interface() == Some(interface)
            && self.member() == Some(member)
    }

    /// Check for a signal `interface.member`
    pub fn is_signal(&self, interface: &str, member: &str) -> bool {
        self.kind == MessageType::Signal
            && self.interface() == Some(interface)
            && self.member() == Some(member)
    }
}

macro_rules! message_view {
    ($name:ident, $kind:expr) => {
        impl Deref for $name {
            type Target = Message;

            fn deref(&self) -> &Message {
                &self.0
            }
        }

        impl From<$name> for Message {
            fn from(msg: $name) -> Message {
                msg.0
            }
        }

        impl TryFrom<Message> for $name {
            type Error = Error;

            fn try_from(msg: Message) -> Result<Self> {
                if msg.kind == $kind {
                    Ok(Self(msg))
                } else {
                    Err(Error::InvalidMessage(format!(
                        "expected {:?}, got {:?}",
                        $kind, msg.kind
                    )))
                }
            }
        }

        impl $name {
            pub fn into_message(self) -> Message {
                self.0
            }

            /// Cursor appending to the body
            pub fn writer(&mut self) -> MessageWriter<'_> {
                MessageWriter::new(&mut self.0.body)
            }
        }
    };
}

/// Method call
#[derive(Clone, Debug, PartialEq)]
pub struct CallMessage(Message);

message_view!(CallMessage, MessageType::MethodCall);

impl CallMessage {
    /// A call to `member`; path, interface and destination may be filled in later
    pub fn new(member: impl Into<String>) -> Self {
        let mut msg = Message::new(MessageType::MethodCall);
        msg.header.member = Some(member.into());
        Self(msg)
    }

    /// A fully addressed call
    pub fn method(path: ObjectPath, interface: impl Into<String>, member: impl Into<String>) -> Self {
        Self::new(member).with_path(path).with_interface(interface)
    }

    pub fn with_path(mut self, path: ObjectPath) -> Self {
        self.set_path(path);
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.set_interface(interface);
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.0.header.destination = Some(destination.into());
        self
    }

    /// Mark the call as not expecting any reply
    pub fn with_no_reply(mut self) -> Self {
        self.set_no_reply_expected(true);
        self
    }

    /// Append one argument
    pub fn with_arg<T: BusType>(mut self, arg: T) -> Self {
        self.writer().append(arg);
        self
    }

    pub fn set_path(&mut self, path: ObjectPath) {
        self.0.header.path = Some(path);
    }

    pub fn set_interface(&mut self, interface: impl Into<String>) {
        self.0.header.interface = Some(interface.into());
    }

    pub fn set_member(&mut self, member: impl Into<String>) {
        self.0.header.member = Some(member.into());
    }

    pub fn set_no_reply_expected(&mut self, no_reply: bool) {
        self.0.header.no_reply_expected = no_reply;
    }
}

/// Successful reply to a call
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnMessage(Message);

message_view!(ReturnMessage, MessageType::MethodReturn);

impl ReturnMessage {
    /// An empty return correlated to `call`
    pub fn new(call: &CallMessage) -> Self {
        let mut msg = Message::new(MessageType::MethodReturn);
        msg.header.reply_serial = Some(call.serial());
        msg.header.destination = call.header.sender.clone();
        Self(msg)
    }
}

/// Failed reply to a call
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorMessage(Message);

message_view!(ErrorMessage, MessageType::Error);

impl ErrorMessage {
    /// An error reply correlated to `call`
    pub fn new(call: &CallMessage, error: &MethodError) -> Self {
        Self::reply_to(call, error)
    }

    /// An error reply correlated to any message carrying a serial and sender
    pub fn reply_to(msg: &Message, error: &MethodError) -> Self {
        let mut reply = Message::new(MessageType::Error);
        reply.header.reply_serial = Some(msg.serial());
        reply.header.destination = msg.header.sender.clone();
        reply.header.error_name = Some(error.name().to_string());
        reply.body.push(Value::String(error.message().to_string()));
        Self(reply)
    }

    /// Recover the named error carried by this reply
    pub fn to_error(&self) -> MethodError {
        let name = self
            .error_name()
            .unwrap_or(crate::names::FAILED)
            .to_string();
        let message = match self.body.first() {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        MethodError::new(name, message)
    }
}

/// Unsolicited notification
#[derive(Clone, Debug, PartialEq)]
pub struct SignalMessage(Message);

message_view!(SignalMessage, MessageType::Signal);

impl SignalMessage {
    pub fn new(path: ObjectPath, interface: impl Into<String>, member: impl Into<String>) -> Self {
        let mut msg = Message::new(MessageType::Signal);
        msg.header.path = Some(path);
        msg.header.interface = Some(interface.into());
        msg.header.member = Some(member.into());
        Self(msg)
    }

    pub fn with_arg<T: BusType>(mut self, arg: T) -> Self {
        self.writer().append(arg);
        self
    }

    pub fn set_path(&mut self, path: ObjectPath) {
        self.0.header.path = Some(path);
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.0.header.destination = Some(destination.into());
        self
    }
}

/// Read cursor over a message body
pub struct MessageReader<'a> {
    values: &'a [Value],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self { values, pos: 0 }
    }

    /// Read the next value as `T`
    pub fn read<T: BusType>(&mut self) -> Result<T> {
        let value = self.read_value()?;
        T::from_value(value)
    }

    /// Read the next raw value
    pub fn read_value(&mut self) -> Result<Value> {
        let value = self.values.get(self.pos).ok_or(Error::UnexpectedEnd)?;
        self.pos += 1;
        Ok(value.clone())
    }

    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.pos)
    }

    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }
}

/// Append cursor over a message body
pub struct MessageWriter<'a> {
    body: &'a mut Vec<Value>,
}

impl<'a> MessageWriter<'a> {
    pub fn new(body: &'a mut Vec<Value>) -> Self {
        Self { body }
    }

    pub fn append<T: BusType>(&mut self, value: T) -> &mut Self {
        self.body.push(value.into_value());
        self
    }

    pub fn append_value(&mut self, value: Value) -> &mut Self {
        self.body.push(value);
        self
    }
}
