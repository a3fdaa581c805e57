//! Deferred replies
//!
//! A handler that cannot answer right away parks its call in the
//! [`ContinuationTable`] under a caller chosen [`ContinuationTag`] and gets a
//! [`Continuation`] back. The continuation can be moved to any task or
//! thread; completing it sends exactly one reply correlated to the parked
//! call and removes the entry.
//!
//! Each entry carries a generation. A handle only completes the generation it
//! was issued for, so a stale handle can never answer a newer call that
//! reused the same tag.
//!
//! The return body lives on the parked entry. Values appended through a
//! handle are staged on it and folded into the entry when the handle is
//! dropped, so a payload written in the handler survives completion through
//! a handle found later by tag.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};
use dbus_core::{
    CallMessage, Connection, ErrorMessage, MessageWriter, MethodError, ReturnMessage, Value,
};
use crate::error::{ObjectError, Result};

/// Caller chosen, non-zero identifier of a deferred call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContinuationTag(NonZeroU64);

impl ContinuationTag {
    /// `None` for zero
    pub fn new(tag: u64) -> Option<Self> {
        NonZeroU64::new(tag).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ContinuationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

struct PendingCall {
    generation: u64,
    conn: Arc<dyn Connection>,
    call: CallMessage,
    reply: ReturnMessage,
}

/// Tag -> parked call
pub struct ContinuationTable {
    entries: Mutex<HashMap<ContinuationTag, PendingCall>>,
    next_generation: AtomicU64,
}

impl ContinuationTable {
    /// Create a new, empty table
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Park `call` under `tag`
    pub fn defer(
        self: &Arc<Self>,
        tag: ContinuationTag,
        conn: Arc<dyn Connection>,
        call: &CallMessage,
    ) -> Result<Continuation> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&tag) {
            warn!("Continuation {} is already pending", tag);
            return Err(ObjectError::DuplicateTag(tag));
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            tag,
            PendingCall {
                generation,
                conn,
                call: call.clone(),
                reply: ReturnMessage::new(call),
            },
        );
        debug!(
            "Deferred {} serial={} as continuation {}",
            call.member().unwrap_or_default(),
            call.serial(),
            tag
        );
        Ok(Continuation {
            table: self.clone(),
            tag,
            generation,
            staged: Vec::new(),
        })
    }

    /// Handle for a live entry
    pub fn find(self: &Arc<Self>, tag: ContinuationTag) -> Option<Continuation> {
        let entries = self.entries.lock();
        entries.get(&tag).map(|pending| Continuation {
            table: self.clone(),
            tag,
            generation: pending.generation,
            staged: Vec::new(),
        })
    }

    pub fn contains(&self, tag: ContinuationTag) -> bool {
        self.entries.lock().contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry parked for `call`, returning how many were dropped
    pub fn cancel_call(&self, call: &CallMessage) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, p| !same_call(&p.call, call));
        before - entries.len()
    }

    fn take(&self, tag: ContinuationTag, generation: u64) -> Option<PendingCall> {
        let mut entries = self.entries.lock();
        match entries.get(&tag) {
            Some(pending) if pending.generation == generation => entries.remove(&tag),
            _ => None,
        }
    }

    /// Append `values` to the parked return; `false` when the entry is gone
    fn stage(&self, tag: ContinuationTag, generation: u64, values: Vec<Value>) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&tag) {
            Some(pending) if pending.generation == generation => {
                let mut writer = pending.reply.writer();
                for value in values {
                    writer.append_value(value);
                }
                true
            }
            _ => false,
        }
    }
}

impl Default for ContinuationTable {
    fn default() -> Self {
        Self::new()
    }
}

fn same_call(a: &CallMessage, b: &CallMessage) -> bool {
    a.serial() == b.serial() && a.sender() == b.sender()
}

/// Handle to a parked call
///
/// Completing it consumes the handle. Completing an entry that is no longer
/// live, through a second handle from
/// [`ObjectAdaptor::find_continuation`](crate::ObjectAdaptor::find_continuation),
/// sends nothing and reports [`ObjectError::ContinuationNotFound`].
pub struct Continuation {
    table: Arc<ContinuationTable>,
    tag: ContinuationTag,
    generation: u64,
    staged: Vec<Value>,
}

impl Continuation {
    /// Tag the call was parked under
    pub fn tag(&self) -> ContinuationTag {
        self.tag
    }

    /// Writer over the unsent return
    ///
    /// Values written here follow anything already parked on the entry.
    pub fn writer(&mut self) -> MessageWriter<'_> {
        MessageWriter::new(&mut self.staged)
    }

    pub(crate) fn belongs_to(&self, table: &Arc<ContinuationTable>) -> bool {
        Arc::ptr_eq(&self.table, table)
    }

    fn complete(&self) -> Result<PendingCall> {
        self.table.take(self.tag, self.generation).ok_or_else(|| {
            error!("Continuation {} completed twice or never deferred", self.tag);
            ObjectError::ContinuationNotFound(self.tag)
        })
    }

    /// Send the return built through [`writer`](Self::writer)
    pub fn return_now(mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let PendingCall {
            conn, call, mut reply, ..
        } = self.complete()?;
        if call.no_reply_expected() {
            return Ok(());
        }
        {
            let mut writer = reply.writer();
            for value in staged {
                writer.append_value(value);
            }
        }
        debug!("Completing continuation {}", self.tag);
        conn.send(reply.into())?;
        Ok(())
    }

    /// Answer the parked call with an error instead
    pub fn return_error(mut self, err: MethodError) -> Result<()> {
        self.staged.clear();
        let pending = self.complete()?;
        if pending.call.no_reply_expected() {
            return Ok(());
        }
        debug!("Failing continuation {}: {}", self.tag, err);
        pending
            .conn
            .send(ErrorMessage::new(&pending.call, &err).into())?;
        Ok(())
    }
}

impl Drop for Continuation {
    fn drop(&mut self) {
        if self.staged.is_empty() {
            return;
        }
        let staged = std::mem::take(&mut self.staged);
        if !self.table.stage(self.tag, self.generation, staged) {
            trace!("Discarding staged values for finished continuation {}", self.tag);
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("tag", &self.tag)
            .field("generation", &self.generation)
            .finish()
    }
}
