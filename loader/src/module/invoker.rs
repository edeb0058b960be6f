//! Entry point invocation.

use super::resolver::ResolvedEntry;
use log::debug;
use std::any::Any;
use std::ffi::{CStr, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Message used when a failing entry point leaves the slot empty.
const NO_MESSAGE: &str = "no message";

/// Errors raised by the entry point itself.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// The entry point returned a non-zero status.
    #[error("entry point {symbol} failed with status {status}: {message}")]
    Failed {
        /// Symbol that was called.
        symbol: String,
        /// Status the entry point returned.
        status: i32,
        /// Message the entry point reported.
        message: String,
    },

    /// The entry point panicked within this process's runtime.
    #[error("entry point {symbol} panicked: {message}")]
    Panicked {
        /// Symbol that was called.
        symbol: String,
        /// Panic payload rendered as text.
        message: String,
    },
}

/// Call the entry point and interpret its status.
///
/// On success, returns `None` when the entry point left the message slot
/// null and the slot's string otherwise, decoded lossily as UTF-8.
///
/// # Errors
///
/// Returns [`InvocationError::Failed`] for a non-zero status and
/// [`InvocationError::Panicked`] when the call unwinds.
pub fn invoke(entry: ResolvedEntry<'_>) -> Result<Option<String>, InvocationError> {
    let symbol = &entry.candidate.symbol_name;
    debug!("invoking {symbol}");

    let function = entry.entry;
    let mut slot: *const c_char = ptr::null();
    // SAFETY: resolved symbols follow the `EntryFn` contract and `slot` is
    // valid for writes for the duration of the call.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| unsafe { function(&raw mut slot) }));
    let status = outcome.map_err(|payload| InvocationError::Panicked {
        symbol: symbol.clone(),
        message: panic_message(payload.as_ref()),
    })?;

    // SAFETY: a non-null slot is a NUL-terminated string owned by the
    // artefact, which is never unloaded.
    let text = unsafe { read_slot(slot) };
    debug!("{symbol} returned status {status}");
    if status != 0 {
        return Err(InvocationError::Failed {
            symbol: symbol.clone(),
            status,
            message: text.unwrap_or_else(|| NO_MESSAGE.to_owned()),
        });
    }
    Ok(text)
}

unsafe fn read_slot(slot: *const c_char) -> Option<String> {
    if slot.is_null() {
        return None;
    }
    // SAFETY: upheld by the caller.
    let text = unsafe { CStr::from_ptr(slot) };
    Some(text.to_string_lossy().into_owned())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
