//! In-process loading, entry resolution, and invocation of artefacts.
//!
//! - [`loader`] - Load a native artefact and enumerate its exports
//! - [`resolver`] - Cascading entry point resolution
//! - [`invoker`] - Call a resolved entry point and capture its outcome

use std::ffi::{c_char, c_int};

pub mod invoker;
pub mod loader;
pub mod resolver;

/// Signature every entry point exported by an artefact must have.
///
/// The function receives a pointer to a message slot, initially null, and
/// returns a status. Zero means success, and a non-null slot then holds the
/// result. Any other status is a failure, and a non-null slot then holds the
/// error message. Strings are NUL-terminated UTF-8 owned by the artefact.
///
/// Failures must be reported through the status: an artefact carries its own
/// runtime, so a panic or exception escaping it aborts the process.
pub type EntryFn = unsafe extern "C-unwind" fn(out: *mut *const c_char) -> c_int;
