//! Sample extension module for the loader's integration tests.
//!
//! Every entry point follows the loader's status convention: it returns zero
//! on success and may write a NUL-terminated string to `out`. A non-zero
//! status marks a failure and the string, if any, is the error message.
//! Panics never cross the boundary; [`demo_guarded`] shows the conversion.

use std::ffi::{CStr, c_char, c_int};
use std::panic;

/// Version of the module's data layout, exported as a data symbol.
#[unsafe(no_mangle)]
pub static DEMO_SCHEMA: c_int = 1;

/// Write `text` to `out` when the slot is present.
///
/// # Safety
///
/// `out` must be null or valid for writes.
unsafe fn reply(out: *mut *const c_char, text: &'static CStr) {
    if !out.is_null() {
        // SAFETY: upheld by the caller.
        unsafe { *out = text.as_ptr() };
    }
}

/// Default entry point.
///
/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn main(out: *mut *const c_char) -> c_int {
    // SAFETY: upheld by the caller.
    unsafe { reply(out, c"hello from demo") };
    0
}

/// Entry point resolved by exact name.
///
/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn greet(out: *mut *const c_char) -> c_int {
    // SAFETY: upheld by the caller.
    unsafe { reply(out, c"greetings from demo") };
    0
}

/// Entry point that always fails with status 2.
///
/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn demo_fail(out: *mut *const c_char) -> c_int {
    // SAFETY: upheld by the caller.
    unsafe { reply(out, c"disk quota exceeded") };
    2
}

/// Entry point whose body panics; the panic is reported as status 3.
///
/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn demo_guarded(out: *mut *const c_char) -> c_int {
    match panic::catch_unwind(|| -> c_int { panic!("boom") }) {
        Ok(status) => status,
        Err(_) => {
            // SAFETY: upheld by the caller.
            unsafe { reply(out, c"entry panicked: boom") };
            3
        }
    }
}

/// Private helper that must never be picked as a public callable.
///
/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn _demo_private(_out: *mut *const c_char) -> c_int {
    0
}
