//! Shared test utilities for the loader crate.

use crate::deps::CommandExecutor;
use crate::module::EntryFn;
use crate::module::loader::LoadedUnit;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::{CStr, c_char, c_int};
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    success_output_with("")
}

/// Creates a successful command `Output` with the given stdout text.
pub fn success_output_with(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "curl").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: std::io::Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> std::io::Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let call = expected.pop_front().expect("unexpected command invocation");

        assert_eq!(call.cmd, cmd);
        assert_eq!(call.args.as_slice(), args);

        call.result
    }
}

/// An in-memory [`LoadedUnit`] with a scripted symbol table.
///
/// Exports are kept in insertion order, so the builder controls the
/// symbol table order seen by resolution.
#[derive(Debug, Clone, Default)]
pub struct FakeUnit {
    module_name: String,
    exports: Vec<String>,
    table: Vec<(String, EntryFn)>,
    foreign: Vec<(String, EntryFn)>,
}

impl FakeUnit {
    /// Creates an empty unit for `module_name`.
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_owned(),
            ..Self::default()
        }
    }

    /// Adds a callable export.
    #[must_use]
    pub fn with_entry(mut self, name: &str, entry: EntryFn) -> Self {
        self.exports.push(name.to_owned());
        self.table.push((name.to_owned(), entry));
        self
    }

    /// Adds an export name that cannot be looked up.
    #[must_use]
    pub fn with_export(mut self, name: &str) -> Self {
        self.exports.push(name.to_owned());
        self
    }

    /// Adds a symbol reachable only through foreign lookup.
    #[must_use]
    pub fn with_foreign(mut self, name: &str, entry: EntryFn) -> Self {
        self.foreign.push((name.to_owned(), entry));
        self
    }
}

impl LoadedUnit for FakeUnit {
    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn exports(&self) -> &[String] {
        &self.exports
    }

    fn lookup(&self, name: &str) -> Option<EntryFn> {
        find(&self.table, name)
    }

    fn foreign_lookup(&self, name: &str) -> Option<EntryFn> {
        find(&self.foreign, name)
    }
}

fn find(symbols: &[(String, EntryFn)], name: &str) -> Option<EntryFn> {
    symbols
        .iter()
        .find(|(symbol, _)| symbol == name)
        .map(|(_, entry)| *entry)
}

fn reply(out: *mut *const c_char, text: &'static CStr) {
    if !out.is_null() {
        // SAFETY: `EntryFn` callers pass a slot valid for writes.
        unsafe { *out = text.as_ptr() };
    }
}

/// Entry point returning no result.
pub extern "C-unwind" fn silent_entry(_out: *mut *const c_char) -> c_int {
    0
}

/// Entry point returning `hello from demo`.
pub extern "C-unwind" fn greeting_entry(out: *mut *const c_char) -> c_int {
    reply(out, c"hello from demo");
    0
}

/// Entry point failing with status 2 and `disk quota exceeded`.
pub extern "C-unwind" fn failing_entry(out: *mut *const c_char) -> c_int {
    reply(out, c"disk quota exceeded");
    2
}

/// Entry point failing with status -1 and no message.
pub extern "C-unwind" fn silent_failure_entry(_out: *mut *const c_char) -> c_int {
    -1
}

/// Entry point that panics with `boom`.
pub extern "C-unwind" fn panicking_entry(_out: *mut *const c_char) -> c_int {
    panic!("boom")
}
