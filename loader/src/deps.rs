//! External command execution.
//!
//! The loader shells out in two places: probing the runtime interpreter for
//! its version, and the last-resort `curl`/`wget` download strategies. Both
//! go through [`CommandExecutor`] so tests can replay canned outputs.

use std::process::{Command, Output};

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, including [`std::io::ErrorKind::NotFound`] when the program
    /// is not installed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vorto_loader::deps::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("curl", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), std::io::Error>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> std::io::Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> std::io::Result<Output> {
        Command::new(cmd).args(args).output()
    }
}
