//! Vorto loader CLI entrypoint.
//!
//! Resolves configuration, then either prints the dry-run plan or runs the
//! full acquisition pipeline. The entry point's result goes to stdout;
//! progress and errors go to stderr.

use clap::Parser;
use std::io::Write;
use vorto_loader::cli::Cli;
use vorto_loader::config::ConfigFile;
use vorto_loader::dirs::SystemBaseDirs;
use vorto_loader::error::Result;
use vorto_loader::output::{PlanReport, success_message, write_stderr_line};
use vorto_loader::pipeline::{plan_for_host, run_pipeline};

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let file = ConfigFile::load(cli.config.as_deref(), &SystemBaseDirs)?;
    let config = cli.resolve_config(file)?;

    if cli.dry_run {
        let plan = plan_for_host(&config)?;
        let report = PlanReport::new(
            &plan,
            &config.transport.retry_chain,
            &config.resolver.entry_name,
        );
        let text = if cli.json {
            report.to_json()?
        } else {
            report.display_text()
        };
        write_stdout_line(stdout, text);
        return Ok(());
    }

    let outcome = run_pipeline(&config, cli.quiet, stderr)?;
    if let Some(result) = &outcome.result {
        write_stdout_line(stdout, result);
    }
    if !cli.quiet {
        write_stderr_line(stderr, success_message(&outcome));
    }
    Ok(())
}

/// Map the run result to a process exit code, reporting any error.
fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            if err.is_soft_failure() {
                write_stderr_line(stderr, format!("warning: {err}"));
            } else {
                write_stderr_line(stderr, format!("error: {err}"));
            }
            1
        }
    }
}

fn write_stdout_line(stdout: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stdout, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}
