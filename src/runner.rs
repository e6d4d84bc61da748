//! Process execution for the real host
//!
//! [`SystemRunner`] is the only place that spawns processes. Everything else
//! describes commands as [`Invocation`]s and hands them to a [`Runner`].

use anyhow::{Context, Result};
use declarative::{CommandOutput, Invocation, Runner};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs invocations as child processes, one at a time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        cmd
    }

    fn run_interactive(invocation: &Invocation) -> Result<CommandOutput> {
        let mut child = Self::command(invocation)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to execute: {invocation}"))?;

        match wait_with_timeout(&mut child, invocation.timeout)
            .with_context(|| format!("Failed to wait for: {invocation}"))?
        {
            Some(status) => Ok(CommandOutput {
                success: status.success(),
                ..CommandOutput::default()
            }),
            None => Ok(CommandOutput::timeout()),
        }
    }

    fn run_piped(invocation: &Invocation) -> Result<CommandOutput> {
        let mut child = Self::command(invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute: {invocation}"))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = wait_with_timeout(&mut child, invocation.timeout)
            .with_context(|| format!("Failed to wait for: {invocation}"))?;

        let stdout = join(stdout);
        let stderr = join(stderr);

        Ok(match status {
            Some(status) => CommandOutput {
                stdout,
                stderr,
                success: status.success(),
                timed_out: false,
            },
            None => CommandOutput {
                stdout,
                stderr,
                ..CommandOutput::timeout()
            },
        })
    }
}

impl Runner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        log::debug!("Running: {}", invocation);
        let output = if invocation.interactive {
            Self::run_interactive(invocation)
        } else {
            Self::run_piped(invocation)
        }?;

        if output.timed_out {
            log::warn!("Timed out: {}", invocation);
        } else if !output.success {
            log::debug!("Exited unsuccessfully: {}", invocation);
        }
        Ok(output)
    }
}

/// Read a pipe to the end on its own thread so the child never blocks on a full buffer
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Wait for `child`, killing it once `timeout` elapses.
///
/// Returns `None` when the child was killed.
fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return Ok(Some(child.wait()?));
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Check if a command exists on PATH
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}
