// Bounded external command execution for device probes
//
// The child never outlives the call: on timeout it is killed and reaped.
// stderr goes to the null device so tool diagnostics never reach our output.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::COMMAND_POLL_INTERVAL_MS;
use crate::error::{CamwatchError, Result};

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Run `cmd` to completion or until `timeout` elapses.
///
/// The deadline covers both the child's exit and the end of its stdout. A
/// grandchild that inherited the pipe cannot hold the caller past it: the
/// reader thread is abandoned and finishes on its own once the pipe closes.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let timed_out = || {
        CamwatchError::Probe(format!("{} timed out after {}ms", program, timeout.as_millis()))
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd
        .spawn()
        .map_err(|e| CamwatchError::Probe(format!("Failed to start {}: {}", program, e)))?;

    let mut stdout = match child.stdout.take() {
        Some(out) => out,
        None => {
            kill_and_reap(&mut child);
            return Err(CamwatchError::Probe(format!("{}: stdout not captured", program)));
        }
    };

    // Drain stdout on a helper thread so a chatty child cannot block on a full pipe
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                kill_and_reap(&mut child);
                return Err(timed_out());
            }
            Ok(None) => thread::sleep(Duration::from_millis(COMMAND_POLL_INTERVAL_MS)),
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(e.into());
            }
        }
    };

    let remaining = deadline
        .saturating_duration_since(Instant::now())
        .max(Duration::from_millis(COMMAND_POLL_INTERVAL_MS));
    let stdout = match rx.recv_timeout(remaining) {
        Ok(buf) => buf,
        Err(mpsc::RecvTimeoutError::Timeout) => return Err(timed_out()),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            return Err(CamwatchError::Probe(format!("{}: stdout reader panicked", program)))
        }
    };

    Ok(CommandOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
    })
}

/// Like run_with_timeout, but a non-zero exit is an error.
pub fn run_checked(cmd: Command, timeout: Duration) -> Result<String> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let output = run_with_timeout(cmd, timeout)?;
    if !output.status.success() {
        return Err(CamwatchError::Probe(format!(
            "{} exited with {}",
            program,
            output.status.code().unwrap_or(-1)
        )));
    }
    Ok(output.stdout)
}
