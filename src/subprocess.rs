//! Shared subprocess execution: spawns a command in its own process group
//! and, on timeout, terminates the whole group rather than just the
//! immediate child. `Command::kill_on_drop` alone only reaches the direct
//! child; a hung compiler driver that has already forked `cc1`/`as`/`ld`,
//! or a reducer that has forked a helper, leaves those grandchildren
//! running and free to race the next invocation over the shared scratch
//! files.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Outcome of running a command to completion or to its timeout. A failure
/// to spawn the process at all (bad executable path, missing exec bit, ...)
/// is not represented here — it surfaces as the `Err` of the outer
/// `std::io::Result`, distinct from both of these so callers don't mistake
/// a broken configuration for an observed timeout.
pub enum Outcome {
    Completed(std::process::Output),
    TimedOut,
}

/// Runs `command` to completion, or kills it and its whole process group
/// once `timeout` elapses.
pub async fn run_with_timeout(mut command: Command, timeout: Duration) -> std::io::Result<Outcome> {
    command.process_group(0);
    command.kill_on_drop(true);
    let mut child = command.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
    let pid = child.id();

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(Outcome::Completed(output)),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid).await;
            }
            Ok(Outcome::TimedOut)
        }
    }
}

/// Sends `SIGTERM` to the process group `pid` leads, waits briefly for
/// graceful exit, then follows up with `SIGKILL`. A negative pid targets
/// the whole group rather than just that one process.
async fn kill_process_group(pid: u32) {
    let _ = Command::new("kill")
        .arg("-TERM")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let _ = Command::new("kill")
        .arg("-KILL")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}
