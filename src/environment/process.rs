//! Subprocess helpers shared by the provisioners

use crate::core::CommandOutput;
use std::collections::HashSet;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Bytes of each output stream kept in memory; older output is dropped
pub(crate) const OUTPUT_LIMIT: usize = 64 * 1024;

/// Process groups of commands that are still running
#[derive(Debug, Clone, Default)]
pub(crate) struct ProcessGroups {
    live: Arc<Mutex<HashSet<u32>>>,
}

impl ProcessGroups {
    fn insert(&self, pgid: u32) {
        if let Ok(mut live) = self.live.lock() {
            live.insert(pgid);
        }
    }

    fn remove(&self, pgid: u32) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(&pgid);
        }
    }

    /// Kill every group still registered
    pub(crate) fn kill_all(&self) {
        let groups: Vec<u32> = match self.live.lock() {
            Ok(mut live) => live.drain().collect(),
            Err(_) => return,
        };
        for pgid in groups {
            debug!("Killing leftover process group {}", pgid);
            kill_group(pgid);
        }
    }
}

/// Kills the command's process group when dropped, unless disarmed
struct GroupGuard<'a> {
    pgid: Option<u32>,
    groups: Option<&'a ProcessGroups>,
}

impl<'a> GroupGuard<'a> {
    fn new(pgid: Option<u32>, groups: Option<&'a ProcessGroups>) -> Self {
        if let (Some(pgid), Some(groups)) = (pgid, groups) {
            groups.insert(pgid);
        }
        Self { pgid, groups }
    }

    /// The command exited on its own
    fn disarm(mut self) {
        if let (Some(pgid), Some(groups)) = (self.pgid.take(), self.groups) {
            groups.remove(pgid);
        }
    }
}

impl Drop for GroupGuard<'_> {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
            if let Some(groups) = self.groups {
                groups.remove(pgid);
            }
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    // SAFETY: kill(2) with a negative pid only signals the group
    let rc = unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!("Failed to kill process group {}: {}", pgid, err);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Run a prepared command, killing it if it exceeds `limit`
pub(crate) async fn run(command: Command, limit: Option<Duration>) -> io::Result<CommandOutput> {
    run_tracked(command, limit, None).await
}

/// Run a prepared command in its own process group
///
/// The whole group is killed when the command times out or the returned
/// future is dropped (for example on cancellation), so processes the command
/// forked die with it. While the command runs its group is registered in
/// `groups`. Only the last [`OUTPUT_LIMIT`] bytes of each stream are kept.
pub(crate) async fn run_tracked(
    mut command: Command,
    limit: Option<Duration>,
    groups: Option<&ProcessGroups>,
) -> io::Result<CommandOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn()?;
    let group = GroupGuard::new(child.id(), groups);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let finished = async {
        let (status, stdout, stderr) = tokio::join!(child.wait(), read_tail(stdout), read_tail(stderr));
        Ok::<_, io::Error>(CommandOutput {
            // killed by a signal
            exit_code: status?.code().unwrap_or(-1),
            stdout: stdout?,
            stderr: stderr?,
            timed_out: false,
        })
    };

    let output = match limit {
        Some(limit) => match timeout(limit, finished).await {
            Ok(output) => output?,
            Err(_) => {
                debug!("Command exceeded {}s, killed", limit.as_secs());
                drop(group);
                let _ = child.wait().await;
                return Ok(CommandOutput::timed_out());
            }
        },
        None => finished.await?,
    };

    group.disarm();
    Ok(output)
}

/// Read a stream to the end, keeping at most [`OUTPUT_LIMIT`] trailing bytes
async fn read_tail<R: AsyncRead + Unpin>(reader: Option<R>) -> io::Result<String> {
    let Some(mut reader) = reader else {
        return Ok(String::new());
    };

    let mut tail = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        tail.extend_from_slice(&chunk[..n]);
        if tail.len() > 2 * OUTPUT_LIMIT {
            tail.drain(..tail.len() - OUTPUT_LIMIT);
            truncated = true;
        }
    }
    if tail.len() > OUTPUT_LIMIT {
        tail.drain(..tail.len() - OUTPUT_LIMIT);
        truncated = true;
    }

    // start at a line boundary after dropping output
    let start = if truncated {
        tail.iter().position(|&b| b == b'\n').map_or(0, |i| i + 1)
    } else {
        0
    };
    Ok(String::from_utf8_lossy(&tail[start..]).into_owned())
}
