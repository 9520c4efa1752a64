// src/plugin/process.rs

//! OS process plumbing shared by the invoker and the ELT runners.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::plugin::invoker::ProcessHandle;

/// Build a shell command appropriate for the platform.
///
/// On Unix the shell leads its own process group, so signals sent with
/// [`signal_group`] also reach whatever the shell started.
pub fn shell_command(cmdline: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmdline);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmdline);
        #[cfg(unix)]
        c.process_group(0);
        c
    }
}

/// Send `signal` to the process group led by `child`.
///
/// A group that is already gone is not an error.
#[cfg(unix)]
pub fn signal_group(child: &Child, signal: nix::sys::signal::Signal) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pgid = i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| anyhow!("process id {pid} out of range"))?;

    match killpg(pgid, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(anyhow!("sending {signal} to process group {pid}: {e}")),
    }
}

/// Ask `child` (and its process group on Unix) to shut down.
fn send_terminate(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        signal_group(child, nix::sys::signal::Signal::SIGTERM)
    }
    #[cfg(not(unix))]
    {
        child.start_kill().map_err(Into::into)
    }
}

/// Quote a single argument for [`shell_command`].
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ','));
    if plain {
        arg.to_string()
    } else if cfg!(windows) {
        format!("\"{}\"", arg.replace('"', "\"\""))
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Consume a child output stream line by line, logging at debug.
///
/// Keeps OS pipe buffers from filling up for processes whose output nobody
/// reads.
pub fn drain_lines<R>(stream: R, plugin: String, label: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let reader = BufReader::new(stream);
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(plugin = %plugin, "{label}: {line}");
        }
    });
}

/// Wait for a child to exit, optionally bounded by `timeout`.
///
/// On timeout the child is killed and an error is returned.
pub async fn wait_bounded(
    child: &mut Child,
    timeout: Option<Duration>,
    what: &str,
) -> Result<ExitStatus> {
    match timeout {
        None => child
            .wait()
            .await
            .with_context(|| format!("waiting for {what}")),
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status.with_context(|| format!("waiting for {what}")),
            Err(_) => {
                #[cfg(unix)]
                if let Err(e) = signal_group(child, nix::sys::signal::Signal::SIGKILL) {
                    warn!(error = %e, "failed to kill process group of {what} after timeout");
                }
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill {what} after timeout");
                }
                Err(anyhow!("{what} did not finish within {limit:?}"))
            }
        },
    }
}

/// Turn a non-zero exit status into an error.
pub fn ensure_success(status: ExitStatus, what: &str) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "{what} exited with code {}",
            status.code().unwrap_or(-1)
        ))
    }
}

/// A running plugin process launched by [`CommandInvoker`].
///
/// [`CommandInvoker`]: crate::plugin::CommandInvoker
#[derive(Debug)]
pub struct ChildProcess {
    plugin: String,
    command: String,
    pid: Option<u32>,
    child: Option<Child>,
}

impl ChildProcess {
    /// Spawn `cmd` with piped output drained into the logs.
    pub fn spawn(mut cmd: Command, plugin: &str, command: &str) -> Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{command}' for plugin '{plugin}'"))?;

        if let Some(stdout) = child.stdout.take() {
            drain_lines(stdout, plugin.to_string(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            drain_lines(stderr, plugin.to_string(), "stderr");
        }

        let pid = child.id();
        info!(plugin = %plugin, command = %command, pid, "plugin process started");

        Ok(Self {
            plugin: plugin.to_string(),
            command: command.to_string(),
            pid,
            child: Some(child),
        })
    }
}

impl ProcessHandle for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Send SIGTERM to the process group and return immediately.
    ///
    /// The exit status is collected by a background reaper task. On
    /// platforms without signals the process is killed instead.
    fn terminate(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            debug!(plugin = %self.plugin, command = %self.command, "process already terminated");
            return Ok(());
        };

        send_terminate(&mut child)
            .with_context(|| format!("terminating '{}' of plugin '{}'", self.command, self.plugin))?;

        let plugin = self.plugin.clone();
        let command = self.command.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match child.wait().await {
                        Ok(status) => info!(
                            plugin = %plugin,
                            command = %command,
                            exit_code = status.code().unwrap_or(-1),
                            "plugin process exited"
                        ),
                        Err(e) => warn!(
                            plugin = %plugin,
                            command = %command,
                            error = %e,
                            "failed to reap plugin process"
                        ),
                    }
                });
            }
            Err(_) => {
                debug!(plugin = %plugin, command = %command, "no runtime to reap process; dropping handle");
            }
        }

        Ok(())
    }
}
