//! Launching, signalling and reaping workflow runner processes.

use crate::error::{Error, Result};
use crate::lifecycle::Action;
use crate::types::OutputBlob;
use bytes::BytesMut;
use nix::{
    errno::Errno,
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use std::{
    fs::File,
    io,
    path::Path,
    process::{ExitStatus, Stdio},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, Command},
    task::JoinHandle,
};
use tracing::{debug, warn};

/// Which signal each lifecycle request delivers to the runner's process group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalPlan {
    pub pause: Signal,
    pub resume: Signal,
    pub cancel: Signal,
}

impl Default for SignalPlan {
    fn default() -> Self {
        Self {
            pause: Signal::SIGTSTP,
            resume: Signal::SIGCONT,
            // the runner treats a quit as an abort request
            cancel: Signal::SIGQUIT,
        }
    }
}

impl SignalPlan {
    pub fn signal_for(&self, kind: Action) -> Signal {
        match kind {
            Action::Pause => self.pause,
            Action::Resume => self.resume,
            Action::Cancel => self.cancel,
        }
    }
}

/// Sends lifecycle signals to one runner's process group.
#[derive(Clone, Copy, Debug)]
pub struct Signaller {
    group: Pid,
    plan: SignalPlan,
}

impl Signaller {
    /// Deliver `kind`. A group that no longer exists counts as delivered.
    pub fn signal(&self, kind: Action) -> io::Result<()> {
        match killpg(self.group, self.plan.signal_for(kind)) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

/// What a finished runner left behind.
#[derive(Debug)]
pub struct RunnerExit {
    pub stdout: OutputBlob,
    pub status: ExitStatus,
}

/// A live runner process.
///
/// The runner leads its own process group so that signals reach anything it forks.
#[derive(Debug)]
pub struct Runner {
    child: Child,
    signaller: Signaller,
    stdout: JoinHandle<io::Result<OutputBlob>>,
}

/// Launch `{program} {workflow} -` in `cwd`.
///
/// `stdin_bytes` is written to the runner's stdin, which is closed afterwards. Stdout is
/// collected in full, stderr is appended to `log_file`.
pub fn spawn(
    program: &str,
    workflow: &str,
    stdin_bytes: OutputBlob,
    cwd: &Path,
    log_file: File,
    plan: SignalPlan,
) -> Result<Runner> {
    if !cwd.is_dir() {
        return Err(Error::Spawn(format!(
            "working directory {} does not exist",
            cwd.display()
        )));
    }
    let mut child = Command::new(program)
        .arg(workflow)
        .arg("-")
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::from(log_file))
        .process_group(0)
        .spawn()
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::Spawn(format!("runner `{program}` not found")),
            _ => Error::Spawn(format!("runner `{program}`: {err}")),
        })?;
    let pid = child
        .id()
        .ok_or_else(|| Error::Spawn(format!("runner `{program}` vanished on launch")))?;
    let signaller = Signaller {
        group: Pid::from_raw(pid as i32),
        plan,
    };

    // feed stdin, then drop it so the runner sees end of input
    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            if let Err(err) = stdin.write_all(&stdin_bytes).await {
                debug!(pid, error = %err, "runner stopped reading its input early");
            }
        });
    }

    let stdout = child.stdout.take();
    let stdout = tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(4096);
        if let Some(mut stdout) = stdout {
            loop {
                buf.reserve(4096);
                if stdout.read_buf(&mut buf).await? == 0 {
                    break;
                }
            }
        }
        Ok(buf.freeze())
    });

    Ok(Runner {
        child,
        signaller,
        stdout,
    })
}

impl Runner {
    pub fn signaller(&self) -> Signaller {
        self.signaller
    }

    /// Collect everything the runner wrote to stdout, then reap it.
    ///
    /// The leader is reaped only after stdout is closed, also by anything it forked, so the
    /// group id stays reserved for as long as this future is pending. Consumes the runner,
    /// so it can be reaped only once.
    pub async fn wait(mut self) -> io::Result<RunnerExit> {
        let stdout = match self.stdout.await {
            Ok(Ok(stdout)) => stdout,
            Ok(Err(err)) => {
                warn!(error = %err, "failed to read runner stdout");
                OutputBlob::new()
            }
            Err(err) => {
                warn!(error = %err, "runner stdout reader died");
                OutputBlob::new()
            }
        };
        let status = self.child.wait().await?;
        Ok(RunnerExit { stdout, status })
    }
}
