use crate::error::{Error, Result};
use crate::spool::TailOptions;
use crate::supervisor::SignalPlan;
use crate::types::Program;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_RUNNER: &str = "cwl-runner";

/// Filesystem locations the registry works in.
#[derive(Clone, Debug)]
pub struct Paths {
    /// Parent of every per-session working directory.
    pub tmp_root: PathBuf,
    /// Where per-job log spool files are allocated.
    pub job_log_dir: PathBuf,
}

impl Paths {
    /// Lay out the default directories below `tmp_root`.
    pub fn under(tmp_root: impl Into<PathBuf>) -> Self {
        let tmp_root = tmp_root.into();
        let job_log_dir = tmp_root.join("joblogs");
        Self {
            tmp_root,
            job_log_dir,
        }
    }

    /// The directory a runner for `token` executes in: `{tmp_root}/{token}`.
    ///
    /// The directory itself is created by the web tier, not here.
    pub fn work_dir(&self, token: &str) -> Result<PathBuf> {
        let mut components = Path::new(token).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.tmp_root.join(token)),
            _ => Err(Error::Spawn(format!(
                "token `{token}` does not name a working directory"
            ))),
        }
    }
}

/// How runners are launched and how their logs are followed.
#[derive(Clone, Debug)]
pub struct LaunchConfig {
    pub program: Program,
    pub signals: SignalPlan,
    pub tail: TailOptions,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_RUNNER.to_string(),
            signals: SignalPlan::default(),
            tail: TailOptions::default(),
        }
    }
}
