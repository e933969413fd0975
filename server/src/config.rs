//! Server configuration, resolved once at startup.
//!
//! Only `OMICSSERVER` and `DATADIR` come from the environment; everything else is a
//! compiled default.

use joblib::config::{LaunchConfig, Paths, DEFAULT_RUNNER};
use joblib::reporter::DEFAULT_FINALIZE_TIMEOUT;
use joblib::spool::TailOptions;
use joblib::supervisor::SignalPlan;
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_FINALIZE_SERVER: &str = "localhost:8080";
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address the HTTP surface binds.
    pub bind_address: String,
    /// `host:port` (or base URL) of the service that receives finalize notifications.
    pub finalize_server: String,
    pub finalize_timeout: Duration,
    /// Parent of the per-session working directories.
    pub tmp_root: PathBuf,
    /// Append-only error log. `None` keeps error events in-process.
    pub error_log: Option<PathBuf>,
    pub runner_program: String,
    pub signals: SignalPlan,
    pub tail: TailOptions,
    /// `tracing` filter for the console, e.g. `"info"` or `"debug,hyper=warn"`.
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("OMICSSERVER").ok(),
            std::env::var("DATADIR").ok(),
        )
    }

    fn resolve(finalize_server: Option<String>, data_dir: Option<String>) -> Self {
        let data_dir = data_dir.map(PathBuf::from);
        let (tmp_root, error_log) = match &data_dir {
            Some(data_dir) => (
                data_dir.join("tmp"),
                Some(data_dir.join("logs").join("jobserver.log")),
            ),
            None => (PathBuf::from("/tmp"), None),
        };
        Self {
            bind_address: DEFAULT_BIND.to_owned(),
            finalize_server: finalize_server.unwrap_or_else(|| DEFAULT_FINALIZE_SERVER.to_owned()),
            finalize_timeout: DEFAULT_FINALIZE_TIMEOUT,
            tmp_root,
            error_log,
            runner_program: DEFAULT_RUNNER.to_owned(),
            signals: SignalPlan::default(),
            tail: TailOptions::default(),
            log_filter: "info".to_owned(),
        }
    }

    pub fn paths(&self) -> Paths {
        Paths::under(&self.tmp_root)
    }

    pub fn launch(&self) -> LaunchConfig {
        LaunchConfig {
            program: self.runner_program.clone(),
            signals: self.signals,
            tail: self.tail,
        }
    }
}
