use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

/// Submit and manage workflow jobs on a job server
#[derive(Debug, Parser)]
pub struct ArgParser {
    /// Base URL of the server
    #[clap(short = 's', long = "server", env = "JOBSERVER", default_value = DEFAULT_SERVER)]
    pub server: String,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum SubCommand {
    /// submit a workflow run
    Submit {
        #[clap(long)]
        /// path of the workflow file, as seen by the server
        wf: String,

        #[clap(long)]
        /// data type forwarded with the finalize notification
        data_type: String,

        #[clap(long, env = "JOBSERVER_TOKEN")]
        /// session token; names the working directory on the server
        token: String,

        #[clap(long)]
        /// numeric owner id
        owner: Option<i64>,

        #[clap(long)]
        /// display name, defaults to "Job <id>"
        name: Option<String>,

        #[clap(long)]
        /// input document; read from stdin when omitted
        input: Option<PathBuf>,
    },
    /// list every job
    List,
    /// get a job's status
    Status { job_id: u64 },
    /// suspend a running job
    Pause { job_id: u64 },
    /// continue a paused job
    Resume { job_id: u64 },
    /// cancel a job
    Cancel { job_id: u64 },
    /// stream a job's log until it finishes
    Log { job_id: u64 },
}
