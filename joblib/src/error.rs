use crate::types::JobId;
use std::{io, process::ExitStatus, result};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no job with id {0}")]
    NotFound(JobId),
    #[error("could not launch runner: {0}")]
    Spawn(String),
    #[error("runner exited with {0}")]
    RunnerFailure(ExitStatus),
    #[error("runner output is not a document mapping: {0}")]
    OutputParse(String),
    #[error("finalize request failed: {0}")]
    Report(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = result::Result<T, Error>;
