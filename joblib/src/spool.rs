//! Per-job log files: one writer (the runner's stderr), any number of tailing readers.

use crate::types::{JobId, OutputBlob};
use futures::{stream, Stream};
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::io::AsyncReadExt;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_POLL: Duration = Duration::from_secs(1);

/// Allocates log files for new jobs inside one directory.
#[derive(Clone, Debug)]
pub struct LogSpool {
    dir: PathBuf,
}

impl LogSpool {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Create a fresh log file for job `id`.
    ///
    /// Returns the append-mode writer to hand to the runner and a source for readers.
    /// Ids restart with the process, so file names also carry a random suffix.
    pub fn open_for_job(&self, id: JobId) -> io::Result<(File, LogSource)> {
        let path = self
            .dir
            .join(format!("job-{id}-{}.log", Uuid::new_v4().simple()));
        let writer = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)?;
        Ok((writer, LogSource { path }))
    }
}

/// Opens independent readers on one job's log file.
#[derive(Clone, Debug)]
pub struct LogSource {
    path: PathBuf,
}

impl LogSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    /// The whole log as text. Invalid UTF-8 is replaced.
    pub async fn read_to_string(&self) -> io::Result<String> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Remove a log that never got a job attached to it.
    pub(crate) fn discard(self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to remove unused log file");
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TailOptions {
    pub chunk_size: usize,
    /// How long to sleep after reading nothing from a live job.
    pub poll: Duration,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll: DEFAULT_POLL,
        }
    }
}

/// Follow a log file until its job is done.
///
/// Yields chunks of at most `chunk_size` bytes from an independent file position. When a
/// read comes back empty the sequence ends if `finished` held before that read,
/// otherwise it sleeps for `poll` and tries again. `finished` must only turn true once
/// nothing writes to the file any more; it is sampled before reading so bytes written
/// ahead of that point are never dropped.
pub fn tail<F>(
    source: LogSource,
    options: TailOptions,
    finished: F,
) -> impl Stream<Item = io::Result<OutputBlob>> + Send + 'static
where
    F: Fn() -> bool + Send + 'static,
{
    let tailer = Tailer {
        source,
        file: None,
        options,
        finished,
    };
    stream::unfold(Some(tailer), |state| async move {
        let mut tailer = state?;
        match tailer.next_chunk().await {
            Ok(Some(chunk)) => Some((Ok(chunk), Some(tailer))),
            Ok(None) => None,
            // an error ends the sequence after it is reported
            Err(err) => Some((Err(err), None)),
        }
    })
}

struct Tailer<F> {
    source: LogSource,
    file: Option<tokio::fs::File>,
    options: TailOptions,
    finished: F,
}

impl<F: Fn() -> bool> Tailer<F> {
    async fn next_chunk(&mut self) -> io::Result<Option<OutputBlob>> {
        if self.file.is_none() {
            self.file = Some(self.source.open().await?);
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };
        let mut buf = vec![0; self.options.chunk_size.max(1)];
        loop {
            let finished = (self.finished)();
            let n = file.read(&mut buf).await?;
            if n > 0 {
                buf.truncate(n);
                return Ok(Some(OutputBlob::from(buf)));
            }
            if finished {
                return Ok(None);
            }
            tokio::time::sleep(self.options.poll).await;
        }
    }
}
