use crate::actors::worker::WorkerHandle;
use crate::lifecycle::{self, Action, Event, JobState, Transition};
use crate::output;
use crate::spool::{self, LogSource, TailOptions};
use crate::types::{JobId, OutputBlob, Owner, Token, WorkflowPath};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::warn;

/// Everything a client supplies when submitting a workflow.
#[derive(Clone, Debug)]
pub struct JobSpec {
    pub workflow_path: WorkflowPath,
    pub input: OutputBlob,
    pub token: Token,
    pub data_type: String,
    pub owner: Owner,
    /// Defaults to `Job <id>`.
    pub name: Option<String>,
}

/// Point-in-time view of a job, as served to clients and sent to the finalize endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub name: String,
    pub owner: Owner,
    /// The workflow path.
    pub run: String,
    pub state: JobState,
    pub input: Value,
    /// Full log contents, only once the job is terminal.
    pub log: Option<String>,
    /// Only once the job succeeded.
    pub output: Option<Value>,
}

/// Fields that change over a job's life. Only the job's worker writes them.
#[derive(Debug)]
struct Record {
    state: JobState,
    output: Option<Value>,
    log: Option<String>,
    history: Vec<JobState>,
    reaped: bool,
}

/// One admitted job.
///
/// Immutable submission data lives directly on the struct; the mutable record sits behind
/// its own mutex, which is only ever held for field copies.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    name: String,
    workflow_path: WorkflowPath,
    input: OutputBlob,
    input_doc: Value,
    owner: Owner,
    token: Token,
    data_type: String,
    work_dir: PathBuf,
    log: LogSource,
    tail: TailOptions,
    worker: WorkerHandle,
    record: Mutex<Record>,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        spec: JobSpec,
        work_dir: PathBuf,
        log: LogSource,
        tail: TailOptions,
        worker: WorkerHandle,
    ) -> Self {
        let JobSpec {
            workflow_path,
            input,
            token,
            data_type,
            owner,
            name,
        } = spec;
        Self {
            id,
            name: name.unwrap_or_else(|| format!("Job {id}")),
            workflow_path,
            input_doc: output::decode_input(&input),
            input,
            owner,
            token,
            data_type,
            work_dir,
            log,
            tail,
            worker,
            record: Mutex::new(Record {
                state: JobState::Admitted,
                output: None,
                log: None,
                history: vec![JobState::Admitted],
                reaped: false,
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workflow_path(&self) -> &str {
        &self.workflow_path
    }

    pub fn input(&self) -> &OutputBlob {
        &self.input
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn state(&self) -> JobState {
        self.lock().state
    }

    /// Every state this job has held, oldest first.
    pub fn history(&self) -> Vec<JobState> {
        self.lock().history.clone()
    }

    /// Whether the runner has been reaped.
    pub fn reaped(&self) -> bool {
        self.lock().reaped
    }

    /// Take a consistent snapshot.
    ///
    /// A terminal job whose log has not been captured yet (canceled, runner still
    /// winding down) has its log read from the spool on the spot.
    pub async fn status(&self) -> JobStatus {
        let (state, output, log) = {
            let record = self.lock();
            (record.state, record.output.clone(), record.log.clone())
        };
        let log = match log {
            Some(log) => Some(log),
            None if state.is_terminal() => Some(self.read_log().await),
            None => None,
        };
        JobStatus {
            id: self.id,
            name: self.name.clone(),
            owner: self.owner,
            run: self.workflow_path.clone(),
            state,
            input: self.input_doc.clone(),
            log,
            output,
        }
    }

    /// Ask the lifecycle controller to apply `action`, then report where the job ended up.
    ///
    /// Requests that are not legal in the current state leave the job untouched.
    pub async fn control(&self, action: Action) -> JobStatus {
        self.worker.control(action).await;
        self.status().await
    }

    /// Stream the log as it grows, ending once the runner is reaped and the log fully read.
    ///
    /// A canceled job turns terminal while its runner may still be writing.
    pub fn tail(self: &Arc<Self>) -> impl Stream<Item = io::Result<OutputBlob>> + Send + 'static {
        let job = Arc::clone(self);
        spool::tail(self.log.clone(), self.tail, move || job.reaped())
    }

    pub(crate) async fn read_log(&self) -> String {
        self.log.read_to_string().await.unwrap_or_else(|err| {
            warn!(job_id = self.id, error = %err, "failed to read job log");
            String::new()
        })
    }

    /// Apply `event` to the record if it is legal, binding `output` and `log` in the same
    /// critical section when the event is the reaper's.
    pub(crate) fn commit(
        &self,
        event: Event,
        output: Option<Value>,
        log: Option<String>,
    ) -> Option<Transition> {
        let mut record = self.lock();
        let next = lifecycle::transition(record.state, event)?;
        if next.to != record.state {
            record.state = next.to;
            record.history.push(next.to);
        }
        if let Event::Reaped(_) = event {
            record.reaped = true;
            if next.to == JobState::Success {
                record.output = output;
            }
            record.log = log;
        }
        Some(next)
    }

    /// Look up what `event` would do without applying it.
    pub(crate) fn plan(&self, event: Event) -> Option<Transition> {
        lifecycle::transition(self.lock().state, event)
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
