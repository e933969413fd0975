use crate::actors::worker::WorkerHandle;
use crate::config::{LaunchConfig, Paths};
use crate::error::{Error, Result};
use crate::job::{Job, JobSpec};
use crate::lifecycle::Event;
use crate::reporter::CompletionReporter;
use crate::spool::LogSpool;
use crate::supervisor;
use crate::types::JobId;
use std::{
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{info, warn};

/// Process-wide table of every job admitted since startup.
///
/// Records are never removed. A job's id is its index, so ids are dense and follow the
/// order of admission.
pub struct JobRegistry {
    jobs: Mutex<Vec<Arc<Job>>>,
    // serializes admissions across the runner launch; `jobs` is never held that long
    admission: tokio::sync::Mutex<()>,
    spool: LogSpool,
    paths: Paths,
    launch: LaunchConfig,
    reporter: Arc<dyn CompletionReporter>,
}

impl JobRegistry {
    pub fn new(
        paths: Paths,
        launch: LaunchConfig,
        reporter: Arc<dyn CompletionReporter>,
    ) -> io::Result<Self> {
        let spool = LogSpool::new(&paths.job_log_dir)?;
        Ok(Self {
            jobs: Mutex::new(Vec::new()),
            admission: tokio::sync::Mutex::new(()),
            spool,
            paths,
            launch,
            reporter,
        })
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Admit a job and launch its runner.
    ///
    /// The returned job is already `Running`. If the runner cannot be launched nothing is
    /// admitted and the next id stays free.
    pub async fn admit(&self, spec: JobSpec) -> Result<Arc<Job>> {
        let _admission = self.admission.lock().await;
        let id = self.lock().len() as JobId;
        let work_dir = self.paths.work_dir(&spec.token)?;
        let (log_file, log) = self.spool.open_for_job(id)?;

        let runner = match supervisor::spawn(
            &self.launch.program,
            &spec.workflow_path,
            spec.input.clone(),
            &work_dir,
            log_file,
            self.launch.signals,
        ) {
            Ok(runner) => runner,
            Err(err) => {
                warn!(job_id = id, workflow = %spec.workflow_path, error = %err, "runner launch failed");
                log.discard();
                return Err(err);
            }
        };

        let (worker, inbox) = WorkerHandle::channel();
        let job = Arc::new(Job::new(id, spec, work_dir, log, self.launch.tail, worker));
        job.commit(Event::Launch, None, None);
        WorkerHandle::start(inbox, Arc::clone(&job), runner, Arc::clone(&self.reporter));
        self.lock().push(Arc::clone(&job));

        info!(
            job_id = id,
            workflow = %job.workflow_path(),
            owner = job.owner(),
            log = %job.log_path().display(),
            "job admitted"
        );
        Ok(job)
    }

    pub fn get(&self, id: JobId) -> Result<Arc<Job>> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.lock().get(index).cloned())
            .ok_or(Error::NotFound(id))
    }

    /// Every job admitted so far, in id order.
    pub fn list(&self) -> Vec<Arc<Job>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Job>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
