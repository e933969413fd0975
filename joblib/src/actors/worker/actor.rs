use super::messages::WorkerMessage;
use crate::error::Error;
use crate::job::Job;
use crate::lifecycle::{Action, Event, Exit, JobState};
use crate::output;
use crate::reporter::CompletionReporter;
use crate::supervisor::{Runner, RunnerExit, Signaller};
use crate::ERROR_LOG_TARGET;

use std::{io, sync::Arc};
use tokio::{select, sync::mpsc};
use tracing::{debug, error, info, warn};

pub struct Actor {
    inbox: mpsc::UnboundedReceiver<WorkerMessage>,
    job: Arc<Job>,
    signaller: Signaller,
    reporter: Arc<dyn CompletionReporter>,
}

impl Actor {
    pub fn spawn(
        inbox: mpsc::UnboundedReceiver<WorkerMessage>,
        job: Arc<Job>,
        runner: Runner,
        reporter: Arc<dyn CompletionReporter>,
    ) {
        let actor = Self {
            inbox,
            job,
            signaller: runner.signaller(),
            reporter,
        };
        tokio::spawn(async move { actor.run(runner).await });
    }

    async fn run(mut self, runner: Runner) {
        // `exit` reaps the leader as its last step, so while a message branch runs the
        // leader is unreaped (possibly a zombie) and its group id cannot have been recycled
        let exit = runner.wait();
        tokio::pin!(exit);
        let exit = loop {
            select! {
                Some(msg) = self.inbox.recv() => self.handle_message(msg),
                exit = &mut exit => break exit,
            }
        };
        self.reap(exit).await;
    }

    fn handle_message(&mut self, msg: WorkerMessage) {
        use WorkerMessage::*;
        match msg {
            Control { action, response } => {
                self.apply(action);
                let _ = response.send(());
            }
        }
    }

    fn apply(&self, action: Action) {
        let job_id = self.job.id();
        let event = Event::Request(action);
        let Some(plan) = self.job.plan(event) else {
            debug!(job_id, ?action, state = %self.job.state(), "ignoring lifecycle request");
            return;
        };
        for &kind in plan.signals {
            if let Err(err) = self.signaller.signal(kind) {
                warn!(job_id, signal = ?kind, error = %err, "failed to signal runner");
                return;
            }
        }
        self.job.commit(event, None, None);
        info!(job_id, ?action, state = %plan.to, "lifecycle request applied");
    }

    async fn reap(self, exit: io::Result<RunnerExit>) {
        let job_id = self.job.id();
        let outcome = match exit {
            Ok(exit) if exit.status.success() => output::parse_document(&exit.stdout),
            Ok(exit) => Err(Error::RunnerFailure(exit.status)),
            Err(err) => Err(Error::Io(err)),
        };
        let log = self.job.read_log().await;
        let (verdict, doc, failure) = match outcome {
            Ok(doc) => (Exit::Success, Some(doc), None),
            Err(err) => (Exit::Failure, None, Some(err)),
        };

        let Some(transition) = self
            .job
            .commit(Event::Reaped(verdict), doc, Some(log.clone()))
        else {
            warn!(job_id, state = %self.job.state(), "runner reaped in a state with no exit edge");
            return;
        };

        match transition.to {
            JobState::Success => {
                info!(job_id, "job succeeded");
                self.finalize();
            }
            JobState::Failed => {
                let reason = failure.map(|err| err.to_string()).unwrap_or_default();
                error!(target: ERROR_LOG_TARGET, job_id, %reason, %log, "job failed");
            }
            state => info!(job_id, %state, "runner reaped"),
        }
    }

    /// Notify the metadata service without holding up the worker.
    fn finalize(self) {
        let Self { job, reporter, .. } = self;
        tokio::spawn(async move {
            let status = job.status().await;
            if let Err(err) = reporter.report(job.token(), job.data_type(), &status).await {
                error!(target: ERROR_LOG_TARGET, job_id = job.id(), error = %err, "finalize failed");
            }
        });
    }
}
