mod actor;
mod messages;

use crate::job::Job;
use crate::lifecycle::Action;
use crate::reporter::CompletionReporter;
use crate::supervisor::Runner;
use actor::Actor;
use messages::WorkerMessage;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Handle to the worker that owns one job's runner.
///
/// The worker is the job's lifecycle controller and reaper: it is the only task that
/// signals the runner or writes the job record. The handle only forwards requests.
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    sender: mpsc::UnboundedSender<WorkerMessage>,
}

/// The receiving side of a [`WorkerHandle`], consumed when the worker starts.
#[derive(Debug)]
pub struct WorkerInbox(mpsc::UnboundedReceiver<WorkerMessage>);

impl WorkerHandle {
    /// Create a handle before the job it belongs to exists.
    pub fn channel() -> (Self, WorkerInbox) {
        let (sender, inbox) = mpsc::unbounded_channel();
        (Self { sender }, WorkerInbox(inbox))
    }

    /// Start the worker for `job`, which must already be `Running`.
    pub fn start(
        inbox: WorkerInbox,
        job: Arc<Job>,
        runner: Runner,
        reporter: Arc<dyn CompletionReporter>,
    ) {
        Actor::spawn(inbox.0, job, runner, reporter);
    }

    /// Forward `action` and wait until the worker has dealt with it.
    ///
    /// Returns straight away if the worker is gone, i.e. the job is already finished.
    pub async fn control(&self, action: Action) {
        let (response, done) = oneshot::channel();
        if self
            .sender
            .send(WorkerMessage::Control { action, response })
            .is_ok()
        {
            let _ = done.await;
        }
    }
}
