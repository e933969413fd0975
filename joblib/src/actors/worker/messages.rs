use crate::lifecycle::Action;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum WorkerMessage {
    /// Apply a lifecycle request. The reply fires once the record reflects it.
    Control {
        action: Action,
        response: oneshot::Sender<()>,
    },
}
