//! Job states and the transition table that governs them.
//!
//! Every state change a job goes through is looked up here; the worker actor
//! only performs the side effects (signals, output binding) that a returned
//! [`Transition`] asks for.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Accepted but not launched yet. Never visible once admission returns.
    Admitted,
    Running,
    Paused,
    Canceled,
    Success,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Canceled | JobState::Success | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A lifecycle request from a client. Doubles as the kind of signal sent to the runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Pause,
    Resume,
    Cancel,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown action `{0}`, expected one of pause, resume, cancel")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Action::Pause),
            "resume" => Ok(Action::Resume),
            "cancel" => Ok(Action::Cancel),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// How the reaper judged a finished runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    /// Zero exit status and a loadable output document.
    Success,
    /// Non-zero exit, unloadable output, or a wait error.
    Failure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Launch,
    Request(Action),
    Reaped(Exit),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub to: JobState,
    /// Signals to deliver to the runner, in order.
    pub signals: &'static [Action],
}

impl Transition {
    const fn to(to: JobState) -> Self {
        Self { to, signals: &[] }
    }

    const fn signalling(to: JobState, signals: &'static [Action]) -> Self {
        Self { to, signals }
    }
}

/// Look up the transition for `event` in state `from`.
///
/// `None` means the event is not legal in that state and must be ignored.
pub fn transition(from: JobState, event: Event) -> Option<Transition> {
    use self::Action::*;
    use self::JobState::*;
    let next = match (from, event) {
        (Admitted, Event::Launch) => Transition::to(Running),
        (Running, Event::Request(Pause)) => Transition::signalling(Paused, &[Pause]),
        (Paused, Event::Request(Resume)) => Transition::signalling(Running, &[Resume]),
        (Running, Event::Request(Cancel)) => Transition::signalling(Canceled, &[Cancel]),
        // a stopped group has to be woken up before it can act on the cancel
        (Paused, Event::Request(Cancel)) => Transition::signalling(Canceled, &[Resume, Cancel]),
        (Running | Paused, Event::Reaped(Exit::Success)) => Transition::to(Success),
        (Running | Paused, Event::Reaped(Exit::Failure)) => Transition::to(Failed),
        (Canceled, Event::Reaped(_)) => Transition::to(Canceled),
        _ => return None,
    };
    Some(next)
}
