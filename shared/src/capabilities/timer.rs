use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crux_core::capability::{CapabilityContext, Operation};

/// Handle for a shell-side timer. Ids are never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Single source of timer ids for the whole model, so the undo controller and
/// the toast queue never hand out the same handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerIdSource {
    last: u64,
}

impl TimerIdSource {
    pub fn next_id(&mut self) -> TimerId {
        self.last += 1;
        TimerId(self.last)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerOperation {
    /// One-shot timer. Resolves with `Fired` after `millis`, or with
    /// `Cleared` if the shell drops it because of a `Cancel`.
    Start { id: TimerId, millis: u64 },
    /// Clears a scheduled `Start`. Fire-and-forget.
    Cancel { id: TimerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerOutput {
    Fired(TimerId),
    Cleared(TimerId),
}

impl TimerOutput {
    pub fn id(&self) -> TimerId {
        match self {
            TimerOutput::Fired(id) | TimerOutput::Cleared(id) => *id,
        }
    }
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

#[derive(crux_core::macros::Capability)]
pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Timer<Ev> {
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Timer<Ev>
where
    Ev: Send + 'static,
{
    pub fn start<F>(&self, id: TimerId, after: Duration, callback: F)
    where
        F: FnOnce(TimerOutput) -> Ev + Send + 'static,
    {
        let millis = u64::try_from(after.as_millis()).unwrap_or(u64::MAX);
        let context = self.context.clone();
        self.context.spawn(async move {
            let output = context
                .request_from_shell(TimerOperation::Start { id, millis })
                .await;
            context.update_app(callback(output));
        });
    }

    pub fn cancel(&self, id: TimerId) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(TimerOperation::Cancel { id }).await;
        });
    }
}
