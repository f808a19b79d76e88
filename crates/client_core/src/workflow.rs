//! Per-workflow bookkeeping shared by every controller component: busy flag,
//! request epoch, most-recent-error slot and change notifications.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared::error::WorkflowFailure;
use tokio::sync::broadcast;

use crate::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    #[default]
    Materials,
    Upload,
    Chat,
    Test,
    Analytics,
}

impl Workflow {
    /// Chat and test operate on a material and cannot be entered without one.
    pub fn requires_material(self) -> bool {
        matches!(self, Self::Chat | Self::Test)
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Materials => "materials",
            Self::Upload => "upload",
            Self::Chat => "chat",
            Self::Test => "test",
            Self::Analytics => "analytics",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    ViewChanged(Workflow),
    BusyChanged { workflow: Workflow, busy: bool },
    Updated(Workflow),
    Failed {
        workflow: Workflow,
        failure: WorkflowFailure,
    },
}

#[derive(Clone)]
pub(crate) struct Notifier {
    events: broadcast::Sender<ControllerEvent>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self { events }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn busy(&self, workflow: Workflow, busy: bool) {
        self.emit(ControllerEvent::BusyChanged { workflow, busy });
    }

    /// Reports the outcome of a finished request: busy cleared, then either
    /// an update or the recorded failure.
    pub(crate) fn settled(&self, workflow: Workflow, failure: Option<WorkflowFailure>) {
        self.busy(workflow, false);
        match failure {
            Some(failure) => self.emit(ControllerEvent::Failed { workflow, failure }),
            None => self.emit(ControllerEvent::Updated(workflow)),
        }
    }
}

/// Proof that a request was issued at a given epoch of its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    epoch: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot<S> {
    pub state: S,
    pub busy: bool,
    pub error: Option<WorkflowFailure>,
}

#[derive(Debug)]
pub(crate) struct Slot<S> {
    workflow: Workflow,
    pub(crate) state: S,
    busy: bool,
    epoch: u64,
    error: Option<WorkflowFailure>,
}

impl<S> Slot<S> {
    pub(crate) fn new(workflow: Workflow, state: S) -> Self {
        Self {
            workflow,
            state,
            busy: false,
            epoch: 0,
            error: None,
        }
    }

    /// Issues a request ticket, rejecting while another request is outstanding.
    pub(crate) fn begin(&mut self) -> Result<Ticket, ActionError> {
        if self.busy {
            return Err(ActionError::Busy(self.workflow));
        }
        Ok(self.issue())
    }

    /// Issues a request ticket that supersedes any outstanding one.
    pub(crate) fn begin_superseding(&mut self) -> Ticket {
        self.issue()
    }

    fn issue(&mut self) -> Ticket {
        self.epoch += 1;
        self.busy = true;
        Ticket { epoch: self.epoch }
    }

    /// Drops interest in any outstanding request.
    pub(crate) fn invalidate(&mut self) {
        self.epoch += 1;
        self.busy = false;
    }

    /// Rejects a response issued under an older epoch.
    pub(crate) fn accept(&self, ticket: Ticket) -> Result<(), ActionError> {
        if ticket.epoch == self.epoch {
            Ok(())
        } else {
            tracing::debug!(
                workflow = %self.workflow,
                issued = ticket.epoch,
                current = self.epoch,
                "discarding stale response"
            );
            Err(ActionError::Superseded(self.workflow))
        }
    }

    pub(crate) fn succeed(&mut self) {
        self.busy = false;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, failure: WorkflowFailure) {
        self.busy = false;
        self.error = Some(failure);
    }
}

impl<S: Clone> Slot<S> {
    pub(crate) fn snapshot(&self) -> WorkflowSnapshot<S> {
        WorkflowSnapshot {
            state: self.state.clone(),
            busy: self.busy,
            error: self.error.clone(),
        }
    }
}
