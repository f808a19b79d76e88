use std::sync::Arc;

use shared::{
    domain::{AnalyticsSnapshot, CourseId},
    protocol::AnalyticsResponse,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::ActionError,
    gateway::{call_json, GatewayRequest, RequestGateway},
    workflow::{Notifier, Slot, Workflow, WorkflowSnapshot},
};

/// Latest usage summary fetched from the analytics dashboard endpoint.
pub struct AnalyticsDashboard {
    gateway: Arc<dyn RequestGateway>,
    slot: Mutex<Slot<Option<AnalyticsSnapshot>>>,
    notifier: Notifier,
}

impl AnalyticsDashboard {
    pub(crate) fn new(gateway: Arc<dyn RequestGateway>, notifier: Notifier) -> Self {
        Self {
            gateway,
            slot: Mutex::new(Slot::new(Workflow::Analytics, None)),
            notifier,
        }
    }

    /// Fetches a new snapshot and replaces the stored one wholesale.
    pub async fn refresh(&self, scope: &CourseId) -> Result<AnalyticsSnapshot, ActionError> {
        let ticket = self.slot.lock().await.begin_superseding();
        self.notifier.busy(Workflow::Analytics, true);

        let outcome: Result<AnalyticsResponse, _> = call_json(
            self.gateway.as_ref(),
            GatewayRequest::get(format!("/analytics/dashboard/{scope}")),
        )
        .await;

        let mut slot = self.slot.lock().await;
        slot.accept(ticket)?;
        match outcome {
            Ok(snapshot) => {
                slot.state = Some(snapshot);
                slot.succeed();
                drop(slot);
                info!(course = %scope, materials = snapshot.total_materials, "analytics refreshed");
                self.notifier.settled(Workflow::Analytics, None);
                Ok(snapshot)
            }
            Err(err) => {
                let failure = err.to_failure();
                slot.fail(failure.clone());
                drop(slot);
                warn!(course = %scope, error = %err, "analytics refresh failed");
                self.notifier.settled(Workflow::Analytics, Some(failure));
                Err(err.into())
            }
        }
    }

    pub async fn current(&self) -> Option<AnalyticsSnapshot> {
        self.slot.lock().await.state
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot<Option<AnalyticsSnapshot>> {
        self.slot.lock().await.snapshot()
    }
}

#[cfg(test)]
#[path = "tests/analytics_tests.rs"]
mod tests;
