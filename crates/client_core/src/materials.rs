use std::sync::Arc;

use shared::{
    domain::{CourseId, Material, MaterialId},
    protocol::MaterialListResponse,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::ActionError,
    gateway::{call_json, GatewayRequest, RequestGateway},
    workflow::{ControllerEvent, Notifier, Slot, Workflow, WorkflowSnapshot},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialsState {
    pub materials: Vec<Material>,
    pub selected: Option<MaterialId>,
}

/// Known materials of a course plus the current selection.
pub struct MaterialsStore {
    gateway: Arc<dyn RequestGateway>,
    slot: Mutex<Slot<MaterialsState>>,
    notifier: Notifier,
}

impl MaterialsStore {
    pub(crate) fn new(gateway: Arc<dyn RequestGateway>, notifier: Notifier) -> Self {
        Self {
            gateway,
            slot: Mutex::new(Slot::new(Workflow::Materials, MaterialsState::default())),
            notifier,
        }
    }

    /// Replaces the material set with the backend's list for `course_id`.
    ///
    /// A newer refresh supersedes an outstanding one; on failure the previous
    /// set is kept and the error recorded.
    pub async fn refresh(&self, course_id: &CourseId) -> Result<usize, ActionError> {
        let ticket = self.slot.lock().await.begin_superseding();
        self.notifier.busy(Workflow::Materials, true);

        let outcome: Result<MaterialListResponse, _> = call_json(
            self.gateway.as_ref(),
            GatewayRequest::get(format!("/materials/list/{course_id}")),
        )
        .await;

        let mut slot = self.slot.lock().await;
        slot.accept(ticket)?;
        match outcome {
            Ok(response) => {
                let count = response.materials.len();
                slot.state.materials = response.materials;
                slot.succeed();
                drop(slot);
                info!(course = %course_id, count, "materials refreshed");
                self.notifier.settled(Workflow::Materials, None);
                Ok(count)
            }
            Err(err) => {
                let failure = err.to_failure();
                slot.fail(failure.clone());
                drop(slot);
                warn!(course = %course_id, error = %err, "materials refresh failed");
                self.notifier.settled(Workflow::Materials, Some(failure));
                Err(err.into())
            }
        }
    }

    /// Marks `material_id` as active. The id is not checked against the store.
    pub async fn select(&self, material_id: MaterialId) {
        self.slot.lock().await.state.selected = Some(material_id);
        self.notifier.emit(ControllerEvent::Updated(Workflow::Materials));
    }

    pub async fn clear_selection(&self) {
        self.slot.lock().await.state.selected = None;
        self.notifier.emit(ControllerEvent::Updated(Workflow::Materials));
    }

    pub async fn selected(&self) -> Option<MaterialId> {
        self.slot.lock().await.state.selected.clone()
    }

    /// The selected material, if it is still part of the current set.
    pub async fn selected_material(&self) -> Option<Material> {
        let slot = self.slot.lock().await;
        let selected = slot.state.selected.as_ref()?;
        slot.state
            .materials
            .iter()
            .find(|material| &material.id == selected)
            .cloned()
    }

    pub async fn materials(&self) -> Vec<Material> {
        self.slot.lock().await.state.materials.clone()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot<MaterialsState> {
        self.slot.lock().await.snapshot()
    }
}

#[cfg(test)]
#[path = "tests/materials_tests.rs"]
mod tests;
