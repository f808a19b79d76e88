//! View controller: tracks the active workflow, enforces that chat and test
//! have a selected material, and wires the workflows together.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::{
    domain::{AnalyticsSnapshot, ChatMessage, CourseId, MaterialId, TestResult},
    protocol::UploadReceipt,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::{
    analytics::AnalyticsDashboard,
    chat::ChatSession,
    config::Settings,
    error::ActionError,
    gateway::{HttpGateway, RequestGateway},
    materials::{MaterialsState, MaterialsStore},
    test_session::{TestSession, TestState},
    upload::{UploadFile, UploadFlow, UploadState},
    workflow::{ControllerEvent, Notifier, Workflow, WorkflowSnapshot},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub view: Workflow,
    pub materials: WorkflowSnapshot<MaterialsState>,
    pub upload: WorkflowSnapshot<UploadState>,
    pub chat: WorkflowSnapshot<Vec<ChatMessage>>,
    pub test: WorkflowSnapshot<TestState>,
    pub analytics: WorkflowSnapshot<Option<AnalyticsSnapshot>>,
}

pub struct TutorController {
    course_id: CourseId,
    materials: Arc<MaterialsStore>,
    upload: UploadFlow,
    chat: ChatSession,
    test: TestSession,
    analytics: AnalyticsDashboard,
    view: Mutex<Workflow>,
    initialized: AtomicBool,
    notifier: Notifier,
}

impl TutorController {
    pub fn new(gateway: Arc<dyn RequestGateway>, course_id: CourseId) -> Arc<Self> {
        let notifier = Notifier::new();
        let materials = Arc::new(MaterialsStore::new(gateway.clone(), notifier.clone()));
        Arc::new(Self {
            upload: UploadFlow::new(
                gateway.clone(),
                materials.clone(),
                course_id.clone(),
                notifier.clone(),
            ),
            chat: ChatSession::new(gateway.clone(), notifier.clone()),
            test: TestSession::new(gateway.clone(), notifier.clone()),
            analytics: AnalyticsDashboard::new(gateway, notifier.clone()),
            materials,
            course_id,
            view: Mutex::new(Workflow::Materials),
            initialized: AtomicBool::new(false),
            notifier,
        })
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Arc<Self>> {
        let gateway = HttpGateway::new(settings.api_base()?);
        Ok(Self::new(Arc::new(gateway), settings.course()))
    }

    /// Initial material fetch. Once a fetch has succeeded, later calls no
    /// longer reach the backend; a failed fetch is retried by the next call.
    pub async fn init(&self) -> Result<usize, ActionError> {
        if self.initialized.load(Ordering::SeqCst) {
            debug!("controller already initialized");
            return Ok(self.materials.materials().await.len());
        }
        info!(course = %self.course_id, "initializing controller");
        let count = self.materials.refresh(&self.course_id).await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(count)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.notifier.subscribe()
    }

    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    pub fn materials(&self) -> &MaterialsStore {
        &self.materials
    }

    pub fn upload_flow(&self) -> &UploadFlow {
        &self.upload
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn test(&self) -> &TestSession {
        &self.test
    }

    pub fn analytics(&self) -> &AnalyticsDashboard {
        &self.analytics
    }

    pub async fn view(&self) -> Workflow {
        *self.view.lock().await
    }

    /// Whether `view` may be entered right now; used to disable navigation.
    pub async fn can_enter(&self, view: Workflow) -> bool {
        !view.requires_material() || self.materials.selected().await.is_some()
    }

    /// Switches the active view. In-flight requests of the previous view keep
    /// running and still apply their results.
    pub async fn switch_view(&self, view: Workflow) -> Result<(), ActionError> {
        if !self.can_enter(view).await {
            return Err(ActionError::MaterialRequired);
        }
        self.set_view(view).await;
        Ok(())
    }

    async fn set_view(&self, view: Workflow) {
        let changed = {
            let mut current = self.view.lock().await;
            std::mem::replace(&mut *current, view) != view
        };
        if changed {
            debug!(view = %view, "view switched");
            self.notifier.emit(ControllerEvent::ViewChanged(view));
        }
    }

    pub async fn select_material(&self, material_id: MaterialId) {
        self.materials.select(material_id).await;
    }

    pub async fn refresh_materials(&self) -> Result<usize, ActionError> {
        self.materials.refresh(&self.course_id).await
    }

    /// Asks about the selected material.
    pub async fn ask(&self, question: &str) -> Result<ChatMessage, ActionError> {
        let selected = self.materials.selected().await;
        self.chat.ask(selected.as_ref(), question).await
    }

    /// Generates a test for `material_id`, then selects it and opens the test
    /// view. A failed generation leaves the selection untouched.
    pub async fn start_test(&self, material_id: MaterialId) -> Result<usize, ActionError> {
        let count = self.test.start(&material_id).await?;
        self.materials.select(material_id).await;
        self.set_view(Workflow::Test).await;
        Ok(count)
    }

    pub async fn select_answer(&self, option: usize) -> Result<(), ActionError> {
        self.test.select_answer(option).await
    }

    pub async fn submit_answer(&self) -> Result<TestResult, ActionError> {
        self.test.submit_answer().await
    }

    /// Uploads `file`; on success the material list is refreshed and the
    /// materials view opened.
    pub async fn upload(&self, file: UploadFile) -> Result<UploadReceipt, ActionError> {
        let receipt = self.upload.submit(file).await?;
        self.set_view(Workflow::Materials).await;
        Ok(receipt)
    }

    pub async fn upload_dropped(
        &self,
        files: Vec<UploadFile>,
    ) -> Result<UploadReceipt, ActionError> {
        let receipt = self.upload.submit_dropped(files).await?;
        self.set_view(Workflow::Materials).await;
        Ok(receipt)
    }

    /// Refreshes analytics and opens the analytics view on success.
    pub async fn open_analytics(&self) -> Result<AnalyticsSnapshot, ActionError> {
        let snapshot = self.analytics.refresh(&self.course_id).await?;
        self.set_view(Workflow::Analytics).await;
        Ok(snapshot)
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            view: self.view().await,
            materials: self.materials.snapshot().await,
            upload: self.upload.snapshot().await,
            chat: self.chat.snapshot().await,
            test: self.test.snapshot().await,
            analytics: self.analytics.snapshot().await,
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
