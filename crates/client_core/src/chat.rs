use std::sync::Arc;

use shared::{
    domain::{ChatMessage, MaterialId},
    protocol::{ChatAskRequest, ChatAskResponse},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::ActionError,
    gateway::{call_json, GatewayRequest, RequestGateway},
    workflow::{ControllerEvent, Notifier, Slot, Workflow, WorkflowSnapshot},
};

/// Append-only question/answer transcript.
///
/// The user's message is recorded before the backend answers and is left in
/// place when the request fails; only a successful answer adds an assistant
/// message.
pub struct ChatSession {
    gateway: Arc<dyn RequestGateway>,
    slot: Mutex<Slot<Vec<ChatMessage>>>,
    notifier: Notifier,
}

impl ChatSession {
    pub(crate) fn new(gateway: Arc<dyn RequestGateway>, notifier: Notifier) -> Self {
        Self {
            gateway,
            slot: Mutex::new(Slot::new(Workflow::Chat, Vec::new())),
            notifier,
        }
    }

    pub async fn ask(
        &self,
        material_id: Option<&MaterialId>,
        question: &str,
    ) -> Result<ChatMessage, ActionError> {
        if question.trim().is_empty() {
            return Err(ActionError::Validation("question must not be empty".into()));
        }
        let material_id = material_id.ok_or(ActionError::MaterialRequired)?;

        let ticket = {
            let mut slot = self.slot.lock().await;
            let ticket = slot.begin()?;
            slot.state.push(ChatMessage::user(question));
            ticket
        };
        self.notifier.busy(Workflow::Chat, true);
        self.notifier.emit(ControllerEvent::Updated(Workflow::Chat));

        let request = GatewayRequest::post_json(
            "/chat/ask",
            &ChatAskRequest {
                material_id: material_id.clone(),
                question: question.to_string(),
            },
        );
        let outcome: Result<ChatAskResponse, _> = match request {
            Ok(request) => call_json(self.gateway.as_ref(), request).await,
            Err(err) => Err(err),
        };

        let mut slot = self.slot.lock().await;
        slot.accept(ticket)?;
        match outcome {
            Ok(response) => {
                let reply = ChatMessage::assistant(response.answer);
                slot.state.push(reply.clone());
                slot.succeed();
                drop(slot);
                info!(material = %material_id, sources = response.sources.len(), "chat answered");
                self.notifier.settled(Workflow::Chat, None);
                Ok(reply)
            }
            Err(err) => {
                let failure = err.to_failure();
                slot.fail(failure.clone());
                drop(slot);
                warn!(material = %material_id, error = %err, "chat request failed; question left unanswered");
                self.notifier.settled(Workflow::Chat, Some(failure));
                Err(err.into())
            }
        }
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.slot.lock().await.state.clone()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot<Vec<ChatMessage>> {
        self.slot.lock().await.snapshot()
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
