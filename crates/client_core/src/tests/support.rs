use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::domain::MaterialId;
use tokio::sync::{oneshot, Mutex};

use crate::{
    error::GatewayError,
    gateway::{GatewayRequest, RequestGateway},
    workflow::Notifier,
};

pub(crate) type Reply = Result<Value, GatewayError>;

enum Scripted {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

/// In-memory gateway answering each endpoint from its own queue of replies.
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    replies: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn push(&self, endpoint: &str, scripted: Scripted) {
        self.replies
            .lock()
            .await
            .entry(endpoint.to_string())
            .or_default()
            .push_back(scripted);
    }

    pub(crate) async fn reply_ok(&self, endpoint: &str, body: Value) {
        self.push(endpoint, Scripted::Ready(Ok(body))).await;
    }

    pub(crate) async fn reply_err(&self, endpoint: &str, err: GatewayError) {
        self.push(endpoint, Scripted::Ready(Err(err))).await;
    }

    /// Queues a reply that is only delivered once the returned sender fires.
    pub(crate) async fn reply_gated(&self, endpoint: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.push(endpoint, Scripted::Gated(rx)).await;
        tx
    }

    pub(crate) async fn calls(&self) -> Vec<GatewayRequest> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn calls_to(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .count()
    }

    /// Yields until `count` calls to `endpoint` have been issued.
    pub(crate) async fn wait_for_calls(&self, endpoint: &str, count: usize) {
        while self.calls_to(endpoint).await < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl RequestGateway for ScriptedGateway {
    async fn call(&self, request: GatewayRequest) -> Reply {
        let endpoint = request.endpoint.clone();
        self.calls.lock().await.push(request);
        let next = self
            .replies
            .lock()
            .await
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(GatewayError::NetworkFailure("gate dropped".into()))),
            None => Err(GatewayError::NetworkFailure(format!(
                "no scripted reply for {endpoint}"
            ))),
        }
    }
}

pub(crate) fn notifier() -> Notifier {
    Notifier::new()
}

pub(crate) fn material_id() -> MaterialId {
    MaterialId::new("mat-1")
}

pub(crate) fn material_json(id: &str, title: &str, content_length: u64) -> Value {
    json!({
        "id": id,
        "title": title,
        "content_length": content_length,
        "created_at": "2025-03-01T10:20:30.123456",
    })
}

pub(crate) fn generated_test(questions: usize) -> Value {
    let questions: Vec<Value> = (0..questions)
        .map(|i| {
            json!({
                "question": format!("Question {i}?"),
                "options": ["first", "second", "third", "fourth"],
                "correct": 0,
                "explanation": "because",
            })
        })
        .collect();
    json!({
        "test_id": "test-1",
        "difficulty": "medium",
        "material_title": "notes.txt",
        "questions": questions,
    })
}

pub(crate) fn verdict(is_correct: bool, feedback: &str) -> Value {
    json!({ "is_correct": is_correct, "feedback": feedback })
}
