//! Quiz state machine.
//!
//! ```text
//! Idle -> Generating -> Active(i) -> Submitting -> Active(i + 1)
//!                                               \-> Completed
//! ```
//!
//! `start` may be called from any non-busy phase and discards the previous
//! session. A failed generation falls back to `Idle`; a failed submission
//! returns to `Active(i)` with the pending answer kept for a retry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{MaterialId, TestQuestion, TestResult},
    protocol::{
        Difficulty, GenerateTestRequest, GeneratedTest, SubmitAnswerRequest,
        SubmitAnswerResponse, DEFAULT_QUESTION_COUNT, PLACEHOLDER_TIME_SPENT,
    },
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::{ActionError, GatewayError},
    gateway::{call_json, GatewayRequest, RequestGateway},
    workflow::{ControllerEvent, Notifier, Slot, Workflow, WorkflowSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    #[default]
    Idle,
    Generating,
    Active,
    Submitting,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestState {
    pub phase: TestPhase,
    pub material_id: Option<MaterialId>,
    pub test_id: Option<String>,
    pub material_title: String,
    pub questions: Vec<TestQuestion>,
    pub current_index: usize,
    pub selected_answer: Option<usize>,
    pub results: Vec<TestResult>,
}

impl TestState {
    pub fn current_question(&self) -> Option<&TestQuestion> {
        match self.phase {
            TestPhase::Active | TestPhase::Submitting | TestPhase::Completed => {
                self.questions.get(self.current_index)
            }
            TestPhase::Idle | TestPhase::Generating => None,
        }
    }

    pub fn is_last_question(&self) -> bool {
        !self.questions.is_empty() && self.current_index + 1 == self.questions.len()
    }

    /// `(correct, answered)` so far.
    pub fn score(&self) -> (usize, usize) {
        let correct = self.results.iter().filter(|r| r.is_correct).count();
        (correct, self.results.len())
    }
}

pub struct TestSession {
    gateway: Arc<dyn RequestGateway>,
    slot: Mutex<Slot<TestState>>,
    notifier: Notifier,
}

impl TestSession {
    pub(crate) fn new(gateway: Arc<dyn RequestGateway>, notifier: Notifier) -> Self {
        Self {
            gateway,
            slot: Mutex::new(Slot::new(Workflow::Test, TestState::default())),
            notifier,
        }
    }

    /// Generates a fresh test for `material_id` and returns its question count.
    pub async fn start(&self, material_id: &MaterialId) -> Result<usize, ActionError> {
        let ticket = {
            let mut slot = self.slot.lock().await;
            let ticket = slot.begin()?;
            slot.state = TestState {
                phase: TestPhase::Generating,
                material_id: Some(material_id.clone()),
                ..TestState::default()
            };
            ticket
        };
        self.notifier.busy(Workflow::Test, true);
        self.notifier.emit(ControllerEvent::Updated(Workflow::Test));

        let outcome = self.generate(material_id).await;

        let mut slot = self.slot.lock().await;
        slot.accept(ticket)?;
        match outcome {
            Ok(test) => {
                let count = test.questions.len();
                slot.state.phase = TestPhase::Active;
                slot.state.test_id = test.test_id;
                slot.state.material_title = test.material_title;
                slot.state.questions = test.questions;
                slot.succeed();
                drop(slot);
                info!(material = %material_id, questions = count, "test started");
                self.notifier.settled(Workflow::Test, None);
                Ok(count)
            }
            Err(err) => {
                let failure = err.to_failure();
                slot.state.phase = TestPhase::Idle;
                slot.fail(failure.clone());
                drop(slot);
                warn!(material = %material_id, error = %err, "test generation failed");
                self.notifier.settled(Workflow::Test, Some(failure));
                Err(err.into())
            }
        }
    }

    async fn generate(&self, material_id: &MaterialId) -> Result<GeneratedTest, GatewayError> {
        let request = GatewayRequest::post_json(
            "/tests/generate",
            &GenerateTestRequest {
                material_id: material_id.clone(),
                num_questions: DEFAULT_QUESTION_COUNT,
                difficulty: Difficulty::Medium,
            },
        )?;
        let test: GeneratedTest = call_json(self.gateway.as_ref(), request).await?;
        if test.questions.is_empty() {
            return Err(GatewayError::DecodeFailure(
                "generated test contains no questions".into(),
            ));
        }
        Ok(test)
    }

    /// Sets the pending answer for the current question; last write wins.
    pub async fn select_answer(&self, option: usize) -> Result<(), ActionError> {
        {
            let mut slot = self.slot.lock().await;
            match slot.state.phase {
                TestPhase::Active => {}
                TestPhase::Generating | TestPhase::Submitting => {
                    return Err(ActionError::Busy(Workflow::Test))
                }
                TestPhase::Idle | TestPhase::Completed => {
                    return Err(ActionError::Validation("no active question".into()))
                }
            }
            let options = slot
                .state
                .current_question()
                .map_or(0, |question| question.options.len());
            if option >= options {
                return Err(ActionError::Validation(format!(
                    "option {option} out of range for a question with {options} options"
                )));
            }
            slot.state.selected_answer = Some(option);
        }
        self.notifier.emit(ControllerEvent::Updated(Workflow::Test));
        Ok(())
    }

    /// Submits the pending answer for the current question.
    ///
    /// The question is identified by its position in the test, not by a
    /// server-issued id.
    pub async fn submit_answer(&self) -> Result<TestResult, ActionError> {
        let (ticket, question_index, answer) = {
            let mut slot = self.slot.lock().await;
            match slot.state.phase {
                TestPhase::Active => {}
                TestPhase::Generating | TestPhase::Submitting => {
                    return Err(ActionError::Busy(Workflow::Test))
                }
                TestPhase::Idle | TestPhase::Completed => {
                    return Err(ActionError::Validation("no active question".into()))
                }
            }
            let answer = slot
                .state
                .selected_answer
                .ok_or_else(|| ActionError::Validation("no answer selected".into()))?;
            let ticket = slot.begin()?;
            slot.state.phase = TestPhase::Submitting;
            (ticket, slot.state.current_index, answer)
        };
        self.notifier.busy(Workflow::Test, true);

        let outcome: Result<SubmitAnswerResponse, GatewayError> = async {
            let request = GatewayRequest::post_json(
                "/tests/submit-answer",
                &SubmitAnswerRequest {
                    question_id: question_index,
                    selected_answer: answer,
                    time_spent: PLACEHOLDER_TIME_SPENT,
                },
            )?;
            call_json(self.gateway.as_ref(), request).await
        }
        .await;

        let mut slot = self.slot.lock().await;
        slot.accept(ticket)?;
        match outcome {
            Ok(response) => {
                let result = TestResult {
                    question_index,
                    answer,
                    is_correct: response.is_correct,
                    feedback: response.feedback,
                };
                let state = &mut slot.state;
                state.results.push(result.clone());
                state.selected_answer = None;
                if question_index + 1 < state.questions.len() {
                    state.current_index = question_index + 1;
                    state.phase = TestPhase::Active;
                } else {
                    state.phase = TestPhase::Completed;
                }
                let completed = state.phase == TestPhase::Completed;
                let (correct, answered) = state.score();
                slot.succeed();
                drop(slot);
                info!(
                    question = question_index,
                    correct = result.is_correct,
                    completed,
                    "answer recorded"
                );
                if completed {
                    info!(correct, answered, "test completed");
                }
                self.notifier.settled(Workflow::Test, None);
                Ok(result)
            }
            Err(err) => {
                let failure = err.to_failure();
                slot.state.phase = TestPhase::Active;
                slot.fail(failure.clone());
                drop(slot);
                warn!(question = question_index, error = %err, "answer submission failed");
                self.notifier.settled(Workflow::Test, Some(failure));
                Err(err.into())
            }
        }
    }

    /// Abandons the current test. A response still in flight is discarded.
    pub async fn reset(&self) {
        {
            let mut slot = self.slot.lock().await;
            slot.invalidate();
            slot.state = TestState::default();
        }
        self.notifier.busy(Workflow::Test, false);
        self.notifier.emit(ControllerEvent::Updated(Workflow::Test));
    }

    pub async fn state(&self) -> TestState {
        self.slot.lock().await.state.clone()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot<TestState> {
        self.slot.lock().await.snapshot()
    }
}

#[cfg(test)]
#[path = "tests/test_session_tests.rs"]
mod tests;
