//! Client-side controller for the tutor backend: materials, chat, generated
//! tests, uploads and analytics, each run as an independent async workflow.

pub mod analytics;
pub mod chat;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod materials;
pub mod test_session;
pub mod upload;
mod workflow;

pub use analytics::AnalyticsDashboard;
pub use chat::ChatSession;
pub use config::{load_settings, Settings};
pub use controller::{ControllerSnapshot, TutorController};
pub use error::{ActionError, GatewayError};
pub use gateway::{GatewayRequest, HttpGateway, Method, Payload, RequestGateway};
pub use materials::{MaterialsState, MaterialsStore};
pub use test_session::{TestPhase, TestSession, TestState};
pub use upload::{UploadAdvisory, UploadFile, UploadFlow, UploadState};
pub use workflow::{ControllerEvent, Workflow, WorkflowSnapshot};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
