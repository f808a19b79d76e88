use shared::error::{FailureKind, WorkflowFailure};
use thiserror::Error;

use crate::Workflow;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request could not be completed: {0}")]
    NetworkFailure(String),
    #[error("server responded with status {status}")]
    HttpFailure { status: u16 },
    #[error("malformed response body: {0}")]
    DecodeFailure(String),
    #[error("request could not be built: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NetworkFailure(_) => FailureKind::Network,
            Self::HttpFailure { .. } => FailureKind::Http,
            Self::DecodeFailure(_) => FailureKind::Decode,
            Self::InvalidRequest(_) => FailureKind::Validation,
        }
    }

    pub fn to_failure(&self) -> WorkflowFailure {
        match self {
            Self::HttpFailure { status } => WorkflowFailure::http(*status, self.to_string()),
            _ => WorkflowFailure::new(self.kind(), self.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("a material must be selected first")]
    MaterialRequired,
    #[error("{0} workflow already has a request in flight")]
    Busy(Workflow),
    #[error("{0} response discarded: superseded by a newer request")]
    Superseded(Workflow),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ActionError {
    /// Local input problems that were rejected before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MaterialRequired)
    }

    pub fn failure(&self) -> WorkflowFailure {
        match self {
            Self::Gateway(err) => err.to_failure(),
            other => WorkflowFailure::new(FailureKind::Validation, other.to_string()),
        }
    }
}
