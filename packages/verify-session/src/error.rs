use human_verify_wasm::{ConfigError, GateError};
use thiserror::Error;

use crate::devices::{CameraError, DetectionError};
use crate::form::AnswerIssue;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    Camera(#[from] CameraError),
    #[error("face model unavailable: {0}")]
    ModelLoad(DetectionError),
    #[error("invalid verification config: {0}")]
    Config(#[from] ConfigError),
    #[error("form unavailable (HTTP {status}): {message}")]
    FormUnavailable { status: u16, message: String },
    #[error("form is no longer accepting responses")]
    FormInactive,
    #[error("{} answer(s) failed validation", .0.len())]
    InvalidAnswers(Vec<AnswerIssue>),
    #[error("already submitted: {0}")]
    AlreadySubmitted(String),
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("verification session has ended")]
    Closed,
}

impl SessionError {
    /// Errors that end the session before sampling starts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Camera(_)
                | SessionError::ModelLoad(_)
                | SessionError::Config(_)
                | SessionError::FormUnavailable { .. }
                | SessionError::FormInactive
                | SessionError::Closed
        )
    }

    /// Text suitable for showing to the person filling the form.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Camera(CameraError::PermissionDenied) => {
                "Camera access was denied. Allow camera access for this page and reload to verify.".to_string()
            }
            SessionError::Camera(_) => {
                "No working camera was found. Connect a camera and reload to verify.".to_string()
            }
            SessionError::ModelLoad(_) => {
                "The verification model could not be loaded. Check your connection and reload.".to_string()
            }
            SessionError::FormUnavailable { .. } => "This form could not be found.".to_string(),
            SessionError::FormInactive => "This form is no longer accepting responses.".to_string(),
            SessionError::InvalidAnswers(issues) => issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
            SessionError::AlreadySubmitted(message) | SessionError::Api { message, .. } => message.clone(),
            SessionError::Request(_) => "Submission failed, please try again.".to_string(),
            other => other.to_string(),
        }
    }
}
