use crate::models::InvalidSection;
use thiserror::Error;

/// Why a story could not be generated.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API key not configured; set GEMINI_API_KEY or API_KEY")]
    MissingCredential,

    #[error("generation service returned no text")]
    EmptyResponse,

    #[error("malformed story response: {reason}")]
    MalformedResponse {
        reason: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("generation service request failed: {0}")]
    Service(#[from] ServiceFailure),

    #[error("generation task stopped before finishing: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ServiceFailure {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unreadable response envelope: {0}")]
    UnreadableEnvelope(#[source] serde_json::Error),
}

impl GenerationError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            source: None,
        }
    }

    /// Short tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::MissingCredential => "missing_credential",
            GenerationError::EmptyResponse => "empty_response",
            GenerationError::MalformedResponse { .. } => "malformed_response",
            GenerationError::Service(_) => "service",
            GenerationError::TaskFailed(_) => "task_failed",
        }
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse {
            reason: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Service(ServiceFailure::Transport(err))
    }
}

/// A trigger the wizard refused; the state is left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("theme is empty")]
    EmptyTheme,

    #[error("no style selected or typed")]
    StyleUnresolved,

    #[error("a story is already being generated")]
    GenerationInFlight,

    #[error("'{action}' is not allowed while {phase}")]
    WrongPhase {
        action: &'static str,
        phase: &'static str,
    },

    #[error("result for a generation that is no longer current")]
    StaleResult,

    #[error("story has no section {0}")]
    SectionOutOfRange(usize),

    #[error(transparent)]
    InvalidSection(#[from] InvalidSection),
}

impl WizardError {
    /// Whether the trigger failed because of what the user typed, rather
    /// than because of where the wizard is.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            WizardError::EmptyTheme
                | WizardError::StyleUnresolved
                | WizardError::SectionOutOfRange(_)
                | WizardError::InvalidSection(_)
        )
    }
}
