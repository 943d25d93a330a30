//! Pipeline error taxonomy.
//!
//! Four behaviors fall out of the taxonomy: transient failures are retried
//! with backoff, fatal failures surface immediately, ambiguous facts travel
//! the normal return path as an escalation outcome (they are data, not
//! exceptions), and the high-risk override is not an error at all but is
//! logged with the same prominence as one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Machine-readable reason code recorded on every terminal FAILED or
/// ESCALATED checkpoint. "It failed" with no attached class is a contract
/// violation, so the class rides with the checkpoint, not just the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// External dependency kept failing until the retry budget ran out.
    TransientExhausted,
    /// A required input key was absent from the accumulated facts.
    MissingInput,
    /// Raw input data was present but unusable (negative money, bad shape).
    InvalidInput,
    /// Pipeline wiring bug: stage order broken, executor table incomplete,
    /// or no backend configured for a selected tier.
    Configuration,
    /// A legal/financial fact could not be resolved without guessing.
    AmbiguousFact,
    /// The decision engine refused the item on an explicit policy rule.
    PolicyViolation,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TransientExhausted => "transient_exhausted",
            Self::MissingInput => "missing_input",
            Self::InvalidInput => "invalid_input",
            Self::Configuration => "configuration",
            Self::AmbiguousFact => "ambiguous_fact",
            Self::PolicyViolation => "policy_violation",
        };
        write!(f, "{s}")
    }
}

/// Reason attached to a terminal checkpoint and to the item record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    pub class: FailureClass,
    pub detail: String,
}

impl FailureReason {
    pub fn new(class: FailureClass, detail: impl Into<String>) -> Self {
        Self {
            class,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.class, self.detail)
    }
}

/// Errors surfaced by stage executors, the router, and the orchestrator.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Required input key absent from the accumulated facts. Always fatal:
    /// a missing key means the stage wiring is wrong, not that the data is.
    #[error("stage '{stage}' requires input '{key}' which is not in the accumulated facts")]
    MissingInput { stage: String, key: String },

    /// The checkpoint history does not match the configured stage order.
    #[error("stage sequence violated: {message}")]
    SequenceViolation { message: String },

    /// Wiring or configuration problem (no executor, no backend for tier).
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A fact exists but cannot be used as declared.
    #[error("invalid fact '{key}': {message}")]
    InvalidFact { key: String, message: String },

    /// A reasoning backend or scoring collaborator call failed.
    #[error("backend '{backend}' failed: {message}")]
    Backend {
        backend: String,
        message: String,
        transient: bool,
    },

    /// Stage deadline expired. Treated as transient per the retry policy.
    #[error("stage '{stage}' exceeded its {secs}s deadline")]
    DeadlineExpired { stage: String, secs: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

impl PipelineError {
    pub fn missing_input(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingInput {
            stage: stage.into(),
            key: key.into(),
        }
    }

    pub fn sequence(message: impl Into<String>) -> Self {
        Self::SequenceViolation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_fact(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFact {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn backend(
        backend: impl Into<String>,
        message: impl Into<String>,
        transient: bool,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
            transient,
        }
    }

    /// Whether the retry loop should try again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend { transient, .. } => *transient,
            Self::DeadlineExpired { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Taxonomy code for the terminal checkpoint once this error ends an item.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::MissingInput { .. } => FailureClass::MissingInput,
            Self::SequenceViolation { .. } | Self::Configuration { .. } => {
                FailureClass::Configuration
            }
            Self::InvalidFact { .. } | Self::Json(_) => FailureClass::InvalidInput,
            Self::Backend { .. } | Self::DeadlineExpired { .. } | Self::Io(_) => {
                FailureClass::TransientExhausted
            }
            Self::Store(err) => match err {
                crate::store::StoreError::Json(_) => FailureClass::InvalidInput,
                _ => FailureClass::Configuration,
            },
        }
    }
}

/// Classify raw transport error text the way the HTTP client sees it.
///
/// Connection failures, rate limits, and gateway hiccups are worth a retry;
/// everything else (auth failures, schema mismatches) fails immediately.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    message.contains("502")
        || message.contains("503")
        || message.contains("429")
        || lower.contains("connection")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("error sending request")
        || lower.contains("broken pipe")
        || lower.contains("reset by peer")
        || lower.contains("temporarily unavailable")
}
