//! Collaborator contracts for outline generation and text segmentation.
//!
//! # Responsibility
//! - Define the seams where an AI-backed service plugs into the engine.
//! - Carry collaborator configuration explicitly instead of reading the
//!   process environment.
//!
//! # Invariants
//! - Collaborators are called before any mutation transaction opens.
//! - Every collaborator failure is an `ExternalServiceError`; callers in
//!   this crate swallow it and fall back to heuristics.

use crate::outline::model::{NodePreview, OutlineDraft, Segment};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure reported by an outline/segmentation collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalServiceError {
    /// Required configuration (usually the API key) is missing.
    NotConfigured(String),
    /// Call exceeded the configured timeout.
    Timeout { timeout_ms: u64 },
    /// Service could not be reached or refused the call.
    Unavailable(String),
    /// Service answered with something unusable.
    InvalidResponse(String),
}

impl Display for ExternalServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured(what) => write!(f, "external service not configured: {what}"),
            Self::Timeout { timeout_ms } => {
                write!(f, "external service timed out after {timeout_ms} ms")
            }
            Self::Unavailable(message) => write!(f, "external service unavailable: {message}"),
            Self::InvalidResponse(message) => {
                write!(f, "external service returned invalid response: {message}")
            }
        }
    }
}

impl Error for ExternalServiceError {}

impl ExternalServiceError {
    /// Stable short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable(_) => "unavailable",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Proposes an outline for an ordered list of node previews.
pub trait OutlineService {
    fn outline(&self, previews: &[NodePreview]) -> Result<OutlineDraft, ExternalServiceError>;
}

/// Proposes semantic boundaries inside raw document text.
pub trait SegmentationService {
    fn segment(&self, text: &str) -> Result<Vec<Segment>, ExternalServiceError>;
}

/// Collaborator that is never reachable.
///
/// Lets the engine run on heuristics alone (offline use, CLI, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableService;

impl OutlineService for UnavailableService {
    fn outline(&self, _previews: &[NodePreview]) -> Result<OutlineDraft, ExternalServiceError> {
        Err(ExternalServiceError::Unavailable(
            "no outline service configured".to_string(),
        ))
    }
}

impl SegmentationService for UnavailableService {
    fn segment(&self, _text: &str) -> Result<Vec<Segment>, ExternalServiceError> {
        Err(ExternalServiceError::Unavailable(
            "no segmentation service configured".to_string(),
        ))
    }
}

/// Explicit configuration handed to collaborator constructors.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl ServiceConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rejects configurations a collaborator cannot call out with.
    pub fn ensure_configured(&self) -> Result<(), ExternalServiceError> {
        if self.api_key.trim().is_empty() {
            return Err(ExternalServiceError::NotConfigured("api_key".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ExternalServiceError::NotConfigured("model".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ExternalServiceError::NotConfigured("timeout".to_string()));
        }
        Ok(())
    }

    /// Timeout error for a call that ran past `timeout`.
    pub fn timeout_error(&self) -> ExternalServiceError {
        ExternalServiceError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

impl Debug for ServiceConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ExternalServiceError, ServiceConfig};
    use std::time::Duration;

    #[test]
    fn config_requires_key_and_model() {
        let missing_key = ServiceConfig::new(" ", "gpt");
        assert_eq!(
            missing_key.ensure_configured(),
            Err(ExternalServiceError::NotConfigured("api_key".to_string()))
        );

        let zero_timeout = ServiceConfig::new("k", "gpt").with_timeout(Duration::ZERO);
        assert!(zero_timeout.ensure_configured().is_err());

        assert!(ServiceConfig::new("k", "gpt").ensure_configured().is_ok());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = ServiceConfig::new("secret-key", "gpt");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("gpt"));
    }
}
