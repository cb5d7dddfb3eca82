use std::fmt;

use crate::types::SessionMode;

/// Rejection reported by the host platform for any asynchronous or fallible call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The host exposes no immersive API at all.
    pub fn unavailable() -> Self {
        Self::new("immersive host API is not available")
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Step of the render-target binding that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStage {
    /// Marking the rendering context eligible for the session.
    Compatibility,
    /// Constructing the output layer around the context.
    LayerCreation,
    /// Installing the layer as the session's render state.
    LayerAttachment,
    /// Binding was attempted out of order or the session vanished mid-bind.
    Sequencing,
}

impl fmt::Display for BindStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BindStage::Compatibility => "context compatibility",
            BindStage::LayerCreation => "layer creation",
            BindStage::LayerAttachment => "layer attachment",
            BindStage::Sequencing => "bind sequencing",
        };
        f.write_str(label)
    }
}

/// Failures of a single session attempt. None of them are fatal to the controller;
/// each one leaves it idle and ready for a fresh user-initiated attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session mode '{mode}' is not supported: {reason}")]
    UnsupportedPlatform { mode: SessionMode, reason: String },
    #[error("session request was rejected: {0}")]
    AcquisitionFailure(HostError),
    #[error("failed to bind render target ({stage}): {reason}")]
    BindingFailure { stage: BindStage, reason: HostError },
    #[error("session teardown was rejected: {0}")]
    TerminationFailure(HostError),
}

impl SessionError {
    pub(crate) fn binding(stage: BindStage, reason: impl Into<String>) -> Self {
        SessionError::BindingFailure {
            stage,
            reason: HostError::new(reason),
        }
    }
}
