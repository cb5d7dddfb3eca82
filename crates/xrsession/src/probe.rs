use tracing::{debug, info, warn};

use crate::error::HostError;
use crate::host::XrHost;
use crate::types::{SessionMode, SupportResult};

/// Settled result of one probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The primary mode can be requested.
    Supported(SessionMode),
    /// The primary mode is out of reach; the fallback result is informational only.
    Fallback {
        primary: SupportResult,
        fallback: Option<(SessionMode, SupportResult)>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProbeStage {
    NotStarted,
    AwaitingPrimary,
    AwaitingFallback { primary: SupportResult },
    Settled(ProbeOutcome),
}

/// Asks the host whether the primary mode is available, falling back to a
/// secondary query when it is not. Results are never cached across runs.
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    primary: SessionMode,
    fallback: Option<SessionMode>,
    stage: ProbeStage,
}

impl CapabilityProbe {
    pub fn new(primary: SessionMode, fallback: Option<SessionMode>) -> Self {
        Self {
            primary,
            fallback: fallback.filter(|mode| *mode != primary),
            stage: ProbeStage::NotStarted,
        }
    }

    pub fn primary(&self) -> SessionMode {
        self.primary
    }

    pub fn fallback(&self) -> Option<SessionMode> {
        self.fallback
    }

    /// Starts a fresh probe run. Returns the outcome when it settles without
    /// waiting on the host (no host API at all).
    pub fn begin<H: XrHost>(&mut self, host: &mut H) -> Option<ProbeOutcome> {
        if !host.is_available() {
            let primary = SupportResult::QueryFailed(HostError::unavailable().to_string());
            warn!(mode = %self.primary, "immersive host API is absent");
            return self.after_primary(host, primary);
        }
        debug!(mode = %self.primary, "querying session support");
        self.stage = ProbeStage::AwaitingPrimary;
        host.query_support(self.primary);
        None
    }

    /// Feeds one support answer into the probe. Returns the outcome once the
    /// run settles; answers nobody asked for are ignored.
    pub fn resolve<H: XrHost>(
        &mut self,
        host: &mut H,
        mode: SessionMode,
        result: Result<bool, HostError>,
    ) -> Option<ProbeOutcome> {
        let support = match result {
            Ok(true) => SupportResult::Supported,
            Ok(false) => SupportResult::Unsupported,
            Err(err) => SupportResult::QueryFailed(err.to_string()),
        };

        match std::mem::replace(&mut self.stage, ProbeStage::NotStarted) {
            ProbeStage::AwaitingPrimary if mode == self.primary => {
                if support.is_supported() {
                    info!(mode = %mode, "session mode supported");
                    self.settle(ProbeOutcome::Supported(mode))
                } else {
                    warn!(mode = %mode, result = %support, "session mode not supported");
                    self.after_primary(host, support)
                }
            }
            ProbeStage::AwaitingFallback { primary } if Some(mode) == self.fallback => {
                match &support {
                    SupportResult::Supported => info!(mode = %mode, "{mode} session supported"),
                    other => info!(mode = %mode, result = %other, "{mode} not supported"),
                }
                self.settle(ProbeOutcome::Fallback {
                    primary,
                    fallback: Some((mode, support)),
                })
            }
            stage => {
                debug!(mode = %mode, result = %support, "ignoring unexpected support answer");
                self.stage = stage;
                None
            }
        }
    }

    /// Mode the controller may request, once the primary query confirmed it.
    pub fn supported_mode(&self) -> Option<SessionMode> {
        match &self.stage {
            ProbeStage::Settled(ProbeOutcome::Supported(mode)) => Some(*mode),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&ProbeOutcome> {
        match &self.stage {
            ProbeStage::Settled(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self.stage,
            ProbeStage::AwaitingPrimary | ProbeStage::AwaitingFallback { .. }
        )
    }

    fn after_primary<H: XrHost>(
        &mut self,
        host: &mut H,
        primary: SupportResult,
    ) -> Option<ProbeOutcome> {
        let Some(fallback) = self.fallback else {
            return self.settle(ProbeOutcome::Fallback {
                primary,
                fallback: None,
            });
        };

        if !host.is_available() {
            let failed = SupportResult::QueryFailed(HostError::unavailable().to_string());
            return self.settle(ProbeOutcome::Fallback {
                primary,
                fallback: Some((fallback, failed)),
            });
        }

        debug!(mode = %fallback, "querying fallback session support");
        self.stage = ProbeStage::AwaitingFallback { primary };
        host.query_support(fallback);
        None
    }

    fn settle(&mut self, outcome: ProbeOutcome) -> Option<ProbeOutcome> {
        self.stage = ProbeStage::Settled(outcome.clone());
        Some(outcome)
    }
}
