use tracing::{debug, info, warn};

use crate::error::{BindStage, HostError, SessionError};
use crate::host::XrHost;
use crate::stage::RenderTarget;
use crate::types::{LayerId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindState {
    Unbound,
    AwaitingCompatibility { session: SessionId },
    Bound { session: SessionId, layer: LayerId },
}

/// Binds the render target to a session in two ordered steps:
///
/// 1. ask the host to make the rendering context eligible for the session
///    (asynchronous, resolves with `HostEvent::ContextCompatible`);
/// 2. build an output layer around the context and install it as the
///    session's render state.
///
/// A failure in either step unwinds whatever the binder created so no partial
/// layer outlives the attempt.
#[derive(Debug, Clone)]
pub struct SurfaceBinder {
    state: BindState,
}

impl Default for SurfaceBinder {
    fn default() -> Self {
        Self {
            state: BindState::Unbound,
        }
    }
}

impl SurfaceBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts binding `target` to `session`. Only valid while unbound.
    pub fn begin<H: XrHost>(
        &mut self,
        host: &mut H,
        target: &RenderTarget,
        session: SessionId,
    ) -> Result<(), SessionError> {
        if self.state != BindState::Unbound {
            return Err(SessionError::binding(
                BindStage::Sequencing,
                format!("render target is already claimed; cannot bind {session}"),
            ));
        }
        debug!(session = %session, context = %target.context(), "making context compatible");
        self.state = BindState::AwaitingCompatibility { session };
        host.make_context_compatible(target.context(), session);
        Ok(())
    }

    /// Finishes the bind once the compatibility step has resolved.
    pub fn complete<H: XrHost>(
        &mut self,
        host: &mut H,
        target: &mut RenderTarget,
        session: SessionId,
        compatibility: Result<(), HostError>,
    ) -> Result<LayerId, SessionError> {
        match self.state {
            BindState::AwaitingCompatibility { session: pending } if pending == session => {}
            _ => {
                return Err(SessionError::binding(
                    BindStage::Sequencing,
                    format!("no compatibility step pending for {session}"),
                ))
            }
        }
        self.state = BindState::Unbound;

        compatibility.map_err(|reason| SessionError::BindingFailure {
            stage: BindStage::Compatibility,
            reason,
        })?;
        target.mark_xr_compatible();

        let layer = host
            .create_layer(target.context(), session)
            .map_err(|reason| SessionError::BindingFailure {
                stage: BindStage::LayerCreation,
                reason,
            })?;

        if let Err(reason) = host.update_render_state(session, layer) {
            warn!(session = %session, layer = %layer, "layer attachment failed; releasing layer");
            host.destroy_layer(layer);
            return Err(SessionError::BindingFailure {
                stage: BindStage::LayerAttachment,
                reason,
            });
        }

        target.attach(layer);
        self.state = BindState::Bound { session, layer };
        info!(session = %session, layer = %layer, "render target bound");
        Ok(layer)
    }

    /// Drops a bind that never completed, e.g. when the session ended mid-bind.
    pub fn abort(&mut self, session: SessionId) -> bool {
        match self.state {
            BindState::AwaitingCompatibility { session: pending } if pending == session => {
                debug!(session = %session, "aborting pending bind");
                self.state = BindState::Unbound;
                true
            }
            _ => false,
        }
    }

    /// Forgets the binding of a finished session so the target can be reused.
    /// The host discards the layer together with the session.
    pub fn release(&mut self, target: &mut RenderTarget, session: SessionId) -> Option<LayerId> {
        match self.state {
            BindState::Bound {
                session: bound,
                layer,
            } if bound == session => {
                self.state = BindState::Unbound;
                let detached = target.detach();
                debug!(session = %session, layer = %layer, "render target released");
                detached
            }
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, BindState::Bound { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, BindState::AwaitingCompatibility { .. })
    }
}
