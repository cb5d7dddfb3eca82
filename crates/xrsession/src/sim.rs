//! Deterministic, scripted implementation of [`XrHost`].
//!
//! Every asynchronous call answers by pushing its completion onto the event
//! queue immediately, so the controller observes it on the next pump. Frames
//! are only produced when [`SimulatedHost::advance_frame`] is called, and
//! platform-initiated termination is triggered with
//! [`SimulatedHost::end_from_platform`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use rand::prelude::*;

use crate::error::HostError;
use crate::host::{HostEvent, HostEvents, XrHost};
use crate::types::{ContextId, FrameHandle, LayerId, SessionId, SessionMode, SessionRequest};

/// Behaviour of the simulated platform.
#[derive(Debug, Clone, PartialEq)]
pub struct HostScript {
    /// `false` simulates a platform without any immersive API.
    pub api_available: bool,
    pub supported_modes: Vec<SessionMode>,
    /// Capability queries reject with this reason.
    pub fail_queries: Option<String>,
    pub reject_request: Option<String>,
    pub fail_compatibility: Option<String>,
    pub fail_layer_creation: Option<String>,
    pub fail_layer_attachment: Option<String>,
    pub reject_end: Option<String>,
    /// Display refresh period between simulated frames.
    pub refresh_interval: Duration,
    /// Maximum random deviation applied to each frame timestamp, in ms.
    pub jitter_ms: f64,
    pub seed: u64,
}

impl Default for HostScript {
    fn default() -> Self {
        Self {
            api_available: true,
            supported_modes: vec![SessionMode::ImmersiveAr, SessionMode::Inline],
            fail_queries: None,
            reject_request: None,
            fail_compatibility: None,
            fail_layer_creation: None,
            fail_layer_attachment: None,
            reject_end: None,
            refresh_interval: Duration::from_millis(11),
            jitter_ms: 0.0,
            seed: 0,
        }
    }
}

/// One call the controller made into the host, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    QuerySupport(SessionMode),
    RequestSession(SessionRequest),
    MakeContextCompatible(ContextId, SessionId),
    CreateLayer(ContextId, SessionId),
    UpdateRenderState(SessionId, LayerId),
    DestroyLayer(LayerId),
    EndSession(SessionId),
    RequestAnimationFrame(SessionId, FrameHandle),
    CancelAnimationFrame(SessionId, FrameHandle),
}

pub struct SimulatedHost {
    events: HostEvents,
    script: HostScript,
    rng: StdRng,
    calls: Vec<HostCall>,
    next_id: u64,
    live_sessions: BTreeSet<SessionId>,
    layers: BTreeMap<LayerId, SessionId>,
    pending_frames: BTreeMap<FrameHandle, SessionId>,
    clock_ms: f64,
}

impl SimulatedHost {
    pub fn new(events: HostEvents, script: HostScript) -> Self {
        let rng = StdRng::seed_from_u64(script.seed);
        Self {
            events,
            script,
            rng,
            calls: Vec::new(),
            next_id: 1,
            live_sessions: BTreeSet::new(),
            layers: BTreeMap::new(),
            pending_frames: BTreeMap::new(),
            clock_ms: 0.0,
        }
    }

    pub fn script(&self) -> &HostScript {
        &self.script
    }

    /// Adjusts the script between steps, e.g. to make the next end request fail.
    pub fn script_mut(&mut self) -> &mut HostScript {
        &mut self.script
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn count_calls(&self, predicate: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Layers created and not yet destroyed, alone or with their session.
    pub fn live_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn live_sessions(&self) -> usize {
        self.live_sessions.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.pending_frames.len()
    }

    /// Fires every pending animation-frame request at the next refresh tick.
    /// Returns how many callbacks were queued.
    pub fn advance_frame(&mut self) -> usize {
        let interval = self.script.refresh_interval.as_secs_f64() * 1000.0;
        // Never wander further than one refresh period.
        let bound = self.script.jitter_ms.min(interval);
        let jitter = if bound > 0.0 && bound.is_finite() {
            self.rng.gen_range(-bound..=bound)
        } else {
            0.0
        };
        self.clock_ms += interval;
        let timestamp_ms = (self.clock_ms + jitter).max(0.0);

        let due = std::mem::take(&mut self.pending_frames);
        let count = due.len();
        for (handle, session) in due {
            self.events.send(HostEvent::AnimationFrame {
                session,
                handle,
                timestamp_ms,
            });
        }
        count
    }

    /// Ends every live session on the platform's own initiative.
    pub fn end_from_platform(&mut self) -> usize {
        let sessions: Vec<SessionId> = self.live_sessions.iter().copied().collect();
        for session in &sessions {
            self.finish_session(*session);
        }
        sessions.len()
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn finish_session(&mut self, session: SessionId) {
        self.live_sessions.remove(&session);
        self.layers.retain(|_, owner| *owner != session);
        self.pending_frames.retain(|_, owner| *owner != session);
        self.events.send(HostEvent::SessionEnded { session });
    }
}

impl XrHost for SimulatedHost {
    fn is_available(&self) -> bool {
        self.script.api_available
    }

    fn query_support(&mut self, mode: SessionMode) {
        self.calls.push(HostCall::QuerySupport(mode));
        let result = match &self.script.fail_queries {
            Some(reason) => Err(HostError::new(reason.clone())),
            None => Ok(self.script.supported_modes.contains(&mode)),
        };
        self.events.send(HostEvent::SupportResolved { mode, result });
    }

    fn request_session(&mut self, request: &SessionRequest) {
        self.calls.push(HostCall::RequestSession(request.clone()));
        if let Some(reason) = &self.script.reject_request {
            let reason = HostError::new(reason.clone());
            self.events.send(HostEvent::SessionRejected { reason });
            return;
        }
        if !self.script.supported_modes.contains(&request.mode) {
            let reason = HostError::new(format!("NotSupportedError: {}", request.mode));
            self.events.send(HostEvent::SessionRejected { reason });
            return;
        }
        let session = SessionId(self.allocate());
        self.live_sessions.insert(session);
        self.events.send(HostEvent::SessionGranted { session });
    }

    fn make_context_compatible(&mut self, context: ContextId, session: SessionId) {
        self.calls
            .push(HostCall::MakeContextCompatible(context, session));
        let result = match &self.script.fail_compatibility {
            Some(reason) => Err(HostError::new(reason.clone())),
            None => Ok(()),
        };
        self.events
            .send(HostEvent::ContextCompatible { session, result });
    }

    fn create_layer(
        &mut self,
        context: ContextId,
        session: SessionId,
    ) -> Result<LayerId, HostError> {
        self.calls.push(HostCall::CreateLayer(context, session));
        if let Some(reason) = &self.script.fail_layer_creation {
            return Err(HostError::new(reason.clone()));
        }
        let layer = LayerId(self.allocate());
        self.layers.insert(layer, session);
        Ok(layer)
    }

    fn update_render_state(&mut self, session: SessionId, layer: LayerId) -> Result<(), HostError> {
        self.calls.push(HostCall::UpdateRenderState(session, layer));
        if let Some(reason) = &self.script.fail_layer_attachment {
            return Err(HostError::new(reason.clone()));
        }
        Ok(())
    }

    fn destroy_layer(&mut self, layer: LayerId) {
        self.calls.push(HostCall::DestroyLayer(layer));
        self.layers.remove(&layer);
    }

    fn end_session(&mut self, session: SessionId) {
        self.calls.push(HostCall::EndSession(session));
        if let Some(reason) = &self.script.reject_end {
            let reason = HostError::new(reason.clone());
            self.events
                .send(HostEvent::EndRejected { session, reason });
            return;
        }
        if self.live_sessions.contains(&session) {
            self.finish_session(session);
        }
    }

    fn request_animation_frame(&mut self, session: SessionId) -> FrameHandle {
        let handle = FrameHandle(self.allocate());
        self.calls
            .push(HostCall::RequestAnimationFrame(session, handle));
        if self.live_sessions.contains(&session) {
            self.pending_frames.insert(handle, session);
        }
        handle
    }

    fn cancel_animation_frame(&mut self, session: SessionId, handle: FrameHandle) {
        self.calls
            .push(HostCall::CancelAnimationFrame(session, handle));
        self.pending_frames.remove(&handle);
    }
}
