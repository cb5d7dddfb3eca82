use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::binder::SurfaceBinder;
use crate::error::{BindStage, HostError, SessionError};
use crate::frame_loop::{FrameDisposition, FrameLoopDriver};
use crate::host::{HostEvent, HostEventQueue, XrHost};
use crate::probe::{CapabilityProbe, ProbeOutcome};
use crate::stage::{FrameRenderer, RenderTarget, Stage};
use crate::trigger::{TriggerAction, TriggerLabels, TriggerSurface};
use crate::types::{FrameHandle, Session, SessionId, SessionMode, SessionRequest, SessionState};

/// Static settings for one controller instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Session to request; its mode is also the primary probe target.
    pub request: SessionRequest,
    /// Mode queried when the primary one is unavailable.
    pub fallback_mode: Option<SessionMode>,
    pub labels: TriggerLabels,
    /// Frame-rate cap for the render loop; `None` renders every refresh.
    pub max_fps: Option<f32>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            request: SessionRequest::default(),
            fallback_mode: Some(SessionMode::Inline),
            labels: TriggerLabels::default(),
            max_fps: None,
        }
    }
}

/// Running counters for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleStats {
    /// Session requests actually sent to the host.
    pub attempts: u64,
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub frames_rendered: u64,
    pub render_errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Acquisition in flight; `granted` is set once the host handed over a
    /// session and binding is under way.
    Requesting { granted: Option<SessionId> },
    Active { session: Session },
    Ending { session: Session },
}

/// Owns the session lifecycle:
///
/// ```text
///   Idle ──start()──▶ Requesting ──granted + bound──▶ Active ──stop()──▶ Ending
///    ▲                    │                             │                  │
///    └──── rejected / bind failed ◀┘        platform end ┴──── ended ──────┘
/// ```
///
/// Every transition is applied from [`SessionController::start`],
/// [`SessionController::stop`], or one [`HostEvent`] passed to
/// [`SessionController::dispatch`]. The current phase alone decides whether a
/// trigger is honoured, so a click during `Requesting` or `Ending` is inert.
pub struct SessionController<H: XrHost, R: FrameRenderer> {
    host: H,
    stage: Stage<R>,
    target: RenderTarget,
    request: SessionRequest,
    probe: CapabilityProbe,
    binder: SurfaceBinder,
    frames: FrameLoopDriver,
    trigger: TriggerSurface,
    phase: Phase,
    abandoned: BTreeSet<SessionId>,
    stats: LifecycleStats,
    last_error: Option<SessionError>,
    disposed: bool,
}

impl<H: XrHost, R: FrameRenderer> SessionController<H, R> {
    pub fn new(host: H, stage: Stage<R>, target: RenderTarget, config: ControllerConfig) -> Self {
        let ControllerConfig {
            request,
            fallback_mode,
            labels,
            max_fps,
        } = config;
        Self {
            host,
            stage,
            target,
            probe: CapabilityProbe::new(request.mode, fallback_mode),
            request,
            binder: SurfaceBinder::new(),
            frames: FrameLoopDriver::new(max_fps),
            trigger: TriggerSurface::new(labels),
            phase: Phase::Idle,
            abandoned: BTreeSet::new(),
            stats: LifecycleStats::default(),
            last_error: None,
            disposed: false,
        }
    }

    /// Kicks off the capability probe. The trigger stays hidden until the
    /// primary mode is confirmed.
    pub fn init(&mut self) {
        info!(mode = %self.request.mode, "initializing session controller");
        if let Some(outcome) = self.probe.begin(&mut self.host) {
            self.apply_probe_outcome(outcome);
        }
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Requesting { .. } => SessionState::Requesting,
            Phase::Active { .. } => SessionState::Active,
            Phase::Ending { .. } => SessionState::Ending,
        }
    }

    /// The live session, present exactly while the frame loop runs.
    pub fn session(&self) -> Option<&Session> {
        match &self.phase {
            Phase::Active { session } | Phase::Ending { session } => Some(session),
            _ => None,
        }
    }

    pub fn is_frame_loop_running(&self) -> bool {
        self.frames.is_running()
    }

    pub fn trigger(&self) -> &TriggerSurface {
        &self.trigger
    }

    pub fn probe_outcome(&self) -> Option<&ProbeOutcome> {
        self.probe.outcome()
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn stage(&self) -> &Stage<R> {
        &self.stage
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn stats(&self) -> LifecycleStats {
        LifecycleStats {
            frames_rendered: self.frames.frames_rendered(),
            ..self.stats
        }
    }

    /// Most recent failure of a session attempt, if any.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Both lifecycle invariants: a session exists exactly while the frame
    /// loop runs, and the trigger shows the projection of the current state.
    pub fn invariants_hold(&self) -> bool {
        let loop_matches_session = self.session().is_some() == self.frames.is_running();
        let projected = TriggerSurface::project(self.trigger.labels(), self.state());
        loop_matches_session && self.trigger.view() == &projected
    }

    /// Runs whichever handler is currently attached to the trigger.
    pub fn activate(&mut self) {
        if !self.trigger.is_visible() {
            debug!("trigger activated while hidden; ignoring");
            return;
        }
        match self.trigger.action() {
            TriggerAction::Start => self.start(),
            TriggerAction::Stop => self.stop(),
        }
    }

    /// `Idle → Requesting`. A no-op in any other state.
    pub fn start(&mut self) {
        if self.disposed {
            debug!("start ignored; controller disposed");
            return;
        }
        if self.phase != Phase::Idle {
            debug!(state = %self.state(), "start ignored; transition already under way");
            return;
        }
        if self.probe.supported_mode().is_none() {
            debug!(mode = %self.request.mode, "start ignored; mode support not confirmed");
            return;
        }

        info!(mode = %self.request.mode, "requesting session");
        self.stats.attempts += 1;
        self.transition(Phase::Requesting { granted: None });
        self.host.request_session(&self.request);
    }

    /// `Active → Ending`. A no-op in any other state.
    pub fn stop(&mut self) {
        let session = match &self.phase {
            Phase::Active { session } => session.clone(),
            _ => {
                debug!(state = %self.state(), "stop ignored; no active session");
                return;
            }
        };
        info!(session = %session.id, "ending session");
        let id = session.id;
        self.transition(Phase::Ending { session });
        self.host.end_session(id);
    }

    /// Drains the queue, dispatching every event. Returns how many were handled.
    pub fn pump(&mut self, queue: &HostEventQueue) -> usize {
        let mut handled = 0;
        while let Some(event) = queue.try_next() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Applies the transition for one host completion or notification.
    pub fn dispatch(&mut self, event: HostEvent) {
        if self.disposed {
            if let HostEvent::SessionGranted { session } = event {
                self.end_stray(session);
            } else {
                debug!(?event, "event ignored; controller disposed");
            }
            return;
        }

        match event {
            HostEvent::SupportResolved { mode, result } => {
                if let Some(outcome) = self.probe.resolve(&mut self.host, mode, result) {
                    self.apply_probe_outcome(outcome);
                }
            }
            HostEvent::SessionGranted { session } => self.on_granted(session),
            HostEvent::SessionRejected { reason } => self.on_rejected(reason),
            HostEvent::ContextCompatible { session, result } => {
                self.on_context_compatible(session, result)
            }
            HostEvent::SessionEnded { session } => self.on_ended(session),
            HostEvent::EndRejected { session, reason } => self.on_end_rejected(session, reason),
            HostEvent::AnimationFrame {
                session,
                handle,
                timestamp_ms,
            } => self.on_frame(session, handle, timestamp_ms),
        }
    }

    /// Tears the controller down. Any live session is ended, counted as
    /// completed, and the trigger hidden; later triggers and events are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {}
            Phase::Requesting { granted } => {
                if let Some(session) = granted {
                    self.binder.abort(session);
                    self.end_stray(session);
                }
            }
            Phase::Active { session } => {
                self.teardown(&session);
                self.stats.sessions_completed += 1;
                self.end_stray(session.id);
            }
            Phase::Ending { session } => {
                self.teardown(&session);
                self.stats.sessions_completed += 1;
                self.abandoned.insert(session.id);
            }
        }
        self.disposed = true;
        self.trigger.hide();
        self.trigger.render(SessionState::Idle);
        info!("session controller disposed");
    }

    fn apply_probe_outcome(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Supported(mode) => {
                self.trigger.reveal();
                info!(mode = %mode, label = %self.trigger.label(), "session trigger ready");
            }
            ProbeOutcome::Fallback { primary, .. } => {
                let err = SessionError::UnsupportedPlatform {
                    mode: self.probe.primary(),
                    reason: primary.to_string(),
                };
                warn!(error = %err, "immersive sessions disabled");
                self.last_error = Some(err);
            }
        }
    }

    fn on_granted(&mut self, session: SessionId) {
        if self.phase != (Phase::Requesting { granted: None }) {
            warn!(session = %session, state = %self.state(), "unexpected session grant");
            self.end_stray(session);
            return;
        }
        info!(session = %session, "session granted");
        match self.binder.begin(&mut self.host, &self.target, session) {
            Ok(()) => {
                self.phase = Phase::Requesting {
                    granted: Some(session),
                };
            }
            Err(err) => self.abandon(session, err),
        }
    }

    fn on_rejected(&mut self, reason: HostError) {
        if self.phase != (Phase::Requesting { granted: None }) {
            debug!(reason = %reason, "stale session rejection ignored");
            return;
        }
        let err = SessionError::AcquisitionFailure(reason);
        warn!(error = %err, "session request failed");
        self.last_error = Some(err);
        self.transition(Phase::Idle);
    }

    fn on_context_compatible(&mut self, session: SessionId, result: Result<(), HostError>) {
        if self.phase != (Phase::Requesting {
            granted: Some(session),
        }) {
            debug!(session = %session, "stale compatibility result ignored");
            return;
        }

        match self
            .binder
            .complete(&mut self.host, &mut self.target, session, result)
        {
            Ok(layer) => {
                let live = Session {
                    id: session,
                    mode: self.request.mode,
                    layer,
                    reference_space: self.request.reference_space,
                };
                self.stage.renderer.session_started(&live);
                self.frames.start(&mut self.host, session);
                self.stats.sessions_started += 1;
                info!(
                    session = %session,
                    layer = %layer,
                    reference_space = %live.reference_space,
                    "session started"
                );
                self.transition(Phase::Active { session: live });
            }
            Err(err) => self.abandon(session, err),
        }
    }

    fn on_ended(&mut self, ended: SessionId) {
        match &self.phase {
            Phase::Active { session } | Phase::Ending { session } if session.id == ended => {
                let session = session.clone();
                if self.state() == SessionState::Active {
                    info!(session = %ended, "session ended by the platform");
                }
                self.finish(&session);
            }
            Phase::Requesting {
                granted: Some(pending),
            } if *pending == ended => {
                self.binder.abort(ended);
                let err = SessionError::binding(
                    BindStage::Sequencing,
                    format!("{ended} ended before binding completed"),
                );
                warn!(error = %err, "session lost during binding");
                self.last_error = Some(err);
                self.transition(Phase::Idle);
            }
            _ => {
                if self.abandoned.remove(&ended) {
                    debug!(session = %ended, "abandoned session ended");
                } else {
                    debug!(session = %ended, "stale session end ignored");
                }
            }
        }
    }

    fn on_end_rejected(&mut self, rejected: SessionId, reason: HostError) {
        match &self.phase {
            Phase::Ending { session } if session.id == rejected => {
                let session = session.clone();
                let err = SessionError::TerminationFailure(reason);
                warn!(error = %err, session = %rejected, "forcing session teardown");
                self.last_error = Some(err);
                self.finish(&session);
            }
            _ => {
                self.abandoned.remove(&rejected);
                debug!(session = %rejected, reason = %reason, "end rejection ignored");
            }
        }
    }

    fn on_frame(&mut self, session: SessionId, handle: FrameHandle, timestamp_ms: f64) {
        let stage = &mut self.stage;
        let stats = &mut self.stats;
        let disposition =
            self.frames
                .on_frame(&mut self.host, session, handle, timestamp_ms, |time| {
                    if let Err(err) = stage.render(time) {
                        stats.render_errors += 1;
                        warn!(
                            session = %session,
                            frame = time.frame_index,
                            error = %err,
                            "render collaborator failed"
                        );
                    }
                });
        if disposition == FrameDisposition::Stale {
            debug!(session = %session, handle = %handle, "stale animation frame ignored");
        }
    }

    /// Ending → Idle (or Active → Idle on platform termination).
    fn finish(&mut self, session: &Session) {
        self.teardown(session);
        self.stats.sessions_completed += 1;
        info!(session = %session.id, "session ended");
        self.transition(Phase::Idle);
    }

    /// Stops the loop and releases the binding, in that order.
    fn teardown(&mut self, session: &Session) {
        self.frames.stop(&mut self.host);
        self.binder.release(&mut self.target, session.id);
        self.stage.renderer.session_ended(session.id);
    }

    /// Gives up on a granted session whose binding failed.
    fn abandon(&mut self, session: SessionId, err: SessionError) {
        warn!(session = %session, error = %err, "session binding failed");
        self.last_error = Some(err);
        self.transition(Phase::Idle);
        self.end_stray(session);
    }

    fn end_stray(&mut self, session: SessionId) {
        if self.abandoned.insert(session) {
            self.host.end_session(session);
        }
    }

    fn transition(&mut self, next: Phase) {
        let from = self.state();
        self.phase = next;
        let to = self.state();
        if self.trigger.render(to) {
            debug!(label = %self.trigger.label(), "trigger relabelled");
        }
        debug!(%from, %to, "session state transition");
    }
}
