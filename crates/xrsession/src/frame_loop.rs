use tracing::{debug, trace};

use crate::host::XrHost;
use crate::types::{FrameHandle, SessionId};

/// Snapshot of frame timing handed to the render collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Host timestamp in milliseconds; strictly increasing within one session.
    pub timestamp_ms: f64,
    /// Milliseconds since the first frame of the session.
    pub elapsed_ms: f64,
    /// Milliseconds since the previously rendered frame.
    pub delta_ms: f64,
    /// Rendered-frame counter for the running session.
    pub frame_index: u64,
}

/// Why a delivered frame was not rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The timestamp did not advance past the previous frame.
    NonMonotonic,
    /// The frame arrived sooner than the configured FPS cap allows.
    Throttled,
}

/// What the driver did with one animation-frame callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameDisposition {
    Rendered(FrameTime),
    Skipped(SkipReason),
    /// The callback belongs to a loop that is no longer installed.
    Stale,
}

/// Optional frame-rate cap measured against host timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacer {
    min_interval_ms: Option<f64>,
    last_rendered_ms: Option<f64>,
}

impl FramePacer {
    /// `None`, zero, or negative caps mean every refresh is rendered.
    pub fn new(max_fps: Option<f32>) -> Self {
        let min_interval_ms = max_fps
            .filter(|fps| *fps > 0.0 && fps.is_finite())
            .map(|fps| 1000.0 / f64::from(fps));
        Self {
            min_interval_ms,
            last_rendered_ms: None,
        }
    }

    pub fn ready(&self, timestamp_ms: f64) -> bool {
        match (self.min_interval_ms, self.last_rendered_ms) {
            (Some(interval), Some(last)) => timestamp_ms - last >= interval,
            _ => true,
        }
    }

    pub fn mark_rendered(&mut self, timestamp_ms: f64) {
        self.last_rendered_ms = Some(timestamp_ms);
    }

    pub fn reset(&mut self) {
        self.last_rendered_ms = None;
    }

    pub fn is_capped(&self) -> bool {
        self.min_interval_ms.is_some()
    }
}

#[derive(Debug, Clone)]
struct InstalledLoop {
    session: SessionId,
    pending: Option<FrameHandle>,
    origin_ms: Option<f64>,
    last_ms: Option<f64>,
    frame_index: u64,
}

/// Keeps one animation-frame request outstanding per refresh while a session
/// is active and forwards each accepted frame to the render callback.
#[derive(Debug, Clone)]
pub struct FrameLoopDriver {
    installed: Option<InstalledLoop>,
    pacer: FramePacer,
    frames_rendered: u64,
}

impl FrameLoopDriver {
    pub fn new(max_fps: Option<f32>) -> Self {
        Self {
            installed: None,
            pacer: FramePacer::new(max_fps),
            frames_rendered: 0,
        }
    }

    /// Installs the loop for `session`. A no-op returning `false` when a loop
    /// is already installed.
    pub fn start<H: XrHost>(&mut self, host: &mut H, session: SessionId) -> bool {
        if let Some(installed) = &self.installed {
            debug!(
                session = %session,
                running = %installed.session,
                "frame loop already running"
            );
            return false;
        }
        let handle = host.request_animation_frame(session);
        self.pacer.reset();
        self.installed = Some(InstalledLoop {
            session,
            pending: Some(handle),
            origin_ms: None,
            last_ms: None,
            frame_index: 0,
        });
        debug!(session = %session, "frame loop started");
        true
    }

    /// Uninstalls the loop. A no-op returning `false` when nothing is running.
    pub fn stop<H: XrHost>(&mut self, host: &mut H) -> bool {
        let Some(installed) = self.installed.take() else {
            return false;
        };
        if let Some(handle) = installed.pending {
            host.cancel_animation_frame(installed.session, handle);
        }
        debug!(
            session = %installed.session,
            frames = installed.frame_index,
            "frame loop stopped"
        );
        true
    }

    pub fn is_running(&self) -> bool {
        self.installed.is_some()
    }

    pub fn session(&self) -> Option<SessionId> {
        self.installed.as_ref().map(|installed| installed.session)
    }

    /// Frames rendered across every session driven so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Handles one animation-frame callback. The next frame is requested
    /// before `render` runs so the loop keeps going whatever the renderer does.
    pub fn on_frame<H, F>(
        &mut self,
        host: &mut H,
        session: SessionId,
        handle: FrameHandle,
        timestamp_ms: f64,
        render: F,
    ) -> FrameDisposition
    where
        H: XrHost,
        F: FnOnce(&FrameTime),
    {
        let Some(installed) = self.installed.as_mut() else {
            return FrameDisposition::Stale;
        };
        if installed.session != session || installed.pending != Some(handle) {
            return FrameDisposition::Stale;
        }

        installed.pending = Some(host.request_animation_frame(session));

        if installed
            .last_ms
            .is_some_and(|last| timestamp_ms <= last)
        {
            trace!(session = %session, timestamp_ms, "dropping non-monotonic frame");
            return FrameDisposition::Skipped(SkipReason::NonMonotonic);
        }
        if !self.pacer.ready(timestamp_ms) {
            trace!(session = %session, timestamp_ms, "frame throttled");
            return FrameDisposition::Skipped(SkipReason::Throttled);
        }

        let origin = *installed.origin_ms.get_or_insert(timestamp_ms);
        let time = FrameTime {
            timestamp_ms,
            elapsed_ms: timestamp_ms - origin,
            delta_ms: installed.last_ms.map_or(0.0, |last| timestamp_ms - last),
            frame_index: installed.frame_index,
        };
        installed.last_ms = Some(timestamp_ms);
        installed.frame_index = installed.frame_index.saturating_add(1);
        self.pacer.mark_rendered(timestamp_ms);
        self.frames_rendered = self.frames_rendered.saturating_add(1);

        trace!(session = %session, frame = time.frame_index, timestamp_ms, "rendering frame");
        render(&time);
        FrameDisposition::Rendered(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::event_channel;
    use crate::sim::{HostCall, HostScript, SimulatedHost};

    fn host() -> SimulatedHost {
        let (events, _queue) = event_channel();
        SimulatedHost::new(events, HostScript::default())
    }

    fn pending_handle(host: &SimulatedHost) -> FrameHandle {
        host.calls()
            .iter()
            .rev()
            .find_map(|call| match call {
                HostCall::RequestAnimationFrame(_, handle) => Some(*handle),
                _ => None,
            })
            .expect("a frame was requested")
    }

    #[test]
    fn start_twice_installs_once() {
        let mut host = host();
        let mut driver = FrameLoopDriver::new(None);
        assert!(driver.start(&mut host, SessionId(1)));
        assert!(!driver.start(&mut host, SessionId(1)));
        let requests = host
            .calls()
            .iter()
            .filter(|call| matches!(call, HostCall::RequestAnimationFrame(..)))
            .count();
        assert_eq!(requests, 1);
    }

    #[test]
    fn stop_when_idle_is_noop() {
        let mut host = host();
        let mut driver = FrameLoopDriver::new(None);
        assert!(!driver.stop(&mut host));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn frames_render_with_increasing_timestamps() {
        let mut host = host();
        let mut driver = FrameLoopDriver::new(None);
        let session = SessionId(1);
        driver.start(&mut host, session);

        let mut seen = Vec::new();
        for timestamp in [100.0, 111.0, 122.0] {
            let handle = pending_handle(&host);
            let outcome = driver.on_frame(&mut host, session, handle, timestamp, |time| {
                seen.push(*time)
            });
            assert!(matches!(outcome, FrameDisposition::Rendered(_)));
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].elapsed_ms, 0.0);
        assert_eq!(seen[2].elapsed_ms, 22.0);
        assert_eq!(seen[1].delta_ms, 11.0);
        assert_eq!(seen[2].frame_index, 2);
        assert_eq!(driver.frames_rendered(), 3);
    }

    #[test]
    fn non_monotonic_frame_is_skipped_but_loop_continues() {
        let mut host = host();
        let mut driver = FrameLoopDriver::new(None);
        let session = SessionId(1);
        driver.start(&mut host, session);
        let handle = pending_handle(&host);
        driver.on_frame(&mut host, session, handle, 50.0, |_| {});
        let handle = pending_handle(&host);
        let outcome = driver.on_frame(&mut host, session, handle, 50.0, |_| {
            panic!("must not render")
        });
        assert_eq!(outcome, FrameDisposition::Skipped(SkipReason::NonMonotonic));
        assert_ne!(pending_handle(&host), handle);
    }

    #[test]
    fn stale_callbacks_are_ignored_after_stop() {
        let mut host = host();
        let mut driver = FrameLoopDriver::new(None);
        let session = SessionId(1);
        driver.start(&mut host, session);
        let handle = pending_handle(&host);
        assert!(driver.stop(&mut host));
        assert!(host
            .calls()
            .contains(&HostCall::CancelAnimationFrame(session, handle)));
        let outcome = driver.on_frame(&mut host, session, handle, 10.0, |_| {
            panic!("must not render")
        });
        assert_eq!(outcome, FrameDisposition::Stale);
    }

    #[test]
    fn pacer_throttles_to_cap() {
        let mut host = host();
        let mut driver = FrameLoopDriver::new(Some(30.0));
        let session = SessionId(1);
        driver.start(&mut host, session);
        let mut rendered = 0;
        for step in 0..6 {
            let handle = pending_handle(&host);
            let timestamp = f64::from(step) * 20.0;
            if let FrameDisposition::Rendered(_) =
                driver.on_frame(&mut host, session, handle, timestamp, |_| {})
            {
                rendered += 1;
            }
        }
        assert_eq!(rendered, 3);
    }

    #[test]
    fn zero_fps_is_uncapped() {
        assert!(!FramePacer::new(Some(0.0)).is_capped());
        assert!(!FramePacer::new(None).is_capped());
        assert!(FramePacer::new(Some(72.0)).is_capped());
    }
}
