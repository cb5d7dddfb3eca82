//! Seam between the session lifecycle and the host platform.
//!
//! Every asynchronous host operation is issued as a fire-and-forget call on
//! [`XrHost`]. Its completion comes back later as a [`HostEvent`] pushed onto
//! the [`HostEvents`] sender the host was built with:
//!
//! ```text
//!   SessionController ──XrHost::request_session()──▶ host
//!          ▲                                          │
//!          └──── dispatch() ◀── HostEventQueue ◀──────┘ HostEvent::SessionGranted
//! ```
//!
//! Nothing is delivered re-entrantly: the controller only observes a
//! completion when the queue is pumped, which keeps each transition atomic
//! with respect to user triggers.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::HostError;
use crate::types::{ContextId, FrameHandle, LayerId, SessionId, SessionMode, SessionRequest};

/// Completion of an asynchronous host operation, or a host-initiated notification.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    SupportResolved {
        mode: SessionMode,
        result: Result<bool, HostError>,
    },
    SessionGranted {
        session: SessionId,
    },
    SessionRejected {
        reason: HostError,
    },
    ContextCompatible {
        session: SessionId,
        result: Result<(), HostError>,
    },
    /// The session is over, whether the controller asked for it or the platform did.
    SessionEnded {
        session: SessionId,
    },
    EndRejected {
        session: SessionId,
        reason: HostError,
    },
    AnimationFrame {
        session: SessionId,
        handle: FrameHandle,
        /// Host clock in milliseconds.
        timestamp_ms: f64,
    },
}

/// Host platform session API.
pub trait XrHost {
    /// Whether the host exposes an immersive API at all.
    fn is_available(&self) -> bool;

    /// Resolves with [`HostEvent::SupportResolved`].
    fn query_support(&mut self, mode: SessionMode);

    /// Resolves with [`HostEvent::SessionGranted`] or [`HostEvent::SessionRejected`].
    fn request_session(&mut self, request: &SessionRequest);

    /// Resolves with [`HostEvent::ContextCompatible`].
    fn make_context_compatible(&mut self, context: ContextId, session: SessionId);

    fn create_layer(&mut self, context: ContextId, session: SessionId)
        -> Result<LayerId, HostError>;

    fn update_render_state(&mut self, session: SessionId, layer: LayerId)
        -> Result<(), HostError>;

    fn destroy_layer(&mut self, layer: LayerId);

    /// Resolves with [`HostEvent::SessionEnded`] or [`HostEvent::EndRejected`].
    fn end_session(&mut self, session: SessionId);

    /// Schedules one [`HostEvent::AnimationFrame`] for the next display refresh.
    fn request_animation_frame(&mut self, session: SessionId) -> FrameHandle;

    fn cancel_animation_frame(&mut self, session: SessionId, handle: FrameHandle);
}

/// Sending half handed to the host so it can report completions.
#[derive(Debug, Clone)]
pub struct HostEvents {
    sender: Sender<HostEvent>,
}

impl HostEvents {
    pub fn send(&self, event: HostEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("host event dropped; controller queue is gone");
        }
    }
}

/// Receiving half drained by the controller.
#[derive(Debug)]
pub struct HostEventQueue {
    receiver: Receiver<HostEvent>,
}

impl HostEventQueue {
    pub fn try_next(&self) -> Option<HostEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Creates a connected sender/queue pair.
pub fn event_channel() -> (HostEvents, HostEventQueue) {
    let (sender, receiver) = unbounded();
    (HostEvents { sender }, HostEventQueue { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_send_order() {
        let (events, queue) = event_channel();
        events.send(HostEvent::SessionGranted {
            session: SessionId(1),
        });
        events.send(HostEvent::SessionEnded {
            session: SessionId(1),
        });
        assert_eq!(queue.len(), 2);
        assert!(matches!(
            queue.try_next(),
            Some(HostEvent::SessionGranted { .. })
        ));
        assert!(matches!(
            queue.try_next(),
            Some(HostEvent::SessionEnded { .. })
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn sending_after_queue_drop_is_silent() {
        let (events, queue) = event_channel();
        drop(queue);
        events.send(HostEvent::SessionRejected {
            reason: HostError::new("late"),
        });
    }
}
