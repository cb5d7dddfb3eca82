//! Immersive session lifecycle for an XR preview.
//!
//! The crate owns the part of an immersive page that has real control flow:
//! probing the platform, acquiring a session, binding the render target to
//! it, and driving the per-frame callback while it lives. The overall flow is:
//!
//! ```text
//!   TriggerSurface ──activate()──▶ SessionController ──request──▶ XrHost
//!                                        │  ▲                        │
//!                    SurfaceBinder ◀─────┤  └──── HostEvent ◀────────┘
//!                    FrameLoopDriver ◀───┘
//!                          │
//!                          └─▶ FrameRenderer::render_frame(scene, camera)
//! ```
//!
//! `SessionController` is the only stateful piece; `CapabilityProbe`,
//! `SurfaceBinder`, and `FrameLoopDriver` are owned by it and only ever
//! touched from its transitions. Scene construction stays behind the
//! [`FrameRenderer`] trait. [`sim::SimulatedHost`] provides a scripted host
//! for the preview binary and for tests.

pub mod binder;
pub mod controller;
pub mod error;
pub mod frame_loop;
pub mod host;
pub mod probe;
pub mod sim;
pub mod stage;
pub mod trigger;
pub mod types;

pub use binder::SurfaceBinder;
pub use controller::{ControllerConfig, LifecycleStats, SessionController};
pub use error::{BindStage, HostError, SessionError};
pub use frame_loop::{FrameDisposition, FrameLoopDriver, FramePacer, FrameTime, SkipReason};
pub use host::{event_channel, HostEvent, HostEventQueue, HostEvents, XrHost};
pub use probe::{CapabilityProbe, ProbeOutcome};
pub use stage::{FrameRenderer, RenderTarget, Stage};
pub use trigger::{TriggerAction, TriggerLabels, TriggerSurface, TriggerView};
pub use types::{
    ContextId, FrameHandle, LayerId, ReferenceSpaceKind, Session, SessionId, SessionMode,
    SessionRequest, SessionState, SupportResult,
};
