//! The presentation collaborator the lifecycle drives but does not own.
//!
//! Scene construction, lighting, and materials live entirely behind
//! [`FrameRenderer`]. The lifecycle only needs to say "draw this frame" and to
//! hand out the [`RenderTarget`] a session should present from.

use anyhow::Result;

use crate::frame_loop::FrameTime;
use crate::types::{ContextId, LayerId, Session, SessionId};

/// External renderer: draws one frame of a scene through a camera.
pub trait FrameRenderer {
    type Scene;
    type Camera;

    fn render_frame(
        &mut self,
        scene: &Self::Scene,
        camera: &Self::Camera,
        time: &FrameTime,
    ) -> Result<()>;

    /// Called once the session is bound and about to be driven.
    fn session_started(&mut self, _session: &Session) {}

    /// Called after the frame loop for `session` has been torn down.
    fn session_ended(&mut self, _session: SessionId) {}
}

/// Scene, camera, and renderer built once at start-up and reused for every session.
pub struct Stage<R: FrameRenderer> {
    pub renderer: R,
    pub scene: R::Scene,
    pub camera: R::Camera,
}

impl<R: FrameRenderer> Stage<R> {
    pub fn new(renderer: R, scene: R::Scene, camera: R::Camera) -> Self {
        Self {
            renderer,
            scene,
            camera,
        }
    }

    pub(crate) fn render(&mut self, time: &FrameTime) -> Result<()> {
        self.renderer.render_frame(&self.scene, &self.camera, time)
    }
}

/// Rendering-capable surface. Created once and reused across sessions; only
/// the surface binder mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    context: ContextId,
    xr_compatible: bool,
    layer: Option<LayerId>,
}

impl RenderTarget {
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            xr_compatible: false,
            layer: None,
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Whether the host has accepted the context for immersive use at least once.
    pub fn is_xr_compatible(&self) -> bool {
        self.xr_compatible
    }

    /// Layer currently presenting this target, if any.
    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    pub(crate) fn mark_xr_compatible(&mut self) {
        self.xr_compatible = true;
    }

    pub(crate) fn attach(&mut self, layer: LayerId) {
        self.layer = Some(layer);
    }

    pub(crate) fn detach(&mut self) -> Option<LayerId> {
        self.layer.take()
    }
}
