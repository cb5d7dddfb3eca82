use xrconfig::{ModeSetting, PreviewConfig, ReferenceSpaceSetting};
use xrsession::sim::HostScript;
use xrsession::{ControllerConfig, ReferenceSpaceKind, SessionMode, SessionRequest, TriggerLabels};

use crate::cli::{FallbackArg, RunArgs};

/// Everything one replay needs: how the controller behaves and how the
/// simulated platform answers it.
#[derive(Debug, Clone)]
pub struct PreviewPlan {
    pub controller: ControllerConfig,
    pub script: HostScript,
}

impl PreviewPlan {
    pub fn from_config(config: &PreviewConfig) -> Self {
        Self {
            controller: controller_config(config),
            script: host_script(config),
        }
    }

    /// Command-line flags win over file settings.
    pub fn apply_overrides(&mut self, args: &RunArgs) {
        if let Some(mode) = args.mode {
            self.controller.request.mode = mode;
        }
        match args.fallback_mode {
            Some(FallbackArg::Disabled) => self.controller.fallback_mode = None,
            Some(FallbackArg::Mode(mode)) => self.controller.fallback_mode = Some(mode),
            None => {}
        }
        if let Some(fps) = args.fps {
            self.controller.max_fps = Some(fps).filter(|fps| *fps > 0.0);
        }
        if let Some(seed) = args.seed {
            self.script.seed = seed;
        }

        let script = &mut self.script;
        if args.unsupported {
            script.supported_modes.clear();
        }
        if args.reject_request {
            script.reject_request = Some("NotAllowedError: session request denied".into());
        }
        if args.fail_compat {
            script.fail_compatibility =
                Some("InvalidStateError: context cannot be made compatible".into());
        }
        if args.fail_layer {
            script.fail_layer_attachment =
                Some("InvalidStateError: layer cannot be attached".into());
        }
        if args.reject_end {
            script.reject_end = Some("InvalidStateError: session cannot be ended".into());
        }
    }
}

pub fn map_mode(mode: ModeSetting) -> SessionMode {
    match mode {
        ModeSetting::Inline => SessionMode::Inline,
        ModeSetting::ImmersiveVr => SessionMode::ImmersiveVr,
        ModeSetting::ImmersiveAr => SessionMode::ImmersiveAr,
    }
}

pub fn map_reference_space(space: ReferenceSpaceSetting) -> ReferenceSpaceKind {
    match space {
        ReferenceSpaceSetting::Viewer => ReferenceSpaceKind::Viewer,
        ReferenceSpaceSetting::Local => ReferenceSpaceKind::Local,
        ReferenceSpaceSetting::LocalFloor => ReferenceSpaceKind::LocalFloor,
        ReferenceSpaceSetting::BoundedFloor => ReferenceSpaceKind::BoundedFloor,
        ReferenceSpaceSetting::Unbounded => ReferenceSpaceKind::Unbounded,
    }
}

fn controller_config(config: &PreviewConfig) -> ControllerConfig {
    let session = &config.session;
    ControllerConfig {
        request: SessionRequest {
            mode: map_mode(session.mode),
            required_features: session.required_features.clone(),
            optional_features: session.optional_features.clone(),
            reference_space: map_reference_space(session.reference_space),
        },
        fallback_mode: session.fallback_mode.map(map_mode),
        labels: TriggerLabels {
            enter: config.trigger.enter_label.clone(),
            exit: config.trigger.exit_label.clone(),
        },
        max_fps: config.max_fps(),
    }
}

fn host_script(config: &PreviewConfig) -> HostScript {
    let simulation = &config.simulation;
    HostScript {
        supported_modes: simulation
            .supported_modes
            .iter()
            .copied()
            .map(map_mode)
            .collect(),
        refresh_interval: simulation.refresh_interval,
        jitter_ms: simulation.jitter_ms,
        seed: simulation.seed,
        ..HostScript::default()
    }
}
