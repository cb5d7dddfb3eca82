use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use xrconfig::PreviewConfig;
use xrsession::sim::SimulatedHost;
use xrsession::{
    event_channel, ContextId, FrameRenderer, FrameTime, HostEventQueue, ProbeOutcome,
    RenderTarget, Session, SessionController, SessionId, SessionState, Stage, TriggerAction,
};

use crate::bindings::PreviewPlan;
use crate::cli::{EndBy, ReportFormat, RunArgs};
use crate::paths::AppPaths;

const PREVIEW_CONTEXT: ContextId = ContextId(1);

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the preview configuration. An explicit path must exist; the default
/// location is optional and falls back to built-in settings.
pub fn load_config(
    explicit: Option<&Path>,
    paths: &AppPaths,
) -> Result<(PreviewConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = paths.config_file();
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no preview config; using defaults");
                return Ok((PreviewConfig::default(), None));
            }
            path
        }
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = PreviewConfig::from_toml_str(&raw)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok((config, Some(path)))
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let (config, source) = load_config(args.config.as_deref(), &paths)?;
    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        source = ?source,
        "resolved xrpreview configuration"
    );

    let mut plan = PreviewPlan::from_config(&config);
    plan.apply_overrides(&args);

    let report = replay(plan, args.frames, args.end_by)?;
    match args.report {
        ReportFormat::Text => print!("{}", report.to_text()),
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Scene graph the preview renderer draws each frame.
#[derive(Debug, Clone)]
pub struct PreviewScene {
    pub objects: Vec<&'static str>,
}

impl Default for PreviewScene {
    fn default() -> Self {
        Self {
            objects: vec!["cube", "hemisphere-light"],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PreviewCamera {
    pub fov_deg: f32,
}

impl Default for PreviewCamera {
    fn default() -> Self {
        Self { fov_deg: 70.0 }
    }
}

/// Stand-in for a GPU renderer: spins the scene and logs each frame.
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    rotation_rad: f64,
    frames: u64,
}

impl FrameRenderer for ConsoleRenderer {
    type Scene = PreviewScene;
    type Camera = PreviewCamera;

    fn render_frame(
        &mut self,
        scene: &PreviewScene,
        camera: &PreviewCamera,
        time: &FrameTime,
    ) -> Result<()> {
        self.rotation_rad = (time.elapsed_ms / 1000.0) % std::f64::consts::TAU;
        self.frames += 1;
        tracing::trace!(
            frame = time.frame_index,
            delta_ms = time.delta_ms,
            rotation = self.rotation_rad,
            objects = scene.objects.len(),
            fov = camera.fov_deg,
            "frame drawn"
        );
        Ok(())
    }

    fn session_started(&mut self, session: &Session) {
        tracing::info!(
            session = %session.id,
            mode = %session.mode,
            reference_space = %session.reference_space,
            "presenting scene"
        );
    }

    fn session_ended(&mut self, session: SessionId) {
        tracing::info!(session = %session, frames = self.frames, "presentation stopped");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub state: SessionState,
    pub trigger_label: String,
    pub trigger_action: TriggerAction,
    pub trigger_visible: bool,
    pub probe: String,
    pub attempts: u64,
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub frames_rendered: u64,
    pub render_errors: u64,
    pub last_error: Option<String>,
}

impl RunReport {
    fn capture(controller: &Controller) -> Self {
        let stats = controller.stats();
        let trigger = controller.trigger();
        Self {
            state: controller.state(),
            trigger_label: trigger.label().to_string(),
            trigger_action: trigger.action(),
            trigger_visible: trigger.is_visible(),
            probe: describe_probe(controller.probe_outcome()),
            attempts: stats.attempts,
            sessions_started: stats.sessions_started,
            sessions_completed: stats.sessions_completed,
            frames_rendered: stats.frames_rendered,
            render_errors: stats.render_errors,
            last_error: controller.last_error().map(|err| err.to_string()),
        }
    }

    pub fn to_text(&self) -> String {
        let action = match self.trigger_action {
            TriggerAction::Start => "start",
            TriggerAction::Stop => "stop",
        };
        let visibility = if self.trigger_visible { "" } else { ", hidden" };
        let mut out = String::new();
        out.push_str(&format!("state:              {}\n", self.state));
        out.push_str(&format!(
            "trigger:            {} ({action}{visibility})\n",
            self.trigger_label
        ));
        out.push_str(&format!("probe:              {}\n", self.probe));
        out.push_str(&format!("attempts:           {}\n", self.attempts));
        out.push_str(&format!("sessions started:   {}\n", self.sessions_started));
        out.push_str(&format!("sessions completed: {}\n", self.sessions_completed));
        out.push_str(&format!("frames rendered:    {}\n", self.frames_rendered));
        out.push_str(&format!("render errors:      {}\n", self.render_errors));
        out.push_str(&format!(
            "last error:         {}\n",
            self.last_error.as_deref().unwrap_or("none")
        ));
        out
    }
}

type Controller = SessionController<SimulatedHost, ConsoleRenderer>;

fn describe_probe(outcome: Option<&ProbeOutcome>) -> String {
    match outcome {
        None => "pending".to_string(),
        Some(ProbeOutcome::Supported(mode)) => format!("{mode} supported"),
        Some(ProbeOutcome::Fallback { primary, fallback }) => match fallback {
            Some((mode, result)) => format!("primary {primary}; fallback {mode} {result}"),
            None => format!("primary {primary}; no fallback"),
        },
    }
}

/// Drives one scripted lifecycle: probe, start, deliver frames, end.
pub fn replay(plan: PreviewPlan, frames: u32, end_by: EndBy) -> Result<RunReport> {
    let (events, queue) = event_channel();
    let host = SimulatedHost::new(events, plan.script);
    let stage = Stage::new(
        ConsoleRenderer::default(),
        PreviewScene::default(),
        PreviewCamera::default(),
    );
    let mut controller = SessionController::new(
        host,
        stage,
        RenderTarget::new(PREVIEW_CONTEXT),
        plan.controller,
    );

    controller.init();
    settle(&mut controller, &queue, "probe")?;

    if !controller.trigger().is_visible() {
        tracing::info!("session trigger hidden; nothing to start");
    } else {
        controller.activate();
        settle(&mut controller, &queue, "start")?;

        if controller.state() == SessionState::Active {
            for _ in 0..frames {
                if controller.host_mut().advance_frame() == 0 {
                    break;
                }
                settle(&mut controller, &queue, "frame")?;
            }

            match end_by {
                EndBy::User => controller.activate(),
                EndBy::Host => {
                    controller.host_mut().end_from_platform();
                }
            }
            settle(&mut controller, &queue, "end")?;
        }
    }

    let report = RunReport::capture(&controller);
    controller.dispose();
    settle(&mut controller, &queue, "dispose")?;
    Ok(report)
}

fn settle(controller: &mut Controller, queue: &HostEventQueue, step: &str) -> Result<()> {
    let handled = controller.pump(queue);
    tracing::debug!(step, handled, state = %controller.state(), "host events drained");
    if !controller.invariants_hold() {
        bail!(
            "lifecycle invariant violated after {step} (state {}, frame loop running: {})",
            controller.state(),
            controller.is_frame_loop_running()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrconfig::PreviewConfig;

    fn plan() -> PreviewPlan {
        PreviewPlan::from_config(&PreviewConfig::default())
    }

    #[test]
    fn user_ended_replay_renders_every_frame() {
        let report = replay(plan(), 30, EndBy::User).unwrap();
        assert_eq!(report.state, SessionState::Idle);
        assert_eq!(report.trigger_label, "Enter XR");
        assert_eq!(report.attempts, 1);
        assert_eq!(report.sessions_completed, 1);
        assert_eq!(report.frames_rendered, 30);
        assert!(report.last_error.is_none());
    }

    #[test]
    fn unsupported_platform_never_attempts() {
        let mut plan = plan();
        plan.script.supported_modes.clear();
        let report = replay(plan, 30, EndBy::User).unwrap();
        assert_eq!(report.attempts, 0);
        assert!(!report.trigger_visible);
        assert!(report.last_error.is_some());
        assert!(report.to_text().contains("hidden"));
    }

    #[test]
    fn layer_failure_reports_binding_error() {
        let mut plan = plan();
        plan.script.fail_layer_attachment = Some("InvalidStateError".into());
        let report = replay(plan, 30, EndBy::Host).unwrap();
        assert_eq!(report.state, SessionState::Idle);
        assert_eq!(report.frames_rendered, 0);
        let error = report.last_error.unwrap();
        assert!(error.contains("layer attachment"), "{error}");
    }
}
