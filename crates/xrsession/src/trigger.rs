use serde::Serialize;

use crate::types::SessionState;

pub const DEFAULT_ENTER_LABEL: &str = "Enter XR";
pub const DEFAULT_EXIT_LABEL: &str = "STOP AR";

/// Handler attached to the affordance. Exactly one is attached at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerAction {
    Start,
    Stop,
}

/// Label text for each handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerLabels {
    pub enter: String,
    pub exit: String,
}

impl Default for TriggerLabels {
    fn default() -> Self {
        Self {
            enter: DEFAULT_ENTER_LABEL.to_string(),
            exit: DEFAULT_EXIT_LABEL.to_string(),
        }
    }
}

/// What the affordance should show for a given lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerView {
    pub label: String,
    pub action: TriggerAction,
}

/// Single start/stop control. Its label and handler are a pure projection of
/// the session state, refreshed after every transition.
#[derive(Debug, Clone)]
pub struct TriggerSurface {
    labels: TriggerLabels,
    view: TriggerView,
    visible: bool,
}

impl TriggerSurface {
    pub fn new(labels: TriggerLabels) -> Self {
        let view = Self::project(&labels, SessionState::Idle);
        Self {
            labels,
            view,
            visible: false,
        }
    }

    /// Maps a state onto the label and handler it must present.
    ///
    /// The handler keeps its pre-transition value while a transition is in
    /// flight; the controller ignores it until the state settles.
    pub fn project(labels: &TriggerLabels, state: SessionState) -> TriggerView {
        match state {
            SessionState::Idle | SessionState::Requesting => TriggerView {
                label: labels.enter.clone(),
                action: TriggerAction::Start,
            },
            SessionState::Active | SessionState::Ending => TriggerView {
                label: labels.exit.clone(),
                action: TriggerAction::Stop,
            },
        }
    }

    /// Re-renders the affordance for `state`. Returns true when anything changed.
    pub fn render(&mut self, state: SessionState) -> bool {
        let next = Self::project(&self.labels, state);
        if next == self.view {
            return false;
        }
        self.view = next;
        true
    }

    /// Shows the affordance once the platform has confirmed support.
    pub fn reveal(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn label(&self) -> &str {
        &self.view.label
    }

    pub fn action(&self) -> TriggerAction {
        self.view.action
    }

    pub fn view(&self) -> &TriggerView {
        &self.view
    }

    pub fn labels(&self) -> &TriggerLabels {
        &self.labels
    }
}

impl Default for TriggerSurface {
    fn default() -> Self {
        Self::new(TriggerLabels::default())
    }
}
