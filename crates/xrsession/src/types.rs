use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Capability tier requested from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Non-immersive preview rendered into the page.
    Inline,
    /// Full headset presentation.
    ImmersiveVr,
    /// Pass-through augmentation of the real world.
    ImmersiveAr,
}

impl SessionMode {
    /// Mode string as spelled by the host API.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Inline => "inline",
            SessionMode::ImmersiveVr => "immersive-vr",
            SessionMode::ImmersiveAr => "immersive-ar",
        }
    }

    pub fn is_immersive(&self) -> bool {
        !matches!(self, SessionMode::Inline)
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(SessionMode::Inline),
            "immersive-vr" | "vr" => Ok(SessionMode::ImmersiveVr),
            "immersive-ar" | "ar" => Ok(SessionMode::ImmersiveAr),
            other => Err(format!(
                "unknown session mode '{other}'; expected inline, immersive-vr, or immersive-ar"
            )),
        }
    }
}

/// Coordinate system the renderer tracks once a session is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSpaceKind {
    Viewer,
    #[default]
    Local,
    LocalFloor,
    BoundedFloor,
    Unbounded,
}

impl ReferenceSpaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceSpaceKind::Viewer => "viewer",
            ReferenceSpaceKind::Local => "local",
            ReferenceSpaceKind::LocalFloor => "local-floor",
            ReferenceSpaceKind::BoundedFloor => "bounded-floor",
            ReferenceSpaceKind::Unbounded => "unbounded",
        }
    }
}

impl fmt::Display for ReferenceSpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! host_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

host_id!(
    /// Host-issued identity of one session instance. Never reused.
    SessionId,
    "session"
);
host_id!(
    /// Output layer wrapping a rendering context for one session.
    LayerId,
    "layer"
);
host_id!(
    /// Rendering context owned by the render target.
    ContextId,
    "context"
);
host_id!(
    /// Pending animation-frame request.
    FrameHandle,
    "frame"
);

/// Everything the host needs to grant a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub mode: SessionMode,
    pub required_features: Vec<String>,
    pub optional_features: Vec<String>,
    /// Reference space handed to the renderer once the session is bound.
    pub reference_space: ReferenceSpaceKind,
}

impl SessionRequest {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

impl Default for SessionRequest {
    fn default() -> Self {
        Self {
            mode: SessionMode::ImmersiveAr,
            required_features: vec!["viewer".to_string(), "local".to_string()],
            optional_features: Vec::new(),
            reference_space: ReferenceSpaceKind::Local,
        }
    }
}

/// Outcome of a single capability query. Produced once per probe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupportResult {
    Supported,
    Unsupported,
    QueryFailed(String),
}

impl SupportResult {
    pub fn is_supported(&self) -> bool {
        matches!(self, SupportResult::Supported)
    }
}

impl fmt::Display for SupportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupportResult::Supported => f.write_str("supported"),
            SupportResult::Unsupported => f.write_str("unsupported"),
            SupportResult::QueryFailed(reason) => write!(f, "query failed ({reason})"),
        }
    }
}

/// Externally visible lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Requesting,
    Active,
    Ending,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Active => "active",
            SessionState::Ending => "ending",
        };
        f.write_str(label)
    }
}

/// An acquired, bound session. Owned by the controller while it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub mode: SessionMode,
    /// Output layer currently attached to the session.
    pub layer: LayerId,
    pub reference_space: ReferenceSpaceKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_mode_round_trips_host_strings() {
        for mode in [
            SessionMode::Inline,
            SessionMode::ImmersiveVr,
            SessionMode::ImmersiveAr,
        ] {
            assert_eq!(mode.as_str().parse::<SessionMode>(), Ok(mode));
        }
        assert_eq!("AR".parse::<SessionMode>(), Ok(SessionMode::ImmersiveAr));
        assert!("immersive".parse::<SessionMode>().is_err());
    }

    #[test]
    fn default_request_asks_for_viewer_and_local() {
        let request = SessionRequest::default();
        assert_eq!(request.mode, SessionMode::ImmersiveAr);
        assert_eq!(request.required_features, vec!["viewer", "local"]);
        assert_eq!(request.reference_space, ReferenceSpaceKind::Local);
    }

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(SessionId(3).to_string(), "session#3");
        assert_eq!(LayerId(9).to_string(), "layer#9");
    }
}
