use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeSetting {
    Inline,
    ImmersiveVr,
    ImmersiveAr,
}

impl ModeSetting {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::ImmersiveVr => "immersive-vr",
            Self::ImmersiveAr => "immersive-ar",
        }
    }
}

impl fmt::Display for ModeSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSpaceSetting {
    Viewer,
    #[default]
    Local,
    LocalFloor,
    BoundedFloor,
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PreviewConfig {
    pub version: u32,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub trigger: TriggerSection,
    #[serde(default)]
    pub frame: FrameSection,
    #[serde(default)]
    pub simulation: SimulationSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionSection {
    #[serde(default = "default_mode")]
    pub mode: ModeSetting,
    /// Mode probed when `mode` is unavailable. `"none"` disables the fallback.
    #[serde(
        default = "default_fallback_mode",
        deserialize_with = "deserialize_fallback_mode"
    )]
    pub fallback_mode: Option<ModeSetting>,
    #[serde(default = "default_required_features")]
    pub required_features: Vec<String>,
    #[serde(default)]
    pub optional_features: Vec<String>,
    #[serde(default)]
    pub reference_space: ReferenceSpaceSetting,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            fallback_mode: default_fallback_mode(),
            required_features: default_required_features(),
            optional_features: Vec::new(),
            reference_space: ReferenceSpaceSetting::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TriggerSection {
    #[serde(default = "default_enter_label")]
    pub enter_label: String,
    #[serde(default = "default_exit_label")]
    pub exit_label: String,
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            enter_label: default_enter_label(),
            exit_label: default_exit_label(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FrameSection {
    /// Render-rate cap; `0` or absent renders on every refresh.
    #[serde(default)]
    pub max_fps: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationSection {
    #[serde(default = "default_supported_modes")]
    pub supported_modes: Vec<ModeSetting>,
    #[serde(
        default = "default_refresh_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub refresh_interval: Duration,
    #[serde(default)]
    pub jitter_ms: f64,
    #[serde(default)]
    pub seed: u64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            supported_modes: default_supported_modes(),
            refresh_interval: default_refresh_interval(),
            jitter_ms: 0.0,
            seed: 0,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            version: 1,
            session: SessionSection::default(),
            trigger: TriggerSection::default(),
            frame: FrameSection::default(),
            simulation: SimulationSection::default(),
        }
    }
}

fn default_mode() -> ModeSetting {
    ModeSetting::ImmersiveAr
}

fn default_fallback_mode() -> Option<ModeSetting> {
    Some(ModeSetting::Inline)
}

fn default_required_features() -> Vec<String> {
    vec!["viewer".to_string(), "local".to_string()]
}

fn default_enter_label() -> String {
    "Enter XR".to_string()
}

fn default_exit_label() -> String {
    "STOP AR".to_string()
}

fn default_supported_modes() -> Vec<ModeSetting> {
    vec![ModeSetting::ImmersiveAr, ModeSetting::Inline]
}

fn default_refresh_interval() -> Duration {
    Duration::from_millis(11)
}

fn deserialize_fallback_mode<'de, D>(deserializer: D) -> Result<Option<ModeSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "none" | "off" | "disabled" => Ok(None),
        "inline" => Ok(Some(ModeSetting::Inline)),
        "immersive-vr" | "vr" => Ok(Some(ModeSetting::ImmersiveVr)),
        "immersive-ar" | "ar" => Ok(Some(ModeSetting::ImmersiveAr)),
        other => Err(de::Error::custom(format!(
            "invalid fallback mode '{other}'; expected inline, immersive-vr, immersive-ar, or none"
        ))),
    }
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a finite non-negative number"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl PreviewConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PreviewConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Frame cap with the "0 means uncapped" convention applied.
    pub fn max_fps(&self) -> Option<f32> {
        self.frame.max_fps.filter(|fps| *fps > 0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let session = &self.session;
        if session.fallback_mode == Some(session.mode) {
            return Err(ConfigError::Invalid(format!(
                "session.fallback_mode must differ from session.mode ('{}')",
                session.mode
            )));
        }

        let mut seen = BTreeSet::new();
        for (list, features) in [
            ("required_features", &session.required_features),
            ("optional_features", &session.optional_features),
        ] {
            for feature in features {
                if feature.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "session.{list} contains an empty feature name"
                    )));
                }
                if !seen.insert(feature.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "feature '{feature}' is listed more than once"
                    )));
                }
            }
        }

        if self.trigger.enter_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "trigger.enter_label may not be empty".into(),
            ));
        }
        if self.trigger.exit_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "trigger.exit_label may not be empty".into(),
            ));
        }

        if let Some(fps) = self.frame.max_fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("frame.max_fps must be >= 0".into()));
            }
        }

        let simulation = &self.simulation;
        if simulation.refresh_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "simulation.refresh_interval must be greater than zero".into(),
            ));
        }
        if !simulation.jitter_ms.is_finite() || simulation.jitter_ms < 0.0 {
            return Err(ConfigError::Invalid(
                "simulation.jitter_ms must be >= 0".into(),
            ));
        }
        let refresh_ms = simulation.refresh_interval.as_secs_f64() * 1000.0;
        if simulation.jitter_ms >= refresh_ms {
            return Err(ConfigError::Invalid(format!(
                "simulation.jitter_ms must be below the refresh interval ({refresh_ms}ms)"
            )));
        }

        Ok(())
    }
}
