// THEORY:
// Configuration is data, not branching. Each tuning of the alarm (which classes exist,
// what their predicate constants are, what coverage trips the alarm, how playback is
// signalled) is one immutable `ThresholdConfig`. Competing tunings are just different
// values, selectable by name through `Variant` or loaded from JSON.
//
// A `ThresholdConfig` is validated once, when it is built or deserialized, and never
// changes afterwards. Switching tunings means building a fresh pipeline around a fresh
// config. `MonitorSettings` carries the run-level knobs around it (tick period,
// frame looping, alarm file).

use crate::core_modules::alarm::{Comparison, SignalPolicy, TriggerCondition, TriggerPredicate};
use crate::core_modules::classifier::{
    ChannelLimit, ChannelLimits, ClassPredicate, ClassRule, ClassThresholds, Dominance, HsvBounds,
    HueRange,
};
use crate::core_modules::pixel::ChannelName;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 250;
pub const MAX_TICK_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("class names must not be empty")]
    EmptyClassName,

    #[error("class `{0}` is defined more than once")]
    DuplicateClass(String),

    #[error("{count} classes configured, at most {max} are supported")]
    TooManyClasses { count: usize, max: usize },

    #[error("class `{class}`: {reason}")]
    InvalidPredicate { class: String, reason: &'static str },

    #[error("trigger has no conditions")]
    EmptyTrigger,

    #[error("trigger refers to unknown class `{0}`")]
    UnknownTriggerClass(String),

    #[error("trigger threshold {value} for class `{class}` is not a percentage")]
    InvalidThreshold { class: String, value: f64 },

    #[error("unknown variant `{0}`")]
    UnknownVariant(String),

    #[error("tick interval {0} ms is outside 1..={max} ms", max = MAX_TICK_INTERVAL_MS)]
    InvalidTickInterval(u64),
}

/// The named tunings that ship with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Moderate green rule, strict raw-channel red rule; green-low OR red-high trigger.
    Classic,
    /// Stricter green dominance, ratio-based red rule on rounded HSV;
    /// green-low OR red-high trigger.
    Advanced,
    /// Green rule only; single-threshold trigger.
    GreenOnly,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Classic, Variant::Advanced, Variant::GreenOnly];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Classic => "classic",
            Variant::Advanced => "advanced",
            Variant::GreenOnly => "green_only",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|variant| variant.name() == s)
            .ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}

/// An immutable, validated bundle of class thresholds, trigger predicate and signal policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholdConfig", into = "RawThresholdConfig")]
pub struct ThresholdConfig {
    name: String,
    thresholds: ClassThresholds,
    trigger: TriggerPredicate,
    signal_policy: SignalPolicy,
}

// Rules stay unvalidated here so that `ThresholdConfig::new` reports the specific error.
#[derive(Serialize, Deserialize)]
struct RawThresholdConfig {
    name: String,
    classes: Vec<ClassRule>,
    trigger: TriggerPredicate,
    #[serde(default)]
    signal_policy: SignalPolicy,
}

impl TryFrom<RawThresholdConfig> for ThresholdConfig {
    type Error = ConfigError;

    fn try_from(raw: RawThresholdConfig) -> Result<Self, Self::Error> {
        let thresholds = ClassThresholds::new(raw.classes)?;
        ThresholdConfig::new(raw.name, thresholds, raw.trigger, raw.signal_policy)
    }
}

impl From<ThresholdConfig> for RawThresholdConfig {
    fn from(config: ThresholdConfig) -> Self {
        RawThresholdConfig {
            name: config.name,
            classes: config.thresholds.into(),
            trigger: config.trigger,
            signal_policy: config.signal_policy,
        }
    }
}

impl ThresholdConfig {
    pub fn new(
        name: impl Into<String>,
        thresholds: ClassThresholds,
        trigger: TriggerPredicate,
        signal_policy: SignalPolicy,
    ) -> Result<Self, ConfigError> {
        if trigger.conditions.is_empty() {
            return Err(ConfigError::EmptyTrigger);
        }
        for condition in &trigger.conditions {
            if thresholds.index_of(&condition.class).is_none() {
                return Err(ConfigError::UnknownTriggerClass(condition.class.clone()));
            }
            if !(0.0..=100.0).contains(&condition.threshold) {
                return Err(ConfigError::InvalidThreshold {
                    class: condition.class.clone(),
                    value: condition.threshold,
                });
            }
        }
        Ok(Self { name: name.into(), thresholds, trigger, signal_policy })
    }

    pub fn preset(variant: Variant) -> Self {
        let (thresholds, trigger) = match variant {
            Variant::Classic => (
                vec![classic_green(), classic_red()],
                TriggerPredicate::any_of(vec![
                    TriggerCondition::new("green", Comparison::Below, 10.0),
                    TriggerCondition::new("red", Comparison::Above, 0.5),
                ]),
            ),
            Variant::Advanced => (
                vec![advanced_green(), advanced_red()],
                TriggerPredicate::any_of(vec![
                    TriggerCondition::new("green", Comparison::Below, 7.0),
                    TriggerCondition::new("red", Comparison::Above, 0.5),
                ]),
            ),
            Variant::GreenOnly => (
                vec![classic_green()],
                TriggerPredicate::single(TriggerCondition::new("green", Comparison::Below, 10.0)),
            ),
        };
        // Presets are valid by construction; they skip the runtime checks.
        Self {
            name: variant.name().to_string(),
            thresholds: ClassThresholds::from_rules_unchecked(thresholds),
            trigger,
            signal_policy: SignalPolicy::EdgeTriggered,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thresholds(&self) -> &ClassThresholds {
        &self.thresholds
    }

    pub fn trigger(&self) -> &TriggerPredicate {
        &self.trigger
    }

    pub fn signal_policy(&self) -> SignalPolicy {
        self.signal_policy
    }
}

fn green_rule(floor: u8, factor: f64) -> ClassRule {
    ClassRule::new(
        "green",
        ClassPredicate {
            channels: ChannelLimits { green: ChannelLimit::above(floor), ..Default::default() },
            dominance: Some(Dominance { channel: ChannelName::Green, factor }),
            hsv: None,
        },
    )
}

fn classic_green() -> ClassRule {
    green_rule(80, 1.5)
}

fn advanced_green() -> ClassRule {
    green_rule(100, 1.8)
}

fn classic_red() -> ClassRule {
    ClassRule::new(
        "red",
        ClassPredicate {
            channels: ChannelLimits {
                red: ChannelLimit::above(200),
                green: ChannelLimit::below(50),
                blue: ChannelLimit::below(50),
            },
            dominance: None,
            hsv: Some(HsvBounds {
                hue: Some(HueRange { from: 350.0, to: 10.0 }),
                min_saturation: Some(90.0),
                min_value: Some(90.0),
                rounded: false,
            }),
        },
    )
}

fn advanced_red() -> ClassRule {
    ClassRule::new(
        "red",
        ClassPredicate {
            channels: ChannelLimits { red: ChannelLimit::above(150), ..Default::default() },
            dominance: Some(Dominance { channel: ChannelName::Red, factor: 3.0 }),
            hsv: Some(HsvBounds {
                hue: Some(HueRange { from: 350.0, to: 10.0 }),
                min_saturation: Some(85.0),
                min_value: Some(85.0),
                rounded: true,
            }),
        },
    )
}

/// Which threshold config a run uses: a shipped preset by name, or a full inline config.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProfileChoice {
    Preset(Variant),
    Custom(ThresholdConfig),
}

/// Shape-only form of a profile. Names and configs are checked afterwards, in
/// `TryFrom`, so a bad preset name or trigger keeps its own `ConfigError`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawProfile {
    Preset(String),
    Custom(RawThresholdConfig),
}

impl TryFrom<RawProfile> for ProfileChoice {
    type Error = ConfigError;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        match raw {
            RawProfile::Preset(name) => name.parse().map(ProfileChoice::Preset),
            RawProfile::Custom(config) => {
                ThresholdConfig::try_from(config).map(ProfileChoice::Custom)
            }
        }
    }
}

impl<'de> Deserialize<'de> for ProfileChoice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawProfile::deserialize(deserializer)?
            .try_into()
            .map_err(serde::de::Error::custom)
    }
}

impl Default for ProfileChoice {
    fn default() -> Self {
        ProfileChoice::Preset(Variant::Advanced)
    }
}

/// Run-level settings for the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMonitorSettings")]
pub struct MonitorSettings {
    pub profile: ProfileChoice,
    /// Period between frame samples.
    pub tick_interval_ms: u64,
    /// Restart the frame sequence when it runs out instead of stopping.
    pub loop_frames: bool,
    /// Sound to loop while the alarm is active. Without it, start signals are ignored.
    pub alarm_file: Option<PathBuf>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            profile: ProfileChoice::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            loop_frames: true,
            alarm_file: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawMonitorSettings {
    profile: Option<RawProfile>,
    tick_interval_ms: u64,
    loop_frames: bool,
    alarm_file: Option<PathBuf>,
}

impl Default for RawMonitorSettings {
    fn default() -> Self {
        Self {
            profile: None,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            loop_frames: true,
            alarm_file: None,
        }
    }
}

impl TryFrom<RawMonitorSettings> for MonitorSettings {
    type Error = ConfigError;

    fn try_from(raw: RawMonitorSettings) -> Result<Self, Self::Error> {
        let settings = MonitorSettings {
            profile: raw.profile.map(ProfileChoice::try_from).transpose()?.unwrap_or_default(),
            tick_interval_ms: raw.tick_interval_ms,
            loop_frames: raw.loop_frames,
            alarm_file: raw.alarm_file,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl MonitorSettings {
    /// Parses and validates settings. Only malformed JSON surfaces as `Parse`;
    /// everything else keeps its own `ConfigError` variant.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawMonitorSettings = serde_json::from_str(json)?;
        MonitorSettings::try_from(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TICK_INTERVAL_MS).contains(&self.tick_interval_ms) {
            return Err(ConfigError::InvalidTickInterval(self.tick_interval_ms));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn threshold_config(&self) -> ThresholdConfig {
        match &self.profile {
            ProfileChoice::Preset(variant) => ThresholdConfig::preset(*variant),
            ProfileChoice::Custom(config) => config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_pass_validation() {
        for variant in Variant::ALL {
            let preset = ThresholdConfig::preset(variant);
            let rebuilt = ThresholdConfig::new(
                preset.name(),
                ClassThresholds::new(preset.thresholds().rules().to_vec()).unwrap(),
                preset.trigger().clone(),
                preset.signal_policy(),
            )
            .unwrap();
            assert_eq!(rebuilt, preset);
        }
    }

    #[test]
    fn variant_names_round_trip() {
        for variant in Variant::ALL {
            assert_eq!(variant.name().parse::<Variant>().unwrap(), variant);
        }
        assert!(matches!("sepia".parse::<Variant>(), Err(ConfigError::UnknownVariant(_))));
    }

    #[test]
    fn json_config_is_validated() {
        let json = r#"{
            "name": "lawn",
            "classes": [
                { "name": "green", "predicate": {
                    "channels": { "green": { "above": 90 } },
                    "dominance": { "channel": "green", "factor": 1.6 } } }
            ],
            "trigger": { "conditions": [
                { "class": "green", "comparison": "below", "threshold": 12.5 }
            ] }
        }"#;
        let config = ThresholdConfig::from_json_str(json).unwrap();
        assert_eq!(config.name(), "lawn");
        assert_eq!(config.signal_policy(), SignalPolicy::EdgeTriggered);
        assert_eq!(config.thresholds().len(), 1);

        let bad = json.replace(r#""class": "green""#, r#""class": "blue""#);
        let err = ThresholdConfig::from_json_str(&bad).unwrap_err();
        assert!(err.to_string().contains("unknown class `blue`"), "{err}");
    }

    #[test]
    fn config_survives_json_round_trip() {
        let preset = ThresholdConfig::preset(Variant::Advanced);
        let json = preset.to_json_string().unwrap();
        assert_eq!(ThresholdConfig::from_json_str(&json).unwrap(), preset);
    }

    #[test]
    fn empty_trigger_is_rejected() {
        let thresholds = ClassThresholds::new(vec![classic_green()]).unwrap();
        let empty = TriggerPredicate::any_of(vec![]);
        let result = ThresholdConfig::new("x", thresholds, empty, SignalPolicy::default());
        assert!(matches!(result, Err(ConfigError::EmptyTrigger)));
    }

    #[test]
    fn settings_default_and_overrides() {
        let settings = MonitorSettings::from_json_str("{}").unwrap();
        assert_eq!(settings, MonitorSettings::default());
        assert_eq!(settings.tick_interval(), Duration::from_millis(250));
        assert_eq!(settings.threshold_config().name(), "advanced");

        let json = r#"{ "profile": "green_only", "tick_interval_ms": 500 }"#;
        let settings = MonitorSettings::from_json_str(json).unwrap();
        assert_eq!(settings.profile, ProfileChoice::Preset(Variant::GreenOnly));
        assert_eq!(settings.tick_interval_ms, 500);
    }

    #[test]
    fn misspelled_preset_is_an_unknown_variant() {
        let err = MonitorSettings::from_json_str(r#"{ "profile": "clasic" }"#).unwrap_err();
        assert!(matches!(&err, ConfigError::UnknownVariant(name) if name == "clasic"), "{err:?}");
    }

    #[test]
    fn custom_profile_keeps_its_validation_error() {
        let json = r#"{ "profile": {
            "name": "lawn",
            "classes": [ { "name": "green",
                "predicate": { "channels": { "green": { "above": 90 } } } } ],
            "trigger": { "conditions": [
                { "class": "blue", "comparison": "below", "threshold": 5 }
            ] }
        } }"#;
        let err = MonitorSettings::from_json_str(json).unwrap_err();
        assert!(
            matches!(&err, ConfigError::UnknownTriggerClass(class) if class == "blue"),
            "{err:?}"
        );

        let duplicated = json.replace(
            r#""classes": [ "#,
            r#""classes": [ { "name": "green", "predicate": {} }, "#,
        );
        let err = MonitorSettings::from_json_str(&duplicated).unwrap_err();
        assert!(matches!(&err, ConfigError::DuplicateClass(class) if class == "green"), "{err:?}");
    }

    #[test]
    fn custom_profile_loads_and_serializes_back() {
        let settings = MonitorSettings {
            profile: ProfileChoice::Custom(ThresholdConfig::preset(Variant::Classic)),
            ..MonitorSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(MonitorSettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn malformed_settings_are_parse_errors() {
        let err = MonitorSettings::from_json_str(r#"{ "tick_interval_ms": "fast" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let result = MonitorSettings::from_json_str(r#"{ "tick_interval_ms": 0 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidTickInterval(0))));
    }

    #[test]
    fn missing_settings_file_reports_path() {
        let err = MonitorSettings::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
