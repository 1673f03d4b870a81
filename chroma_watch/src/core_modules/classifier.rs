// THEORY:
// The `classifier` decides, for one pixel, which named color classes it belongs to.
// It is the per-pixel half of the hot loop, so it is written to be branch-only:
// no allocation, no auxiliary buffers, and HSV is derived only when a rule asks.
//
// Every class is a conjunction of optional parts:
// 1.  **Channel limits**: strict `above` / `below` bounds on red, green and blue.
// 2.  **Dominance**: one channel must exceed `factor` times each of the other two.
// 3.  **HSV bounds**: a hue range that may wrap through 0°, plus inclusive minimum
//     saturation and value, optionally compared after integer rounding.
//
// The set of classes a pixel matched is returned as a `ClassSet` bitmask indexed by
// rule position. Which rules exist is pure configuration: competing tunings are
// separate `ClassThresholds` values, never branches in here.

use crate::config::ConfigError;
use crate::core_modules::pixel::{Channel, ChannelName, Hsv, Pixel};
use serde::{Deserialize, Serialize};

/// Upper bound on classes per threshold set; one bit per class in `ClassSet`.
pub const MAX_CLASSES: usize = 32;

/// The classes one pixel matched, as a bitmask over rule indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ClassSet(u32);

impl ClassSet {
    pub const EMPTY: ClassSet = ClassSet(0);

    #[inline]
    pub fn contains(self, index: usize) -> bool {
        index < MAX_CLASSES && self.0 & (1 << index) != 0
    }

    #[inline]
    fn insert(&mut self, index: usize) {
        self.0 |= 1 << index;
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Indices of the matched rules, lowest first.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut remaining = self.0;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let index = remaining.trailing_zeros() as usize;
            remaining &= remaining - 1;
            Some(index)
        })
    }
}

/// Strict bounds on a single channel. `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLimit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<Channel>,
}

impl ChannelLimit {
    pub const OPEN: ChannelLimit = ChannelLimit { above: None, below: None };

    pub const fn above(value: Channel) -> Self {
        ChannelLimit { above: Some(value), below: None }
    }

    pub const fn below(value: Channel) -> Self {
        ChannelLimit { above: None, below: Some(value) }
    }

    #[inline]
    fn admits(&self, value: Channel) -> bool {
        self.above.is_none_or(|floor| value > floor)
            && self.below.is_none_or(|ceiling| value < ceiling)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLimits {
    #[serde(default)]
    pub red: ChannelLimit,
    #[serde(default)]
    pub green: ChannelLimit,
    #[serde(default)]
    pub blue: ChannelLimit,
}

impl ChannelLimits {
    #[inline]
    fn admit(&self, pixel: &Pixel) -> bool {
        self.red.admits(pixel.red) && self.green.admits(pixel.green) && self.blue.admits(pixel.blue)
    }
}

/// `channel` must be strictly greater than `factor ×` each of the other two channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dominance {
    pub channel: ChannelName,
    pub factor: f64,
}

impl Dominance {
    #[inline]
    fn holds(&self, pixel: &Pixel) -> bool {
        let own = pixel.channel(self.channel) as f64;
        let (first, second) = pixel.other_channels(self.channel);
        own > first as f64 * self.factor && own > second as f64 * self.factor
    }
}

/// Inclusive hue interval in degrees. `from > to` wraps through 0°,
/// so `[350, 10]` covers [0, 10] ∪ [350, 360).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueRange {
    pub from: f64,
    pub to: f64,
}

impl HueRange {
    #[inline]
    pub fn contains(&self, hue: f64) -> bool {
        if self.from <= self.to {
            hue >= self.from && hue <= self.to
        } else {
            hue >= self.from || hue <= self.to
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HsvBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<HueRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_saturation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Compare against integer-rounded coordinates.
    #[serde(default)]
    pub rounded: bool,
}

impl HsvBounds {
    #[inline]
    fn admit(&self, hsv: Hsv) -> bool {
        let hsv = if self.rounded { hsv.rounded() } else { hsv };
        self.hue.is_none_or(|range| range.contains(hsv.hue))
            && self.min_saturation.is_none_or(|floor| hsv.saturation >= floor)
            && self.min_value.is_none_or(|floor| hsv.value >= floor)
    }
}

/// The conjunctive membership test for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassPredicate {
    #[serde(default)]
    pub channels: ChannelLimits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominance: Option<Dominance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsv: Option<HsvBounds>,
}

impl ClassPredicate {
    #[inline]
    pub fn matches(&self, pixel: &Pixel) -> bool {
        // Cheap raw-channel checks first; HSV only for pixels that survive them.
        self.channels.admit(pixel)
            && self.dominance.is_none_or(|dominance| dominance.holds(pixel))
            && self.hsv.is_none_or(|bounds| bounds.admit(pixel.hsv()))
    }

    fn validate(&self, class: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &'static str| ConfigError::InvalidPredicate {
            class: class.to_string(),
            reason,
        };

        if let Some(dominance) = self.dominance {
            if !dominance.factor.is_finite() || dominance.factor <= 0.0 {
                return Err(invalid("dominance factor must be a positive number"));
            }
        }
        if let Some(bounds) = self.hsv {
            if let Some(range) = bounds.hue {
                let in_circle = |degrees: f64| (0.0..=360.0).contains(&degrees);
                if !in_circle(range.from) || !in_circle(range.to) {
                    return Err(invalid("hue range must lie within 0..=360 degrees"));
                }
            }
            let percent = |bound: Option<f64>| bound.is_none_or(|v| (0.0..=100.0).contains(&v));
            if !percent(bounds.min_saturation) || !percent(bounds.min_value) {
                return Err(invalid("saturation and value floors are percentages"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRule {
    pub name: String,
    pub predicate: ClassPredicate,
}

impl ClassRule {
    pub fn new(name: impl Into<String>, predicate: ClassPredicate) -> Self {
        Self { name: name.into(), predicate }
    }
}

/// An ordered, validated set of class rules. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ClassRule>", into = "Vec<ClassRule>")]
pub struct ClassThresholds {
    rules: Vec<ClassRule>,
}

impl ClassThresholds {
    pub fn new(rules: Vec<ClassRule>) -> Result<Self, ConfigError> {
        if rules.len() > MAX_CLASSES {
            return Err(ConfigError::TooManyClasses { count: rules.len(), max: MAX_CLASSES });
        }
        for (index, rule) in rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::EmptyClassName);
            }
            if rules[..index].iter().any(|earlier| earlier.name == rule.name) {
                return Err(ConfigError::DuplicateClass(rule.name.clone()));
            }
            rule.predicate.validate(&rule.name)?;
        }
        Ok(Self { rules })
    }

    /// For rule sets that are known valid at compile time (the shipped presets).
    pub(crate) fn from_rules_unchecked(rules: Vec<ClassRule>) -> Self {
        debug_assert!(rules.len() <= MAX_CLASSES);
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.name == name)
    }

    /// Names of the classes in `set`, in rule order.
    pub fn names(&self, set: ClassSet) -> impl Iterator<Item = &str> {
        set.iter().filter_map(|index| self.rules.get(index)).map(|rule| rule.name.as_str())
    }
}

impl TryFrom<Vec<ClassRule>> for ClassThresholds {
    type Error = ConfigError;

    fn try_from(rules: Vec<ClassRule>) -> Result<Self, Self::Error> {
        ClassThresholds::new(rules)
    }
}

impl From<ClassThresholds> for Vec<ClassRule> {
    fn from(thresholds: ClassThresholds) -> Self {
        thresholds.rules
    }
}

/// Evaluates every rule against `pixel`.
#[inline]
pub fn classify(pixel: &Pixel, thresholds: &ClassThresholds) -> ClassSet {
    let mut matched = ClassSet::EMPTY;
    for (index, rule) in thresholds.rules.iter().enumerate() {
        if rule.predicate.matches(pixel) {
            matched.insert(index);
        }
    }
    matched
}
