// THEORY:
// The `alarm` module is the decision layer. It consumes one `FrameStats` per tick and
// answers two questions: should the alarm be sounding, and does the playback
// collaborator need to hear about it right now?
//
// Key architectural principles:
// 1.  **Explicit state**: `AlarmState` is a value. The pure `transition` function takes
//     the current state and returns the next one together with the signal to emit;
//     `AlarmStateMachine` is only a thin owner around it.
// 2.  **Configurable trigger**: what "bad coverage" means is a `TriggerPredicate` built
//     from configuration (one class against one threshold, or several combined with
//     any/all), never a hard-coded rule.
// 3.  **Edge-triggered by default**: with `SignalPolicy::EdgeTriggered` a start is sent
//     once per Silent → Active edge and a stop once per Active → Silent edge. The
//     `EveryTick` policy re-sends on every sample and exists only for setups that want
//     the playback device re-asserted continuously.
// 4.  **No timers**: evaluation is synchronous and deterministic. The same sample
//     sequence always produces the same signal sequence.

use crate::core_modules::frame_aggregator::FrameStats;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    #[default]
    Silent,
    Active,
}

/// What the playback collaborator is told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSignal {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Coverage strictly below the threshold.
    Below,
    /// Coverage strictly above the threshold.
    Above,
}

/// One comparison of a class's coverage against a threshold percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub class: String,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl TriggerCondition {
    pub fn new(class: impl Into<String>, comparison: Comparison, threshold: f64) -> Self {
        Self { class: class.into(), comparison, threshold }
    }

    /// False when `stats` has no entry for the class.
    pub fn holds(&self, stats: &FrameStats) -> bool {
        match stats.percentage(&self.class) {
            Some(percentage) => match self.comparison {
                Comparison::Below => percentage < self.threshold,
                Comparison::Above => percentage > self.threshold,
            },
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    #[default]
    AnyOf,
    AllOf,
}

/// Boolean function over `FrameStats` deciding whether the alarm should sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPredicate {
    #[serde(default)]
    pub mode: TriggerMode,
    pub conditions: Vec<TriggerCondition>,
}

impl TriggerPredicate {
    pub fn single(condition: TriggerCondition) -> Self {
        Self { mode: TriggerMode::AnyOf, conditions: vec![condition] }
    }

    pub fn any_of(conditions: Vec<TriggerCondition>) -> Self {
        Self { mode: TriggerMode::AnyOf, conditions }
    }

    pub fn all_of(conditions: Vec<TriggerCondition>) -> Self {
        Self { mode: TriggerMode::AllOf, conditions }
    }

    pub fn holds(&self, stats: &FrameStats) -> bool {
        match self.mode {
            TriggerMode::AnyOf => self.conditions.iter().any(|c| c.holds(stats)),
            TriggerMode::AllOf => self.conditions.iter().all(|c| c.holds(stats)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPolicy {
    /// Signal only on state changes.
    #[default]
    EdgeTriggered,
    /// Re-signal the current state on every sample.
    EveryTick,
}

/// Result of evaluating one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub state: AlarmState,
    pub signal: Option<PlaybackSignal>,
}

/// The transition table. Pure: no logging, no side effects.
pub fn transition(
    state: AlarmState,
    stats: &FrameStats,
    trigger: &TriggerPredicate,
    policy: SignalPolicy,
) -> Step {
    let target = if trigger.holds(stats) { AlarmState::Active } else { AlarmState::Silent };

    let signal = match (policy, state, target) {
        (_, AlarmState::Silent, AlarmState::Active) => Some(PlaybackSignal::Start),
        (_, AlarmState::Active, AlarmState::Silent) => Some(PlaybackSignal::Stop),
        (SignalPolicy::EveryTick, _, AlarmState::Active) => Some(PlaybackSignal::Start),
        (SignalPolicy::EveryTick, _, AlarmState::Silent) => Some(PlaybackSignal::Stop),
        (SignalPolicy::EdgeTriggered, _, _) => None,
    };

    Step { state: target, signal }
}

/// Owns the current `AlarmState` and applies `transition` once per sample.
#[derive(Debug, Clone)]
pub struct AlarmStateMachine {
    trigger: TriggerPredicate,
    policy: SignalPolicy,
    state: AlarmState,
}

impl AlarmStateMachine {
    pub fn new(trigger: TriggerPredicate, policy: SignalPolicy) -> Self {
        Self { trigger, policy, state: AlarmState::Silent }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn trigger(&self) -> &TriggerPredicate {
        &self.trigger
    }

    pub fn policy(&self) -> SignalPolicy {
        self.policy
    }

    pub fn evaluate(&mut self, stats: &FrameStats) -> Option<PlaybackSignal> {
        let step = transition(self.state, stats, &self.trigger, self.policy);
        if step.state != self.state {
            info!("alarm {:?} -> {:?}", self.state, step.state);
        }
        self.state = step.state;
        step.signal
    }

    /// Forces `Silent`. Returns `Stop` only if the alarm was sounding, so calling
    /// this repeatedly is harmless.
    pub fn reset(&mut self) -> Option<PlaybackSignal> {
        match std::mem::take(&mut self.state) {
            AlarmState::Active => {
                info!("alarm reset while active");
                Some(PlaybackSignal::Stop)
            }
            AlarmState::Silent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn green(percentage: f64) -> FrameStats {
        FrameStats::from_percentages([("green", percentage)])
    }

    fn low_green() -> TriggerPredicate {
        TriggerPredicate::single(TriggerCondition::new("green", Comparison::Below, 10.0))
    }

    #[test]
    fn low_green_sequence_signals_each_edge_once() {
        let mut machine = AlarmStateMachine::new(low_green(), SignalPolicy::EdgeTriggered);
        let mut states = Vec::new();
        let mut signals = Vec::new();

        for percentage in [20.0, 5.0, 5.0, 20.0] {
            signals.push(machine.evaluate(&green(percentage)));
            states.push(machine.state());
        }

        assert_eq!(
            states,
            vec![AlarmState::Silent, AlarmState::Active, AlarmState::Active, AlarmState::Silent]
        );
        assert_eq!(
            signals,
            vec![None, Some(PlaybackSignal::Start), None, Some(PlaybackSignal::Stop)]
        );
    }

    #[test]
    fn every_tick_resignals_steady_state() {
        let trigger = low_green();
        let step = transition(AlarmState::Active, &green(5.0), &trigger, SignalPolicy::EveryTick);
        assert_eq!(step, Step { state: AlarmState::Active, signal: Some(PlaybackSignal::Start) });

        let step = transition(AlarmState::Silent, &green(50.0), &trigger, SignalPolicy::EveryTick);
        assert_eq!(step, Step { state: AlarmState::Silent, signal: Some(PlaybackSignal::Stop) });
    }

    #[test]
    fn dual_class_any_of() {
        let trigger = TriggerPredicate::any_of(vec![
            TriggerCondition::new("green", Comparison::Below, 7.0),
            TriggerCondition::new("red", Comparison::Above, 0.5),
        ]);
        let calm = FrameStats::from_percentages([("green", 30.0), ("red", 0.1)]);
        let red_spot = FrameStats::from_percentages([("green", 30.0), ("red", 0.75)]);
        let no_green = FrameStats::from_percentages([("green", 2.0), ("red", 0.0)]);

        assert!(!trigger.holds(&calm));
        assert!(trigger.holds(&red_spot));
        assert!(trigger.holds(&no_green));
    }

    #[test]
    fn all_of_needs_every_condition() {
        let trigger = TriggerPredicate::all_of(vec![
            TriggerCondition::new("green", Comparison::Below, 7.0),
            TriggerCondition::new("red", Comparison::Above, 0.5),
        ]);
        assert!(!trigger.holds(&FrameStats::from_percentages([("green", 2.0), ("red", 0.0)])));
        assert!(trigger.holds(&FrameStats::from_percentages([("green", 2.0), ("red", 1.0)])));
    }

    #[test]
    fn thresholds_are_strict() {
        let trigger = low_green();
        assert!(!trigger.holds(&green(10.0)));
        assert!(trigger.holds(&green(9.99)));
    }

    #[test]
    fn missing_class_never_triggers() {
        let stats = FrameStats::from_percentages([("red", 0.0)]);
        assert!(!low_green().holds(&stats));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut machine = AlarmStateMachine::new(low_green(), SignalPolicy::EdgeTriggered);
        assert_eq!(machine.evaluate(&green(0.0)), Some(PlaybackSignal::Start));
        assert_eq!(machine.reset(), Some(PlaybackSignal::Stop));
        assert_eq!(machine.reset(), None);
        assert_eq!(machine.state(), AlarmState::Silent);
    }
}
