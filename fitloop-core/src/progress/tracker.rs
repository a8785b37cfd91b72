//! Event counters: [`Tracker`] and the total/current [`Progress`] pair.

use crate::error::ProgressError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One of the four lifecycle counters of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// Events ready to start.
    Ready,
    /// Events started (after the `on_*_start` hooks ran).
    Started,
    /// Events processed.
    Processed,
    /// Events completed (after the `on_*_end` hooks ran).
    Completed,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Ready,
        Field::Started,
        Field::Processed,
        Field::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Ready => "ready",
            Field::Started => "started",
            Field::Processed => "processed",
            Field::Completed => "completed",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single counter, either counting or switched off for this event type.
///
/// Serializes as a plain integer when enabled and as `null` when disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum Counter {
    Enabled(u64),
    Disabled,
}

impl Counter {
    pub fn value(&self) -> Option<u64> {
        match self {
            Counter::Enabled(n) => Some(*n),
            Counter::Disabled => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Counter::Enabled(_))
    }
}

impl Default for Counter {
    fn default() -> Self {
        Counter::Enabled(0)
    }
}

impl From<Option<u64>> for Counter {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Counter::Disabled, Counter::Enabled)
    }
}

impl From<Counter> for Option<u64> {
    fn from(counter: Counter) -> Self {
        counter.value()
    }
}

/// Tracks an event's progress through ready, started, processed and completed.
///
/// Fields are enabled at zero by default. A field disabled at construction is
/// unused for this event type: writing to it fails, [`Tracker::reset`] leaves
/// it disabled and [`Tracker::with`] does not bring it back.
///
/// Every field is required when deserializing; disabled ones are `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    #[serde(deserialize_with = "required_counter")]
    ready: Counter,
    #[serde(deserialize_with = "required_counter")]
    started: Counter,
    #[serde(deserialize_with = "required_counter")]
    processed: Counter,
    #[serde(deserialize_with = "required_counter")]
    completed: Counter,
}

// A plain `Counter` field would read a missing key as `null`.
fn required_counter<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Counter, D::Error> {
    Option::<u64>::deserialize(deserializer).map(Counter::from)
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: start `field` at `value`. A disabled field stays disabled.
    pub fn with(mut self, field: Field, value: u64) -> Self {
        if let Counter::Enabled(n) = self.slot_mut(field) {
            *n = value;
        }
        self
    }

    /// Builder: mark `field` as unused.
    pub fn disable(mut self, field: Field) -> Self {
        *self.slot_mut(field) = Counter::Disabled;
        self
    }

    pub fn counter(&self, field: Field) -> Counter {
        match field {
            Field::Ready => self.ready,
            Field::Started => self.started,
            Field::Processed => self.processed,
            Field::Completed => self.completed,
        }
    }

    pub fn get(&self, field: Field) -> Option<u64> {
        self.counter(field).value()
    }

    pub fn is_enabled(&self, field: Field) -> bool {
        self.counter(field).is_enabled()
    }

    /// Whether both trackers enable and disable the same fields.
    pub fn same_layout(&self, other: &Tracker) -> bool {
        Field::ALL
            .iter()
            .all(|field| self.is_enabled(*field) == other.is_enabled(*field))
    }

    pub fn ready(&self) -> Option<u64> {
        self.ready.value()
    }

    pub fn started(&self) -> Option<u64> {
        self.started.value()
    }

    pub fn processed(&self) -> Option<u64> {
        self.processed.value()
    }

    pub fn completed(&self) -> Option<u64> {
        self.completed.value()
    }

    /// Overwrite an enabled counter.
    pub fn set(&mut self, field: Field, value: u64) -> Result<(), ProgressError> {
        match self.slot_mut(field) {
            Counter::Enabled(n) => {
                *n = value;
                Ok(())
            }
            Counter::Disabled => Err(ProgressError::UnusedField { field }),
        }
    }

    /// Zero every enabled counter.
    pub fn reset(&mut self) {
        for field in Field::ALL {
            if let Counter::Enabled(n) = self.slot_mut(field) {
                *n = 0;
            }
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Counter {
        match field {
            Field::Ready => &mut self.ready,
            Field::Started => &mut self.started,
            Field::Processed => &mut self.processed,
            Field::Completed => &mut self.completed,
        }
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = Field::ALL
            .iter()
            .filter_map(|field| self.get(*field).map(|v| format!("{field}={v}")))
            .collect();
        write!(f, "Tracker({})", args.join(", "))
    }
}

/// Aggregated (`total`) and periodically reset (`current`) progress of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: Tracker,
    pub current: Tracker,
}

impl Progress {
    /// Build a progress whose `total` and `current` share one field pattern.
    pub fn from_defaults(template: Tracker) -> Self {
        Self {
            total: template,
            current: template,
        }
    }

    /// Bump `field` on both trackers. A no-op if either side disables it.
    ///
    /// Counters saturate at `u64::MAX` rather than wrapping.
    pub fn increment(&mut self, field: Field) {
        if let (Counter::Enabled(total), Counter::Enabled(current)) =
            (self.total.slot_mut(field), self.current.slot_mut(field))
        {
            *total = total.saturating_add(1);
            *current = current.saturating_add(1);
        }
    }

    pub fn increment_ready(&mut self) {
        self.increment(Field::Ready);
    }

    pub fn increment_started(&mut self) {
        self.increment(Field::Started);
    }

    pub fn increment_processed(&mut self) {
        self.increment(Field::Processed);
    }

    pub fn increment_completed(&mut self) {
        self.increment(Field::Completed);
    }

    /// Steps taken so far, i.e. `total.completed`.
    pub fn steps(&self) -> Result<u64, ProgressError> {
        self.completed_total("steps")
    }

    pub(crate) fn completed_total(&self, what: &'static str) -> Result<u64, ProgressError> {
        self.total
            .completed()
            .ok_or(ProgressError::UndefinedDerived {
                what,
                field: Field::Completed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tracker_defaults_enabled_at_zero() {
        let t = Tracker::new();
        for field in Field::ALL {
            assert_eq!(t.get(field), Some(0));
        }
    }

    #[test]
    fn test_tracker_read_disabled() {
        let t = Tracker::new()
            .with(Field::Ready, 10)
            .disable(Field::Completed);
        assert_eq!(t.ready(), Some(10));
        assert_eq!(t.completed(), None);
        assert_eq!(t.counter(Field::Completed), Counter::Disabled);
    }

    #[test]
    fn test_tracker_set_disabled_fails() {
        let mut t = Tracker::new()
            .with(Field::Ready, 10)
            .disable(Field::Completed);
        let err = t.set(Field::Completed, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The 'completed' attribute is meant to be unused"
        );
        assert_eq!(t.completed(), None);

        t.set(Field::Ready, 3).unwrap();
        assert_eq!(t.ready(), Some(3));
    }

    #[test]
    fn test_tracker_reset() {
        let mut t = Tracker::new()
            .with(Field::Ready, 1)
            .with(Field::Started, 2)
            .disable(Field::Completed);
        t.reset();
        assert_eq!(t, Tracker::new().disable(Field::Completed));
    }

    #[test]
    fn test_tracker_display_hides_disabled() {
        let t = Tracker::new()
            .disable(Field::Ready)
            .disable(Field::Started);
        assert_eq!(t.to_string(), "Tracker(processed=0, completed=0)");
        let all_off = Field::ALL
            .iter()
            .fold(Tracker::new(), |t, f| t.disable(*f));
        assert_eq!(all_off.to_string(), "Tracker()");
    }

    #[test]
    fn test_tracker_serializes_disabled_as_null() {
        let t = Tracker::new()
            .with(Field::Ready, 4)
            .disable(Field::Processed);
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ready": 4, "started": 0, "processed": null, "completed": 0})
        );
        let back: Tracker = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_tracker_with_keeps_disabled() {
        let t = Tracker::new()
            .disable(Field::Processed)
            .with(Field::Processed, 0)
            .with(Field::Ready, 2);
        assert_eq!(t.processed(), None);
        assert_eq!(t.ready(), Some(2));

        let mut p = Progress::from_defaults(Tracker::new().disable(Field::Processed));
        p.current = p.current.with(Field::Processed, 0);
        p.increment_processed();
        assert_eq!(p.current.processed(), None);
        assert_eq!(p.total.processed(), None);
    }

    #[test]
    fn test_tracker_same_layout() {
        let a = Tracker::new().disable(Field::Started).with(Field::Ready, 3);
        let b = Tracker::new().disable(Field::Started);
        assert!(a.same_layout(&b));
        assert!(!a.same_layout(&Tracker::new()));
    }

    #[test]
    fn test_tracker_rejects_missing_field() {
        let json = serde_json::json!({"ready": 1, "started": 0, "completed": 0});
        assert!(serde_json::from_value::<Tracker>(json).is_err());

        let json = serde_json::json!({"ready": 1, "started": 0, "processed": null, "completed": 0});
        let tracker: Tracker = serde_json::from_value(json).unwrap();
        assert_eq!(tracker, Tracker::new().with(Field::Ready, 1).disable(Field::Processed));
    }

    #[test]
    fn test_progress_increment_saturates() {
        let mut p = Progress::default();
        p.total.set(Field::Ready, u64::MAX).unwrap();
        p.current.set(Field::Ready, u64::MAX - 1).unwrap();
        p.increment_ready();
        p.increment_ready();
        assert_eq!(p.total.ready(), Some(u64::MAX));
        assert_eq!(p.current.ready(), Some(u64::MAX));
    }

    #[test]
    fn test_progress_increment_each_field() {
        for field in Field::ALL {
            let mut p = Progress::default();
            p.increment(field);
            let expected = Tracker::new().with(field, 1);
            assert_eq!(p.total, expected);
            assert_eq!(p.current, expected);
        }
    }

    #[test]
    fn test_progress_named_increments() {
        let mut p = Progress::default();
        p.increment_ready();
        p.increment_started();
        p.increment_processed();
        p.increment_completed();
        let expected = Field::ALL
            .iter()
            .fold(Tracker::new(), |t, f| t.with(*f, 1));
        assert_eq!(p.total, expected);
        assert_eq!(p.current, expected);
    }

    #[test]
    fn test_progress_increment_disabled_on_one_side_is_noop() {
        let mut p = Progress {
            total: Tracker::new().disable(Field::Started),
            current: Tracker::new(),
        };
        p.increment_started();
        p.increment_started();
        assert_eq!(p.total.started(), None);
        assert_eq!(p.current.started(), Some(0));
    }

    #[test]
    fn test_progress_from_defaults() {
        let actual = Progress::from_defaults(
            Tracker::new()
                .with(Field::Completed, 5)
                .disable(Field::Started),
        );
        let expected_tracker = Tracker::new()
            .disable(Field::Started)
            .with(Field::Completed, 5);
        let expected = Progress {
            total: expected_tracker,
            current: expected_tracker,
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_progress_steps() {
        let mut p = Progress::default();
        p.increment_completed();
        p.increment_completed();
        assert_eq!(p.steps().unwrap(), 2);

        let disabled = Progress::from_defaults(Tracker::new().disable(Field::Completed));
        assert_eq!(
            disabled.steps().unwrap_err(),
            ProgressError::UndefinedDerived {
                what: "steps",
                field: Field::Completed
            }
        );
    }
}
