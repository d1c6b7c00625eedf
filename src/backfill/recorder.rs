//! Event recording and fixed-resolution resampling
//!
//! [`ChainRecorder`] keeps, per series identity, an append-only chain of
//! cumulative values in the order increments arrived. Rendering walks every
//! chain in lockstep, one resolution step at a time, and forward-fills the
//! value that is current at each step.
//!
//! # Walk semantics
//!
//! * The walk starts at the earliest first timestamp across all series.
//! * At each step `t` a series emits the cumulative value of the last point
//!   with timestamp `<= t`. A series whose first point lies after `t` emits
//!   nothing for that step.
//! * The walk stops after the first step at which every series has reached
//!   its last point. That step still emits every series' final value.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufWriter, Write};
use std::time::Duration;

use super::error::BackfillError;

/// Destination for counter increments
///
/// [`ChainRecorder`] is the production implementation. The trait exists so
/// that labeled handles can be driven against other recorders in tests.
pub trait Recorder {
    /// Add `amount` to the series `identity` at time `at`
    fn inc(&mut self, identity: &str, amount: u64, at: DateTime<Utc>);

    /// Write the recorded history to `sink`, one sample per line
    fn render<W: Write>(&self, sink: W, resolution: Resolution) -> Result<(), BackfillError>;
}

/// Validated, strictly positive sampling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution(TimeDelta);

impl Resolution {
    /// Create a resolution from a duration
    ///
    /// # Errors
    /// Returns [`BackfillError::InvalidResolution`] for a zero duration or
    /// one too large to add to a timestamp.
    pub fn new(step: Duration) -> Result<Self, BackfillError> {
        if step.is_zero() {
            return Err(BackfillError::InvalidResolution(step));
        }
        TimeDelta::from_std(step)
            .map(Self)
            .map_err(|_| BackfillError::InvalidResolution(step))
    }

    pub fn from_secs(secs: u64) -> Result<Self, BackfillError> {
        Self::new(Duration::from_secs(secs))
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }
}

/// One point of a series' history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    /// Running total after the increment
    pub value: u64,
    /// Time at which `value` became current
    pub at: DateTime<Utc>,
}

/// Recorder storing one chronological chain of points per series
///
/// The first point of a chain is its head and is never modified; new points
/// are only ever appended after the tail. Series are kept in identity order,
/// which makes rendering deterministic.
#[derive(Debug, Clone, Default)]
pub struct ChainRecorder {
    series: BTreeMap<String, Vec<Point>>,
}

impl ChainRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct series recorded so far
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// The full chain of a series, head first
    pub fn history(&self, identity: &str) -> Option<&[Point]> {
        self.series.get(identity).map(Vec::as_slice)
    }

    /// Current running total of a series
    pub fn total(&self, identity: &str) -> Option<u64> {
        self.series
            .get(identity)
            .and_then(|chain| chain.last())
            .map(|point| point.value)
    }

    /// Walk the recorded history at a fixed resolution
    ///
    /// # Errors
    /// Returns [`BackfillError::EmptyHistory`] if nothing was recorded.
    pub fn samples(&self, resolution: Resolution) -> Result<Resample<'_>, BackfillError> {
        let start = self
            .series
            .values()
            .filter_map(|chain| chain.first())
            .map(|head| head.at)
            .min()
            .ok_or(BackfillError::EmptyHistory)?;

        let cursors = self
            .series
            .iter()
            .filter(|(_, chain)| !chain.is_empty())
            .map(|(identity, chain)| Cursor {
                identity,
                chain,
                index: 0,
            })
            .collect();

        Ok(Resample {
            cursors,
            next_at: Some(start),
            step: resolution.as_delta(),
        })
    }
}

impl Recorder for ChainRecorder {
    fn inc(&mut self, identity: &str, amount: u64, at: DateTime<Utc>) {
        if let Some(chain) = self.series.get_mut(identity)
            && let Some(tail) = chain.last()
        {
            if tail.at > at {
                tracing::warn!(
                    series = %identity,
                    at = at.timestamp(),
                    current = tail.at.timestamp(),
                    "Ignoring increment older than the latest record of its series"
                );
                return;
            }
            // Equal timestamps still append a new point; the walk picks the
            // last one, so the observed value is the full sum.
            let value = tail.value.saturating_add(amount);
            chain.push(Point { value, at });
            return;
        }

        self.series
            .insert(identity.to_owned(), vec![Point { value: amount, at }]);
    }

    fn render<W: Write>(&self, sink: W, resolution: Resolution) -> Result<(), BackfillError> {
        let mut sink = BufWriter::new(sink);
        let mut steps = 0usize;
        let mut lines = 0usize;

        for step in self.samples(resolution)? {
            steps += 1;
            for sample in &step.samples {
                writeln!(sink, "{sample}")?;
                lines += 1;
            }
        }
        sink.flush()?;

        tracing::debug!(
            series = self.series.len(),
            steps,
            lines,
            resolution_seconds = resolution.as_delta().num_seconds(),
            "Rendered backfill"
        );
        Ok(())
    }
}

/// A single emitted sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample<'a> {
    pub identity: &'a str,
    pub value: u64,
    pub at: DateTime<Utc>,
}

impl fmt::Display for Sample<'_> {
    /// `<identity> <value> <unix seconds>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.identity, self.value, self.at.timestamp())
    }
}

/// All samples emitted at one point of simulated time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<'a> {
    pub at: DateTime<Utc>,
    pub samples: Vec<Sample<'a>>,
}

/// Where a series stands relative to a point in time
enum Position {
    /// The series' first point lies in the future
    Pending,
    /// The point at this index is current and more points follow
    Active(usize),
    /// The point at this index is current and is the last one
    Exhausted(usize),
}

struct Cursor<'a> {
    identity: &'a str,
    // Never empty.
    chain: &'a [Point],
    index: usize,
}

impl Cursor<'_> {
    fn forward(&self, to: DateTime<Utc>) -> Position {
        if self.chain[self.index].at > to {
            return Position::Pending;
        }
        let mut index = self.index;
        while let Some(next) = self.chain.get(index + 1) {
            if next.at > to {
                return Position::Active(index);
            }
            index += 1;
        }
        Position::Exhausted(index)
    }
}

/// Iterator over resolution-aligned steps, see [`ChainRecorder::samples`]
pub struct Resample<'a> {
    cursors: Vec<Cursor<'a>>,
    next_at: Option<DateTime<Utc>>,
    step: TimeDelta,
}

impl<'a> Iterator for Resample<'a> {
    type Item = Step<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let now = self.next_at?;
        let mut active = false;
        let mut samples = Vec::with_capacity(self.cursors.len());

        for cursor in &mut self.cursors {
            let index = match cursor.forward(now) {
                Position::Pending => {
                    // A series that has not started yet still has history
                    // ahead of it, so the walk must go on.
                    active = true;
                    continue;
                }
                Position::Active(index) => {
                    active = true;
                    cursor.index = index;
                    index
                }
                Position::Exhausted(index) => index,
            };
            samples.push(Sample {
                identity: cursor.identity,
                value: cursor.chain[index].value,
                at: now,
            });
        }

        self.next_at = if active {
            now.checked_add_signed(self.step)
        } else {
            None
        };
        Some(Step { at: now, samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_724_512_000, 0).expect("valid timestamp")
    }

    fn secs(n: i64) -> DateTime<Utc> {
        start() + TimeDelta::seconds(n)
    }

    fn render_to_string(recorder: &ChainRecorder, resolution_secs: u64) -> String {
        let mut out = Vec::new();
        recorder
            .render(&mut out, Resolution::from_secs(resolution_secs).unwrap())
            .expect("render should succeed");
        String::from_utf8(out).expect("output is utf-8")
    }

    #[test]
    fn test_single_series_forward_fill() {
        let mut r = ChainRecorder::new();
        r.inc("foo", 1, secs(0)); // 1
        r.inc("foo", 1, secs(10)); // 2
        // Between resolution steps: raises the value but is never rendered
        r.inc("foo", 1, secs(15)); // 3
        r.inc("foo", 1, secs(20)); // 4
        r.inc("foo", 1, secs(33)); // 5

        let want = "foo 1 1724512000\n\
                    foo 2 1724512010\n\
                    foo 4 1724512020\n\
                    foo 4 1724512030\n\
                    foo 5 1724512040\n";
        assert_eq!(render_to_string(&r, 10), want);
    }

    #[test]
    fn test_disjoint_series_wait_for_each_other() {
        let mut r = ChainRecorder::new();
        r.inc("a{}", 1, secs(0));
        r.inc("a{}", 1, secs(20));
        r.inc("b{}", 5, secs(30));
        r.inc("b{}", 5, secs(50));

        let want = "a{} 1 1724512000\n\
                    a{} 1 1724512010\n\
                    a{} 2 1724512020\n\
                    a{} 2 1724512030\n\
                    b{} 5 1724512030\n\
                    a{} 2 1724512040\n\
                    b{} 5 1724512040\n\
                    a{} 2 1724512050\n\
                    b{} 10 1724512050\n";
        assert_eq!(render_to_string(&r, 10), want);
    }

    #[test]
    fn test_late_series_is_not_dropped_when_early_series_is_exhausted() {
        let mut r = ChainRecorder::new();
        r.inc("early", 3, secs(0));
        r.inc("late", 7, secs(25));

        let steps: Vec<_> = r
            .samples(Resolution::from_secs(10).unwrap())
            .unwrap()
            .collect();
        assert_eq!(steps.len(), 4);
        let last = steps.last().unwrap();
        assert_eq!(last.at, secs(30));
        assert_eq!(
            last.samples
                .iter()
                .map(|s| (s.identity, s.value))
                .collect::<Vec<_>>(),
            vec![("early", 3), ("late", 7)]
        );
        // The late series is absent before its first record
        assert!(steps[..3].iter().all(|s| s.samples.len() == 1));
    }

    #[test]
    fn test_single_record_renders_once() {
        let mut r = ChainRecorder::new();
        r.inc("foo", 42, secs(0));
        assert_eq!(render_to_string(&r, 60), "foo 42 1724512000\n");
    }

    #[test]
    fn test_empty_recorder_fails_without_writing() {
        let r = ChainRecorder::new();
        let mut out = Vec::new();
        let err = r
            .render(&mut out, Resolution::from_secs(10).unwrap())
            .unwrap_err();
        assert!(matches!(err, BackfillError::EmptyHistory));
        assert!(out.is_empty());
    }

    #[test]
    fn test_out_of_order_increment_is_ignored() {
        let mut r = ChainRecorder::new();
        r.inc("foo", 1, secs(10));
        r.inc("foo", 5, secs(5));

        assert_eq!(r.total("foo"), Some(1));
        assert_eq!(r.history("foo").map(<[Point]>::len), Some(1));
    }

    #[test]
    fn test_equal_timestamps_append_separate_points() {
        let mut r = ChainRecorder::new();
        r.inc("foo", 1, secs(0));
        r.inc("foo", 2, secs(0));

        let history = r.history("foo").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].value, 1);
        assert_eq!(history[1].value, 3);
        assert_eq!(render_to_string(&r, 10), "foo 3 1724512000\n");
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut r = ChainRecorder::new();
        r.inc("x{}", 1, secs(0));
        r.inc("y{}", 2, secs(7));
        r.inc("x{}", 4, secs(31));

        assert_eq!(render_to_string(&r, 10), render_to_string(&r, 10));
    }

    #[test]
    fn test_subsecond_timestamps_render_whole_seconds() {
        let mut r = ChainRecorder::new();
        r.inc("foo", 1, start() + TimeDelta::milliseconds(1500));
        assert_eq!(render_to_string(&r, 10), "foo 1 1724512001\n");
    }

    #[test]
    fn test_zero_resolution_is_rejected() {
        let err = Resolution::new(Duration::ZERO).unwrap_err();
        assert!(matches!(err, BackfillError::InvalidResolution(d) if d.is_zero()));
    }

    #[test]
    fn test_oversized_resolution_is_rejected() {
        assert!(Resolution::new(Duration::MAX).is_err());
    }

    #[test]
    fn test_total_of_unknown_series_is_none() {
        let r = ChainRecorder::new();
        assert_eq!(r.total("missing"), None);
        assert!(r.history("missing").is_none());
        assert_eq!(r.series_count(), 0);
    }
}
