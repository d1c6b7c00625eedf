//! Labeled counter handles
//!
//! [`Metrics`] carries a label set and a shared recorder. Deriving a handle
//! with [`Metrics::with`] never changes the parent, so one handle can be
//! fanned out into per-file, per-sender, per-expression children that all
//! feed the same recorder.

use chrono::{DateTime, Utc};
use std::cell::{Ref, RefCell};
use std::io::Write;
use std::rc::Rc;

use super::error::BackfillError;
use super::labels::Labels;
use super::recorder::{ChainRecorder, Recorder, Resolution};

/// A label set bound to a recorder
#[derive(Debug)]
pub struct Metrics<R = ChainRecorder> {
    labels: Labels,
    recorder: Rc<RefCell<R>>,
}

impl Metrics<ChainRecorder> {
    /// Create an unlabeled handle over a fresh [`ChainRecorder`]
    pub fn new() -> Self {
        Self::with_recorder(ChainRecorder::new())
    }
}

impl Default for Metrics<ChainRecorder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Recorder> Metrics<R> {
    /// Create an unlabeled handle over the given recorder
    pub fn with_recorder(recorder: R) -> Self {
        Self {
            labels: Labels::new(),
            recorder: Rc::new(RefCell::new(recorder)),
        }
    }

    /// Derive a handle with one more label, sharing the same recorder
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            labels: self.labels.with(key, value),
            recorder: Rc::clone(&self.recorder),
        }
    }

    /// A counter named `name` inheriting this handle's labels
    pub fn metric(&self, name: impl Into<String>) -> Metric<R> {
        Metric {
            name: name.into(),
            labels: self.labels.clone(),
            recorder: Rc::clone(&self.recorder),
        }
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Borrow the shared recorder for inspection
    pub fn recorder(&self) -> Ref<'_, R> {
        self.recorder.borrow()
    }

    /// Render everything recorded through this handle or any of its relatives
    pub fn render<W: Write>(&self, sink: W, resolution: Resolution) -> Result<(), BackfillError> {
        self.recorder.borrow().render(sink, resolution)
    }
}

impl<R> Clone for Metrics<R> {
    fn clone(&self) -> Self {
        Self {
            labels: self.labels.clone(),
            recorder: Rc::clone(&self.recorder),
        }
    }
}

/// A named counter with labels
pub struct Metric<R = ChainRecorder> {
    name: String,
    labels: Labels,
    recorder: Rc<RefCell<R>>,
}

impl<R: Recorder> Metric<R> {
    /// Derive a counter with one more label
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            labels: self.labels.with(key, value),
            recorder: Rc::clone(&self.recorder),
        }
    }

    /// Series identity this counter records into
    pub fn identity(&self) -> String {
        self.labels.identity(&self.name)
    }

    /// Record an increment of `amount` at `at`
    pub fn inc(&self, amount: u64, at: DateTime<Utc>) {
        let identity = self.identity();
        self.recorder.borrow_mut().inc(&identity, amount, at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Recorder that only remembers which identities were incremented
    #[derive(Default)]
    struct IdentityCapture {
        names: Vec<String>,
    }

    impl Recorder for IdentityCapture {
        fn inc(&mut self, identity: &str, _amount: u64, _at: DateTime<Utc>) {
            self.names.push(identity.to_owned());
        }

        fn render<W: Write>(&self, _sink: W, _resolution: Resolution) -> Result<(), BackfillError> {
            Ok(())
        }
    }

    #[test]
    fn test_fan_out_handles_share_recorder() {
        let metrics = Metrics::with_recorder(IdentityCapture::default());
        let foo = metrics.with("x", "foo");
        let bar = metrics.with("x", "bar");
        let at = DateTime::from_timestamp(0, 0).unwrap();

        foo.metric("qux").inc(1, at);
        foo.with("y", "baz").metric("qux").inc(1, at);
        bar.metric("qux").inc(1, at);
        bar.metric("zot").inc(1, at);

        assert_eq!(
            metrics.recorder().names,
            vec![
                r#"qux{x="foo"}"#,
                r#"qux{x="foo",y="baz"}"#,
                r#"qux{x="bar"}"#,
                r#"zot{x="bar"}"#,
            ]
        );
    }

    #[test]
    fn test_metric_with_appends_after_inherited_labels() {
        let metrics = Metrics::new().with("sender", "alice");
        let metric = metrics.metric("tg_expressions_total").with("expression", "hi");
        assert_eq!(
            metric.identity(),
            r#"tg_expressions_total{sender="alice",expression="hi"}"#
        );
        assert!(metrics.labels().len() == 1);
    }

    #[test]
    fn test_unlabeled_metric_identity() {
        assert_eq!(Metrics::new().metric("foo").identity(), "foo{}");
    }

    #[test]
    fn test_increments_accumulate_through_separate_handles() {
        let metrics = Metrics::new();
        let at = DateTime::from_timestamp(1_724_512_000, 0).unwrap();

        metrics.with("sender", "bob").metric("m").inc(2, at);
        metrics.with("sender", "bob").metric("m").inc(3, at);
        metrics.with("sender", "eve").metric("m").inc(1, at);

        let recorder = metrics.recorder();
        assert_eq!(recorder.series_count(), 2);
        assert_eq!(recorder.total(r#"m{sender="bob"}"#), Some(5));
        assert_eq!(recorder.total(r#"m{sender="eve"}"#), Some(1));
    }

    #[test]
    fn test_render_through_handle() {
        let metrics = Metrics::new();
        let at = DateTime::from_timestamp(1_724_512_000, 0).unwrap();
        metrics.with("sender", "bob").metric("m").inc(2, at);

        let mut out = Vec::new();
        metrics
            .render(&mut out, Resolution::from_secs(3600).unwrap())
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "m{sender=\"bob\"} 2 1724512000\n"
        );
    }
}
