//! Running-average accumulator for metrics reporting.
//!
//! Each key keeps a weighted sum and a count; reading a key yields
//! `sum / count`. [`AverageMeter::get`] produces the `(name, mean)` pairs handed
//! to an external metrics sink, and [`AverageMeter::reset`] reports them to
//! the attached [`MetricsSink`] (if any) before zeroing the accumulators.

use std::collections::HashMap;
use std::fmt;

/// Receiver for averaged metrics, e.g. an experiment tracker client.
pub trait MetricsSink {
    fn log_metrics(&mut self, metrics: &[(String, f64)], step: u64);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Accumulator {
    sum: f64,
    count: u64,
}

pub struct AverageMeter {
    keys: Vec<String>,
    values: HashMap<String, Accumulator>,
    step: u64,
    sink: Option<Box<dyn MetricsSink>>,
}

impl AverageMeter {
    /// Create a meter tracking `keys`, in reporting order. Starts at step 1.
    pub fn new<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let values = keys
            .iter()
            .map(|key| (key.clone(), Accumulator::default()))
            .collect();
        Self {
            keys,
            values,
            step: 1,
            sink: None,
        }
    }

    /// Report to `sink` on every [`reset`](Self::reset).
    pub fn with_sink(mut self, sink: impl MetricsSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Add `value` with weight `n` to `key`. Keys not given at construction
    /// are tracked from their first update on.
    pub fn update(&mut self, key: &str, value: f64, n: u64) -> &mut Self {
        if !self.values.contains_key(key) {
            self.keys.push(key.to_string());
        }
        let acc = self.values.entry(key.to_string()).or_default();
        acc.sum += value * n as f64;
        acc.count += n;
        self
    }

    /// [`update`](Self::update) every `(key, value)` pair with the same weight.
    pub fn updates<K: AsRef<str>>(
        &mut self,
        values: impl IntoIterator<Item = (K, f64)>,
        n: u64,
    ) -> &mut Self {
        for (key, value) in values {
            self.update(key.as_ref(), value, n);
        }
        self
    }

    /// Running mean for `key`; `0.0` for unknown keys or zero counts.
    pub fn mean(&self, key: &str) -> f64 {
        match self.values.get(key) {
            Some(acc) if acc.count > 0 => acc.sum / acc.count as f64,
            _ => 0.0,
        }
    }

    /// Mean of every tracked key, named `{prefix}_{key}` when a prefix is given.
    pub fn get(&self, prefix: Option<&str>) -> Vec<(String, f64)> {
        self.keys
            .iter()
            .map(|key| {
                let name = match prefix {
                    Some(prefix) => format!("{prefix}_{key}"),
                    None => key.clone(),
                };
                (name, self.mean(key))
            })
            .collect()
    }

    /// Advance to `step` (or the next step), report the current means to the
    /// sink under `prefix`, then zero every accumulator.
    pub fn reset(&mut self, step: Option<u64>, prefix: Option<&str>) -> &mut Self {
        self.step = step.unwrap_or(self.step + 1);
        let metrics = self.get(prefix);
        if let Some(sink) = self.sink.as_mut() {
            sink.log_metrics(&metrics, self.step);
        }
        for acc in self.values.values_mut() {
            *acc = Accumulator::default();
        }
        self
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl fmt::Debug for AverageMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AverageMeter")
            .field("step", &self.step)
            .field("means", &self.get(None))
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl fmt::Display for AverageMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}:{:.3}", self.mean(key))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Reports = Rc<RefCell<Vec<(Vec<(String, f64)>, u64)>>>;

    struct RecordingSink(Reports);

    impl MetricsSink for RecordingSink {
        fn log_metrics(&mut self, metrics: &[(String, f64)], step: u64) {
            self.0.borrow_mut().push((metrics.to_vec(), step));
        }
    }

    #[test]
    fn single_updates_average() {
        let mut meter = AverageMeter::new(["key1", "key2"]);
        meter.update("key1", 2.0, 1);
        meter.update("key1", 3.0, 1);
        meter.update("key2", 5.0, 1);
        assert_eq!(meter.mean("key1"), 2.5);
        assert_eq!(meter.mean("key2"), 5.0);
    }

    #[test]
    fn weighted_updates() {
        let mut meter = AverageMeter::new(["key1", "key2"]);
        meter.update("key1", 2.0, 1).update("key1", 4.0, 3);
        meter.update("key2", 5.0, 5);
        assert_eq!(meter.mean("key1"), 3.5);
        assert_eq!(meter.mean("key2"), 5.0);
    }

    #[test]
    fn updates_from_pairs() {
        let mut meter = AverageMeter::new(["key1", "key2"]);
        meter.updates([("key1", 2.0), ("key2", 5.0)], 1);
        meter.updates([("key1", 3.0)], 1);
        assert_eq!(meter.mean("key1"), 2.5);
        assert_eq!(meter.mean("key2"), 5.0);
    }

    #[test]
    fn display_three_decimals() {
        let mut meter = AverageMeter::new(["key1", "key2"]);
        meter.updates([("key1", 2.0), ("key2", 5.0)], 1);
        meter.updates([("key1", 3.0)], 1);
        assert_eq!(meter.to_string(), "key1:2.500, key2:5.000");
    }

    #[test]
    fn unknown_and_empty_keys_read_zero() {
        let meter = AverageMeter::new(["key1"]);
        assert_eq!(meter.mean("not_exists"), 0.0);
        assert_eq!(meter.mean("key1"), 0.0);
    }

    #[test]
    fn get_with_and_without_prefix() {
        let mut meter = AverageMeter::new(["loss", "acc"]);
        meter.update("loss", 0.5, 1).update("acc", 0.75, 1);
        assert_eq!(
            meter.get(None),
            vec![("loss".to_string(), 0.5), ("acc".to_string(), 0.75)]
        );
        assert_eq!(
            meter.get(Some("train")),
            vec![("train_loss".to_string(), 0.5), ("train_acc".to_string(), 0.75)]
        );
    }

    #[test]
    fn update_tracks_new_keys() {
        let mut meter = AverageMeter::new(Vec::<String>::new());
        meter.update("late", 1.0, 2);
        assert_eq!(meter.keys(), &["late".to_string()]);
        assert_eq!(meter.mean("late"), 1.0);
    }

    #[test]
    fn reset_reports_then_zeroes() {
        let reports: Reports = Rc::default();
        let mut meter = AverageMeter::new(["loss"]).with_sink(RecordingSink(Rc::clone(&reports)));
        assert_eq!(meter.step(), 1);

        meter.update("loss", 4.0, 2);
        meter.reset(None, Some("valid"));

        assert_eq!(meter.step(), 2);
        assert_eq!(meter.mean("loss"), 0.0);
        assert_eq!(
            *reports.borrow(),
            vec![(vec![("valid_loss".to_string(), 4.0)], 2)]
        );
    }

    #[test]
    fn reset_to_explicit_step_without_sink() {
        let mut meter = AverageMeter::new(["loss"]);
        meter.update("loss", 1.0, 1);
        meter.reset(Some(10), None);
        assert_eq!(meter.step(), 10);
        assert_eq!(meter.mean("loss"), 0.0);
    }
}
