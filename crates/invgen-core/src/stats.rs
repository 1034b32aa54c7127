//! Statistics reported by generators.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Accumulates wall-clock time over any number of timed intervals.
#[derive(Debug, Default)]
pub struct Timer {
    nanos: AtomicU64,
    intervals: AtomicU64,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(elapsed, Ordering::Relaxed);
        self.intervals.fetch_add(1, Ordering::Relaxed);
        result
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    pub fn intervals(&self) -> u64 {
        self.intervals.load(Ordering::Relaxed)
    }
}

/// A named block of key/value statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl Statistics {
    pub fn new(name: impl Into<String>) -> Self {
        Statistics {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl fmt::Display) -> &mut Self {
        self.entries.push((key.into(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "-".repeat(self.name.len()))?;
        let width = self.entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in &self.entries {
            writeln!(f, "{key:<width$} : {value}")?;
        }
        Ok(())
    }
}

pub trait StatisticsProvider {
    fn collect_statistics(&self, out: &mut Vec<Statistics>);
}
