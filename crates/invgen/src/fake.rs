//! A scripted adjustable generator for the wrapper tests.

use invgen_core::{
    Adjustable, ExprTree, GenerationError, GenerationResult, GeneratorState, InvariantGenerator,
    InvariantSnapshot, Lifecycle, Location, LocationInvariants, Statistics, StatisticsProvider,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

pub(crate) const L1: Location = Location::new(1);

#[derive(Debug, Default)]
pub(crate) struct Log {
    pub starts: AtomicUsize,
    pub runs: AtomicUsize,
    pub cancels: AtomicUsize,
}

/// Precision level `n` proves `x <= n` at [`L1`]; levels from `safe_from`
/// on prove the program safe.
pub(crate) struct Precise {
    pub level: u32,
    max_level: u32,
    safe_from: Option<u32>,
    fail_at: Option<u32>,
    pub log: Arc<Log>,
    lifecycle: Lifecycle,
    result: OnceLock<GenerationResult<InvariantSnapshot>>,
    safe: AtomicBool,
}

impl Precise {
    pub fn new(max_level: u32, safe_from: Option<u32>) -> Self {
        Precise {
            level: 0,
            max_level,
            safe_from,
            fail_at: None,
            log: Arc::new(Log::default()),
            lifecycle: Lifecycle::new(),
            result: OnceLock::new(),
            safe: AtomicBool::new(false),
        }
    }

    pub fn failing_at(mut self, level: u32) -> Self {
        self.fail_at = Some(level);
        self
    }

    pub fn expected(level: u32) -> ExprTree {
        ExprTree::leaf(format!("x <= {}", 100 - level), true)
    }
}

impl InvariantGenerator for Precise {
    fn start(&self, entry: Location) {
        self.lifecycle.mark_started(entry);
        self.log.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.lifecycle.ensure_started("cancel");
        self.lifecycle.mark_cancelled();
        self.log.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> GenerationResult<InvariantSnapshot> {
        self.lifecycle.ensure_started("get");
        self.result
            .get_or_init(|| {
                if self.lifecycle.is_cancelled() {
                    return Err(GenerationError::cancelled("cancelled"));
                }
                self.log.runs.fetch_add(1, Ordering::SeqCst);
                if self.fail_at == Some(self.level) {
                    return Err(GenerationError::Engine(format!("level {} failed", self.level)));
                }
                if self.safe_from.is_some_and(|from| self.level >= from) {
                    self.safe.store(true, Ordering::SeqCst);
                }
                let mut table = LocationInvariants::new();
                table.strengthen(L1, Self::expected(self.level));
                Ok(table.into_snapshot())
            })
            .clone()
    }

    fn is_program_safe(&self) -> bool {
        self.safe.load(Ordering::SeqCst)
    }

    fn state(&self) -> GeneratorState {
        self.lifecycle.state(self.result.get().cloned())
    }
}

impl StatisticsProvider for Precise {
    fn collect_statistics(&self, out: &mut Vec<Statistics>) {
        let mut stats = Statistics::new("precise");
        stats.put("level", self.level);
        out.push(stats);
    }
}

impl Adjustable for Precise {
    fn adjust(&self) -> Option<Self> {
        if self.level >= self.max_level {
            return None;
        }
        Some(Precise {
            level: self.level + 1,
            max_level: self.max_level,
            safe_from: self.safe_from,
            fail_at: self.fail_at,
            log: Arc::clone(&self.log),
            lifecycle: Lifecycle::new(),
            result: OnceLock::new(),
            safe: AtomicBool::new(false),
        })
    }
}
