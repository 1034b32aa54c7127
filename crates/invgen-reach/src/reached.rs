//! The explored-state container.

use crate::engine::AbstractState;
use std::collections::VecDeque;

/// States explored so far, each with the precision it was explored under,
/// plus the waitlist of states whose successors are still to be computed.
#[derive(Debug)]
pub struct ReachedSet<S, P> {
    entries: Vec<(S, P)>,
    waitlist: VecDeque<usize>,
}

impl<S, P> Default for ReachedSet<S, P> {
    fn default() -> Self {
        ReachedSet {
            entries: Vec::new(),
            waitlist: VecDeque::new(),
        }
    }
}

impl<S, P> ReachedSet<S, P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state and put it on the waitlist. Returns its index.
    pub fn add(&mut self, state: S, precision: P) -> usize {
        let idx = self.entries.len();
        self.entries.push((state, precision));
        self.waitlist.push_back(idx);
        idx
    }

    pub fn has_waiting_state(&self) -> bool {
        !self.waitlist.is_empty()
    }

    pub fn pop_waiting(&mut self) -> Option<usize> {
        self.waitlist.pop_front()
    }

    /// Put an already explored state back on the waitlist.
    pub fn reenqueue(&mut self, idx: usize) {
        if idx < self.entries.len() && !self.waitlist.contains(&idx) {
            self.waitlist.push_back(idx);
        }
    }

    pub fn state(&self, idx: usize) -> &S {
        &self.entries[idx].0
    }

    pub fn precision(&self, idx: usize) -> &P {
        &self.entries[idx].1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.entries.iter().map(|(s, _)| s)
    }

    pub fn into_states(self) -> Vec<S> {
        self.entries.into_iter().map(|(s, _)| s).collect()
    }
}

impl<S: AbstractState, P> ReachedSet<S, P> {
    pub fn contains_target(&self) -> bool {
        self.states().any(AbstractState::is_target)
    }

    /// `true` if `state` is covered by a state already in the set.
    pub fn covers(&self, state: &S) -> bool {
        self.states().any(|s| state.is_less_or_equal(s))
    }
}
