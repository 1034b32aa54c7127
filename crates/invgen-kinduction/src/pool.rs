//! The candidate arena and its per-round bookkeeping.

use crate::candidate::{
    CandidateGroup, CandidateId, CandidateInvariant, CandidateKind, CandidateStatus,
};
use crate::engine::RoundOutcome;
use invgen_core::{ExprTree, InvariantSnapshot, Location, LocationInvariants};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// What one round changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub confirmed: Vec<CandidateId>,
    /// Candidates that lost their last location this round.
    pub disproved: Vec<CandidateId>,
    pub removed_locations: usize,
    /// Groups whose remaining-location set became empty this round.
    pub exhausted_groups: Vec<String>,
    pub safety_confirmed: bool,
}

/// All candidates of one generator, indexed by [`CandidateId`].
///
/// Locations only ever leave a candidate (and its group); a disproved
/// candidate never becomes live again and a confirmed one stays confirmed.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: Vec<CandidateInvariant>,
    groups: BTreeMap<String, CandidateGroup>,
    safety: Option<CandidateId>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a proposed candidate. Grouped candidates also add their locations
    /// to the group's remaining-location set.
    pub fn propose(
        &mut self,
        expression: ExprTree,
        locations: impl IntoIterator<Item = Location>,
        group: Option<String>,
        kind: CandidateKind,
    ) -> CandidateId {
        let id = CandidateId(self.candidates.len() as u32);
        let locations: BTreeSet<Location> = locations.into_iter().collect();
        if let Some(group_id) = &group {
            let entry = self
                .groups
                .entry(group_id.clone())
                .or_insert_with(|| CandidateGroup {
                    id: group_id.clone(),
                    remaining: BTreeSet::new(),
                    members: Vec::new(),
                });
            entry.remaining.extend(locations.iter().copied());
            entry.members.push(id);
        }
        self.candidates.push(CandidateInvariant {
            id,
            expression,
            locations,
            group,
            kind,
            status: CandidateStatus::Proposed,
        });
        id
    }

    /// Add the safety property: no error location is reachable.
    ///
    /// # Panics
    /// If the pool already has one.
    pub fn propose_safety_property(
        &mut self,
        targets: impl IntoIterator<Item = Location>,
    ) -> CandidateId {
        assert!(self.safety.is_none(), "candidate pool already has a safety property");
        let id = self.propose(ExprTree::False, targets, None, CandidateKind::SafetyProperty);
        self.safety = Some(id);
        id
    }

    /// Register locations for a group without proposing anything there.
    pub fn extend_group(&mut self, group: &str, locations: impl IntoIterator<Item = Location>) {
        let entry = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| CandidateGroup {
                id: group.to_string(),
                remaining: BTreeSet::new(),
                members: Vec::new(),
            });
        entry.remaining.extend(locations);
    }

    pub fn get(&self, id: CandidateId) -> Option<&CandidateInvariant> {
        self.candidates.get(id.index())
    }

    pub fn group(&self, id: &str) -> Option<&CandidateGroup> {
        self.groups.get(id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &CandidateGroup> {
        self.groups.values()
    }

    pub fn safety_property(&self) -> Option<&CandidateInvariant> {
        self.safety.and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateInvariant> {
        self.candidates.iter()
    }

    pub fn proposed(&self) -> impl Iterator<Item = &CandidateInvariant> {
        self.candidates.iter().filter(|c| c.is_proposed())
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &CandidateInvariant> {
        self.candidates.iter().filter(|c| c.is_confirmed())
    }

    pub fn has_proposed(&self) -> bool {
        self.candidates.iter().any(CandidateInvariant::is_proposed)
    }

    /// Number of candidates, not counting the safety property.
    pub fn total_candidates(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| !c.is_safety_property())
            .count()
    }

    /// Number of confirmed candidates, not counting the safety property.
    pub fn confirmed_candidates(&self) -> usize {
        self.confirmed().filter(|c| !c.is_safety_property()).count()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Fold the engine's verdict for one round into the pool.
    ///
    /// A candidate refuted somewhere in a round is not confirmed in that
    /// round, even if the engine also lists it as confirmed.
    pub fn apply_round(&mut self, outcome: &RoundOutcome) -> RoundSummary {
        let mut summary = RoundSummary::default();
        let mut refuted: BTreeSet<CandidateId> = BTreeSet::new();

        for &(id, location) in &outcome.disproved_at {
            let Some(candidate) = self.candidates.get_mut(id.index()) else {
                warn!(%id, "engine refuted an unknown candidate");
                continue;
            };
            if !candidate.is_proposed() {
                warn!(%id, status = ?candidate.status, "engine refuted a resolved candidate, ignoring");
                continue;
            }
            refuted.insert(id);
            if candidate.is_safety_property() {
                debug!(%location, "safety property refuted in this round");
                continue;
            }
            if !candidate.locations.remove(&location) {
                continue;
            }
            summary.removed_locations += 1;
            debug!(%id, %location, "candidate refuted at location");

            if let Some(group_id) = &candidate.group {
                if let Some(group) = self.groups.get_mut(group_id) {
                    if group.remaining.remove(&location) && group.remaining.is_empty() {
                        debug!(group = %group_id, "candidate group refuted at every location");
                        summary.exhausted_groups.push(group_id.clone());
                    }
                }
            }
            if candidate.locations.is_empty() {
                candidate.status = CandidateStatus::Disproved;
                summary.disproved.push(id);
            }
        }

        for &id in &outcome.confirmed {
            if refuted.contains(&id) {
                continue;
            }
            let Some(candidate) = self.candidates.get_mut(id.index()) else {
                warn!(%id, "engine confirmed an unknown candidate");
                continue;
            };
            if !candidate.is_proposed() {
                continue;
            }
            candidate.status = CandidateStatus::Confirmed;
            summary.confirmed.push(id);
            if candidate.is_safety_property() {
                summary.safety_confirmed = true;
            }
        }
        summary
    }

    /// Everything confirmed so far, conjoined per location.
    pub fn snapshot(&self) -> InvariantSnapshot {
        let mut table = LocationInvariants::new();
        for candidate in self.confirmed() {
            for &location in &candidate.locations {
                table.strengthen(location, candidate.expression.clone());
            }
        }
        table.into_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const L1: Location = Location::new(1);
    const L2: Location = Location::new(2);
    const L3: Location = Location::new(3);

    fn x_nonneg() -> ExprTree {
        ExprTree::leaf("x >= 0", true)
    }

    #[test]
    fn refuted_location_is_removed_but_candidate_survives() {
        let mut pool = CandidatePool::new();
        let c = pool.propose(x_nonneg(), [L1, L2], None, CandidateKind::Witness);
        let summary = pool.apply_round(&RoundOutcome {
            confirmed: [c].into_iter().collect(),
            disproved_at: vec![(c, L2)],
            exhausted: false,
        });
        let candidate = pool.get(c).unwrap();
        assert_eq!(candidate.locations, [L1].into_iter().collect());
        assert_eq!(candidate.status, CandidateStatus::Proposed);
        assert!(summary.confirmed.is_empty());
        assert_eq!(summary.removed_locations, 1);
        assert!(pool.snapshot().is_trivial());
    }

    #[test]
    fn candidate_without_locations_is_disproved() {
        let mut pool = CandidatePool::new();
        let c = pool.propose(x_nonneg(), [L1], None, CandidateKind::Witness);
        let summary = pool.apply_round(&RoundOutcome {
            disproved_at: vec![(c, L1)],
            ..RoundOutcome::default()
        });
        assert_eq!(summary.disproved, vec![c]);
        assert!(!pool.has_proposed());

        // A later confirmation does not bring it back.
        pool.apply_round(&RoundOutcome {
            confirmed: [c].into_iter().collect(),
            ..RoundOutcome::default()
        });
        assert_eq!(pool.get(c).unwrap().status, CandidateStatus::Disproved);
    }

    #[test]
    fn group_is_exhausted_when_last_location_goes() {
        let mut pool = CandidatePool::new();
        let group = Some("q1".to_string());
        let a = pool.propose(x_nonneg(), [L1], group.clone(), CandidateKind::Witness);
        let b = pool.propose(x_nonneg(), [L2], group, CandidateKind::Witness);

        let first = pool.apply_round(&RoundOutcome {
            disproved_at: vec![(a, L1)],
            ..RoundOutcome::default()
        });
        assert!(first.exhausted_groups.is_empty());
        assert_eq!(pool.group("q1").unwrap().remaining.len(), 1);

        let second = pool.apply_round(&RoundOutcome {
            disproved_at: vec![(b, L2)],
            ..RoundOutcome::default()
        });
        assert_eq!(second.exhausted_groups, vec!["q1".to_string()]);
        assert!(pool.group("q1").unwrap().is_refuted());
    }

    #[test]
    fn safety_property_is_never_discarded() {
        let mut pool = CandidatePool::new();
        let safety = pool.propose_safety_property([L3]);
        pool.apply_round(&RoundOutcome {
            disproved_at: vec![(safety, L3)],
            ..RoundOutcome::default()
        });
        let candidate = pool.safety_property().unwrap();
        assert_eq!(candidate.locations.len(), 1);
        assert!(candidate.is_proposed());

        let summary = pool.apply_round(&RoundOutcome {
            confirmed: [safety].into_iter().collect(),
            ..RoundOutcome::default()
        });
        assert!(summary.safety_confirmed);
        assert!(pool.snapshot().tree_at(L3).is_false());
        assert_eq!(pool.total_candidates(), 0);
        assert_eq!(pool.confirmed_candidates(), 0);
    }

    #[test]
    fn snapshot_conjoins_confirmed_candidates() {
        let mut pool = CandidatePool::new();
        let a = pool.propose(x_nonneg(), [L1], None, CandidateKind::Witness);
        let b = pool.propose(ExprTree::leaf("y < 3", true), [L1, L2], None, CandidateKind::Injected);
        pool.apply_round(&RoundOutcome {
            confirmed: [a, b].into_iter().collect(),
            ..RoundOutcome::default()
        });
        let snapshot = pool.snapshot();
        assert_eq!(
            snapshot.tree_at(L1),
            ExprTree::and(x_nonneg(), ExprTree::leaf("y < 3", true))
        );
        assert_eq!(snapshot.tree_at(L2), ExprTree::leaf("y < 3", true));
        assert!(snapshot.tree_at(L3).is_true());
        assert_eq!(pool.confirmed_candidates(), 2);
    }
}
