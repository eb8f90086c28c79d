//! Weighted candidate states with normalization and bounded eviction.

use std::cmp::Ordering;

/// Maximum tolerance when checking whether weights sum to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// One candidate full-information state and its belief weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis<S> {
    state: S,
    weight: f64,
}

impl<S> Hypothesis<S> {
    /// Negative, NaN and infinite weights are clamped to zero.
    pub fn new(state: S, weight: f64) -> Self {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        Self { state, weight }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn into_parts(self) -> (S, f64) {
        (self.state, self.weight)
    }
}

/// Observable tracking status; collapse is never conflated with a single survivor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeliefStatus {
    Tracking { hypotheses: usize },
    Collapsed,
}

impl BeliefStatus {
    pub fn is_collapsed(self) -> bool {
        matches!(self, BeliefStatus::Collapsed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BeliefStatus::Tracking { .. } => "tracking",
            BeliefStatus::Collapsed => "collapsed",
        }
    }
}

/// The weighted collection tracked across plies. Insertion order is kept and
/// serves as the tie-break whenever entries are ranked by weight.
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisSet<S> {
    entries: Vec<Hypothesis<S>>,
}

impl<S> Default for HypothesisSet<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S> HypothesisSet<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single known state with weight 1.0.
    pub fn single(state: S) -> Self {
        Self {
            entries: vec![Hypothesis::new(state, 1.0)],
        }
    }

    pub fn from_weighted<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
    {
        pairs
            .into_iter()
            .map(|(state, weight)| Hypothesis::new(state, weight))
            .collect()
    }

    pub fn push(&mut self, state: S, weight: f64) {
        self.entries.push(Hypothesis::new(state, weight));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hypothesis<S>> {
        self.entries.iter()
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|entry| entry.weight).sum()
    }

    pub fn status(&self) -> BeliefStatus {
        if self.entries.is_empty() {
            BeliefStatus::Collapsed
        } else {
            BeliefStatus::Tracking {
                hypotheses: self.entries.len(),
            }
        }
    }

    /// Divides every weight by the total. Only a zero total empties the set.
    pub fn normalize(&mut self) {
        let mut total = self.total_weight();
        if total <= 0.0 {
            self.entries.clear();
            return;
        }
        if total.is_infinite() {
            // Finite weights whose sum overflows: bring them down to at most 1 first.
            let peak = self.entries.iter().map(|entry| entry.weight).fold(0.0, f64::max);
            for entry in &mut self.entries {
                entry.weight /= peak;
            }
            total = self.total_weight();
        }
        for entry in &mut self.entries {
            entry.weight /= total;
        }
    }

    /// Keeps the `max_size` heaviest entries (earlier insertion wins ties), then renormalizes.
    pub fn prune(&mut self, max_size: usize) {
        if self.entries.len() <= max_size {
            return;
        }
        self.entries.sort_by(by_weight_descending);
        self.entries.truncate(max_size);
        self.normalize();
    }

    /// Entries ordered by weight, heaviest first, insertion order breaking ties.
    pub fn ranked(&self) -> Vec<&Hypothesis<S>> {
        let mut ranked: Vec<&Hypothesis<S>> = self.entries.iter().collect();
        ranked.sort_by(|a, b| by_weight_descending(a, b));
        ranked
    }

    /// The first entry of [`HypothesisSet::ranked`].
    pub fn most_likely(&self) -> Option<&Hypothesis<S>> {
        self.entries.iter().fold(None, |best, entry| match best {
            Some(current) if current.weight >= entry.weight => Some(current),
            _ => Some(entry),
        })
    }
}

fn by_weight_descending<S>(a: &Hypothesis<S>, b: &Hypothesis<S>) -> Ordering {
    b.weight.total_cmp(&a.weight)
}

impl<S> FromIterator<Hypothesis<S>> for HypothesisSet<S> {
    fn from_iter<I: IntoIterator<Item = Hypothesis<S>>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<S> IntoIterator for HypothesisSet<S> {
    type Item = Hypothesis<S>;
    type IntoIter = std::vec::IntoIter<Hypothesis<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn weights<S>(set: &HypothesisSet<S>) -> Vec<f64> {
        set.iter().map(Hypothesis::weight).collect()
    }

    #[test]
    fn normalize_sums_to_one_randomised() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..32 {
            let size = rng.gen_range(1..40);
            let mut set: HypothesisSet<usize> = (0..size)
                .map(|idx| Hypothesis::new(idx, rng.gen_range(0.001..10.0)))
                .collect();
            set.normalize();
            assert_eq!(set.len(), size);
            assert!((set.total_weight() - 1.0).abs() < WEIGHT_TOLERANCE);
        }
    }

    #[test]
    fn all_zero_weights_collapse() {
        let mut set = HypothesisSet::from_weighted([("a", 0.0), ("b", 0.0)]);
        set.normalize();
        assert!(set.is_empty());
        assert_eq!(set.status(), BeliefStatus::Collapsed);
    }

    #[test]
    fn non_finite_and_negative_weights_are_clamped() {
        let set = HypothesisSet::from_weighted([
            ("a", -3.0),
            ("b", f64::NAN),
            ("c", f64::INFINITY),
            ("d", f64::NEG_INFINITY),
        ]);
        assert_eq!(weights(&set), vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn overflowing_total_still_normalizes() {
        let mut set = HypothesisSet::from_weighted([("a", f64::MAX), ("b", f64::MAX), ("c", 0.0)]);
        assert!(set.total_weight().is_infinite());
        set.normalize();
        assert_eq!(set.len(), 3);
        assert!((set.total_weight() - 1.0).abs() < WEIGHT_TOLERANCE);
        assert_eq!(weights(&set), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut set = HypothesisSet::from_weighted([("a", 3.0), ("b", 1.0), ("c", 0.5)]);
        set.normalize();
        let once = weights(&set);
        set.normalize();
        for (before, after) in once.iter().zip(weights(&set)) {
            assert!((before - after).abs() < WEIGHT_TOLERANCE);
        }
    }

    #[test]
    fn prune_keeps_heaviest_with_insertion_tie_break() {
        let mut set = HypothesisSet::from_weighted([
            ("light", 0.1),
            ("tie_first", 0.3),
            ("heavy", 0.4),
            ("tie_second", 0.3),
        ]);
        set.prune(2);
        let kept: Vec<&str> = set.iter().map(|h| *h.state()).collect();
        assert_eq!(kept, vec!["heavy", "tie_first"]);
        assert!((set.total_weight() - 1.0).abs() < WEIGHT_TOLERANCE);
        assert!((set.iter().next().unwrap().weight() - 4.0 / 7.0).abs() < WEIGHT_TOLERANCE);
    }

    #[test]
    fn prune_is_noop_within_bound() {
        let mut set = HypothesisSet::from_weighted([("a", 5.0), ("b", 1.0)]);
        set.prune(2);
        assert_eq!(weights(&set), vec![5.0, 1.0]);
    }

    #[test]
    fn prune_never_exceeds_bound_randomised() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..32 {
            let size = rng.gen_range(0..64);
            let bound = rng.gen_range(0..32);
            let mut set: HypothesisSet<usize> = (0..size)
                .map(|idx| Hypothesis::new(idx, rng.gen_range(0.0..1.0)))
                .collect();
            let mut expected: Vec<(usize, f64)> =
                set.iter().map(|h| (*h.state(), h.weight())).collect();
            expected.sort_by(|a, b| b.1.total_cmp(&a.1));
            expected.truncate(bound);

            set.prune(bound);
            assert!(set.len() <= bound);
            if size > bound {
                let mut kept: Vec<usize> = set.iter().map(|h| *h.state()).collect();
                let mut want: Vec<usize> = expected.iter().map(|(idx, _)| *idx).collect();
                kept.sort_unstable();
                want.sort_unstable();
                assert_eq!(kept, want);
            }
        }
    }

    #[test]
    fn most_likely_prefers_earliest_on_ties() {
        let set = HypothesisSet::from_weighted([("a", 0.2), ("b", 0.4), ("c", 0.4)]);
        assert_eq!(*set.most_likely().unwrap().state(), "b");
        assert_eq!(*set.ranked()[0].state(), "b");
        assert_eq!(*set.ranked()[2].state(), "a");
        assert!(HypothesisSet::<&str>::new().most_likely().is_none());
    }

    #[test]
    fn status_distinguishes_single_survivor_from_collapse() {
        let single = HypothesisSet::single("start");
        assert_eq!(single.status(), BeliefStatus::Tracking { hypotheses: 1 });
        assert!(!single.status().is_collapsed());
        assert!(HypothesisSet::<&str>::new().status().is_collapsed());
    }
}
