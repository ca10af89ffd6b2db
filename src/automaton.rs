//! Pattern timed automata
//!
//! The automaton is an arena of states addressed by [`StateId`];
//! transitions hold target ids rather than pointers, so cloning an
//! automaton preserves every id and overlay constructions (skip-value
//! automata, products) can translate states by index alone.
//!
//! Reserved symbols: `0` labels an epsilon transition, `b'$'` the
//! pattern-end marker used by the dollar acceptance policy.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use crate::constraint::{ClockIndex, Constraint};

/// Input symbol. `0` is reserved for epsilon, `b'$'` for pattern end.
pub type Alphabet = u8;

/// The epsilon label.
pub const EPSILON: Alphabet = 0;

/// The pattern-end marker label.
pub const DOLLAR: Alphabet = b'$';

/// Arena index of a state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub usize);

impl StateId {
    /// Access the underlying index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// One transition of a timed automaton.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Target state.
    pub target: StateId,
    /// Clocks reset to zero when the transition fires.
    pub resets: Vec<ClockIndex>,
    /// Conjunction of atomic clock constraints; empty means true.
    pub guard: Vec<Constraint>,
}

/// A state: an accepting flag and the outgoing transitions per symbol.
#[derive(Clone, Debug, Default)]
pub struct TaState {
    /// Whether the state is accepting.
    pub accepting: bool,
    /// Outgoing transitions, keyed by symbol (`EPSILON` for unobservable
    /// moves).
    pub next: BTreeMap<Alphabet, Vec<Transition>>,
}

impl TaState {
    /// A fresh state with the given accepting flag and no transitions.
    pub fn new(accepting: bool) -> Self {
        TaState { accepting, next: BTreeMap::new() }
    }
}

/// A timed automaton: state arena, initial set and per-clock maximum
/// constants (used to derive the abstraction ceiling).
#[derive(Clone, Debug, Default)]
pub struct TimedAutomaton {
    /// All states.
    pub states: Vec<TaState>,
    /// Initial states.
    pub initial: Vec<StateId>,
    /// `max_constants[x]` bounds every constant compared against clock
    /// `x`; monotone upper bounds are fine.
    pub max_constants: Vec<i32>,
}

impl TimedAutomaton {
    /// Append a state, returning its id.
    pub fn add_state(&mut self, accepting: bool) -> StateId {
        self.states.push(TaState::new(accepting));
        StateId(self.states.len() - 1)
    }

    /// Add a transition from `source` on `symbol`.
    pub fn add_transition(
        &mut self,
        source: StateId,
        symbol: Alphabet,
        target: StateId,
        resets: Vec<ClockIndex>,
        guard: Vec<Constraint>,
    ) {
        self.states[source.0]
            .next
            .entry(symbol)
            .or_default()
            .push(Transition { target, resets, guard });
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of clock variables.
    pub fn clock_count(&self) -> usize {
        self.max_constants.len()
    }

    /// Whether any state has an epsilon transition.
    pub fn has_epsilon(&self) -> bool {
        self.states.iter().any(|s| s.next.contains_key(&EPSILON))
    }

    /// The set of observable symbols labelling any transition.
    pub fn alphabet(&self) -> BTreeSet<Alphabet> {
        let mut sigma = BTreeSet::new();
        for s in &self.states {
            for &c in s.next.keys() {
                if c != EPSILON {
                    sigma.insert(c);
                }
            }
        }
        sigma
    }

    /// Largest constant over all clocks, for the abstraction ceiling.
    pub fn max_constant(&self) -> i32 {
        self.max_constants.iter().copied().max().unwrap_or(0)
    }

    /// Recompute `max_constants` from the guards actually present.
    pub fn refresh_max_constants(&mut self, clocks: usize) {
        let mut max = vec![0i32; clocks];
        for s in &self.states {
            for edges in s.next.values() {
                for e in edges {
                    for g in &e.guard {
                        if g.x < clocks {
                            max[g.x] = max[g.x].max(g.c);
                        }
                    }
                }
            }
        }
        self.max_constants = max;
    }

    /// Naive membership test for observable (epsilon-free) automata,
    /// reading the whole word from time zero. Intended for tests and
    /// cross-checks, not for matching.
    pub fn accepts(&self, word: &[(Alphabet, f64)]) -> bool {
        let clocks = self.clock_count();
        let mut configs: Vec<(StateId, Vec<f64>)> =
            self.initial.iter().map(|&s| (s, vec![0.0; clocks])).collect();
        for i in 0..word.len() {
            let dt = if i > 0 { word[i].1 - word[i - 1].1 } else { word[i].1 };
            let mut next_configs = Vec::new();
            for (s, mut vals) in configs {
                for v in vals.iter_mut() {
                    *v += dt;
                }
                let Some(edges) = self.states[s.0].next.get(&word[i].0) else {
                    continue;
                };
                for e in edges {
                    if e.guard.iter().all(|g| g.satisfies(vals[g.x])) {
                        let mut nv = vals.clone();
                        for &x in &e.resets {
                            nv[x] = 0.0;
                        }
                        next_configs.push((e.target, nv));
                    }
                }
            }
            configs = next_configs;
        }
        configs.iter().any(|(s, _)| self.states[s.0].accepting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step() -> TimedAutomaton {
        // s0 --a, reset x0--> s1 --b, x0 < 1--> s2 (accepting)
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s1, vec![0], vec![]);
        ta.add_transition(s1, b'b', s2, vec![], vec![Constraint::lt(0, 1)]);
        ta.max_constants = vec![1];
        ta
    }

    #[test]
    fn membership_respects_guards_and_resets() {
        let ta = two_step();
        assert!(ta.accepts(&[(b'a', 1.0), (b'b', 1.5)]));
        assert!(!ta.accepts(&[(b'a', 1.0), (b'b', 2.5)]));
        assert!(!ta.accepts(&[(b'a', 1.0)]));
        assert!(!ta.accepts(&[(b'b', 0.5), (b'b', 0.7)]));
    }

    #[test]
    fn clone_preserves_state_ids() {
        let ta = two_step();
        let copy = ta.clone();
        assert_eq!(copy.state_count(), ta.state_count());
        assert_eq!(copy.initial, ta.initial);
        assert_eq!(
            copy.states[0].next[&b'a'][0].target,
            ta.states[0].next[&b'a'][0].target
        );
    }

    #[test]
    fn alphabet_skips_epsilon() {
        let mut ta = two_step();
        let s0 = StateId(0);
        ta.add_transition(s0, EPSILON, s0, vec![], vec![]);
        let sigma: Vec<u8> = ta.alphabet().into_iter().collect();
        assert_eq!(sigma, vec![b'a', b'b']);
        assert!(ta.has_epsilon());
    }

    #[test]
    fn refresh_max_constants_scans_guards() {
        let mut ta = two_step();
        ta.add_transition(StateId(1), b'c', StateId(2), vec![], vec![Constraint::ge(0, 7)]);
        ta.refresh_max_constants(1);
        assert_eq!(ta.max_constants, vec![7]);
    }
}
