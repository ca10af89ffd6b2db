//! Zone automata
//!
//! The finite abstraction of a pattern automaton: states are
//! (TA state, zone) pairs produced by [`crate::ta2za::ta2za`], held in an
//! arena and addressed by [`ZaId`]. Edges store target ids per symbol.
//!
//! Dead-state removal keeps ids stable: pruned states are tombstoned and
//! every edge pointing at them is dropped, which is what the layered
//! traversals downstream rely on.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::automaton::{Alphabet, StateId, TimedAutomaton, EPSILON};
use crate::zone::Zone;

/// Arena index of a zone-automaton state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZaId(pub usize);

impl ZaId {
    /// Access the underlying index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// A zone-automaton state.
#[derive(Clone, Debug)]
pub struct ZaState {
    /// The pattern-automaton component.
    pub ta_state: StateId,
    /// The zone component.
    pub zone: Zone,
    /// Acceptance, inherited from the TA component.
    pub accepting: bool,
    /// Outgoing edges per symbol (`EPSILON` for unobservable moves).
    pub next: BTreeMap<Alphabet, Vec<ZaId>>,
    /// Cleared by dead-state removal.
    pub alive: bool,
}

/// A zone automaton.
#[derive(Clone, Debug, Default)]
pub struct ZoneAutomaton {
    /// State arena.
    pub states: Vec<ZaState>,
    /// Initial states.
    pub initial: Vec<ZaId>,
}

impl ZoneAutomaton {
    /// Append a state, returning its id.
    pub fn add_state(&mut self, ta_state: StateId, zone: Zone, accepting: bool) -> ZaId {
        self.states.push(ZaState {
            ta_state,
            zone,
            accepting,
            next: BTreeMap::new(),
            alive: true,
        });
        ZaId(self.states.len() - 1)
    }

    /// Number of states that survived dead-state removal.
    pub fn alive_count(&self) -> usize {
        self.states.iter().filter(|s| s.alive).count()
    }

    /// Extend `closure` with everything reachable by epsilon edges.
    pub fn epsilon_closure(&self, closure: &mut BTreeSet<ZaId>) {
        let mut waiting: VecDeque<ZaId> = closure.iter().copied().collect();
        while let Some(s) = waiting.pop_front() {
            if let Some(targets) = self.states[s.0].next.get(&EPSILON) {
                for &t in targets {
                    if closure.insert(t) {
                        waiting.push_back(t);
                    }
                }
            }
        }
    }

    /// Remove states from which no accepting state is reachable, or that
    /// are unreachable from the initial set. Removed states are
    /// tombstoned and all edges into them dropped.
    pub fn remove_dead_states(&mut self) {
        // Forward reachability from the initial states.
        let mut forward = vec![false; self.states.len()];
        let mut queue: VecDeque<ZaId> = self.initial.iter().copied().collect();
        for &s in &self.initial {
            forward[s.0] = true;
        }
        while let Some(s) = queue.pop_front() {
            for targets in self.states[s.0].next.values() {
                for &t in targets {
                    if !forward[t.0] {
                        forward[t.0] = true;
                        queue.push_back(t);
                    }
                }
            }
        }

        // Backward reachability to any accepting state.
        let mut reverse: Vec<Vec<ZaId>> = vec![Vec::new(); self.states.len()];
        for (i, s) in self.states.iter().enumerate() {
            for targets in s.next.values() {
                for &t in targets {
                    reverse[t.0].push(ZaId(i));
                }
            }
        }
        let mut backward = vec![false; self.states.len()];
        let mut queue: VecDeque<ZaId> = VecDeque::new();
        for (i, s) in self.states.iter().enumerate() {
            if s.accepting {
                backward[i] = true;
                queue.push_back(ZaId(i));
            }
        }
        while let Some(s) = queue.pop_front() {
            for &p in &reverse[s.0] {
                if !backward[p.0] {
                    backward[p.0] = true;
                    queue.push_back(p);
                }
            }
        }

        for (i, s) in self.states.iter_mut().enumerate() {
            s.alive = forward[i] && backward[i];
        }
        let alive: Vec<bool> = self.states.iter().map(|s| s.alive).collect();
        self.initial.retain(|s| alive[s.0]);
        for s in self.states.iter_mut() {
            for targets in s.next.values_mut() {
                targets.retain(|t| alive[t.0]);
            }
            s.next.retain(|_, targets| !targets.is_empty());
        }
    }

    /// Emptiness of the recognised language: no accepting state is
    /// reachable from the initial set.
    pub fn is_empty(&self) -> bool {
        let mut visited = vec![false; self.states.len()];
        let mut queue: VecDeque<ZaId> = self.initial.iter().copied().collect();
        for &s in &self.initial {
            visited[s.0] = true;
        }
        while let Some(s) = queue.pop_front() {
            if self.states[s.0].accepting {
                return false;
            }
            for targets in self.states[s.0].next.values() {
                for &t in targets {
                    if !visited[t.0] {
                        visited[t.0] = true;
                        queue.push_back(t);
                    }
                }
            }
        }
        true
    }

    /// Rebind the initial set and acceptance flags after the underlying
    /// TA's initial/accepting sets changed, without rebuilding states.
    pub fn update_init_accepting(&mut self, ta: &TimedAutomaton) {
        self.initial.clear();
        for (i, s) in self.states.iter_mut().enumerate() {
            s.accepting = ta.states[s.ta_state.0].accepting;
            if ta.initial.contains(&s.ta_state) {
                self.initial.push(ZaId(i));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::Zone;

    fn bare_state() -> (StateId, Zone, bool) {
        (StateId(0), Zone::zero(1), false)
    }

    #[test]
    fn remove_dead_states_prunes_non_coreachable() {
        let mut za = ZoneAutomaton::default();
        let (ta, z, _) = bare_state();
        let s0 = za.add_state(ta, z.clone(), false);
        let s1 = za.add_state(ta, z.clone(), false);
        let s2 = za.add_state(ta, z, true);
        za.initial.push(s0);
        za.states[s0.0].next.entry(b'a').or_default().push(s1);
        za.states[s0.0].next.entry(b'a').or_default().push(s2);

        za.remove_dead_states();
        assert_eq!(za.alive_count(), 2);
        assert_eq!(za.initial.len(), 1);
        assert_eq!(za.states[s0.0].next[&b'a'], vec![s2]);
    }

    #[test]
    fn epsilon_closure_follows_only_epsilon_edges() {
        let mut za = ZoneAutomaton::default();
        let (ta, z, _) = bare_state();
        let s0 = za.add_state(ta, z.clone(), false);
        let s1 = za.add_state(ta, z.clone(), false);
        let s2 = za.add_state(ta, z, true);
        za.initial.push(s0);
        za.states[s0.0].next.entry(EPSILON).or_default().push(s0);
        za.states[s0.0].next.entry(EPSILON).or_default().push(s1);
        za.states[s0.0].next.entry(b'a').or_default().push(s2);

        let mut closure = BTreeSet::from([s0]);
        za.epsilon_closure(&mut closure);
        assert_eq!(closure.len(), 2);
        assert!(closure.contains(&s1));
        assert!(!closure.contains(&s2));
    }

    #[test]
    fn emptiness_is_reachability_of_acceptance() {
        let mut za = ZoneAutomaton::default();
        let (ta, z, _) = bare_state();
        let s0 = za.add_state(ta, z.clone(), false);
        let s1 = za.add_state(ta, z, true);
        za.initial.push(s0);
        assert!(za.is_empty());
        za.states[s0.0].next.entry(b'a').or_default().push(s1);
        assert!(!za.is_empty());
    }
}
