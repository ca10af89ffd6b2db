//! KMP-style skip table
//!
//! For each pattern state `s`, `beta[s]` is the smallest `n ∈ [1, m]`
//! such that the pattern extended with `n` arbitrary prefix events can
//! still produce a run meeting a run of the pattern that currently sits
//! in `s`. When a match attempt dies with `s` among its last states, the
//! window start may safely advance by `beta[s]`.
//!
//! The test is an emptiness check on the product of two overlay automata:
//! `A_{+n}` (the pattern behind a chain of `n` wildcard events, with
//! widened bypass edges into a self-looping accepting sink) and `A_s^*`
//! (the pattern with acceptance pinned to `s` and an epsilon-reachable
//! wildcard sink per state). One zone automaton is grown incrementally
//! across all `(s, n)` queries.

use tracing::debug;

use crate::automaton::{Alphabet, StateId, TimedAutomaton, Transition, EPSILON};
use crate::constraint::widen;
use crate::intersection::{intersection, update_init_accepting};
use crate::ta2za::ta2za;
use crate::zone_automaton::ZoneAutomaton;

/// Per-state safe window advancement; depends only on the pattern.
#[derive(Clone, Debug)]
pub struct KmpSkipValue {
    beta: Vec<usize>,
}

/// Extend `ta` with `m + 1` chained wildcard prefix states and a
/// self-looping accepting sink reachable by widened copies of every edge
/// into an accepting state. Returns the extended automaton and the chain
/// states; making `chain[n]` initial lets the automaton read `n` extra
/// events before the original pattern starts.
fn make_an(
    ta: &TimedAutomaton,
    m: usize,
    sigma: &[Alphabet],
) -> (TimedAutomaton, Vec<StateId>) {
    let mut a0 = ta.clone();
    let orig_n = a0.state_count();

    let sink = a0.add_state(true);
    for &c in sigma {
        a0.add_transition(sink, c, sink, vec![], vec![]);
    }

    let chain: Vec<StateId> = (0..=m).map(|_| a0.add_state(false)).collect();
    let all_clocks: Vec<usize> = (0..ta.clock_count()).collect();
    for &init in &ta.initial {
        a0.add_transition(chain[0], EPSILON, init, all_clocks.clone(), vec![]);
    }
    for i in 1..=m {
        for &c in sigma {
            a0.add_transition(chain[i], c, chain[i - 1], vec![], vec![]);
        }
    }

    for s in 0..orig_n {
        let mut bypass: Vec<(Alphabet, Transition)> = Vec::new();
        for (&c, edges) in &a0.states[s].next {
            for e in edges {
                if e.target.0 < orig_n && a0.states[e.target.0].accepting {
                    let mut guard = e.guard.clone();
                    widen(&mut guard);
                    bypass.push((c, Transition { target: sink, resets: e.resets.clone(), guard }));
                }
            }
        }
        for (c, t) in bypass {
            a0.states[s].next.entry(c).or_default().push(t);
        }
    }
    (a0, chain)
}

/// Give every state of `ta` an epsilon-reachable wildcard sink. Returns
/// the extended automaton and the sink of each original state; pinning
/// acceptance to `{s, sink[s]}` carves out the runs through `s`.
fn make_as(ta: &TimedAutomaton, sigma: &[Alphabet]) -> (TimedAutomaton, Vec<StateId>) {
    let mut a_s = ta.clone();
    let orig_n = a_s.state_count();
    let mut sink_of = Vec::with_capacity(orig_n);
    for s in 0..orig_n {
        let d = a_s.add_state(false);
        sink_of.push(d);
        a_s.add_transition(StateId(s), EPSILON, d, vec![], vec![]);
        for &c in sigma {
            a_s.add_transition(d, c, d, vec![], vec![]);
        }
    }
    (a_s, sink_of)
}

impl KmpSkipValue {
    /// Precompute `beta` for a pattern whose minimum accepted length is
    /// `m` (from [`SundaySkipValue::min_length`]).
    pub fn new(ta: &TimedAutomaton, m: usize) -> Self {
        let sigma: Vec<Alphabet> = ta.alphabet().into_iter().collect();
        let (mut a0, chain) = make_an(ta, m, &sigma);
        let (mut a_s, sink_of) = make_as(ta, &sigma);
        let (mut a2, map) = intersection(&a0, &a_s);

        let mut za = ZoneAutomaton::default();
        let mut beta = vec![m; ta.state_count()];
        for s in 0..ta.state_count() {
            for t in 0..a_s.state_count() {
                a_s.states[t].accepting = t == s || t == sink_of[s].0;
            }
            for n in 1..=m {
                a0.initial = vec![chain[n]];
                update_init_accepting(&a0, &a_s, &mut a2, &map);
                za.update_init_accepting(&a2);
                ta2za(&a2, &mut za, None);
                if !za.is_empty() {
                    beta[s] = n;
                    break;
                }
            }
        }
        debug!(states = ta.state_count(), za_states = za.states.len(), "kmp skip table ready");
        KmpSkipValue { beta }
    }

    /// A degenerate table that always advances by one. For differential
    /// tests only.
    #[cfg(test)]
    pub(crate) fn disabled(states: usize) -> Self {
        KmpSkipValue { beta: vec![1; states] }
    }

    /// Safe advancement for a state; in `[1, m]`.
    pub fn skip(&self, s: StateId) -> usize {
        self.beta[s.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;
    use crate::sunday::SundaySkipValue;

    fn fixture() -> TimedAutomaton {
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(false);
        let s3 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s1, vec![1], vec![]);
        ta.add_transition(
            s1,
            b'b',
            s2,
            vec![],
            vec![Constraint::ge(1, 1), Constraint::le(1, 1)],
        );
        ta.add_transition(s1, b'c', s3, vec![], vec![Constraint::lt(0, 1)]);
        ta.add_transition(s2, b'c', s3, vec![], vec![Constraint::lt(0, 1)]);
        ta.add_transition(s3, b'a', s1, vec![1], vec![Constraint::lt(1, 1)]);
        ta.add_transition(s3, b'd', s3, vec![], vec![Constraint::gt(0, 1)]);
        ta.max_constants = vec![1, 1];
        ta
    }

    #[test]
    fn skips_of_the_four_state_fixture() {
        let ta = fixture();
        let m = SundaySkipValue::new(&ta).unwrap().min_length();
        assert_eq!(m, 2);
        let beta = KmpSkipValue::new(&ta, m);
        assert_eq!(beta.skip(StateId(0)), 1);
        assert_eq!(beta.skip(StateId(1)), 1);
        assert_eq!(beta.skip(StateId(2)), 2);
        assert_eq!(beta.skip(StateId(3)), 2);
    }

    #[test]
    fn skips_stay_within_one_and_m() {
        let ta = fixture();
        let m = SundaySkipValue::new(&ta).unwrap().min_length();
        let beta = KmpSkipValue::new(&ta, m);
        for s in 0..ta.state_count() {
            let b = beta.skip(StateId(s));
            assert!(b >= 1 && b <= m);
        }
    }
}
