//! Product automata
//!
//! The intersection of two pattern automata: states are pairs `(s1, s2)`
//! encoded as `s1 + |S1|·s2`, clocks of the second factor are shifted by
//! the first factor's clock count, and guards/resets are concatenated
//! under that shift.
//!
//! Transitions come in three regimes: synchronous (the same observable
//! symbol in both factors), epsilon in one factor while the other stays
//! put, and — for the signal product only — asynchronous moves on a
//! symbol present in only one factor.
//!
//! [`update_init_accepting`] rebinds the initial and accepting sets of an
//! already-built product after either factor was mutated, without
//! rebuilding the pair states.

use crate::automaton::{StateId, TimedAutomaton, Transition, EPSILON};
use crate::constraint::ClockIndex;

/// Pair-state encoding for a product of two automata.
#[derive(Copy, Clone, Debug)]
pub struct PairMap {
    left_states: usize,
}

impl PairMap {
    /// The product state for the pair `(s1, s2)`.
    pub fn pair(&self, s1: StateId, s2: StateId) -> StateId {
        StateId(s1.0 + self.left_states * s2.0)
    }

    /// Invert the encoding.
    pub fn split(&self, s: StateId) -> (StateId, StateId) {
        (StateId(s.0 % self.left_states), StateId(s.0 / self.left_states))
    }
}

fn shifted(e: &Transition, shift: usize) -> (Vec<ClockIndex>, Vec<crate::constraint::Constraint>) {
    let resets = e.resets.iter().map(|&x| x + shift).collect();
    let guard = e
        .guard
        .iter()
        .map(|g| {
            let mut g = *g;
            g.x += shift;
            g
        })
        .collect();
    (resets, guard)
}

fn product_transition(
    out: &mut TimedAutomaton,
    source: StateId,
    target: StateId,
    e1: Option<&Transition>,
    e2: Option<&Transition>,
    shift: usize,
    symbol: u8,
) {
    let mut resets = Vec::new();
    let mut guard = Vec::new();
    if let Some(e1) = e1 {
        resets.extend_from_slice(&e1.resets);
        guard.extend_from_slice(&e1.guard);
    }
    if let Some(e2) = e2 {
        let (r, g) = shifted(e2, shift);
        resets.extend(r);
        guard.extend(g);
    }
    out.add_transition(source, symbol, target, resets, guard);
}

fn pair_skeleton(a1: &TimedAutomaton, a2: &TimedAutomaton) -> (TimedAutomaton, PairMap) {
    let map = PairMap { left_states: a1.state_count() };
    let mut out = TimedAutomaton::default();
    for _ in 0..a1.state_count() * a2.state_count() {
        out.add_state(false);
    }
    for s1 in 0..a1.state_count() {
        for s2 in 0..a2.state_count() {
            let id = map.pair(StateId(s1), StateId(s2));
            out.states[id.0].accepting = a1.states[s1].accepting && a2.states[s2].accepting;
        }
    }
    for &i1 in &a1.initial {
        for &i2 in &a2.initial {
            out.initial.push(map.pair(i1, i2));
        }
    }
    out.max_constants = a1
        .max_constants
        .iter()
        .chain(a2.max_constants.iter())
        .copied()
        .collect();
    (out, map)
}

/// The event product: synchronous observable moves plus one-sided
/// epsilon moves.
pub fn intersection(a1: &TimedAutomaton, a2: &TimedAutomaton) -> (TimedAutomaton, PairMap) {
    let (mut out, map) = pair_skeleton(a1, a2);
    let shift = a1.clock_count();

    for s1 in 0..a1.state_count() {
        for s2 in 0..a2.state_count() {
            let source = map.pair(StateId(s1), StateId(s2));

            if let Some(edges) = a1.states[s1].next.get(&EPSILON) {
                for e1 in edges {
                    let target = map.pair(e1.target, StateId(s2));
                    product_transition(&mut out, source, target, Some(e1), None, shift, EPSILON);
                }
            }
            if let Some(edges) = a2.states[s2].next.get(&EPSILON) {
                for e2 in edges {
                    let target = map.pair(StateId(s1), e2.target);
                    product_transition(&mut out, source, target, None, Some(e2), shift, EPSILON);
                }
            }

            for (&c, edges1) in &a1.states[s1].next {
                if c == EPSILON {
                    continue;
                }
                let Some(edges2) = a2.states[s2].next.get(&c) else {
                    continue;
                };
                for e1 in edges1 {
                    for e2 in edges2 {
                        let target = map.pair(e1.target, e2.target);
                        product_transition(
                            &mut out, source, target, Some(e1), Some(e2), shift, c,
                        );
                    }
                }
            }
        }
    }
    (out, map)
}

/// The signal product: as [`intersection`], plus asynchronous moves on a
/// symbol present in only one factor (the other factor stays put).
pub fn intersection_signal(a1: &TimedAutomaton, a2: &TimedAutomaton) -> (TimedAutomaton, PairMap) {
    let (mut out, map) = intersection(a1, a2);
    let shift = a1.clock_count();

    for s1 in 0..a1.state_count() {
        for s2 in 0..a2.state_count() {
            let source = map.pair(StateId(s1), StateId(s2));

            for (&c, edges1) in &a1.states[s1].next {
                if c == EPSILON || a2.states[s2].next.contains_key(&c) {
                    continue;
                }
                for e1 in edges1 {
                    let target = map.pair(e1.target, StateId(s2));
                    product_transition(&mut out, source, target, Some(e1), None, shift, c);
                }
            }
            for (&c, edges2) in &a2.states[s2].next {
                if c == EPSILON || a1.states[s1].next.contains_key(&c) {
                    continue;
                }
                for e2 in edges2 {
                    let target = map.pair(StateId(s1), e2.target);
                    product_transition(&mut out, source, target, None, Some(e2), shift, c);
                }
            }
        }
    }
    (out, map)
}

/// Rebind the product's initial and accepting sets from the (possibly
/// mutated) factors.
pub fn update_init_accepting(
    a1: &TimedAutomaton,
    a2: &TimedAutomaton,
    out: &mut TimedAutomaton,
    map: &PairMap,
) {
    out.initial.clear();
    for &i1 in &a1.initial {
        for &i2 in &a2.initial {
            out.initial.push(map.pair(i1, i2));
        }
    }
    for s1 in 0..a1.state_count() {
        for s2 in 0..a2.state_count() {
            let id = map.pair(StateId(s1), StateId(s2));
            out.states[id.0].accepting = a1.states[s1].accepting && a2.states[s2].accepting;
        }
    }
}
