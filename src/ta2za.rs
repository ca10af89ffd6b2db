//! Pattern automaton to zone automaton conversion
//!
//! Breadth-first construction of the zone abstraction: from each
//! discovered (state, zone) pair, let time elapse, apply each
//! transition's guard, reset the assigned clocks, widen by the
//! abstraction ceiling and canonize. A new pair is folded into an
//! existing one when an existing zone for the same TA state includes it
//! entry-wise.
//!
//! The construction is incremental: calling it again on a populated zone
//! automaton only explores from initial pairs not yet present, which is
//! how the skip-value computation reuses one automaton across many
//! initial-state rebindings.

use tracing::debug;

use crate::automaton::TimedAutomaton;
use crate::zone::{Bound, Zone};
use crate::zone_automaton::{ZaId, ZoneAutomaton};

/// Build (or extend) the zone automaton of `ta`. `initial_zone` defaults
/// to all clocks at zero.
pub fn ta2za(ta: &TimedAutomaton, za: &mut ZoneAutomaton, initial_zone: Option<Zone>) {
    let clock_count = ta.clock_count();
    let mut initial_zone = initial_zone.unwrap_or_else(|| Zone::zero(clock_count + 1));
    initial_zone.ceiling = if clock_count > 0 {
        Bound::le(f64::from(ta.max_constant()))
    } else {
        Bound::ZERO
    };

    let mut fresh_initial: Vec<_> = ta.initial.clone();
    if !za.states.is_empty() {
        fresh_initial.retain(|&s| {
            !za.states
                .iter()
                .any(|zs| zs.ta_state == s && zs.zone == initial_zone)
        });
    }
    if fresh_initial.is_empty() {
        return;
    }

    let mut frontier: Vec<ZaId> = Vec::with_capacity(fresh_initial.len());
    for &s in &fresh_initial {
        let id = za.add_state(s, initial_zone.clone(), ta.states[s.0].accepting);
        za.initial.push(id);
        frontier.push(id);
    }

    while !frontier.is_empty() {
        let current = std::mem::take(&mut frontier);
        for conf in current {
            let ta_state = za.states[conf.0].ta_state;
            let mut now_zone = za.states[conf.0].zone.clone();
            now_zone.elapse();
            for (&c, edges) in &ta.states[ta_state.0].next {
                for edge in edges {
                    let mut next_zone = now_zone.clone();
                    for g in &edge.guard {
                        next_zone.constrain(g);
                    }
                    if !next_zone.is_satisfiable() {
                        continue;
                    }
                    for &x in &edge.resets {
                        next_zone.reset(x + 1);
                    }
                    next_zone.abstractize();
                    next_zone.canonize();

                    let existing = za
                        .states
                        .iter()
                        .position(|zs| zs.ta_state == edge.target && zs.zone.includes(&next_zone));
                    let target = match existing {
                        Some(i) => ZaId(i),
                        None => {
                            let id = za.add_state(
                                edge.target,
                                next_zone,
                                ta.states[edge.target.0].accepting,
                            );
                            frontier.push(id);
                            id
                        }
                    };
                    za.states[conf.0].next.entry(c).or_default().push(target);
                }
            }
        }
    }
    debug!(states = za.states.len(), "zone automaton constructed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::StateId;
    use crate::constraint::Constraint;

    /// The four-state fixture shared with the skip-value tests:
    /// `a` resets x1, `b` needs x1 == 1, `c` accepts under x0 < 1,
    /// `d` self-loops under x0 > 1.
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
    fn fixture_language_is_nonempty() {
        let ta = fixture();
        let mut za = ZoneAutomaton::default();
        ta2za(&ta, &mut za, None);
        assert!(!za.is_empty());
    }

    #[test]
    fn cutting_the_accepting_edges_empties_the_language() {
        let mut ta = fixture();
        ta.states[1].next.remove(&b'c');
        ta.states[2].next.remove(&b'c');
        let mut za = ZoneAutomaton::default();
        ta2za(&ta, &mut za, None);
        assert!(za.is_empty());
    }

    #[test]
    fn after_reading_b_the_global_clock_blocks_acceptance() {
        // The path a;b forces x0 >= 1, so from the `b` successor the
        // accepting `c` edge (x0 < 1) is unsatisfiable and the state
        // dies.
        let ta = fixture();
        let mut za = ZoneAutomaton::default();
        ta2za(&ta, &mut za, None);
        let s2_states: Vec<_> = za
            .states
            .iter()
            .filter(|zs| zs.ta_state == StateId(2))
            .collect();
        assert!(!s2_states.is_empty());
        assert!(s2_states.iter().all(|zs| zs.next.is_empty()));
        za.remove_dead_states();
        assert!(za.states.iter().filter(|s| s.alive).all(|zs| zs.ta_state != StateId(2)));
    }

    #[test]
    fn conversion_is_incremental() {
        let ta = fixture();
        let mut za = ZoneAutomaton::default();
        ta2za(&ta, &mut za, None);
        let n = za.states.len();
        ta2za(&ta, &mut za, None);
        assert_eq!(za.states.len(), n);
        assert_eq!(za.initial.len(), 1);
    }
}
