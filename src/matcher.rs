//! The streaming matcher
//!
//! One engine for all three acceptance policies, interleaving the three
//! ingredients of the timed Franek–Jennings–Smyth scheme:
//!
//! 1. a Sunday shift that slides the window start until the symbol at
//!    position `i + m − 1` can close a minimal match,
//! 2. a breadth-first pass over configurations from window start `i`,
//!    refining symbolic begin/end constraints per transition, and
//! 3. a KMP-style advance of `i` by the largest safe skip of the states
//!    the attempt died in.
//!
//! Two configuration representations are used. Patterns without epsilon
//! transitions carry an interval pair (begin bounds) plus concrete reset
//! times, and accepting tries solve the six-cell begin/end/delta triangle
//! by hand, propagating each tightening around it. Patterns with epsilon
//! transitions carry a full [`IntermediateZone`], allocating a timepoint
//! slot per observed event.
//!
//! The matcher never reads below the most recent `set_front` argument,
//! and `set_front` is called with non-decreasing positions, so the
//! source may release prefix storage as matching proceeds.

use thiserror::Error;
use tracing::debug;

use crate::answer::AnswerSink;
use crate::automaton::{StateId, TimedAutomaton, DOLLAR, EPSILON};
use crate::constraint::{Constraint, Op};
use crate::intermediate_zone::{IntermediateZone, ResetAt};
use crate::interval::Interval;
use crate::kmp_skip::KmpSkipValue;
use crate::sunday::{PatternEmpty, SundaySkipValue};
use crate::word::{WordError, WordSource};
use crate::zone::{Bound, Zone};

/// How a run of the pattern is allowed to finish.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcceptancePolicy {
    /// Accepting transitions are ordinary event edges; a match is
    /// reported when one fires.
    Event,
    /// Only `$`-labelled edges into accepting states report matches; the
    /// marker is tried between events and at the end of the stream.
    Dollar,
    /// Both: `$` edges as in [`AcceptancePolicy::Dollar`], and crossing
    /// into an accepting state by an ordinary edge reports a match
    /// ending exactly at that event.
    Either,
}

impl AcceptancePolicy {
    fn event_accepts(self) -> bool {
        matches!(self, AcceptancePolicy::Event)
    }
    fn dollar_accepts(self) -> bool {
        matches!(self, AcceptancePolicy::Dollar | AcceptancePolicy::Either)
    }
    fn accepts_on_entering(self) -> bool {
        matches!(self, AcceptancePolicy::Either)
    }
}

/// Matching failed before any stream processing could start.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The pattern accepts nothing.
    #[error(transparent)]
    PatternEmpty(#[from] PatternEmpty),
    /// The stream produced an unreadable record.
    #[error(transparent)]
    Word(#[from] WordError),
}

/// Match `ta` against `word`, pushing an answer zone into `sink` for
/// every match. Runs online: storage below the shifted window start is
/// released through `WordSource::set_front` as matching proceeds.
pub fn match_word<W: WordSource, S: AnswerSink>(
    word: &mut W,
    ta: &TimedAutomaton,
    policy: AcceptancePolicy,
    sink: &mut S,
) -> Result<(), MatchError> {
    // Skip tables are computed on a copy whose `$` edges are folded into
    // accepting flags; state ids survive the copy, so the tables index
    // the caller's states directly.
    let skip_ta = if policy.dollar_accepts() { remap_dollar(ta) } else { ta.clone() };
    let sunday = SundaySkipValue::new(&skip_ta)?;
    let beta = KmpSkipValue::new(&skip_ta, sunday.min_length());
    debug!(m = sunday.min_length(), ?policy, "precomputation finished");

    if ta.has_epsilon() {
        run_zone(word, ta, policy, &sunday, &beta, sink)?;
    } else {
        run_interval(word, ta, policy, &sunday, &beta, sink)?;
    }
    Ok(())
}

/// Fold `$` edges into accepting flags: a state that can reach
/// acceptance by reading the end marker is itself a match end for the
/// skip-table analyses.
fn remap_dollar(ta: &TimedAutomaton) -> TimedAutomaton {
    let mut out = ta.clone();
    for s in out.states.iter_mut() {
        if s.next.remove(&DOLLAR).is_some() {
            s.accepting = true;
        }
    }
    out
}

#[inline]
fn is_valid(upper: Bound, lower: Bound) -> bool {
    upper + lower >= Bound::ZERO
}

// ---------------------------------------------------------------------
// Interval path (no epsilon transitions)
// ---------------------------------------------------------------------

#[derive(Clone, Debug)]
struct IntervalConfig {
    state: StateId,
    /// Per-clock reset time; `None` means "reset at the unknown begin".
    reset_times: Vec<Option<f64>>,
    /// Upper bound on the begin time (the `(1,0)` answer cell).
    upper: Bound,
    /// Negated lower bound on the begin time (the `(0,1)` answer cell).
    lower: Bound,
}

/// Solve the six-cell begin/end/delta triangle for one accepting edge.
/// Each guard atom tightens one cell and the tightening is propagated to
/// the two cells completing its triangle inequality.
fn solve_accept(
    config: &IntervalConfig,
    guard: &[Constraint],
    mut end_upper: Bound,
    mut end_lower: Bound,
) -> Option<Zone> {
    let mut begin_upper = config.upper;
    let mut begin_lower = config.lower;
    // (2,1) <= (2,0) + (0,1) and (1,2) <= (1,0) + (0,2)
    let mut delta_upper = end_upper + begin_lower;
    let mut delta_lower = (end_lower + begin_upper).min(Bound::ZERO);

    for g in guard {
        let c = f64::from(g.c);
        match config.reset_times[g.x] {
            Some(rt) => match g.op {
                Op::Lt | Op::Le => {
                    end_upper =
                        end_upper.min(Bound { value: c + rt, non_strict: g.op == Op::Le });
                    // (2,1) <= (2,0) + (0,1)
                    delta_upper = delta_upper.min(end_upper + begin_lower);
                    // (1,0) <= (1,2) + (2,0)
                    begin_upper = begin_upper.min(delta_lower + end_upper);
                }
                Op::Gt | Op::Ge => {
                    end_lower =
                        end_lower.min(Bound { value: -c - rt, non_strict: g.op == Op::Ge });
                    // (1,2) <= (1,0) + (0,2)
                    delta_lower = delta_lower.min(begin_upper + end_lower);
                    // (0,1) <= (0,2) + (2,1)
                    begin_lower = begin_lower.min(end_lower + delta_upper);
                }
            },
            None => match g.op {
                Op::Lt | Op::Le => {
                    delta_upper =
                        delta_upper.min(Bound { value: c, non_strict: g.op == Op::Le });
                    // (2,0) <= (2,1) + (1,0)
                    end_upper = end_upper.min(delta_upper + begin_upper);
                    // (0,1) <= (0,2) + (2,1)
                    begin_lower = begin_lower.min(end_lower + delta_upper);
                }
                Op::Gt | Op::Ge => {
                    delta_lower =
                        delta_lower.min(Bound { value: -c, non_strict: g.op == Op::Ge });
                    // (1,0) <= (1,2) + (2,0)
                    begin_upper = begin_upper.min(delta_lower + end_upper);
                    // (0,2) <= (0,1) + (1,2)
                    end_lower = end_lower.min(begin_lower + delta_lower);
                }
            },
        }
    }

    if !is_valid(begin_upper, begin_lower)
        || !is_valid(end_upper, end_lower)
        || !is_valid(delta_upper, delta_lower)
    {
        return None;
    }
    let mut z = Zone::zero(3);
    z.set(0, 1, begin_lower);
    z.set(1, 0, begin_upper);
    z.set(0, 2, end_lower);
    z.set(2, 0, end_upper);
    z.set(1, 2, delta_lower);
    z.set(2, 1, delta_upper);
    Some(z)
}

fn run_interval<W: WordSource, S: AnswerSink>(
    word: &mut W,
    ta: &TimedAutomaton,
    policy: AcceptancePolicy,
    sunday: &SundaySkipValue,
    beta: &KmpSkipValue,
    sink: &mut S,
) -> Result<(), WordError> {
    let m = sunday.min_length();
    let clock_count = ta.clock_count();
    sink.clear();
    let mut configs: Vec<IntervalConfig> = Vec::new();
    let mut last: Vec<IntervalConfig> = Vec::new();
    let mut i = 0usize;

    'outer: while word.fetch(i + m - 1)? {
        // Sunday shift: slide until the window's last symbol can close a
        // minimal match.
        if m > 1 {
            while !sunday.end_chars().contains(&word.get(i + m - 1).0) {
                if !word.fetch(i + m)? {
                    break 'outer;
                }
                i += sunday.shift(word.get(i + m).0);
                word.set_front(i - 1);
                if !word.fetch(i + m - 1)? {
                    break 'outer;
                }
            }
        }

        if !word.fetch(i)? {
            break;
        }
        let begin_upper = Bound::lt(word.get(i).1);
        let begin_lower =
            if i == 0 { Bound::ZERO } else { Bound::le(-word.get(i - 1).1) };
        configs.clear();
        configs.extend(ta.initial.iter().map(|&s| IntervalConfig {
            state: s,
            reset_times: vec![None; clock_count],
            upper: begin_upper,
            lower: begin_lower,
        }));

        let mut j = i;
        while !configs.is_empty() && word.fetch(j)? {
            let (c, t) = word.get(j);
            let end_upper = Bound::le(t);
            let end_lower =
                if j > 0 { Bound::lt(-word.get(j - 1).1) } else { Bound::ZERO };

            // Accepting tries against the current configurations.
            for config in &configs {
                let state = &ta.states[config.state.0];
                if policy.event_accepts() {
                    if let Some(edges) = state.next.get(&c) {
                        for e in edges {
                            if !ta.states[e.target.0].accepting {
                                continue;
                            }
                            if let Some(z) = solve_accept(config, &e.guard, end_upper, end_lower)
                            {
                                sink.push(z);
                            }
                        }
                    }
                }
                if policy.dollar_accepts() {
                    if let Some(edges) = state.next.get(&DOLLAR) {
                        for e in edges {
                            if !ta.states[e.target.0].accepting {
                                continue;
                            }
                            if let Some(z) = solve_accept(config, &e.guard, end_upper, end_lower)
                            {
                                sink.push(z);
                            }
                        }
                    }
                }
            }

            // Advancing transitions.
            last = std::mem::take(&mut configs);
            for config in &last {
                let Some(edges) = ta.states[config.state.0].next.get(&c) else {
                    continue;
                };
                'edges: for e in edges {
                    let mut upper = config.upper;
                    let mut lower = config.lower;
                    for g in &e.guard {
                        match config.reset_times[g.x] {
                            Some(rt) => {
                                if !g.satisfies(t - rt) {
                                    continue 'edges;
                                }
                            }
                            None => {
                                let cv = f64::from(g.c);
                                match g.op {
                                    Op::Lt | Op::Le => {
                                        lower = lower.min(Bound {
                                            value: cv - t,
                                            non_strict: g.op == Op::Le,
                                        });
                                    }
                                    Op::Gt | Op::Ge => {
                                        upper = upper.min(Bound {
                                            value: t - cv,
                                            non_strict: g.op == Op::Ge,
                                        });
                                    }
                                }
                            }
                        }
                    }
                    if !is_valid(upper, lower) {
                        continue;
                    }
                    let mut reset_times = config.reset_times.clone();
                    for &x in &e.resets {
                        reset_times[x] = Some(t);
                    }

                    if policy.accepts_on_entering() && ta.states[e.target.0].accepting {
                        // A match ending exactly at this event.
                        let end_upper = Bound::le(t);
                        let end_lower = Bound::le(-t);
                        let delta_upper = end_upper + lower;
                        let delta_lower = (end_lower + upper).min(Bound::ZERO);
                        if is_valid(upper, lower) && is_valid(delta_upper, delta_lower) {
                            let mut z = Zone::zero(3);
                            z.set(0, 1, lower);
                            z.set(1, 0, upper);
                            z.set(0, 2, end_lower);
                            z.set(2, 0, end_upper);
                            z.set(1, 2, delta_lower);
                            z.set(2, 1, delta_upper);
                            sink.push(z);
                        }
                    }

                    configs.push(IntervalConfig {
                        state: e.target,
                        reset_times,
                        upper,
                        lower,
                    });
                }
            }
            j += 1;
        }

        if !word.fetch(j)? {
            // Stream exhausted: the end marker may still close a match,
            // with an unbounded end time.
            if policy.dollar_accepts() {
                let end_upper = Bound { value: f64::INFINITY, non_strict: true };
                let end_lower =
                    if j > 0 { Bound::lt(-word.get(j - 1).1) } else { Bound::ZERO };
                for config in &configs {
                    if let Some(edges) = ta.states[config.state.0].next.get(&DOLLAR) {
                        for e in edges {
                            if !ta.states[e.target.0].accepting {
                                continue;
                            }
                            if let Some(z) = solve_accept(config, &e.guard, end_upper, end_lower)
                            {
                                sink.push(z);
                            }
                        }
                    }
                }
            }
            last = std::mem::take(&mut configs);
        }

        let mut greatest = 1usize;
        for config in &last {
            greatest = greatest.max(beta.skip(config.state));
        }
        i += greatest;
        word.set_front(i - 1);
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Zone path (epsilon transitions present)
// ---------------------------------------------------------------------

#[derive(Clone, Debug)]
struct ZoneConfig {
    state: StateId,
    reset_times: Vec<ResetAt>,
    zone: IntermediateZone,
}

fn run_zone<W: WordSource, S: AnswerSink>(
    word: &mut W,
    ta: &TimedAutomaton,
    policy: AcceptancePolicy,
    sunday: &SundaySkipValue,
    beta: &KmpSkipValue,
    sink: &mut S,
) -> Result<(), WordError> {
    let m = sunday.min_length();
    let clock_count = ta.clock_count();
    // Slots 0 and 1, the newest timepoint, one per clock, one spare.
    let slots = clock_count + 4;
    sink.clear();
    let mut configs: Vec<ZoneConfig> = Vec::new();
    let mut last: Vec<ZoneConfig> = Vec::new();
    let mut i = 0usize;

    'outer: while word.fetch(i + m - 1)? {
        if m > 1 {
            while !sunday.end_chars().contains(&word.get(i + m - 1).0) {
                if !word.fetch(i + m)? {
                    break 'outer;
                }
                i += sunday.shift(word.get(i + m).0);
                word.set_front(i - 1);
                if !word.fetch(i + m - 1)? {
                    break 'outer;
                }
            }
        }

        if !word.fetch(i)? {
            break;
        }
        let begin = Interval::new(
            if i == 0 { Bound::le(0.0) } else { Bound::le(word.get(i - 1).1) },
            Bound::lt(word.get(i).1),
        );
        configs.clear();
        configs.extend(ta.initial.iter().map(|&s| ZoneConfig {
            state: s,
            reset_times: vec![ResetAt::Slot(1); clock_count],
            zone: IntermediateZone::from_interval(&begin, slots),
        }));

        let mut j = i;
        while !configs.is_empty() && word.fetch(j)? {
            let (c, t) = word.get(j);
            // The next timepoint lies in (t_{j-1}, t_j].
            let alloc_upper = Bound::le(t);
            let alloc_lower =
                if j > 0 { Bound::lt(-word.get(j - 1).1) } else { Bound::ZERO };

            // Close the configuration set under epsilon transitions; each
            // unobservable move happens at a fresh timepoint in the same
            // inter-event gap.
            let mut wave: Vec<ZoneConfig> = configs
                .iter()
                .filter(|cf| ta.states[cf.state.0].next.contains_key(&EPSILON))
                .cloned()
                .collect();
            while !wave.is_empty() {
                let prev = std::mem::take(&mut wave);
                for cf in &prev {
                    let Some(edges) = ta.states[cf.state.0].next.get(&EPSILON) else {
                        continue;
                    };
                    for e in edges {
                        let mut z = cf.zone.clone();
                        let new_clock = z.alloc(alloc_upper, alloc_lower);
                        z.tighten_guard(&e.guard, &cf.reset_times);
                        if z.is_satisfiable_canonized() {
                            let mut rt = cf.reset_times.clone();
                            for &x in &e.resets {
                                rt[x] = ResetAt::Slot(new_clock);
                            }
                            z.update(&rt);
                            wave.push(ZoneConfig { state: e.target, reset_times: rt, zone: z });
                        }
                    }
                }
                configs.extend(wave.iter().cloned());
            }

            // Accepting tries.
            for cf in &configs {
                let state = &ta.states[cf.state.0];
                if policy.event_accepts() {
                    if let Some(edges) = state.next.get(&c) {
                        for e in edges {
                            if !ta.states[e.target.0].accepting {
                                continue;
                            }
                            let mut z = cf.zone.clone();
                            z.alloc(alloc_upper, alloc_lower);
                            z.tighten_guard(&e.guard, &cf.reset_times);
                            if z.is_satisfiable_canonized() {
                                sink.push(z.to_answer());
                            }
                        }
                    }
                }
                if policy.dollar_accepts() {
                    if let Some(edges) = state.next.get(&DOLLAR) {
                        for e in edges {
                            if !ta.states[e.target.0].accepting {
                                continue;
                            }
                            let mut z = cf.zone.clone();
                            z.alloc(alloc_upper, alloc_lower);
                            z.tighten_guard(&e.guard, &cf.reset_times);
                            if z.is_satisfiable_canonized() {
                                sink.push(z.to_answer());
                            }
                        }
                    }
                }
            }

            // Advancing transitions.
            last = std::mem::take(&mut configs);
            for cf in &last {
                let Some(edges) = ta.states[cf.state.0].next.get(&c) else {
                    continue;
                };
                for e in edges {
                    let mut z = cf.zone.clone();
                    z.tighten_guard_at(&e.guard, &cf.reset_times, t);
                    if z.is_satisfiable_canonized() {
                        let mut rt = cf.reset_times.clone();
                        for &x in &e.resets {
                            rt[x] = ResetAt::Time(t);
                        }
                        z.update(&rt);
                        if policy.accepts_on_entering() && ta.states[e.target.0].accepting {
                            let mut az = z.clone();
                            az.alloc(Bound::le(t), Bound::le(-t));
                            if az.is_satisfiable_canonized() {
                                sink.push(az.to_answer());
                            }
                        }
                        configs.push(ZoneConfig { state: e.target, reset_times: rt, zone: z });
                    }
                }
            }
            j += 1;
        }

        if !word.fetch(j)? {
            if policy.dollar_accepts() {
                let end_upper = Bound { value: f64::INFINITY, non_strict: true };
                let end_lower =
                    if j > 0 { Bound::lt(-word.get(j - 1).1) } else { Bound::ZERO };
                for cf in &configs {
                    if let Some(edges) = ta.states[cf.state.0].next.get(&DOLLAR) {
                        for e in edges {
                            if !ta.states[e.target.0].accepting {
                                continue;
                            }
                            let mut z = cf.zone.clone();
                            z.alloc(end_upper, end_lower);
                            z.tighten_guard(&e.guard, &cf.reset_times);
                            if z.is_satisfiable_canonized() {
                                sink.push(z.to_answer());
                            }
                        }
                    }
                }
            }
            last = std::mem::take(&mut configs);
        }

        let mut greatest = 1usize;
        for cf in &last {
            greatest = greatest.max(beta.skip(cf.state));
        }
        i += greatest;
        word.set_front(i - 1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{AnswerCount, AnswerVec};
    use crate::word::VecWord;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

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

    fn run(ta: &TimedAutomaton, events: Vec<(u8, f64)>, policy: AcceptancePolicy) -> AnswerVec {
        let mut word = VecWord::new(events);
        let mut sink = AnswerVec::default();
        match_word(&mut word, ta, policy, &mut sink).unwrap();
        sink
    }

    #[test]
    fn two_symbol_concatenation_zone() {
        let ans = run(&two_step(), vec![(b'a', 1.0), (b'b', 1.5)], AcceptancePolicy::Event);
        assert_eq!(ans.len(), 1);
        let z = &ans.zones[0];
        // begin ∈ [0, 1), end ∈ (1, 1.5], delta ∈ (0, 1.5]
        assert_eq!(z.get(0, 1), Bound::ZERO);
        assert_eq!(z.get(1, 0), Bound::lt(1.0));
        assert_eq!(z.get(0, 2), Bound::lt(-1.0));
        assert_eq!(z.get(2, 0), Bound::le(1.5));
        assert_eq!(z.get(1, 2), Bound::lt(0.0));
        assert_eq!(z.get(2, 1), Bound::le(1.5));
    }

    #[test]
    fn accepting_guard_caps_the_end_window() {
        // The closing event is moved forward onto the end time, so a
        // late `b` narrows the end window instead of reading at its own
        // timestamp: end ∈ (1, 2) from the guard, not (1, 2.5].
        let ans = run(&two_step(), vec![(b'a', 1.0), (b'b', 2.5)], AcceptancePolicy::Event);
        assert_eq!(ans.len(), 1);
        let z = &ans.zones[0];
        assert_eq!(z.get(2, 0), Bound::lt(2.0));
        assert_eq!(z.get(0, 2), Bound::lt(-1.0));
    }

    #[test]
    fn exhausted_end_window_yields_no_answer() {
        // A noise self-loop lets the attempt survive past events; once
        // the previous event passes the guard's reach, the end window
        // (t_{j-1}, reset + 1) is empty and nothing is emitted.
        let mut ta = two_step();
        ta.add_transition(StateId(1), b'c', StateId(1), vec![], vec![]);

        let ans = run(&ta, vec![(b'a', 1.0), (b'c', 2.2), (b'b', 2.5)], AcceptancePolicy::Event);
        assert_eq!(ans.len(), 0);

        let ans = run(&ta, vec![(b'a', 1.0), (b'c', 1.2), (b'b', 2.5)], AcceptancePolicy::Event);
        assert_eq!(ans.len(), 1);
        assert_eq!(ans.zones[0].get(0, 2), Bound::lt(-1.2));
        assert_eq!(ans.zones[0].get(2, 0), Bound::lt(2.0));
    }

    #[test]
    fn stream_shorter_than_minimum_length_yields_nothing() {
        let ans = run(&two_step(), vec![(b'a', 1.0)], AcceptancePolicy::Event);
        assert_eq!(ans.len(), 0);
    }

    #[test]
    fn overlapping_matches_are_all_found() {
        // Pattern `aa` without guards: positions 0, 1, 2 of `aaaa`.
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s1, vec![], vec![]);
        ta.add_transition(s1, b'a', s2, vec![], vec![]);

        let stream = vec![(b'a', 1.0), (b'a', 2.0), (b'a', 3.0), (b'a', 4.0)];
        let ans = run(&ta, stream, AcceptancePolicy::Event);
        assert_eq!(ans.len(), 3);
    }

    #[test]
    fn single_event_pattern_matches_once() {
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s1, vec![], vec![Constraint::lt(0, 1)]);
        ta.max_constants = vec![1];

        let ans = run(&ta, vec![(b'a', 0.5)], AcceptancePolicy::Event);
        assert_eq!(ans.len(), 1);
        let z = &ans.zones[0];
        assert_eq!(z.get(1, 0), Bound::lt(0.5));
        assert_eq!(z.get(2, 0), Bound::le(0.5));
        assert_eq!(z.get(0, 2), Bound::ZERO);
    }

    #[test]
    fn dollar_mode_accepts_at_stream_end_with_open_upper_bound() {
        // s0 --a--> s1 --$--> s2 (accepting)
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s1, vec![], vec![]);
        ta.add_transition(s1, DOLLAR, s2, vec![], vec![]);

        let ans = run(&ta, vec![(b'a', 1.0)], AcceptancePolicy::Dollar);
        assert_eq!(ans.len(), 1);
        let z = &ans.zones[0];
        assert!(z.get(2, 0).value.is_infinite());
        assert_eq!(z.get(0, 2), Bound::lt(-1.0));
        assert_eq!(z.get(1, 0), Bound::lt(1.0));
    }

    #[test]
    fn dollar_mode_inserts_the_marker_between_events() {
        // Pattern: a $; stream a b. The marker fits between a and b.
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s1, vec![], vec![]);
        ta.add_transition(s1, DOLLAR, s2, vec![], vec![]);

        let ans = run(&ta, vec![(b'a', 1.0), (b'b', 3.0)], AcceptancePolicy::Dollar);
        assert_eq!(ans.len(), 1);
        let z = &ans.zones[0];
        // End lies in (1, 3]: the marker fires before `b` is consumed.
        assert_eq!(z.get(2, 0), Bound::le(3.0));
        assert_eq!(z.get(0, 2), Bound::lt(-1.0));
    }

    #[test]
    fn either_mode_emits_point_end_matches() {
        let ans = run(&two_step(), vec![(b'a', 1.0), (b'b', 1.5)], AcceptancePolicy::Either);
        assert_eq!(ans.len(), 1);
        let z = &ans.zones[0];
        // End pinned at the accepting event.
        assert_eq!(z.get(2, 0), Bound::le(1.5));
        assert_eq!(z.get(0, 2), Bound::le(-1.5));
    }

    #[test]
    fn epsilon_pattern_runs_through_the_zone_path() {
        // s0 --epsilon--> s1 --a, x0 < 1--> s2 (accepting)
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, EPSILON, s1, vec![], vec![]);
        ta.add_transition(s1, b'a', s2, vec![], vec![Constraint::lt(0, 1)]);
        ta.max_constants = vec![1];
        assert!(ta.has_epsilon());

        let ans = run(&ta, vec![(b'a', 0.5)], AcceptancePolicy::Event);
        assert_eq!(ans.len(), 1);
        let z = &ans.zones[0];
        assert_eq!(z.get(2, 0), Bound::le(0.5));
        assert!(z.clone().is_satisfiable());
    }

    #[test]
    fn epsilon_reset_constrains_the_following_event() {
        // s0 --epsilon, reset x0--> s1 --a, x0 >= 1--> s2 (accepting):
        // some epsilon time at least 1 before the event must exist.
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, EPSILON, s1, vec![0], vec![]);
        ta.add_transition(s1, b'a', s2, vec![], vec![Constraint::ge(0, 1)]);
        ta.max_constants = vec![1];

        // The epsilon move can only happen in (t_{j-1}, t_j] of the
        // event it precedes, so the guard is unsatisfiable here.
        let ans = run(&ta, vec![(b'a', 0.5)], AcceptancePolicy::Event);
        assert_eq!(ans.len(), 0);
    }

    #[test]
    fn matches_agree_with_sunday_disabled() {
        let ta = two_step();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut t = 0.0f64;
            let n = rng.gen_range(0..12);
            let stream: Vec<(u8, f64)> = (0..n)
                .map(|_| {
                    t += rng.gen_range(0.1..1.4);
                    (if rng.gen_bool(0.5) { b'a' } else { b'b' }, t)
                })
                .collect();

            let skip_ta = ta.clone();
            let sunday = SundaySkipValue::new(&skip_ta).unwrap();
            let beta = KmpSkipValue::new(&skip_ta, sunday.min_length());
            let mut with_tables = AnswerVec::default();
            run_interval(
                &mut VecWord::new(stream.clone()),
                &ta,
                AcceptancePolicy::Event,
                &sunday,
                &beta,
                &mut with_tables,
            )
            .unwrap();

            let no_sunday = SundaySkipValue::disabled(sunday.min_length());
            let no_beta = KmpSkipValue::disabled(ta.state_count());
            let mut without_tables = AnswerVec::default();
            run_interval(
                &mut VecWord::new(stream.clone()),
                &ta,
                AcceptancePolicy::Event,
                &no_sunday,
                &no_beta,
                &mut without_tables,
            )
            .unwrap();

            assert_eq!(with_tables.zones, without_tables.zones, "stream {stream:?}");
        }
    }

    #[test]
    fn match_count_agrees_with_brute_force() {
        // s0 -a, reset x0-> s1 -b, x0 < 1-> s2 -c-> s3 (accepting): the
        // timed guard sits on an advancing edge, where it is checked at
        // the event's own timestamp.
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(false);
        let s3 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s1, vec![0], vec![]);
        ta.add_transition(s1, b'b', s2, vec![], vec![Constraint::lt(0, 1)]);
        ta.add_transition(s2, b'c', s3, vec![], vec![]);
        ta.max_constants = vec![1];

        let symbols = [b'a', b'b', b'c'];
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let mut t = 0.0f64;
            let n = rng.gen_range(3..16);
            let stream: Vec<(u8, f64)> = (0..n)
                .map(|_| {
                    t += rng.gen_range(0.1..1.4);
                    (symbols[rng.gen_range(0..3)], t)
                })
                .collect();

            // A window matches iff it reads `a b c` with b within 1 of a.
            let expected = stream
                .windows(3)
                .filter(|w| {
                    w[0].0 == b'a'
                        && w[1].0 == b'b'
                        && w[2].0 == b'c'
                        && w[1].1 - w[0].1 < 1.0
                })
                .count();

            let mut word = VecWord::new(stream.clone());
            let mut sink = AnswerCount::default();
            match_word(&mut word, &ta, AcceptancePolicy::Event, &mut sink).unwrap();
            assert_eq!(sink.len(), expected, "stream {stream:?}");
        }
    }

    /// Word source wrapper that records the released front; reads below
    /// it panic inside the wrapped [`VecWord`].
    struct Instrumented {
        inner: VecWord,
        front: usize,
    }

    impl WordSource for Instrumented {
        fn fetch(&mut self, n: usize) -> Result<bool, WordError> {
            self.inner.fetch(n)
        }
        fn get(&self, n: usize) -> (u8, f64) {
            self.inner.get(n)
        }
        fn set_front(&mut self, n: usize) {
            assert!(n >= self.front, "set_front must be monotone");
            self.front = n;
            self.inner.set_front(n);
        }
        fn len(&self) -> Option<usize> {
            self.inner.len()
        }
    }

    #[test]
    fn prefix_is_released_while_scanning() {
        // Pattern `abc` over a stream of scattered `c`s: the Sunday
        // shift hands long prefixes back to the source.
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        let s1 = ta.add_state(false);
        let s2 = ta.add_state(false);
        let s3 = ta.add_state(true);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s1, vec![], vec![]);
        ta.add_transition(s1, b'b', s2, vec![], vec![]);
        ta.add_transition(s2, b'c', s3, vec![], vec![]);

        let n = 2000usize;
        let stream: Vec<(u8, f64)> = (0..n)
            .map(|k| (if k % 97 == 0 { b'c' } else { b'x' }, k as f64 * 0.5))
            .collect();
        let mut word = Instrumented { inner: VecWord::new(stream), front: 0 };
        let mut sink = AnswerCount::default();
        match_word(&mut word, &ta, AcceptancePolicy::Event, &mut sink).unwrap();
        assert_eq!(sink.len(), 0);
        // The window front followed the scan to the end of the stream.
        assert!(word.front >= n - 5);
    }

    #[test]
    fn pattern_without_accepting_runs_is_reported() {
        let mut ta = TimedAutomaton::default();
        let s0 = ta.add_state(false);
        ta.initial = vec![s0];
        ta.add_transition(s0, b'a', s0, vec![], vec![]);

        let mut word = VecWord::new(vec![(b'a', 1.0)]);
        let mut sink = AnswerCount::default();
        let err = match_word(&mut word, &ta, AcceptancePolicy::Event, &mut sink);
        assert!(matches!(err, Err(MatchError::PatternEmpty(_))));
    }
}
