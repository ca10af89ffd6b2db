//! Timed regular expressions
//!
//! The expression tree is a plain sum type; `a|b` over single symbols is
//! folded into one multi-symbol atom at construction. The textual syntax
//! accepted by [`parse`]:
//!
//! ```text
//! expr     := conj ('|' conj)*
//! conj     := seq ('&' seq)*
//! seq      := postfix+                      (juxtaposition = concat)
//! postfix  := primary ('+' | '*' | '%' ival)*
//! primary  := alnum | '@' | '(' expr ')'
//! ival     := ('(' | '[') int ',' int (')' | ']')
//! ```
//!
//! `@` is the empty word and `e*` desugars to `@ | e+`. Interval
//! brackets choose per-end strictness, so `%(1,2]` means `1 < x ≤ 2`.
//!
//! [`Tre::to_event_ta`] compiles to a pattern automaton for event
//! matching: concatenation bridges accepting states into the right
//! factor's initial states (resetting its clocks), plus loops accepting
//! entries back to the initial states resetting every clock, and `%`
//! constrains the accepting entries by a fresh clock. Stuck states are
//! pruned and terminal accepting states merged after every step.

use thiserror::Error;

use crate::automaton::{Alphabet, StateId, TimedAutomaton, Transition};
use crate::constraint::Constraint;
use crate::intersection::intersection;
use crate::interval::Interval;

/// A timed regular expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Tre {
    /// One event whose symbol is any of the listed alternatives.
    Atom(Vec<Alphabet>),
    /// The empty word.
    Epsilon,
    /// One or more repetitions.
    Plus(Box<Tre>),
    /// Left then right.
    Concat(Box<Tre>, Box<Tre>),
    /// Left or right.
    Disjunction(Box<Tre>, Box<Tre>),
    /// Both left and right.
    Conjunction(Box<Tre>, Box<Tre>),
    /// The expression, with total duration inside the interval.
    Within(Box<Tre>, Interval),
}

impl Tre {
    /// A single-symbol atom.
    pub fn atom(c: Alphabet) -> Tre {
        Tre::Atom(vec![c])
    }

    /// Disjunction, folding atom|atom into one atom.
    pub fn disjunction(a: Tre, b: Tre) -> Tre {
        match (a, b) {
            (Tre::Atom(mut x), Tre::Atom(y)) => {
                x.extend(y);
                x.sort_unstable();
                x.dedup();
                Tre::Atom(x)
            }
            (a, b) => Tre::Disjunction(Box::new(a), Box::new(b)),
        }
    }

    /// Concatenation.
    pub fn concat(a: Tre, b: Tre) -> Tre {
        Tre::Concat(Box::new(a), Box::new(b))
    }

    /// Conjunction.
    pub fn conjunction(a: Tre, b: Tre) -> Tre {
        Tre::Conjunction(Box::new(a), Box::new(b))
    }

    /// One or more repetitions.
    pub fn plus(e: Tre) -> Tre {
        Tre::Plus(Box::new(e))
    }

    /// Zero or more repetitions.
    pub fn star(e: Tre) -> Tre {
        Tre::disjunction(Tre::Epsilon, Tre::plus(e))
    }

    /// Duration restriction.
    pub fn within(e: Tre, ival: Interval) -> Tre {
        Tre::Within(Box::new(e), ival)
    }

    /// Compile to an event pattern automaton. Every state of the result
    /// is reachable and can reach an accepting state.
    pub fn to_event_ta(&self) -> TimedAutomaton {
        let mut out = match self {
            Tre::Atom(chars) => {
                let mut out = TimedAutomaton::default();
                let s0 = out.add_state(false);
                let s1 = out.add_state(true);
                out.initial = vec![s0];
                for &c in chars {
                    out.add_transition(s0, c, s1, vec![], vec![]);
                }
                out
            }
            Tre::Epsilon => {
                let mut out = TimedAutomaton::default();
                let s0 = out.add_state(true);
                out.initial = vec![s0];
                out
            }
            Tre::Plus(inner) => {
                let mut out = inner.to_event_ta();
                add_plus_loops(&mut out);
                out
            }
            Tre::Concat(a, b) => {
                let mut out = a.to_event_ta();
                concat_onto(&mut out, b.to_event_ta());
                out
            }
            Tre::Disjunction(a, b) => {
                let mut out = a.to_event_ta();
                let other = b.to_event_ta();
                let other_initial = other.initial.clone();
                let other_max = other.max_constants.clone();
                let offset = append_states(&mut out, other);
                out.initial
                    .extend(other_initial.iter().map(|&s| StateId(s.0 + offset)));
                merge_max_constants(&mut out.max_constants, &other_max);
                out
            }
            Tre::Conjunction(a, b) => {
                intersection(&a.to_event_ta(), &b.to_event_ta()).0
            }
            Tre::Within(inner, ival) => {
                let mut out = inner.to_event_ta();
                add_within_guards(&mut out, ival);
                out
            }
        };
        merge_terminal_accepting(&mut out);
        reduce_states(&mut out);
        out
    }
}

/// Append another automaton's states, retargeting its transitions;
/// returns the id offset. Clock indices are shared, not shifted.
fn append_states(out: &mut TimedAutomaton, other: TimedAutomaton) -> usize {
    let offset = out.states.len();
    for mut s in other.states {
        for edges in s.next.values_mut() {
            for e in edges {
                e.target = StateId(e.target.0 + offset);
            }
        }
        out.states.push(s);
    }
    offset
}

fn merge_max_constants(left: &mut Vec<i32>, right: &[i32]) {
    if left.len() < right.len() {
        left.resize(right.len(), 0);
    }
    for (l, &r) in left.iter_mut().zip(right.iter()) {
        *l = (*l).max(r);
    }
}

/// Loop every accepting entry back to the initial states, resetting all
/// clocks so each round starts fresh.
fn add_plus_loops(out: &mut TimedAutomaton) {
    let clocks: Vec<usize> = (0..out.clock_count()).collect();
    let initial = out.initial.clone();
    for si in 0..out.states.len() {
        let symbols: Vec<Alphabet> = out.states[si].next.keys().copied().collect();
        for sym in symbols {
            let mut loops = Vec::new();
            for e in &out.states[si].next[&sym] {
                if out.states[e.target.0].accepting {
                    for &init in &initial {
                        let mut resets = e.resets.clone();
                        resets.extend(clocks.iter().copied());
                        loops.push(Transition {
                            target: init,
                            resets,
                            guard: e.guard.clone(),
                        });
                    }
                }
            }
            out.states[si].next.get_mut(&sym).unwrap().extend(loops);
        }
    }
}

/// Splice `right` after `left`: accepting entries of `left` also jump to
/// `right`'s initial states with `right`'s clocks reset.
fn concat_onto(left: &mut TimedAutomaton, right: TimedAutomaton) {
    let right_clocks: Vec<usize> = (0..right.clock_count()).collect();
    let right_initial = right.initial.clone();
    let right_max = right.max_constants.clone();
    let offset = left.states.len();

    for si in 0..left.states.len() {
        let symbols: Vec<Alphabet> = left.states[si].next.keys().copied().collect();
        for sym in symbols {
            let mut bridges = Vec::new();
            for e in &left.states[si].next[&sym] {
                if left.states[e.target.0].accepting {
                    for &init in &right_initial {
                        bridges.push(Transition {
                            target: StateId(init.0 + offset),
                            resets: right_clocks.clone(),
                            guard: e.guard.clone(),
                        });
                    }
                }
            }
            left.states[si].next.get_mut(&sym).unwrap().extend(bridges);
        }
    }

    // The right factor can also start the whole expression when the left
    // one accepts the empty word.
    if left.initial.iter().any(|&s| left.states[s.0].accepting) {
        let extra: Vec<StateId> =
            right_initial.iter().map(|&s| StateId(s.0 + offset)).collect();
        left.initial.extend(extra);
    }

    for s in left.states.iter_mut() {
        s.accepting = false;
    }
    append_states(left, right);
    merge_max_constants(&mut left.max_constants, &right_max);
}

fn within_guard(clock: usize, ival: &Interval) -> Vec<Constraint> {
    let mut guard = Vec::new();
    if ival.upper.value.is_finite() {
        let c = ival.upper.value as i32;
        guard.push(if ival.upper.non_strict {
            Constraint::le(clock, c)
        } else {
            Constraint::lt(clock, c)
        });
    }
    let c = ival.lower.value as i32;
    guard.push(if ival.lower.non_strict {
        Constraint::ge(clock, c)
    } else {
        Constraint::gt(clock, c)
    });
    guard
}

/// Constrain the total duration by a fresh clock: accepting entries get
/// the interval bounds as extra guard atoms. Entries into an accepting
/// state that has outgoing transitions are duplicated into a fresh
/// terminal state instead, since the original state must stay usable
/// mid-expression.
fn add_within_guards(out: &mut TimedAutomaton, ival: &Interval) {
    let new_clock = out.clock_count();
    let plain_states = out.states.len();
    let terminal = out.add_state(true);
    let mut terminal_used = false;

    for si in 0..plain_states {
        let symbols: Vec<Alphabet> = out.states[si].next.keys().copied().collect();
        for sym in symbols {
            let edge_count = out.states[si].next[&sym].len();
            let mut detours = Vec::new();
            for ei in 0..edge_count {
                let target = out.states[si].next[&sym][ei].target;
                if target.0 >= plain_states || !out.states[target.0].accepting {
                    continue;
                }
                if out.states[target.0].next.is_empty() {
                    let atoms = within_guard(new_clock, ival);
                    out.states[si].next.get_mut(&sym).unwrap()[ei]
                        .guard
                        .extend(atoms);
                } else {
                    terminal_used = true;
                    let e = out.states[si].next[&sym][ei].clone();
                    let mut guard = e.guard;
                    guard.extend(within_guard(new_clock, ival));
                    detours.push(Transition { target: terminal, resets: e.resets, guard });
                }
            }
            out.states[si].next.get_mut(&sym).unwrap().extend(detours);
        }
    }

    for si in 0..plain_states {
        if !out.states[si].next.is_empty() {
            out.states[si].accepting = false;
        }
    }
    if !terminal_used {
        out.states.pop();
    }
    let max_c = if ival.upper.value.is_finite() {
        ival.upper.value as i32
    } else {
        ival.lower.value as i32
    };
    out.max_constants.push(max_c);
}

/// Remove states by mask, remapping every id.
fn remove_states(ta: &mut TimedAutomaton, dead: &[bool]) {
    let mut remap = vec![usize::MAX; ta.states.len()];
    let mut kept = 0usize;
    for (i, &d) in dead.iter().enumerate() {
        if !d {
            remap[i] = kept;
            kept += 1;
        }
    }
    let states = std::mem::take(&mut ta.states);
    for (i, mut s) in states.into_iter().enumerate() {
        if dead[i] {
            continue;
        }
        for edges in s.next.values_mut() {
            edges.retain(|e| !dead[e.target.0]);
            for e in edges.iter_mut() {
                e.target = StateId(remap[e.target.0]);
            }
        }
        s.next.retain(|_, edges| !edges.is_empty());
        ta.states.push(s);
    }
    ta.initial.retain(|s| !dead[s.0]);
    for s in ta.initial.iter_mut() {
        *s = StateId(remap[s.0]);
    }
}

/// Drop non-accepting states without outgoing transitions, repeatedly
/// (removing their incoming edges can strand further states).
fn reduce_states(ta: &mut TimedAutomaton) {
    loop {
        let dead: Vec<bool> = ta
            .states
            .iter()
            .map(|s| !s.accepting && s.next.is_empty())
            .collect();
        if !dead.iter().any(|&d| d) {
            return;
        }
        remove_states(ta, &dead);
    }
}

/// Collapse accepting states without outgoing transitions into one.
fn merge_terminal_accepting(ta: &mut TimedAutomaton) {
    let terminals: Vec<usize> = ta
        .states
        .iter()
        .enumerate()
        .filter(|(_, s)| s.accepting && s.next.is_empty())
        .map(|(i, _)| i)
        .collect();
    if terminals.len() <= 1 {
        return;
    }
    let keep = terminals[0];
    let doomed: Vec<usize> = terminals[1..].to_vec();
    for s in ta.states.iter_mut() {
        for edges in s.next.values_mut() {
            for e in edges.iter_mut() {
                if doomed.contains(&e.target.0) {
                    e.target = StateId(keep);
                }
            }
        }
    }
    if ta.initial.iter().any(|s| doomed.contains(&s.0))
        && !ta.initial.contains(&StateId(keep))
    {
        ta.initial.push(StateId(keep));
    }
    let mut dead = vec![false; ta.states.len()];
    for d in doomed {
        dead[d] = true;
    }
    remove_states(ta, &dead);
}

// ---------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------

/// A malformed textual expression.
#[derive(Debug, Error)]
#[error("TRE parse error at byte {pos}: {msg}")]
pub struct TreParseError {
    /// Byte offset of the failure.
    pub pos: usize,
    /// What was expected.
    pub msg: String,
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, c: u8) -> Result<(), TreParseError> {
        match self.bump() {
            Some(got) if got == c => Ok(()),
            _ => Err(self.error(format!("expected `{}`", c as char))),
        }
    }

    fn error(&self, msg: String) -> TreParseError {
        TreParseError { pos: self.pos.min(self.input.len()), msg }
    }

    fn parse_alt(&mut self) -> Result<Tre, TreParseError> {
        let mut e = self.parse_conj()?;
        while self.peek() == Some(b'|') {
            self.bump();
            e = Tre::disjunction(e, self.parse_conj()?);
        }
        Ok(e)
    }

    fn parse_conj(&mut self) -> Result<Tre, TreParseError> {
        let mut e = self.parse_seq()?;
        while self.peek() == Some(b'&') {
            self.bump();
            e = Tre::conjunction(e, self.parse_seq()?);
        }
        Ok(e)
    }

    fn parse_seq(&mut self) -> Result<Tre, TreParseError> {
        let mut e = self.parse_postfix()?;
        while let Some(c) = self.peek() {
            if c == b'|' || c == b'&' || c == b')' {
                break;
            }
            e = Tre::concat(e, self.parse_postfix()?);
        }
        Ok(e)
    }

    fn parse_postfix(&mut self) -> Result<Tre, TreParseError> {
        let mut e = self.parse_primary()?;
        while let Some(c) = self.peek() {
            match c {
                b'+' => {
                    self.bump();
                    e = Tre::plus(e);
                }
                b'*' => {
                    self.bump();
                    e = Tre::star(e);
                }
                b'%' => {
                    self.bump();
                    let ival = self.parse_interval()?;
                    e = Tre::within(e, ival);
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> Result<Tre, TreParseError> {
        match self.bump() {
            Some(b'(') => {
                let e = self.parse_alt()?;
                self.expect(b')')?;
                Ok(e)
            }
            Some(b'@') => Ok(Tre::Epsilon),
            Some(c) if c.is_ascii_alphanumeric() => Ok(Tre::atom(c)),
            Some(c) => Err(self.error(format!("unexpected `{}`", c as char))),
            None => Err(self.error("unexpected end of expression".into())),
        }
    }

    fn parse_int(&mut self) -> Result<i32, TreParseError> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an integer".into()));
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .unwrap()
            .parse()
            .map_err(|e| self.error(format!("bad integer: {e}")))
    }

    fn parse_interval(&mut self) -> Result<Interval, TreParseError> {
        let lower_closed = match self.bump() {
            Some(b'(') => false,
            Some(b'[') => true,
            _ => return Err(self.error("expected `(` or `[`".into())),
        };
        let lo = self.parse_int()?;
        self.expect(b',')?;
        let hi = self.parse_int()?;
        let upper_closed = match self.bump() {
            Some(b')') => false,
            Some(b']') => true,
            _ => return Err(self.error("expected `)` or `]`".into())),
        };
        let lower = crate::zone::Bound { value: f64::from(lo), non_strict: lower_closed };
        let upper = crate::zone::Bound { value: f64::from(hi), non_strict: upper_closed };
        Ok(Interval::new(lower, upper))
    }
}

/// Parse the textual syntax.
pub fn parse(input: &str) -> Result<Tre, TreParseError> {
    let mut p = Parser { input: input.as_bytes(), pos: 0 };
    if p.peek().is_none() {
        return Err(p.error("empty expression".into()));
    }
    let e = p.parse_alt()?;
    if p.peek().is_some() {
        return Err(p.error("trailing input".into()));
    }
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{AnswerSink, AnswerVec};
    use crate::matcher::{match_word, AcceptancePolicy};
    use crate::word::VecWord;
    use crate::zone::Bound;

    #[test]
    fn atoms_fold_under_disjunction() {
        assert_eq!(parse("a|b").unwrap(), Tre::Atom(vec![b'a', b'b']));
        assert!(matches!(parse("ab|c").unwrap(), Tre::Disjunction(_, _)));
    }

    #[test]
    fn interval_brackets_set_strictness() {
        let e = parse("a%(1,2]").unwrap();
        let Tre::Within(_, ival) = e else { panic!("expected within") };
        assert_eq!(ival.lower, Bound::lt(1.0));
        assert_eq!(ival.upper, Bound::le(2.0));
    }

    #[test]
    fn parse_errors_carry_positions() {
        assert!(parse("").is_err());
        assert!(parse("a%").is_err());
        assert!(parse("(ab").is_err());
        assert!(parse("a)b").is_err());
        let err = parse("a%(x,2)").unwrap_err();
        assert!(err.pos > 0);
    }

    #[test]
    fn concatenation_compiles_to_a_chain() {
        let ta = parse("ab").unwrap().to_event_ta();
        assert!(ta.accepts(&[(b'a', 0.3), (b'b', 0.9)]));
        assert!(!ta.accepts(&[(b'a', 0.3)]));
        assert!(!ta.accepts(&[(b'b', 0.3), (b'a', 0.9)]));
        // a's dead accepting state is pruned: start, middle, end.
        assert_eq!(ta.state_count(), 3);
    }

    #[test]
    fn within_adds_the_duration_guard() {
        let ta = parse("(ab)%[1,2]").unwrap().to_event_ta();
        assert_eq!(ta.clock_count(), 1);
        assert!(ta.accepts(&[(b'a', 0.3), (b'b', 1.5)]));
        assert!(!ta.accepts(&[(b'a', 0.3), (b'b', 0.5)]));
        assert!(!ta.accepts(&[(b'a', 0.3), (b'b', 2.5)]));
    }

    #[test]
    fn star_accepts_zero_repetitions() {
        let ta = parse("a*b").unwrap().to_event_ta();
        assert!(ta.accepts(&[(b'b', 1.0)]));
        assert!(ta.accepts(&[(b'a', 0.5), (b'a', 0.7), (b'b', 1.0)]));
        assert!(!ta.accepts(&[(b'a', 0.5)]));
    }

    #[test]
    fn conjunction_needs_both_durations() {
        // a within (0,1) and within [2,3) is unsatisfiable.
        let ta = parse("a%(0,1)&a%[2,3)").unwrap().to_event_ta();
        assert!(!ta.accepts(&[(b'a', 0.5)]));
        assert!(!ta.accepts(&[(b'a', 2.5)]));
        let ta = parse("a%(0,2)&a%[1,3)").unwrap().to_event_ta();
        assert!(ta.accepts(&[(b'a', 1.5)]));
        assert!(!ta.accepts(&[(b'a', 0.5)]));
        assert!(!ta.accepts(&[(b'a', 2.5)]));
    }

    #[test]
    fn timed_kleene_plus_matches_chained_repetitions() {
        let tre = parse("(a%[1,2])+").unwrap();
        let ta = tre.to_event_ta();
        let mut word = VecWord::new(vec![(b'a', 1.0), (b'a', 2.5)]);
        let mut sink = AnswerVec::default();
        match_word(&mut word, &ta, AcceptancePolicy::Event, &mut sink).unwrap();
        // One single-a match per event plus the two-a chain.
        assert_eq!(sink.len(), 3);
        for z in &sink.zones {
            assert!(z.clone().is_satisfiable());
        }
    }
}
