//! Sunday-style skip table
//!
//! From the zone abstraction of the pattern, a layered breadth-first
//! traversal collects, at layer `i`, the symbols labelling any
//! epsilon-closed one-step edge. The first layer containing an accepting
//! state gives `m`, the minimum length of an accepted word. The shift for
//! a symbol never seen is `m + 1`; otherwise `m` minus its deepest layer.
//! The symbols of layer `m − 1` are the *end chars*: the only symbols
//! that can close a minimal match.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::automaton::{Alphabet, TimedAutomaton, EPSILON};
use crate::ta2za::ta2za;
use crate::zone_automaton::{ZaId, ZoneAutomaton};

/// The pattern accepts no timed word: nothing can ever match.
#[derive(Debug, Error)]
#[error("empty pattern: the automaton accepts no timed word")]
pub struct PatternEmpty;

/// Per-symbol Sunday shift amounts, the minimum match length and the
/// end-char set. Depends only on the pattern, never on the stream.
#[derive(Clone, Debug)]
pub struct SundaySkipValue {
    m: usize,
    delta: [usize; 256],
    end_chars: BTreeSet<Alphabet>,
}

impl SundaySkipValue {
    /// Precompute the table for a pattern automaton.
    pub fn new(ta: &TimedAutomaton) -> Result<Self, PatternEmpty> {
        let mut za = ZoneAutomaton::default();
        ta2za(ta, &mut za, None);
        za.remove_dead_states();

        let mut char_sets: Vec<BTreeSet<Alphabet>> = Vec::new();
        let mut accepted = false;
        let mut m = 0usize;
        let mut current: Vec<ZaId> = za.initial.clone();
        while !accepted {
            if current.is_empty() {
                return Err(PatternEmpty);
            }
            m += 1;
            char_sets.push(BTreeSet::new());
            let mut next_layer: Vec<ZaId> = Vec::new();
            for &zstate in &current {
                let mut closure = BTreeSet::from([zstate]);
                za.epsilon_closure(&mut closure);
                for &state in &closure {
                    for (&c, targets) in &za.states[state.0].next {
                        if c == EPSILON {
                            continue;
                        }
                        for &t in targets {
                            accepted = accepted || za.states[t.0].accepting;
                            next_layer.push(t);
                            char_sets[m - 1].insert(c);
                        }
                    }
                }
            }
            next_layer.sort_unstable();
            next_layer.dedup();
            current = next_layer;
        }

        let mut delta = [m + 1; 256];
        for (i, set) in char_sets.iter().enumerate() {
            for &c in set {
                delta[c as usize] = m - i;
            }
        }
        let end_chars = char_sets[m - 1].clone();
        debug!(m, za_states = za.alive_count(), "sunday skip table ready");
        Ok(SundaySkipValue { m, delta, end_chars })
    }

    /// A degenerate table that never skips: every shift is 1 and every
    /// symbol counts as an end char. For differential tests only.
    #[cfg(test)]
    pub(crate) fn disabled(m: usize) -> Self {
        SundaySkipValue { m, delta: [1; 256], end_chars: (0..=255u8).collect() }
    }

    /// Shift amount for a stream symbol; in `[1, m + 1]`.
    pub fn shift(&self, c: Alphabet) -> usize {
        self.delta[c as usize]
    }

    /// Minimum length of a word accepted by the pattern.
    pub fn min_length(&self) -> usize {
        self.m
    }

    /// Symbols that may appear as the last event of a minimal match.
    pub fn end_chars(&self) -> &BTreeSet<Alphabet> {
        &self.end_chars
    }
}
