//! Online timed pattern matching
//!
//! This crate matches a *timed pattern* — a timed automaton, or a timed
//! regular expression compiled to one — against a *timed word*: a stream
//! of `(symbol, timestamp)` events with non-decreasing timestamps. Every
//! match is reported not as a single witness but as an *answer zone*:
//! the full set of begin/end time pairs (and their difference) for which
//! the stream restricted to that segment matches the pattern.
//!
//! ## Invariants
//!
//! - **Symbolic answers.** Emitted zones are 3-variable difference bound
//!   matrices over (begin, end, delta), describing every matching
//!   placement at once under the active acceptance policy.
//! - **Online operation.** The matcher reads the stream through the
//!   windowed [`word::WordSource`] interface and hands consumed prefixes
//!   back with `set_front`, so unbounded streams run in bounded memory;
//!   skip tables depend only on the pattern, never on the stream.
//! - **Amortised-linear scanning.** A Sunday-style table shifts the
//!   window start over stretches that cannot end a minimal match, and a
//!   KMP-style per-state table advances it after a failed attempt.
//! - **Failure discipline.** A configuration whose zone empties is
//!   silently dropped; an exhausted stream is a normal termination; a
//!   malformed stream record aborts the run with a diagnostic; misuse of
//!   preallocation contracts panics.
//!
//! The reserved symbol `0` labels epsilon transitions and `$` the
//! pattern-end marker of the dollar acceptance policy.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Answer sinks: vector, counting and printing receivers.
pub mod answer;
/// The pattern automaton arena.
pub mod automaton;
/// Atomic clock constraints and guard helpers.
pub mod constraint;
/// DOT-subset parser for pattern automata.
pub mod dot;
/// Intermediate zones with dynamic timepoint slots.
pub mod intermediate_zone;
/// Product (intersection) constructions.
pub mod intersection;
/// Interval algebra with the Kleene-plus closure.
pub mod interval;
/// KMP-style per-state skip table.
pub mod kmp_skip;
/// The streaming matcher.
pub mod matcher;
/// Sunday-style per-symbol skip table.
pub mod sunday;
/// Pattern-automaton to zone-automaton conversion.
pub mod ta2za;
/// Timed regular expressions and their compiler.
pub mod tre;
/// Timed-word sources (in-memory and lazily read).
pub mod word;
/// Bounds and difference bound matrices.
pub mod zone;
/// Zone automata.
pub mod zone_automaton;

pub use crate::answer::{AnswerCount, AnswerPrinter, AnswerSink, AnswerVec};
pub use crate::automaton::{Alphabet, StateId, TimedAutomaton, DOLLAR, EPSILON};
pub use crate::matcher::{match_word, AcceptancePolicy, MatchError};
pub use crate::sunday::PatternEmpty;
pub use crate::word::{LazyWord, VecWord, WordError, WordFormat, WordSource};
pub use crate::zone::{Bound, Zone};
