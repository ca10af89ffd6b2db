//! DOT-subset pattern parser
//!
//! Reads pattern automata from the graphviz conventions used by the
//! timed-word tooling: nodes carry `init=0/1` and `match=0/1`, edges
//! carry `label="a"`, `guard="{x0 < 1, x1 >= 2}"` and `reset="{0, 1}"`.
//!
//! ```text
//! digraph G {
//!   1 [init=1, match=0]
//!   2 [match=1]
//!   1 -> 2 [label="a", guard="{x0 < 1}", reset="{0}"]
//! }
//! ```
//!
//! One statement per line; `//` and `#` start comments. A `label` of
//! `"0"` or the empty string denotes an epsilon edge.

use std::collections::HashMap;

use thiserror::Error;

use crate::automaton::{Alphabet, StateId, TimedAutomaton, EPSILON};
use crate::constraint::{ClockIndex, Constraint, Op};

/// A malformed pattern file.
#[derive(Debug, Error)]
#[error("DOT parse error at line {line}: {msg}")]
pub struct DotParseError {
    /// One-based source line.
    pub line: usize,
    /// What went wrong.
    pub msg: String,
}

fn err(line: usize, msg: impl Into<String>) -> DotParseError {
    DotParseError { line, msg: msg.into() }
}

/// Split an attribute list on top-level commas, respecting quotes.
fn split_attrs(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth_quote = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '"' => depth_quote = !depth_quote,
            ',' if !depth_quote => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect()
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

fn parse_attr(part: &str, line: usize) -> Result<(&str, &str), DotParseError> {
    let (k, v) = part
        .split_once('=')
        .ok_or_else(|| err(line, format!("attribute `{part}` is not key=value")))?;
    Ok((k.trim(), unquote(v.trim())))
}

fn parse_guard(text: &str, line: usize) -> Result<Vec<Constraint>, DotParseError> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| err(line, format!("guard `{text}` is not brace-enclosed")))?;
    let mut guard = Vec::new();
    for atom in inner.split(',') {
        let atom = atom.trim();
        if atom.is_empty() {
            continue;
        }
        let rest = atom
            .strip_prefix('x')
            .ok_or_else(|| err(line, format!("guard atom `{atom}` must start with `x`")))?;
        let op_pos = rest
            .find(|c| c == '<' || c == '>')
            .ok_or_else(|| err(line, format!("guard atom `{atom}` has no comparison")))?;
        let x: ClockIndex = rest[..op_pos]
            .trim()
            .parse()
            .map_err(|_| err(line, format!("bad clock index in `{atom}`")))?;
        let rest = rest[op_pos..].trim_start();
        let (op, rest) = if let Some(r) = rest.strip_prefix("<=") {
            (Op::Le, r)
        } else if let Some(r) = rest.strip_prefix(">=") {
            (Op::Ge, r)
        } else if let Some(r) = rest.strip_prefix('<') {
            (Op::Lt, r)
        } else if let Some(r) = rest.strip_prefix('>') {
            (Op::Gt, r)
        } else {
            return Err(err(line, format!("bad comparison in `{atom}`")));
        };
        let c: i32 = rest
            .trim()
            .parse()
            .map_err(|_| err(line, format!("bad constant in `{atom}`")))?;
        guard.push(Constraint { x, op, c });
    }
    Ok(guard)
}

fn parse_resets(text: &str, line: usize) -> Result<Vec<ClockIndex>, DotParseError> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| err(line, format!("reset `{text}` is not brace-enclosed")))?;
    let mut resets = Vec::new();
    for tok in inner.split(',') {
        let tok = tok.trim();
        if tok.is_empty() {
            continue;
        }
        let x: ClockIndex = tok
            .strip_prefix('x')
            .unwrap_or(tok)
            .parse()
            .map_err(|_| err(line, format!("bad clock index `{tok}`")))?;
        resets.push(x);
    }
    Ok(resets)
}

fn parse_label(text: &str, line: usize) -> Result<Alphabet, DotParseError> {
    if text.is_empty() || text == "0" {
        return Ok(EPSILON);
    }
    if text.len() == 1 && text.is_ascii() {
        return Ok(text.as_bytes()[0]);
    }
    Err(err(line, format!("label `{text}` must be one ASCII character")))
}

/// Parse a pattern automaton from DOT text.
pub fn parse_dot(input: &str) -> Result<TimedAutomaton, DotParseError> {
    let mut ta = TimedAutomaton::default();
    let mut ids: HashMap<String, StateId> = HashMap::new();
    let mut max_clock: Option<ClockIndex> = None;
    let mut seen_any_state = false;

    let mut state_of = |ta: &mut TimedAutomaton, name: &str| -> StateId {
        *ids.entry(name.to_string()).or_insert_with(|| ta.add_state(false))
    };

    for (lineno, raw) in input.lines().enumerate() {
        let line = lineno + 1;
        let mut text = raw.trim();
        if let Some(i) = text.find("//") {
            text = text[..i].trim();
        }
        if let Some(i) = text.find('#') {
            text = text[..i].trim();
        }
        if text.is_empty()
            || text == "{"
            || text == "}"
            || text.starts_with("digraph")
            || text.starts_with("graph")
        {
            continue;
        }

        let (head, attrs) = match text.find('[') {
            Some(i) => {
                let close = text
                    .rfind(']')
                    .ok_or_else(|| err(line, "unterminated attribute list"))?;
                (text[..i].trim(), &text[i + 1..close])
            }
            None => (text, ""),
        };
        let head = head.trim_end_matches(';').trim();

        if let Some((from, to)) = head.split_once("->") {
            let source = state_of(&mut ta, from.trim());
            let target = state_of(&mut ta, to.trim());
            let mut symbol: Option<Alphabet> = None;
            let mut guard = Vec::new();
            let mut resets = Vec::new();
            for part in split_attrs(attrs) {
                let (k, v) = parse_attr(part, line)?;
                match k {
                    "label" => symbol = Some(parse_label(v, line)?),
                    "guard" => guard = parse_guard(v, line)?,
                    "reset" => resets = parse_resets(v, line)?,
                    _ => {}
                }
            }
            let symbol =
                symbol.ok_or_else(|| err(line, "edge without a label attribute"))?;
            for g in &guard {
                max_clock = Some(max_clock.map_or(g.x, |m| m.max(g.x)));
            }
            for &x in &resets {
                max_clock = Some(max_clock.map_or(x, |m| m.max(x)));
            }
            ta.add_transition(source, symbol, target, resets, guard);
        } else {
            let s = state_of(&mut ta, head);
            seen_any_state = true;
            for part in split_attrs(attrs) {
                let (k, v) = parse_attr(part, line)?;
                let on = v == "1" || v.eq_ignore_ascii_case("true");
                match k {
                    "init" => {
                        if on && !ta.initial.contains(&s) {
                            ta.initial.push(s);
                        }
                    }
                    "match" => ta.states[s.0].accepting = on,
                    _ => {}
                }
            }
        }
    }

    if !seen_any_state {
        return Err(err(input.lines().count().max(1), "no states declared"));
    }
    let clocks = max_clock.map_or(0, |m| m + 1);
    ta.refresh_max_constants(clocks);
    Ok(ta)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        digraph G {
          1 [init=1, match=0]
          2 [match=0]
          3 [match=1]
          1 -> 2 [label="a", reset="{0}"]
          2 -> 3 [label="b", guard="{x0 < 1}"]
        }
    "#;

    #[test]
    fn sample_pattern_round_trips_through_membership() {
        let ta = parse_dot(SAMPLE).unwrap();
        assert_eq!(ta.state_count(), 3);
        assert_eq!(ta.initial.len(), 1);
        assert_eq!(ta.clock_count(), 1);
        assert_eq!(ta.max_constants, vec![1]);
        assert!(ta.accepts(&[(b'a', 1.0), (b'b', 1.5)]));
        assert!(!ta.accepts(&[(b'a', 1.0), (b'b', 2.5)]));
    }

    #[test]
    fn guards_with_every_comparison_parse() {
        let g = parse_guard("{x0 < 1, x1 <= 2, x2 >= 3, x3 > 4}", 1).unwrap();
        assert_eq!(
            g,
            vec![
                Constraint::lt(0, 1),
                Constraint::le(1, 2),
                Constraint::ge(2, 3),
                Constraint::gt(3, 4),
            ]
        );
    }

    #[test]
    fn epsilon_and_dollar_labels() {
        let text = r#"
            digraph G {
              1 [init=1]
              2 [match=1]
              1 -> 1 [label="0"]
              1 -> 2 [label="$"]
            }
        "#;
        let ta = parse_dot(text).unwrap();
        assert!(ta.has_epsilon());
        assert!(ta.states[0].next.contains_key(&b'$'));
    }

    #[test]
    fn malformed_lines_are_rejected_with_positions() {
        assert!(parse_dot("digraph G {\n 1 -> 2 [label=\"a\"\n}").is_err());
        let e = parse_dot("digraph G {\n1 [init=1, match=1]\n1 -> 1 [guard=\"{x0<1}\", label=\"a\"]\n}")
            .unwrap();
        assert_eq!(e.max_constants, vec![1]);
        let bad = parse_dot("digraph G {\n1 [init=1]\n1 -> 1 [label=\"a\", guard=\"{y0 < 1}\"]\n}");
        assert!(bad.is_err());
        assert_eq!(bad.unwrap_err().line, 3);
    }
}
