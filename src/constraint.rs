//! Atomic clock constraints
//!
//! A guard on a transition is a conjunction of atomic constraints of the
//! form `x ⋈ c` with `⋈ ∈ {<, <=, >=, >}` and an integer constant `c`.
//! Guards are stored as plain vectors; an empty vector is the trivially
//! true guard.

use std::fmt;

/// Index of a clock variable of a pattern automaton, `0`-based.
pub type ClockIndex = usize;

/// Comparison operator of an atomic constraint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `>`
    Gt,
}

/// An atomic constraint `x ⋈ c` on one clock variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    /// The constrained clock.
    pub x: ClockIndex,
    /// The comparison operator.
    pub op: Op,
    /// The integer constant compared against.
    pub c: i32,
}

impl Constraint {
    /// `x < c`
    pub fn lt(x: ClockIndex, c: i32) -> Self {
        Constraint { x, op: Op::Lt, c }
    }
    /// `x <= c`
    pub fn le(x: ClockIndex, c: i32) -> Self {
        Constraint { x, op: Op::Le, c }
    }
    /// `x >= c`
    pub fn ge(x: ClockIndex, c: i32) -> Self {
        Constraint { x, op: Op::Ge, c }
    }
    /// `x > c`
    pub fn gt(x: ClockIndex, c: i32) -> Self {
        Constraint { x, op: Op::Gt, c }
    }

    /// Check whether a concrete clock value satisfies the constraint.
    pub fn satisfies(&self, d: f64) -> bool {
        let c = f64::from(self.c);
        match self.op {
            Op::Lt => d < c,
            Op::Le => d <= c,
            Op::Ge => d >= c,
            Op::Gt => d > c,
        }
    }

    /// True for `>` / `>=`, i.e. a lower bound on the clock.
    pub fn is_lower_bound(&self) -> bool {
        matches!(self.op, Op::Ge | Op::Gt)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::Gt => ">",
        };
        write!(f, "x{} {} {}", self.x, op, self.c)
    }
}

/// Remove every lower-bound atom (`x > c`, `x >= c`) from a guard.
pub fn widen(guard: &mut Vec<Constraint>) {
    guard.retain(|g| !g.is_lower_bound());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_follows_the_operator() {
        assert!(Constraint::lt(0, 1).satisfies(0.5));
        assert!(!Constraint::lt(0, 1).satisfies(1.0));
        assert!(Constraint::le(0, 1).satisfies(1.0));
        assert!(Constraint::ge(0, 2).satisfies(2.0));
        assert!(!Constraint::gt(0, 2).satisfies(2.0));
    }

    #[test]
    fn widen_drops_lower_bounds_only() {
        let mut guard = vec![
            Constraint::lt(0, 3),
            Constraint::ge(0, 1),
            Constraint::le(1, 5),
            Constraint::gt(1, 2),
        ];
        widen(&mut guard);
        assert_eq!(guard, vec![Constraint::lt(0, 3), Constraint::le(1, 5)]);
    }
}
