//! Intermediate zones
//!
//! The matcher's zone path carries one DBM per configuration, with a
//! dynamic set of *slots*: variable 0 is the reference, slot 1 is the
//! begin time of the match attempt, and one further slot is allocated for
//! each event (or epsilon move) the attempt observes. Slots whose
//! timepoint is no longer referenced by any clock's reset time are freed
//! and reused, so a preallocated matrix of `clocks + 4` slots never
//! overflows: slots 0 and 1, the newest timepoint, at most one slot per
//! clock, and one spare for the allocate-then-release window. Exhausting
//! the preallocation is a caller bug and panics.
//!
//! [`IntermediateZone::alloc`] takes its two bounds in DBM form: `upper`
//! is stored into `(new, 0)` and `lower` into `(0, new)` (i.e. the lower
//! bound already negated).

use crate::constraint::{Constraint, Op};
use crate::interval::Interval;
use crate::zone::{Bound, Zone};

/// Slot index of the begin timepoint.
const INITIAL_SLOT: usize = 1;

/// When a clock was last reset: at a concrete stream timestamp, or at the
/// symbolic timepoint held in a DBM slot.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ResetAt {
    /// Reset at this absolute stream time.
    Time(f64),
    /// Reset at the symbolic time of this DBM slot.
    Slot(usize),
}

/// A zone with dynamically allocated timepoint slots.
#[derive(Clone, Debug)]
pub struct IntermediateZone {
    zone: Zone,
    allocated: Vec<bool>,
    newest: usize,
}

impl IntermediateZone {
    /// Start an attempt whose begin time lies in `interval`, with room
    /// for `slots` timepoints in total.
    pub fn from_interval(interval: &Interval, slots: usize) -> Self {
        debug_assert!(slots >= 2);
        let mut iz = IntermediateZone {
            zone: Zone::zero(slots),
            allocated: vec![false; slots],
            newest: INITIAL_SLOT,
        };
        for x in 2..slots {
            iz.deallocate(x);
        }
        iz.allocated[0] = true;
        iz.allocated[INITIAL_SLOT] = true;
        iz.zone.set(INITIAL_SLOT, 0, interval.upper);
        iz.zone.set(
            0,
            INITIAL_SLOT,
            Bound { value: -interval.lower.value, non_strict: interval.lower.non_strict },
        );
        iz
    }

    /// Wrap an existing zone; `current_newest == 0` means every slot is
    /// live and the last one is newest, otherwise slots above
    /// `current_newest` are freed.
    pub fn from_zone(zone: Zone, current_newest: usize) -> Self {
        let dim = zone.dim();
        let mut iz = IntermediateZone { zone, allocated: vec![false; dim], newest: dim - 1 };
        if current_newest != 0 {
            iz.newest = current_newest;
            for x in current_newest + 1..dim {
                iz.deallocate(x);
            }
        }
        iz.allocated[0] = true;
        iz.allocated[INITIAL_SLOT] = true;
        iz.allocated[iz.newest] = true;
        iz
    }

    /// The underlying DBM.
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// The newest slot index.
    pub fn newest(&self) -> usize {
        self.newest
    }

    /// Allocate a slot for a new timepoint, constrained by `upper` into
    /// `(new, 0)` and `lower` into `(0, new)`, and ordered at or after
    /// the previous newest timepoint. Returns the slot index.
    ///
    /// Panics when every slot is live; the matcher preallocates enough.
    pub fn alloc(&mut self, upper: Bound, lower: Bound) -> usize {
        let new = self
            .allocated
            .iter()
            .position(|&a| !a)
            .expect("clock slot allocation exceeded the preallocated DBM");
        self.allocated[new] = true;
        self.zone.set(new, 0, upper);
        self.zone.set(0, new, lower);
        self.zone.set(new, self.newest, Bound::INFINITY);
        self.zone.set(self.newest, new, Bound::ZERO);
        // Re-close the fresh row/column; no full canonize needed.
        self.zone.close1(0);
        self.zone.close1(new);
        self.newest = new;
        new
    }

    /// Free every slot not referenced by `reset_times` (slots 0, 1 and
    /// the newest stay live).
    pub fn update(&mut self, reset_times: &[ResetAt]) {
        for a in self.allocated.iter_mut() {
            *a = false;
        }
        self.allocated[0] = true;
        self.allocated[INITIAL_SLOT] = true;
        self.allocated[self.newest] = true;
        for rt in reset_times {
            if let ResetAt::Slot(s) = rt {
                self.allocated[*s] = true;
            }
        }
        for x in 1..self.zone.dim() {
            if !self.allocated[x] {
                self.deallocate(x);
            }
        }
    }

    fn deallocate(&mut self, x: usize) {
        for i in 0..self.zone.dim() {
            self.zone.set(i, x, Bound::INFINITY);
            self.zone.set(x, i, Bound::INFINITY);
        }
        self.zone.set(x, x, Bound::ZERO);
        self.allocated[x] = false;
    }

    /// Add `x_a − x_b ≤ b`, re-closing only when the bound actually
    /// landed (and the matrix is bigger than the trivial begin-only
    /// case).
    fn tighten_cell(&mut self, a: usize, b_idx: usize, b: Bound) {
        let cur = self.zone.get(a, b_idx);
        if b < cur {
            self.zone.set(a, b_idx, b);
        }
        if self.zone.get(a, b_idx) == b && self.newest != INITIAL_SLOT {
            self.zone.close1(a);
            self.zone.close1(b_idx);
        }
    }

    /// Apply one guard atom to the newest timepoint, with the clock's
    /// reset at the symbolic slot `reset`.
    fn tighten_symbolic(&mut self, g: &Constraint, reset: usize) {
        let c = f64::from(g.c);
        let newest = self.newest;
        match g.op {
            Op::Lt => self.tighten_cell(newest, reset, Bound::lt(c)),
            Op::Le => self.tighten_cell(newest, reset, Bound::le(c)),
            Op::Gt => self.tighten_cell(reset, newest, Bound::lt(-c)),
            Op::Ge => self.tighten_cell(reset, newest, Bound::le(-c)),
        }
    }

    /// Apply one guard atom to the newest timepoint, with the clock's
    /// reset at the concrete stream time `t`.
    fn tighten_concrete(&mut self, g: &Constraint, t: f64) {
        let c = f64::from(g.c);
        let newest = self.newest;
        match g.op {
            Op::Lt => self.tighten_cell(newest, 0, Bound::lt(c + t)),
            Op::Le => self.tighten_cell(newest, 0, Bound::le(c + t)),
            Op::Gt => self.tighten_cell(0, newest, Bound::lt(-c - t)),
            Op::Ge => self.tighten_cell(0, newest, Bound::le(-c - t)),
        }
    }

    /// Apply a whole guard to the newest timepoint using the reset-time
    /// vector.
    pub fn tighten_guard(&mut self, guard: &[Constraint], reset_times: &[ResetAt]) {
        for g in guard {
            match reset_times[g.x] {
                ResetAt::Time(t) => self.tighten_concrete(g, t),
                ResetAt::Slot(s) => self.tighten_symbolic(g, s),
            }
        }
    }

    /// Apply a guard for a transition fired at the concrete time `t`.
    /// Concretely reset clocks are checked outright; symbolically reset
    /// clocks constrain their slot against `t`.
    pub fn tighten_guard_at(&mut self, guard: &[Constraint], reset_times: &[ResetAt], t: f64) {
        for g in guard {
            let c = f64::from(g.c);
            match reset_times[g.x] {
                ResetAt::Time(rt) => {
                    if !g.satisfies(t - rt) {
                        self.zone.make_unsat();
                    }
                }
                ResetAt::Slot(s) => match g.op {
                    Op::Lt => self.tighten_cell(0, s, Bound::lt(c - t)),
                    Op::Le => self.tighten_cell(0, s, Bound::le(c - t)),
                    Op::Gt => self.tighten_cell(s, 0, Bound::lt(t - c)),
                    Op::Ge => self.tighten_cell(s, 0, Bound::le(t - c)),
                },
            }
        }
    }

    /// Non-emptiness assuming the matrix is closed (tightenings re-close
    /// locally).
    pub fn is_satisfiable_canonized(&self) -> bool {
        self.zone.is_satisfiable_canonized()
    }

    /// Full closure; only needed by tests poking cells directly.
    pub fn canonize(&mut self) {
        self.zone.canonize();
    }

    /// Project to the canonical 3-variable answer zone: variable 1 is the
    /// begin time, variable 2 the end time (the newest slot).
    pub fn to_answer(&self) -> Zone {
        let mut ans = Zone::zero(3);
        let n = self.newest;
        ans.set(0, 1, self.zone.get(0, 1));
        ans.set(1, 0, self.zone.get(1, 0));
        ans.set(0, 2, self.zone.get(0, n));
        ans.set(2, 0, self.zone.get(n, 0));
        ans.set(1, 2, self.zone.get(1, n));
        ans.set(2, 1, self.zone.get(n, 1));
        ans
    }
}
