use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign},
};

use crate::{Fraction, Slab};

/// A point in simulation time: a [`Slab`] plus an exact fraction of it.
///
/// Two times in the same slab compare by exact rational arithmetic; times in
/// different slabs only compare equal when both sit on a shared slab boundary.
/// This keeps orderings stable for histories built from irregular steps, where
/// a floating-point representation could round two distinct times together.
///
/// # Examples
///
/// ```
/// use cadence_core::Slab;
///
/// let slab = Slab::new(0.0, 1.0);
/// let t = slab.start() + slab.duration() / 3;
/// assert_eq!(t - slab.start(), slab.duration() / 3);
/// assert!(t < slab.end());
/// assert_eq!(slab.end(), slab.advance().start());
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    slab: Slab,
    fraction: Fraction,
}

impl Time {
    /// Creates the time at `fraction` of the way through `slab`.
    ///
    /// # Panics
    ///
    /// Panics unless `fraction` lies in `[0, 1]`.
    #[must_use]
    pub fn new(slab: Slab, fraction: Fraction) -> Self {
        assert!(
            Fraction::new(0, 1) <= fraction && fraction <= Fraction::new(1, 1),
            "time fraction {fraction} is outside its slab"
        );
        Self { slab, fraction }
    }

    #[must_use]
    pub fn slab(self) -> Slab {
        self.slab
    }

    #[must_use]
    pub fn fraction(self) -> Fraction {
        self.fraction
    }

    /// The floating-point value of this time.
    ///
    /// Evaluated from the nearer end of the slab, so boundary times are exact
    /// and interior times lose at most one rounding.
    #[must_use]
    pub fn value(self) -> f64 {
        let length = self.slab.end - self.slab.start;
        if self.fraction <= Fraction::new(1, 2) {
            self.slab.start + self.fraction.value() * length
        } else {
            self.slab.end - (Fraction::new(1, 1) - self.fraction).value() * length
        }
    }

    #[must_use]
    pub fn is_at_slab_boundary(self) -> bool {
        self.fraction.is_zero() || self.fraction == Fraction::new(1, 1)
    }

    /// Re-anchors this time onto `slab`.
    ///
    /// A time interior to its slab can only stay in that slab; a boundary time
    /// can move onto any adjacent (or identical) slab sharing that boundary.
    ///
    /// # Panics
    ///
    /// Panics if this time does not lie on a boundary of `slab` and `slab` is
    /// not the time's own slab.
    #[must_use]
    pub fn with_slab(self, slab: Slab) -> Time {
        if slab == self.slab {
            return self;
        }
        assert!(
            self.is_at_slab_boundary(),
            "time {self} is interior to its slab and cannot move to {slab}"
        );
        let value = self.value();
        if value == slab.start {
            Time::new(slab, Fraction::new(0, 1))
        } else if value == slab.end {
            Time::new(slab, Fraction::new(1, 1))
        } else {
            panic!("time {self} is not on a boundary of slab {slab}");
        }
    }

    /// Total ordering over times: exact within a slab, by value across slabs.
    ///
    /// This is what [`StepId`](crate::StepId) comparisons and the steppers'
    /// scheduling predicates sort by; [`PartialOrd`] delegates to it.
    #[must_use]
    pub fn ordering(&self, other: &Time) -> Ordering {
        if self.slab == other.slab {
            self.fraction.cmp(&other.fraction)
        } else if *self == *other {
            Ordering::Equal
        } else {
            self.value().total_cmp(&other.value())
        }
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        if self.slab == other.slab {
            self.fraction == other.fraction
        } else {
            self.is_at_slab_boundary()
                && other.is_at_slab_boundary()
                && self.value() == other.value()
        }
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.ordering(other))
    }
}

impl Add<TimeDelta> for Time {
    type Output = Time;

    /// # Panics
    ///
    /// Panics if the result leaves the delta's slab, or if this time cannot be
    /// re-anchored onto it.
    fn add(self, rhs: TimeDelta) -> Time {
        let anchored = self.with_slab(rhs.slab);
        Time::new(rhs.slab, anchored.fraction + rhs.fraction)
    }
}

impl AddAssign<TimeDelta> for Time {
    fn add_assign(&mut self, rhs: TimeDelta) {
        *self = *self + rhs;
    }
}

impl Sub<TimeDelta> for Time {
    type Output = Time;
    fn sub(self, rhs: TimeDelta) -> Time {
        self + (-rhs)
    }
}

impl SubAssign<TimeDelta> for Time {
    fn sub_assign(&mut self, rhs: TimeDelta) {
        *self = *self - rhs;
    }
}

impl Sub for Time {
    type Output = TimeDelta;

    /// The exact difference `self - rhs`.
    ///
    /// # Panics
    ///
    /// Panics if the two times cannot be expressed in a common slab.
    fn sub(self, rhs: Time) -> TimeDelta {
        let (slab, a, b) = if self.slab == rhs.slab {
            (self.slab, self, rhs)
        } else if rhs.is_at_slab_boundary() {
            (self.slab, self, rhs.with_slab(self.slab))
        } else {
            (rhs.slab, self.with_slab(rhs.slab), rhs)
        };
        TimeDelta::new(slab, a.fraction - b.fraction)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slab, self.fraction)
    }
}

/// A signed, exact step of simulation time, as a fraction of a slab.
///
/// Deltas divide and multiply exactly, so `slab.duration() / 3` taken three
/// times lands exactly on the slab boundary.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeDelta {
    slab: Slab,
    fraction: Fraction,
}

impl TimeDelta {
    #[must_use]
    pub fn new(slab: Slab, fraction: Fraction) -> Self {
        Self { slab, fraction }
    }

    #[must_use]
    pub fn slab(self) -> Slab {
        self.slab
    }

    #[must_use]
    pub fn fraction(self) -> Fraction {
        self.fraction
    }

    /// The floating-point length of this step. Negative for backward steps.
    #[must_use]
    pub fn value(self) -> f64 {
        self.fraction.value() * (self.slab.end - self.slab.start)
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.fraction.is_positive()
    }

    /// The same fraction of a different slab.
    #[must_use]
    pub fn with_slab(self, slab: Slab) -> TimeDelta {
        TimeDelta::new(slab, self.fraction)
    }
}

impl PartialEq for TimeDelta {
    fn eq(&self, other: &Self) -> bool {
        self.slab == other.slab && self.fraction == other.fraction
    }
}

impl Neg for TimeDelta {
    type Output = TimeDelta;
    fn neg(self) -> TimeDelta {
        TimeDelta::new(self.slab, -self.fraction)
    }
}

impl Add for TimeDelta {
    type Output = TimeDelta;

    /// # Panics
    ///
    /// Panics if the deltas belong to different slabs.
    fn add(self, rhs: TimeDelta) -> TimeDelta {
        assert!(
            self.slab == rhs.slab,
            "cannot add deltas from different slabs"
        );
        TimeDelta::new(self.slab, self.fraction + rhs.fraction)
    }
}

impl Sub for TimeDelta {
    type Output = TimeDelta;
    fn sub(self, rhs: TimeDelta) -> TimeDelta {
        self + (-rhs)
    }
}

impl Mul<i64> for TimeDelta {
    type Output = TimeDelta;
    fn mul(self, rhs: i64) -> TimeDelta {
        TimeDelta::new(self.slab, self.fraction * rhs)
    }
}

impl Mul<TimeDelta> for i64 {
    type Output = TimeDelta;
    fn mul(self, rhs: TimeDelta) -> TimeDelta {
        rhs * self
    }
}

impl Div<i64> for TimeDelta {
    type Output = TimeDelta;
    fn div(self, rhs: i64) -> TimeDelta {
        TimeDelta::new(self.slab, self.fraction / rhs)
    }
}

impl fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.fraction, self.slab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slab() -> Slab {
        Slab::new(0.0, 1.0)
    }

    #[test]
    fn exact_step_arithmetic() {
        let third = slab().duration() / 3;
        let t = slab().start() + third + third + third;
        assert_eq!(t, slab().end());
        assert!(t.is_at_slab_boundary());
        assert_eq!(t.value(), 1.0);
    }

    #[test]
    fn equal_times_from_different_denominators() {
        let a = slab().start() + slab().duration() / 2;
        let b = slab().start() + (slab().duration() * 2) / 4;
        assert_eq!(a, b);
    }

    #[test]
    fn boundary_times_equal_across_slabs() {
        assert_eq!(slab().end(), slab().advance().start());
        assert!(slab().end() < slab().advance().end());
        assert!(slab().retreat().start() < slab().start());
    }

    #[test]
    fn value_is_exact_at_boundaries() {
        let slab = Slab::new(0.3, 0.7);
        assert_eq!(slab.start().value(), 0.3);
        assert_eq!(slab.end().value(), 0.7);
        // Interior values evaluate from the nearer end.
        let late = slab.start() + (slab.duration() * 3) / 4;
        assert!((late.value() - 0.6).abs() < 1e-15);
    }

    #[test]
    fn crossing_into_an_adjacent_slab() {
        let prev = slab().retreat();
        let step = (slab().duration() / 4).with_slab(prev);
        // Stepping back from the shared boundary lands inside the previous slab.
        let t = slab().start() - step;
        assert_eq!(t.slab(), prev);
        assert_eq!(t.value(), -0.25);
        assert_eq!(slab().start() - t, step);
    }

    #[test]
    #[should_panic(expected = "outside its slab")]
    fn stepping_past_the_slab_panics() {
        let _ = slab().start() + slab().duration() * 2;
    }

    #[test]
    #[should_panic(expected = "interior to its slab")]
    fn interior_time_cannot_change_slab() {
        let t = slab().start() + slab().duration() / 2;
        let _ = t.with_slab(slab().advance());
    }

    #[test]
    fn delta_ops() {
        let dt = slab().duration() / 6;
        assert_eq!(dt * 3, slab().duration() / 2);
        assert_eq!(3 * dt, dt * 3);
        assert_eq!(dt - dt, slab().duration() * 0);
        assert!((-dt).value() < 0.0);
        assert!(!(-dt).is_positive());
        assert_eq!((slab().duration() * 2) / 9 + slab().duration() / 9, slab().duration() / 3);
    }
}
