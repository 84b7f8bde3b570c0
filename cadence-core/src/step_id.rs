use std::{cmp::Ordering, fmt};

use crate::Time;

/// Identifies one point in the sequence of steps taken by an integration.
///
/// A `StepId` orders first by slab number, then by step time in the direction
/// of integration, then by substep. Two ids at the same physical time but
/// different substeps are therefore distinguishable, ordered by how far
/// through the step's sub-iterations they are. Negative slab numbers are
/// reserved for the external start-up procedure that seeds history before
/// normal integration begins.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepId {
    time_runs_forward: bool,
    slab_number: i64,
    substep: u64,
    step_time: Time,
}

impl StepId {
    /// The id of the step starting at `step_time`, at substep zero.
    #[must_use]
    pub fn new(time_runs_forward: bool, slab_number: i64, step_time: Time) -> Self {
        Self {
            time_runs_forward,
            slab_number,
            substep: 0,
            step_time,
        }
    }

    /// The id of a sub-iteration within the step starting at `step_time`.
    #[must_use]
    pub fn new_substep(
        time_runs_forward: bool,
        slab_number: i64,
        step_time: Time,
        substep: u64,
    ) -> Self {
        Self {
            time_runs_forward,
            slab_number,
            substep,
            step_time,
        }
    }

    #[must_use]
    pub fn time_runs_forward(&self) -> bool {
        self.time_runs_forward
    }

    #[must_use]
    pub fn slab_number(&self) -> i64 {
        self.slab_number
    }

    #[must_use]
    pub fn substep(&self) -> u64 {
        self.substep
    }

    #[must_use]
    pub fn step_time(&self) -> Time {
        self.step_time
    }

    /// Whether this id belongs to the start-up regime that seeds history
    /// before normal integration.
    #[must_use]
    pub fn is_pre_evolution(&self) -> bool {
        self.slab_number < 0
    }

    /// Total order over ids of one integration.
    ///
    /// # Panics
    ///
    /// Panics if the two ids disagree about the direction of time; such ids
    /// belong to different integrations and ordering them is meaningless.
    #[must_use]
    pub fn ordering(&self, other: &StepId) -> Ordering {
        assert!(
            self.time_runs_forward == other.time_runs_forward,
            "cannot order step ids with opposite time directions"
        );
        self.slab_number
            .cmp(&other.slab_number)
            .then_with(|| {
                let by_time = self.step_time.ordering(&other.step_time);
                if self.time_runs_forward {
                    by_time
                } else {
                    by_time.reverse()
                }
            })
            .then_with(|| self.substep.cmp(&other.substep))
    }
}

impl PartialOrd for StepId {
    /// Delegates to [`StepId::ordering`], and panics as it does.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.ordering(other))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}slab {} substep {} at {}",
            if self.time_runs_forward { "" } else { "(backward) " },
            self.slab_number,
            self.substep,
            self.step_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Slab;

    fn slab() -> Slab {
        Slab::new(0.0, 1.0)
    }

    #[test]
    fn ordered_by_slab_number_then_time() {
        let early = StepId::new(true, 0, slab().end());
        let late = StepId::new(true, 1, slab().advance().start());
        assert!(early < late);

        // Within a slab number, time decides.
        let a = StepId::new(true, 0, slab().start());
        let b = StepId::new(true, 0, slab().start() + slab().duration() / 2);
        assert!(a < b);

        // Start-up ids sort before every evolution id.
        let seed = StepId::new(true, -1, slab().start());
        assert!(seed < a);
        assert!(seed.is_pre_evolution());
        assert!(!a.is_pre_evolution());
    }

    #[test]
    fn backward_integration_reverses_time_order() {
        let a = StepId::new(false, 0, slab().end());
        let b = StepId::new(false, 0, slab().start() + slab().duration() / 2);
        assert!(a < b);
    }

    #[test]
    fn substep_breaks_ties_at_equal_times() {
        let t = slab().start() + slab().duration() / 4;
        let step = StepId::new(true, 0, t);
        let iterate = StepId::new_substep(true, 0, t, 1);
        assert!(step < iterate);
        assert_ne!(step, iterate);
    }

    #[test]
    #[should_panic(expected = "opposite time directions")]
    fn opposite_directions_do_not_compare() {
        let forward = StepId::new(true, 0, slab().start());
        let backward = StepId::new(false, 0, slab().start());
        let _ = forward < backward;
    }
}
