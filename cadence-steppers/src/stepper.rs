use std::ops::{AddAssign, Mul};

use cadence_core::{BoundaryHistory, History, StepId, TimeDelta};

/// A multistep time integrator for volume updates.
///
/// A `TimeStepper` holds no mutable state of its own: every call reads the
/// externally owned [`History`] it is handed, so one stepper instance can
/// serve any number of state variables under a single-writer-per-history
/// discipline. State arithmetic is expressed through `std::ops` bounds — the
/// stepper only ever forms `value + derivative * weight`, with the weight a
/// plain `f64`.
///
/// # Example Implementations
///
/// - [`AdamsBashforth`](crate::AdamsBashforth): explicit multistep with
///   support for arbitrary non-uniform step histories.
pub trait TimeStepper {
    /// The number of history samples consumed at full order.
    fn order(&self) -> usize;

    /// The convergence order of the built-in error estimate.
    fn error_estimate_order(&self) -> usize;

    /// Whether dense output only evaluates inside already-integrated time.
    fn monotonic(&self) -> bool;

    /// Advances `u` across `[t, t + time_step]`, where `t` is the time of the
    /// most recent history record.
    ///
    /// Accumulates `u += Σ wᵢ · dᵢ` over the most recent
    /// `history.integration_order()` derivative samples, with weights exact
    /// for derivatives polynomial in time of degree below that order.
    ///
    /// A step against the history's direction is allowed and exactly undoes
    /// the corresponding forward step, since reversing the target interval
    /// negates every weight.
    ///
    /// # Panics
    ///
    /// Panics if the history holds fewer records than its integration order,
    /// or if that order exceeds the stepper's.
    fn update_u<T>(&self, u: &mut T, history: &History<T>, time_step: TimeDelta)
    where
        T: AddAssign,
        for<'a> &'a T: Mul<f64, Output = T>;

    /// Like [`update_u`](TimeStepper::update_u), also accumulating into
    /// `error` the difference between this update and the one the next lower
    /// order would have produced — the estimate behind
    /// [`error_estimate_order`](TimeStepper::error_estimate_order).
    ///
    /// # Panics
    ///
    /// As [`update_u`](TimeStepper::update_u).
    fn update_u_with_error<T>(
        &self,
        u: &mut T,
        error: &mut T,
        history: &History<T>,
        time_step: TimeDelta,
    ) where
        T: AddAssign,
        for<'a> &'a T: Mul<f64, Output = T>;

    /// Evaluates the solution at `time`, strictly inside the step currently
    /// being integrated, accumulating the partial-step delta into `u`.
    ///
    /// `u` must hold the solution at the most recent history record's time.
    /// The history is not mutated and no state is committed: repeated calls
    /// at the same `time` against an unchanged history produce identical
    /// results, so speculative re-evaluation is safe.
    ///
    /// # Panics
    ///
    /// As [`update_u`](TimeStepper::update_u), except that no step direction
    /// is involved.
    fn dense_output<T>(&self, u: &mut T, history: &History<T>, time: f64)
    where
        T: AddAssign,
        for<'a> &'a T: Mul<f64, Output = T>;

    /// Whether the retained history is consistent enough to change the step
    /// size before taking the step identified by `step_id`.
    ///
    /// This is a scheduling hint, not a correctness gate: history that is not
    /// ordered on the correct side of the candidate step answers `false`
    /// rather than panicking.
    fn can_change_step_size<T>(&self, step_id: &StepId, history: &History<T>) -> bool;
}

/// A [`TimeStepper`] that can also advance flux coupling terms across a
/// boundary whose two sides step at different local rates.
///
/// The coupling function is supplied by the caller as a pure function of one
/// raw sample from each side; it is never assumed commutative (local and
/// remote are distinguished), and samples are only ever passed to it by
/// reference — the engine neither copies nor interpolates stored boundary
/// data.
pub trait LtsTimeStepper: TimeStepper {
    /// Integrates the coupling across `[t, t + time_step]`, where `t` is the
    /// time of the most recent local entry, accumulating into `result`.
    ///
    /// Each (local entry, remote entry) pair whose validity intervals overlap
    /// the window contributes `coupling(local, remote)` weighted by the
    /// temporal overlap of the two entries' intervals; when both sides step
    /// at the same rate the pairwise weights collapse to the single-rate
    /// integral exactly.
    ///
    /// # Panics
    ///
    /// Panics if either side's history cannot supply a full extrapolation
    /// window anywhere in the update, or if the step direction disagrees with
    /// the history's ids.
    fn add_boundary_delta<L, R, C, F>(
        &self,
        result: &mut C,
        history: &mut BoundaryHistory<L, R, C>,
        time_step: TimeDelta,
        coupling: F,
    ) where
        C: AddAssign,
        for<'a> &'a C: Mul<f64, Output = C>,
        F: Fn(&L, &R) -> C;

    /// Dense output of the coupling term: the same walk as
    /// [`add_boundary_delta`](LtsTimeStepper::add_boundary_delta) with the
    /// window truncated at `time`.
    ///
    /// `result` must hold the coupling state at the most recent local entry's
    /// time. Only the coupling cache is touched in the history; retained
    /// entries are unchanged.
    fn boundary_dense_output<L, R, C, F>(
        &self,
        result: &mut C,
        history: &mut BoundaryHistory<L, R, C>,
        time: f64,
        coupling: F,
    ) where
        C: AddAssign,
        for<'a> &'a C: Mul<f64, Output = C>,
        F: Fn(&L, &R) -> C;

    /// Discards, on each side, every leading entry that no future coupling
    /// window can reach, along with dead cached coupling values.
    ///
    /// Called by the driver after every completed boundary update; afterwards
    /// each side retains at most [`order`](TimeStepper::order) entries, so
    /// boundary memory is bounded by the method order rather than by how long
    /// the simulation has run.
    fn clean_boundary_history<L, R, C>(&self, history: &mut BoundaryHistory<L, R, C>);

    /// Whether advancing the local side from `current_id` to `next_id`
    /// requires new data from the neighboring side.
    ///
    /// Order-independent and direction-aware: true exactly when the next
    /// step's time strictly exceeds the current one's in the stepping
    /// direction. At equal times no new data is ever needed, whatever the
    /// substeps. The orchestration layer must obey this predicate exactly —
    /// both over- and under-requesting break the coupling update's
    /// correctness argument.
    ///
    /// # Panics
    ///
    /// Panics if the two ids disagree about the direction of time.
    fn neighbor_data_required(&self, next_id: &StepId, current_id: &StepId) -> bool;

    /// [`neighbor_data_required`](LtsTimeStepper::neighbor_data_required)
    /// against a dense-output target time instead of a next step.
    fn neighbor_data_required_for_dense_output(
        &self,
        dense_output_time: f64,
        current_id: &StepId,
    ) -> bool;
}
