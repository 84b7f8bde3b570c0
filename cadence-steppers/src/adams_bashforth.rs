use std::{
    cmp::Ordering,
    ops::{AddAssign, Mul},
};

use cadence_core::{BoundaryHistory, BoundarySide, History, Record, StepId, TimeDelta};
use thiserror::Error;

use crate::{
    coefficients::{definite_integral, integration_coefficients, lagrange_basis, poly_mul},
    LtsTimeStepper, TimeStepper,
};

/// An explicit Adams-Bashforth stepper of fixed order, valid for arbitrary
/// non-uniform step histories.
///
/// The stepper owns nothing but its order: all mutable state lives in the
/// [`History`]/[`BoundaryHistory`] objects passed into each call, so a single
/// instance can drive any number of independent variables and subdomains.
/// Using `k` samples yields a method of order `k` — exact for derivatives
/// polynomial in time of degree below `k` — and an error estimate of order
/// `k - 1`.
///
/// # Examples
///
/// ```
/// use cadence_core::{History, Slab, StepId};
/// use cadence_steppers::{AdamsBashforth, TimeStepper};
///
/// let stepper = AdamsBashforth::new(1).unwrap();
/// let slab = Slab::new(0.0, 1.0);
/// let mut history = History::new(1);
/// // dy/dt = 2 starting from y = 5.
/// history.insert(StepId::new(true, 0, slab.start()), 5.0, 2.0);
/// let mut y = 5.0;
/// stepper.update_u(&mut y, &history, slab.duration() / 2);
/// assert_eq!(y, 6.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdamsBashforth {
    order: usize,
}

/// Error constructing an [`AdamsBashforth`] stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order must be between 1 and {max}, got {order}")]
    OutOfRange { order: usize, max: usize },
}

impl AdamsBashforth {
    /// The largest supported order.
    pub const MAX_ORDER: usize = 8;

    /// Creates a stepper of the given order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::OutOfRange`] unless
    /// `1 <= order <= `[`MAX_ORDER`](Self::MAX_ORDER).
    pub fn new(order: usize) -> Result<Self, OrderError> {
        if (1..=Self::MAX_ORDER).contains(&order) {
            Ok(Self { order })
        } else {
            Err(OrderError::OutOfRange {
                order,
                max: Self::MAX_ORDER,
            })
        }
    }

    /// The most recent `count` records, oldest first, with their times.
    fn recent_records<'a, T>(
        &self,
        history: &'a History<T>,
        count: usize,
    ) -> (Vec<&'a Record<T>>, Vec<f64>) {
        assert!(
            count <= self.order,
            "history integration order {count} exceeds the stepper order {}",
            self.order
        );
        assert!(
            history.len() >= count,
            "insufficient history: {} records for an order-{count} update",
            history.len()
        );
        let records: Vec<_> = history.iter().skip(history.len() - count).collect();
        let times = records
            .iter()
            .map(|r| r.step_id.step_time().value())
            .collect();
        (records, times)
    }

    /// Shared core of the boundary updates: walks the union of both sides'
    /// step boundaries from the latest local entry's time to `end`.
    fn boundary_update<L, R, C, F>(
        &self,
        result: &mut C,
        history: &mut BoundaryHistory<L, R, C>,
        end: f64,
        coupling: &F,
    ) where
        C: AddAssign,
        for<'a> &'a C: Mul<f64, Output = C>,
        F: Fn(&L, &R) -> C,
    {
        let (forward, start) = {
            let latest = history
                .local()
                .latest()
                .expect("a boundary update requires local history");
            (
                latest.step_id().time_runs_forward(),
                latest.step_id().step_time().value(),
            )
        };
        let before = |a: f64, b: f64| if forward { a < b } else { b < a };

        // Sub-interval boundaries: the window ends plus every remote step
        // time strictly inside the window. On each sub-interval both sides'
        // extrapolation windows are constant, so the pairwise weights are
        // exact there.
        let mut bounds = vec![start];
        for entry in history.remote().iter() {
            let t = entry.step_id().step_time().value();
            if before(start, t) && before(t, end) {
                bounds.push(t);
            }
        }
        bounds.push(end);
        bounds.sort_by(|a, b| if forward { a.total_cmp(b) } else { b.total_cmp(a) });
        bounds.dedup();

        for pair in 0..bounds.len() - 1 {
            let a = bounds[pair];
            let b = bounds[pair + 1];

            let (local_first, local_times) = side_window(history.local(), a, forward, self.order);
            let (remote_first, remote_times) =
                side_window(history.remote(), a, forward, self.order);

            let local_bases: Vec<Vec<f64>> = (0..local_times.len())
                .map(|i| lagrange_basis(&local_times, i))
                .collect();
            let remote_bases: Vec<Vec<f64>> = (0..remote_times.len())
                .map(|j| lagrange_basis(&remote_times, j))
                .collect();

            let width = b - a;
            for (i, local_basis) in local_bases.iter().enumerate() {
                for (j, remote_basis) in remote_bases.iter().enumerate() {
                    let weight =
                        definite_integral(&poly_mul(local_basis, remote_basis), 0.0, width);
                    let value =
                        history.coupling(local_first + i, remote_first + j, |l, r| coupling(l, r));
                    *result += value * weight;
                }
            }
        }
    }
}

impl TimeStepper for AdamsBashforth {
    fn order(&self) -> usize {
        self.order
    }

    fn error_estimate_order(&self) -> usize {
        self.order - 1
    }

    fn monotonic(&self) -> bool {
        true
    }

    fn update_u<T>(&self, u: &mut T, history: &History<T>, time_step: TimeDelta)
    where
        T: AddAssign,
        for<'a> &'a T: Mul<f64, Output = T>,
    {
        let (records, times) = self.recent_records(history, history.integration_order());
        let latest = *records.last().expect("insufficient history");
        // A step against the history's direction is legitimate: reversing the
        // interval negates every weight exactly, undoing the forward step.
        let step_start = latest.step_id.step_time();
        let step_end = step_start + time_step;
        let weights = integration_coefficients(&times, step_start.value(), step_end.value());
        for (record, weight) in records.iter().zip(&weights) {
            *u += &record.derivative * *weight;
        }
    }

    fn update_u_with_error<T>(
        &self,
        u: &mut T,
        error: &mut T,
        history: &History<T>,
        time_step: TimeDelta,
    ) where
        T: AddAssign,
        for<'a> &'a T: Mul<f64, Output = T>,
    {
        let order = history.integration_order();
        let (records, times) = self.recent_records(history, order);
        let latest = *records.last().expect("insufficient history");
        let t0 = latest.step_id.step_time().value();
        let t1 = (latest.step_id.step_time() + time_step).value();
        let weights = integration_coefficients(&times, t0, t1);
        let lower = if order > 1 {
            integration_coefficients(&times[1..], t0, t1)
        } else {
            Vec::new()
        };
        for (i, (record, weight)) in records.iter().zip(&weights).enumerate() {
            *u += &record.derivative * *weight;
            let lower_weight = if i == 0 { 0.0 } else { lower[i - 1] };
            *error += &record.derivative * (weight - lower_weight);
        }
    }

    fn dense_output<T>(&self, u: &mut T, history: &History<T>, time: f64)
    where
        T: AddAssign,
        for<'a> &'a T: Mul<f64, Output = T>,
    {
        let (records, times) = self.recent_records(history, history.integration_order());
        let start = records
            .last()
            .expect("insufficient history")
            .step_id
            .step_time()
            .value();
        let weights = integration_coefficients(&times, start, time);
        for (record, weight) in records.iter().zip(&weights) {
            *u += &record.derivative * *weight;
        }
    }

    fn can_change_step_size<T>(&self, step_id: &StepId, history: &History<T>) -> bool {
        // Start-up steps may revisit times out of order; until the candidate
        // step has left that regime the step size must stay fixed.
        if step_id.is_pre_evolution() {
            return false;
        }
        let forward = step_id.time_runs_forward();
        history.iter().all(|record| {
            let ordering = record
                .step_id
                .step_time()
                .ordering(&step_id.step_time());
            if forward {
                ordering != Ordering::Greater
            } else {
                ordering != Ordering::Less
            }
        })
    }
}

impl LtsTimeStepper for AdamsBashforth {
    fn add_boundary_delta<L, R, C, F>(
        &self,
        result: &mut C,
        history: &mut BoundaryHistory<L, R, C>,
        time_step: TimeDelta,
        coupling: F,
    ) where
        C: AddAssign,
        for<'a> &'a C: Mul<f64, Output = C>,
        F: Fn(&L, &R) -> C,
    {
        let end = {
            let latest = history
                .local()
                .latest()
                .expect("a boundary update requires local history");
            assert!(
                latest.step_id().time_runs_forward() == time_step.is_positive(),
                "step direction disagrees with the boundary history's ids"
            );
            (latest.step_id().step_time() + time_step).value()
        };
        self.boundary_update(result, history, end, &coupling);
    }

    fn boundary_dense_output<L, R, C, F>(
        &self,
        result: &mut C,
        history: &mut BoundaryHistory<L, R, C>,
        time: f64,
        coupling: F,
    ) where
        C: AddAssign,
        for<'a> &'a C: Mul<f64, Output = C>,
        F: Fn(&L, &R) -> C,
    {
        self.boundary_update(result, history, time, &coupling);
    }

    fn clean_boundary_history<L, R, C>(&self, history: &mut BoundaryHistory<L, R, C>) {
        // Every retained entry precedes every future window start, so only
        // the `order` newest entries per side remain reachable.
        let excess_local = history.local().len().saturating_sub(self.order);
        let excess_remote = history.remote().len().saturating_sub(self.order);
        history.local_mut().mark_unneeded(excess_local);
        history.remote_mut().mark_unneeded(excess_remote);
        history.prune();
    }

    fn neighbor_data_required(&self, next_id: &StepId, current_id: &StepId) -> bool {
        assert!(
            next_id.time_runs_forward() == current_id.time_runs_forward(),
            "cannot compare step ids with opposite time directions"
        );
        let ordering = current_id.step_time().ordering(&next_id.step_time());
        if current_id.time_runs_forward() {
            ordering == Ordering::Less
        } else {
            ordering == Ordering::Greater
        }
    }

    fn neighbor_data_required_for_dense_output(
        &self,
        dense_output_time: f64,
        current_id: &StepId,
    ) -> bool {
        let current = current_id.step_time().value();
        if current_id.time_runs_forward() {
            current < dense_output_time
        } else {
            current > dense_output_time
        }
    }
}

/// The extrapolation window for one side at sub-interval start `start`: the
/// run of entries ending at the last entry at-or-before `start` in the
/// stepping direction, as long as that entry's recorded order. Returns the
/// window's first index and the window's sample times.
fn side_window<T>(
    side: &BoundarySide<T>,
    start: f64,
    forward: bool,
    max_order: usize,
) -> (usize, Vec<f64>) {
    let mut last = None;
    for (index, entry) in side.iter().enumerate() {
        let t = entry.step_id().step_time().value();
        let at_or_before = if forward { t <= start } else { t >= start };
        if at_or_before {
            last = Some(index);
        }
    }
    let last = last.expect("boundary history does not reach back to the update window");
    let order = side.entry(last).order();
    assert!(
        order <= max_order,
        "boundary entry order {order} exceeds the stepper order {max_order}"
    );
    assert!(
        last + 1 >= order,
        "insufficient boundary history: {} entries for an order-{order} window",
        last + 1
    );
    let first = last + 1 - order;
    let times = (first..=last)
        .map(|i| side.entry(i).step_id().step_time().value() - start)
        .collect();
    (first, times)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cadence_core::Slab;

    use super::*;

    fn slab() -> Slab {
        Slab::new(0.0, 1.0)
    }

    #[test]
    fn orders_outside_the_supported_range_are_rejected() {
        assert!(AdamsBashforth::new(0).is_err());
        assert!(AdamsBashforth::new(9).is_err());
        for order in 1..=AdamsBashforth::MAX_ORDER {
            let stepper = AdamsBashforth::new(order).unwrap();
            assert_eq!(stepper.order(), order);
            assert_eq!(stepper.error_estimate_order(), order - 1);
            assert!(stepper.monotonic());
        }
    }

    /// dy/dt is polynomial in t of degree `order - 1`, so every order
    /// integrates its own test function exactly.
    fn exactness_check(order: usize, forward: bool) {
        let stepper = AdamsBashforth::new(order).unwrap();
        let derivative = |t: f64| t.powi(order as i32 - 1);
        let solution = |t: f64| t.powi(order as i32) / order as f64;

        let slab = slab();
        // Small enough that seeds plus update steps stay inside one slab at
        // every order.
        let dt = if forward {
            slab.duration() / 16
        } else {
            -slab.duration() / 16
        };
        let mut history = History::new(order);
        let mut t = if forward { slab.start() } else { slab.end() };
        for step in 0..order {
            history.insert(
                StepId::new(forward, step as i64, t),
                solution(t.value()),
                derivative(t.value()),
            );
            if step + 1 < order {
                t += dt;
            }
        }
        let mut y = solution(t.value());
        for step in 0..4 {
            stepper.update_u(&mut y, &history, dt);
            t += dt;
            history.insert(
                StepId::new(forward, (order + step) as i64, t),
                y,
                derivative(t.value()),
            );
            assert_relative_eq!(y, solution(t.value()), max_relative = 1e-10, epsilon = 1e-12);
        }
    }

    #[test]
    fn polynomial_exactness_at_every_order() {
        for order in 1..=AdamsBashforth::MAX_ORDER {
            exactness_check(order, true);
            exactness_check(order, false);
        }
    }

    #[test]
    fn update_from_irregular_history() {
        // History at 0 and 3/4 of one slab, then 1/3 of the next; a cubic
        // must still be integrated exactly.
        let stepper = AdamsBashforth::new(3).unwrap();
        let f = |t: f64| 1.0 + t * (2.0 + t * (3.0 + t * 4.0));
        let df = |t: f64| 2.0 + t * (6.0 + t * 12.0);

        let slab = slab();
        let mut history = History::new(3);
        let mut add = |slab_number: i64, time: cadence_core::Time| {
            history.insert(
                StepId::new(true, slab_number, time),
                f(time.value()),
                df(time.value()),
            );
        };
        add(0, slab.start());
        add(0, slab.start() + (slab.duration() * 3) / 4);
        add(1, slab.start() + slab.duration() / 3);

        let mut y = f(1.0 / 3.0);
        stepper.update_u(&mut y, &history, slab.duration() / 3);
        assert_relative_eq!(y, f(2.0 / 3.0), max_relative = 1e-12);
    }

    #[test]
    fn forward_then_backward_returns_the_initial_state() {
        // Cubic derivative, so both legs integrate their interpolants
        // exactly and the round trip cancels to rounding.
        let stepper = AdamsBashforth::new(4).unwrap();
        let derivative = |t: f64| 1.0 + t * (t * t - 2.0);
        let slab = slab();
        let dt = slab.duration() / 10;
        let mut history = History::new(4);
        let mut t = slab.start();
        for step in 0..4 {
            history.insert(StepId::new(true, step, t), 0.0, derivative(t.value()));
            if step < 3 {
                t += dt;
            }
        }
        let y0 = 0.25;
        let mut y = y0;
        stepper.update_u(&mut y, &history, dt);
        t += dt;
        history.insert(StepId::new(true, 4, t), y, derivative(t.value()));
        // Step back across the same interval.
        stepper.update_u(&mut y, &history, -dt);
        assert_relative_eq!(y, y0, max_relative = 1e-13);
    }

    #[test]
    fn error_estimate_vanishes_below_the_lower_order() {
        // Quadratic derivative: exact at order 4 and at order 3, so the
        // estimated error is pure roundoff.
        let stepper = AdamsBashforth::new(4).unwrap();
        let slab = slab();
        let dt = slab.duration() / 8;
        let mut history = History::new(4);
        let mut t = slab.start();
        for step in 0..4 {
            let tv = t.value();
            history.insert(StepId::new(true, step, t), tv * tv * tv / 3.0, tv * tv);
            if step < 3 {
                t += dt;
            }
        }
        let mut y = t.value().powi(3) / 3.0;
        let mut error = 0.0;
        stepper.update_u_with_error(&mut y, &mut error, &history, dt);
        let t1 = (t + dt).value();
        assert_relative_eq!(y, t1.powi(3) / 3.0, max_relative = 1e-12);
        assert_relative_eq!(error, 0.0, epsilon = 1e-13);

        // A cubic derivative is beyond order 3: the estimate must see it.
        let mut history = History::new(4);
        let mut t = slab.start();
        for step in 0..4 {
            let tv = t.value();
            history.insert(StepId::new(true, step, t), tv.powi(4) / 4.0, tv.powi(3));
            if step < 3 {
                t += dt;
            }
        }
        let mut y = t.value().powi(4) / 4.0;
        let mut error = 0.0;
        stepper.update_u_with_error(&mut y, &mut error, &history, dt);
        assert!(error.abs() > 1e-8);
    }

    #[test]
    fn dense_output_is_exact_and_repeatable() {
        let stepper = AdamsBashforth::new(3).unwrap();
        let slab = slab();
        let dt = slab.duration() / 4;
        let mut history = History::new(3);
        let mut t = slab.start();
        for step in 0..3 {
            let tv = t.value();
            history.insert(StepId::new(true, step, t), tv * tv, 2.0 * tv);
            if step < 2 {
                t += dt;
            }
        }
        // Inside the step from t = 1/2 towards 3/4.
        let target = 0.6;
        let mut first = t.value() * t.value();
        stepper.dense_output(&mut first, &history, target);
        assert_relative_eq!(first, target * target, max_relative = 1e-12);

        let mut second = t.value() * t.value();
        stepper.dense_output(&mut second, &history, target);
        assert_eq!(first, second);
    }

    #[test]
    fn step_size_changes_require_consistently_ordered_history() {
        let slab = slab();
        let start = slab.start();
        let mid = slab.start() + slab.duration() / 2;
        let end = slab.end();

        let can_change = |forward: bool,
                          first: cadence_core::Time,
                          second: cadence_core::Time,
                          now: cadence_core::Time| {
            let stepper = AdamsBashforth::new(2).unwrap();
            let mut history = History::new(2);
            history.insert(StepId::new(forward, 0, first), 0.0, 0.0);
            history.insert(StepId::new(forward, 2, second), 0.0, 0.0);
            stepper.can_change_step_size(&StepId::new(forward, 4, now), &history)
        };

        assert!(can_change(true, start, mid, end));
        assert!(!can_change(true, start, end, mid));
        assert!(can_change(true, mid, start, end));
        assert!(!can_change(true, mid, end, start));
        assert!(!can_change(true, end, start, mid));
        assert!(!can_change(true, end, mid, start));

        assert!(!can_change(false, start, mid, end));
        assert!(!can_change(false, start, end, mid));
        assert!(!can_change(false, mid, start, end));
        assert!(can_change(false, mid, end, start));
        assert!(!can_change(false, end, start, mid));
        assert!(can_change(false, end, mid, start));
    }

    #[test]
    fn no_step_size_changes_during_start_up() {
        let stepper = AdamsBashforth::new(2).unwrap();
        let slab = slab();
        let mut history = History::new(2);
        history.insert(StepId::new(true, -2, slab.start()), 0.0, 0.0);
        assert!(!stepper.can_change_step_size(&StepId::new(true, -1, slab.end()), &history));
    }

    #[test]
    fn neighbor_data_requirements() {
        let stepper = AdamsBashforth::new(4).unwrap();
        let slab = slab();
        let at = |forward: bool, time: cadence_core::Time| StepId::new(forward, 0, time);

        assert!(!stepper.neighbor_data_required(&at(true, slab.start()), &at(true, slab.start())));
        assert!(!stepper.neighbor_data_required(&at(true, slab.start()), &at(true, slab.end())));
        assert!(stepper.neighbor_data_required(&at(true, slab.end()), &at(true, slab.start())));

        assert!(!stepper.neighbor_data_required(&at(false, slab.end()), &at(false, slab.end())));
        assert!(!stepper.neighbor_data_required(&at(false, slab.end()), &at(false, slab.start())));
        assert!(stepper.neighbor_data_required(&at(false, slab.start()), &at(false, slab.end())));

        let mid = slab.start() + slab.duration() / 2;
        assert!(stepper.neighbor_data_required_for_dense_output(0.75, &at(true, mid)));
        assert!(!stepper.neighbor_data_required_for_dense_output(0.25, &at(true, mid)));
        assert!(stepper.neighbor_data_required_for_dense_output(0.25, &at(false, mid)));
    }

    #[test]
    #[should_panic(expected = "insufficient history")]
    fn updates_require_a_full_window() {
        let stepper = AdamsBashforth::new(3).unwrap();
        let slab = slab();
        let mut history = History::new(3);
        history.insert(StepId::new(true, 0, slab.start()), 0.0, 1.0);
        let mut y = 0.0;
        stepper.update_u(&mut y, &history, slab.duration() / 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialization_round_trips_the_order() {
        let stepper = AdamsBashforth::new(4).unwrap();
        let encoded = serde_json::to_string(&stepper).unwrap();
        let decoded: AdamsBashforth = serde_json::from_str(&encoded).unwrap();
        assert_eq!(stepper, decoded);
    }
}
