use std::collections::VecDeque;

use crate::StepId;

/// One retained integration sample: the step it was taken at, the state value,
/// and the state's time derivative.
#[derive(Debug, Clone)]
pub struct Record<T> {
    pub step_id: StepId,
    pub value: T,
    pub derivative: T,
}

/// The look-back window of samples a multistep update consumes, for one state
/// variable.
///
/// A `History` retains at most `integration_order` records in a ring buffer;
/// inserting beyond capacity silently discards the oldest record, so the
/// retained window always holds the most recent samples. Records must arrive
/// in strictly increasing [`StepId`] order. The history is owned by whatever
/// drives the update loop for its variable and is only ever mutated through
/// [`insert`](History::insert), [`insert_initial`](History::insert_initial),
/// and [`undo_latest`](History::undo_latest).
#[derive(Debug, Clone)]
pub struct History<T> {
    integration_order: usize,
    entries: VecDeque<Record<T>>,
}

impl<T> History<T> {
    /// Creates an empty history that retains `order` records.
    ///
    /// # Panics
    ///
    /// Panics if `order` is zero.
    #[must_use]
    pub fn new(order: usize) -> Self {
        assert!(order >= 1, "history must retain at least one record");
        Self {
            integration_order: order,
            entries: VecDeque::with_capacity(order + 1),
        }
    }

    /// The number of records the next update will consume.
    #[must_use]
    pub fn integration_order(&self) -> usize {
        self.integration_order
    }

    /// Changes the number of retained records.
    ///
    /// Used by start-up procedures that ramp the order as seed data becomes
    /// available. Shrinking discards the oldest records immediately.
    ///
    /// # Panics
    ///
    /// Panics if `order` is zero.
    pub fn set_integration_order(&mut self, order: usize) {
        assert!(order >= 1, "history must retain at least one record");
        self.integration_order = order;
        while self.entries.len() > self.integration_order {
            self.entries.pop_front();
        }
    }

    /// Appends the newest record, discarding the oldest once at capacity.
    ///
    /// # Panics
    ///
    /// Panics if `step_id` does not strictly exceed the latest retained id:
    /// a history may not hold two records for one (time, substep) pair, and
    /// may not run backwards.
    pub fn insert(&mut self, step_id: StepId, value: T, derivative: T) {
        if let Some(latest) = self.entries.back() {
            assert!(
                latest.step_id.ordering(&step_id).is_lt(),
                "out-of-order insert: {step_id} does not follow {}",
                latest.step_id
            );
        }
        self.entries.push_back(Record {
            step_id,
            value,
            derivative,
        });
        while self.entries.len() > self.integration_order {
            self.entries.pop_front();
        }
    }

    /// Prepends a seed record from before the start of normal integration.
    ///
    /// Seed records never evict existing ones.
    ///
    /// # Panics
    ///
    /// Panics if `step_id` does not strictly precede the earliest retained id.
    pub fn insert_initial(&mut self, step_id: StepId, value: T, derivative: T) {
        if let Some(earliest) = self.entries.front() {
            assert!(
                step_id.ordering(&earliest.step_id).is_lt(),
                "out-of-order seed: {step_id} does not precede {}",
                earliest.step_id
            );
        }
        self.entries.push_front(Record {
            step_id,
            value,
            derivative,
        });
    }

    /// Discards the most recent record, if any, and returns it.
    ///
    /// This is how a provisional step — one taken only to estimate a new step
    /// size — is rejected before it becomes a permanent part of the window.
    pub fn undo_latest(&mut self) -> Option<Record<T>> {
        self.entries.pop_back()
    }

    /// The most recent record.
    #[must_use]
    pub fn latest(&self) -> Option<&Record<T>> {
        self.entries.back()
    }

    /// Records in insertion order, oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Record<T>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
