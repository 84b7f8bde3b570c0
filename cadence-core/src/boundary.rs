use std::collections::HashMap;

use crate::StepId;

/// One side's retained coupling sample: the step it belongs to, the
/// integration order in force when it was inserted, and the raw derivative
/// data.
///
/// The recorded order fixes how many samples any window ending at this entry
/// extrapolates through, even if the stepper's nominal order changes later.
#[derive(Debug)]
pub struct BoundaryEntry<T> {
    step_id: StepId,
    order: usize,
    data: T,
    seq: i64,
}

impl<T> BoundaryEntry<T> {
    #[must_use]
    pub fn step_id(&self) -> StepId {
        self.step_id
    }

    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// The stored derivative sample. Only ever handed out by reference: raw
    /// boundary data is never copied or interpolated by the engine.
    #[must_use]
    pub fn data(&self) -> &T {
        &self.data
    }
}

/// One side of a [`BoundaryHistory`]: an ordered sequence of
/// [`BoundaryEntry`]s plus a cursor of leading entries already consumed by
/// completed coupling computations.
#[derive(Debug)]
pub struct BoundarySide<T> {
    entries: std::collections::VecDeque<BoundaryEntry<T>>,
    unneeded: usize,
}

impl<T> BoundarySide<T> {
    fn new() -> Self {
        Self {
            entries: std::collections::VecDeque::new(),
            unneeded: 0,
        }
    }

    /// Appends the newest sample for this side.
    ///
    /// # Panics
    ///
    /// Panics if `order` is zero or `step_id` does not strictly exceed the
    /// latest retained id on this side.
    pub fn insert(&mut self, step_id: StepId, order: usize, data: T) {
        assert!(order >= 1, "boundary data must carry a positive order");
        let seq = match self.entries.back() {
            Some(latest) => {
                assert!(
                    latest.step_id.ordering(&step_id).is_lt(),
                    "out-of-order boundary insert: {step_id} does not follow {}",
                    latest.step_id
                );
                latest.seq + 1
            }
            None => 0,
        };
        self.entries.push_back(BoundaryEntry {
            step_id,
            order,
            data,
            seq,
        });
    }

    /// Prepends a seed sample from before the start of normal integration.
    ///
    /// # Panics
    ///
    /// Panics if `order` is zero or `step_id` does not strictly precede the
    /// earliest retained id on this side.
    pub fn insert_initial(&mut self, step_id: StepId, order: usize, data: T) {
        assert!(order >= 1, "boundary data must carry a positive order");
        let seq = match self.entries.front() {
            Some(earliest) => {
                assert!(
                    step_id.ordering(&earliest.step_id).is_lt(),
                    "out-of-order boundary seed: {step_id} does not precede {}",
                    earliest.step_id
                );
                earliest.seq - 1
            }
            None => 0,
        };
        self.entries.push_front(BoundaryEntry {
            step_id,
            order,
            data,
            seq,
        });
    }

    /// Marks the `count` oldest entries as consumed: no future coupling
    /// window can reach them. They are removed by
    /// [`BoundaryHistory::prune`].
    pub fn mark_unneeded(&mut self, count: usize) {
        self.unneeded = self.unneeded.max(count.min(self.entries.len()));
    }

    /// The entry at `index`, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn entry(&self, index: usize) -> &BoundaryEntry<T> {
        &self.entries[index]
    }

    /// The most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&BoundaryEntry<T>> {
        self.entries.back()
    }

    /// Entries in step order, oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &BoundaryEntry<T>> {
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

/// Retained coupling samples for one boundary shared by two sides that may
/// step at different rates.
///
/// The `local` and `remote` sides advance independently; each holds raw
/// derivative samples of type `L` and `R`. Coupling evaluations of type `C`
/// are cached so that every (local entry, remote entry) pair is combined at
/// most once across all updates — the same pair recurs in successive windows
/// under local time stepping, and the raw samples are reused rather than
/// copied.
///
/// # Examples
///
/// ```
/// use cadence_core::{BoundaryHistory, Slab, StepId};
///
/// let slab = Slab::new(0.0, 1.0);
/// let mut history: BoundaryHistory<f64, f64, f64> = BoundaryHistory::new();
/// history.local_mut().insert(StepId::new(true, 0, slab.start()), 2, 1.5);
/// history.remote_mut().insert(StepId::new(true, 0, slab.start()), 2, -0.5);
/// let product = *history.coupling(0, 0, |l, r| l * r);
/// assert_eq!(product, -0.75);
/// ```
#[derive(Debug)]
pub struct BoundaryHistory<L, R, C> {
    local: BoundarySide<L>,
    remote: BoundarySide<R>,
    couplings: HashMap<(i64, i64), C>,
}

impl<L, R, C> BoundaryHistory<L, R, C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            local: BoundarySide::new(),
            remote: BoundarySide::new(),
            couplings: HashMap::new(),
        }
    }

    #[must_use]
    pub fn local(&self) -> &BoundarySide<L> {
        &self.local
    }

    #[must_use]
    pub fn remote(&self) -> &BoundarySide<R> {
        &self.remote
    }

    pub fn local_mut(&mut self) -> &mut BoundarySide<L> {
        &mut self.local
    }

    pub fn remote_mut(&mut self) -> &mut BoundarySide<R> {
        &mut self.remote
    }

    /// The coupling value for the entry pair at the given side indices,
    /// evaluating `coupling` only if this pair has never been combined.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn coupling<F>(&mut self, local_index: usize, remote_index: usize, coupling: F) -> &C
    where
        F: FnOnce(&L, &R) -> C,
    {
        let local = &self.local.entries[local_index];
        let remote = &self.remote.entries[remote_index];
        self.couplings
            .entry((local.seq, remote.seq))
            .or_insert_with(|| coupling(&local.data, &remote.data))
    }

    /// Removes entries marked unneeded on either side, along with every
    /// cached coupling value that refers to a removed entry.
    pub fn prune(&mut self) {
        for _ in 0..self.local.unneeded {
            self.local.entries.pop_front();
        }
        self.local.unneeded = 0;
        for _ in 0..self.remote.unneeded {
            self.remote.entries.pop_front();
        }
        self.remote.unneeded = 0;

        let local_floor = self.local.entries.front().map_or(i64::MAX, |e| e.seq);
        let remote_floor = self.remote.entries.front().map_or(i64::MAX, |e| e.seq);
        self.couplings
            .retain(|&(l, r), _| l >= local_floor && r >= remote_floor);
    }
}

impl<L, R, C> Default for BoundaryHistory<L, R, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::Slab;

    fn id(quarters: i64) -> StepId {
        let slab = Slab::new(0.0, 1.0);
        StepId::new(true, 0, slab.start() + (slab.duration() * quarters) / 4)
    }

    #[test]
    fn sides_are_independent() {
        let mut history: BoundaryHistory<f64, f64, f64> = BoundaryHistory::new();
        history.local_mut().insert(id(0), 2, 1.0);
        history.local_mut().insert(id(2), 2, 2.0);
        history.remote_mut().insert(id(1), 3, 3.0);
        assert_eq!(history.local().len(), 2);
        assert_eq!(history.remote().len(), 1);
        assert_eq!(history.remote().entry(0).order(), 3);
        assert_eq!(*history.local().latest().unwrap().data(), 2.0);
    }

    #[test]
    #[should_panic(expected = "out-of-order boundary insert")]
    fn sides_reject_regressing_ids() {
        let mut history: BoundaryHistory<f64, f64, f64> = BoundaryHistory::new();
        history.local_mut().insert(id(2), 2, 0.0);
        history.local_mut().insert(id(1), 2, 0.0);
    }

    #[test]
    fn seeds_prepend() {
        let mut history: BoundaryHistory<f64, f64, f64> = BoundaryHistory::new();
        history.local_mut().insert(id(2), 2, 0.2);
        history.local_mut().insert_initial(id(1), 2, 0.1);
        history.local_mut().insert_initial(id(0), 2, 0.0);
        let times: Vec<_> = history
            .local()
            .iter()
            .map(|e| e.step_id().step_time().value())
            .collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5]);
    }

    #[test]
    fn coupling_evaluates_each_pair_once() {
        let mut history: BoundaryHistory<f64, f64, f64> = BoundaryHistory::new();
        history.local_mut().insert(id(0), 2, 3.0);
        history.remote_mut().insert(id(0), 2, 5.0);
        history.remote_mut().insert(id(1), 2, 7.0);

        let evaluations = Cell::new(0);
        let mut combine = |l: &f64, r: &f64| {
            evaluations.set(evaluations.get() + 1);
            l * r
        };
        assert_eq!(*history.coupling(0, 0, &mut combine), 15.0);
        assert_eq!(*history.coupling(0, 1, &mut combine), 21.0);
        assert_eq!(*history.coupling(0, 0, &mut combine), 15.0);
        assert_eq!(evaluations.get(), 2);
    }

    #[test]
    fn pruning_drops_consumed_entries_and_dead_cache_rows() {
        let mut history: BoundaryHistory<f64, f64, f64> = BoundaryHistory::new();
        for step in 0..4 {
            history.local_mut().insert(id(step), 2, step as f64);
            history.remote_mut().insert(id(step), 2, step as f64);
        }
        let _ = history.coupling(0, 0, |l, r| l * r);
        let _ = history.coupling(3, 3, |l, r| l * r);

        history.local_mut().mark_unneeded(2);
        history.remote_mut().mark_unneeded(2);
        history.prune();

        assert_eq!(history.local().len(), 2);
        assert_eq!(history.remote().len(), 2);
        assert_eq!(history.couplings.len(), 1);
        assert_eq!(history.local().entry(0).step_id(), id(2));

        // Marking more than remains is clamped.
        history.local_mut().mark_unneeded(10);
        history.prune();
        assert!(history.local().is_empty());
    }
}
