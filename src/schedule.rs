//!
//! The priority structure over next-event times of all live atomics.
//!

use crate::model::ModelId;
use crate::time::Time;
use fxhash::FxHashMap;

struct Entry<T> {
    time: T,
    model: ModelId,
}

///
/// A binary heap keyed by `(next_time, model)` in which entries remember
/// their slot, so rescheduling a model after a transition is a single
/// sift in either direction. Passive models carry no entry at all.
///
/// Equal-time entries are enumerated in heap order; the simulator treats
/// them as a set, and nothing may depend on the order within one instant.
///
pub(crate) struct Schedule<T: Time> {
    heap: Vec<Entry<T>>,
    pos: FxHashMap<ModelId, usize>,
}

impl<T: Time> Schedule<T> {
    pub fn new() -> Self {
        Self {
            heap: Vec::new(),
            pos: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn contains(&self, model: ModelId) -> bool {
        self.pos.contains_key(&model)
    }

    /// The minimum next-event time, or infinity when no model is scheduled.
    pub fn min_time(&self) -> T {
        self.heap.first().map_or_else(T::infinity, |e| e.time)
    }

    /// Inserts or updates the entry for `model`. An infinite time removes
    /// the entry: the model has become passive.
    pub fn schedule(&mut self, model: ModelId, time: T) {
        if time.is_infinity() {
            self.remove(model);
            return;
        }
        if let Some(&slot) = self.pos.get(&model) {
            self.heap[slot].time = time;
            let slot = self.sift_up(slot);
            self.sift_down(slot);
        } else {
            self.heap.push(Entry { time, model });
            let slot = self.heap.len() - 1;
            self.pos.insert(model, slot);
            self.sift_up(slot);
        }
    }

    pub fn remove(&mut self, model: ModelId) {
        let Some(slot) = self.pos.remove(&model) else {
            return;
        };
        let last = self.heap.len() - 1;
        self.heap.swap(slot, last);
        self.heap.pop();
        if slot <= last && slot < self.heap.len() {
            self.pos.insert(self.heap[slot].model, slot);
            let slot = self.sift_up(slot);
            self.sift_down(slot);
        }
    }

    /// Collects every model scheduled exactly at the minimum time. The
    /// heap shape lets the walk prune any subtree whose root is later.
    pub fn imminent(&self) -> Vec<ModelId> {
        let mut out = Vec::new();
        if self.heap.is_empty() {
            return out;
        }
        let t_min = self.heap[0].time;
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if i >= self.heap.len() || self.heap[i].time != t_min {
                continue;
            }
            out.push(self.heap[i].model);
            stack.push(2 * i + 1);
            stack.push(2 * i + 2);
        }
        out
    }

    fn precedes(a: &Entry<T>, b: &Entry<T>) -> bool {
        a.time < b.time || (a.time == b.time && a.model < b.model)
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if Self::precedes(&self.heap[slot], &self.heap[parent]) {
                self.heap.swap(slot, parent);
                self.pos.insert(self.heap[slot].model, slot);
                self.pos.insert(self.heap[parent].model, parent);
                slot = parent;
            } else {
                break;
            }
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = 2 * slot + 1;
            let right = 2 * slot + 2;
            let mut least = slot;
            if left < self.heap.len() && Self::precedes(&self.heap[left], &self.heap[least]) {
                least = left;
            }
            if right < self.heap.len() && Self::precedes(&self.heap[right], &self.heap[least]) {
                least = right;
            }
            if least == slot {
                break;
            }
            self.heap.swap(slot, least);
            self.pos.insert(self.heap[slot].model, slot);
            self.pos.insert(self.heap[least].model, least);
            slot = least;
        }
    }
}
