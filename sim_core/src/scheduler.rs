//! Periodic action scheduler - the discrete-event timeline
//!
//! Actions live in an arena of generation-tagged slots. The priority queue only
//! holds `(time, priority, sequence, slot, generation)` keys, so cancelling an
//! action is a generation bump: stale keys are skipped when they surface.

use crate::sim::Simulation;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::Duration;

/// Callback invoked with the simulated time at which the action fires
pub type ActionCallback = Rc<dyn Fn(&mut Simulation, Duration)>;

/// Tie-break among actions due at the same timestamp. Lower fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum ActionPriority {
    Dot = 0,
    Expiration = 1,
    Regen = 2,
    Auto = 3,
    Default = 4,
    Low = 5,
}

/// Handle to a scheduled action; stays valid (but dead) after the action retires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionHandle {
    slot: usize,
    generation: u32,
}

struct PendingAction {
    period: Duration,
    /// `None` repeats until cancelled
    remaining: Option<u32>,
    priority: ActionPriority,
    callback: ActionCallback,
}

struct Slot {
    generation: u32,
    action: Option<PendingAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueEntry {
    time: Duration,
    priority: ActionPriority,
    seq: u64,
    slot: usize,
    generation: u32,
}

/// Time-ordered queue of one-shot and periodic actions
#[derive(Default)]
pub struct Scheduler {
    slots: Vec<Slot>,
    free: Vec<usize>,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    seq: u64,
    live: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` to fire at `start`, then every `period` until `ticks` fires have happened.
    ///
    /// `ticks = None` repeats until cancelled. A zero period is only valid for a single fire.
    pub fn schedule(
        &mut self,
        start: Duration,
        period: Duration,
        ticks: Option<u32>,
        priority: ActionPriority,
        callback: ActionCallback,
    ) -> ActionHandle {
        assert!(
            !period.is_zero() || ticks == Some(1),
            "periodic action with zero period would never advance time"
        );
        if ticks == Some(0) {
            return ActionHandle { slot: usize::MAX, generation: 0 };
        }

        let action = PendingAction {
            period,
            remaining: ticks,
            priority,
            callback,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot].action = Some(action);
                slot
            }
            None => {
                self.slots.push(Slot { generation: 0, action: Some(action) });
                self.slots.len() - 1
            }
        };
        self.live += 1;
        let generation = self.slots[slot].generation;
        self.push_entry(start, priority, slot, generation);
        ActionHandle { slot, generation }
    }

    /// Schedule a single fire at `at`
    pub fn schedule_once(&mut self, at: Duration, priority: ActionPriority, callback: ActionCallback) -> ActionHandle {
        self.schedule(at, Duration::ZERO, Some(1), priority, callback)
    }

    /// Cancel an action. Returns false if it already retired or was cancelled.
    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        self.retire(handle.slot);
        true
    }

    pub fn is_live(&self, handle: ActionHandle) -> bool {
        self.slots
            .get(handle.slot)
            .map(|s| s.generation == handle.generation && s.action.is_some())
            .unwrap_or(false)
    }

    /// Number of live actions
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Time of the earliest live action, discarding stale keys on the way
    pub fn next_time(&mut self) -> Option<Duration> {
        while let Some(Reverse(entry)) = self.queue.peek().copied() {
            if self.entry_is_live(&entry) {
                return Some(entry.time);
            }
            self.queue.pop();
        }
        None
    }

    /// Pop the next live action due at or before `until`.
    ///
    /// The action's bookkeeping (tick count, reschedule, retirement) is done
    /// before the callback is handed out, so a callback may cancel or
    /// reschedule its own action safely.
    pub(crate) fn pop_due(&mut self, until: Duration) -> Option<(Duration, ActionCallback)> {
        loop {
            let Reverse(entry) = self.queue.peek().copied()?;
            if entry.time > until {
                return None;
            }
            self.queue.pop();
            if !self.entry_is_live(&entry) {
                continue;
            }

            let (callback, reschedule) = {
                let action = self.slots[entry.slot].action.as_mut()?;
                let callback = action.callback.clone();
                let reschedule = match action.remaining {
                    Some(1) => None,
                    Some(n) => {
                        action.remaining = Some(n - 1);
                        Some((entry.time.saturating_add(action.period), action.priority))
                    }
                    None => Some((entry.time.saturating_add(action.period), action.priority)),
                };
                (callback, reschedule)
            };

            match reschedule {
                Some((next, priority)) => self.push_entry(next, priority, entry.slot, entry.generation),
                None => self.retire(entry.slot),
            }
            return Some((entry.time, callback));
        }
    }

    /// Drop every action (start of a new trial). Outstanding handles become dead.
    pub fn clear(&mut self) {
        for slot in 0..self.slots.len() {
            if self.slots[slot].action.is_some() {
                self.retire(slot);
            }
        }
        self.queue.clear();
    }

    fn entry_is_live(&self, entry: &QueueEntry) -> bool {
        let slot = &self.slots[entry.slot];
        slot.generation == entry.generation && slot.action.is_some()
    }

    fn retire(&mut self, slot: usize) {
        let s = &mut self.slots[slot];
        s.action = None;
        s.generation = s.generation.wrapping_add(1);
        self.free.push(slot);
        self.live -= 1;
    }

    fn push_entry(&mut self, time: Duration, priority: ActionPriority, slot: usize, generation: u32) {
        self.seq += 1;
        self.queue.push(Reverse(QueueEntry {
            time,
            priority,
            seq: self.seq,
            slot,
            generation,
        }));
    }
}
