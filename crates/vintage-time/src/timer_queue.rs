use std::collections::{BTreeMap, HashMap};

/// Handle returned by [`TimerQueue::schedule`]. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A timer that reached its deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerEvent<T> {
    pub id: TimerId,
    pub deadline_ns: u64,
    pub payload: T,
}

/// Deadline-ordered one-shot timers with event delivery.
///
/// The queue never calls back into devices. The owner pops due events and routes each payload
/// to the device that scheduled it; periodic behaviour comes from the handler scheduling its
/// next deadline. Events with equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    pending: BTreeMap<(u64, TimerId), T>,
    deadlines: HashMap<TimerId, u64>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, deadline_ns: u64, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((deadline_ns, id), payload);
        self.deadlines.insert(id, deadline_ns);
        id
    }

    /// Schedules `payload` to fire `delay_ns` after `now_ns`.
    pub fn schedule_after(&mut self, now_ns: u64, delay_ns: u64, payload: T) -> TimerId {
        self.schedule(now_ns.saturating_add(delay_ns), payload)
    }

    /// Cancels a pending timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline_ns) => self.pending.remove(&(deadline_ns, id)).is_some(),
            None => false,
        }
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn deadline_of(&self, id: TimerId) -> Option<u64> {
        self.deadlines.get(&id).copied()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(|&(deadline_ns, _)| deadline_ns)
    }

    /// Removes and returns the earliest timer whose deadline is `<= now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<TimerEvent<T>> {
        let &(deadline_ns, id) = self.pending.keys().next()?;
        if deadline_ns > now_ns {
            return None;
        }
        let payload = self.pending.remove(&(deadline_ns, id))?;
        self.deadlines.remove(&id);
        Some(TimerEvent {
            id,
            deadline_ns,
            payload,
        })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.deadlines.clear();
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
