use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::ScheduleError;

pub type TimerId = u64;

/// Work a timer hands back when it fires. Each variant carries the
/// generation or cycle it was issued under so stale work can be dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    Tick { generation: u64 },
    TweenFrame { generation: u64 },
    EnterPhase { cycle: u64, step: usize },
    RestartCycle { cycle: u64 },
}

/// Single-threaded delayed and repeating execution.
pub trait Scheduler {
    fn now_ms(&self) -> u64;

    fn schedule_once(&mut self, delay_ms: u64, task: Task) -> Result<TimerId, ScheduleError>;

    /// Fires every `interval_ms` (at least 1) until cancelled.
    fn schedule_repeating(&mut self, interval_ms: u64, task: Task) -> Result<TimerId, ScheduleError>;

    /// Unknown or already fired ids are ignored.
    fn cancel(&mut self, id: TimerId);

    /// Next task due at or before `until_ms`, advancing the clock to its due
    /// time. Returns `None` once nothing else is due and moves the clock to
    /// `until_ms`.
    fn pop_due(&mut self, until_ms: u64) -> Option<Task>;
}

#[derive(Debug)]
struct Timer {
    task: Task,
    interval: Option<u64>,
}

/// Virtual-clock scheduler. Timers due at the same instant fire in the order
/// they were scheduled.
#[derive(Debug, Default)]
pub struct Timeline {
    now_ms: u64,
    next_id: TimerId,
    next_seq: u64,
    queue: BinaryHeap<Reverse<(u64, u64, TimerId)>>,
    timers: HashMap<TimerId, Timer>,
    capacity: Option<usize>,
    closed: bool,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms,
            ..Self::default()
        }
    }

    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Refuses all further scheduling, as a torn-down host would.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    fn push(&mut self, delay_ms: u64, task: Task, interval: Option<u64>) -> Result<TimerId, ScheduleError> {
        if self.closed {
            return Err(ScheduleError::Closed);
        }
        if self.capacity.is_some_and(|cap| self.timers.len() >= cap) {
            return Err(ScheduleError::Exhausted);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert(id, Timer { task, interval });
        self.enqueue(self.now_ms.saturating_add(delay_ms), id);
        Ok(id)
    }

    fn enqueue(&mut self, due: u64, id: TimerId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse((due, seq, id)));
    }
}

impl Scheduler for Timeline {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn schedule_once(&mut self, delay_ms: u64, task: Task) -> Result<TimerId, ScheduleError> {
        self.push(delay_ms, task, None)
    }

    fn schedule_repeating(&mut self, interval_ms: u64, task: Task) -> Result<TimerId, ScheduleError> {
        let interval = interval_ms.max(1);
        self.push(interval, task, Some(interval))
    }

    fn cancel(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    fn pop_due(&mut self, until_ms: u64) -> Option<Task> {
        while let Some(&Reverse((due, _, id))) = self.queue.peek() {
            if due > until_ms {
                break;
            }
            self.queue.pop();
            let Some(timer) = self.timers.get(&id) else {
                continue;
            };
            let task = timer.task;
            let interval = timer.interval;
            self.now_ms = self.now_ms.max(due);
            match interval {
                Some(interval) => self.enqueue(due.saturating_add(interval), id),
                None => {
                    self.timers.remove(&id);
                }
            }
            return Some(task);
        }
        self.now_ms = self.now_ms.max(until_ms);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(timeline: &mut Timeline, until: u64) -> Vec<(u64, Task)> {
        let mut out = Vec::new();
        while let Some(task) = timeline.pop_due(until) {
            out.push((timeline.now_ms(), task));
        }
        out
    }

    mod timeline_schedule_once {
        use super::*;

        #[test]
        fn fires_at_due_time_and_only_once() {
            let mut t = Timeline::new();
            t.schedule_once(100, Task::RestartCycle { cycle: 1 }).unwrap();
            assert!(drain(&mut t, 99).is_empty());
            assert_eq!(drain(&mut t, 100), vec![(100, Task::RestartCycle { cycle: 1 })]);
            assert!(drain(&mut t, 1_000).is_empty());
            assert_eq!(t.pending(), 0);
        }

        #[test]
        fn orders_by_due_time_then_insertion() {
            let mut t = Timeline::new();
            t.schedule_once(50, Task::EnterPhase { cycle: 1, step: 2 }).unwrap();
            t.schedule_once(10, Task::EnterPhase { cycle: 1, step: 0 }).unwrap();
            t.schedule_once(50, Task::EnterPhase { cycle: 1, step: 1 }).unwrap();
            let steps: Vec<usize> = drain(&mut t, 100)
                .into_iter()
                .map(|(_, task)| match task {
                    Task::EnterPhase { step, .. } => step,
                    _ => usize::MAX,
                })
                .collect();
            assert_eq!(steps, vec![0, 2, 1]);
        }

        #[test]
        fn delays_are_relative_to_current_clock() {
            let mut t = Timeline::starting_at(1_000);
            t.schedule_once(5, Task::Tick { generation: 3 }).unwrap();
            assert_eq!(drain(&mut t, 2_000), vec![(1_005, Task::Tick { generation: 3 })]);
        }
    }

    mod timeline_schedule_repeating {
        use super::*;

        #[test]
        fn fires_every_interval() {
            let mut t = Timeline::new();
            t.schedule_repeating(16, Task::Tick { generation: 1 }).unwrap();
            let times: Vec<u64> = drain(&mut t, 64).into_iter().map(|(at, _)| at).collect();
            assert_eq!(times, vec![16, 32, 48, 64]);
        }

        #[test]
        fn zero_interval_is_clamped() {
            let mut t = Timeline::new();
            t.schedule_repeating(0, Task::Tick { generation: 1 }).unwrap();
            assert_eq!(drain(&mut t, 3).len(), 3);
        }
    }

    mod timeline_cancel {
        use super::*;

        #[test]
        fn cancelled_timer_never_fires() {
            let mut t = Timeline::new();
            let id = t.schedule_once(10, Task::Tick { generation: 1 }).unwrap();
            t.cancel(id);
            assert!(drain(&mut t, 100).is_empty());
        }

        #[test]
        fn cancelling_repeating_timer_stops_it() {
            let mut t = Timeline::new();
            let id = t.schedule_repeating(10, Task::Tick { generation: 1 }).unwrap();
            assert_eq!(drain(&mut t, 25).len(), 2);
            t.cancel(id);
            assert!(drain(&mut t, 100).is_empty());
        }

        #[test]
        fn unknown_id_is_ignored() {
            let mut t = Timeline::new();
            t.cancel(42);
            assert_eq!(t.pending(), 0);
        }
    }

    mod timeline_failures {
        use super::*;

        #[test]
        fn closed_timeline_rejects_tasks() {
            let mut t = Timeline::new();
            t.close();
            assert_eq!(
                t.schedule_once(1, Task::Tick { generation: 1 }),
                Err(ScheduleError::Closed)
            );
        }

        #[test]
        fn capacity_limit_rejects_overflow() {
            let mut t = Timeline::with_capacity_limit(1);
            t.schedule_once(1, Task::Tick { generation: 1 }).unwrap();
            assert_eq!(
                t.schedule_once(1, Task::Tick { generation: 2 }),
                Err(ScheduleError::Exhausted)
            );
        }
    }

    mod timeline_clock {
        use super::*;

        #[test]
        fn clock_moves_to_until_when_idle() {
            let mut t = Timeline::new();
            assert!(t.pop_due(500).is_none());
            assert_eq!(t.now_ms(), 500);
        }

        #[test]
        fn clock_never_moves_backwards() {
            let mut t = Timeline::starting_at(100);
            assert!(t.pop_due(50).is_none());
            assert_eq!(t.now_ms(), 100);
        }
    }
}
