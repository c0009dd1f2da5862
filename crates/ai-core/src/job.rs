//! Cooperative, time-sliced jobs.
//!
//! A [`Job`] performs a resumable computation in slices: each call to [`Job::run`] does some
//! work, checks its [`Slice`], and returns [`JobPoll::Pending`] when the slice is spent. The
//! [`JobQueue`] hands every queued job one slice per [`JobQueue::process`] call, re-queuing
//! suspended jobs at the back so no job starves the others.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How much work a single invocation may perform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeBudget {
    /// Wall-clock milliseconds.
    Millis(f64),
    /// A fixed number of work units. Deterministic, so preferred in tests and replays.
    Steps(u32),
    Unlimited,
}

impl TimeBudget {
    pub fn start(self) -> Slice {
        Slice::new(self)
    }
}

/// A running budget for one invocation.
#[derive(Debug, Clone)]
pub struct Slice {
    budget: TimeBudget,
    started: Instant,
    used: u32,
}

impl Slice {
    pub fn new(budget: TimeBudget) -> Self {
        Self {
            budget,
            started: Instant::now(),
            used: 0,
        }
    }

    pub fn budget(&self) -> TimeBudget {
        self.budget
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    /// Record one unit of work. Returns `true` once the budget is spent.
    pub fn consume(&mut self) -> bool {
        self.used = self.used.saturating_add(1);
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        match self.budget {
            // `max` also maps NaN to zero; budgets too large for a `Duration` never run out.
            TimeBudget::Millis(ms) => match Duration::try_from_secs_f64(ms.max(0.0) / 1000.0) {
                Ok(limit) => self.started.elapsed() >= limit,
                Err(_) => false,
            },
            TimeBudget::Steps(steps) => self.used >= steps.max(1),
            TimeBudget::Unlimited => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPoll<T> {
    /// Suspended; call `run` again to resume.
    Pending,
    Ready(T),
}

pub trait Job {
    type Output;
    type Error;

    /// Advance the job. Must perform at least one unit of work per call so that repeated calls
    /// always make progress, and must return at the first suspension point after `slice` is
    /// exhausted.
    fn run(&mut self, slice: &mut Slice) -> JobPoll<Result<Self::Output, Self::Error>>;
}

/// Drive `job` to completion in the calling frame.
pub fn run_to_completion<J: Job>(job: &mut J) -> Result<J::Output, J::Error> {
    loop {
        let mut slice = Slice::new(TimeBudget::Unlimited);
        if let JobPoll::Ready(outcome) = job.run(&mut slice) {
            return outcome;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued, never run.
    Pending,
    /// Started and suspended at least once.
    Running,
    Finished,
}

struct JobSlot<J: Job> {
    job: J,
    budget: TimeBudget,
    status: JobStatus,
    outcome: Option<Result<J::Output, J::Error>>,
}

/// Round-robin scheduler for [`Job`]s.
///
/// Finished jobs stay in the queue (with their outcome) until taken or removed.
pub struct JobQueue<J: Job> {
    budget: TimeBudget,
    next_id: u64,
    order: VecDeque<JobId>,
    slots: BTreeMap<JobId, JobSlot<J>>,
}

impl<J: Job> JobQueue<J> {
    /// `budget` caps the total work of one [`JobQueue::process`] call, counted in job slices
    /// for [`TimeBudget::Steps`].
    pub fn new(budget: TimeBudget) -> Self {
        Self {
            budget,
            next_id: 0,
            order: VecDeque::new(),
            slots: BTreeMap::new(),
        }
    }

    pub fn budget(&self) -> TimeBudget {
        self.budget
    }

    pub fn set_budget(&mut self, budget: TimeBudget) {
        self.budget = budget;
    }

    /// Queue `job`; each of its invocations gets a fresh slice of `budget`.
    pub fn enqueue(&mut self, job: J, budget: TimeBudget) -> JobId {
        let id = JobId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.slots.insert(
            id,
            JobSlot {
                job,
                budget,
                status: JobStatus::Pending,
                outcome: None,
            },
        );
        self.order.push_back(id);
        id
    }

    /// Give every queued job at most one slice, in FIFO order, until the queue budget is spent.
    /// Returns the number of slices run.
    pub fn process(&mut self) -> usize {
        let mut total = Slice::new(self.budget);
        let mut remaining = self.order.len();
        let mut ran = 0;

        while remaining > 0 {
            remaining -= 1;
            let Some(id) = self.order.pop_front() else {
                break;
            };
            let Some(slot) = self.slots.get_mut(&id) else {
                continue;
            };
            if slot.status == JobStatus::Finished {
                continue;
            }

            slot.status = JobStatus::Running;
            let mut slice = Slice::new(slot.budget);
            match slot.job.run(&mut slice) {
                JobPoll::Pending => self.order.push_back(id),
                JobPoll::Ready(outcome) => {
                    slot.status = JobStatus::Finished;
                    slot.outcome = Some(outcome);
                }
            }
            ran += 1;

            if total.consume() {
                break;
            }
        }

        ran
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.slots.get(&id).map(|slot| slot.status)
    }

    pub fn job(&self, id: JobId) -> Option<&J> {
        self.slots.get(&id).map(|slot| &slot.job)
    }

    /// The error of a finished job, if it failed.
    pub fn exception(&self, id: JobId) -> Option<&J::Error> {
        match self.slots.get(&id)?.outcome.as_ref()? {
            Ok(_) => None,
            Err(err) => Some(err),
        }
    }

    /// The output of a finished job, if it succeeded.
    pub fn result(&self, id: JobId) -> Option<&J::Output> {
        match self.slots.get(&id)?.outcome.as_ref()? {
            Ok(output) => Some(output),
            Err(_) => None,
        }
    }

    /// Remove a finished job and return its outcome. Unfinished jobs are left in place.
    pub fn take(&mut self, id: JobId) -> Option<Result<J::Output, J::Error>> {
        if self.status(id)? != JobStatus::Finished {
            return None;
        }
        let slot = self.slots.remove(&id)?;
        slot.outcome
    }

    /// Drop a job in any state. It will not be run again.
    pub fn remove(&mut self, id: JobId) -> Option<J> {
        let slot = self.slots.remove(&id)?;
        self.order.retain(|queued| *queued != id);
        Some(slot.job)
    }

    /// Number of jobs held, finished ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of jobs still waiting for a slice.
    pub fn queued(&self) -> usize {
        self.order.len()
    }
}
