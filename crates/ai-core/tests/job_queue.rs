use std::thread;
use std::time::Duration;

use ai_core::{run_to_completion, Job, JobPoll, JobQueue, JobStatus, Slice, TimeBudget};

/// Counts up to `target`, one unit per step.
struct CountJob {
    count: u32,
    target: u32,
    fail: bool,
    max_units_per_run: u32,
}

impl CountJob {
    fn new(target: u32) -> Self {
        Self {
            count: 0,
            target,
            fail: false,
            max_units_per_run: 0,
        }
    }
}

impl Job for CountJob {
    type Output = u32;
    type Error = String;

    fn run(&mut self, slice: &mut Slice) -> JobPoll<Result<u32, String>> {
        let mut units = 0;
        loop {
            self.count += 1;
            units += 1;
            self.max_units_per_run = self.max_units_per_run.max(units);
            if self.count >= self.target {
                return JobPoll::Ready(if self.fail {
                    Err("boom".to_string())
                } else {
                    Ok(self.count)
                });
            }
            if slice.consume() {
                return JobPoll::Pending;
            }
        }
    }
}

#[test]
fn step_budget_suspends_and_resumes() {
    let mut queue = JobQueue::new(TimeBudget::Unlimited);
    let id = queue.enqueue(CountJob::new(10), TimeBudget::Steps(3));
    assert_eq!(queue.status(id), Some(JobStatus::Pending));

    queue.process();
    assert_eq!(queue.status(id), Some(JobStatus::Running));
    assert_eq!(queue.job(id).unwrap().count, 3);

    queue.process();
    queue.process();
    assert_eq!(queue.status(id), Some(JobStatus::Running));
    queue.process();
    assert_eq!(queue.status(id), Some(JobStatus::Finished));
    assert_eq!(queue.result(id), Some(&10));
    assert_eq!(queue.job(id).unwrap().max_units_per_run, 3);

    assert_eq!(queue.take(id), Some(Ok(10)));
    assert!(queue.is_empty());
}

#[test]
fn failed_job_exposes_exception() {
    let mut queue = JobQueue::new(TimeBudget::Unlimited);
    let mut job = CountJob::new(1);
    job.fail = true;
    let id = queue.enqueue(job, TimeBudget::Unlimited);

    queue.process();
    assert_eq!(queue.status(id), Some(JobStatus::Finished));
    assert_eq!(queue.exception(id).map(String::as_str), Some("boom"));
    assert_eq!(queue.result(id), None);
}

#[test]
fn take_leaves_unfinished_jobs_alone() {
    let mut queue = JobQueue::new(TimeBudget::Unlimited);
    let id = queue.enqueue(CountJob::new(5), TimeBudget::Steps(1));
    queue.process();
    assert_eq!(queue.take(id), None);
    assert_eq!(queue.len(), 1);
}

#[test]
fn queue_budget_caps_slices_and_rotates_fairly() {
    let mut queue = JobQueue::new(TimeBudget::Steps(2));
    let a = queue.enqueue(CountJob::new(100), TimeBudget::Steps(1));
    let b = queue.enqueue(CountJob::new(100), TimeBudget::Steps(1));
    let c = queue.enqueue(CountJob::new(100), TimeBudget::Steps(1));

    assert_eq!(queue.process(), 2);
    assert_eq!(queue.job(a).unwrap().count, 1);
    assert_eq!(queue.job(b).unwrap().count, 1);
    assert_eq!(queue.job(c).unwrap().count, 0);

    // The next call resumes where the last one stopped.
    assert_eq!(queue.process(), 2);
    assert_eq!(queue.job(c).unwrap().count, 1);
    assert_eq!(queue.job(a).unwrap().count, 2);
    assert_eq!(queue.job(b).unwrap().count, 1);
}

#[test]
fn removed_jobs_are_never_run() {
    let mut queue = JobQueue::new(TimeBudget::Unlimited);
    let id = queue.enqueue(CountJob::new(3), TimeBudget::Steps(1));
    assert!(queue.remove(id).is_some());
    assert_eq!(queue.process(), 0);
    assert_eq!(queue.status(id), None);
    assert_eq!(queue.queued(), 0);
}

#[test]
fn run_to_completion_ignores_slicing() {
    let mut job = CountJob::new(50);
    assert_eq!(run_to_completion(&mut job), Ok(50));
}

/// Counts up to `target`, sleeping `pause` per unit so wall-clock budgets run out.
struct SlowJob {
    count: u32,
    target: u32,
    pause: Duration,
    max_units_per_run: u32,
}

impl SlowJob {
    fn new(target: u32, pause: Duration) -> Self {
        Self {
            count: 0,
            target,
            pause,
            max_units_per_run: 0,
        }
    }
}

impl Job for SlowJob {
    type Output = u32;
    type Error = String;

    fn run(&mut self, slice: &mut Slice) -> JobPoll<Result<u32, String>> {
        let mut units = 0;
        loop {
            thread::sleep(self.pause);
            self.count += 1;
            units += 1;
            self.max_units_per_run = self.max_units_per_run.max(units);
            if self.count >= self.target {
                return JobPoll::Ready(Ok(self.count));
            }
            if slice.consume() {
                return JobPoll::Pending;
            }
        }
    }
}

#[test]
fn millis_budget_suspends_and_resumes() {
    let mut job = SlowJob::new(20, Duration::from_micros(300));

    let mut slice = TimeBudget::Millis(1.0).start();
    assert_eq!(job.run(&mut slice), JobPoll::Pending);
    assert!(slice.is_exhausted());
    assert!(job.count < 20);

    let mut runs = 1;
    let outcome = loop {
        let mut slice = TimeBudget::Millis(1.0).start();
        runs += 1;
        if let JobPoll::Ready(outcome) = job.run(&mut slice) {
            break outcome;
        }
    };
    assert_eq!(outcome, Ok(20));
    assert!(runs >= 5);
    // 4 sleeps of 300us always exceed 1ms.
    assert!(job.max_units_per_run <= 4);
}

#[test]
fn millis_budget_through_the_queue() {
    let mut queue = JobQueue::new(TimeBudget::Unlimited);
    let id = queue.enqueue(SlowJob::new(10, Duration::from_micros(500)), TimeBudget::Millis(1.0));

    queue.process();
    assert_eq!(queue.status(id), Some(JobStatus::Running));
    assert!(queue.job(id).unwrap().max_units_per_run <= 2);

    while queue.status(id) != Some(JobStatus::Finished) {
        queue.process();
    }
    assert_eq!(queue.result(id), Some(&10));
}

#[test]
fn queue_millis_budget_stops_after_spent_slice() {
    let mut queue = JobQueue::new(TimeBudget::Millis(1.0));
    let a = queue.enqueue(SlowJob::new(5, Duration::from_millis(2)), TimeBudget::Steps(1));
    let b = queue.enqueue(SlowJob::new(5, Duration::from_millis(2)), TimeBudget::Steps(1));

    assert_eq!(queue.process(), 1);
    assert_eq!(queue.job(a).unwrap().count, 1);
    assert_eq!(queue.job(b).unwrap().count, 0);

    assert_eq!(queue.process(), 1);
    assert_eq!(queue.job(b).unwrap().count, 1);
}

#[test]
fn invalid_millis_budget_allows_one_unit() {
    for ms in [f64::NAN, -5.0, 0.0] {
        let mut slice = TimeBudget::Millis(ms).start();
        assert!(slice.consume(), "{ms} should be spent after one unit");

        let mut queue = JobQueue::new(TimeBudget::Unlimited);
        let id = queue.enqueue(CountJob::new(5), TimeBudget::Millis(ms));
        queue.process();
        assert_eq!(queue.job(id).unwrap().max_units_per_run, 1);
        assert_eq!(queue.status(id), Some(JobStatus::Running));
    }
}

#[test]
fn oversized_millis_budget_never_runs_out() {
    for ms in [f64::MAX, f64::INFINITY] {
        let mut slice = TimeBudget::Millis(ms).start();
        for _ in 0..1_000 {
            assert!(!slice.consume());
        }
    }

    let mut queue = JobQueue::new(TimeBudget::Unlimited);
    let id = queue.enqueue(CountJob::new(200), TimeBudget::Millis(f64::MAX));
    queue.process();
    assert_eq!(queue.result(id), Some(&200));
}
