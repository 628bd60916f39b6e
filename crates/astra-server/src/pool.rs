//! Fixed-size worker pool ticking sessions in parallel.
//!
//! The main thread schedules a batch of `(session, dt)` tasks each server
//! tick, then blocks on [`SessionPool::wait_for_completion`] until every task
//! has run -- a simple barrier. Sessions share nothing, so per-tick work is
//! embarrassingly parallel; workers pop tasks under a mutex and tick the
//! session they drew.
//!
//! A panic inside a session tick does not kill the worker or the process:
//! the panic is caught, the session's mutex is poisoned by the unwind, and
//! the scheduler skips poisoned sessions from then on. The defective session
//! is quarantined; all others continue.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, error};

use crate::session::Session;

/// One unit of work: advance `session` by `dt` seconds.
pub struct SessionTask {
    pub session: Arc<Mutex<Session>>,
    pub dt: f32,
}

struct PoolShared {
    queue: Mutex<VecDeque<SessionTask>>,
    task_cv: Condvar,
    completion: Mutex<()>,
    completion_cv: Condvar,
    tasks_pending: AtomicUsize,
    tasks_completed: AtomicUsize,
    shutdown: AtomicBool,
}

pub struct SessionPool {
    workers: Vec<JoinHandle<()>>,
    shared: Arc<PoolShared>,
}

impl SessionPool {
    /// Spin up a pool with `num_workers` worker threads.
    pub fn new(num_workers: usize) -> Self {
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            task_cv: Condvar::new(),
            completion: Mutex::new(()),
            completion_cv: Condvar::new(),
            tasks_pending: AtomicUsize::new(0),
            tasks_completed: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });

        let workers = (0..num_workers)
            .map(|index| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("session-worker-{index}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn session worker")
            })
            .collect();

        debug!(workers = num_workers, "session pool started");
        Self { workers, shared }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a batch of tasks and wake the workers. Does not wait; pair with
    /// [`wait_for_completion`](Self::wait_for_completion).
    pub fn schedule_batch(&self, tasks: Vec<SessionTask>) {
        if tasks.is_empty() {
            return;
        }
        self.shared.tasks_completed.store(0, Ordering::Release);
        self.shared
            .tasks_pending
            .store(tasks.len(), Ordering::Release);
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.extend(tasks);
        }
        self.shared.task_cv.notify_all();
    }

    /// Block until every task from the last batch has completed.
    pub fn wait_for_completion(&self) {
        let mut guard = self.shared.completion.lock().unwrap();
        loop {
            let pending = self.shared.tasks_pending.load(Ordering::Acquire);
            let completed = self.shared.tasks_completed.load(Ordering::Acquire);
            if completed >= pending {
                return;
            }
            guard = self.shared.completion_cv.wait(guard).unwrap();
        }
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.task_cv.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("session pool shut down");
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                queue = shared.task_cv.wait(queue).unwrap();
            }
        };

        // The lock is taken inside the catch so a panicking tick poisons the
        // session's mutex on the way out; poisoned sessions are skipped on
        // later batches, and the barrier accounting stays honest either way.
        let session = task.session;
        let dt = task.dt;
        let result = catch_unwind(AssertUnwindSafe(|| match session.lock() {
            Ok(mut session) => {
                session.tick(dt);
                true
            }
            Err(_) => false,
        }));
        match result {
            Ok(true) => {}
            Ok(false) => debug!("skipping quarantined session"),
            Err(_) => error!("session tick panicked; session quarantined"),
        }

        let completed = shared.tasks_completed.fetch_add(1, Ordering::AcqRel) + 1;
        if completed >= shared.tasks_pending.load(Ordering::Acquire) {
            let _guard = shared.completion.lock().unwrap();
            shared.completion_cv.notify_one();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_session(id: u32) -> Arc<Mutex<Session>> {
        Arc::new(Mutex::new(Session::arena(id)))
    }

    #[test]
    fn barrier_waits_for_all_sessions() {
        let pool = SessionPool::new(4);
        let sessions: Vec<_> = (0..8).map(arena_session).collect();

        let tasks = sessions
            .iter()
            .map(|session| SessionTask {
                session: Arc::clone(session),
                dt: 0.03125,
            })
            .collect();
        pool.schedule_batch(tasks);
        pool.wait_for_completion();

        for session in &sessions {
            assert_eq!(session.lock().unwrap().tick_count(), 1);
        }
    }

    #[test]
    fn repeated_batches_advance_ticks() {
        let pool = SessionPool::new(2);
        let session = arena_session(1);

        for _ in 0..10 {
            pool.schedule_batch(vec![SessionTask {
                session: Arc::clone(&session),
                dt: 0.03125,
            }]);
            pool.wait_for_completion();
        }
        assert_eq!(session.lock().unwrap().tick_count(), 10);
    }

    #[test]
    fn empty_batch_returns_immediately() {
        let pool = SessionPool::new(2);
        pool.schedule_batch(Vec::new());
        pool.wait_for_completion();
    }

    #[test]
    fn poisoned_sessions_are_skipped_not_fatal() {
        let pool = SessionPool::new(2);
        let healthy = arena_session(1);
        let poisoned = arena_session(2);

        // Poison the second session's mutex.
        {
            let doomed = Arc::clone(&poisoned);
            let _ = std::thread::spawn(move || {
                let _guard = doomed.lock().unwrap();
                panic!("poison");
            })
            .join();
        }
        assert!(poisoned.lock().is_err());

        pool.schedule_batch(vec![
            SessionTask {
                session: Arc::clone(&healthy),
                dt: 0.03125,
            },
            SessionTask {
                session: Arc::clone(&poisoned),
                dt: 0.03125,
            },
        ]);
        pool.wait_for_completion();
        assert_eq!(healthy.lock().unwrap().tick_count(), 1);
    }
}
