//! Worker pool with a blocking join barrier
//!
//! Render passes submit an open-ended set of tasks (one per large triangle
//! or per scene slice) and then wait for all of them. The manager keeps an
//! outstanding-task counter next to a condition variable:
//!
//! ```text
//! init_tasks -> new_task (count += 1) ... task ends (count -= 1) -> join (count == 0)
//! ```
//!
//! Every task decrements the counter through a drop guard, so a panicking
//! task still releases `join`. Panics are caught and reported through
//! [`TaskManager::join`] instead of unwinding into the pool.

use crate::error::RenderError;
use crate::image_mutex::ImageMutex;
use pgl_core::logging::{log, LogCategory, LogLevel};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct TaskManager {
    nb_threads: usize,
    /// Run every task on the submitting thread
    inline: bool,
    pool: OnceLock<rayon::ThreadPool>,
    outstanding: Mutex<usize>,
    completed: Condvar,
    failures: Mutex<Vec<String>>,
    image_mutex: Mutex<Option<Arc<ImageMutex>>>,
}

/// Ends its task when dropped, including during unwinding
struct TaskGuard<'a>(&'a TaskManager);

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.0.end_task();
    }
}

impl TaskManager {
    /// Hardware concurrency + 1 worker threads
    pub fn new() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_threads(cores + 1)
    }

    pub fn with_threads(nb_threads: usize) -> Self {
        Self::build(nb_threads.max(1), false)
    }

    /// Deterministic stand-in running each task to completion inside
    /// [`TaskManager::new_task`]
    pub fn inline() -> Self {
        Self::build(1, true)
    }

    fn build(nb_threads: usize, inline: bool) -> Self {
        Self {
            nb_threads,
            inline,
            pool: OnceLock::new(),
            outstanding: Mutex::new(0),
            completed: Condvar::new(),
            failures: Mutex::new(Vec::new()),
            image_mutex: Mutex::new(None),
        }
    }

    /// Process-wide default instance
    pub fn shared() -> Arc<TaskManager> {
        static INSTANCE: OnceLock<Arc<TaskManager>> = OnceLock::new();
        Arc::clone(INSTANCE.get_or_init(|| Arc::new(TaskManager::new())))
    }

    pub fn nb_threads(&self) -> usize {
        self.nb_threads
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// Tasks submitted and not yet finished
    pub fn outstanding(&self) -> usize {
        *lock(&self.outstanding)
    }

    /// Start a pass: create the pool on first use and reset the counters
    pub fn init_tasks(&self) -> Result<(), RenderError> {
        if !self.inline && self.pool.get().is_none() {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.nb_threads)
                .thread_name(|i| format!("pgl-raster-{}", i))
                .build()?;
            if self.pool.set(pool).is_ok() {
                log(LogCategory::Tasks, LogLevel::Info, || {
                    format!("Render pool started with {} threads", self.nb_threads)
                });
            }
        }

        let mut outstanding = lock(&self.outstanding);
        if *outstanding != 0 {
            log(LogCategory::Tasks, LogLevel::Warn, || {
                format!(
                    "init_tasks called with {} task(s) still running, counter reset",
                    *outstanding
                )
            });
        }
        *outstanding = 0;
        lock(&self.failures).clear();
        Ok(())
    }

    /// Submit a task
    ///
    /// Without a pool (before the first `init_tasks`, or for an inline
    /// manager) the task runs immediately on the calling thread.
    pub fn new_task<F>(self: &Arc<Self>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *lock(&self.outstanding) += 1;

        let manager = Arc::clone(self);
        let run = move || {
            let _guard = TaskGuard(&manager);
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                manager.record_failure(panic_message(payload.as_ref()));
            }
        };

        match self.pool.get() {
            Some(pool) if !self.inline => pool.spawn(run),
            _ => run(),
        }
    }

    fn end_task(&self) {
        let mut outstanding = lock(&self.outstanding);
        match outstanding.checked_sub(1) {
            Some(n) => *outstanding = n,
            None => log(LogCategory::Tasks, LogLevel::Error, || {
                "end_task called with no task outstanding".to_string()
            }),
        }
        if *outstanding == 0 {
            self.completed.notify_all();
        }
    }

    fn record_failure(&self, message: String) {
        log(LogCategory::Tasks, LogLevel::Error, || {
            format!("Render task panicked: {}", message)
        });
        lock(&self.failures).push(message);
    }

    /// Block until every submitted task has finished
    ///
    /// Returns [`RenderError::TaskFailed`] if any of them panicked.
    pub fn join(&self) -> Result<(), RenderError> {
        let mut outstanding = lock(&self.outstanding);
        while *outstanding > 0 {
            outstanding = self
                .completed
                .wait(outstanding)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(outstanding);

        let failures = std::mem::take(&mut *lock(&self.failures));
        match failures.first() {
            None => Ok(()),
            Some(first) => Err(RenderError::TaskFailed {
                failed: failures.len(),
                first: first.clone(),
            }),
        }
    }

    /// Pixel lock partition for an image of the given size
    ///
    /// The partition is cached and only replaced when a larger image or a
    /// different tile size asks for it.
    pub fn image_mutex(&self, width: u32, height: u32, tile_size: u32) -> Arc<ImageMutex> {
        let mut cached = lock(&self.image_mutex);
        match cached.as_ref() {
            Some(m) if m.covers(width, height) && m.tile_size() == tile_size.max(1) => {
                Arc::clone(m)
            }
            _ => {
                let m = Arc::new(ImageMutex::new(width, height, tile_size));
                log(LogCategory::Tasks, LogLevel::Debug, || {
                    format!(
                        "Image mutex for {}x{}: {} tile(s) of {}px",
                        width,
                        height,
                        m.tile_count(),
                        m.tile_size()
                    )
                });
                *cached = Some(Arc::clone(&m));
                m
            }
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("nb_threads", &self.nb_threads)
            .field("inline", &self.inline)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_thread_count_policy() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(TaskManager::new().nb_threads(), cores + 1);
        assert_eq!(TaskManager::with_threads(0).nb_threads(), 1);
    }

    #[test]
    fn test_join_without_tasks() {
        let tasks = TaskManager::with_threads(2);
        tasks.init_tasks().unwrap();
        assert!(tasks.join().is_ok());
        assert_eq!(tasks.outstanding(), 0);
    }

    #[test]
    fn test_join_waits_for_tasks() {
        let tasks = Arc::new(TaskManager::with_threads(4));
        tasks.init_tasks().unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..32 {
            let done = Arc::clone(&done);
            tasks.new_task(move || {
                std::thread::sleep(Duration::from_millis((i % 5) as u64));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        tasks.join().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 32);
        assert_eq!(tasks.outstanding(), 0);
    }

    #[test]
    fn test_tasks_may_spawn_tasks() {
        let tasks = Arc::new(TaskManager::with_threads(3));
        tasks.init_tasks().unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let inner_tasks = Arc::clone(&tasks);
            let done = Arc::clone(&done);
            tasks.new_task(move || {
                for _ in 0..4 {
                    let done = Arc::clone(&done);
                    inner_tasks.new_task(move || {
                        done.fetch_add(1, Ordering::SeqCst);
                    });
                }
            });
        }
        tasks.join().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_panicking_task_is_reported() {
        let tasks = Arc::new(TaskManager::with_threads(2));
        tasks.init_tasks().unwrap();
        tasks.new_task(|| panic!("bad triangle"));
        tasks.new_task(|| {});

        match tasks.join() {
            Err(RenderError::TaskFailed { failed, first }) => {
                assert_eq!(failed, 1);
                assert!(first.contains("bad triangle"), "{}", first);
            }
            other => panic!("expected TaskFailed, got {:?}", other),
        }
        assert_eq!(tasks.outstanding(), 0);
        // The failure is consumed by the join that reported it
        assert!(tasks.join().is_ok());
    }

    #[test]
    fn test_inline_runs_immediately() {
        let tasks = Arc::new(TaskManager::inline());
        tasks.init_tasks().unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        tasks.new_task(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.outstanding(), 0);
        assert!(tasks.join().is_ok());
    }

    #[test]
    fn test_image_mutex_is_cached_and_grows() {
        let tasks = TaskManager::inline();
        let a = tasks.image_mutex(64, 64, 8);
        let b = tasks.image_mutex(32, 32, 8);
        assert!(Arc::ptr_eq(&a, &b));
        let c = tasks.image_mutex(128, 64, 8);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.width(), 128);
        let d = tasks.image_mutex(16, 16, 4);
        assert_eq!(d.tile_size(), 4);
    }
}
