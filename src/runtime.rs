//! Runtime abstraction for background work
//!
//! The tile layer needs exactly one recurring job, the housekeeping sweep.
//! With the `tokio-runtime` feature and a runtime on the current thread it is
//! a tokio task; otherwise [`spawn_repeating`] returns `None` and the caller
//! falls back to sweeping on its own schedule.

use std::time::Duration;

/// Handle to a spawned background task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Runs `job` every `period`, starting one period from now.
///
/// Returns `None` when no async runtime is available.
pub fn spawn_repeating<F>(period: Duration, job: F) -> Option<Box<dyn AsyncHandle>>
where
    F: FnMut() + Send + 'static,
{
    #[cfg(feature = "tokio-runtime")]
    {
        tokio_impl::RepeatingTask::spawn(period, job)
            .map(|task| Box::new(task) as Box<dyn AsyncHandle>)
    }

    #[cfg(not(feature = "tokio-runtime"))]
    {
        let _ = (period, job);
        None
    }
}

#[cfg(feature = "tokio-runtime")]
pub mod tokio_impl {
    use super::AsyncHandle;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::MissedTickBehavior;

    /// Interval driven tokio task, aborted when dropped
    pub struct RepeatingTask {
        handle: JoinHandle<()>,
    }

    impl RepeatingTask {
        pub fn spawn<F>(period: Duration, mut job: F) -> Option<Self>
        where
            F: FnMut() + Send + 'static,
        {
            let runtime = tokio::runtime::Handle::try_current().ok()?;
            let period = period.max(Duration::from_millis(1));
            let handle = runtime.spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the first tick completes immediately
                interval.tick().await;
                loop {
                    interval.tick().await;
                    job();
                }
            });
            Some(Self { handle })
        }
    }

    impl AsyncHandle for RepeatingTask {
        fn is_finished(&self) -> bool {
            self.handle.is_finished()
        }

        fn cancel(&self) {
            self.handle.abort();
        }
    }

    impl Drop for RepeatingTask {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }
}
