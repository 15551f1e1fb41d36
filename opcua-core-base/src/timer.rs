//! Repeating and delayed callbacks over the tokio runtime.
//!
//! The server registers one repeating callback per publishing interval and
//! per sampling interval, plus the async method manager's two integrity
//! intervals. A callback runs to completion on each firing; cancellation is
//! dropping the returned guard.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Guard for a scheduled callback. Dropping it cancels the schedule.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Schedule `callback` to run every `interval`, first firing one interval
/// from now. Must be called within a tokio runtime.
pub fn repeating(interval: Duration, mut callback: impl FnMut() + Send + 'static) -> TimerHandle {
    // An interval of zero would make tokio fire continuously
    let interval = interval.max(Duration::from_millis(1));
    let task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            callback();
        }
    });
    TimerHandle { task }
}

/// Schedule `callback` to run once after `delay`. Must be called within a
/// tokio runtime.
pub fn delayed(delay: Duration, callback: impl FnOnce() + Send + 'static) -> TimerHandle {
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        callback();
    });
    TimerHandle { task }
}
