// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Fixed-rate repeating task on a dedicated thread.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// One scheduled firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Zero-based firing count.
    pub index: u64,
    /// The absolute deadline this firing was scheduled for.
    pub deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Do not schedule further firings.
    Stop,
}

/// Repeating action with drift-free deadlines.
///
/// Firing `k` is scheduled at `origin + (k + 1) * interval`, independent of
/// how long earlier firings took. Only one firing runs at a time.
pub struct Poller {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    executing: Arc<AtomicBool>,
    fired: Arc<AtomicU64>,
    origin: Instant,
    interval: Duration,
}

impl Poller {
    pub fn start<F>(interval: Duration, mut action: F) -> Self
    where
        F: FnMut(Tick) -> TickOutcome + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let executing = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicU64::new(0));
        let origin = Instant::now();

        let thread_executing = executing.clone();
        let thread_fired = fired.clone();
        let handle = std::thread::spawn(move || {
            let mut index = 0u64;
            let mut deadline = origin + interval;
            loop {
                match stop_rx.recv_deadline(deadline) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                thread_executing.store(true, Ordering::SeqCst);
                let outcome = action(Tick { index, deadline });
                thread_executing.store(false, Ordering::SeqCst);
                thread_fired.fetch_add(1, Ordering::SeqCst);

                if outcome == TickOutcome::Stop {
                    tracing::debug!("Poller stopped by its action after {} ticks", index + 1);
                    break;
                }
                index += 1;
                deadline += interval;
            }
        });

        tracing::debug!("Poller started with interval {:?}", interval);
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            executing,
            fired,
            origin,
            interval,
        }
    }

    /// Cancels the next firing. An in-flight firing runs to completion.
    pub fn stop(&mut self) {
        // Dropping the sender wakes the worker with `Disconnected`.
        self.stop_tx.take();
    }

    /// Whether the action is running right now.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Whether further firings may still happen.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Completed firings so far.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the worker has exited.
    ///
    /// Without a prior [`Poller::stop`] this returns only once the action
    /// asks to stop. There is no timeout: a stuck firing blocks here.
    pub fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Poller action panicked");
            }
        }
    }

    /// Stops and waits for the in-flight firing, if any.
    pub fn shutdown(&mut self) {
        self.stop();
        self.wait();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_stop_prevents_future_ticks() {
        let mut poller = Poller::start(Duration::from_millis(5), |_| TickOutcome::Continue);
        std::thread::sleep(Duration::from_millis(30));
        poller.shutdown();
        let fired = poller.fired();
        assert!(fired >= 1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(poller.fired(), fired);
        assert!(!poller.is_running());
    }

    #[test]
    fn test_action_can_stop_itself() {
        let mut poller = Poller::start(Duration::from_millis(1), |tick| {
            if tick.index == 2 {
                TickOutcome::Stop
            } else {
                TickOutcome::Continue
            }
        });
        poller.wait();
        assert_eq!(poller.fired(), 3);
    }

    #[test]
    fn test_shutdown_waits_for_in_flight_tick() {
        let done = Arc::new(Mutex::new(false));
        let flag = done.clone();
        let mut poller = Poller::start(Duration::from_millis(1), move |_| {
            std::thread::sleep(Duration::from_millis(50));
            *flag.lock().unwrap() = true;
            TickOutcome::Continue
        });

        while !poller.is_executing() {
            std::thread::sleep(Duration::from_millis(1));
        }
        poller.shutdown();
        assert!(!poller.is_executing());
        assert!(*done.lock().unwrap());
    }
}
