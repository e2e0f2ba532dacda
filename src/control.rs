//! Cooperative execution control: pause, resume, and interrupt.
//!
//! Evaluation runs on the caller's thread; a [`ControlHandle`] is the only
//! part of the interpreter that crosses threads. Every call site in the
//! evaluator is a checkpoint: a paused program parks there until resumed,
//! and an interrupted program fails with [`Error::Interrupted`] which
//! propagates out of `execute`. The `wait` builtin parks on the same signal
//! so an interrupt aborts an in-flight delay immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::Error;

/// What a checkpoint observed. `Resumed` means the program parked on a pause
/// and has just been woken; the interpreter reports that to its observers.
#[derive(Debug, PartialEq)]
pub(crate) enum Checkpoint {
    Proceed,
    Resumed,
}

struct ControlState {
    running: AtomicBool,
    break_requested: AtomicBool,
    paused: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

/// Clone-able, thread-safe handle driving a single interpreter's execution.
#[derive(Clone)]
pub struct ControlHandle {
    state: Arc<ControlState>,
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlHandle {
    pub fn new() -> Self {
        ControlHandle {
            state: Arc::new(ControlState {
                running: AtomicBool::new(false),
                break_requested: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                lock: Mutex::new(()),
                signal: Condvar::new(),
            }),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.state.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Request a pause. Takes effect at the next checkpoint; an in-flight
    /// `wait` completes first.
    pub fn pause(&self) {
        let _g = self.guard();
        self.state.paused.store(true, Ordering::SeqCst);
    }

    /// Resume a paused program.
    pub fn resume(&self) {
        let _g = self.guard();
        self.state.paused.store(false, Ordering::SeqCst);
        self.state.signal.notify_all();
    }

    /// Request a break. The next checkpoint fails with
    /// [`Error::Interrupted`]; a paused program is woken so the error can
    /// actually be raised, and an in-flight `wait` is cut short.
    pub fn interrupt(&self) {
        let _g = self.guard();
        self.state.break_requested.store(true, Ordering::SeqCst);
        self.state.signal.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    /// Claim the running flag for a new program. Fails if a program is
    /// already active. Clears stale pause/break state from a previous run.
    pub(crate) fn try_begin(&self) -> Result<(), Error> {
        let _g = self.guard();
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }
        self.state.break_requested.store(false, Ordering::SeqCst);
        self.state.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Drop the running flag and all pending pause/break state.
    pub(crate) fn finish(&self) {
        let _g = self.guard();
        self.state.running.store(false, Ordering::SeqCst);
        self.state.break_requested.store(false, Ordering::SeqCst);
        self.state.paused.store(false, Ordering::SeqCst);
        self.state.signal.notify_all();
    }

    /// The suspension point: fail on a pending break, park while paused.
    pub(crate) fn checkpoint(&self) -> Result<Checkpoint, Error> {
        if self.state.break_requested.load(Ordering::SeqCst) {
            return Err(Error::Interrupted);
        }
        if !self.state.paused.load(Ordering::SeqCst) {
            return Ok(Checkpoint::Proceed);
        }

        let mut guard = self.guard();
        let mut parked = false;
        while self.state.paused.load(Ordering::SeqCst)
            && !self.state.break_requested.load(Ordering::SeqCst)
        {
            parked = true;
            guard = self
                .state
                .signal
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner());
        }
        drop(guard);

        if self.state.break_requested.load(Ordering::SeqCst) {
            return Err(Error::Interrupted);
        }
        Ok(if parked {
            Checkpoint::Resumed
        } else {
            Checkpoint::Proceed
        })
    }

    /// Sleep for `duration`, returning early with [`Error::Interrupted`]
    /// when a break arrives. A pause does not cut the sleep short.
    pub(crate) fn wait_interruptible(&self, duration: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + duration;
        let mut guard = self.guard();
        loop {
            if self.state.break_requested.load(Ordering::SeqCst) {
                return Err(Error::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let (g, _) = self
                .state
                .signal
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = g;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_try_begin_rejects_reentry() {
        let control = ControlHandle::new();
        control.try_begin().unwrap();
        assert_eq!(control.try_begin(), Err(Error::AlreadyRunning));
        control.finish();
        control.try_begin().unwrap();
    }

    #[test]
    fn test_finish_clears_pending_state() {
        let control = ControlHandle::new();
        control.try_begin().unwrap();
        control.pause();
        control.interrupt();
        control.finish();
        assert!(!control.is_running());
        assert!(!control.is_paused());
        assert_eq!(control.checkpoint().unwrap(), Checkpoint::Proceed);
    }

    #[test]
    fn test_checkpoint_fails_after_interrupt() {
        let control = ControlHandle::new();
        control.interrupt();
        assert_eq!(control.checkpoint(), Err(Error::Interrupted));
    }

    #[test]
    fn test_pause_parks_until_resume() {
        let control = ControlHandle::new();
        control.pause();
        let worker = {
            let control = control.clone();
            thread::spawn(move || control.checkpoint())
        };
        // Give the worker time to park, then release it.
        thread::sleep(Duration::from_millis(50));
        control.resume();
        assert_eq!(worker.join().unwrap().unwrap(), Checkpoint::Resumed);
    }

    #[test]
    fn test_interrupt_wakes_paused_program() {
        let control = ControlHandle::new();
        control.pause();
        let worker = {
            let control = control.clone();
            thread::spawn(move || control.checkpoint())
        };
        thread::sleep(Duration::from_millis(50));
        control.interrupt();
        assert_eq!(worker.join().unwrap(), Err(Error::Interrupted));
    }

    #[test]
    fn test_interrupt_cuts_wait_short() {
        let control = ControlHandle::new();
        let worker = {
            let control = control.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let result = control.wait_interruptible(Duration::from_secs(10));
                (result, started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(50));
        control.interrupt();
        let (result, elapsed) = worker.join().unwrap();
        assert_eq!(result, Err(Error::Interrupted));
        assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
    }

    #[test]
    fn test_wait_completes_without_interrupt() {
        let control = ControlHandle::new();
        control
            .wait_interruptible(Duration::from_millis(10))
            .unwrap();
    }
}
