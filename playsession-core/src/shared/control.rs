//! Host/worker pause-stop coordination (spec §4.3, §9 "cooperation point").
//!
//! `RequestPause` is the one host-side call that blocks; it drains a
//! capacity-1 ack channel the worker sends into from its single cooperation
//! point, `check_pause`. Condition variables are deliberately avoided per the
//! design notes (spec §9) in favor of a bounded channel plus a short spin-sleep.

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const SPIN_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct EmuControl {
    running: AtomicBool,
    pause_requested: AtomicBool,
    paused: AtomicBool,
    stop_requested: AtomicBool,
    ack_tx: Sender<()>,
    ack_rx: Mutex<Receiver<()>>,
}

impl Default for EmuControl {
    fn default() -> Self {
        Self::new()
    }
}

impl EmuControl {
    pub fn new() -> Self {
        let (ack_tx, ack_rx) = bounded(1);
        Self {
            running: AtomicBool::new(true),
            pause_requested: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            ack_tx,
            ack_rx: Mutex::new(ack_rx),
        }
    }

    /// Blocks until the worker has observed the request and transitioned to
    /// `Paused` (ack drained). Idempotent: a no-op if already paused.
    pub fn request_pause(&self) {
        if self.paused.load(Ordering::Acquire) || self.stop_requested.load(Ordering::Acquire) {
            return;
        }
        self.pause_requested.store(true, Ordering::Release);
        let rx = self.ack_rx.lock();
        // An Err here means the sender was dropped, which this type never does;
        // a `Stop` instead sends a sentinel ack so this always unblocks.
        let _ = rx.recv();
    }

    /// Clears the pause request/flag so the worker resumes on its next
    /// `check_pause` call.
    pub fn request_resume(&self) {
        self.pause_requested.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
    }

    /// Sets `running = false` and clears `pause_requested` so a currently
    /// paused worker can observe stop and exit; unblocks any thread waiting
    /// in `request_pause`.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.stop_requested.store(true, Ordering::Release);
        self.pause_requested.store(false, Ordering::Release);
        let _ = self.ack_tx.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.stop_requested.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// The worker's single cooperation point. Returns `false` when the worker
    /// loop should terminate.
    pub fn check_pause(&self) -> bool {
        if self.stop_requested.load(Ordering::Acquire) {
            return false;
        }
        if self.pause_requested.load(Ordering::Acquire) {
            self.paused.store(true, Ordering::Release);
            let _ = self.ack_tx.try_send(());
            while self.paused.load(Ordering::Acquire) && !self.stop_requested.load(Ordering::Acquire) {
                std::thread::sleep(SPIN_SLEEP);
            }
            if self.stop_requested.load(Ordering::Acquire) {
                return false;
            }
        }
        self.running.load(Ordering::Acquire)
    }
}
