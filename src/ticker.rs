//! Background thread driving [`VoiceManager::update`].

use crate::context::AudioContext;
use crate::error::{PetalVoiceError, Result};
use crate::manager::VoiceManager;
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Calls `update()` on a fixed interval until stopped or dropped.
pub struct UpdateTicker {
    stop_sender: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    ticks: Arc<AtomicUsize>,
}

impl UpdateTicker {
    pub fn start(
        ctx: Arc<AudioContext>,
        manager: Arc<VoiceManager>,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(PetalVoiceError::Configuration(
                "update interval must be greater than 0".to_string(),
            ));
        }

        let (stop_sender, stop_receiver) = bounded::<()>(1);
        let is_running = Arc::new(AtomicBool::new(true));
        let ticks = Arc::new(AtomicUsize::new(0));

        let thread_running = is_running.clone();
        let thread_ticks = ticks.clone();
        let handle = thread::Builder::new()
            .name("petalvoice-update".to_string())
            .spawn(move || {
                // The wait doubles as the stop signal: a message or a
                // dropped sender ends the loop.
                while let Err(RecvTimeoutError::Timeout) = stop_receiver.recv_timeout(interval) {
                    manager.update(&ctx);
                    thread_ticks.fetch_add(1, Ordering::Relaxed);
                }
                thread_running.store(false, Ordering::Relaxed);
            })
            .map_err(|e| PetalVoiceError::Engine(format!("Failed to spawn update thread: {}", e)))?;

        log::info!("Update ticker started ({:?} interval)", interval);

        Ok(Self {
            stop_sender: Some(stop_sender),
            handle: Some(handle),
            is_running,
            ticks,
        })
    }

    /// Stop the thread and wait for the sweep in progress to finish.
    pub fn stop(&mut self) {
        if let Some(sender) = self.stop_sender.take() {
            let _ = sender.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Update thread panicked");
            }
            self.is_running.store(false, Ordering::Relaxed);
            log::info!("Update ticker stopped after {} ticks", self.ticks());
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Number of completed sweeps.
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for UpdateTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
