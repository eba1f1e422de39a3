// Signal listener - serial polling loop, noise filtering, edge detection
//
// This module owns the serial line and the dedicated polling thread that
// turns it into confirmed transitions.
//
// Architecture:
// - SignalListener: lifecycle and configuration surface, held by the caller
// - ListenerWorker: polling loop on its own thread, owns the single-slot
//   previous-sample buffer
// - Dispatch: registered callbacks fire synchronously on the polling
//   thread, in registration order, before the next line is read
//
// Thread safety:
// - One mutex guards the port slot and the callback registry, the only
//   state shared with caller threads
// - running: AtomicBool observed once per loop iteration, so stop() joins
//   without holding the shared lock
// - tolerance: f64 bits in an AtomicU64

mod parse;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{log_port_error, PortError};
use crate::link::{ReadOutcome, SerialLink, DEFAULT_READ_TIMEOUT};

/// One decoded line of wire telemetry.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawSample {
    /// Numeric sensor channel identifier (fret position) as reported on
    /// the wire.
    pub code: f64,
    /// True when the line signals a press.
    pub active: bool,
}

/// A confirmed transition: same shape as [RawSample], but only emitted
/// after noise filtering and edge detection, at most once per accepted
/// transition.
pub type RawEvent = RawSample;

/// Callback invoked with each confirmed transition, on the polling thread.
pub type RawEventCallback = Box<dyn Fn(RawEvent) + Send + 'static>;

/// Upper bound of the edge-detection tolerance window.
pub const MAX_TOLERANCE: f64 = 0.5;

/// Default edge-detection tolerance.
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// State shared between caller threads and the polling worker.
struct ListenerShared {
    port: Option<Box<dyn SerialLink>>,
    callbacks: Vec<RawEventCallback>,
}

/// Serial-line listener with a dedicated polling thread.
///
/// Constructed idle: no thread, no port. `set_port` configures the serial
/// handle, `register_callback` adds consumers, `start` spawns the polling
/// loop, `stop` joins it. Callbacks receive every confirmed transition in
/// registration order; a slow callback stalls ingestion.
pub struct SignalListener {
    shared: Arc<Mutex<ListenerShared>>,
    running: Arc<AtomicBool>,
    tolerance_bits: Arc<AtomicU64>,
    read_timeout: Duration,
    worker: Option<JoinHandle<()>>,
}

impl SignalListener {
    /// Create an idle listener with the default tolerance and poll window.
    pub fn new() -> Self {
        Self::with_read_timeout(DEFAULT_READ_TIMEOUT)
    }

    /// Create an idle listener with a custom poll window for bounded
    /// reads. The window bounds stop() latency, not delivered-line
    /// latency.
    pub fn with_read_timeout(read_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ListenerShared {
                port: None,
                callbacks: Vec::new(),
            })),
            running: Arc::new(AtomicBool::new(false)),
            tolerance_bits: Arc::new(AtomicU64::new(DEFAULT_TOLERANCE.to_bits())),
            read_timeout,
            worker: None,
        }
    }

    /// Configure the serial port, opening it if necessary.
    ///
    /// Any previously held port is replaced and closed under the shared
    /// lock, so no two handles are ever owned at once.
    ///
    /// # Errors
    /// `PortError::CannotOpen` if the device does not exist or cannot be
    /// opened; the listener must not be started in that state.
    pub fn set_port(&self, mut link: Box<dyn SerialLink>) -> Result<(), PortError> {
        if !link.is_open() {
            link.open().map_err(|err| {
                let err = PortError::CannotOpen {
                    port: link.name().to_string(),
                    reason: err.to_string(),
                };
                log_port_error(&err, "set_port");
                err
            })?;
        }

        let mut shared = self.lock_shared("set_port")?;
        if let Some(mut old) = shared.port.take() {
            if let Err(err) = old.close() {
                warn!(
                    "[SignalListener] failed to close replaced port {}: {}",
                    old.name(),
                    err
                );
            }
        }
        info!("[SignalListener] port {} configured", link.name());
        shared.port = Some(link);
        Ok(())
    }

    /// Register a callback for confirmed transitions.
    ///
    /// Multiple registrations are permitted; all callbacks are invoked on
    /// every accepted edge, in registration order, on the polling thread.
    pub fn register_callback<F>(&self, callback: F) -> Result<(), PortError>
    where
        F: Fn(RawEvent) + Send + 'static,
    {
        let mut shared = self.lock_shared("register_callback")?;
        shared.callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Set the edge-detection tolerance.
    ///
    /// Values above 0.5 pin to 0.5, values below 0 pin to 0, NaN is
    /// ignored. Setup-time only by convention; the polling loop reads the
    /// current value per line.
    pub fn set_tolerance(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        let clamped = value.clamp(0.0, MAX_TOLERANCE);
        self.tolerance_bits.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Current edge-detection tolerance.
    pub fn tolerance(&self) -> f64 {
        f64::from_bits(self.tolerance_bits.load(Ordering::Relaxed))
    }

    /// Whether the polling thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the polling thread. Returns immediately.
    ///
    /// No-op if already running: at most one polling thread is alive per
    /// listener.
    ///
    /// # Errors
    /// `PortError::NotConfigured` if no port was set.
    pub fn start(&mut self) -> Result<(), PortError> {
        if self.running.load(Ordering::SeqCst) {
            debug!("[SignalListener] start ignored, already running");
            return Ok(());
        }

        {
            let shared = self.lock_shared("start")?;
            if shared.port.is_none() {
                let err = PortError::NotConfigured;
                log_port_error(&err, "start");
                return Err(err);
            }
        }

        // Reap a worker that exited on its own (port closed/disconnected).
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.running.store(true, Ordering::SeqCst);
        let worker = ListenerWorker {
            shared: Arc::clone(&self.shared),
            running: Arc::clone(&self.running),
            tolerance_bits: Arc::clone(&self.tolerance_bits),
            read_timeout: self.read_timeout,
            previous: None,
        };
        self.worker = Some(thread::spawn(move || worker.run()));
        info!("[SignalListener] polling thread started");
        Ok(())
    }

    /// Stop the polling thread, joining it before returning.
    ///
    /// Safe to call when not running. The port stays open so the listener
    /// can be restarted; use [close](Self::close) for full teardown.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("[SignalListener] polling thread panicked");
            }
            info!("[SignalListener] polling thread stopped");
        }
    }

    /// Stop the polling thread and close the port.
    pub fn close(&mut self) {
        self.stop();
        match self.shared.lock() {
            Ok(mut shared) => {
                if let Some(mut port) = shared.port.take() {
                    let name = port.name().to_string();
                    if let Err(err) = port.close() {
                        warn!("[SignalListener] failed to close port {}: {}", name, err);
                    } else {
                        info!("[SignalListener] port {} closed", name);
                    }
                }
            }
            Err(_) => {
                log::error!("[SignalListener] shared state lock poisoned in close");
            }
        }
    }

    fn lock_shared(&self, context: &str) -> Result<MutexGuard<'_, ListenerShared>, PortError> {
        self.shared.lock().map_err(|_| {
            let err = PortError::LockPoisoned {
                component: "listener".to_string(),
            };
            log_port_error(&err, context);
            err
        })
    }
}

impl Default for SignalListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Polling loop state. Runs on the dedicated thread until the running
/// flag clears or the port goes away.
struct ListenerWorker {
    shared: Arc<Mutex<ListenerShared>>,
    running: Arc<AtomicBool>,
    tolerance_bits: Arc<AtomicU64>,
    read_timeout: Duration,
    /// Single-slot previous-sample buffer. Owned by the loop, overwritten
    /// per accepted line, never shared.
    previous: Option<RawSample>,
}

impl ListenerWorker {
    fn run(mut self) {
        tracing::info!("[ListenerWorker] polling loop started");

        while self.running.load(Ordering::SeqCst) {
            let outcome = {
                let mut shared = match self.shared.lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        tracing::error!("[ListenerWorker] shared state lock poisoned, exiting");
                        break;
                    }
                };
                let Some(port) = shared.port.as_mut() else {
                    tracing::info!("[ListenerWorker] port removed, exiting");
                    break;
                };
                if !port.is_open() {
                    tracing::info!("[ListenerWorker] port {} closed, exiting", port.name());
                    break;
                }
                match port.read_line(self.read_timeout) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        tracing::warn!("[ListenerWorker] read failed: {}, exiting", err);
                        break;
                    }
                }
            };

            let bytes = match outcome {
                ReadOutcome::Line(bytes) => bytes,
                // Idle line; re-check the running flag.
                ReadOutcome::TimedOut => continue,
                ReadOutcome::Disconnected => {
                    tracing::info!("[ListenerWorker] device disconnected, exiting");
                    break;
                }
            };

            // Noise lines drop here and leave the previous sample as-is.
            let Some(sample) = parse::decode_line(&bytes) else {
                tracing::trace!("[ListenerWorker] dropped noise line ({} bytes)", bytes.len());
                continue;
            };

            if let Some(previous) = self.previous {
                let tolerance = f64::from_bits(self.tolerance_bits.load(Ordering::Relaxed));
                // Strict < on the window; equal distance is not an edge.
                if (previous.code - sample.code).abs() < tolerance
                    && previous.active != sample.active
                {
                    self.dispatch(sample);
                }
            }

            // Overwritten whether or not an edge fired.
            self.previous = Some(sample);
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("[ListenerWorker] polling loop exited");
    }

    fn dispatch(&self, event: RawEvent) {
        let shared = match self.shared.lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::error!("[ListenerWorker] shared state lock poisoned, event dropped");
                return;
            }
        };
        for callback in &shared.callbacks {
            callback(event);
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
