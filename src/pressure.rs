//! Memory pressure notifications.
//!
//! A [`PressureMonitor`] owns one dispatch thread. Signal sources push
//! [`PressureLevel`] events through a [`PressureSignal`]; the thread hands
//! them to a [`PressureHandler`] one at a time, so handler calls never
//! overlap. [`BufferPool`] implements the handler by releasing half of its
//! buffers on a warning and all of them on a critical event.
//!
//! Sources spawned while the monitor runs see its stop request through the
//! signal and are joined by [`PressureMonitor::stop`].

use std::{
    fs,
    path::PathBuf,
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::{buffer_pool::BufferPool, error::DicomError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PressureLevel {
    Warning,
    Critical,
}

pub trait PressureHandler: Send + Sync {
    fn on_warning(&self);
    fn on_critical(&self);
}

impl PressureHandler for BufferPool {
    fn on_warning(&self) {
        let evicted = self.release_half();
        info!(evicted, "memory pressure warning, released half of pooled buffers");
    }

    fn on_critical(&self) {
        let evicted = self.clear();
        warn!(evicted, "critical memory pressure, cleared buffer pool");
    }
}

enum Message {
    Pressure(PressureLevel),
    Shutdown,
}

#[derive(Default)]
struct StopFlag {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopFlag {
    fn raise(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }
}

/// Cloneable sender handed to signal sources.
#[derive(Clone)]
pub struct PressureSignal {
    sender: mpsc::Sender<Message>,
    stop: Arc<StopFlag>,
}

impl PressureSignal {
    /// Queue an event. Returns `false` once the monitor has stopped.
    pub fn notify(&self, level: PressureLevel) -> bool {
        !self.is_stopped() && self.sender.send(Message::Pressure(level)).is_ok()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.stopped.lock()
    }

    /// Sleep for `timeout` or until the monitor stops. Returns `true` if it
    /// has stopped.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let mut stopped = self.stop.stopped.lock();
        if !*stopped {
            let _ = self.stop.wake.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

struct Running {
    sender: mpsc::Sender<Message>,
    stop: Arc<StopFlag>,
    worker: thread::JoinHandle<()>,
    sources: Vec<thread::JoinHandle<()>>,
}

pub struct PressureMonitor {
    handler: Arc<dyn PressureHandler>,
    running: Mutex<Option<Running>>,
}

impl PressureMonitor {
    pub fn new(handler: Arc<dyn PressureHandler>) -> Self {
        Self {
            handler,
            running: Mutex::new(None),
        }
    }

    /// Spawn the dispatch thread. Does nothing if it is already running.
    pub fn start(&self) -> Result<(), DicomError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let (sender, receiver) = mpsc::channel();
        let handler = self.handler.clone();
        let worker = thread::Builder::new()
            .name("pressure-monitor".to_string())
            .spawn(move || {
                for message in receiver {
                    match message {
                        Message::Pressure(PressureLevel::Warning) => handler.on_warning(),
                        Message::Pressure(PressureLevel::Critical) => handler.on_critical(),
                        Message::Shutdown => break,
                    }
                }
                debug!("pressure monitor stopped");
            })
            .map_err(|err| {
                DicomError::Unknown(format!("failed to spawn pressure monitor: {err}"))
            })?;

        *running = Some(Running {
            sender,
            stop: Arc::new(StopFlag::default()),
            worker,
            sources: Vec::new(),
        });
        debug!("pressure monitor started");
        Ok(())
    }

    /// Stop attached sources, then wait for the dispatch thread to finish the
    /// events already queued. Does nothing if the monitor is not running.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        running.stop.raise();
        for source in running.sources {
            if source.join().is_err() {
                warn!("pressure source panicked");
            }
        }
        let _ = running.sender.send(Message::Shutdown);
        if running.worker.join().is_err() {
            warn!("pressure handler panicked");
        }
    }

    /// Poll the PSI file for as long as the monitor runs. The poller is
    /// joined by [`stop`](Self::stop).
    pub fn attach_psi_source(&self, config: PsiConfig) -> Result<(), DicomError> {
        let mut running = self.running.lock();
        let Some(running) = running.as_mut() else {
            return Err(DicomError::Unknown(
                "pressure monitor is not running".to_string(),
            ));
        };
        let signal = PressureSignal {
            sender: running.sender.clone(),
            stop: running.stop.clone(),
        };
        running.sources.push(spawn_psi_source(signal, config)?);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// A handle for feeding events in, `None` while stopped.
    pub fn signal(&self) -> Option<PressureSignal> {
        self.running.lock().as_ref().map(|running| PressureSignal {
            sender: running.sender.clone(),
            stop: running.stop.clone(),
        })
    }
}

impl Drop for PressureMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Thresholds for the Linux pressure stall information source.
#[derive(Clone, Debug)]
pub struct PsiConfig {
    pub path: PathBuf,
    pub interval: Duration,
    /// `some avg10` percentage at which a warning is raised.
    pub warning_avg10: f64,
    /// `full avg10` percentage at which a critical event is raised.
    pub critical_avg10: f64,
}

impl Default for PsiConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/proc/pressure/memory"),
            interval: Duration::from_secs(1),
            warning_avg10: 10.0,
            critical_avg10: 5.0,
        }
    }
}

/// Extract the `some` and `full` avg10 percentages from a PSI file.
pub fn parse_psi(text: &str) -> Option<(f64, f64)> {
    let avg10 = |prefix: &str| {
        text.lines()
            .find(|line| line.starts_with(prefix))?
            .split_whitespace()
            .find_map(|field| field.strip_prefix("avg10="))?
            .parse::<f64>()
            .ok()
    };
    Some((avg10("some")?, avg10("full").unwrap_or(0.0)))
}

impl PsiConfig {
    pub fn classify(&self, some_avg10: f64, full_avg10: f64) -> Option<PressureLevel> {
        if full_avg10 >= self.critical_avg10 {
            Some(PressureLevel::Critical)
        } else if some_avg10 >= self.warning_avg10 {
            Some(PressureLevel::Warning)
        } else {
            None
        }
    }
}

/// Poll the PSI file and forward level changes to `signal`.
///
/// The thread exits when the file cannot be read or the monitor behind
/// `signal` stops, which it notices within one wake-up.
pub fn spawn_psi_source(
    signal: PressureSignal,
    config: PsiConfig,
) -> Result<thread::JoinHandle<()>, DicomError> {
    thread::Builder::new()
        .name("psi-memory-source".to_string())
        .spawn(move || {
            let mut last = None;
            while !signal.is_stopped() {
                let text = match fs::read_to_string(&config.path) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(path = %config.path.display(), %err, "pressure stall information unavailable");
                        return;
                    }
                };
                let level = parse_psi(&text)
                    .and_then(|(some, full)| config.classify(some, full));
                if level != last {
                    if let Some(level) = level {
                        if !signal.notify(level) {
                            return;
                        }
                    }
                    last = level;
                }
                if signal.wait_stopped(config.interval) {
                    break;
                }
            }
            debug!("PSI source stopped");
        })
        .map_err(|err| DicomError::Unknown(format!("failed to spawn PSI source: {err}")))
}
