//! # Scan Controller
//!
//! Owns the camera/decoder for the checkout screen.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ScanController States                             │
//! │                                                                         │
//! │            scan()                 acquired                              │
//! │   ┌──────┐ ──────► ┌──────────┐ ──────────► ┌────────┐                  │
//! │   │ Idle │         │ Starting │             │ Active │ ◄─┐ NoDecode      │
//! │   └──────┘ ◄────── └──────────┘             └────────┘ ──┘ (ignored)     │
//! │      ▲   acquire failed │ stop()/teardown()     │                        │
//! │      │   (DeviceError)  ▼ (handle released     │ Decoded(text)          │
//! │      │                    as soon as it        │ stop() / teardown()    │
//! │      │                    arrives)             │ feed closed            │
//! │      └─────────────────────────────────────────┘                        │
//! │                  handle released before returning                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Handle Ownership
//! The live [`ScanHandle`] sits in one cell inside the controller. `stop()`,
//! `teardown()` and the scan itself always release whatever the cell holds
//! *now*. Every scan carries a generation number, so a handle that arrives
//! for a scan that was already stopped (or superseded by a newer one) is
//! released by that scan alone and never touches the newer handle.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::error::{TerminalError, TerminalResult};

// =============================================================================
// Device Traits
// =============================================================================

/// One frame's worth of decoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// No symbol in this frame. Routine, never an error.
    NoDecode,

    /// A symbol was decoded.
    Decoded(String),
}

/// A held camera/decoder. Releasing consumes it, so it happens once.
pub trait ScanHandle: Send {
    fn release(self: Box<Self>);
}

/// What a successful acquisition hands back.
pub struct ScanFeed {
    pub frames: mpsc::Receiver<FrameEvent>,
    pub handle: Box<dyn ScanHandle>,
}

/// A camera plus decoder that can be acquired.
#[async_trait]
pub trait ScanDevice: Send + Sync {
    /// Opens the camera and starts decoding into `ScanFeed::frames`.
    async fn acquire(&self) -> TerminalResult<ScanFeed>;
}

// =============================================================================
// States
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Starting,
    Active,
}

/// Why the most recent scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanEnd {
    Decoded,
    UserStopped,
    DeviceError,
    TornDown,

    /// The scan future was dropped before finishing.
    Cancelled,
}

/// Result of a scan that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Decoded(String),

    /// Stopped by the operator or by teardown. No code is emitted.
    Stopped,
}

// =============================================================================
// Scan Cell
// =============================================================================

struct ScanCell {
    state: ScanState,
    generation: u64,
    handle: Option<Box<dyn ScanHandle>>,
    stop_tx: Option<oneshot::Sender<()>>,
    last_end: Option<ScanEnd>,
    torn_down: bool,
}

impl ScanCell {
    /// Releases the held handle (if any) and goes idle.
    ///
    /// Returns false if the cell was already idle.
    fn end(&mut self, reason: ScanEnd) -> bool {
        if self.state == ScanState::Idle {
            return false;
        }

        if let Some(handle) = self.handle.take() {
            handle.release();
        }
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        self.state = ScanState::Idle;
        self.last_end = Some(reason);
        true
    }
}

impl Drop for ScanCell {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Releasing camera held at controller drop");
            handle.release();
        }
    }
}

/// Ends the scan of `generation` if the caller never got that far.
struct ScanGuard<'a> {
    cell: &'a Mutex<ScanCell>,
    generation: u64,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        let mut cell = lock(self.cell);
        if cell.generation == self.generation && cell.end(ScanEnd::Cancelled) {
            debug!(generation = self.generation, "Scan dropped, camera released");
        }
    }
}

fn lock(cell: &Mutex<ScanCell>) -> MutexGuard<'_, ScanCell> {
    cell.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// Scan Controller
// =============================================================================

/// Runs at most one scan at a time against a [`ScanDevice`].
pub struct ScanController {
    device: Arc<dyn ScanDevice>,
    cell: Mutex<ScanCell>,
}

impl ScanController {
    pub fn new(device: Arc<dyn ScanDevice>) -> Self {
        ScanController {
            device,
            cell: Mutex::new(ScanCell {
                state: ScanState::Idle,
                generation: 0,
                handle: None,
                stop_tx: None,
                last_end: None,
                torn_down: false,
            }),
        }
    }

    pub fn state(&self) -> ScanState {
        lock(&self.cell).state
    }

    pub fn is_scanning(&self) -> bool {
        self.state() != ScanState::Idle
    }

    pub fn last_end(&self) -> Option<ScanEnd> {
        lock(&self.cell).last_end
    }

    /// Runs one scan to completion.
    ///
    /// Returns the first decoded code, or `Stopped` if `stop()` or
    /// `teardown()` ended it. The camera is released before this returns,
    /// on every path.
    pub async fn scan(&self) -> TerminalResult<ScanOutcome> {
        let (generation, mut stop_rx) = {
            let mut cell = lock(&self.cell);
            if cell.torn_down {
                return Err(TerminalError::Acquisition("scanner has been torn down".into()));
            }
            if cell.state != ScanState::Idle {
                return Err(TerminalError::ScanBusy);
            }

            let (stop_tx, stop_rx) = oneshot::channel();
            cell.generation += 1;
            cell.state = ScanState::Starting;
            cell.stop_tx = Some(stop_tx);
            (cell.generation, stop_rx)
        };
        let _guard = ScanGuard {
            cell: &self.cell,
            generation,
        };
        info!(generation, "Starting scan");

        let ScanFeed { mut frames, handle } = match self.device.acquire().await {
            Ok(feed) => feed,
            Err(e) => {
                let err = match e {
                    TerminalError::Acquisition(_) => e,
                    other => TerminalError::Acquisition(other.to_string()),
                };
                warn!(generation, error = %err, "Camera acquisition failed");
                let mut cell = lock(&self.cell);
                if cell.generation == generation {
                    cell.end(ScanEnd::DeviceError);
                }
                return Err(err);
            }
        };

        {
            let mut cell = lock(&self.cell);
            if cell.generation != generation || cell.state != ScanState::Starting {
                debug!(generation, "Scan was stopped while starting, releasing new handle");
                handle.release();
                return Ok(ScanOutcome::Stopped);
            }
            cell.handle = Some(handle);
            cell.state = ScanState::Active;
        }
        debug!(generation, "Camera active");

        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    debug!(generation, "Scan stopped");
                    return Ok(ScanOutcome::Stopped);
                }
                frame = frames.recv() => match frame {
                    Some(FrameEvent::NoDecode) => {
                        trace!(generation, "No symbol in frame");
                    }
                    Some(FrameEvent::Decoded(text)) => {
                        let ended = lock(&self.cell).end(ScanEnd::Decoded);
                        if !ended {
                            return Ok(ScanOutcome::Stopped);
                        }
                        info!(generation, code = %text, "Code decoded");
                        return Ok(ScanOutcome::Decoded(text));
                    }
                    None => {
                        lock(&self.cell).end(ScanEnd::DeviceError);
                        warn!(generation, "Camera feed closed");
                        return Err(TerminalError::Acquisition("camera feed closed".into()));
                    }
                }
            }
        }
    }

    /// Stops a starting or running scan. Returns false if idle.
    pub fn stop(&self) -> bool {
        let stopped = lock(&self.cell).end(ScanEnd::UserStopped);
        if stopped {
            info!("Scan stopped by operator");
        }
        stopped
    }

    /// Releases any held camera and refuses further scans.
    pub fn teardown(&self) {
        let mut cell = lock(&self.cell);
        cell.torn_down = true;
        if cell.end(ScanEnd::TornDown) {
            info!("Scan torn down, camera released");
        }
    }
}
