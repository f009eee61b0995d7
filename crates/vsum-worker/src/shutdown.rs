//! Cancellation, signal handling and interrupt diagnostics.

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Run-wide cancellation flag.
///
/// Cloning shares the flag. Receivers handed to ffmpeg runners observe the
/// same value.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any token clone, including `self`.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub fn receiver(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

/// Operator signal that stopped the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "SIGINT")]
    Interrupt,
    #[serde(rename = "SIGTERM")]
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => f.write_str("SIGINT"),
            Signal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Wait for SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = interrupt.recv() => Ok(Signal::Interrupt),
        _ = terminate.recv() => Ok(Signal::Terminate),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    tokio::signal::ctrl_c().await?;
    Ok(Signal::Interrupt)
}

/// Cancel `token` on the first operator signal and record it in `tracker`.
pub fn spawn_signal_listener(token: CancelToken, tracker: RunTracker) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                info!(signal = %signal, "Received signal, stopping new work");
                tracker.set_signal(signal);
                token.cancel();
            }
            Err(e) => tracing::warn!("Failed to install signal handlers: {}", e),
        }
    });
}

#[derive(Debug, Default)]
struct TrackerState {
    stage: String,
    snapshot_path: Option<PathBuf>,
    signal: Option<Signal>,
    in_flight: BTreeSet<u32>,
    completed: BTreeSet<u32>,
    failed: BTreeSet<u32>,
}

/// Shared progress of the current run, read when writing a diagnostic snapshot.
#[derive(Debug, Clone, Default)]
pub struct RunTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // Tracker updates never panic mid-way, so a poisoned lock still holds
        // consistent data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_stage(&self, stage: &str) {
        self.lock().stage = stage.to_string();
    }

    pub fn stage(&self) -> String {
        self.lock().stage.clone()
    }

    /// Where an interrupt snapshot for this run is appended.
    pub fn set_snapshot_path(&self, path: PathBuf) {
        self.lock().snapshot_path = Some(path);
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.lock().snapshot_path.clone()
    }

    pub fn set_signal(&self, signal: Signal) {
        self.lock().signal.get_or_insert(signal);
    }

    /// Frame request started.
    pub fn begin(&self, frame: u32) {
        self.lock().in_flight.insert(frame);
    }

    pub fn complete(&self, frame: u32) {
        let mut state = self.lock();
        state.in_flight.remove(&frame);
        state.failed.remove(&frame);
        state.completed.insert(frame);
    }

    pub fn fail(&self, frame: u32) {
        let mut state = self.lock();
        state.in_flight.remove(&frame);
        state.failed.insert(frame);
    }

    pub fn snapshot(&self, run_id: &str, video: &str) -> InterruptSnapshot {
        let state = self.lock();
        InterruptSnapshot {
            run_id: run_id.to_string(),
            video: video.to_string(),
            stage: state.stage.clone(),
            in_flight: state.in_flight.iter().copied().collect(),
            completed: state.completed.iter().copied().collect(),
            failed: state.failed.iter().copied().collect(),
            signal: state.signal,
            timestamp: Utc::now(),
        }
    }
}

/// Diagnostic record appended to `interrupt.log` when a run is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptSnapshot {
    pub run_id: String,
    pub video: String,
    pub stage: String,
    pub in_flight: Vec<u32>,
    pub completed: Vec<u32>,
    pub failed: Vec<u32>,
    pub signal: Option<Signal>,
    pub timestamp: DateTime<Utc>,
}

/// Append `snapshot` as one JSON line.
pub fn append_snapshot(path: &Path, snapshot: &InterruptSnapshot) -> std::io::Result<()> {
    let mut line = serde_json::to_string(snapshot)?;
    line.push('\n');

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());
        assert!(*token.receiver().borrow());
    }

    #[test]
    fn test_tracker_moves_frames_between_sets() {
        let tracker = RunTracker::new();
        tracker.set_stage("describe");
        tracker.begin(1);
        tracker.begin(2);
        tracker.begin(3);
        tracker.complete(1);
        tracker.fail(2);

        let snap = tracker.snapshot("run", "video.mp4");
        assert_eq!(snap.stage, "describe");
        assert_eq!(snap.in_flight, vec![3]);
        assert_eq!(snap.completed, vec![1]);
        assert_eq!(snap.failed, vec![2]);
        assert_eq!(snap.signal, None);
    }

    #[test]
    fn test_first_signal_wins() {
        let tracker = RunTracker::new();
        tracker.set_signal(Signal::Terminate);
        tracker.set_signal(Signal::Interrupt);
        assert_eq!(tracker.snapshot("r", "v").signal, Some(Signal::Terminate));
    }

    #[test]
    fn test_append_snapshot_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interrupt.log");
        let tracker = RunTracker::new();
        tracker.set_signal(Signal::Interrupt);

        append_snapshot(&path, &tracker.snapshot("r1", "v.mp4")).unwrap();
        append_snapshot(&path, &tracker.snapshot("r2", "v.mp4")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["runId"], "r1");
        assert_eq!(first["signal"], "SIGINT");
        assert!(first["inFlight"].is_array());
    }
}
