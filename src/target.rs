//! Target selection side-channel.
//!
//! The active target is one lowercase token in a small file: `green`,
//! `pink`, `yellow`, or `all`. An operator (or the remote viewer) rewrites
//! the file; a low-frequency poller thread picks the change up and swaps the
//! shared `TargetSpec` atomically. Unrecognized content leaves the prior
//! selection in place, so a half-typed token can never blank the filter.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;

use crate::command::write_atomic;

/// Ball color classes the custom detector knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BallColor {
    Green,
    Pink,
    Yellow,
}

impl BallColor {
    /// Class id in the custom-trained model.
    pub fn class_id(&self) -> u32 {
        match self {
            BallColor::Green => 0,
            BallColor::Pink => 1,
            BallColor::Yellow => 2,
        }
    }

    pub fn from_class_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(BallColor::Green),
            1 => Some(BallColor::Pink),
            2 => Some(BallColor::Yellow),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            BallColor::Green => "green",
            BallColor::Pink => "pink",
            BallColor::Yellow => "yellow",
        }
    }
}

/// The set of ball colors currently pursued.
///
/// The wire protocol expresses one color or `all`, so that is all this type
/// models; the detector adapter expands it into backend class ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetSpec {
    All,
    Only(BallColor),
}

impl TargetSpec {
    /// Parse a side-channel token. Returns `None` for anything outside the
    /// wire vocabulary; callers keep their previous spec in that case.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "all" => Some(TargetSpec::All),
            "green" => Some(TargetSpec::Only(BallColor::Green)),
            "pink" => Some(TargetSpec::Only(BallColor::Pink)),
            "yellow" => Some(TargetSpec::Only(BallColor::Yellow)),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            TargetSpec::All => "all",
            TargetSpec::Only(color) => color.token(),
        }
    }
}

impl Default for TargetSpec {
    fn default() -> Self {
        TargetSpec::All
    }
}

/// Write a target token to the side-channel file (atomic replace).
pub fn write_target_file(path: &Path, spec: TargetSpec) -> Result<()> {
    write_atomic(path, spec.token().as_bytes())
}

/// Seed the side-channel file with `all` when it does not exist yet.
pub fn ensure_target_file(path: &Path) -> Result<()> {
    if !path.exists() {
        write_target_file(path, TargetSpec::All)?;
    }
    Ok(())
}

/// Read and parse the side-channel file. `None` when the file is missing,
/// unreadable, or holds an unrecognized token.
pub fn read_target_file(path: &Path) -> Option<TargetSpec> {
    let raw = fs::read_to_string(path).ok()?;
    TargetSpec::parse(&raw)
}

/// Poller for the target side-channel.
///
/// Runs on its own thread at a low frequency, independent of the control
/// cycle; the control loop only ever takes the read lock, so a slow or
/// missing target file can never stall a cycle.
pub struct TargetSelector {
    shared: Arc<RwLock<TargetSpec>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TargetSelector {
    /// Spawn the poller. The initial spec is taken from the file when it
    /// parses, otherwise `all`.
    pub fn spawn(path: PathBuf, poll_interval: Duration) -> Self {
        let initial = read_target_file(&path).unwrap_or_default();
        let shared = Arc::new(RwLock::new(initial));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_shared = Arc::clone(&shared);
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            poll_loop(&path, &thread_shared, &thread_stop, poll_interval);
        });

        Self {
            shared,
            stop,
            handle: Some(handle),
        }
    }

    /// The currently active spec. Never blocks on the poller.
    pub fn current(&self) -> TargetSpec {
        // A poisoned lock means the poller panicked; keep serving the last
        // value rather than taking the control loop down with it.
        match self.shared.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Stop the poller thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TargetSelector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(
    path: &Path,
    shared: &RwLock<TargetSpec>,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    // Sleep in short slices so shutdown is not gated on the poll interval.
    const SLICE: Duration = Duration::from_millis(50);

    while !stop.load(Ordering::Relaxed) {
        if let Some(next) = read_target_file(path) {
            let changed = match shared.read() {
                Ok(guard) => *guard != next,
                Err(_) => false,
            };
            if changed {
                if let Ok(mut guard) = shared.write() {
                    *guard = next;
                }
                log::info!("target changed: {}", next.token());
            }
        }

        let mut slept = Duration::ZERO;
        while slept < poll_interval && !stop.load(Ordering::Relaxed) {
            let step = SLICE.min(poll_interval - slept);
            thread::sleep(step);
            slept += step;
        }
    }
}
