//! Frame sources.
//!
//! A frame source supplies time-aligned color+depth pairs plus the device
//! depth scale, through a non-blocking poll: `Ok(None)` means "no new frame
//! yet", which is normal operation, not an error. Two sources ship in-tree:
//!
//! - `stub://<color>`: deterministic synthetic scene with a scripted ball,
//!   used by tests and the default configuration;
//! - a local directory: replays recorded frame pairs; this is also the
//!   bridge format an external camera process can write into.
//!
//! Hardware camera bring-up lives outside this crate; whatever process owns
//! the device speaks the bridge format or implements `FrameSource` directly.

mod replay;
mod stub;

pub use replay::{write_frame_pair, ReplaySource};
pub use stub::StubSource;

use anyhow::{anyhow, Result};

use crate::frame::FramePair;

/// Source of aligned color+depth frame pairs.
pub trait FrameSource: Send {
    /// Source identifier for logs.
    fn name(&self) -> &'static str;

    /// Bring the source up. Failure here is fatal to the daemon.
    fn connect(&mut self) -> Result<()>;

    /// Non-blocking poll for the next frame pair.
    ///
    /// `Ok(None)` is the routine "nothing new yet" outcome; callers yield
    /// and retry next tick. Errors are per-cycle faults, logged and retried.
    fn poll_pair(&mut self) -> Result<Option<FramePair>>;

    /// Delivery statistics.
    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_delivered: u64,
    pub url: String,
}

/// Frame source settings as they appear in configuration.
#[derive(Clone, Debug)]
pub struct SourceSettings {
    /// `stub://<color>` or a local directory of recorded frame pairs.
    pub url: String,
    /// Frame dimensions for synthetic sources.
    pub width: u32,
    pub height: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: "stub://green".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Construct the source named by `settings.url`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    if settings.url.starts_with("stub://") {
        return Ok(Box::new(StubSource::new(settings.clone())?));
    }
    if settings.url.contains("://") {
        return Err(anyhow!(
            "unsupported source scheme in {:?}; expected stub:// or a local directory",
            settings.url
        ));
    }
    Ok(Box::new(ReplaySource::new(settings.url.clone())))
}
