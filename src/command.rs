//! Motion commands and the file-backed command channel.
//!
//! The channel is a single slot with last-write-wins semantics: the policy
//! process overwrites it once per decision, the actuation process re-reads it
//! on its own clock. There is no queue; a missed update is simply superseded.
//!
//! Wire format (one form per write, never both):
//! - velocity: `"{vx:.3},{vy:.3},{vyaw:.3}"`, three comma-separated decimals
//! - pose: the literal lowercase token `sit` or `stand`
//!
//! Writes go through a temp-file-and-rename so a concurrent reader never
//! observes a partially written value. A reader that finds unparseable
//! content keeps its last known-good command.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

/// Discrete pose the actuator can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pose {
    Stand,
    Sit,
}

impl Pose {
    pub fn token(&self) -> &'static str {
        match self {
            Pose::Stand => "stand",
            Pose::Sit => "sit",
        }
    }
}

/// One motion command: a bounded velocity triple or a discrete pose.
///
/// The two forms are mutually exclusive; the wire format cannot express both
/// at once and neither can this type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Velocity { vx: f32, vy: f32, vyaw: f32 },
    Pose(Pose),
}

/// Per-axis magnitude limits applied to every published velocity.
#[derive(Clone, Copy, Debug)]
pub struct VelocityLimits {
    pub max_vx: f32,
    pub max_vy: f32,
    pub max_vyaw: f32,
}

impl Default for VelocityLimits {
    fn default() -> Self {
        Self {
            max_vx: 0.6,
            max_vy: 0.4,
            max_vyaw: 1.0,
        }
    }
}

impl Command {
    /// All-zero velocity. Written on startup and on every shutdown path so
    /// the actuator never holds a stale non-zero command.
    pub fn neutral() -> Self {
        Command::Velocity {
            vx: 0.0,
            vy: 0.0,
            vyaw: 0.0,
        }
    }

    pub fn velocity(vx: f32, vy: f32, vyaw: f32) -> Self {
        Command::Velocity { vx, vy, vyaw }
    }

    /// Clamp each velocity axis to the configured magnitude limit.
    /// Pose commands pass through unchanged.
    pub fn clamped(self, limits: &VelocityLimits) -> Self {
        match self {
            Command::Velocity { vx, vy, vyaw } => Command::Velocity {
                vx: vx.clamp(-limits.max_vx, limits.max_vx),
                vy: vy.clamp(-limits.max_vy, limits.max_vy),
                vyaw: vyaw.clamp(-limits.max_vyaw, limits.max_vyaw),
            },
            pose => pose,
        }
    }

    /// Serialize to the wire format.
    pub fn encode(&self) -> String {
        match self {
            Command::Velocity { vx, vy, vyaw } => {
                format!("{vx:.3},{vy:.3},{vyaw:.3}")
            }
            Command::Pose(pose) => pose.token().to_string(),
        }
    }

    /// Parse the wire format. Anything that is neither a pose token nor three
    /// comma-separated decimals is an error; readers treat that as a no-op.
    pub fn decode(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw {
            "sit" => return Ok(Command::Pose(Pose::Sit)),
            "stand" => return Ok(Command::Pose(Pose::Stand)),
            _ => {}
        }

        let parts: Vec<&str> = raw.split(',').collect();
        if parts.len() != 3 {
            return Err(anyhow!("command is neither a pose token nor a velocity triple: {raw:?}"));
        }
        let mut values = [0.0f32; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid velocity component {part:?}"))?;
        }
        Ok(Command::Velocity {
            vx: values[0],
            vy: values[1],
            vyaw: values[2],
        })
    }
}

/// Writer side of the command channel.
pub struct CommandWriter {
    path: PathBuf,
}

impl CommandWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the slot with `command`. Atomic: a concurrent reader sees
    /// either the previous value or the new one, never a partial write.
    pub fn write(&self, command: &Command) -> Result<()> {
        write_atomic(&self.path, command.encode().as_bytes())
    }

    /// Best-effort neutral write for shutdown paths. Failures are logged,
    /// not propagated; there is nothing better to do while exiting.
    pub fn write_neutral_best_effort(&self) {
        if let Err(e) = self.write(&Command::neutral()) {
            log::error!(
                "failed to write neutral command to {}: {e}",
                self.path.display()
            );
        }
    }
}

/// Reader side of the command channel.
///
/// Keeps the last successfully decoded command; unreadable or unparseable
/// slot content falls back to it. Starts out neutral.
pub struct CommandReader {
    path: PathBuf,
    last_good: Command,
}

impl CommandReader {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            last_good: Command::neutral(),
        }
    }

    /// Read the slot, falling back to the last known-good command on any
    /// read or parse failure.
    pub fn read(&mut self) -> Command {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("command channel read failed ({}): {e}", self.path.display());
                return self.last_good;
            }
        };
        match Command::decode(&raw) {
            Ok(command) => {
                self.last_good = command;
                command
            }
            Err(e) => {
                log::warn!("ignoring malformed command slot content: {e}");
                self.last_good
            }
        }
    }

    pub fn last_good(&self) -> Command {
        self.last_good
    }
}

/// Write `data` to `path` through a temp file in the same directory, then
/// rename over the target. Rename within a directory is atomic, so readers
/// never observe a torn value.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_round_trips_to_three_decimals() {
        let cmd = Command::velocity(0.300, 0.0, -0.120);
        let encoded = cmd.encode();
        assert_eq!(encoded, "0.300,0.000,-0.120");
        assert_eq!(Command::decode(&encoded).unwrap(), cmd);
    }

    #[test]
    fn pose_tokens_round_trip() {
        for pose in [Pose::Sit, Pose::Stand] {
            let encoded = Command::Pose(pose).encode();
            assert_eq!(Command::decode(&encoded).unwrap(), Command::Pose(pose));
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Command::decode("garbage").is_err());
        assert!(Command::decode("1.0,2.0").is_err());
        assert!(Command::decode("1.0,2.0,three").is_err());
        assert!(Command::decode("").is_err());
        // Uppercase pose tokens are not part of the wire format.
        assert!(Command::decode("SIT").is_err());
    }

    #[test]
    fn decode_tolerates_surrounding_whitespace() {
        assert_eq!(
            Command::decode(" 0.100,0.000,0.400\n").unwrap(),
            Command::velocity(0.1, 0.0, 0.4)
        );
        assert_eq!(Command::decode("sit\n").unwrap(), Command::Pose(Pose::Sit));
    }

    #[test]
    fn clamp_bounds_each_axis() {
        let limits = VelocityLimits {
            max_vx: 0.5,
            max_vy: 0.3,
            max_vyaw: 0.8,
        };
        let clamped = Command::velocity(2.0, -1.0, -3.0).clamped(&limits);
        assert_eq!(clamped, Command::velocity(0.5, -0.3, -0.8));

        // Poses are untouched.
        assert_eq!(
            Command::Pose(Pose::Sit).clamped(&limits),
            Command::Pose(Pose::Sit)
        );
    }
}
