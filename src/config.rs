use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::VelocityLimits;
use crate::depth::DepthSettings;
use crate::detect::{DetectorSettings, ModelVariant};
use crate::ingest::SourceSettings;
use crate::policy::PolicySettings;

const DEFAULT_COMMAND_PATH: &str = "velocities.txt";
const DEFAULT_TARGET_PATH: &str = "target.txt";
const DEFAULT_TARGET_POLL_MS: u64 = 500;
const DEFAULT_TICK_MS: u64 = 10;
const DEFAULT_PREVIEW_EVERY: u64 = 3;
const DEFAULT_STATUS_LOG_EVERY: u64 = 10;

#[derive(Debug, Deserialize, Default)]
struct FollowerdConfigFile {
    command_path: Option<String>,
    target_path: Option<String>,
    target_poll_ms: Option<u64>,
    tick_ms: Option<u64>,
    preview_every: Option<u64>,
    preview_path: Option<String>,
    status_log_every: Option<u64>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    depth: Option<DepthConfigFile>,
    policy: Option<PolicyConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    variant: Option<String>,
    model_path: Option<String>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DepthConfigFile {
    half_window: Option<u32>,
    min_valid_samples: Option<usize>,
    min_trusted_m: Option<f32>,
    max_trusted_m: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct PolicyConfigFile {
    setpoint_m: Option<f32>,
    hold_band_m: Option<f32>,
    approach_band_m: Option<f32>,
    turn_dead_band: Option<f32>,
    forward_speed: Option<f32>,
    reverse_speed: Option<f32>,
    backoff_speed: Option<f32>,
    scan_yaw: Option<f32>,
    loss_timeout_ms: Option<u64>,
    sit_override: Option<bool>,
    sit_distance_m: Option<f32>,
    too_close_m: Option<f32>,
    max_vx: Option<f32>,
    max_vy: Option<f32>,
    max_vyaw: Option<f32>,
}

/// Runtime configuration for the follower daemon.
#[derive(Debug, Clone)]
pub struct FollowerdConfig {
    /// Command channel slot (the actuation process reads this file).
    pub command_path: PathBuf,
    /// Target side-channel file.
    pub target_path: PathBuf,
    pub target_poll_interval: Duration,
    /// Nominal control tick.
    pub tick: Duration,
    /// Publish a preview every Nth processed frame.
    pub preview_every: u64,
    /// Optional file mirror of the preview slot for external collaborators
    /// (written with the same atomic-replace discipline as the channel).
    pub preview_path: Option<PathBuf>,
    /// Emit a status log line every Nth command-producing cycle.
    pub status_log_every: u64,
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub depth: DepthSettings,
    pub policy: PolicySettings,
}

impl FollowerdConfig {
    /// Load from the optional JSON file named by `FOLLOWER_CONFIG`, apply
    /// `FOLLOWER_*` environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FOLLOWER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FollowerdConfigFile) -> Result<Self> {
        let command_path = PathBuf::from(
            file.command_path
                .unwrap_or_else(|| DEFAULT_COMMAND_PATH.to_string()),
        );
        let target_path = PathBuf::from(
            file.target_path
                .unwrap_or_else(|| DEFAULT_TARGET_PATH.to_string()),
        );
        let target_poll_interval =
            Duration::from_millis(file.target_poll_ms.unwrap_or(DEFAULT_TARGET_POLL_MS));
        let tick = Duration::from_millis(file.tick_ms.unwrap_or(DEFAULT_TICK_MS));
        let preview_every = file.preview_every.unwrap_or(DEFAULT_PREVIEW_EVERY);
        let preview_path = file.preview_path.map(PathBuf::from);
        let status_log_every = file.status_log_every.unwrap_or(DEFAULT_STATUS_LOG_EVERY);

        let source_defaults = SourceSettings::default();
        let source = match file.source {
            Some(source) => SourceSettings {
                url: source.url.unwrap_or(source_defaults.url),
                width: source.width.unwrap_or(source_defaults.width),
                height: source.height.unwrap_or(source_defaults.height),
            },
            None => source_defaults,
        };

        let detector_defaults = DetectorSettings::default();
        let detector = match file.detector {
            Some(detector) => DetectorSettings {
                backend: detector.backend.unwrap_or(detector_defaults.backend),
                variant: match detector.variant.as_deref() {
                    Some(raw) => parse_variant(raw)?,
                    None => detector_defaults.variant,
                },
                model_path: detector.model_path.or(detector_defaults.model_path),
                confidence_threshold: detector
                    .confidence_threshold
                    .or(detector_defaults.confidence_threshold),
            },
            None => detector_defaults,
        };

        let depth_defaults = DepthSettings::default();
        let depth = match file.depth {
            Some(depth) => DepthSettings {
                half_window: depth.half_window.unwrap_or(depth_defaults.half_window),
                min_valid_samples: depth
                    .min_valid_samples
                    .unwrap_or(depth_defaults.min_valid_samples),
                min_trusted_m: depth.min_trusted_m.unwrap_or(depth_defaults.min_trusted_m),
                max_trusted_m: depth.max_trusted_m.unwrap_or(depth_defaults.max_trusted_m),
            },
            None => depth_defaults,
        };

        let policy_defaults = PolicySettings::default();
        let policy = match file.policy {
            Some(policy) => PolicySettings {
                setpoint_m: policy.setpoint_m.unwrap_or(policy_defaults.setpoint_m),
                hold_band_m: policy.hold_band_m.unwrap_or(policy_defaults.hold_band_m),
                approach_band_m: policy
                    .approach_band_m
                    .unwrap_or(policy_defaults.approach_band_m),
                turn_dead_band: policy
                    .turn_dead_band
                    .unwrap_or(policy_defaults.turn_dead_band),
                forward_speed: policy.forward_speed.unwrap_or(policy_defaults.forward_speed),
                reverse_speed: policy.reverse_speed.unwrap_or(policy_defaults.reverse_speed),
                backoff_speed: policy.backoff_speed.unwrap_or(policy_defaults.backoff_speed),
                scan_yaw: policy.scan_yaw.unwrap_or(policy_defaults.scan_yaw),
                loss_timeout: policy
                    .loss_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(policy_defaults.loss_timeout),
                sit_override: policy.sit_override.unwrap_or(policy_defaults.sit_override),
                sit_distance_m: policy
                    .sit_distance_m
                    .unwrap_or(policy_defaults.sit_distance_m),
                too_close_m: policy.too_close_m.unwrap_or(policy_defaults.too_close_m),
                limits: VelocityLimits {
                    max_vx: policy.max_vx.unwrap_or(policy_defaults.limits.max_vx),
                    max_vy: policy.max_vy.unwrap_or(policy_defaults.limits.max_vy),
                    max_vyaw: policy.max_vyaw.unwrap_or(policy_defaults.limits.max_vyaw),
                },
            },
            None => policy_defaults,
        };

        Ok(Self {
            command_path,
            target_path,
            target_poll_interval,
            tick,
            preview_every,
            preview_path,
            status_log_every,
            source,
            detector,
            depth,
            policy,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("FOLLOWER_COMMAND_PATH") {
            if !path.trim().is_empty() {
                self.command_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("FOLLOWER_TARGET_PATH") {
            if !path.trim().is_empty() {
                self.target_path = PathBuf::from(path);
            }
        }
        if let Ok(url) = std::env::var("FOLLOWER_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(path) = std::env::var("FOLLOWER_PREVIEW_PATH") {
            if !path.trim().is_empty() {
                self.preview_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(backend) = std::env::var("FOLLOWER_DETECTOR_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend;
            }
        }
        if let Ok(path) = std::env::var("FOLLOWER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(path);
            }
        }
        if let Ok(raw) = std::env::var("FOLLOWER_SETPOINT_M") {
            let setpoint: f32 = raw
                .parse()
                .map_err(|_| anyhow!("FOLLOWER_SETPOINT_M must be a distance in meters"))?;
            self.policy.setpoint_m = setpoint;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(anyhow!("tick_ms must be greater than zero"));
        }
        if self.preview_every == 0 || self.status_log_every == 0 {
            return Err(anyhow!("preview_every and status_log_every must be at least 1"));
        }
        if self.policy.setpoint_m <= 0.0 {
            return Err(anyhow!("policy.setpoint_m must be positive"));
        }
        if self.policy.hold_band_m <= 0.0 || self.policy.approach_band_m <= 0.0 {
            return Err(anyhow!("policy bands must be positive"));
        }
        if self.policy.hold_band_m >= self.policy.approach_band_m {
            return Err(anyhow!(
                "policy.hold_band_m must be narrower than policy.approach_band_m"
            ));
        }
        if self.policy.forward_speed <= 0.0
            || self.policy.reverse_speed <= 0.0
            || self.policy.backoff_speed <= 0.0
        {
            return Err(anyhow!("policy speeds are magnitudes and must be positive"));
        }
        let limits = &self.policy.limits;
        if limits.max_vx <= 0.0 || limits.max_vy <= 0.0 || limits.max_vyaw <= 0.0 {
            return Err(anyhow!("velocity limits must be positive"));
        }
        if self.depth.min_trusted_m >= self.depth.max_trusted_m {
            return Err(anyhow!(
                "depth.min_trusted_m must be below depth.max_trusted_m"
            ));
        }
        if self.depth.min_valid_samples == 0 {
            return Err(anyhow!("depth.min_valid_samples must be at least 1"));
        }
        if self.command_path == self.target_path {
            return Err(anyhow!(
                "command_path and target_path must be distinct files"
            ));
        }
        Ok(())
    }
}

fn parse_variant(raw: &str) -> Result<ModelVariant> {
    match raw {
        "pretrained" => Ok(ModelVariant::Pretrained),
        "custom" => Ok(ModelVariant::Custom),
        other => Err(anyhow!(
            "detector.variant must be \"pretrained\" or \"custom\", got {other:?}"
        )),
    }
}

fn read_config_file(path: &Path) -> Result<FollowerdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
