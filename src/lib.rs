//! Ball follower
//!
//! This crate implements the perception-to-command control loop that drives
//! a quadruped toward a visually detected ball using a color+depth camera.
//!
//! # Architecture
//!
//! One control thread runs the cycle:
//!
//! ```text
//! FrameSource -> Detector (filtered by TargetSelector) -> DepthEstimator
//!             -> ControlPolicy -> CommandChannel
//! ```
//!
//! The actuation process is a separate program that drains the command
//! channel on its own clock; this crate only ever writes the channel's
//! single slot. The channel and the preview slot are the two shared
//! resources, both last-write-wins with atomic replacement.
//!
//! Per-cycle faults (no frame, no detection, unusable depth, channel I/O)
//! degrade to "hold the last safe state" and never escape the loop; only
//! initialization failures are fatal.
//!
//! # Module Structure
//!
//! - `frame`: aligned color+depth frame pairs
//! - `ingest`: frame sources (synthetic stub, replay/bridge directory)
//! - `detect`: detector backends and the class-filter adapter
//! - `depth`: median-window distance estimation
//! - `policy`: the finite-state control policy
//! - `command`: command codec and the file-backed channel
//! - `target`: target side-channel polling
//! - `preview`: annotated-frame slot for the streaming collaborator
//! - `sched`: fixed-tick pacing with drift accounting
//! - `config`: file + environment configuration

pub mod command;
pub mod config;
pub mod depth;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod policy;
pub mod preview;
pub mod sched;
pub mod target;

pub use command::{Command, CommandReader, CommandWriter, Pose, VelocityLimits};
pub use config::FollowerdConfig;
pub use depth::{DepthEstimator, DepthSettings, DistanceSample};
pub use detect::{Detection, Detector, DetectorBackend, DetectorSettings, ModelVariant};
pub use frame::FramePair;
pub use ingest::{open_source, FrameSource, ReplaySource, SourceSettings, StubSource};
pub use policy::{
    ControlPolicy, ControllerState, CycleDecision, PolicySettings, TargetObservation,
};
pub use preview::{render_preview, PreviewSlot};
pub use sched::{TickReport, TickScheduler};
pub use target::{BallColor, TargetSelector, TargetSpec};
