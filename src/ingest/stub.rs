//! Synthetic frame source.
//!
//! Renders a scripted scene: one colored ball over a dark background, with
//! a matching depth view. The ball sweeps horizontally while closing from
//! far to near, so a full control-loop run exercises SEARCHING through the
//! proximity states without hardware.

use anyhow::{anyhow, Result};
use rand::Rng;

use crate::frame::FramePair;
use crate::ingest::{FrameSource, SourceSettings, SourceStats};
use crate::target::BallColor;

/// RealSense-style depth unit: 1 mm per raw count.
const DEPTH_SCALE: f32 = 0.001;
/// Background wall distance, raw units (2.8 m).
const WALL_RAW: u16 = 2800;
/// Every Nth poll reports "no new frame" to exercise the retry path.
const DROPOUT_EVERY: u64 = 17;
/// Approximate focal length in pixels; sizes the ball with distance.
const FOCAL_PX: f32 = 400.0;
/// Physical ball radius, meters.
const BALL_RADIUS_M: f32 = 0.1;

pub struct StubSource {
    settings: SourceSettings,
    color: BallColor,
    polls: u64,
    frames_delivered: u64,
    /// Scripted ball distance, meters; closes toward the floor value.
    distance_m: f32,
}

impl StubSource {
    pub fn new(settings: SourceSettings) -> Result<Self> {
        let color = match settings.url.trim_start_matches("stub://") {
            "" | "green" => BallColor::Green,
            "pink" => BallColor::Pink,
            "yellow" => BallColor::Yellow,
            other => return Err(anyhow!("unknown stub scene {other:?}")),
        };
        if settings.width < 64 || settings.height < 64 {
            return Err(anyhow!("stub scene needs at least a 64x64 frame"));
        }
        Ok(Self {
            settings,
            color,
            polls: 0,
            frames_delivered: 0,
            distance_m: 2.5,
        })
    }

    fn ball_rgb(&self) -> [u8; 3] {
        match self.color {
            BallColor::Green => [40, 200, 80],
            BallColor::Pink => [230, 60, 200],
            BallColor::Yellow => [240, 220, 40],
        }
    }

    fn render(&mut self) -> FramePair {
        let width = self.settings.width;
        let height = self.settings.height;

        // Horizontal sweep: slow sinusoid around frame center.
        let phase = self.frames_delivered as f32 / 60.0;
        let cx = (width as f32 / 2.0) + (width as f32 / 4.0) * phase.sin();
        let cy = height as f32 / 2.0;
        let radius = (BALL_RADIUS_M * FOCAL_PX / self.distance_m).max(4.0);

        let mut color = vec![30u8; FramePair::color_len(width, height)];
        let mut depth = vec![WALL_RAW; FramePair::depth_len(width, height)];
        let ball_rgb = self.ball_rgb();
        let ball_raw = (self.distance_m / DEPTH_SCALE) as u16;

        let mut rng = rand::thread_rng();
        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let on_ball = dx * dx + dy * dy <= radius * radius;
                let idx = (y * width + x) as usize;
                if on_ball {
                    color[idx * 3..idx * 3 + 3].copy_from_slice(&ball_rgb);
                    depth[idx] = ball_raw;
                }
                // Sparse depth dropout, as real sensors produce.
                if rng.gen::<f32>() < 0.02 {
                    depth[idx] = 0;
                }
            }
        }

        // Close in until just past the sit threshold, then hold there.
        if self.distance_m > 0.35 {
            self.distance_m -= 0.004;
        }

        FramePair {
            color,
            depth,
            width,
            height,
            depth_scale: DEPTH_SCALE,
        }
    }
}

impl FrameSource for StubSource {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "StubSource: scripted {} ball at {}x{}",
            self.color.token(),
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn poll_pair(&mut self) -> Result<Option<FramePair>> {
        self.polls += 1;
        if self.polls % DROPOUT_EVERY == 0 {
            return Ok(None);
        }
        self.frames_delivered += 1;
        Ok(Some(self.render()))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.frames_delivered,
            url: self.settings.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str) -> StubSource {
        StubSource::new(SourceSettings {
            url: url.to_string(),
            width: 320,
            height: 240,
        })
        .unwrap()
    }

    #[test]
    fn produces_frames_with_matching_dimensions() {
        let mut source = source("stub://green");
        let pair = source.poll_pair().unwrap().expect("first poll delivers");
        assert_eq!(pair.width, 320);
        assert_eq!(pair.height, 240);
        assert_eq!(pair.color.len(), FramePair::color_len(320, 240));
        assert_eq!(pair.depth.len(), FramePair::depth_len(320, 240));
        assert_eq!(pair.depth_scale, DEPTH_SCALE);
    }

    #[test]
    fn ball_distance_closes_over_time() {
        let mut source = source("stub://yellow");
        let first = source.distance_m;
        for _ in 0..100 {
            let _ = source.poll_pair().unwrap();
        }
        assert!(source.distance_m < first);
        assert!(source.distance_m >= 0.35 - 0.004);
    }

    #[test]
    fn occasional_polls_come_up_empty() {
        let mut source = source("stub://pink");
        let mut empties = 0;
        for _ in 0..(DROPOUT_EVERY * 3) {
            if source.poll_pair().unwrap().is_none() {
                empties += 1;
            }
        }
        assert_eq!(empties, 3);
    }

    #[test]
    fn unknown_scene_is_rejected() {
        assert!(StubSource::new(SourceSettings {
            url: "stub://plaid".to_string(),
            ..SourceSettings::default()
        })
        .is_err());
    }
}
