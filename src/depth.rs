//! Robust scalar distance from a depth window.
//!
//! Given the depth view of a frame pair and the detection center, the
//! estimator takes the median of the valid samples in a small rectangular
//! neighborhood. Median, not mean: at object edges the window picks up
//! background pixels, and a mean would bleed them into the estimate.

use crate::frame::FramePair;

/// Outcome of one depth estimate.
///
/// Invalid outcomes are explicit so the policy can distinguish "no usable
/// distance this cycle" from a measured value; they are never folded into a
/// sentinel distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DistanceSample {
    /// Validated distance in meters.
    Valid(f32),
    /// Fewer valid depth samples in the window than the configured minimum.
    TooFewSamples,
    /// Median distance fell outside the trusted sensor range.
    OutOfRange,
}

impl DistanceSample {
    pub fn valid(&self) -> Option<f32> {
        match self {
            DistanceSample::Valid(meters) => Some(*meters),
            _ => None,
        }
    }
}

/// Tunables for the depth window.
#[derive(Clone, Copy, Debug)]
pub struct DepthSettings {
    /// Half-extent of the square sampling window, in pixels.
    pub half_window: u32,
    /// Minimum number of nonzero samples required for a valid estimate.
    pub min_valid_samples: usize,
    /// Trusted sensor range, meters. Estimates outside are rejected.
    pub min_trusted_m: f32,
    pub max_trusted_m: f32,
}

impl Default for DepthSettings {
    fn default() -> Self {
        Self {
            half_window: 3,
            min_valid_samples: 5,
            min_trusted_m: 0.1,
            max_trusted_m: 3.0,
        }
    }
}

pub struct DepthEstimator {
    settings: DepthSettings,
}

impl DepthEstimator {
    pub fn new(settings: DepthSettings) -> Self {
        Self { settings }
    }

    /// Estimate the distance to the object centered at (`center_x`,
    /// `center_y`) in `pair`.
    ///
    /// The window is clamped to the frame, zero samples are discarded, and
    /// the median of the survivors is scaled by the device depth scale.
    pub fn estimate(&self, pair: &FramePair, center_x: u32, center_y: u32) -> DistanceSample {
        let half = self.settings.half_window;

        let x_lo = center_x.saturating_sub(half);
        let x_hi = (center_x + half).min(pair.width.saturating_sub(1));
        let y_lo = center_y.saturating_sub(half);
        let y_hi = (center_y + half).min(pair.height.saturating_sub(1));

        let mut valid: Vec<u16> = Vec::with_capacity(((2 * half + 1) * (2 * half + 1)) as usize);
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                match pair.depth_at(x, y) {
                    Some(raw) if raw > 0 => valid.push(raw),
                    _ => {}
                }
            }
        }

        if valid.len() < self.settings.min_valid_samples {
            return DistanceSample::TooFewSamples;
        }

        valid.sort_unstable();
        let median_raw = valid[valid.len() / 2];
        let meters = f32::from(median_raw) * pair.depth_scale;

        if meters < self.settings.min_trusted_m || meters > self.settings.max_trusted_m {
            return DistanceSample::OutOfRange;
        }
        DistanceSample::Valid(meters)
    }
}
