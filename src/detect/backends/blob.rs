//! Color-blob backend.
//!
//! Dependency-free detector that classifies pixels into the three ball hues
//! and boxes the largest run of each. Far less capable than the ONNX
//! backends, but it needs no model file, which makes it the default partner
//! for the synthetic frame source and for end-to-end tests of the control
//! loop.

use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectorBackend, ModelVariant};
use crate::detect::result::Detection;
use crate::target::BallColor;

/// Sample every Nth pixel in each axis. The balls are large in frame; full
/// resolution buys nothing here.
const SAMPLE_STEP: u32 = 2;

/// Minimum matching samples before a blob counts as a detection.
const MIN_BLOB_SAMPLES: u32 = 30;

#[derive(Default)]
struct BlobAccumulator {
    count: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl BlobAccumulator {
    fn push(&mut self, x: u32, y: u32) {
        if self.count == 0 {
            self.min_x = x;
            self.max_x = x;
            self.min_y = y;
            self.max_y = y;
        } else {
            self.min_x = self.min_x.min(x);
            self.max_x = self.max_x.max(x);
            self.min_y = self.min_y.min(y);
            self.max_y = self.max_y.max(y);
        }
        self.count += 1;
    }
}

/// Color-blob ball detector. Classifies in the custom class space.
#[derive(Default)]
pub struct BlobBackend;

impl BlobBackend {
    pub fn new() -> Self {
        Self
    }

    fn classify(r: u8, g: u8, b: u8) -> Option<BallColor> {
        let (r, g, b) = (r as i16, g as i16, b as i16);
        if g > 120 && g > r + 40 && g > b + 40 {
            return Some(BallColor::Green);
        }
        if r > 150 && b > 120 && g < r - 40 {
            return Some(BallColor::Pink);
        }
        if r > 150 && g > 150 && b < 100 {
            return Some(BallColor::Yellow);
        }
        None
    }
}

impl DetectorBackend for BlobBackend {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn variant(&self) -> ModelVariant {
        ModelVariant::Custom
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        allowed: &[u32],
    ) -> Result<Vec<Detection>> {
        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }

        let mut blobs = [
            BlobAccumulator::default(),
            BlobAccumulator::default(),
            BlobAccumulator::default(),
        ];

        let mut y = 0;
        while y < height {
            let mut x = 0;
            while x < width {
                let idx = ((y * width + x) * 3) as usize;
                if let Some(color) =
                    Self::classify(pixels[idx], pixels[idx + 1], pixels[idx + 2])
                {
                    blobs[color.class_id() as usize].push(x, y);
                }
                x += SAMPLE_STEP;
            }
            y += SAMPLE_STEP;
        }

        let mut detections = Vec::new();
        for (class_id, blob) in blobs.iter().enumerate() {
            let class_id = class_id as u32;
            if blob.count < MIN_BLOB_SAMPLES || !allowed.contains(&class_id) {
                continue;
            }
            // Saturating confidence in the sample count; a solid ball fills
            // the box and pushes this toward the cap.
            let confidence = (blob.count as f32 / 500.0).clamp(0.3, 0.95);
            detections.push(Detection {
                x1: blob.min_x as f32,
                y1: blob.min_y as f32,
                x2: blob.max_x as f32,
                y2: blob.max_y as f32,
                class_id,
                confidence,
            });
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_disc(width: u32, height: u32, cx: i32, cy: i32, radius: i32, rgb: [u8; 3]) -> Vec<u8> {
        let mut pixels = vec![30u8; (width * height * 3) as usize];
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy <= radius * radius {
                    let idx = ((y as u32 * width + x as u32) * 3) as usize;
                    pixels[idx..idx + 3].copy_from_slice(&rgb);
                }
            }
        }
        pixels
    }

    #[test]
    fn finds_green_disc_near_its_center() {
        let pixels = frame_with_disc(320, 240, 200, 120, 30, [40, 200, 80]);
        let mut backend = BlobBackend::new();
        let hits = backend.detect(&pixels, 320, 240, &[0, 1, 2]).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].class_id, BallColor::Green.class_id());
        let (cx, cy) = hits[0].center();
        assert!((cx - 200.0).abs() < 4.0, "center x {cx}");
        assert!((cy - 120.0).abs() < 4.0, "center y {cy}");
    }

    #[test]
    fn filter_suppresses_unwanted_color() {
        let pixels = frame_with_disc(320, 240, 100, 100, 25, [240, 220, 40]);
        let mut backend = BlobBackend::new();

        let all = backend.detect(&pixels, 320, 240, &[0, 1, 2]).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].class_id, BallColor::Yellow.class_id());

        let green_only = backend.detect(&pixels, 320, 240, &[0]).unwrap();
        assert!(green_only.is_empty());
    }

    #[test]
    fn empty_scene_yields_nothing() {
        let pixels = vec![30u8; 320 * 240 * 3];
        let mut backend = BlobBackend::new();
        assert!(backend.detect(&pixels, 320, 240, &[0, 1, 2]).unwrap().is_empty());
    }

    #[test]
    fn rejects_wrong_buffer_size() {
        let mut backend = BlobBackend::new();
        assert!(backend.detect(&[0u8; 10], 320, 240, &[0]).is_err());
    }
}
