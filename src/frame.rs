//! Aligned color+depth frame pairs.
//!
//! A `FramePair` is what a frame source hands to the control cycle: an RGB
//! color view and a Z16 depth view of the same viewpoint, plus the device's
//! depth-unit-to-meters scale. Frame pairs are consumed within one cycle and
//! never persisted.

/// Time-aligned color+depth frame pair.
///
/// Invariant: both views share `width`/`height` and are aligned to the same
/// viewpoint. Producers (frame sources) are responsible for alignment; the
/// control loop assumes pixel (x, y) in `color` and `depth` observe the same
/// point in the scene.
pub struct FramePair {
    /// RGB8 pixels, row-major, `width * height * 3` bytes.
    pub color: Vec<u8>,
    /// Raw Z16 depth samples, row-major, `width * height` values. Zero means
    /// "no reading" and is discarded by the depth estimator.
    pub depth: Vec<u16>,
    pub width: u32,
    pub height: u32,
    /// Multiply a raw depth sample by this to get meters.
    pub depth_scale: f32,
}

impl FramePair {
    /// Raw depth sample at (x, y), or `None` outside the frame.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.depth.get((y * self.width + x) as usize).copied()
    }

    /// Expected byte length of the color buffer.
    pub fn color_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 3
    }

    /// Expected sample count of the depth buffer.
    pub fn depth_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_at_bounds() {
        let pair = FramePair {
            color: vec![0; FramePair::color_len(4, 2)],
            depth: (0..8).collect(),
            width: 4,
            height: 2,
            depth_scale: 0.001,
        };

        assert_eq!(pair.depth_at(0, 0), Some(0));
        assert_eq!(pair.depth_at(3, 1), Some(7));
        assert_eq!(pair.depth_at(4, 0), None);
        assert_eq!(pair.depth_at(0, 2), None);
    }
}
