//! Annotated preview frames for the streaming collaborator.
//!
//! The control loop publishes its most recent annotated frame as JPEG bytes
//! into a single synchronized slot; an external streaming process drains it
//! at whatever rate it likes. Last write wins, there is no queue, and the
//! slot may legitimately be empty right after startup.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;

use crate::detect::{Detection, ModelVariant};
use crate::frame::FramePair;
use crate::policy::ControllerState;
use crate::target::TargetSpec;

const JPEG_QUALITY: u8 = 70;

/// Single-slot, last-write-wins buffer of encoded preview bytes.
///
/// Clone handles freely; all clones share the slot. The mutex is held only
/// for the pointer swap, never across encoding.
#[derive(Clone, Default)]
pub struct PreviewSlot {
    inner: Arc<Mutex<Option<Arc<Vec<u8>>>>>,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot contents.
    pub fn publish(&self, jpeg: Vec<u8>) {
        let frame = Arc::new(jpeg);
        match self.inner.lock() {
            Ok(mut guard) => *guard = Some(frame),
            // A poisoned slot only degrades the preview, never the loop.
            Err(poisoned) => *poisoned.into_inner() = Some(frame),
        }
    }

    /// The most recent frame, or `None` before the first publish.
    pub fn latest(&self) -> Option<Arc<Vec<u8>>> {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Per-state annotation color, RGB.
fn state_color(state: ControllerState) -> [u8; 3] {
    match state {
        ControllerState::Searching => [220, 40, 40],
        ControllerState::Approaching | ControllerState::Creeping => [40, 200, 80],
        ControllerState::Holding => [240, 220, 40],
        ControllerState::Backing | ControllerState::TooClose => [240, 140, 40],
        ControllerState::Sitting => [180, 80, 220],
    }
}

/// Draw a 2 px axis-aligned rectangle outline onto an RGB buffer.
fn draw_rect(pixels: &mut [u8], width: u32, height: u32, det: &Detection, rgb: [u8; 3]) {
    let x1 = det.x1.max(0.0) as u32;
    let y1 = det.y1.max(0.0) as u32;
    let x2 = (det.x2 as u32).min(width.saturating_sub(1));
    let y2 = (det.y2 as u32).min(height.saturating_sub(1));
    if x2 <= x1 || y2 <= y1 {
        return;
    }

    let mut put = |x: u32, y: u32| {
        let idx = ((y * width + x) * 3) as usize;
        if idx + 2 < pixels.len() {
            pixels[idx..idx + 3].copy_from_slice(&rgb);
        }
    };

    for x in x1..=x2 {
        for dy in 0..2u32 {
            put(x, (y1 + dy).min(height - 1));
            put(x, y2.saturating_sub(dy));
        }
    }
    for y in y1..=y2 {
        for dx in 0..2u32 {
            put((x1 + dx).min(width - 1), y);
            put(x2.saturating_sub(dx), y);
        }
    }
}

/// Draw a short status strip along the top edge in the state color. The
/// strip length doubles as a crude legend: full width while a target is
/// boxed, half width while searching.
fn draw_status_strip(pixels: &mut [u8], width: u32, state: ControllerState, tracked: bool) {
    let rgb = state_color(state);
    let strip_w = if tracked { width } else { width / 2 };
    for y in 0..4u32 {
        for x in 0..strip_w {
            let idx = ((y * width + x) * 3) as usize;
            if idx + 2 < pixels.len() {
                pixels[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
    }
}

/// Swatch color for the active target, RGB. `all` renders white.
fn target_color(target: TargetSpec) -> [u8; 3] {
    use crate::target::BallColor;
    match target {
        TargetSpec::All => [255, 255, 255],
        TargetSpec::Only(BallColor::Green) => [40, 200, 80],
        TargetSpec::Only(BallColor::Pink) => [230, 60, 200],
        TargetSpec::Only(BallColor::Yellow) => [240, 220, 40],
    }
}

/// Draw the active-target swatch in the top-right corner.
fn draw_target_swatch(pixels: &mut [u8], width: u32, height: u32, target: TargetSpec) {
    let rgb = target_color(target);
    let edge = 10u32.min(width).min(height);
    for y in 0..edge {
        for x in width.saturating_sub(edge)..width {
            let idx = ((y * width + x) * 3) as usize;
            if idx + 2 < pixels.len() {
                pixels[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
    }
}

/// Annotate the color view of `pair` and encode it as JPEG.
pub fn render_preview(
    pair: &FramePair,
    detection: Option<&Detection>,
    state: ControllerState,
    target: TargetSpec,
    variant: ModelVariant,
) -> Result<Vec<u8>> {
    let mut pixels = pair.color.clone();

    if let Some(det) = detection {
        draw_rect(&mut pixels, pair.width, pair.height, det, state_color(state));
        log::trace!(
            "preview: boxed {} at conf {:.2}",
            variant.class_name(det.class_id),
            det.confidence
        );
    }
    draw_status_strip(&mut pixels, pair.width, state, detection.is_some());
    draw_target_swatch(&mut pixels, pair.width, pair.height, target);

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder
        .encode(
            &pixels,
            pair.width,
            pair.height,
            image::ExtendedColorType::Rgb8,
        )
        .context("encode preview JPEG")?;
    Ok(jpeg)
}
