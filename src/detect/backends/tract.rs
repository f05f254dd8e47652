#![cfg(feature = "backend-tract")]

//! Tract-based ONNX backend for YOLO-family detection models.
//!
//! Loads a local model file and performs inference on RGB frames; no network
//! I/O at runtime. The same backend serves both weight variants (generic
//! COCO weights and the custom ball weights); the variant only changes the
//! class-id space and the output tensor's class dimension.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorBackend, ModelVariant};
use crate::detect::result::Detection;

/// Default model input edge, pixels (square input).
const DEFAULT_INPUT_SIZE: u32 = 640;
/// Letterbox padding fill, the YOLO-conventional neutral gray.
const PAD_FILL: u8 = 114;

pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    variant: ModelVariant,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, variant: ModelVariant) -> Result<Self> {
        Self::with_input_size(model_path, variant, DEFAULT_INPUT_SIZE)
    }

    pub fn with_input_size<P: AsRef<Path>>(
        model_path: P,
        variant: ModelVariant,
        input_size: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            variant,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 100,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn class_count(&self) -> usize {
        match self.variant {
            ModelVariant::Pretrained => 80,
            ModelVariant::Custom => 3,
        }
    }

    /// Letterbox the frame into the square model input and return the tensor
    /// plus the scale/padding needed to map boxes back to frame space.
    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<(Tensor, Letterbox)> {
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

        let frame = RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;

        let edge = self.input_size;
        let scale = (edge as f32 / width as f32).min(edge as f32 / height as f32);
        let scaled_w = ((width as f32 * scale).round() as u32).max(1);
        let scaled_h = ((height as f32 * scale).round() as u32).max(1);
        let pad_x = (edge - scaled_w) / 2;
        let pad_y = (edge - scaled_h) / 2;

        let resized = image::imageops::resize(&frame, scaled_w, scaled_h, FilterType::Triangle);
        let mut canvas = RgbImage::from_pixel(edge, edge, image::Rgb([PAD_FILL; 3]));
        image::imageops::replace(&mut canvas, &resized, pad_x.into(), pad_y.into());

        let edge = edge as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, edge, edge),
            |(_, channel, y, x)| canvas.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );

        Ok((
            input.into_tensor(),
            Letterbox {
                scale,
                pad_x: pad_x as f32,
                pad_y: pad_y as f32,
            },
        ))
    }

    /// Decode YOLO output `[1, 4 + classes, anchors]` into frame-space boxes.
    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        letterbox: &Letterbox,
        frame_w: u32,
        frame_h: u32,
        allowed: &[u32],
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected output shape {:?}", shape));
        }
        let rows = shape[1];
        let anchors = shape[2];
        let class_count = self.class_count();
        if rows != 4 + class_count {
            return Err(anyhow!(
                "output has {} rows, expected {} for this weight variant",
                rows,
                4 + class_count
            ));
        }

        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let mut best_class = None;
            let mut best_score = self.confidence_threshold;
            for class in 0..class_count {
                let class = class as u32;
                if !allowed.contains(&class) {
                    continue;
                }
                let score = view[[0, 4 + class as usize, anchor]];
                if score > best_score {
                    best_score = score;
                    best_class = Some(class);
                }
            }
            let Some(class_id) = best_class else {
                continue;
            };

            // Center/size in model pixel space, undo the letterbox.
            let cx = (view[[0, 0, anchor]] - letterbox.pad_x) / letterbox.scale;
            let cy = (view[[0, 1, anchor]] - letterbox.pad_y) / letterbox.scale;
            let w = view[[0, 2, anchor]] / letterbox.scale;
            let h = view[[0, 3, anchor]] / letterbox.scale;

            candidates.push(Detection {
                x1: (cx - w / 2.0).clamp(0.0, frame_w as f32),
                y1: (cy - h / 2.0).clamp(0.0, frame_h as f32),
                x2: (cx + w / 2.0).clamp(0.0, frame_w as f32),
                y2: (cy + h / 2.0).clamp(0.0, frame_h as f32),
                class_id,
                confidence: best_score,
            });
        }

        Ok(non_max_suppression(
            candidates,
            self.iou_threshold,
            self.max_detections,
        ))
    }
}

struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Greedy per-class non-maximum suppression, highest confidence first.
fn non_max_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        allowed: &[u32],
    ) -> Result<Vec<Detection>> {
        let (input, letterbox) = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_output(outputs, &letterbox, width, height, allowed)
    }

    fn warm_up(&mut self) -> Result<()> {
        // First run pays graph setup costs; do it on a blank frame so the
        // control loop never sees that latency.
        let edge = self.input_size;
        let blank = vec![0u8; (edge * edge * 3) as usize];
        let _ = self.detect(&blank, edge, edge, &[])?;
        Ok(())
    }
}
