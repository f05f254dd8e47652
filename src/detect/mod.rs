//! Object detection: backend trait, concrete backends, and the adapter the
//! control loop talks to.

mod backend;
mod backends;
mod result;

pub use backend::{DetectorBackend, ModelVariant, COCO_SPORTS_BALL};
pub use backends::BlobBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::Detection;

use anyhow::{anyhow, Result};

use crate::frame::FramePair;
use crate::target::TargetSpec;

/// Detector settings as they appear in configuration.
#[derive(Clone, Debug)]
pub struct DetectorSettings {
    /// Backend name: `blob`, `stub`, or `tract`.
    pub backend: String,
    /// Weight variant for model-backed backends.
    pub variant: ModelVariant,
    /// ONNX model path (tract backend only).
    pub model_path: Option<String>,
    /// Confidence threshold override (tract backend only).
    pub confidence_threshold: Option<f32>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: "blob".to_string(),
            variant: ModelVariant::Custom,
            model_path: None,
            confidence_threshold: None,
        }
    }
}

/// Adapter between the control loop and a detector backend.
///
/// Expands the active `TargetSpec` into the backend's class-id space, runs
/// the backend, and returns detections ordered by descending confidence so
/// the first element is the one the policy tracks.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
}

impl Detector {
    pub fn new(backend: Box<dyn DetectorBackend>) -> Self {
        Self { backend }
    }

    /// Construct the backend named in `settings`.
    ///
    /// Backend choice happens here, at construction time; after this point
    /// there is one capability interface and no runtime type inspection.
    pub fn from_settings(settings: &DetectorSettings) -> Result<Self> {
        match settings.backend.as_str() {
            "blob" => Ok(Self::new(Box::new(BlobBackend::new()))),
            "stub" => Ok(Self::new(Box::new(StubBackend::new()))),
            "tract" => {
                #[cfg(feature = "backend-tract")]
                {
                    let model_path = settings
                        .model_path
                        .as_deref()
                        .ok_or_else(|| anyhow!("tract backend requires detector.model_path"))?;
                    let mut backend = TractBackend::new(model_path, settings.variant)?;
                    if let Some(threshold) = settings.confidence_threshold {
                        backend = backend.with_threshold(threshold);
                    }
                    Ok(Self::new(Box::new(backend)))
                }
                #[cfg(not(feature = "backend-tract"))]
                {
                    Err(anyhow!(
                        "tract backend requires the backend-tract feature"
                    ))
                }
            }
            other => Err(anyhow!("unknown detector backend {other:?}")),
        }
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn variant(&self) -> ModelVariant {
        self.backend.variant()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Run detection on the color view of `pair`, restricted to `target`.
    pub fn detect(&mut self, pair: &FramePair, target: TargetSpec) -> Result<Vec<Detection>> {
        let allowed = self.backend.variant().allowed_class_ids(target);
        let mut detections =
            self.backend
                .detect(&pair.color, pair.width, pair.height, &allowed)?;
        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::BallColor;

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection {
            x1: 10.0,
            y1: 10.0,
            x2: 20.0,
            y2: 20.0,
            class_id,
            confidence,
        }
    }

    fn blank_pair() -> FramePair {
        FramePair {
            color: vec![0; FramePair::color_len(64, 48)],
            depth: vec![0; FramePair::depth_len(64, 48)],
            width: 64,
            height: 48,
            depth_scale: 0.001,
        }
    }

    #[test]
    fn detections_come_back_confidence_sorted() {
        let backend = StubBackend::with_script(vec![vec![det(0, 0.4), det(1, 0.9), det(2, 0.6)]]);
        let mut detector = Detector::new(Box::new(backend));

        let hits = detector.detect(&blank_pair(), TargetSpec::All).unwrap();
        let confidences: Vec<f32> = hits.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.6, 0.4]);
    }

    #[test]
    fn target_spec_restricts_classes() {
        let backend = StubBackend::with_script(vec![vec![det(0, 0.9), det(1, 0.8)]]);
        let mut detector = Detector::new(Box::new(backend));

        let hits = detector
            .detect(&blank_pair(), TargetSpec::Only(BallColor::Pink))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].class_id, BallColor::Pink.class_id());
    }

    #[test]
    fn unknown_backend_is_a_construction_error() {
        let settings = DetectorSettings {
            backend: "quantum".to_string(),
            ..DetectorSettings::default()
        };
        assert!(Detector::from_settings(&settings).is_err());
    }
}
