//! Detector backend trait and the weight-variant seam.

use anyhow::Result;

use crate::detect::result::Detection;
use crate::target::{BallColor, TargetSpec};

/// COCO class id for "sports ball" in the pretrained weights.
pub const COCO_SPORTS_BALL: u32 = 32;

/// Which weights a backend was built around.
///
/// The two variants are the same capability; the choice is made at
/// construction time and decides the class-id space, never via runtime type
/// inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelVariant {
    /// Generic pretrained weights (COCO classes); every ball is class 32.
    Pretrained,
    /// Custom-trained ball weights (green/pink/yellow as classes 0..=2).
    Custom,
}

impl ModelVariant {
    /// Expand a target spec into the class ids this variant can pursue.
    ///
    /// The pretrained weights cannot tell ball colors apart, so every spec
    /// collapses to the single sports-ball class.
    pub fn allowed_class_ids(&self, spec: TargetSpec) -> Vec<u32> {
        match self {
            ModelVariant::Pretrained => vec![COCO_SPORTS_BALL],
            ModelVariant::Custom => match spec {
                TargetSpec::All => vec![
                    BallColor::Green.class_id(),
                    BallColor::Pink.class_id(),
                    BallColor::Yellow.class_id(),
                ],
                TargetSpec::Only(color) => vec![color.class_id()],
            },
        }
    }

    /// Human-readable class label for logging and preview annotation.
    pub fn class_name(&self, class_id: u32) -> &'static str {
        match self {
            ModelVariant::Pretrained => {
                if class_id == COCO_SPORTS_BALL {
                    "sports_ball"
                } else {
                    "object"
                }
            }
            ModelVariant::Custom => match BallColor::from_class_id(class_id) {
                Some(BallColor::Green) => "green_ball",
                Some(BallColor::Pink) => "pink_ball",
                Some(BallColor::Yellow) => "yellow_ball",
                None => "object",
            },
        }
    }
}

/// Detector backend: color frame + allowed classes in, detections out.
///
/// Implementations must treat the pixel slice as read-only and ephemeral and
/// must honor `allowed`: a detection whose class id is not listed must not be
/// returned.
pub trait DetectorBackend: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// The weight variant this backend was constructed with.
    fn variant(&self) -> ModelVariant;

    /// Run detection on an RGB8 frame.
    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        allowed: &[u32],
    ) -> Result<Vec<Detection>>;

    /// Optional warm-up hook (first inference is often the slow one).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretrained_collapses_every_spec_to_sports_ball() {
        let variant = ModelVariant::Pretrained;
        assert_eq!(variant.allowed_class_ids(TargetSpec::All), vec![32]);
        assert_eq!(
            variant.allowed_class_ids(TargetSpec::Only(BallColor::Pink)),
            vec![32]
        );
    }

    #[test]
    fn custom_expands_spec_to_class_ids() {
        let variant = ModelVariant::Custom;
        assert_eq!(variant.allowed_class_ids(TargetSpec::All), vec![0, 1, 2]);
        assert_eq!(
            variant.allowed_class_ids(TargetSpec::Only(BallColor::Yellow)),
            vec![2]
        );
    }

    #[test]
    fn class_names_follow_variant() {
        assert_eq!(ModelVariant::Pretrained.class_name(32), "sports_ball");
        assert_eq!(ModelVariant::Custom.class_name(1), "pink_ball");
        assert_eq!(ModelVariant::Custom.class_name(9), "object");
    }
}
