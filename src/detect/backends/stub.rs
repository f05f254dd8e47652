//! Scripted backend for tests.

use anyhow::Result;

use crate::detect::backend::{DetectorBackend, ModelVariant};
use crate::detect::result::Detection;

/// Stub backend that plays back a script of detection frames.
///
/// Each call to `detect` consumes the next scripted frame; after the script
/// runs out every call returns no detections. The allowed-class filter is
/// honored, so tests exercise the same filtering path as real backends.
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    cursor: usize,
    variant: ModelVariant,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script,
            cursor: 0,
            variant: ModelVariant::Custom,
        }
    }

    pub fn with_variant(mut self, variant: ModelVariant) -> Self {
        self.variant = variant;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn detect(
        &mut self,
        _pixels: &[u8],
        _width: u32,
        _height: u32,
        allowed: &[u32],
    ) -> Result<Vec<Detection>> {
        let frame = match self.script.get(self.cursor) {
            Some(frame) => {
                self.cursor += 1;
                frame.clone()
            }
            None => Vec::new(),
        };
        Ok(frame
            .into_iter()
            .filter(|det| allowed.contains(&det.class_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection {
            x1: 100.0,
            y1: 100.0,
            x2: 140.0,
            y2: 140.0,
            class_id,
            confidence,
        }
    }

    #[test]
    fn script_plays_in_order_then_runs_dry() {
        let mut backend = StubBackend::with_script(vec![vec![det(0, 0.9)], vec![]]);
        let allowed = [0, 1, 2];

        assert_eq!(backend.detect(&[], 640, 480, &allowed).unwrap().len(), 1);
        assert!(backend.detect(&[], 640, 480, &allowed).unwrap().is_empty());
        assert!(backend.detect(&[], 640, 480, &allowed).unwrap().is_empty());
    }

    #[test]
    fn allowed_filter_is_honored() {
        let mut backend = StubBackend::with_script(vec![vec![det(0, 0.9), det(2, 0.8)]]);
        let hits = backend.detect(&[], 640, 480, &[2]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].class_id, 2);
    }
}
