use image::RgbImage;
use tracing::debug;

use crate::bbox::BoundingBox;
use crate::crop::{self, CropPlan, TargetSize};
use crate::detector::DetectorEnsemble;
use crate::error::CropError;

/// Result of cropping one image
#[derive(Debug, Clone)]
pub struct CropOutcome {
    /// Canvas of exactly the configured target size
    pub image: RgbImage,
    /// Face that drove the crop, `None` when the center fallback was used
    pub face: Option<BoundingBox>,
    /// Number of candidates after deduplication
    pub candidate_count: usize,
    /// Strategy that produced the candidates
    pub strategy: Option<&'static str>,
    pub plan: CropPlan,
}

impl CropOutcome {
    pub fn used_fallback(&self) -> bool {
        self.face.is_none()
    }
}

/// Detect-then-crop pipeline for single images
pub struct FaceCropper {
    ensemble: DetectorEnsemble,
    target_size: TargetSize,
}

impl FaceCropper {
    pub fn new(ensemble: DetectorEnsemble, target_size: TargetSize) -> Self {
        Self {
            ensemble,
            target_size,
        }
    }

    pub fn ensemble(&self) -> &DetectorEnsemble {
        &self.ensemble
    }

    pub fn target_size(&self) -> TargetSize {
        self.target_size
    }

    /// Detects faces and produces the canonical crop
    ///
    /// # Returns
    /// The canvas plus what was detected. Missing detectors and "no face" are
    /// not errors; only invalid input and crop/resize failures are.
    pub fn process(&self, image: &RgbImage) -> Result<CropOutcome, CropError> {
        let candidates = self.ensemble.detect(image)?;
        let (width, height) = image.dimensions();

        let plan = crop::plan_crop(width, height, candidates.boxes(), self.target_size);
        let face = crop::select_largest(candidates.boxes()).copied();
        debug!(
            width,
            height,
            candidates = candidates.len(),
            strategy = candidates.strategy().unwrap_or("none"),
            source_rect = ?plan.source_rect,
            "planned crop"
        );

        let canvas = crop::apply_plan(image, &plan)?;
        Ok(CropOutcome {
            image: canvas,
            face,
            candidate_count: candidates.len(),
            strategy: candidates.strategy(),
            plan,
        })
    }
}
