use anyhow::{Result, anyhow};
use image::RgbImage;
use image::imageops;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use usls::{Hbb, Image, Y, models::YOLO};

use crate::bbox::BoundingBox;
use crate::canvas;
use crate::cascade::HaarCascade;
use crate::config::{self, AssetConfig, DetectionParameters, DnnAssets};
use crate::error::CropError;

/// A face detection strategy evaluated by the ensemble.
///
/// Implementations must not mutate shared state visible across calls; the
/// ensemble may be used from several threads at once.
pub trait FaceStrategy: Send + Sync {
    /// Short name used in logs and crop outcomes
    fn name(&self) -> &'static str;

    /// Returns candidate face boxes, each clipped to the image
    fn detect(&self, image: &RgbImage) -> Result<Vec<BoundingBox>>;

    /// Whether the raw output needs overlap deduplication
    fn deduplicate(&self) -> bool {
        false
    }
}

/// Neural face detector backed by a YOLO face model
pub struct DnnStrategy {
    // Inference needs `&mut`, so calls are serialized per instance
    model: Mutex<YOLO>,
    confidence_threshold: f32,
    class_name: Option<String>,
}

impl DnnStrategy {
    pub fn load(assets: &DnnAssets) -> Result<Self, CropError> {
        let asset = assets.model_file.display().to_string();
        if !assets.model_file.is_file() {
            return Err(CropError::asset_unavailable(asset, "model file not found"));
        }

        let model = config::build_model_config(assets)
            .and_then(|config| Ok(YOLO::new(config.commit()?)?))
            .map_err(|err| CropError::asset_unavailable(&asset, err.to_string()))?;

        Ok(Self {
            model: Mutex::new(model),
            confidence_threshold: assets.confidence_threshold,
            class_name: assets.class_name.clone(),
        })
    }
}

/// Extracts face boxes whose confidence exceeds the threshold from one detection result
pub fn faces_above_threshold<'a>(
    detection: &'a Y,
    confidence_threshold: f32,
    class_name: Option<&str>,
) -> Vec<&'a Hbb> {
    if let Some(hbbs) = detection.hbbs() {
        hbbs.iter()
            .filter(|hbb| {
                let meets_threshold = hbb
                    .confidence()
                    .is_some_and(|confidence| confidence > confidence_threshold);

                let matches_name = match class_name {
                    Some(wanted) => hbb.name().is_some_and(|name| name == wanted),
                    None => true,
                };

                meets_threshold && matches_name
            })
            .collect()
    } else {
        vec![]
    }
}

impl FaceStrategy for DnnStrategy {
    fn name(&self) -> &'static str {
        "dnn"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<BoundingBox>> {
        let (width, height) = image.dimensions();
        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow!("face model lock poisoned"))?;
        let ys = model.forward(&[Image::from(image.clone())])?;

        Ok(ys
            .iter()
            .flat_map(|y| faces_above_threshold(y, self.confidence_threshold, self.class_name.as_deref()))
            .filter_map(|hbb| BoundingBox::from_hbb_clipped(hbb, width, height))
            .collect())
    }
}

/// Cascade fallback: every cascade, once per preset, pooled in discovery order
pub struct CascadeStrategy {
    cascades: Vec<(String, HaarCascade)>,
    presets: Vec<DetectionParameters>,
}

impl CascadeStrategy {
    pub fn new(cascades: Vec<(String, HaarCascade)>) -> Self {
        Self::with_presets(cascades, DetectionParameters::PRESETS.to_vec())
    }

    pub fn with_presets(cascades: Vec<(String, HaarCascade)>, presets: Vec<DetectionParameters>) -> Self {
        Self { cascades, presets }
    }

    pub fn cascade_count(&self) -> usize {
        self.cascades.len()
    }
}

impl FaceStrategy for CascadeStrategy {
    fn name(&self) -> &'static str {
        "haar-cascade"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<BoundingBox>> {
        let gray = imageops::grayscale(image);
        let mut pool = Vec::new();

        for (asset, cascade) in &self.cascades {
            for params in &self.presets {
                let found = cascade.detect_multi_scale(&gray, params);
                debug!(
                    cascade = %asset,
                    scale_factor = params.scale_factor,
                    min_neighbors = params.min_neighbors,
                    min_size = params.min_size,
                    found = found.len(),
                    "cascade pass"
                );
                pool.extend(found);
            }
        }
        Ok(pool)
    }

    fn deduplicate(&self) -> bool {
        true
    }
}

/// Drops boxes that overlap an already accepted box by more than half of the smaller area.
///
/// Greedy and order dependent: the first box of an overlapping pair survives.
pub fn dedup_overlapping(boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    let mut accepted: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let duplicate = accepted.iter().any(|kept| {
            let smaller = candidate.area().min(kept.area());
            candidate.intersection_area(kept) * 2 > smaller
        });
        if !duplicate {
            accepted.push(candidate);
        }
    }
    accepted
}

/// Face boxes found in one image, with the strategy that produced them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    boxes: Vec<BoundingBox>,
    strategy: Option<&'static str>,
}

impl CandidateSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(boxes: Vec<BoundingBox>, strategy: &'static str) -> Self {
        Self {
            boxes,
            strategy: Some(strategy),
        }
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    /// Name of the strategy that produced the boxes, `None` when nothing was found
    pub fn strategy(&self) -> Option<&'static str> {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Ordered list of face strategies, tried in priority order with early exit
pub struct DetectorEnsemble {
    strategies: Vec<Box<dyn FaceStrategy>>,
}

impl DetectorEnsemble {
    /// Builds the ensemble from whatever assets load.
    ///
    /// Missing or corrupt assets are logged and skipped; this never fails.
    pub fn load(assets: &AssetConfig) -> Self {
        let mut strategies: Vec<Box<dyn FaceStrategy>> = Vec::new();

        if let Some(dnn) = &assets.dnn {
            match DnnStrategy::load(dnn) {
                Ok(strategy) => {
                    info!(model = %dnn.model_file.display(), "loaded neural face detector");
                    strategies.push(Box::new(strategy));
                }
                Err(err) => warn!(error = %err, "neural face detector disabled"),
            }
        }

        let mut cascades = Vec::new();
        for path in &assets.cascade_paths {
            match HaarCascade::load(path) {
                Ok(cascade) => {
                    let (window_width, window_height) = cascade.window_size();
                    info!(
                        cascade = %path.display(),
                        stages = cascade.stage_count(),
                        window_width,
                        window_height,
                        "loaded haar cascade"
                    );
                    cascades.push((path.display().to_string(), cascade));
                }
                Err(err) => warn!(error = %err, "haar cascade disabled"),
            }
        }
        if !cascades.is_empty() {
            strategies.push(Box::new(CascadeStrategy::new(cascades)));
        }

        if strategies.is_empty() {
            warn!("no face detector assets available; every image will use the center crop");
        }
        Self::from_strategies(strategies)
    }

    /// Builds an ensemble from explicit strategies, highest priority first
    pub fn from_strategies(strategies: Vec<Box<dyn FaceStrategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the loaded strategies in priority order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn has_strategies(&self) -> bool {
        !self.strategies.is_empty()
    }

    /// Detects faces in a color image
    ///
    /// # Returns
    /// The first non-empty strategy result (deduplicated when the strategy asks for it),
    /// or an empty set when no strategy finds anything
    pub fn detect(&self, image: &RgbImage) -> Result<CandidateSet, CropError> {
        canvas::ensure_valid(image)?;

        for strategy in &self.strategies {
            let boxes = match strategy.detect(image) {
                Ok(boxes) => boxes,
                Err(err) => {
                    warn!(strategy = strategy.name(), error = %err, "face strategy failed; trying next");
                    continue;
                }
            };

            if boxes.is_empty() {
                debug!(strategy = strategy.name(), "no faces");
                continue;
            }

            let raw = boxes.len();
            let boxes = if strategy.deduplicate() {
                dedup_overlapping(boxes)
            } else {
                boxes
            };
            debug!(strategy = strategy.name(), raw, kept = boxes.len(), "faces found");
            return Ok(CandidateSet::new(boxes, strategy.name()));
        }

        Ok(CandidateSet::empty())
    }
}
