use image::RgbImage;
use tracing::debug;

use crate::bbox::BoundingBox;
use crate::canvas;
use crate::error::CropError;

/// Context width as a multiple of the face width
const CONTEXT_WIDTH_FACTOR: f32 = 4.0;
/// Context height as a multiple of the face height (faces need more headroom)
const CONTEXT_HEIGHT_FACTOR: f32 = 5.0;
/// Side of the no-face square relative to the shorter image dimension
const FALLBACK_SQUARE_FRACTION: f32 = 0.9;

/// Fixed output canvas size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::new(300, 400)
    }
}

/// Represents a crop area in the image before snapping to pixels
#[derive(Debug, Clone, PartialEq)]
pub struct CropArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropArea {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Snaps the area to whole pixels inside a `frame_width` x `frame_height` frame
    pub fn to_pixel_rect(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        // Extent first, so a rect slid against the far edge keeps its size
        let width = (self.width.max(0.0).round() as u32).min(frame_width);
        let height = (self.height.max(0.0).round() as u32).min(frame_height);
        let x = (self.x.max(0.0).round() as u32).min(frame_width - width);
        let y = (self.y.max(0.0).round() as u32).min(frame_height - height);
        BoundingBox::new(x, y, width, height)
    }
}

/// Source rectangle to extract and the canvas it is fitted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    pub source_rect: BoundingBox,
    pub target_size: TargetSize,
}

/// Places a span of `extent` centered on `center` inside `[0, limit]`
///
/// The span slides by the minimum amount needed to fit; a span longer than
/// the frame is clipped to the whole frame.
fn fit_span(center: f32, extent: f32, limit: f32) -> (f32, f32) {
    if extent >= limit {
        return (0.0, limit);
    }
    let start = center - extent / 2.0;
    let start = if start < 0.0 {
        0.0
    } else if start + extent > limit {
        limit - extent
    } else {
        start
    };
    (start, extent)
}

/// Picks the largest box by area; the first one wins ties
pub fn select_largest(candidates: &[BoundingBox]) -> Option<&BoundingBox> {
    candidates
        .iter()
        .reduce(|best, candidate| if candidate.area() > best.area() { candidate } else { best })
}

/// Calculates the context area around a detected face
///
/// # Arguments
/// * `frame_width` - Width of the source image
/// * `frame_height` - Height of the source image
/// * `face` - The face to frame
pub fn calculate_face_context_crop(frame_width: u32, frame_height: u32, face: &BoundingBox) -> CropArea {
    let (fw, fh) = (frame_width as f32, frame_height as f32);
    let (cx, cy) = face.center();

    let crop_width = (face.width as f32 * CONTEXT_WIDTH_FACTOR).max(fw / 2.0);
    let crop_height = (face.height as f32 * CONTEXT_HEIGHT_FACTOR).max(fh / 2.0);

    // Each axis is fitted on its own
    let (x, width) = fit_span(cx, crop_width, fw);
    let (y, height) = fit_span(cy, crop_height, fh);
    CropArea::new(x, y, width, height)
}

/// Calculates the centered square used when no face was found
pub fn calculate_no_face_crop(frame_width: u32, frame_height: u32) -> CropArea {
    let (fw, fh) = (frame_width as f32, frame_height as f32);
    let side = fw.min(fh) * FALLBACK_SQUARE_FRACTION;

    let (x, width) = fit_span(fw / 2.0, side, fw);
    let (y, height) = fit_span(fh / 2.0, side, fh);
    CropArea::new(x, y, width, height)
}

/// Calculates the source rectangle for an image of the given size
///
/// # Arguments
/// * `frame_width` - Width of the source image
/// * `frame_height` - Height of the source image
/// * `candidates` - Deduplicated face boxes, possibly empty
/// * `target_size` - Output canvas size
pub fn plan_crop(
    frame_width: u32,
    frame_height: u32,
    candidates: &[BoundingBox],
    target_size: TargetSize,
) -> CropPlan {
    let area = match select_largest(candidates) {
        Some(face) => calculate_face_context_crop(frame_width, frame_height, face),
        None => calculate_no_face_crop(frame_width, frame_height),
    };

    CropPlan {
        source_rect: area.to_pixel_rect(frame_width, frame_height),
        target_size,
    }
}

/// Extracts the planned rectangle and letterboxes it onto the target canvas
pub fn apply_plan(image: &RgbImage, plan: &CropPlan) -> Result<RgbImage, CropError> {
    if plan.source_rect.area() == 0 {
        return Err(CropError::EmptyCropResult);
    }
    let cropped = canvas::extract(image, &plan.source_rect)?;
    canvas::letterbox(&cropped, plan.target_size)
}

/// Frames the best candidate (or the image center) and returns a fixed-size canvas
pub fn plan_and_extract(
    image: &RgbImage,
    candidates: &[BoundingBox],
    target_size: TargetSize,
) -> Result<RgbImage, CropError> {
    canvas::ensure_valid(image)?;
    let plan = plan_crop(image.width(), image.height(), candidates, target_size);
    debug!(candidates = candidates.len(), source_rect = ?plan.source_rect, "crop plan");
    apply_plan(image, &plan)
}
