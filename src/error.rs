use thiserror::Error;

/// Errors surfaced by the face crop pipeline.
#[derive(Debug, Error)]
pub enum CropError {
    #[error("invalid image: {width}x{height} buffer cannot be processed")]
    InvalidImage { width: u32, height: u32 },

    #[error("detector asset '{asset}' unavailable: {reason}")]
    DetectionAssetUnavailable { asset: String, reason: String },

    #[error("crop rectangle has zero area after clamping")]
    EmptyCropResult,

    #[error("failed to resize crop: {0}")]
    ResizeFailure(String),
}

impl CropError {
    pub(crate) fn asset_unavailable(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DetectionAssetUnavailable {
            asset: asset.into(),
            reason: reason.into(),
        }
    }
}
