//! Face localization and canonical cropping.
//!
//! An image goes through a [`DetectorEnsemble`] (neural detector first, Haar
//! cascades as fallback) and the resulting candidates are handed to the crop
//! planner, which frames the largest face with context, or falls back to a
//! centered square, and letterboxes the result onto a fixed-size black canvas.
//!
//! ```no_run
//! use facecrop::{AssetConfig, DetectorEnsemble, FaceCropper, TargetSize};
//!
//! let assets = AssetConfig::new().with_cascade("haarcascade_frontalface_default.xml");
//! let cropper = FaceCropper::new(DetectorEnsemble::load(&assets), TargetSize::default());
//! let image = image::open("portrait.jpg")?.to_rgb8();
//! let outcome = cropper.process(&image)?;
//! outcome.image.save("portrait_crop.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bbox;
pub mod canvas;
pub mod cascade;
pub mod config;
pub mod crop;
pub mod detector;
pub mod error;
pub mod grouping;
pub mod pipeline;

pub use bbox::BoundingBox;
pub use config::{AssetConfig, DetectionParameters, DnnAssets};
pub use crop::{CropPlan, TargetSize, plan_and_extract, plan_crop};
pub use detector::{CandidateSet, DetectorEnsemble, FaceStrategy};
pub use error::CropError;
pub use pipeline::{CropOutcome, FaceCropper};
