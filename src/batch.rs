use anyhow::{Context, Result, bail};
use facecrop::{CropOutcome, FaceCropper};
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Checks the file extension against the supported image formats (case-insensitive)
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Resolves the source argument into a sorted list of image files
///
/// A file is returned as is; a directory is scanned one level deep.
pub fn collect_sources(source: &Path) -> Result<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        bail!("source not found: {}", source.display());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(source).with_context(|| format!("reading {}", source.display()))? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `<output_dir>/<stem>_crop.png`
pub fn output_path_for(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("image"));
    output_dir.join(format!("{}_crop.png", stem))
}

/// Decodes one file, crops it and writes the canvas next to the other results
pub fn process_file(cropper: &FaceCropper, source: &Path, output_dir: &Path) -> Result<(CropOutcome, PathBuf)> {
    let image = image::open(source)
        .with_context(|| format!("decoding {}", source.display()))?
        .to_rgb8();
    let outcome = cropper
        .process(&image)
        .with_context(|| format!("cropping {}", source.display()))?;

    let output = output_path_for(output_dir, source);
    outcome
        .image
        .save(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok((outcome, output))
}

/// Counts of how each image in a run was handled
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub faces: usize,
    pub fallbacks: usize,
    pub failures: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &CropOutcome) {
        if outcome.used_fallback() {
            self.fallbacks += 1;
        } else {
            self.faces += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn total(&self) -> usize {
        self.faces + self.fallbacks + self.failures
    }
}
