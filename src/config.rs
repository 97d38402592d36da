use anyhow::Result;
use std::path::PathBuf;
use usls::Config;

/// Default minimum confidence for neural face boxes
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Cascade scan parameters: pyramid step, neighbour votes and smallest window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParameters {
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub min_size: u32,
}

impl DetectionParameters {
    pub const fn new(scale_factor: f32, min_neighbors: u32, min_size: u32) -> Self {
        Self {
            scale_factor,
            min_neighbors,
            min_size,
        }
    }

    /// Presets tried by the cascade fallback, in order
    pub const PRESETS: [DetectionParameters; 6] = [
        DetectionParameters::new(1.10, 5, 30),
        DetectionParameters::new(1.05, 3, 20),
        DetectionParameters::new(1.10, 3, 20),
        DetectionParameters::new(1.15, 4, 30),
        DetectionParameters::new(1.20, 6, 40),
        DetectionParameters::new(1.05, 7, 50),
    ];
}

/// Neural detector assets and runtime options
#[derive(Debug, Clone)]
pub struct DnnAssets {
    pub model_file: PathBuf,
    pub device: String,
    pub dtype: String,
    pub version: f32,
    pub input_width: usize,
    pub input_height: usize,
    pub confidence_threshold: f32,
    /// Only keep boxes carrying this class name (face models usually have one class)
    pub class_name: Option<String>,
}

impl DnnAssets {
    pub fn new(model_file: impl Into<PathBuf>) -> Self {
        Self {
            model_file: model_file.into(),
            device: String::from("cpu:0"),
            dtype: String::from("auto"),
            version: 8.0,
            input_width: 640,
            input_height: 640,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            class_name: None,
        }
    }
}

/// Immutable description of every detector asset to load.
///
/// Each asset is optional on its own; the ensemble keeps whatever loads.
#[derive(Debug, Clone, Default)]
pub struct AssetConfig {
    pub dnn: Option<DnnAssets>,
    pub cascade_paths: Vec<PathBuf>,
}

impl AssetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dnn(mut self, dnn: DnnAssets) -> Self {
        self.dnn = Some(dnn);
        self
    }

    pub fn with_cascade(mut self, path: impl Into<PathBuf>) -> Self {
        self.cascade_paths.push(path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dnn.is_none() && self.cascade_paths.is_empty()
    }
}

/// Builds a YOLO face model configuration with a fixed input resolution
pub fn build_model_config(assets: &DnnAssets) -> Result<Config> {
    let model_file = assets.model_file.to_string_lossy();
    let config = Config::yolo()
        .with_model_file(&model_file)
        .with_task("det".parse()?)
        .with_version(assets.version.try_into()?)
        .with_model_dtype(assets.dtype.parse()?)
        .with_model_device(assets.device.parse()?)
        .with_model_ixx(0, 0, (1, 1, 1).into())
        .with_model_ixx(
            0,
            2,
            (assets.input_height, assets.input_height, assets.input_height).into(),
        )
        .with_model_ixx(
            0,
            3,
            (assets.input_width, assets.input_width, assets.input_width).into(),
        )
        .with_class_confs(&[assets.confidence_threshold])
        .with_model_num_dry_run(1);

    Ok(config)
}
