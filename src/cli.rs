use argh::FromArgs;
use facecrop::{AssetConfig, DnnAssets, TargetSize};
use std::path::PathBuf;

/// Face Crop
#[derive(FromArgs, Debug)]
pub struct Args {
    /// source: image file or folder of images
    #[argh(option)]
    pub source: PathBuf,

    /// haar cascade xml file, may be repeated
    #[argh(option)]
    pub cascade: Vec<PathBuf>,

    /// yolo face model (onnx)
    #[argh(option)]
    pub model: Option<PathBuf>,

    /// model dtype
    #[argh(option, default = "String::from(\"auto\")")]
    pub dtype: String,

    /// version
    #[argh(option, default = "8.0")]
    pub ver: f32,

    /// device: cuda, cpu, mps
    #[argh(option, default = "String::from(\"cpu:0\")")]
    pub device: String,

    /// minimum detection confidence for the model
    #[argh(option, default = "0.5")]
    pub confidence: f32,

    /// output width
    #[argh(option, default = "300")]
    pub width: u32,

    /// output height
    #[argh(option, default = "400")]
    pub height: u32,

    /// output directory, defaults to ./runs/<timestamp>
    #[argh(option)]
    pub output_dir: Option<PathBuf>,
}

impl Args {
    /// Detector assets requested on the command line
    pub fn asset_config(&self) -> AssetConfig {
        let mut assets = AssetConfig::new();
        if let Some(model) = &self.model {
            let mut dnn = DnnAssets::new(model);
            dnn.device = self.device.clone();
            dnn.dtype = self.dtype.clone();
            dnn.version = self.ver;
            dnn.confidence_threshold = self.confidence;
            assets = assets.with_dnn(dnn);
        }
        for cascade in &self.cascade {
            assets = assets.with_cascade(cascade);
        }
        assets
    }

    pub fn target_size(&self) -> TargetSize {
        TargetSize::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["facecrop"], args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--source", "photos"]);
        assert_eq!(args.source, PathBuf::from("photos"));
        assert_eq!(args.target_size(), TargetSize::new(300, 400));
        assert!(args.output_dir.is_none());
        assert!(args.asset_config().is_empty());
    }

    #[test]
    fn test_asset_config_from_flags() {
        let args = parse(&[
            "--source",
            "a.jpg",
            "--cascade",
            "frontal.xml",
            "--cascade",
            "alt2.xml",
            "--model",
            "yolov8n-face.onnx",
            "--device",
            "cuda:0",
            "--confidence",
            "0.6",
        ]);
        let assets = args.asset_config();
        assert_eq!(
            assets.cascade_paths,
            vec![PathBuf::from("frontal.xml"), PathBuf::from("alt2.xml")]
        );
        let dnn = assets.dnn.unwrap();
        assert_eq!(dnn.model_file, PathBuf::from("yolov8n-face.onnx"));
        assert_eq!(dnn.device, "cuda:0");
        assert_eq!(dnn.dtype, "auto");
        assert!((dnn.confidence_threshold - 0.6).abs() < f32::EPSILON);
    }
}
