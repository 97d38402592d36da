//! Haar cascade face detector.
//!
//! Loads OpenCV cascade definitions (`<opencv_storage><cascade>` with a
//! boosted HAAR feature set) and scans an image pyramid with a sliding
//! window, in the manner of `detectMultiScale`.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use image::GrayImage;
use image::imageops::{self, FilterType};
use roxmltree::{Document, Node};

use crate::bbox::BoundingBox;
use crate::config::DetectionParameters;
use crate::error::CropError;
use crate::grouping::{GROUP_EPS, group_rectangles};

/// Stage sums are compared against the stage threshold with this slack
const STAGE_THRESHOLD_EPS: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct WeightedRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct HaarFeature {
    rects: Vec<WeightedRect>,
}

/// Internal tree node. Child offsets `<= 0` address leaf `-offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TreeNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct WeakClassifier {
    nodes: Vec<TreeNode>,
    leaves: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
struct Stage {
    threshold: f32,
    classifiers: Vec<WeakClassifier>,
}

/// A boosted Haar cascade loaded from an OpenCV XML definition
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    window_width: u32,
    window_height: u32,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

/// Summed-area tables of pixel values and squared pixel values
struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sqsum: Vec<u64>,
}

impl IntegralImage {
    fn new(gray: &GrayImage) -> Self {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sqsum = vec![0u64; stride * (h + 1)];
        let raw = gray.as_raw();

        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sqsum = 0u64;
            for x in 0..w {
                let v = raw[y * w + x] as u64;
                row_sum += v;
                row_sqsum += v * v;
                let idx = (y + 1) * stride + (x + 1);
                sum[idx] = sum[idx - stride] + row_sum;
                sqsum[idx] = sqsum[idx - stride] + row_sqsum;
            }
        }

        Self { stride, sum, sqsum }
    }

    fn rect(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        (table[y1 * stride + x1] + table[y0 * stride + x0])
            - (table[y0 * stride + x1] + table[y1 * stride + x0])
    }

    fn sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::rect(&self.sum, self.stride, x, y, w, h)
    }

    fn sqsum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::rect(&self.sqsum, self.stride, x, y, w, h)
    }
}

impl HaarCascade {
    /// Loads a cascade definition from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CropError> {
        let path = path.as_ref();
        let asset = path.display().to_string();
        let xml = fs::read_to_string(path)
            .map_err(|err| CropError::asset_unavailable(&asset, err.to_string()))?;
        Self::from_xml_str(&xml, &asset)
    }

    /// Parses a cascade definition; `asset` names the source in errors
    pub fn from_xml_str(xml: &str, asset: &str) -> Result<Self, CropError> {
        let invalid = |message: String| CropError::asset_unavailable(asset, message);

        let document = Document::parse(xml).map_err(|err| invalid(err.to_string()))?;
        let root = document.root_element();
        let cascade = if root.tag_name().name() == "cascade" {
            root
        } else {
            child_element(root, "cascade")
                .ok_or_else(|| invalid("missing <cascade> element".to_string()))?
        };

        if let Some(stage_type) = child_text(cascade, "stageType") {
            if stage_type != "BOOST" {
                return Err(invalid(format!("unsupported stage type '{stage_type}'")));
            }
        }
        let feature_type = child_text(cascade, "featureType")
            .ok_or_else(|| invalid("missing <featureType> (legacy cascade format?)".to_string()))?;
        if feature_type != "HAAR" {
            return Err(invalid(format!("unsupported feature type '{feature_type}'")));
        }

        let window_width = parse_child::<u32>(cascade, "width").map_err(&invalid)?;
        let window_height = parse_child::<u32>(cascade, "height").map_err(&invalid)?;
        if window_width <= 2 || window_height <= 2 {
            return Err(invalid(format!(
                "window {window_width}x{window_height} is too small"
            )));
        }

        let stages_node = child_element(cascade, "stages")
            .ok_or_else(|| invalid("missing <stages>".to_string()))?;
        let stages = elements(stages_node)
            .map(parse_stage)
            .collect::<Result<Vec<_>, _>>()
            .map_err(&invalid)?;
        if stages.is_empty() {
            return Err(invalid("cascade has no stages".to_string()));
        }

        let features_node = child_element(cascade, "features")
            .ok_or_else(|| invalid("missing <features>".to_string()))?;
        let features = elements(features_node)
            .map(|node| parse_feature(node, window_width, window_height))
            .collect::<Result<Vec<_>, _>>()
            .map_err(&invalid)?;

        let cascade = HaarCascade {
            window_width,
            window_height,
            stages,
            features,
        };
        cascade.validate().map_err(invalid)?;
        Ok(cascade)
    }

    /// Base detection window as `(width, height)`
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn validate(&self) -> Result<(), String> {
        for (si, stage) in self.stages.iter().enumerate() {
            for classifier in &stage.classifiers {
                if classifier.nodes.is_empty() {
                    return Err(format!("stage {si} has a classifier without nodes"));
                }
                for (ni, node) in classifier.nodes.iter().enumerate() {
                    if node.feature >= self.features.len() {
                        return Err(format!(
                            "stage {si} references feature {} of {}",
                            node.feature,
                            self.features.len()
                        ));
                    }
                    for child in [node.left, node.right] {
                        // Child nodes always come after their parent
                        let in_range = if child > 0 {
                            (child as usize) > ni && (child as usize) < classifier.nodes.len()
                        } else {
                            (child.unsigned_abs() as usize) < classifier.leaves.len()
                        };
                        if !in_range {
                            return Err(format!("stage {si} has a dangling tree offset {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn feature_value(&self, feature: &HaarFeature, integral: &IntegralImage, x: u32, y: u32) -> f32 {
        feature
            .rects
            .iter()
            .map(|r| r.weight * integral.sum(x + r.x, y + r.y, r.width, r.height) as f32)
            .sum()
    }

    /// Runs every stage on the window at `(x, y)`
    fn accepts(&self, integral: &IntegralImage, x: u32, y: u32) -> bool {
        // Variance normalisation over the window minus a one pixel border
        let (nw, nh) = (self.window_width - 2, self.window_height - 2);
        let area = (nw * nh) as f64;
        let s = integral.sum(x + 1, y + 1, nw, nh) as f64;
        let sq = integral.sqsum(x + 1, y + 1, nw, nh) as f64;
        let nf = area * sq - s * s;
        let nf = if nf > 0.0 { nf.sqrt() as f32 } else { 1.0 };

        for stage in &self.stages {
            let mut stage_sum = 0.0f32;
            for classifier in &stage.classifiers {
                let mut offset = 0i32;
                loop {
                    let node = &classifier.nodes[offset as usize];
                    let value = self.feature_value(&self.features[node.feature], integral, x, y) / nf;
                    offset = if value < node.threshold {
                        node.left
                    } else {
                        node.right
                    };
                    if offset <= 0 {
                        break;
                    }
                }
                stage_sum += classifier.leaves[offset.unsigned_abs() as usize];
            }
            if stage_sum < stage.threshold - STAGE_THRESHOLD_EPS {
                return false;
            }
        }
        true
    }

    /// Scans one pyramid level and pushes hits in source-image coordinates
    fn scan_level(&self, level: &GrayImage, factor: f64, hits: &mut Vec<BoundingBox>) {
        let integral = IntegralImage::new(level);
        let step = if factor > 2.0 { 1 } else { 2 };
        let win_w = (self.window_width as f64 * factor).round() as u32;
        let win_h = (self.window_height as f64 * factor).round() as u32;

        for y in (0..=level.height() - self.window_height).step_by(step) {
            for x in (0..=level.width() - self.window_width).step_by(step) {
                if self.accepts(&integral, x, y) {
                    hits.push(BoundingBox::new(
                        (x as f64 * factor).round() as u32,
                        (y as f64 * factor).round() as u32,
                        win_w,
                        win_h,
                    ));
                }
            }
        }
    }

    /// Detects objects at multiple scales
    ///
    /// # Arguments
    /// * `gray` - Grayscale source image
    /// * `params` - Pyramid scale step, neighbour votes and minimum window size
    ///
    /// # Returns
    /// Grouped boxes clipped to the image, in cluster order
    pub fn detect_multi_scale(&self, gray: &GrayImage, params: &DetectionParameters) -> Vec<BoundingBox> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 || params.scale_factor <= 1.0 {
            return Vec::new();
        }

        let mut hits = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let scaled_w = (width as f64 / factor).round() as u32;
            let scaled_h = (height as f64 / factor).round() as u32;
            if scaled_w <= self.window_width || scaled_h <= self.window_height {
                break;
            }

            let win_w = (self.window_width as f64 * factor).round() as u32;
            let win_h = (self.window_height as f64 * factor).round() as u32;
            if win_w >= params.min_size && win_h >= params.min_size {
                let level: Cow<GrayImage> = if scaled_w == width && scaled_h == height {
                    Cow::Borrowed(gray)
                } else {
                    Cow::Owned(imageops::resize(gray, scaled_w, scaled_h, FilterType::Triangle))
                };
                self.scan_level(&level, factor, &mut hits);
            }

            factor *= params.scale_factor as f64;
        }

        group_rectangles(&hits, params.min_neighbors, GROUP_EPS)
            .into_iter()
            .filter_map(|b| b.clip_to(width, height))
            .collect()
    }
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|child| child.tag_name().name() == tag)
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
}

fn parse_child<T: std::str::FromStr>(node: Node<'_, '_>, tag: &str) -> Result<T, String> {
    let raw = child_text(node, tag).ok_or_else(|| format!("missing <{tag}>"))?;
    raw.parse::<T>()
        .map_err(|_| format!("invalid <{tag}> value '{raw}'"))
}

fn parse_numbers<T: std::str::FromStr>(raw: &str, tag: &str) -> Result<Vec<T>, String> {
    raw.split_whitespace()
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|_| format!("invalid number '{token}' in <{tag}>"))
        })
        .collect()
}

fn parse_stage(node: Node<'_, '_>) -> Result<Stage, String> {
    let threshold = parse_child::<f32>(node, "stageThreshold")?;
    let weak = child_element(node, "weakClassifiers").ok_or("stage without <weakClassifiers>")?;
    let classifiers = elements(weak)
        .map(parse_weak_classifier)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage {
        threshold,
        classifiers,
    })
}

fn parse_weak_classifier(node: Node<'_, '_>) -> Result<WeakClassifier, String> {
    let raw_nodes = child_text(node, "internalNodes").ok_or("missing <internalNodes>")?;
    let values = parse_numbers::<f64>(raw_nodes, "internalNodes")?;
    if values.is_empty() || values.len() % 4 != 0 {
        return Err(format!(
            "<internalNodes> holds {} values; expected groups of 4",
            values.len()
        ));
    }
    let nodes = values
        .chunks_exact(4)
        .map(|chunk| {
            if chunk[2] < 0.0 {
                return Err(format!("negative feature index {}", chunk[2]));
            }
            Ok(TreeNode {
                left: chunk[0] as i32,
                right: chunk[1] as i32,
                feature: chunk[2] as usize,
                threshold: chunk[3] as f32,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let raw_leaves = child_text(node, "leafValues").ok_or("missing <leafValues>")?;
    let leaves = parse_numbers::<f32>(raw_leaves, "leafValues")?;

    Ok(WeakClassifier { nodes, leaves })
}

fn parse_feature(node: Node<'_, '_>, window_width: u32, window_height: u32) -> Result<HaarFeature, String> {
    if let Some(tilted) = child_text(node, "tilted") {
        if tilted != "0" {
            return Err("tilted Haar features are not supported".to_string());
        }
    }

    let rects_node = child_element(node, "rects").ok_or("feature without <rects>")?;
    let rects = elements(rects_node)
        .map(|rect| {
            let raw = rect.text().unwrap_or_default();
            let values = parse_numbers::<f32>(raw, "rects")?;
            if values.len() != 5 {
                return Err(format!("feature rect '{}' needs 5 values", raw.trim()));
            }
            if values[..4].iter().any(|v| *v < 0.0) {
                return Err(format!("feature rect '{}' has negative geometry", raw.trim()));
            }
            let r = WeightedRect {
                x: values[0] as u32,
                y: values[1] as u32,
                width: values[2] as u32,
                height: values[3] as u32,
                weight: values[4],
            };
            if r.x + r.width > window_width || r.y + r.height > window_height {
                return Err(format!("feature rect '{}' exceeds the window", raw.trim()));
            }
            Ok(r)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rects.is_empty() {
        return Err("feature without rectangles".to_string());
    }
    Ok(HaarFeature { rects })
}
