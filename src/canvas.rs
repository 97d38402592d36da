use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::bbox::BoundingBox;
use crate::crop::TargetSize;
use crate::error::CropError;

/// Rejects images that have no pixels
pub fn ensure_valid(image: &RgbImage) -> Result<(), CropError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CropError::InvalidImage { width, height });
    }
    Ok(())
}

/// Copies `rect` out of the source image into a new buffer
pub fn extract(image: &RgbImage, rect: &BoundingBox) -> Result<RgbImage, CropError> {
    let rect = rect
        .clip_to(image.width(), image.height())
        .ok_or(CropError::EmptyCropResult)?;
    Ok(imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
}

/// Size of the crop once scaled to fit inside the target canvas
pub fn fitted_size(width: u32, height: u32, target: TargetSize) -> (u32, u32) {
    let scale = (target.width as f64 / width as f64).min(target.height as f64 / height as f64);
    let fitted_w = ((width as f64 * scale).round() as u32).clamp(1, target.width);
    let fitted_h = ((height as f64 * scale).round() as u32).clamp(1, target.height);
    (fitted_w, fitted_h)
}

/// Resizes a crop to fit the target canvas, preserving aspect ratio
///
/// # Returns
/// A black canvas of exactly `target` size with the resized crop pasted in the middle
pub fn letterbox(crop: &RgbImage, target: TargetSize) -> Result<RgbImage, CropError> {
    let (width, height) = crop.dimensions();
    if width == 0 || height == 0 {
        return Err(CropError::EmptyCropResult);
    }
    if target.width == 0 || target.height == 0 {
        return Err(CropError::ResizeFailure(format!(
            "target size {}x{} has no pixels",
            target.width, target.height
        )));
    }

    let (fitted_w, fitted_h) = fitted_size(width, height, target);
    let scaled = if (fitted_w, fitted_h) == (width, height) {
        crop.clone()
    } else {
        imageops::resize(crop, fitted_w, fitted_h, FilterType::Lanczos3)
    };
    if scaled.dimensions() != (fitted_w, fitted_h) {
        return Err(CropError::ResizeFailure(format!(
            "expected {}x{}, got {}x{}",
            fitted_w,
            fitted_h,
            scaled.width(),
            scaled.height()
        )));
    }

    // Black background, crop centered with truncating offsets
    let mut result = RgbImage::new(target.width, target.height);
    let x_offset = (target.width - fitted_w) / 2;
    let y_offset = (target.height - fitted_h) / 2;
    imageops::overlay(&mut result, &scaled, x_offset as i64, y_offset as i64);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn filled(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([200, 120, 40]))
    }

    fn is_black(pixel: &Rgb<u8>) -> bool {
        pixel.0 == [0, 0, 0]
    }

    #[test]
    fn test_ensure_valid() {
        assert!(ensure_valid(&filled(1, 1)).is_ok());
        assert!(matches!(
            ensure_valid(&RgbImage::new(0, 10)),
            Err(CropError::InvalidImage { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_extract_copies_region() {
        let mut image = RgbImage::new(10, 10);
        image.put_pixel(4, 5, Rgb([255, 0, 0]));
        let crop = extract(&image, &BoundingBox::new(3, 4, 4, 3)).unwrap();
        assert_eq!(crop.dimensions(), (4, 3));
        assert_eq!(crop.get_pixel(1, 1), &Rgb([255, 0, 0]));

        // Source untouched
        assert_eq!(image.get_pixel(4, 5), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_extract_empty_rect_is_error() {
        let image = filled(10, 10);
        assert!(matches!(
            extract(&image, &BoundingBox::new(2, 2, 0, 5)),
            Err(CropError::EmptyCropResult)
        ));
        assert!(matches!(
            extract(&image, &BoundingBox::new(20, 20, 5, 5)),
            Err(CropError::EmptyCropResult)
        ));
    }

    #[test]
    fn test_letterbox_wide_crop_gets_horizontal_bands() {
        // 600x200 into 300x400: scale 0.5, 300x100, 150px bands top and bottom
        let crop = filled(600, 200);
        let target = TargetSize::new(300, 400);
        assert_eq!(fitted_size(600, 200, target), (300, 100));

        let result = letterbox(&crop, target).unwrap();
        assert_eq!(result.dimensions(), (300, 400));

        for y in 0..150 {
            for x in 0..300 {
                assert!(is_black(result.get_pixel(x, y)));
                assert!(is_black(result.get_pixel(x, 399 - y)));
            }
        }
        // Content fills the middle band
        assert!(!is_black(result.get_pixel(150, 200)));
        assert!(!is_black(result.get_pixel(0, 150)));
        assert!(!is_black(result.get_pixel(299, 249)));
    }

    #[test]
    fn test_letterbox_tall_crop_gets_vertical_bands() {
        // 100x800 into 300x400: scale 0.5, 50x400, offset (300 - 50) / 2 = 125
        let crop = filled(100, 800);
        let result = letterbox(&crop, TargetSize::new(300, 400)).unwrap();
        assert_eq!(result.dimensions(), (300, 400));

        for y in 0..400 {
            for x in 0..125 {
                assert!(is_black(result.get_pixel(x, y)));
            }
            for x in 175..300 {
                assert!(is_black(result.get_pixel(x, y)));
            }
            assert!(!is_black(result.get_pixel(150, y)));
        }
    }

    #[test]
    fn test_letterbox_matching_aspect_has_no_padding() {
        let crop = filled(150, 200);
        let result = letterbox(&crop, TargetSize::new(300, 400)).unwrap();
        assert_eq!(result.dimensions(), (300, 400));
        assert!(!is_black(result.get_pixel(0, 0)));
        assert!(!is_black(result.get_pixel(299, 399)));
    }

    #[test]
    fn test_letterbox_odd_padding_truncates_offset() {
        // 10x10 into 5x8: scale 0.5, 5x5, y offset (8 - 5) / 2 = 1
        let result = letterbox(&filled(10, 10), TargetSize::new(5, 8)).unwrap();
        assert!(is_black(result.get_pixel(2, 0)));
        assert!(!is_black(result.get_pixel(2, 1)));
        assert!(!is_black(result.get_pixel(2, 5)));
        assert!(is_black(result.get_pixel(2, 6)));
        assert!(is_black(result.get_pixel(2, 7)));
    }

    #[test]
    fn test_letterbox_rejects_empty_target() {
        assert!(matches!(
            letterbox(&filled(10, 10), TargetSize::new(0, 10)),
            Err(CropError::ResizeFailure(_))
        ));
    }

    #[test]
    fn test_letterbox_extreme_aspect_keeps_one_pixel() {
        let result = letterbox(&filled(4000, 1), TargetSize::new(300, 400)).unwrap();
        assert_eq!(result.dimensions(), (300, 400));
        assert!(!is_black(result.get_pixel(150, 199)));
    }
}
