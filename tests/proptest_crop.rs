use facecrop::canvas::letterbox;
use facecrop::detector::dedup_overlapping;
use facecrop::{BoundingBox, TargetSize, plan_crop};
use image::{Rgb, RgbImage};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);
    ProptestConfig::with_cases(cases)
}

/// A frame size and a non-empty face box inside it
fn arb_frame_with_face() -> impl Strategy<Value = (u32, u32, BoundingBox)> {
    (1u32..2000, 1u32..2000).prop_flat_map(|(w, h)| {
        (0..w, 0..h).prop_flat_map(move |(x, y)| {
            (1..=(w - x), 1..=(h - y)).prop_map(move |(bw, bh)| (w, h, BoundingBox::new(x, y, bw, bh)))
        })
    })
}

fn arb_boxes() -> impl Strategy<Value = Vec<BoundingBox>> {
    prop::collection::vec(
        (0u32..500, 0u32..500, 1u32..120, 1u32..120).prop_map(|(x, y, w, h)| BoundingBox::new(x, y, w, h)),
        0..24,
    )
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn face_plan_stays_in_bounds_and_covers_face_center((w, h, face) in arb_frame_with_face()) {
        let rect = plan_crop(w, h, &[face], TargetSize::default()).source_rect;

        prop_assert!(rect.width > 0 && rect.height > 0, "empty rect {:?}", rect);
        prop_assert!(rect.fits_within(w, h), "{:?} outside {}x{}", rect, w, h);

        let (cx, cy) = face.center();
        prop_assert!(rect.x as f32 <= cx + 1.0 && cx <= rect.right() as f32 + 1.0);
        prop_assert!(rect.y as f32 <= cy + 1.0 && cy <= rect.bottom() as f32 + 1.0);
    }

    #[test]
    fn fallback_plan_is_centered_square(w in 2u32..4000, h in 2u32..4000) {
        let rect = plan_crop(w, h, &[], TargetSize::default()).source_rect;
        let expected = (w.min(h) as f32 * 0.9).round() as u32;

        prop_assert_eq!(rect.width, rect.height);
        prop_assert!(rect.width.abs_diff(expected) <= 1);
        prop_assert!(rect.fits_within(w, h));
        let (cx, cy) = rect.center();
        prop_assert!((cx - w as f32 / 2.0).abs() <= 1.0);
        prop_assert!((cy - h as f32 / 2.0).abs() <= 1.0);
    }

    #[test]
    fn letterbox_output_matches_target(
        cw in 1u32..200,
        ch in 1u32..200,
        tw in 1u32..120,
        th in 1u32..120,
    ) {
        let crop = RgbImage::from_pixel(cw, ch, Rgb([255, 255, 255]));
        let result = letterbox(&crop, TargetSize::new(tw, th)).unwrap();
        prop_assert_eq!(result.dimensions(), (tw, th));
    }

    #[test]
    fn dedup_leaves_no_heavily_overlapping_pair(boxes in arb_boxes()) {
        let kept = dedup_overlapping(boxes.clone());
        prop_assert!(kept.len() <= boxes.len());

        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                let smaller = a.area().min(b.area());
                prop_assert!(a.intersection_area(b) * 2 <= smaller, "{:?} and {:?} overlap", a, b);
            }
        }
        // The first box always survives
        if let Some(first) = boxes.first() {
            prop_assert_eq!(kept.first(), Some(first));
        }
    }
}
