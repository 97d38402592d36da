use usls::Hbb;

/// Axis-aligned face box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Center of the box as floating point coordinates
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Area of the overlap between two boxes (zero when disjoint)
    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return 0;
        }
        (right - left) as u64 * (bottom - top) as u64
    }

    /// Clips the box to a `frame_width` x `frame_height` frame
    ///
    /// # Returns
    /// `None` if nothing of the box remains inside the frame
    pub fn clip_to(&self, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        let x = self.x.min(frame_width);
        let y = self.y.min(frame_height);
        let right = self.right().min(frame_width);
        let bottom = self.bottom().min(frame_height);

        if right <= x || bottom <= y {
            None
        } else {
            Some(BoundingBox::new(x, y, right - x, bottom - y))
        }
    }

    /// Checks that the box lies fully inside a frame
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.right() <= frame_width && self.bottom() <= frame_height
    }

    /// Converts a floating point corner box into pixels, clipped to the frame
    ///
    /// Boxes with non-positive width or height after clipping are discarded.
    pub fn from_corners_clipped(
        xmin: f32,
        ymin: f32,
        xmax: f32,
        ymax: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<BoundingBox> {
        if !(xmin.is_finite() && ymin.is_finite() && xmax.is_finite() && ymax.is_finite()) {
            return None;
        }
        let fw = frame_width as f32;
        let fh = frame_height as f32;

        let x0 = xmin.clamp(0.0, fw).round() as u32;
        let y0 = ymin.clamp(0.0, fh).round() as u32;
        let x1 = xmax.clamp(0.0, fw).round() as u32;
        let y1 = ymax.clamp(0.0, fh).round() as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(BoundingBox::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Converts a detector hbb into a clipped pixel box
    pub fn from_hbb_clipped(hbb: &Hbb, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        Self::from_corners_clipped(
            hbb.xmin(),
            hbb.ymin(),
            hbb.xmax(),
            hbb.ymax(),
            frame_width,
            frame_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection_area() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(50, 50, 100, 100);
        assert_eq!(a.intersection_area(&b), 2500);
        assert_eq!(b.intersection_area(&a), 2500);

        // Touching edges do not overlap
        let c = BoundingBox::new(100, 0, 10, 10);
        assert_eq!(a.intersection_area(&c), 0);

        // Containment
        let d = BoundingBox::new(10, 10, 20, 20);
        assert_eq!(a.intersection_area(&d), d.area());
    }

    #[test]
    fn test_center() {
        let b = BoundingBox::new(400, 400, 100, 100);
        assert_eq!(b.center(), (450.0, 450.0));
    }

    #[test]
    fn test_clip_to() {
        let b = BoundingBox::new(180, 190, 50, 50);
        assert_eq!(b.clip_to(200, 200), Some(BoundingBox::new(180, 190, 20, 10)));

        let outside = BoundingBox::new(250, 0, 10, 10);
        assert_eq!(outside.clip_to(200, 200), None);
    }

    #[test]
    fn test_from_corners_clipped() {
        let b = BoundingBox::from_corners_clipped(-10.0, 5.4, 60.2, 300.0, 200, 200).unwrap();
        assert_eq!(b, BoundingBox::new(0, 5, 60, 195));

        // Fully outside the frame collapses to nothing
        assert!(BoundingBox::from_corners_clipped(210.0, 0.0, 260.0, 40.0, 200, 200).is_none());
        // Degenerate after rounding
        assert!(BoundingBox::from_corners_clipped(10.1, 10.0, 10.3, 20.0, 200, 200).is_none());
        assert!(BoundingBox::from_corners_clipped(f32::NAN, 0.0, 10.0, 10.0, 200, 200).is_none());
    }

    #[test]
    fn test_from_hbb_clipped() {
        let hbb = Hbb::from_xywh(-20.0, 10.0, 100.0, 50.0);
        let b = BoundingBox::from_hbb_clipped(&hbb, 64, 48).unwrap();
        assert_eq!(b, BoundingBox::new(0, 10, 64, 38));
        assert!(b.fits_within(64, 48));
    }
}
