//! Axis-aligned boxes in corner form.

/// Axis-aligned box `(xmin, ymin, xmax, ymax)`.
///
/// Boxes produced by the decoder are normalized to `[0, 1]` of the model
/// input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BBox {
    /// Creates a box from corner coordinates.
    pub const fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    /// Returns the area, or 0 for an empty box.
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union with `other`; 0 when the union is empty.
    pub fn iou(&self, other: &BBox) -> f32 {
        let inter_w = (self.xmax.min(other.xmax) - self.xmin.max(other.xmin)).max(0.0);
        let inter_h = (self.ymax.min(other.ymax) - self.ymin.max(other.ymin)).max(0.0);
        let inter = inter_w * inter_h;
        if inter <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Scales x coordinates by `width` and y coordinates by `height`.
    pub fn scaled(&self, width: f32, height: f32) -> BBox {
        BBox::new(
            self.xmin * width,
            self.ymin * height,
            self.xmax * width,
            self.ymax * height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::BBox;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BBox::new(0.1, 0.1, 0.5, 0.5);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_or_touching_boxes_is_zero() {
        let a = BBox::new(0.0, 0.0, 0.2, 0.2);
        let b = BBox::new(0.2, 0.0, 0.4, 0.2);
        let c = BBox::new(0.5, 0.5, 0.6, 0.6);
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BBox::new(0.0, 0.0, 0.2, 0.1);
        let b = BBox::new(0.1, 0.0, 0.3, 0.1);
        // inter 0.01, union 0.03
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn scaled_maps_to_pixels() {
        let b = BBox::new(0.25, 0.5, 0.75, 1.0).scaled(640.0, 480.0);
        assert_eq!(b, BBox::new(160.0, 240.0, 480.0, 480.0));
    }
}
