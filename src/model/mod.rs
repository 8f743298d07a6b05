//! Model geometry and engine configuration.
//!
//! A YOLOv5 head emits three feature maps at strides 8, 16 and 32. Each cell
//! of a map carries [`ANCHORS_PER_SCALE`] anchor slots of
//! `BOX_FIELDS + class_number` values: `[tx, ty, tw, th, obj, cls_0 ..]`.

use crate::util::{PostprocessError, PostprocessResult};

/// Number of anchor templates per output scale.
pub const ANCHORS_PER_SCALE: usize = 3;

/// Number of leading box/objectness channels in an anchor slot.
pub const BOX_FIELDS: usize = 5;

/// Number of output scales consumed per call.
pub const NUM_SCALES: usize = 3;

/// YOLOv5 COCO anchors as `(stride, [(w, h); 3])`, in input pixels.
pub const YOLOV5_DEFAULT_SCALES: [ScaleSpec; NUM_SCALES] = [
    ScaleSpec {
        stride: 8,
        anchors: [(10.0, 13.0), (16.0, 30.0), (33.0, 23.0)],
    },
    ScaleSpec {
        stride: 16,
        anchors: [(30.0, 61.0), (62.0, 45.0), (59.0, 119.0)],
    },
    ScaleSpec {
        stride: 32,
        anchors: [(116.0, 90.0), (156.0, 198.0), (373.0, 326.0)],
    },
];

/// Stride and anchor set for one output scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleSpec {
    /// Downsampling factor between the model input and this feature map.
    pub stride: usize,
    /// Anchor `(width, height)` pairs in input pixels.
    pub anchors: [(f32, f32); ANCHORS_PER_SCALE],
}

/// Which score is compared against `score_threshold`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScoreMode {
    /// `objectness * best_class_probability`.
    #[default]
    Joint,
    /// Objectness alone; the class is still the argmax.
    Objectness,
}

/// Engine configuration, fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    /// Side length of the square model input in pixels.
    pub model_size: usize,
    /// Number of classes the head predicts.
    pub class_number: usize,
    /// Per-scale strides and anchors, in output order.
    pub scales: [ScaleSpec; NUM_SCALES],
    /// Minimum detection score, in `(0, 1]`.
    pub score_threshold: f32,
    /// IoU at or above which a lower-scored same-class box is suppressed.
    pub nms_threshold: f32,
    /// Score gating variant.
    pub score_mode: ScoreMode,
    /// Number of decode workers.
    pub thread_num: usize,
    /// Candidate buffer capacity per worker.
    pub swap_num: usize,
    /// Maximum number of detections returned per call.
    pub max_num: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_size: 640,
            class_number: 80,
            scales: YOLOV5_DEFAULT_SCALES,
            score_threshold: 0.4,
            nms_threshold: 0.45,
            score_mode: ScoreMode::Joint,
            thread_num: 8,
            swap_num: 512,
            max_num: 100,
        }
    }
}

impl ModelConfig {
    /// Creates a configuration with default anchors and thresholds.
    pub fn new(model_size: usize, class_number: usize) -> Self {
        Self {
            model_size,
            class_number,
            ..Self::default()
        }
    }

    /// Sets the score and NMS thresholds.
    pub fn with_thresholds(mut self, score_threshold: f32, nms_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self.nms_threshold = nms_threshold;
        self
    }

    /// Sets the worker count, per-worker buffer capacity and output cap.
    pub fn with_capacity(mut self, thread_num: usize, swap_num: usize, max_num: usize) -> Self {
        self.thread_num = thread_num;
        self.swap_num = swap_num;
        self.max_num = max_num;
        self
    }

    /// Sets the score gating mode.
    pub fn with_score_mode(mut self, score_mode: ScoreMode) -> Self {
        self.score_mode = score_mode;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> PostprocessResult<()> {
        if self.model_size == 0 {
            return Err(PostprocessError::InvalidConfig {
                reason: "model_size must be positive",
            });
        }
        if self.class_number == 0 {
            return Err(PostprocessError::InvalidConfig {
                reason: "class_number must be at least 1",
            });
        }
        if !(self.score_threshold > 0.0 && self.score_threshold <= 1.0) {
            return Err(PostprocessError::InvalidConfig {
                reason: "score_threshold must be in (0, 1]",
            });
        }
        if !(self.nms_threshold > 0.0 && self.nms_threshold <= 1.0) {
            return Err(PostprocessError::InvalidConfig {
                reason: "nms_threshold must be in (0, 1]",
            });
        }
        if self.thread_num == 0 {
            return Err(PostprocessError::InvalidConfig {
                reason: "thread_num must be at least 1",
            });
        }
        if self.swap_num == 0 {
            return Err(PostprocessError::InvalidConfig {
                reason: "swap_num must be at least 1",
            });
        }
        if self.max_num == 0 {
            return Err(PostprocessError::InvalidConfig {
                reason: "max_num must be at least 1",
            });
        }
        for scale in &self.scales {
            if scale.stride == 0 {
                return Err(PostprocessError::InvalidConfig {
                    reason: "stride must be positive",
                });
            }
            if self.model_size % scale.stride != 0 {
                return Err(PostprocessError::StrideMismatch {
                    stride: scale.stride,
                    model_size: self.model_size,
                });
            }
            let anchors_ok = scale
                .anchors
                .iter()
                .all(|&(w, h)| w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0);
            if !anchors_ok {
                return Err(PostprocessError::InvalidConfig {
                    reason: "anchors must be finite and strictly positive",
                });
            }
        }
        Ok(())
    }

    /// Returns the number of channels in one anchor slot.
    pub fn slot_len(&self) -> usize {
        BOX_FIELDS + self.class_number
    }

    /// Returns the grid side length of `scale`.
    pub fn grid_size(&self, scale: usize) -> usize {
        self.model_size / self.scales[scale].stride
    }

    /// Returns the `[grid_h, grid_w, channels]` shape expected for `scale`.
    pub fn expected_dims(&self, scale: usize) -> [usize; 3] {
        let grid = self.grid_size(scale);
        [grid, grid, ANCHORS_PER_SCALE * self.slot_len()]
    }
}
