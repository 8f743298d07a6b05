//! YOLOv5 anchor-slot decoding.
//!
//! Each anchor slot holds `[tx, ty, tw, th, obj, cls_0 .. cls_{C-1}]` logits.
//! Decoding gates on objectness first, so the class logits of the vast
//! majority of slots are never read:
//!
//! ```text
//! obj  = sigmoid(obj_logit)                      reject if obj < threshold
//! best = argmax_c cls_c
//! conf = obj * sigmoid(cls_best)                 (or obj alone)
//! cx   = (2 * sigmoid(tx) - 0.5 + gx) * stride
//! cy   = (2 * sigmoid(ty) - 0.5 + gy) * stride
//! w    = (2 * sigmoid(tw))^2 * anchor_w
//! h    = (2 * sigmoid(th))^2 * anchor_h
//! ```
//!
//! Corners are normalized by the model size and clamped to `[0, 1]`.

use crate::candidate::bbox::BBox;
use crate::candidate::topk::Candidate;
use crate::model::{ModelConfig, ScaleSpec, ScoreMode, BOX_FIELDS};
use crate::util::math::{logit, sigmoid};

/// Location of one anchor slot within a scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotIndex {
    pub gx: usize,
    pub gy: usize,
    pub anchor: usize,
    /// Global flat index, carried into the candidate for tie-breaking.
    pub seq: usize,
}

// Probability slack applied to the logit pre-gate. It exceeds the f32 error
// of `sigmoid` and `logit`, so the pre-gate never rejects a slot the exact
// objectness check would accept.
const GATE_SLACK: f32 = 1e-4;

/// Logit below which `sigmoid(x) >= score_threshold` cannot hold.
fn objectness_gate(score_threshold: f32) -> f32 {
    let p = score_threshold - GATE_SLACK;
    if p > 0.0 {
        logit(p)
    } else {
        f32::NEG_INFINITY
    }
}

/// Stateless decoder with thresholds precomputed from a [`ModelConfig`].
#[derive(Clone, Debug)]
pub struct Decoder {
    class_number: usize,
    score_threshold: f32,
    logit_threshold: f32,
    score_mode: ScoreMode,
    inv_model_size: f32,
}

impl Decoder {
    /// Builds a decoder for `cfg`.
    pub fn new(cfg: &ModelConfig) -> Self {
        Self {
            class_number: cfg.class_number,
            score_threshold: cfg.score_threshold,
            logit_threshold: objectness_gate(cfg.score_threshold),
            score_mode: cfg.score_mode,
            inv_model_size: 1.0 / cfg.model_size as f32,
        }
    }

    /// Decodes one anchor slot into at most one candidate.
    ///
    /// `slot` must hold `BOX_FIELDS + class_number` values. Slots below the
    /// score threshold, with NaN inputs, or whose clamped box is empty
    /// produce `None`, as do an empty class set and an out-of-range anchor.
    #[inline]
    pub fn decode(&self, slot: &[f32], scale: &ScaleSpec, at: SlotIndex) -> Option<Candidate> {
        if slot.len() < BOX_FIELDS + self.class_number {
            return None;
        }

        let obj_logit = slot[4];
        // Conservative logit-space pre-gate; NaN fails the compare.
        if !(obj_logit >= self.logit_threshold) {
            return None;
        }
        let obj = sigmoid(obj_logit);
        if !(obj >= self.score_threshold) {
            return None;
        }

        let classes = &slot[BOX_FIELDS..BOX_FIELDS + self.class_number];
        let mut best_id = 0usize;
        let mut best_logit = *classes.first()?;
        for (class_id, &value) in classes.iter().enumerate().skip(1) {
            if value > best_logit {
                best_logit = value;
                best_id = class_id;
            }
        }

        let score = match self.score_mode {
            ScoreMode::Joint => obj * sigmoid(best_logit),
            ScoreMode::Objectness => obj,
        };
        if !(score >= self.score_threshold) {
            return None;
        }

        let stride = scale.stride as f32;
        let &(anchor_w, anchor_h) = scale.anchors.get(at.anchor)?;
        let cx = (sigmoid(slot[0]) * 2.0 - 0.5 + at.gx as f32) * stride;
        let cy = (sigmoid(slot[1]) * 2.0 - 0.5 + at.gy as f32) * stride;
        let tw = sigmoid(slot[2]) * 2.0;
        let th = sigmoid(slot[3]) * 2.0;
        let w = tw * tw * anchor_w;
        let h = th * th * anchor_h;

        let norm = self.inv_model_size;
        let bbox = BBox::new(
            ((cx - 0.5 * w) * norm).clamp(0.0, 1.0),
            ((cy - 0.5 * h) * norm).clamp(0.0, 1.0),
            ((cx + 0.5 * w) * norm).clamp(0.0, 1.0),
            ((cy + 0.5 * h) * norm).clamp(0.0, 1.0),
        );
        if !(bbox.xmax > bbox.xmin && bbox.ymax > bbox.ymin) {
            return None;
        }

        Some(Candidate {
            score,
            class_id: best_id,
            bbox,
            seq: at.seq,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Decoder, SlotIndex};
    use crate::model::{ModelConfig, ScoreMode, YOLOV5_DEFAULT_SCALES};
    use crate::util::math::{logit, sigmoid};

    fn slot(obj: f32, classes: &[f32], txywh: [f32; 4]) -> Vec<f32> {
        let mut v = txywh.to_vec();
        v.push(obj);
        v.extend_from_slice(classes);
        v
    }

    fn at(gx: usize, gy: usize, anchor: usize) -> SlotIndex {
        SlotIndex {
            gx,
            gy,
            anchor,
            seq: 0,
        }
    }

    #[test]
    fn decodes_centered_box() {
        let cfg = ModelConfig::new(64, 3);
        let decoder = Decoder::new(&cfg);
        let scale = YOLOV5_DEFAULT_SCALES[0];
        // sigmoid(0) = 0.5: center offset 0.5, size factor 1.
        let s = slot(10.0, &[-10.0, 10.0, -10.0], [0.0; 4]);
        let c = decoder.decode(&s, &scale, at(3, 2, 1)).unwrap();

        assert_eq!(c.class_id, 1);
        let expected = sigmoid(10.0) * sigmoid(10.0);
        assert!((c.score - expected).abs() < 1e-6);

        // cx = 3.5 * 8 = 28, cy = 2.5 * 8 = 20, anchor (16, 30)
        let b = c.bbox;
        assert!((b.xmin - 20.0 / 64.0).abs() < 1e-6);
        assert!((b.xmax - 36.0 / 64.0).abs() < 1e-6);
        assert!((b.ymin - 5.0 / 64.0).abs() < 1e-6);
        assert!((b.ymax - 35.0 / 64.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_low_objectness_and_low_joint_score() {
        let cfg = ModelConfig::new(64, 2).with_thresholds(0.5, 0.45);
        let decoder = Decoder::new(&cfg);
        let scale = YOLOV5_DEFAULT_SCALES[0];

        let low_obj = slot(-1.0, &[10.0, 0.0], [0.0; 4]);
        assert!(decoder.decode(&low_obj, &scale, at(0, 0, 0)).is_none());

        // obj ~0.73, class ~0.5 -> joint ~0.37 < 0.5
        let low_joint = slot(1.0, &[0.0, -1.0], [0.0; 4]);
        assert!(decoder.decode(&low_joint, &scale, at(0, 0, 0)).is_none());

        let objectness_only = Decoder::new(&cfg.clone().with_score_mode(ScoreMode::Objectness));
        let c = objectness_only
            .decode(&low_joint, &scale, at(0, 0, 0))
            .unwrap();
        assert!((c.score - sigmoid(1.0)).abs() < 1e-6);
        assert_eq!(c.class_id, 0);
    }

    #[test]
    fn clamps_boxes_at_grid_edges() {
        let cfg = ModelConfig::new(64, 1);
        let decoder = Decoder::new(&cfg);
        let scale = YOLOV5_DEFAULT_SCALES[2];
        let s = slot(10.0, &[10.0], [10.0, 10.0, 10.0, 10.0]);
        let c = decoder.decode(&s, &scale, at(1, 1, 2)).unwrap();
        for v in [c.bbox.xmin, c.bbox.ymin, c.bbox.xmax, c.bbox.ymax] {
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(c.bbox.xmax, 1.0);
        assert_eq!(c.bbox.ymax, 1.0);
    }

    #[test]
    fn nan_inputs_are_discarded() {
        let cfg = ModelConfig::new(64, 2);
        let decoder = Decoder::new(&cfg);
        let scale = YOLOV5_DEFAULT_SCALES[0];

        let nan_obj = slot(f32::NAN, &[10.0, 0.0], [0.0; 4]);
        assert!(decoder.decode(&nan_obj, &scale, at(0, 0, 0)).is_none());

        let nan_cls = slot(10.0, &[f32::NAN, f32::NAN], [0.0; 4]);
        assert!(decoder.decode(&nan_cls, &scale, at(0, 0, 0)).is_none());

        let nan_box = slot(10.0, &[10.0, 0.0], [f32::NAN, 0.0, 0.0, 0.0]);
        assert!(decoder.decode(&nan_box, &scale, at(0, 0, 0)).is_none());
    }

    #[test]
    fn short_slot_is_discarded() {
        let cfg = ModelConfig::new(64, 4);
        let decoder = Decoder::new(&cfg);
        let s = slot(10.0, &[10.0], [0.0; 4]);
        assert!(decoder
            .decode(&s, &YOLOV5_DEFAULT_SCALES[0], at(0, 0, 0))
            .is_none());
    }

    fn step_down(x: f32) -> f32 {
        if x > 0.0 {
            f32::from_bits(x.to_bits() - 1)
        } else if x == 0.0 {
            -f32::from_bits(1)
        } else {
            f32::from_bits(x.to_bits() + 1)
        }
    }

    fn step_up(x: f32) -> f32 {
        -step_down(-x)
    }

    #[test]
    fn objectness_exactly_at_threshold_passes() {
        let scale = YOLOV5_DEFAULT_SCALES[0];
        for t in [0.25f32, 0.3, 0.4, 0.45, 0.5, 0.6, 0.7, 0.9, 0.99] {
            let cfg = ModelConfig::new(64, 1)
                .with_thresholds(t, 0.45)
                .with_score_mode(ScoreMode::Objectness);
            let decoder = Decoder::new(&cfg);

            // Smallest logit whose sigmoid still reaches the threshold.
            let mut x = logit(t);
            for _ in 0..256 {
                if sigmoid(x) >= t {
                    break;
                }
                x = step_up(x);
            }
            assert!(sigmoid(x) >= t, "t={t}");
            for _ in 0..256 {
                let below = step_down(x);
                if sigmoid(below) < t {
                    break;
                }
                x = below;
            }

            let at_boundary = slot(x, &[10.0], [0.0; 4]);
            let c = decoder.decode(&at_boundary, &scale, at(1, 1, 0));
            assert!(c.is_some(), "t={t} x={x} sigmoid={}", sigmoid(x));

            let below = slot(step_down(x), &[10.0], [0.0; 4]);
            assert!(decoder.decode(&below, &scale, at(1, 1, 0)).is_none());
        }
    }

    #[test]
    fn saturated_objectness_passes_unit_threshold() {
        let cfg = ModelConfig::new(64, 1)
            .with_thresholds(1.0, 0.45)
            .with_score_mode(ScoreMode::Objectness);
        let decoder = Decoder::new(&cfg);
        let s = slot(40.0, &[10.0], [0.0; 4]);
        let c = decoder
            .decode(&s, &YOLOV5_DEFAULT_SCALES[0], at(1, 1, 0))
            .unwrap();
        assert_eq!(c.score, 1.0);
    }

    #[test]
    fn unchecked_inputs_do_not_panic() {
        let scale = YOLOV5_DEFAULT_SCALES[0];

        let no_classes = Decoder::new(&ModelConfig::new(64, 0));
        let s = slot(10.0, &[], [0.0; 4]);
        assert!(no_classes.decode(&s, &scale, at(0, 0, 0)).is_none());

        let decoder = Decoder::new(&ModelConfig::new(64, 1));
        let s = slot(10.0, &[10.0], [0.0; 4]);
        assert!(decoder.decode(&s, &scale, at(0, 0, 3)).is_none());
    }
}
