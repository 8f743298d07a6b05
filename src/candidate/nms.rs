//! Class-scoped greedy non-maximum suppression.

use crate::candidate::bbox::BBox;
use crate::candidate::topk::{sort_candidates_desc, Candidate};

/// Reusable per-class storage for kept boxes.
#[derive(Default)]
pub struct NmsScratch {
    kept_by_class: Vec<Vec<BBox>>,
}

impl NmsScratch {
    /// Preallocates lists for `class_number` classes.
    pub fn with_classes(class_number: usize) -> Self {
        Self {
            kept_by_class: (0..class_number).map(|_| Vec::new()).collect(),
        }
    }

    fn reset(&mut self) {
        for kept in self.kept_by_class.iter_mut() {
            kept.clear();
        }
    }

    fn class_mut(&mut self, class_id: usize) -> &mut Vec<BBox> {
        if class_id >= self.kept_by_class.len() {
            self.kept_by_class.resize_with(class_id + 1, Vec::new);
        }
        &mut self.kept_by_class[class_id]
    }
}

/// Applies per-class NMS and returns at most `max_num` survivors.
///
/// See [`nms_per_class_into`].
pub fn nms_per_class(
    candidates: &mut [Candidate],
    nms_threshold: f32,
    max_num: usize,
) -> Vec<Candidate> {
    let mut scratch = NmsScratch::default();
    let mut out = Vec::new();
    nms_per_class_into(candidates, nms_threshold, max_num, &mut scratch, &mut out);
    out
}

/// Applies per-class NMS, writing at most `max_num` survivors into `out`.
///
/// Candidates are sorted best-first (descending score, ascending `seq`) and
/// visited in that order. A candidate is kept if its IoU with every kept
/// candidate of the same class is below `nms_threshold`. Boxes of different
/// classes never suppress each other. Since suppression only looks at
/// higher-ranked boxes, walking the global order and stopping at `max_num`
/// kept yields the same result as suppressing every class in full and then
/// truncating. `out` is cleared first and ends up in best-first order.
pub fn nms_per_class_into(
    candidates: &mut [Candidate],
    nms_threshold: f32,
    max_num: usize,
    scratch: &mut NmsScratch,
    out: &mut Vec<Candidate>,
) {
    out.clear();
    scratch.reset();
    if max_num == 0 || candidates.is_empty() {
        return;
    }

    sort_candidates_desc(candidates);

    for candidate in candidates.iter() {
        let kept = scratch.class_mut(candidate.class_id);
        let suppressed = kept
            .iter()
            .any(|other| candidate.bbox.iou(other) >= nms_threshold);
        if suppressed {
            continue;
        }
        kept.push(candidate.bbox);
        out.push(*candidate);
        if out.len() == max_num {
            break;
        }
    }
}
