//! Flat slot layout and contiguous work partitioning.

use crate::model::{ModelConfig, ANCHORS_PER_SCALE, NUM_SCALES};
use std::ops::Range;

/// Extent of one scale within the flat slot space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleExtent {
    pub grid_h: usize,
    pub grid_w: usize,
    /// First flat slot index of this scale.
    pub offset: usize,
    /// Number of anchor slots in this scale.
    pub slots: usize,
}

/// Portion of a work range that falls inside one scale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub scale: usize,
    /// Slot indices local to the scale.
    pub local: Range<usize>,
    /// Flat index of local slot 0.
    pub offset: usize,
}

/// Flat (scale, row, column, anchor) layout for a model configuration.
#[derive(Clone, Debug)]
pub struct ScanLayout {
    scales: [ScaleExtent; NUM_SCALES],
    slot_len: usize,
    total: usize,
}

impl ScanLayout {
    pub fn new(cfg: &ModelConfig) -> Self {
        let mut offset = 0usize;
        let scales = std::array::from_fn(|scale| {
            let grid = cfg.grid_size(scale);
            let slots = grid * grid * ANCHORS_PER_SCALE;
            let extent = ScaleExtent {
                grid_h: grid,
                grid_w: grid,
                offset,
                slots,
            };
            offset += slots;
            extent
        });
        Self {
            scales,
            slot_len: cfg.slot_len(),
            total: offset,
        }
    }

    pub fn total_slots(&self) -> usize {
        self.total
    }

    /// Values per anchor slot.
    pub fn slot_len(&self) -> usize {
        self.slot_len
    }

    pub fn scale(&self, scale: usize) -> Option<&ScaleExtent> {
        self.scales.get(scale)
    }

    /// Splits the slot space into `parts` contiguous ranges.
    pub fn split(&self, parts: usize) -> Vec<Range<usize>> {
        split_even(self.total, parts)
    }

    /// Breaks a flat range into per-scale segments, in scale order.
    pub fn segments(&self, range: Range<usize>) -> impl Iterator<Item = Segment> + '_ {
        self.scales
            .iter()
            .enumerate()
            .filter_map(move |(scale, extent)| {
                let lo = range.start.max(extent.offset);
                let hi = range.end.min(extent.offset + extent.slots);
                (lo < hi).then(|| Segment {
                    scale,
                    local: lo - extent.offset..hi - extent.offset,
                    offset: extent.offset,
                })
            })
    }
}

/// Splits `0..total` into `parts` contiguous ranges whose lengths differ by
/// at most one; the first `total % parts` ranges are the longer ones.
pub fn split_even(total: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts;
    let rem = total % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0usize;
    for part in 0..parts {
        let len = base + usize::from(part < rem);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}
