//! Bounded top-K retention of decoded candidates.

use crate::candidate::bbox::BBox;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Decoded detection candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// Detection score in `[0, 1]`.
    pub score: f32,
    /// Argmax class index.
    pub class_id: usize,
    /// Normalized box.
    pub bbox: BBox,
    /// Flat slot index in (scale, row, column, anchor) order; breaks score ties.
    pub seq: usize,
}

/// Orders candidates best-first: descending score, then ascending `seq`.
pub(crate) fn candidate_cmp_desc(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.seq.cmp(&b.seq))
}

/// Sorts candidates best-first with deterministic tie-breaking.
pub(crate) fn sort_candidates_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(candidate_cmp_desc);
}

// Heap entry whose maximum is the worst-ranked candidate.
struct Ranked(Candidate);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        candidate_cmp_desc(&self.0, &other.0)
    }
}

/// Fixed-capacity candidate buffer with O(log k) admission.
///
/// Once full, a new candidate replaces the current minimum only if it ranks
/// strictly better; otherwise it is discarded. Storage is allocated once and
/// reused across drains.
pub struct CandidateBuffer {
    capacity: usize,
    heap: BinaryHeap<Ranked>,
    dropped: usize,
}

impl CandidateBuffer {
    /// Creates an empty buffer holding at most `capacity` candidates.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of candidates lost to capacity since the last drain, counting
    /// both rejected newcomers and displaced minimums.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Lowest retained score, if any.
    pub fn min_score(&self) -> Option<f32> {
        self.heap.peek().map(|worst| worst.0.score)
    }

    /// Offers a candidate; returns whether it was retained.
    pub fn admit(&mut self, candidate: Candidate) -> bool {
        if self.capacity == 0 {
            self.dropped += 1;
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Ranked(candidate));
            return true;
        }

        self.dropped += 1;
        match self.heap.peek_mut() {
            Some(mut worst) if candidate_cmp_desc(&candidate, &worst.0) == Ordering::Less => {
                *worst = Ranked(candidate);
                true
            }
            _ => false,
        }
    }

    /// Moves all held candidates into `out` and empties the buffer.
    pub fn drain_into(&mut self, out: &mut Vec<Candidate>) {
        out.extend(self.heap.drain().map(|ranked| ranked.0));
        self.dropped = 0;
    }

    /// Returns all held candidates sorted best-first and empties the buffer.
    pub fn drain_sorted_desc(&mut self) -> Vec<Candidate> {
        let mut out = Vec::with_capacity(self.heap.len());
        self.drain_into(&mut out);
        sort_candidates_desc(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{Candidate, CandidateBuffer};
    use crate::candidate::bbox::BBox;

    fn cand(score: f32, seq: usize) -> Candidate {
        Candidate {
            score,
            class_id: 0,
            bbox: BBox::new(0.0, 0.0, 0.1, 0.1),
            seq,
        }
    }

    #[test]
    fn keeps_top_k_by_score() {
        let mut buf = CandidateBuffer::new(3);
        for (seq, score) in [0.5f32, 0.9, 0.1, 0.7, 0.3, 0.8].into_iter().enumerate() {
            buf.admit(cand(score, seq));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.min_score(), Some(0.7));
        assert_eq!(buf.dropped(), 3);
        let scores: Vec<f32> = buf.drain_sorted_desc().iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.8, 0.7]);
        assert!(buf.is_empty());
        assert_eq!(buf.dropped(), 0);
    }

    #[test]
    fn equal_score_does_not_displace_earlier_candidate() {
        let mut buf = CandidateBuffer::new(1);
        assert!(buf.admit(cand(0.6, 0)));
        assert!(!buf.admit(cand(0.6, 1)));
        assert!(buf.admit(cand(0.61, 2)));
        let kept = buf.drain_sorted_desc();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].seq, 2);
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let mut buf = CandidateBuffer::new(0);
        assert!(!buf.admit(cand(1.0, 0)));
        assert!(buf.is_empty());
        assert_eq!(buf.min_score(), None);
        assert_eq!(buf.dropped(), 1);
    }

    #[test]
    fn dropped_counts_rejected_and_displaced() {
        let mut buf = CandidateBuffer::new(1);
        assert!(buf.admit(cand(0.5, 0)));
        assert_eq!(buf.dropped(), 0);

        // Newcomer worse than the held minimum.
        assert!(!buf.admit(cand(0.4, 1)));
        assert_eq!(buf.dropped(), 1);

        // Newcomer displaces the held minimum.
        assert!(buf.admit(cand(0.6, 2)));
        assert_eq!(buf.dropped(), 2);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn buffer_is_reusable_after_drain() {
        let mut buf = CandidateBuffer::new(2);
        buf.admit(cand(0.4, 0));
        buf.admit(cand(0.5, 1));
        let mut out = Vec::new();
        buf.drain_into(&mut out);
        assert_eq!(out.len(), 2);

        buf.admit(cand(0.2, 2));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.capacity(), 2);
    }
}
