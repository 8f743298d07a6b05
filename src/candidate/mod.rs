//! Candidate boxes, bounded retention and suppression.
//!
//! Includes the per-worker top-K candidate buffer and class-scoped greedy
//! non-maximum suppression.

pub(crate) mod bbox;
pub(crate) mod nms;
pub(crate) mod topk;
