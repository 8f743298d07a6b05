//! Building blocks of the engine for custom pipelines.
//!
//! Most users should use [`Engine`](crate::Engine). These items expose the
//! decoder, the bounded candidate buffer, suppression and work partitioning
//! on their own.

pub use crate::candidate::nms::{nms_per_class, nms_per_class_into, NmsScratch};
pub use crate::candidate::topk::{Candidate, CandidateBuffer};
pub use crate::decode::{Decoder, SlotIndex};
pub use crate::worker::partition::{split_even, ScaleExtent, ScanLayout, Segment};
