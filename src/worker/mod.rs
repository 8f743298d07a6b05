//! Parallel decode across the three output scales.
//!
//! The (scale, row, column, anchor) slot space is flattened scale-major and
//! cut into `thread_num` contiguous ranges of near-equal length, so the dense
//! stride-8 map is spread over several workers while the small maps share
//! one. Each worker owns its candidate buffer; the only synchronization is
//! the join at the end of the decode phase.

pub(crate) mod partition;
pub(crate) mod pool;
