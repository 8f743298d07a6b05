//! Persistent decode workers backed by a rayon thread pool.

use crate::candidate::topk::{Candidate, CandidateBuffer};
use crate::decode::{Decoder, SlotIndex};
use crate::model::{ScaleSpec, ANCHORS_PER_SCALE, NUM_SCALES};
use crate::tensor::TensorView;
use crate::trace::trace_span;
use crate::util::{PostprocessError, PostprocessResult};
use crate::worker::partition::ScanLayout;
use rayon::prelude::*;
use std::ops::Range;

/// Read-only inputs shared by all workers during one call.
#[derive(Clone, Copy)]
pub(crate) struct ScanContext<'a> {
    pub tensors: &'a [TensorView<'a>; NUM_SCALES],
    pub scales: &'a [ScaleSpec; NUM_SCALES],
    pub layout: &'a ScanLayout,
    pub decoder: &'a Decoder,
}

/// Counters gathered while draining the workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ScanStats {
    pub retained: usize,
    pub dropped: usize,
}

struct Worker {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    id: usize,
    range: Range<usize>,
    buffer: CandidateBuffer,
}

impl Worker {
    fn scan(&mut self, ctx: ScanContext<'_>) {
        let _span =
            trace_span!("decode_worker", worker = self.id, slots = self.range.len()).entered();

        let slot_len = ctx.layout.slot_len();
        for seg in ctx.layout.segments(self.range.clone()) {
            let (Some(extent), Some(scale_spec)) =
                (ctx.layout.scale(seg.scale), ctx.scales.get(seg.scale))
            else {
                continue;
            };
            let view = ctx.tensors[seg.scale];
            let Some(data) = view
                .as_slice()
                .get(seg.local.start * slot_len..seg.local.end * slot_len)
            else {
                continue;
            };

            for (local, slot) in seg.local.clone().zip(data.chunks_exact(slot_len)) {
                let cell = local / ANCHORS_PER_SCALE;
                let at = SlotIndex {
                    gx: cell % extent.grid_w,
                    gy: cell / extent.grid_w,
                    anchor: local % ANCHORS_PER_SCALE,
                    seq: seg.offset + local,
                };
                if let Some(candidate) = ctx.decoder.decode(slot, scale_spec, at) {
                    self.buffer.admit(candidate);
                }
            }
        }
    }
}

/// Fixed set of decode workers, each owning one contiguous slot range and
/// one candidate buffer.
///
/// The thread pool is built once and its threads sleep between calls. With a
/// single worker no pool is built and decoding runs on the calling thread.
pub(crate) struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    workers: Vec<Worker>,
}

impl WorkerPool {
    pub fn new(layout: &ScanLayout, thread_num: usize, swap_num: usize) -> PostprocessResult<Self> {
        let pool = if thread_num > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(thread_num)
                .thread_name(|idx| format!("yolov5-post-{idx}"))
                .build()
                .map_err(|err| PostprocessError::WorkerPool(err.to_string()))?;
            Some(pool)
        } else {
            None
        };

        let workers = layout
            .split(thread_num)
            .into_iter()
            .enumerate()
            .map(|(id, range)| Worker {
                id,
                range,
                buffer: CandidateBuffer::new(swap_num),
            })
            .collect();

        Ok(Self { pool, workers })
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Decodes every slot, waits for all workers, then appends their
    /// retained candidates to `out` in worker order.
    pub fn run(&mut self, ctx: ScanContext<'_>, out: &mut Vec<Candidate>) -> ScanStats {
        let Self { pool, workers } = self;
        match pool {
            Some(pool) => pool.install(|| {
                workers
                    .par_iter_mut()
                    .with_max_len(1)
                    .for_each(|worker| worker.scan(ctx));
            }),
            None => workers.iter_mut().for_each(|worker| worker.scan(ctx)),
        }

        let start = out.len();
        let mut stats = ScanStats::default();
        for worker in workers.iter_mut() {
            stats.dropped += worker.buffer.dropped();
            worker.buffer.drain_into(out);
        }
        stats.retained = out.len() - start;
        stats
    }
}
