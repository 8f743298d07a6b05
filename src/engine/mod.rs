//! The postprocessing engine.
//!
//! An [`Engine`] is built once per model and then called once per frame.
//! Construction validates the configuration, lays out the slot space, starts
//! the worker threads and allocates every buffer the pipeline needs;
//! [`Engine::process`] only dispatches, joins, merges and suppresses.

use std::fmt;

use crate::candidate::bbox::BBox;
use crate::candidate::nms::{nms_per_class_into, NmsScratch};
use crate::candidate::topk::Candidate;
use crate::decode::Decoder;
use crate::model::{ModelConfig, NUM_SCALES};
use crate::tensor::TensorView;
use crate::trace::{trace_event, trace_span};
use crate::util::{PostprocessError, PostprocessResult};
use crate::worker::partition::ScanLayout;
use crate::worker::pool::{ScanContext, WorkerPool};

/// Final detection with a box normalized to the model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub class_id: usize,
    pub score: f32,
}

impl Detection {
    /// Returns `[xmin, ymin, xmax, ymax, class_id, score]`.
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.bbox.xmin,
            self.bbox.ymin,
            self.bbox.xmax,
            self.bbox.ymax,
            self.class_id as f32,
            self.score,
        ]
    }

    /// Returns the box in pixels of a `width` x `height` image.
    pub fn scaled_bbox(&self, width: f32, height: f32) -> BBox {
        self.bbox.scaled(width, height)
    }
}

impl From<Candidate> for Detection {
    fn from(candidate: Candidate) -> Self {
        Self {
            bbox: candidate.bbox,
            class_id: candidate.class_id,
            score: candidate.score,
        }
    }
}

/// YOLOv5 postprocessor with a persistent worker pool.
///
/// `process` takes `&mut self`; calls are sequential by construction.
pub struct Engine {
    config: ModelConfig,
    layout: ScanLayout,
    decoder: Decoder,
    workers: WorkerPool,
    merged: Vec<Candidate>,
    kept: Vec<Candidate>,
    scratch: NmsScratch,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("workers", &self.workers.num_workers())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validates `config` and starts the workers.
    pub fn new(config: ModelConfig) -> PostprocessResult<Self> {
        config.validate()?;
        let layout = ScanLayout::new(&config);
        let decoder = Decoder::new(&config);
        let workers = WorkerPool::new(&layout, config.thread_num, config.swap_num)?;

        trace_event!(
            "engine_ready",
            workers = workers.num_workers(),
            swap_num = config.swap_num,
            slots = layout.total_slots()
        );

        Ok(Self {
            merged: Vec::with_capacity(config.thread_num.saturating_mul(config.swap_num)),
            kept: Vec::with_capacity(config.max_num),
            scratch: NmsScratch::with_classes(config.class_number),
            config,
            layout,
            decoder,
            workers,
        })
    }

    /// Returns the configuration the engine was built with.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Returns the number of decode workers.
    pub fn num_workers(&self) -> usize {
        self.workers.num_workers()
    }

    /// Returns the `[grid_h, grid_w, channels]` shape expected for `scale`.
    pub fn expected_dims(&self, scale: usize) -> [usize; 3] {
        self.config.expected_dims(scale)
    }

    /// Decodes, merges and suppresses one frame of raw outputs.
    ///
    /// `outputs` are the stride-ordered head tensors. A tensor whose shape
    /// disagrees with the configuration fails the whole call. The result is
    /// sorted by descending score and holds at most `max_num` detections.
    pub fn process(
        &mut self,
        outputs: [TensorView<'_>; NUM_SCALES],
    ) -> PostprocessResult<Vec<Detection>> {
        let _span = trace_span!("postprocess").entered();

        for (scale, view) in outputs.iter().enumerate() {
            let expected = self.config.expected_dims(scale);
            let got = view.dims();
            if got != expected {
                return Err(PostprocessError::InputShape {
                    scale,
                    expected,
                    got,
                });
            }
        }

        self.merged.clear();
        let ctx = ScanContext {
            tensors: &outputs,
            scales: &self.config.scales,
            layout: &self.layout,
            decoder: &self.decoder,
        };
        let stats = self.workers.run(ctx, &mut self.merged);
        trace_event!(
            "decode_candidates",
            retained = stats.retained,
            dropped = stats.dropped
        );

        nms_per_class_into(
            &mut self.merged,
            self.config.nms_threshold,
            self.config.max_num,
            &mut self.scratch,
            &mut self.kept,
        );
        trace_event!(
            "nms_kept",
            kept = self.kept.len(),
            capped = self.kept.len() == self.config.max_num
        );

        Ok(self.kept.iter().copied().map(Detection::from).collect())
    }

    /// Like [`Engine::process`] for contiguous buffers in the expected
    /// `(grid_h, grid_w, channels)` layout.
    pub fn process_slices(
        &mut self,
        outputs: [&[f32]; NUM_SCALES],
    ) -> PostprocessResult<Vec<Detection>> {
        let [s0, s1, s2] = outputs;
        let views = [
            self.view_for(0, s0)?,
            self.view_for(1, s1)?,
            self.view_for(2, s2)?,
        ];
        self.process(views)
    }

    fn view_for<'a>(&self, scale: usize, data: &'a [f32]) -> PostprocessResult<TensorView<'a>> {
        let [h, w, c] = self.config.expected_dims(scale);
        TensorView::new(data, h, w, c)
    }
}
