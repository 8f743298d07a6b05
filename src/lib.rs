//! yolov5-post turns raw YOLOv5 head outputs into final detections.
//!
//! The three stride-8/16/32 output tensors are decoded in parallel by a fixed
//! set of workers, each retaining only its best `swap_num` candidates. The
//! retained candidates are merged and run through class-scoped non-maximum
//! suppression, and at most `max_num` detections are returned with boxes
//! normalized to the model input.
//!
//! ```no_run
//! use yolov5_post::{Engine, ModelConfig};
//!
//! let mut engine = Engine::new(ModelConfig::new(640, 80))?;
//! # let (s8, s16, s32) = (vec![0f32; 80 * 80 * 255], vec![0f32; 40 * 40 * 255], vec![0f32; 20 * 20 * 255]);
//! let detections = engine.process_slices([&s8[..], &s16[..], &s32[..]])?;
//! for det in &detections {
//!     println!("{:?}", det.to_array());
//! }
//! # Ok::<(), yolov5_post::PostprocessError>(())
//! ```

mod candidate;
mod decode;
pub mod engine;
pub mod lowlevel;
pub mod model;
pub mod tensor;
mod trace;
pub mod util;
mod worker;

pub use candidate::bbox::BBox;
pub use engine::{Detection, Engine};
pub use model::{ModelConfig, ScaleSpec, ScoreMode, YOLOV5_DEFAULT_SCALES};
pub use tensor::TensorView;
pub use util::{PostprocessError, PostprocessResult};
