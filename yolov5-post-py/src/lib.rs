//! Python bindings for the yolov5-post detection postprocessor.
//!
//! Head outputs are accepted as float32 numpy arrays shaped `(H, W, C)` or
//! `(1, H, W, C)`; detections come back as an `(N, 6)` float32 array of
//! `[xmin, ymin, xmax, ymax, class_id, score]` rows.

use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArrayDyn, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use yolov5_post::{
    Detection, Engine as RustEngine, ModelConfig, PostprocessError, ScoreMode, TensorView,
};

/// Convert a PostprocessError to a Python exception.
fn to_py_err(err: PostprocessError) -> PyErr {
    match err {
        PostprocessError::WorkerPool(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn parse_score_mode(mode: &str) -> PyResult<ScoreMode> {
    match mode.to_lowercase().as_str() {
        "joint" => Ok(ScoreMode::Joint),
        "objectness" => Ok(ScoreMode::Objectness),
        _ => Err(PyValueError::new_err(
            "score_mode must be 'joint' or 'objectness'",
        )),
    }
}

fn run_engine<'py>(
    py: Python<'py>,
    engine: &mut RustEngine,
    outputs: [PyReadonlyArrayDyn<'py, f32>; 3],
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    let [o0, o1, o2] = &outputs;
    let views = [
        TensorView::from_shape(o0.as_slice()?, o0.shape()).map_err(to_py_err)?,
        TensorView::from_shape(o1.as_slice()?, o1.shape()).map_err(to_py_err)?,
        TensorView::from_shape(o2.as_slice()?, o2.shape()).map_err(to_py_err)?,
    ];
    let detections = engine.process(views).map_err(to_py_err)?;
    Ok(detections_to_array(&detections)?.into_pyarray(py))
}

fn detections_to_array(detections: &[Detection]) -> PyResult<Array2<f32>> {
    let flat: Vec<f32> = detections.iter().flat_map(Detection::to_array).collect();
    Array2::from_shape_vec((detections.len(), 6), flat)
        .map_err(|err| PyRuntimeError::new_err(err.to_string()))
}

/// YOLOv5 postprocessor with a persistent worker pool.
///
/// Build once per model, then call `process` for every frame.
#[pyclass]
pub struct Yolov5PostProcess {
    inner: RustEngine,
}

#[pymethods]
impl Yolov5PostProcess {
    /// Create a new postprocessor.
    ///
    /// Args:
    ///     model_size: Square input resolution, divisible by 32
    ///     class_number: Number of classes the model predicts
    ///     score_threshold: Minimum score kept (default: 0.4)
    ///     nms_threshold: IoU at which same-class boxes suppress (default: 0.45)
    ///     thread_num: Decode workers (default: 8)
    ///     swap_num: Candidates retained per worker (default: 512)
    ///     max_num: Maximum detections returned (default: 100)
    ///     score_mode: "joint" or "objectness" (default: "joint")
    #[new]
    #[pyo3(signature = (
        model_size,
        class_number,
        score_threshold = 0.4,
        nms_threshold = 0.45,
        thread_num = 8,
        swap_num = 512,
        max_num = 100,
        score_mode = "joint"
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        model_size: usize,
        class_number: usize,
        score_threshold: f32,
        nms_threshold: f32,
        thread_num: usize,
        swap_num: usize,
        max_num: usize,
        score_mode: &str,
    ) -> PyResult<Self> {
        let config = ModelConfig::new(model_size, class_number)
            .with_thresholds(score_threshold, nms_threshold)
            .with_capacity(thread_num, swap_num, max_num)
            .with_score_mode(parse_score_mode(score_mode)?);
        let inner = RustEngine::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Decode and suppress one frame.
    ///
    /// Args:
    ///     o0, o1, o2: float32 head outputs for strides 8, 16 and 32
    ///
    /// Returns:
    ///     (N, 6) float32 array sorted by descending score
    fn process<'py>(
        &mut self,
        py: Python<'py>,
        o0: PyReadonlyArrayDyn<'py, f32>,
        o1: PyReadonlyArrayDyn<'py, f32>,
        o2: PyReadonlyArrayDyn<'py, f32>,
    ) -> PyResult<Bound<'py, PyArray2<f32>>> {
        run_engine(py, &mut self.inner, [o0, o1, o2])
    }

    /// Expected `(H, W, C)` shape of output `scale`.
    fn expected_shape(&self, scale: usize) -> PyResult<(usize, usize, usize)> {
        if scale >= 3 {
            return Err(PyValueError::new_err("scale must be 0, 1 or 2"));
        }
        let [h, w, c] = self.inner.expected_dims(scale);
        Ok((h, w, c))
    }

    #[getter]
    fn model_size(&self) -> usize {
        self.inner.config().model_size
    }

    #[getter]
    fn class_number(&self) -> usize {
        self.inner.config().class_number
    }

    #[getter]
    fn num_workers(&self) -> usize {
        self.inner.num_workers()
    }

    fn __repr__(&self) -> String {
        let cfg = self.inner.config();
        format!(
            "Yolov5PostProcess(model_size={}, class_number={}, score_threshold={}, nms_threshold={}, thread_num={}, swap_num={}, max_num={})",
            cfg.model_size,
            cfg.class_number,
            cfg.score_threshold,
            cfg.nms_threshold,
            cfg.thread_num,
            cfg.swap_num,
            cfg.max_num
        )
    }
}

/// One-shot postprocessing on the calling thread.
///
/// Builds a single-worker engine for this call only. For a stream of frames,
/// create a Yolov5PostProcess once instead.
///
/// Returns:
///     (N, 6) float32 array sorted by descending score
#[pyfunction]
#[pyo3(signature = (
    o0,
    o1,
    o2,
    model_size,
    class_number,
    score_threshold = 0.4,
    nms_threshold = 0.45,
    swap_num = 512,
    max_num = 100
))]
#[allow(clippy::too_many_arguments)]
fn fast_postprocess<'py>(
    py: Python<'py>,
    o0: PyReadonlyArrayDyn<'py, f32>,
    o1: PyReadonlyArrayDyn<'py, f32>,
    o2: PyReadonlyArrayDyn<'py, f32>,
    model_size: usize,
    class_number: usize,
    score_threshold: f32,
    nms_threshold: f32,
    swap_num: usize,
    max_num: usize,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    let config = ModelConfig::new(model_size, class_number)
        .with_thresholds(score_threshold, nms_threshold)
        .with_capacity(1, swap_num, max_num);
    let mut engine = RustEngine::new(config).map_err(to_py_err)?;
    run_engine(py, &mut engine, [o0, o1, o2])
}

/// Python module for YOLOv5 postprocessing.
#[pymodule]
fn _yolov5_post(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Yolov5PostProcess>()?;
    m.add_function(wrap_pyfunction!(fast_postprocess, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
