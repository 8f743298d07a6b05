use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use yolov5_post::{Engine, ModelConfig, ScaleSpec, ScoreMode};

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay recorded YOLOv5 head outputs through the postprocessor and time it"
)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for the pipeline stages.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ScoreModeConfig {
    Joint,
    Objectness,
}

impl From<ScoreModeConfig> for ScoreMode {
    fn from(value: ScoreModeConfig) -> Self {
        match value {
            ScoreModeConfig::Joint => ScoreMode::Joint,
            ScoreModeConfig::Objectness => ScoreMode::Objectness,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ModelConfigJson {
    model_size: usize,
    class_number: usize,
    strides: [usize; 3],
    anchors: [[[f32; 2]; 3]; 3],
    score_threshold: f32,
    nms_threshold: f32,
    score_mode: ScoreModeConfig,
    thread_num: usize,
    swap_num: usize,
    max_num: usize,
}

impl Default for ModelConfigJson {
    fn default() -> Self {
        let cfg = ModelConfig::default();
        Self {
            model_size: cfg.model_size,
            class_number: cfg.class_number,
            strides: cfg.scales.map(|s| s.stride),
            anchors: cfg.scales.map(|s| s.anchors.map(|(w, h)| [w, h])),
            score_threshold: cfg.score_threshold,
            nms_threshold: cfg.nms_threshold,
            score_mode: ScoreModeConfig::Joint,
            thread_num: cfg.thread_num,
            swap_num: cfg.swap_num,
            max_num: cfg.max_num,
        }
    }
}

impl From<ModelConfigJson> for ModelConfig {
    fn from(value: ModelConfigJson) -> Self {
        let mut scales = value.strides.map(|stride| ScaleSpec {
            stride,
            anchors: [(0.0, 0.0); 3],
        });
        for (scale, anchors) in scales.iter_mut().zip(value.anchors) {
            scale.anchors = anchors.map(|[w, h]| (w, h));
        }
        ModelConfig {
            model_size: value.model_size,
            class_number: value.class_number,
            scales,
            score_threshold: value.score_threshold,
            nms_threshold: value.nms_threshold,
            score_mode: value.score_mode.into(),
            thread_num: value.thread_num,
            swap_num: value.swap_num,
            max_num: value.max_num,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    outputs: Vec<PathBuf>,
    warmup: usize,
    iterations: usize,
    model: ModelConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            warmup: 10,
            iterations: 100,
            model: ModelConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    iterations: usize,
    threads: usize,
    detections: usize,
    mean_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

fn read_f32_le(path: &Path) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "{}: length {} is not a multiple of 4",
            path.display(),
            bytes.len()
        )
        .into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("yolov5_post=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.outputs.len() != 3 {
        return Err("outputs must list exactly three tensor files (strides 8, 16, 32)".into());
    }
    if config.iterations == 0 {
        return Err("iterations must be at least 1".into());
    }

    let tensors = config
        .outputs
        .iter()
        .map(|path| read_f32_le(path))
        .collect::<Result<Vec<_>, _>>()?;
    let slices = [
        tensors[0].as_slice(),
        tensors[1].as_slice(),
        tensors[2].as_slice(),
    ];

    let mut engine = Engine::new(config.model.into())?;

    for _ in 0..config.warmup {
        engine.process_slices(slices)?;
    }

    let mut timings_ms = Vec::with_capacity(config.iterations);
    let mut detections = 0usize;
    for _ in 0..config.iterations {
        let start = Instant::now();
        let dets = engine.process_slices(slices)?;
        timings_ms.push(start.elapsed().as_secs_f64() * 1e3);
        detections = dets.len();
    }

    let total: f64 = timings_ms.iter().sum();
    let summary = Summary {
        iterations: config.iterations,
        threads: engine.num_workers(),
        detections,
        mean_ms: total / timings_ms.len() as f64,
        min_ms: timings_ms.iter().copied().fold(f64::INFINITY, f64::min),
        max_ms: timings_ms.iter().copied().fold(0.0, f64::max),
    };
    tracing::info!(
        mean_ms = summary.mean_ms,
        max_ms = summary.max_ms,
        detections = summary.detections,
        "replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
