use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "vad",
    version,
    about = "Temporal feature aggregation and ROC evaluation for video anomaly detection"
)]
pub struct Cli {
    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reduce per-clip features into 32-segment feature files.
    Aggregate(AggregateArgs),
    /// Score stored features and compute the frame-level ROC curve.
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    /// JSON-lines file of `{subdir, video, start_frame, features}` records.
    #[arg(long)]
    pub clips: PathBuf,

    #[arg(long)]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub features_dir: PathBuf,

    /// JSON manifest of videos, frame counts and anomalous intervals.
    #[arg(long)]
    pub manifest: PathBuf,

    /// JSON object mapping `subdir/video` to 32 segment scores.
    #[arg(long)]
    pub scores: PathBuf,

    /// Where to write the ROC report; stdout when omitted.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub threads: Option<usize>,

    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,
}
