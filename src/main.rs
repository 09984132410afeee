mod cli;

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use vad_rust::features::extraction::FeatureSink;
use vad_rust::models::precomputed::PrecomputedScores;
use vad_rust::pipeline::{evaluate, EvaluationOptions};
use vad_rust::utils::ground_truth::EvaluationManifest;
use vad_rust::{ClipFeature, FeaturesWriter};

use crate::cli::{AggregateArgs, Cli, Commands, EvaluateArgs};

fn main() {
    let cli = Cli::parse();
    vad_rust::logging::init(&cli.log_level);

    if let Err(err) = run(cli) {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Aggregate(args) => run_aggregate(args),
        Commands::Evaluate(args) => run_evaluate(args),
    }
}

fn run_aggregate(args: AggregateArgs) -> Result<()> {
    let file = File::open(&args.clips)
        .with_context(|| format!("failed to open clip features: {}", args.clips.display()))?;
    info!(clips = %args.clips.display(), output_dir = %args.output_dir.display(), "aggregating clip features");

    let mut sink = FeatureSink::new(FeaturesWriter::new());
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", args.clips.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let clip: ClipFeature = serde_json::from_str(&line).with_context(|| {
            format!("invalid clip record at {}:{}", args.clips.display(), index + 1)
        })?;
        let key = clip.key(&args.output_dir);
        sink.accept(&key, clip.start_frame, Ok(clip.features));
    }
    let summary = sink.finish();

    let skipped: Vec<_> = summary
        .skipped
        .iter()
        .map(|skip| json!({ "video": skip.key.id(), "reason": skip.reason }))
        .collect();
    let report = json!({
        "videos_written": summary.videos_written,
        "clips_written": summary.clips_written,
        "ignored_clips": summary.ignored_clips,
        "skipped": skipped,
    });
    write_json(None, &report)
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let manifest = EvaluationManifest::load(&args.manifest)
        .with_context(|| format!("failed to load manifest: {}", args.manifest.display()))?;
    let scorer = PrecomputedScores::load(&args.scores)
        .with_context(|| format!("failed to load scores: {}", args.scores.display()))?;
    let videos = manifest.videos(&args.features_dir);
    info!(videos = videos.len(), scored = scorer.len(), "evaluating");

    let options = EvaluationOptions {
        threads: args.threads,
        threshold: args.threshold,
    };
    let report = evaluate(&scorer, &videos, &options).context("evaluation failed")?;
    info!(auc = report.roc.auc, "roc computed");
    write_json(args.output.as_deref(), &report)
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value).context("failed to serialize report")?;
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory: {}", parent.display()))?;
            }
            let mut file = File::create(path)
                .with_context(|| format!("failed to create report: {}", path.display()))?;
            file.write_all(&data)
                .and_then(|()| file.write_all(b"\n"))
                .with_context(|| format!("failed to write report: {}", path.display()))?;
            info!(path = %path.display(), "wrote report");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
