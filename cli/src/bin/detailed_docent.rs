//! Sampling driver: same arguments as `docent`, plus `--sample-interval N`
//! and `--snapshot-dir DIR`, dumping every document's current segmentation
//! to a saved-state archive every `N` steps, matching `detailed-docent.cpp`'s
//! `burnIn`/`sampleInterval`/`maxSteps` loop.
//!
//! As in `lcurve-docent`, each sampling interval here is an independent
//! search run capped at that step count rather than a continuation of the
//! previous interval's cooling state — see the note in `lcurve_docent.rs`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use docent_core::nbest::NbestStorage;
use docent_io::nistxml;
use docent_io::saved_state;

use docent_cli::pipeline::{resolve_initialiser, run_search, Pipeline};
use docent_cli::{init_tracing, split_inputs};

#[derive(Parser)]
#[command(name = "detailed-docent", about = "Dump segmentation snapshots at a fixed sampling interval")]
struct Args {
    #[arg(short = 'd', long = "debug")]
    debug_channel: Option<String>,

    #[arg(short = 't', long = "testset-baseline")]
    baseline: Option<PathBuf>,

    #[arg(long = "sample-interval", default_value_t = 100)]
    sample_interval: u32,

    #[arg(long = "snapshot-dir", default_value = ".")]
    snapshot_dir: PathBuf,

    config: PathBuf,
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug_channel.as_deref());

    let (mmax_dir, input_xml) = split_inputs(&args.inputs)?;
    if mmax_dir.is_some() {
        tracing::warn!("an MMAX markable directory was given, but no MMAX parser is wired up");
    }

    let pipeline = Pipeline::load(&args.config)?;
    let testset = nistxml::read_testset(input_xml)
        .with_context(|| format!("reading input testset from {}", input_xml.display()))?;
    let sentence_lengths: Vec<Vec<usize>> =
        testset.iter().map(|doc| doc.segments.iter().map(|seg| seg.tokens.len()).collect()).collect();
    let sentences_per_doc: Vec<Vec<_>> =
        testset.iter().map(|doc| doc.segments.iter().map(|seg| seg.tokens.clone()).collect()).collect();

    let total_max_steps = pipeline
        .config
        .search
        .parameters
        .get("max-steps")
        .and_then(|v| v.as_u32())
        .unwrap_or(100_000);

    std::fs::create_dir_all(&args.snapshot_dir)
        .with_context(|| format!("creating snapshot directory {}", args.snapshot_dir.display()))?;

    let mut steps = args.sample_interval;
    while steps <= total_max_steps {
        let initialiser = resolve_initialiser(&pipeline, args.baseline.as_deref(), &sentence_lengths)?;
        let generator = pipeline.state_generator(initialiser)?;

        let mut states = Vec::with_capacity(testset.len());
        for (document_number, (doc, sentences)) in testset.iter().zip(&sentences_per_doc).enumerate() {
            let state = pipeline.build_document(sentences, document_number, &generator)?;
            let mut nbest = NbestStorage::new(1);
            let outcome = run_search(&pipeline, state, &generator, &mut nbest, steps, u32::MAX)?;
            tracing::info!(docid = %doc.docid, steps, final_score = outcome.document.score(), "sample");
            states.push(outcome.document);
        }

        let path = args.snapshot_dir.join(format!("snapshot.{steps:09}.bin"));
        saved_state::save(&states, &path).with_context(|| format!("writing snapshot to {}", path.display()))?;

        steps += args.sample_interval;
    }

    Ok(())
}
