//! Learning-curve driver: same arguments as `docent`, plus `--out-stem`,
//! dumping the whole testset's current translation at a log-spaced step
//! schedule (1, 2, 4, 8, ... steps) to `<out-stem>.<9-digit-step>.xml`,
//! matching `lcurve-docent.cpp`'s doubling-step loop.
//!
//! Each snapshot here is an independent search run capped at that step
//! count, rather than a continuation of the previous snapshot's cooling
//! state (the teacher's version resumes the same `SearchState` across
//! snapshots; `docent_core::search` has no API to hand a partially-cooled
//! schedule back out of a finished call). Noted as a known simplification.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use docent_core::nbest::NbestStorage;
use docent_io::nistxml::{self, TranslatedDocument, TranslatedSegment};

use docent_cli::pipeline::{resolve_initialiser, run_search, Pipeline};
use docent_cli::{init_tracing, split_inputs};

#[derive(Parser)]
#[command(name = "lcurve-docent", about = "Dump translations at a log-spaced step schedule")]
struct Args {
    #[arg(short = 'd', long = "debug")]
    debug_channel: Option<String>,

    #[arg(short = 't', long = "testset-baseline")]
    baseline: Option<PathBuf>,

    /// Snapshot filename prefix; defaults to the input testset's stem.
    #[arg(long = "out-stem")]
    out_stem: Option<String>,

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

    let out_stem = args
        .out_stem
        .clone()
        .unwrap_or_else(|| input_xml.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "out".to_string()));

    let pipeline = Pipeline::load(&args.config)?;
    let testset = nistxml::read_testset(input_xml)
        .with_context(|| format!("reading input testset from {}", input_xml.display()))?;
    let sentence_lengths: Vec<Vec<usize>> =
        testset.iter().map(|doc| doc.segments.iter().map(|seg| seg.tokens.len()).collect()).collect();
    let sentences_per_doc: Vec<Vec<_>> =
        testset.iter().map(|doc| doc.segments.iter().map(|seg| seg.tokens.clone()).collect()).collect();

    let mut steps = 1u32;
    loop {
        let initialiser = resolve_initialiser(&pipeline, args.baseline.as_deref(), &sentence_lengths)?;
        let generator = pipeline.state_generator(initialiser)?;

        let mut out_docs = Vec::with_capacity(testset.len());
        for (document_number, (doc, sentences)) in testset.iter().zip(&sentences_per_doc).enumerate() {
            let state = pipeline.build_document(sentences, document_number, &generator)?;
            let mut nbest = NbestStorage::new(1);
            let outcome = run_search(&pipeline, state, &generator, &mut nbest, steps, u32::MAX)?;
            tracing::info!(docid = %doc.docid, steps, final_score = outcome.document.score(), "snapshot");

            let translation = outcome.document.as_plain_text();
            out_docs.push(TranslatedDocument {
                docid: doc.docid.clone(),
                segments: doc
                    .segments
                    .iter()
                    .zip(translation)
                    .map(|(seg, tokens)| TranslatedSegment { id: seg.id.clone(), tokens, score_breakdown: None })
                    .collect(),
            });
        }

        let out_path = PathBuf::from(format!("{out_stem}.{steps:09}.xml"));
        nistxml::write_testset(&out_docs, &out_path).with_context(|| format!("writing snapshot to {}", out_path.display()))?;

        let total_max_steps = pipeline
            .config
            .search
            .parameters
            .get("max-steps")
            .and_then(|v| v.as_u32())
            .unwrap_or(u32::MAX);
        if steps >= total_max_steps {
            break;
        }
        steps = steps.saturating_mul(2).min(total_max_steps);
    }

    Ok(())
}
