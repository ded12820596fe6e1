//! The plain driver: `docent -d <channel> [-t baseline.xml] config.toml
//! [input.mmax-dir] input.xml`, matching `docent.cpp`'s `main()`/
//! `processTestset()` — load the configuration once, decode every document
//! in the testset to completion, write the 1-best translations back out.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use docent_core::nbest::NbestStorage;
use docent_io::nistxml::{self, TranslatedDocument, TranslatedSegment};

use docent_cli::pipeline::{resolve_initialiser, run_search, Pipeline};
use docent_cli::{init_tracing, split_inputs};

#[derive(Parser)]
#[command(name = "docent", about = "Document-level phrase-based decoder")]
struct Args {
    /// Module to enable debug-level logging for, e.g. `docent_core::search`.
    #[arg(short = 'd', long = "debug")]
    debug_channel: Option<String>,

    /// A baseline 1-best translation (NIST XML) to seed every sentence's
    /// initial segmentation from, overriding the configured init-method.
    #[arg(short = 't', long = "testset-baseline")]
    baseline: Option<PathBuf>,

    config: PathBuf,

    /// Either `input.mmax-dir input.xml` or just `input.xml`.
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug_channel.as_deref());

    let (mmax_dir, input_xml) = split_inputs(&args.inputs)?;
    if mmax_dir.is_some() {
        tracing::warn!("an MMAX markable directory was given, but no MMAX parser is wired up; markable-dependent features will see no markables");
    }

    let pipeline = Pipeline::load(&args.config)?;
    let testset = nistxml::read_testset(input_xml)
        .with_context(|| format!("reading input testset from {}", input_xml.display()))?;
    let sentence_lengths: Vec<Vec<usize>> =
        testset.iter().map(|doc| doc.segments.iter().map(|seg| seg.tokens.len()).collect()).collect();

    let initialiser = resolve_initialiser(&pipeline, args.baseline.as_deref(), &sentence_lengths)?;
    let generator = pipeline.state_generator(initialiser)?;

    let mut out_docs = Vec::with_capacity(testset.len());
    for (document_number, doc) in testset.iter().enumerate() {
        let sentences: Vec<_> = doc.segments.iter().map(|seg| seg.tokens.clone()).collect();
        let state = pipeline.build_document(&sentences, document_number, &generator)?;

        let initial_score = state.score();
        let mut nbest = NbestStorage::new(1);
        let outcome = run_search(&pipeline, state, &generator, &mut nbest, u32::MAX, u32::MAX)?;
        if outcome.aborted {
            tracing::warn!(docid = %doc.docid, "search aborted for this document; emitting its last accepted state");
        }
        tracing::info!(docid = %doc.docid, initial_score, final_score = outcome.document.score(), steps = outcome.steps, "decoded document");

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

    print!("{}", nistxml::render_testset(&out_docs)?);
    Ok(())
}
