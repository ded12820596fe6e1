//! Fake-MPI driver: documents the coordinator/worker protocol of
//! `mpi-docent.cpp` (a `TRANSLATE`/`STOP_TRANSLATING` message pair per
//! worker, fed round-robin as each worker finishes its previous document)
//! without an actual MPI binding or OS threads.
//!
//! The decoder's hot state (`Rc<DecoderRuntime>`, the `Rc<RefCell<Pcg64>>`
//! random handle) is intentionally single-threaded, the same flyweight
//! design the teacher uses for its own per-thread caches; spreading it
//! across real worker threads would need `Arc`/`Mutex` throughout
//! `docent-core`, which is out of scope here. This binary instead runs the
//! same dispatch loop a coordinator would, against one in-process worker,
//! so the message protocol is exercised and documented even though nothing
//! actually decodes concurrently. A real binding (`boost::mpi`'s Rust
//! equivalent would be `mpi` via `rsmpi`) is future work, noted in
//! DESIGN.md.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use docent_core::nbest::NbestStorage;
use docent_io::nistxml::{self, TranslatedDocument, TranslatedSegment};

use docent_cli::pipeline::{resolve_initialiser, run_search, Pipeline};
use docent_cli::{init_tracing, split_inputs};

/// The coordinator/worker message protocol `mpi-docent.cpp` sends over
/// `boost::mpi`, here just a loop-control enum for the in-process
/// simulation below.
enum WorkerMessage {
    Translate { docno: usize },
    StopTranslating,
}

#[derive(Parser)]
#[command(name = "mpi-docent", about = "Single-process simulation of the coordinator/worker decoding protocol")]
struct Args {
    #[arg(short = 'd', long = "debug")]
    debug_channel: Option<String>,

    #[arg(short = 't', long = "testset-baseline")]
    baseline: Option<PathBuf>,

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

    let initialiser = resolve_initialiser(&pipeline, args.baseline.as_deref(), &sentence_lengths)?;
    let generator = pipeline.state_generator(initialiser)?;

    // The coordinator's dispatch queue: one TRANSLATE per document, then a
    // STOP_TRANSLATING once the queue is drained.
    let mut queue: Vec<WorkerMessage> = (0..testset.len()).map(|docno| WorkerMessage::Translate { docno }).collect();
    queue.push(WorkerMessage::StopTranslating);

    let mut out_docs = Vec::with_capacity(testset.len());
    for message in queue {
        let docno = match message {
            WorkerMessage::StopTranslating => {
                tracing::debug!("C: sending STOP_TRANSLATING to worker 0");
                break;
            }
            WorkerMessage::Translate { docno } => docno,
        };
        let doc = &testset[docno];
        tracing::debug!(docno, "C: sending TRANSLATE to worker 0");

        let sentences: Vec<_> = doc.segments.iter().map(|seg| seg.tokens.clone()).collect();
        let state = pipeline.build_document(&sentences, docno, &generator)?;
        let mut nbest = NbestStorage::new(1);
        let outcome = run_search(&pipeline, state, &generator, &mut nbest, u32::MAX, u32::MAX)?;
        tracing::debug!(docno, "T: returning translated document to coordinator");

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
