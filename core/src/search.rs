//! Search algorithms: the outer loops that repeatedly draw a
//! [`crate::step::SearchStep`] from a [`StateGenerator`], decide whether to
//! accept it, and feed accepted documents into an [`NbestStorage`].

use tracing::{debug, info};

use crate::cooling::CoolingSchedule;
use crate::document::DocumentState;
use crate::generator::StateGenerator;
use crate::nbest::NbestStorage;
use crate::random::Random;

/// Whether a proposed score is good enough to commit. The Metropolis form
/// draws one random threshold per step (`threshold = T * ln(d) + oldScore`,
/// `d ~ Uniform(0,1)`), giving `P(accept) = exp((new - old) / T)` when
/// `new < old`, and always accepting improvements; the threshold-only form
/// is a plain deterministic cutoff, used by local beam search against the
/// current beam's lowest score.
pub struct AcceptanceDecision {
    threshold: f32,
    draw: f32,
    temperature: f32,
    old_score: f32,
}

impl AcceptanceDecision {
    pub fn threshold(threshold: f32) -> Self {
        AcceptanceDecision { threshold, draw: 0.0, temperature: 0.0, old_score: 0.0 }
    }

    pub fn metropolis(rnd: &Random, temperature: f32, old_score: f32) -> Self {
        let draw = rnd.draw01();
        let threshold = temperature * draw.ln() + old_score;
        AcceptanceDecision { threshold, draw, temperature, old_score }
    }

    pub fn accepts(&self, new_score: f32) -> bool {
        debug!(
            new_score,
            old_score = self.old_score,
            threshold = self.threshold,
            temperature = self.temperature,
            draw = self.draw,
            "acceptance decision"
        );
        new_score > self.threshold
    }
}

/// What a finished search run did, for the caller's logging/reporting.
pub struct SearchOutcome {
    pub document: DocumentState,
    pub aborted: bool,
    pub steps: u32,
    pub accepted: u32,
}

fn log_move_counts(doc: &DocumentState, generator: &StateGenerator) {
    for (&operator_id, &(attempted, accepted)) in doc.move_counts() {
        info!(
            attempted,
            accepted,
            operator = %generator.operator_description(operator_id),
            "move statistics"
        );
    }
}

/// Simulated annealing (and, with a [`CoolingSchedule::HillClimbing`]
/// schedule, hill climbing): repeatedly proposes a step, accepts it with
/// Metropolis probability at the schedule's current temperature, and cools
/// after every step.
pub struct SimulatedAnnealing {
    random: Random,
    total_max_steps: u32,
    target_score: f32,
}

impl SimulatedAnnealing {
    pub fn new(random: Random, total_max_steps: u32, target_score: f32) -> Self {
        SimulatedAnnealing { random, total_max_steps, target_score }
    }

    pub fn search(
        &self,
        mut document: DocumentState,
        generator: &StateGenerator,
        nbest: &mut NbestStorage,
        mut schedule: CoolingSchedule,
        max_steps: u32,
        max_accepted: u32,
    ) -> SearchOutcome {
        nbest.offer(&document);

        let mut accepted = 0u32;
        let mut steps = 0u32;
        let mut aborted = false;
        let mut i = 0u32;

        while !schedule.is_done()
            && i < max_steps
            && steps < self.total_max_steps
            && accepted < max_accepted
            && nbest.best_score() < self.target_score
        {
            let accept = AcceptanceDecision::metropolis(&self.random, schedule.temperature(), document.score());

            let mut step = match generator.create_search_step(&document) {
                Some(s) => s,
                None => {
                    aborted = true;
                    break;
                }
            };
            document.register_attempted_move(step.operator_id());

            if step.is_provisionally_acceptable(&document, &accept) {
                let final_score = step.score(&document);
                if accept.accepts(final_score) {
                    debug!("accepting step");
                    schedule.step(final_score, true);
                    document.apply_modifications(step);
                    nbest.offer(&document);
                    accepted += 1;
                } else {
                    schedule.step(final_score, false);
                    debug!("discarding step");
                }
            } else {
                let estimate = step.score_estimate(&document);
                schedule.step(estimate, false);
                debug!("discarding step (estimate rejected)");
            }

            i += 1;
            steps += 1;
        }

        if aborted {
            info!("document search aborted");
        }
        if schedule.is_done() {
            info!("end of cooling schedule reached");
        }
        if accepted >= max_accepted {
            info!(max_accepted, "maximum number of accepted steps reached");
        }
        if i >= max_steps {
            info!("search interrupted");
        }
        if steps >= self.total_max_steps {
            info!(total_max_steps = self.total_max_steps, "maximum number of steps reached");
        }
        if nbest.best_score() > self.target_score {
            info!("found solution with better than target score");
        }

        log_move_counts(&document, generator);

        SearchOutcome { document, aborted, steps, accepted }
    }
}

/// Maintains a beam of `beam_size` documents; each step perturbs a randomly
/// chosen beam member and, if accepted against the beam's current worst
/// score, both updates the beam and offers the result to the run-wide
/// n-best list.
pub struct LocalBeamSearch {
    random: Random,
    total_max_steps: u32,
    max_rejected: u32,
    target_score: f32,
    beam_size: usize,
}

impl LocalBeamSearch {
    pub fn new(random: Random, total_max_steps: u32, max_rejected: u32, target_score: f32, beam_size: usize) -> Self {
        LocalBeamSearch { random, total_max_steps, max_rejected, target_score, beam_size }
    }

    pub fn search(
        &self,
        document: DocumentState,
        generator: &StateGenerator,
        nbest: &mut NbestStorage,
        max_steps: u32,
        max_accepted: u32,
    ) -> SearchOutcome {
        let mut beam = NbestStorage::new(self.beam_size);
        beam.offer(&document);
        for doc in beam.iter() {
            nbest.offer(doc);
        }

        let mut accepted = 0u32;
        let mut steps = 0u32;
        let mut rejected = 0u32;
        let mut i = 0u32;

        while rejected < self.max_rejected
            && i < max_steps
            && steps < self.total_max_steps
            && accepted < max_accepted
            && nbest.best_score() < self.target_score
        {
            let accept = AcceptanceDecision::threshold(beam.lowest_score_in_list());
            let picked = beam.pick_random(&self.random);
            // Clone rather than mutate the beam member in place: the
            // original splices the shared_ptr's pointee directly, which
            // leaves its entry in the beam's dedup hash set keyed by a now-
            // stale hash. Cloning and re-`offer`ing keeps the beam's dedup
            // index consistent at the cost of one extra deep clone per step.
            let mut doc = (*picked).clone();

            let mut step = match generator.create_search_step(&doc) {
                Some(s) => s,
                None => {
                    rejected += 1;
                    i += 1;
                    steps += 1;
                    continue;
                }
            };
            doc.register_attempted_move(step.operator_id());

            if step.is_provisionally_acceptable(&doc, &accept) {
                let final_score = step.score(&doc);
                if accept.accepts(final_score) {
                    debug!("accepting step");
                    doc.apply_modifications(step);
                    beam.offer(&doc);
                    nbest.offer(&doc);
                    accepted += 1;
                } else {
                    debug!("discarding step");
                    rejected += 1;
                }
            } else {
                debug!("discarding step");
                rejected += 1;
            }

            i += 1;
            steps += 1;
        }

        if rejected >= self.max_rejected {
            info!(max_rejected = self.max_rejected, "maximum number of rejections reached");
        }
        if i > max_steps {
            info!("search interrupted");
        }
        if accepted >= max_accepted {
            info!(max_accepted, "maximum number of accepted steps reached");
        }
        if steps > self.total_max_steps {
            info!(total_max_steps = self.total_max_steps, "maximum number of steps reached");
        }
        if nbest.best_score() > self.target_score {
            info!("found solution with better than target score");
        }

        for doc in beam.iter() {
            log_move_counts(doc, generator);
        }

        let best = beam.best_document_state().as_ref().clone();
        SearchOutcome { document: best, aborted: false, steps, accepted }
    }
}
