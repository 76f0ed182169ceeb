//! Independent proofs run on worker threads.
//!
//! Each job owns its [`Proof`] and therefore its own `Services`; nothing
//! mutable is shared between workers. Jobs are dealt round-robin to at most
//! `side_proof_workers` scoped threads and results come back in job order.
use log::debug;

use super::{Prover, ProverRunInfo};
use crate::{
    proof::Proof,
    settings::ProofSettings,
    utils::error::{ProofError, ProofResult},
};

#[derive(Debug)]
pub struct SideProofJob {
    pub name: String,
    pub proof: Proof,
}

impl SideProofJob {
    pub fn new(name: impl Into<String>, proof: Proof) -> Self {
        Self {
            name: name.into(),
            proof,
        }
    }
}

#[derive(Debug)]
pub struct SideProofResult {
    pub name: String,
    pub proof: Proof,
    /// Errors of one side proof do not affect the others.
    pub outcome: ProofResult<ProverRunInfo>,
}

impl SideProofResult {
    pub fn is_closed(&self) -> bool {
        self.proof.is_closed()
    }
}

/// Runs every job to completion with the strategy settings of `settings`.
///
/// A panicking worker is reported as an invariant violation.
pub fn run_side_proofs(jobs: Vec<SideProofJob>, settings: &ProofSettings) -> ProofResult<Vec<SideProofResult>> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }
    let workers = settings.side_proof_workers.clamp(1, jobs.len());
    let mut buckets: Vec<Vec<(usize, SideProofJob)>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, job) in jobs.into_iter().enumerate() {
        buckets[i % workers].push((i, job));
    }
    debug!("Running side proofs on {workers} workers.");

    let strategy = &settings.strategy;
    let joined = crossbeam::scope(|scope| {
        let handles: Vec<_> = buckets
            .into_iter()
            .map(|bucket| {
                scope.spawn(move |_| {
                    bucket
                        .into_iter()
                        .map(|(i, mut job)| {
                            let outcome = Prover::new(strategy).and_then(|mut prover| prover.run(&mut job.proof));
                            let result = SideProofResult {
                                name: job.name,
                                proof: job.proof,
                                outcome,
                            };
                            (i, result)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join()).collect::<Vec<_>>()
    })
    .map_err(|_| ProofError::InvariantViolation("side proof scope panicked".to_string()))?;

    let mut results = Vec::new();
    for worker in joined {
        let done = worker.map_err(|_| ProofError::InvariantViolation("side proof worker panicked".to_string()))?;
        results.extend(done);
    }
    results.sort_by_key(|(i, _)| *i);
    Ok(results.into_iter().map(|(_, r)| r).collect())
}
