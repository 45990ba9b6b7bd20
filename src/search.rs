//! Recursive bisection kill search over a fixed candidate set. `candidates`
//! must already be pairwise compatible — the scheduler guarantees this
//! before calling in.

use async_recursion::async_recursion;

use crate::error::DriverError;
use crate::model::{ExecutionStatus, MutationId, Population, ProgramStats};
use crate::oracle;
use crate::scratch;

/// One probe of the oracle, abstracted so tests can substitute a fake
/// compiler without touching the bisection logic. A launch failure (bad
/// compiler path, missing exec bit, ...) is a fatal configuration error and
/// is propagated rather than classified.
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    async fn attempt(
        &self,
        program_stats: &ProgramStats,
        selected: &[MutationId],
    ) -> Result<ExecutionStatus, DriverError>;
}

pub struct LiveOracle {
    pub compiler_executable: std::path::PathBuf,
    pub csmith_root: std::path::PathBuf,
}

#[async_trait::async_trait]
impl Oracle for LiveOracle {
    async fn attempt(
        &self,
        program_stats: &ProgramStats,
        selected: &[MutationId],
    ) -> Result<ExecutionStatus, DriverError> {
        oracle::attempt_kill(&self.compiler_executable, &self.csmith_root, program_stats, selected).await
    }
}

/// Invoked once a singleton candidate is confirmed as the culprit, to probe
/// its incompatibility-cone relatives and reduce any miscompilation found.
/// Kept as a trait here (rather than importing `crate::consolidate`
/// directly) so this module has no dependency on the reducer/external-
/// process machinery.
#[async_trait::async_trait]
pub trait KillConsolidator: Send + Sync {
    async fn consolidate(
        &self,
        oracle: &dyn Oracle,
        population: &mut Population,
        program_stats: &ProgramStats,
        killed_m: MutationId,
        status: ExecutionStatus,
    ) -> Result<(), DriverError>;
}

/// A consolidator that does nothing beyond the commit already performed by
/// `search`. Useful for tests and for callers that want consolidation run
/// as a separate, explicit step.
pub struct NoConsolidation;

#[async_trait::async_trait]
impl KillConsolidator for NoConsolidation {
    async fn consolidate(
        &self,
        _oracle: &dyn Oracle,
        _population: &mut Population,
        _program_stats: &ProgramStats,
        _killed_m: MutationId,
        _status: ExecutionStatus,
    ) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Finds and commits kills within `candidates`, returning whether any kill
/// occurred:
/// 1. empty `candidates` is a no-op (trivially no kill).
/// 2. probe the oracle on the whole set; a non-kill bumps every candidate's
///    round counter and returns `false`.
/// 3. a singleton kill is committed and handed to the consolidator.
/// 4. otherwise split at the midpoint, recurse left, filter the right half
///    against mutants the left recursion already killed (consolidation may
///    kill relatives as a side effect), recurse right, and return the
///    disjunction.
#[async_recursion]
pub async fn search(
    oracle: &dyn Oracle,
    consolidator: &dyn KillConsolidator,
    population: &mut Population,
    program_stats: &ProgramStats,
    candidates: &[MutationId],
) -> Result<bool, DriverError> {
    if candidates.is_empty() {
        return Ok(false);
    }

    let status = oracle.attempt(program_stats, candidates).await?;
    if !status.is_kill() {
        for &id in candidates {
            population.record_non_kill(id);
        }
        return Ok(false);
    }

    if candidates.len() == 1 {
        let id = candidates[0];
        population.commit_kill(id, status);
        consolidator.consolidate(oracle, population, program_stats, id, status).await?;
        let _ = scratch::remove_if_present(std::path::Path::new(scratch::MUTATED_EXECUTABLE));
        return Ok(true);
    }

    let mid = candidates.len() / 2;
    let left = &candidates[..mid];
    let right_full = &candidates[mid..];

    let left_result = search(oracle, consolidator, population, program_stats, left).await?;

    let right: Vec<MutationId> = right_full
        .iter()
        .copied()
        .filter(|id| !population.killed.contains_key(id))
        .collect();
    let right_result = search(oracle, consolidator, population, program_stats, &right).await?;

    Ok(left_result || right_result)
}
