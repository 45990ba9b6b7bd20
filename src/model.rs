use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Dense, non-negative identifier for a single concrete source mutation.
pub type MutationId = u32;

/// Arena index into [`crate::mutation_tree::MutationTree`]'s node vectors.
pub type NodeId = usize;

/// The invariants of one generated test input, obtained by
/// [`crate::program_gen`] and consumed by [`crate::oracle`]/[`crate::search`].
#[derive(Debug, Clone)]
pub struct ProgramStats {
    /// Path to the prepared source file (stable scratch name, e.g. `__prog.c`).
    pub name: PathBuf,
    pub compile_time: f64,
    pub execution_time: f64,
    pub expected_output: Vec<u8>,
    pub executable_hash: String,
    pub covered_mutants: std::collections::HashSet<MutationId>,
}

/// Classification of a single oracle invocation.
///
/// The first two variants are non-kills; the remaining five are kills of
/// increasing strength, with [`ExecutionStatus::MiscompilationKill`] the
/// strongest (it alone triggers reduction in [`crate::consolidate`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    NoEffect,
    DifferentBinariesSameResult,
    CompileFailKill,
    CompileTimeoutKill,
    RunFailKill,
    RunTimeoutKill,
    MiscompilationKill,
}

impl ExecutionStatus {
    /// `true` for the five kill variants; `false` for the two non-kills.
    pub fn is_kill(self) -> bool {
        !matches!(
            self,
            ExecutionStatus::NoEffect | ExecutionStatus::DifferentBinariesSameResult
        )
    }

    pub fn is_miscompilation(self) -> bool {
        matches!(self, ExecutionStatus::MiscompilationKill)
    }
}

/// `mutation_id -> failed-attempt counter`. The counter is the mutant's
/// *round*: a mutant is eligible in round `R` iff its counter equals `R`.
pub type UnkilledMap = HashMap<MutationId, u32>;

/// `mutation_id -> terminal classification`.
pub type KilledMap = HashMap<MutationId, ExecutionStatus>;

/// Overall population state carried for the lifetime of one driver run.
///
/// Invariant: `killed.len() + unkilled.len() == num_mutations` and the two
/// maps are disjoint, at every point between subprocess calls.
#[derive(Debug, Default)]
pub struct Population {
    pub unkilled: UnkilledMap,
    pub killed: KilledMap,
}

impl Population {
    pub fn new(num_mutations: usize) -> Self {
        let mut unkilled = UnkilledMap::with_capacity(num_mutations);
        for id in 0..num_mutations as MutationId {
            unkilled.insert(id, 0);
        }
        Population {
            unkilled,
            killed: KilledMap::new(),
        }
    }

    /// Moves `id` from `unkilled` to `killed` with `status`. Only ever called
    /// with a kill status: non-kills merely bump the round counter instead
    /// of transferring the id between maps.
    pub fn commit_kill(&mut self, id: MutationId, status: ExecutionStatus) {
        debug_assert!(status.is_kill());
        self.unkilled.remove(&id);
        self.killed.insert(id, status);
    }

    /// Increments the round counter for a mutant that survived an attempt.
    pub fn record_non_kill(&mut self, id: MutationId) {
        if let Some(round) = self.unkilled.get_mut(&id) {
            *round += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.unkilled.len() + self.killed.len()
    }

    #[cfg(test)]
    pub fn invariant_holds(&self, num_mutations: usize) -> bool {
        self.total() == num_mutations
            && self.unkilled.keys().all(|id| !self.killed.contains_key(id))
    }
}
