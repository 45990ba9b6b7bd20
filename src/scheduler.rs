//! Picks the next pairwise-compatible batch of mutants to try together.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;

use crate::model::{MutationId, UnkilledMap};
use crate::mutation_tree::MutationTree;

/// Default ceiling on the size of one selection.
pub const DEFAULT_NUM_SIMULTANEOUS_MUTATIONS: usize = 64;

pub struct Scheduler {
    round: u32,
    num_simultaneous_mutations: usize,
    rng: StdRng,
}

impl Scheduler {
    pub fn new(num_simultaneous_mutations: usize, seed: u64) -> Self {
        Scheduler {
            round: 0,
            num_simultaneous_mutations,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Eligible mutants are those still unkilled whose round counter equals
    /// the current round. `covered_by_program` restricts the first attempt
    /// at a round to mutants this program can actually reach; if that
    /// leaves nothing, the round advances and eligibility is re-evaluated
    /// without the coverage filter, so coverage-unreachable mutants still
    /// make progress instead of stalling the run forever.
    pub fn select(
        &mut self,
        unkilled: &UnkilledMap,
        tree: &MutationTree,
        covered_by_program: &HashSet<MutationId>,
    ) -> Vec<MutationId> {
        loop {
            let eligible = |require_coverage: bool| -> HashSet<MutationId> {
                unkilled
                    .iter()
                    .filter(|(_, &round)| round == self.round)
                    .map(|(&id, _)| id)
                    .filter(|id| !require_coverage || covered_by_program.contains(id))
                    .collect()
            };

            let mut available = eligible(true);
            if available.is_empty() {
                available = eligible(false);
                if available.is_empty() {
                    self.round += 1;
                    continue;
                }
            }

            return self.draw(available, tree);
        }
    }

    fn draw(&mut self, mut available: HashSet<MutationId>, tree: &MutationTree) -> Vec<MutationId> {
        let mut result = Vec::new();
        while !available.is_empty() && result.len() < self.num_simultaneous_mutations {
            let Some(&id) = available.iter().choose(&mut self.rng) else {
                break;
            };
            result.push(id);
            if let Ok(incompatible) = tree.incompatible(id) {
                for other in incompatible {
                    available.remove(&other);
                }
            } else {
                available.remove(&id);
            }
        }
        result
    }
}
