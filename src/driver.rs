//! Wires the mutation tree, oracle, scheduler, search, and consolidator
//! into the outer run loop, logging progress via structured `tracing`
//! events rather than banner prints.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::consolidate::{CreduceReducer, LiveConsolidator};
use crate::error::DriverError;
use crate::model::Population;
use crate::mutation_info;
use crate::mutation_tree::MutationTree;
use crate::program_gen::{self, PassThroughPreparer};
use crate::scheduler::Scheduler;
use crate::search::{self, LiveOracle};

/// Run configuration assembled once from [`Cli`] and validated at start-up.
pub struct Config {
    pub mutation_info_file: PathBuf,
    pub mutation_info_file_for_mutant_coverage_tracking: PathBuf,
    pub mutated_compiler_executable: PathBuf,
    pub mutant_tracking_compiler_executable: PathBuf,
    pub csmith_root: PathBuf,
    pub max_consecutive_failed_attempts_per_program: u32,
    pub max_attempts_per_program: u32,
    pub num_simultaneous_mutations: usize,
    pub seed: u64,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let seed = cli.seed.unwrap_or_else(|| rand::random());
        Config {
            mutation_info_file: cli.mutation_info_file,
            mutation_info_file_for_mutant_coverage_tracking: cli.mutation_info_file_for_mutant_coverage_tracking,
            mutated_compiler_executable: cli.mutated_compiler_executable,
            mutant_tracking_compiler_executable: cli.mutant_tracking_compiler_executable,
            csmith_root: cli.csmith_root,
            max_consecutive_failed_attempts_per_program: cli.max_consecutive_failed_attempts_per_program,
            max_attempts_per_program: cli.max_attempts_per_program,
            num_simultaneous_mutations: cli.num_simultaneous_mutations,
            seed,
        }
    }
}

/// Loads both mutation-info documents, builds their trees, and asserts
/// they are structurally identical. The mutated compiler's document and the
/// coverage-tracking compiler's document must describe the same mutation
/// tree, or coverage ids would be meaningless against the mutated compiler.
fn load_and_cross_check_trees(config: &Config) -> Result<MutationTree, DriverError> {
    let primary_roots = mutation_info::load(&config.mutation_info_file)?;
    let coverage_roots = mutation_info::load(&config.mutation_info_file_for_mutant_coverage_tracking)?;

    let primary_tree = MutationTree::build(&primary_roots)?;
    let coverage_tree = MutationTree::build(&coverage_roots)?;

    if !primary_tree.structurally_equal(&coverage_tree) {
        return Err(DriverError::CoverageInfoMismatch {
            num_nodes_a: primary_tree.num_nodes(),
            num_nodes_b: coverage_tree.num_nodes(),
            num_mutations_a: primary_tree.num_mutations(),
            num_mutations_b: coverage_tree.num_mutations(),
        });
    }

    Ok(primary_tree)
}

/// The outer loop: generate a program, then attempt kills against it up to
/// the configured bounds, logging a progress line after every attempt.
/// Runs indefinitely; stopped externally (Ctrl-C / signal).
pub async fn run(config: Config) -> Result<(), DriverError> {
    let tree = load_and_cross_check_trees(&config)?;
    tracing::info!(
        num_nodes = tree.num_nodes(),
        num_mutations = tree.num_mutations(),
        seed = config.seed,
        "mutation trees loaded and cross-checked"
    );

    if tree.num_mutations() == 0 {
        tracing::info!("document names zero mutations; nothing to kill");
        return Ok(());
    }

    let mut population = Population::new(tree.num_mutations());
    let mut scheduler = Scheduler::new(config.num_simultaneous_mutations, config.seed);
    let oracle = LiveOracle {
        compiler_executable: config.mutated_compiler_executable.clone(),
        csmith_root: config.csmith_root.clone(),
    };
    let consolidator = LiveConsolidator {
        tree: &tree,
        csmith_root: config.csmith_root.clone(),
        compiler_executable: config.mutated_compiler_executable.clone(),
        reducer: Box::new(CreduceReducer),
    };
    let preparer = PassThroughPreparer;

    loop {
        let program_stats = program_gen::next_program(
            &config.csmith_root,
            &config.mutated_compiler_executable,
            &config.mutant_tracking_compiler_executable,
            &preparer,
        )
        .await;
        tracing::info!(
            covered = program_stats.covered_mutants.len(),
            "generated a fresh reference program"
        );

        let mut consecutive_failed_attempts = 0u32;
        let mut total_attempts = 0u32;

        while consecutive_failed_attempts < config.max_consecutive_failed_attempts_per_program
            && total_attempts < config.max_attempts_per_program
            && !population.unkilled.is_empty()
        {
            let candidates = scheduler.select(&population.unkilled, &tree, &program_stats.covered_mutants);
            if candidates.is_empty() {
                // Every mutant is killed.
                break;
            }

            let found_kill = search::search(
                &oracle,
                &consolidator,
                &mut population,
                &program_stats,
                &candidates,
            )
            .await?;

            total_attempts += 1;
            if found_kill {
                consecutive_failed_attempts = 0;
            } else {
                consecutive_failed_attempts += 1;
            }

            let remaining_in_round = population
                .unkilled
                .values()
                .filter(|&&round| round == scheduler.round())
                .count();
            tracing::info!(
                total = population.total(),
                covered = program_stats.covered_mutants.len(),
                killed = population.killed.len(),
                remaining = population.unkilled.len(),
                round = scheduler.round(),
                remaining_in_round,
                attempt = total_attempts,
                "attempt complete"
            );
        }

        if population.unkilled.is_empty() {
            tracing::info!("every mutant has been killed");
            return Ok(());
        }
    }
}
