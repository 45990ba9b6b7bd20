//! Library surface for the mutant-killing driver: the mutation-tree model,
//! the oracle, program generation, kill search, the scheduler, and kill
//! consolidation, plus the ambient CLI/driver shell. `main.rs` is a thin
//! entry point over [`driver::run`].

pub mod cli;
pub mod consolidate;
pub mod driver;
pub mod error;
pub mod model;
pub mod mutation_info;
pub mod mutation_tree;
pub mod oracle;
pub mod program_gen;
pub mod scheduler;
pub mod scratch;
pub mod search;
pub mod subprocess;
