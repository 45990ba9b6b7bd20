//! The command-line surface, implemented with `clap` derive since the
//! option set is small and stable (a builder-style `clap::Command` doesn't
//! scale as nicely once options carry defaults and doc comments double as
//! `--help` text).

use std::path::PathBuf;

use clap::Parser;

use crate::scheduler::DEFAULT_NUM_SIMULTANEOUS_MUTATIONS;

/// Drives a Dredd-mutated C/C++ compiler through a feedback-driven
/// mutant-killing search loop.
#[derive(Debug, Parser)]
#[command(name = "dredd-kill-driver", version, about)]
pub struct Cli {
    /// Mutation-info document produced for the mutated compiler under test.
    pub mutation_info_file: PathBuf,

    /// Mutation-info document produced for the coverage-tracking compiler;
    /// must describe the structurally identical tree as the first file.
    pub mutation_info_file_for_mutant_coverage_tracking: PathBuf,

    /// Executable that compiles with `DREDD_ENABLED_MUTATION` honoured.
    pub mutated_compiler_executable: PathBuf,

    /// Executable that compiles with `DREDD_MUTANT_TRACKING_FILE` honoured.
    pub mutant_tracking_compiler_executable: PathBuf,

    /// Root of the csmith checkout (`<root>/build/src/csmith`, `<root>/runtime`).
    pub csmith_root: PathBuf,

    /// Discard a generated program after this many consecutive failed kill
    /// attempts against it.
    #[arg(long, default_value_t = 10)]
    pub max_consecutive_failed_attempts_per_program: u32,

    /// Discard a generated program after this many total kill attempts
    /// against it, regardless of consecutive-failure streaks.
    #[arg(long, default_value_t = 100)]
    pub max_attempts_per_program: u32,

    /// Ceiling on the number of mutants enabled in a single oracle call.
    #[arg(long, default_value_t = DEFAULT_NUM_SIMULTANEOUS_MUTATIONS)]
    pub num_simultaneous_mutations: usize,

    /// Seed for the scheduler's random selection; random if omitted. Pin
    /// this to reproduce a particular run's selection order.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Increase log verbosity (`-v` for debug, `-vv` for trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress informational progress lines; only warnings and errors are logged.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Cli {
    /// The `tracing-subscriber` `EnvFilter` directive this invocation maps to,
    /// absent an explicit `RUST_LOG` override.
    pub fn default_log_directive(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_positionals_and_defaults() {
        let cli = Cli::parse_from([
            "dredd-kill-driver",
            "info.json",
            "info_cov.json",
            "/bin/mutated-cc",
            "/bin/tracking-cc",
            "/opt/csmith",
        ]);
        assert_eq!(cli.max_consecutive_failed_attempts_per_program, 10);
        assert_eq!(cli.max_attempts_per_program, 100);
        assert_eq!(cli.num_simultaneous_mutations, DEFAULT_NUM_SIMULTANEOUS_MUTATIONS);
        assert_eq!(cli.seed, None);
        assert_eq!(cli.default_log_directive(), "info");
    }

    #[test]
    fn verbosity_and_quiet_map_to_filter_directives() {
        let quiet = Cli::parse_from(["dredd-kill-driver", "a", "b", "c", "d", "e", "-q"]);
        assert_eq!(quiet.default_log_directive(), "warn");

        let verbose = Cli::parse_from(["dredd-kill-driver", "a", "b", "c", "d", "e", "-vv"]);
        assert_eq!(verbose.default_log_directive(), "trace");
    }
}
