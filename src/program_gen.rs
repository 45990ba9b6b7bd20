//! Drives the external generator, the unmutated reference compile+run, and
//! the coverage-tracking compile to produce a fresh [`ProgramStats`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::error::DriverError;
use crate::model::{MutationId, ProgramStats};
use crate::scratch;
use crate::subprocess::{self, Outcome};

const GENERATOR_TIMEOUT: Duration = Duration::from_secs(10);
const REFERENCE_COMPILE_TIMEOUT: Duration = Duration::from_secs(10);
const REFERENCE_RUN_TIMEOUT: Duration = Duration::from_secs(10);

pub const MUTANT_TRACKING_FILE_ENV: &str = "DREDD_MUTANT_TRACKING_FILE";

/// The external source-preparation collaborator: given source-in/source-out
/// paths and the generator root, inlines a fixed set of generator headers.
/// Treated as opaque — the core only needs to invoke it and propagate
/// failure.
pub trait SourcePreparer {
    fn prepare(&self, source_in: &Path, source_out: &Path, csmith_root: &Path) -> std::io::Result<()>;
}

/// Default preparer: a straight copy. Real header inlining lives in the
/// generator-specific collaborator this driver treats as external and does
/// not reimplement.
pub struct PassThroughPreparer;

impl SourcePreparer for PassThroughPreparer {
    fn prepare(&self, source_in: &Path, source_out: &Path, _csmith_root: &Path) -> std::io::Result<()> {
        if source_in != source_out {
            std::fs::copy(source_in, source_out)?;
        }
        Ok(())
    }
}

async fn run_with_timeout(
    command: Command,
    timeout: Duration,
) -> Result<std::process::Output, DriverError> {
    match subprocess::run_with_timeout(command, timeout).await {
        Ok(Outcome::Completed(output)) => Ok(output),
        Ok(Outcome::TimedOut) => Err(reject("subprocess timed out")),
        Err(e) => Err(reject(format!("failed to launch subprocess: {e}"))),
    }
}

fn reject(reason: impl Into<String>) -> DriverError {
    DriverError::ReferenceGenerationFailure(reason.into())
}

async fn run_generator(csmith_root: &Path) -> Result<(), DriverError> {
    let generator = csmith_root.join("build").join("src").join("csmith");
    let target = Path::new(scratch::GENERATED_SOURCE);
    let _ = scratch::remove_if_present(target);

    let mut command = Command::new(generator);
    command.args(["-o", scratch::GENERATED_SOURCE]);
    let output = run_with_timeout(command, GENERATOR_TIMEOUT).await?;
    if !output.status.success() {
        return Err(reject("generator exited non-zero"));
    }
    Ok(())
}

async fn run_reference_compile(
    csmith_root: &Path,
    compiler_executable: &Path,
) -> Result<f64, DriverError> {
    let source = Path::new(scratch::GENERATED_SOURCE);
    let output_path = Path::new(scratch::REFERENCE_EXECUTABLE);
    let _ = scratch::remove_if_present(output_path);

    let mut command = Command::new(compiler_executable);
    command.args([
        "-O3".as_ref(),
        "-I".as_ref(),
        csmith_root.join("runtime").as_os_str(),
        "-I".as_ref(),
        csmith_root.join("build").join("runtime").as_os_str(),
        source.as_os_str(),
        "-o".as_ref(),
        output_path.as_os_str(),
    ]);
    // Reference compile uses an empty enable-set.
    command.env(crate::oracle::ENABLED_MUTATION_ENV, "");

    let start = Instant::now();
    let output = run_with_timeout(command, REFERENCE_COMPILE_TIMEOUT).await?;
    let compile_time = start.elapsed().as_secs_f64();

    if !output.status.success() {
        return Err(reject("reference compile failed"));
    }
    Ok(compile_time)
}

async fn run_reference_execution() -> Result<(f64, Vec<u8>, String), DriverError> {
    let executable = Path::new(".").join(scratch::REFERENCE_EXECUTABLE);
    let command = Command::new(&executable);

    let start = Instant::now();
    let output = run_with_timeout(command, REFERENCE_RUN_TIMEOUT).await?;
    let execution_time = start.elapsed().as_secs_f64();

    if !output.status.success() {
        return Err(reject("reference execution failed"));
    }
    let hash = sha256::try_digest(executable.as_path())
        .map_err(|e| reject(format!("failed to hash reference executable: {e}")))?;
    Ok((execution_time, output.stdout, hash))
}

async fn run_coverage_compile(
    csmith_root: &Path,
    tracking_compiler_executable: &Path,
) -> Result<HashSet<MutationId>, DriverError> {
    let source = Path::new(scratch::GENERATED_SOURCE);
    let output_path = Path::new(scratch::COVERED_MUTANTS_SOURCE_COPY);
    let tracking_file = Path::new(scratch::MUTANT_TRACKING_FILE);
    let _ = scratch::remove_if_present(output_path);
    let _ = scratch::remove_if_present(tracking_file);

    let mut command = Command::new(tracking_compiler_executable);
    command.args([
        "-O3".as_ref(),
        "-I".as_ref(),
        csmith_root.join("runtime").as_os_str(),
        "-I".as_ref(),
        csmith_root.join("build").join("runtime").as_os_str(),
        source.as_os_str(),
        "-o".as_ref(),
        output_path.as_os_str(),
    ]);
    command.env(MUTANT_TRACKING_FILE_ENV, tracking_file);

    let output = run_with_timeout(command, REFERENCE_COMPILE_TIMEOUT).await?;
    if !output.status.success() {
        // The reference compile already succeeded with this exact source,
        // so the coverage-tracking compile failing here is a build
        // inconsistency, not a recoverable generator hiccup.
        panic!("coverage-tracking compile failed after the reference compile succeeded");
    }

    let contents = std::fs::read_to_string(tracking_file).unwrap_or_default();
    let mut covered = HashSet::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(id) = line.parse::<MutationId>() {
            covered.insert(id);
        }
    }
    Ok(covered)
}

/// Produces a fresh `ProgramStats`, retrying discarded attempts until a
/// self-consistent reference is obtained. Every discarded attempt is
/// logged; a consecutive-failure counter drives a periodic `warn!` so a
/// wedged generator is visible.
pub async fn next_program<P: SourcePreparer>(
    csmith_root: &Path,
    compiler_executable: &Path,
    tracking_compiler_executable: &Path,
    preparer: &P,
) -> ProgramStats {
    let mut consecutive_failures: u32 = 0;
    loop {
        match try_generate_one(csmith_root, compiler_executable, tracking_compiler_executable, preparer).await {
            Ok(stats) => return stats,
            Err(e) => {
                tracing::debug!(error = %e, "discarding attempt at generating a reference program");
                consecutive_failures += 1;
                if consecutive_failures % 20 == 0 {
                    tracing::warn!(
                        consecutive_failures,
                        "generator has failed many consecutive attempts in a row"
                    );
                }
            }
        }
    }
}

async fn try_generate_one<P: SourcePreparer>(
    csmith_root: &Path,
    compiler_executable: &Path,
    tracking_compiler_executable: &Path,
    preparer: &P,
) -> Result<ProgramStats, DriverError> {
    run_generator(csmith_root).await?;

    let source = PathBuf::from(scratch::GENERATED_SOURCE);
    preparer
        .prepare(&source, &source, csmith_root)
        .map_err(|e| reject(format!("source preparation failed: {e}")))?;

    let compile_time = run_reference_compile(csmith_root, compiler_executable).await?;
    let (execution_time, expected_output, executable_hash) = run_reference_execution().await?;
    let covered_mutants = run_coverage_compile(csmith_root, tracking_compiler_executable).await?;

    Ok(ProgramStats {
        name: source,
        compile_time,
        execution_time,
        expected_output,
        executable_hash,
        covered_mutants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_preparer_copies_when_paths_differ() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.c");
        let dst = dir.path().join("out.c");
        std::fs::write(&src, "int main() { return 0; }").unwrap();

        PassThroughPreparer.prepare(&src, &dst, Path::new("/unused")).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "int main() { return 0; }");
    }
}
