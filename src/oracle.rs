//! Invokes the mutated compiler with a chosen enable-set and classifies
//! the result against a reference [`ProgramStats`].

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use crate::error::DriverError;
use crate::model::{ExecutionStatus, MutationId, ProgramStats};
use crate::scratch;
use crate::subprocess::{self, Outcome};

pub const ENABLED_MUTATION_ENV: &str = "DREDD_ENABLED_MUTATION";

/// Fixed compiler flags shared by every invocation of the mutated
/// compiler: `-O3 -I <csmith_root>/runtime -I <csmith_root>/build/runtime`.
fn compiler_args(csmith_root: &Path, source: &Path, output: &Path) -> Vec<std::ffi::OsString> {
    vec![
        "-O3".into(),
        "-I".into(),
        csmith_root.join("runtime").into_os_string(),
        "-I".into(),
        csmith_root.join("build").join("runtime").into_os_string(),
        source.as_os_str().to_os_string(),
        "-o".into(),
        output.as_os_str().to_os_string(),
    ]
}

fn enabled_mutation_value(selected: &[MutationId]) -> String {
    selected
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn spawn_failure(executable: &Path, reason: std::io::Error) -> DriverError {
    DriverError::SubprocessSpawnFailure {
        executable: executable.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Invokes the mutated compiler with `selected_mutants` enabled and
/// classifies the observable result against `program_stats`:
///
/// 1. Deletes any previous mutated artifact.
/// 2. Compiles with `selected_mutants` passed through
///    `DREDD_ENABLED_MUTATION`, timeout `max(5.0, 5 * compile_time)`.
/// 3. Hashes the artifact; equal to the reference hash is `NoEffect`.
/// 4. Otherwise executes it, timeout `max(5.0, 10 * execution_time)`, and
///    classifies by exit code and output against `expected_output`.
///
/// A failure to even launch the compiler or the compiled artifact (bad
/// executable path, missing exec bit, ...) is a configuration error, not a
/// kill: it is surfaced as a fatal [`DriverError`] rather than folded into
/// a timeout or fail classification, so a broken `--mutated-compiler`
/// argument can never masquerade as a real kill in `KilledMap`.
pub async fn attempt_kill(
    compiler_executable: &Path,
    csmith_root: &Path,
    program_stats: &ProgramStats,
    selected_mutants: &[MutationId],
) -> Result<ExecutionStatus, DriverError> {
    let mutated_executable = Path::new(scratch::MUTATED_EXECUTABLE);
    let _ = scratch::remove_if_present(mutated_executable);

    let mut command = Command::new(compiler_executable);
    command.args(compiler_args(csmith_root, &program_stats.name, mutated_executable));
    command.env(ENABLED_MUTATION_ENV, enabled_mutation_value(selected_mutants));

    let compile_timeout = Duration::from_secs_f64((5.0_f64).max(5.0 * program_stats.compile_time));
    let compile_outcome = subprocess::run_with_timeout(command, compile_timeout)
        .await
        .map_err(|e| spawn_failure(compiler_executable, e))?;

    let compile_output = match compile_outcome {
        Outcome::TimedOut => {
            tracing::info!(mutants = ?selected_mutants, "compile timeout kill");
            return Ok(ExecutionStatus::CompileTimeoutKill);
        }
        Outcome::Completed(output) => output,
    };
    if !compile_output.status.success() {
        tracing::info!(mutants = ?selected_mutants, "compile fail kill");
        return Ok(ExecutionStatus::CompileFailKill);
    }

    tracing::debug!(mutants = ?selected_mutants, "mutated compile succeeded");
    let artifact_hash = sha256::try_digest(mutated_executable).unwrap_or_default();
    if artifact_hash == program_stats.executable_hash {
        tracing::debug!(mutants = ?selected_mutants, "identical binary, no effect");
        return Ok(ExecutionStatus::NoEffect);
    }

    let mutated_executable_path = Path::new(".").join(mutated_executable);
    let run_command = Command::new(&mutated_executable_path);
    let run_timeout = Duration::from_secs_f64((5.0_f64).max(10.0 * program_stats.execution_time));
    let run_outcome = subprocess::run_with_timeout(run_command, run_timeout)
        .await
        .map_err(|e| spawn_failure(&mutated_executable_path, e))?;

    Ok(match run_outcome {
        Outcome::TimedOut => {
            tracing::info!(mutants = ?selected_mutants, "run timeout kill");
            ExecutionStatus::RunTimeoutKill
        }
        Outcome::Completed(output) if !output.status.success() => {
            tracing::info!(mutants = ?selected_mutants, "run fail kill");
            ExecutionStatus::RunFailKill
        }
        Outcome::Completed(output) if output.stdout != program_stats.expected_output => {
            tracing::info!(mutants = ?selected_mutants, "miscompilation kill");
            ExecutionStatus::MiscompilationKill
        }
        Outcome::Completed(_) => {
            tracing::debug!(mutants = ?selected_mutants, "different binary, same result");
            ExecutionStatus::DifferentBinariesSameResult
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn make_executable_script(path: &Path, body: &str) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "#!/bin/bash\n{body}").unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        file.set_permissions(perms).unwrap();
    }

    /// A fake "compiler" invoked as `compiler -O3 -I a -I b <src> -o <out>`
    /// that just copies the last two arguments: the second-to-last is the
    /// source, the last is the output path.
    fn fake_compiler(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("fake-compiler");
        make_executable_script(
            &path,
            r#"args=("$@"); n=${#args[@]}; src="${args[$((n-2))]}"; out="${args[$((n-1))]}"; cp "$src" "$out"; chmod +x "$out""#,
        );
        path
    }

    /// An empty enable-set against a genuinely reference-identical compile
    /// yields `NoEffect` — the mutated compiler with nothing enabled must
    /// behave exactly like the reference compiler.
    #[tokio::test]
    async fn empty_enable_set_against_reference_is_no_effect() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(dir.path());

        let source = dir.path().join("prog.c");
        make_executable_script(&source, "echo -n hello");

        let reference_hash = sha256::try_digest(source.as_path()).unwrap();
        let stats = ProgramStats {
            name: source.clone(),
            compile_time: 0.01,
            execution_time: 0.01,
            expected_output: b"hello".to_vec(),
            executable_hash: reference_hash,
            covered_mutants: Default::default(),
        };

        let prev_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let status = attempt_kill(&compiler, Path::new("/unused"), &stats, &[]).await;
        std::env::set_current_dir(&prev_dir).unwrap();

        assert_eq!(status.unwrap(), ExecutionStatus::NoEffect);
    }

    /// A mutated compile that changes the binary but not observable behavior
    /// classifies as `DifferentBinariesSameResult`.
    #[tokio::test]
    async fn different_binary_same_output_survives() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(dir.path());

        let source = dir.path().join("prog.c");
        make_executable_script(&source, "echo -n hello");

        let reference_hash = "0".repeat(64); // guaranteed mismatch
        let stats = ProgramStats {
            name: source.clone(),
            compile_time: 0.01,
            execution_time: 0.01,
            expected_output: b"hello".to_vec(),
            executable_hash: reference_hash,
            covered_mutants: Default::default(),
        };

        let prev_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let status = attempt_kill(&compiler, Path::new("/unused"), &stats, &[]).await;
        std::env::set_current_dir(&prev_dir).unwrap();

        assert_eq!(status.unwrap(), ExecutionStatus::DifferentBinariesSameResult);
    }

    /// A mutated compile that produces a binary with different output is a
    /// miscompilation kill, the strongest classification.
    #[tokio::test]
    async fn miscompilation_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = fake_compiler(dir.path());

        let source = dir.path().join("prog.c");
        make_executable_script(&source, "echo -n wrong-output");

        let stats = ProgramStats {
            name: source.clone(),
            compile_time: 0.01,
            execution_time: 0.01,
            expected_output: b"hello".to_vec(),
            executable_hash: "0".repeat(64),
            covered_mutants: Default::default(),
        };

        let prev_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let status = attempt_kill(&compiler, Path::new("/unused"), &stats, &[]).await;
        std::env::set_current_dir(&prev_dir).unwrap();

        assert_eq!(status.unwrap(), ExecutionStatus::MiscompilationKill);
    }

    /// A compiler executable that can't even be launched (missing, not
    /// executable, ...) must surface as a fatal error, never as a kill
    /// classification — otherwise a broken `--mutated-compiler-executable`
    /// argument would quietly poison `KilledMap` with fake kills.
    #[tokio::test]
    async fn unlaunchable_compiler_is_a_fatal_error_not_a_kill() {
        let dir = tempfile::tempdir().unwrap();
        let missing_compiler = dir.path().join("does-not-exist");

        let source = dir.path().join("prog.c");
        make_executable_script(&source, "echo -n hello");

        let stats = ProgramStats {
            name: source,
            compile_time: 0.01,
            execution_time: 0.01,
            expected_output: b"hello".to_vec(),
            executable_hash: "0".repeat(64),
            covered_mutants: Default::default(),
        };

        let prev_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let status = attempt_kill(&missing_compiler, Path::new("/unused"), &stats, &[]).await;
        std::env::set_current_dir(&prev_dir).unwrap();

        assert!(matches!(status, Err(DriverError::SubprocessSpawnFailure { .. })));
    }
}
