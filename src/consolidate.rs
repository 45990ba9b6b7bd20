//! Once a mutant is killed, probes its incompatibility cone for free
//! relatives and drives reduction of every miscompilation found,
//! attributing reduced reproducers jointly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::error::DriverError;
use crate::model::{ExecutionStatus, MutationId, Population, ProgramStats};
use crate::mutation_tree::MutationTree;
use crate::scratch;
use crate::search::{KillConsolidator, Oracle};
use crate::subprocess::{self, Outcome};

/// Generous but bounded: a reducer pass over a large generated program can
/// legitimately run for minutes, but must not be allowed to hang forever
/// and block every later kill from being consolidated.
const REDUCE_TIMEOUT: Duration = Duration::from_secs(300);
const RECHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives the external reducer against a generated interestingness
/// predicate. Abstracted so tests can avoid shelling out to `creduce`.
#[async_trait::async_trait]
pub trait Reducer: Send + Sync {
    async fn reduce(&self, interestingness_script: &Path, program_to_reduce: &Path, csmith_root: &Path) -> bool;
}

pub struct CreduceReducer;

#[async_trait::async_trait]
impl Reducer for CreduceReducer {
    async fn reduce(&self, interestingness_script: &Path, program_to_reduce: &Path, csmith_root: &Path) -> bool {
        let mut command = Command::new("creduce");
        command.args([interestingness_script, program_to_reduce]);
        command.env(
            "CREDUCE_INCLUDE_PATH",
            format!(
                "{}:{}",
                csmith_root.join("runtime").display(),
                csmith_root.join("build").join("runtime").display()
            ),
        );
        match subprocess::run_with_timeout(command, REDUCE_TIMEOUT).await {
            Ok(Outcome::Completed(output)) => output.status.success(),
            Ok(Outcome::TimedOut) => {
                tracing::warn!("creduce timed out and was killed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to launch creduce");
                false
            }
        }
    }
}

/// Renders a self-contained interestingness predicate: a
/// script that recompiles *the current contents of the file `creduce` is
/// reducing* against both the reference compiler and the mutated compiler
/// with exactly `mutant` enabled, and exits 0 iff that reproduces a
/// miscompilation. `creduce` repeatedly overwrites `program_to_reduce` and
/// reruns this script, so the predicate must be self-contained rather than
/// relying on state from the original `ProgramStats`.
fn render_interestingness_script(
    csmith_root: &Path,
    compiler_executable: &Path,
    program_to_reduce_name: &str,
    mutant: MutationId,
) -> String {
    format!(
        r#"#!/bin/bash
set -o pipefail
SRC="{source}"
CSMITH_RUNTIME="{runtime}"
CSMITH_BUILD_RUNTIME="{build_runtime}"
COMPILER="{compiler}"

rm -f __reduce_reference __reduce_mutated

"$COMPILER" -O3 -I "$CSMITH_RUNTIME" -I "$CSMITH_BUILD_RUNTIME" "$SRC" -o __reduce_reference || exit 1
reference_output=$(timeout 10 ./__reduce_reference) || exit 1

DREDD_ENABLED_MUTATION="{mutant}" "$COMPILER" -O3 -I "$CSMITH_RUNTIME" -I "$CSMITH_BUILD_RUNTIME" "$SRC" -o __reduce_mutated || exit 1
mutated_output=$(timeout 10 ./__reduce_mutated) || exit 1

if [ "$reference_output" != "$mutated_output" ]; then
  exit 0
fi
exit 1
"#,
        source = program_to_reduce_name,
        runtime = csmith_root.join("runtime").display(),
        build_runtime = csmith_root.join("build").join("runtime").display(),
        compiler = compiler_executable.display(),
        mutant = mutant,
    )
}

async fn write_interestingness_script(contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = Path::new(scratch::INTERESTINGNESS_SCRIPT);
    let mut file = std::fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;
    let mut perms = file.metadata()?.permissions();
    perms.set_mode(0o755);
    file.set_permissions(perms)?;
    Ok(())
}

/// Re-renders the interestingness predicate for `mutant` against the
/// reduced file at `reduced_path` and runs it directly, to check whether a
/// reduction performed for one mutant also still reproduces another.
async fn reduced_file_still_kills(
    csmith_root: &Path,
    compiler_executable: &Path,
    reduced_path: &Path,
    mutant: MutationId,
) -> bool {
    let script = render_interestingness_script(
        csmith_root,
        compiler_executable,
        &reduced_path.display().to_string(),
        mutant,
    );
    if write_interestingness_script(&script).await.is_err() {
        return false;
    }
    let command = Command::new(Path::new(".").join(scratch::INTERESTINGNESS_SCRIPT));
    matches!(
        subprocess::run_with_timeout(command, RECHECK_TIMEOUT).await,
        Ok(Outcome::Completed(output)) if output.status.success()
    )
}

/// Copies `program_stats.name` aside and drives the reducer on it with an
/// interestingness predicate that enables only `mutant`. On success,
/// checks every other pending miscompilation against the *reduced* file
/// and folds in any that still reproduce, then archives the reduced file
/// under a name encoding every id it kills.
async fn reduce_one(
    reducer: &dyn Reducer,
    csmith_root: &Path,
    compiler_executable: &Path,
    mutant: MutationId,
    to_reduce: &mut Vec<MutationId>,
) {
    let working_file = PathBuf::from(scratch::PROGRAM_TO_REDUCE);
    let _ = scratch::remove_if_present(&working_file);
    if std::fs::copy(Path::new(scratch::GENERATED_SOURCE), &working_file).is_err() {
        return;
    }

    let script = render_interestingness_script(
        csmith_root,
        compiler_executable,
        &working_file.display().to_string(),
        mutant,
    );
    if write_interestingness_script(&script).await.is_err() {
        return;
    }

    let script_path = Path::new(".").join(scratch::INTERESTINGNESS_SCRIPT);
    if !reducer.reduce(&script_path, &working_file, csmith_root).await {
        tracing::warn!(mutant, "creduce failed to minimize a miscompilation reproducer");
        return;
    }

    let mut killed_by_this_file = vec![mutant];
    let mut index = 0;
    while index < to_reduce.len() {
        let follow_on = to_reduce[index];
        if reduced_file_still_kills(csmith_root, compiler_executable, &working_file, follow_on).await {
            killed_by_this_file.push(follow_on);
            to_reduce.remove(index);
        } else {
            index += 1;
        }
    }

    let archive_name = scratch::reduced_archive_name(&killed_by_this_file);
    if let Err(e) = std::fs::rename(&working_file, &archive_name) {
        tracing::warn!(error = %e, archive = %archive_name, "failed to archive reduced reproducer");
    } else {
        tracing::info!(mutants = ?killed_by_this_file, archive = %archive_name, "archived reduced miscompilation reproducer");
    }
}

pub struct LiveConsolidator<'a> {
    pub tree: &'a MutationTree,
    pub csmith_root: PathBuf,
    pub compiler_executable: PathBuf,
    pub reducer: Box<dyn Reducer>,
}

#[async_trait::async_trait]
impl<'a> KillConsolidator for LiveConsolidator<'a> {
    async fn consolidate(
        &self,
        oracle: &dyn Oracle,
        population: &mut Population,
        program_stats: &ProgramStats,
        killed_m: MutationId,
        status: ExecutionStatus,
    ) -> Result<(), DriverError> {
        let mut to_reduce = Vec::new();
        if status.is_miscompilation() {
            to_reduce.push(killed_m);
        }

        let relatives = match self.tree.incompatible(killed_m) {
            Ok(r) => r,
            Err(_) => return Ok(()),
        };

        for relative in relatives {
            if relative == killed_m {
                continue;
            }
            if !population.unkilled.contains_key(&relative) {
                continue;
            }
            if !program_stats.covered_mutants.contains(&relative) {
                continue;
            }

            let relative_status = oracle.attempt(program_stats, &[relative]).await?;
            if !relative_status.is_kill() {
                population.record_non_kill(relative);
                continue;
            }

            population.commit_kill(relative, relative_status);
            if relative_status.is_miscompilation() {
                to_reduce.push(relative);
            }
        }

        tracing::info!(count = to_reduce.len(), "miscompilation-inducing mutant(s) queued for reduction");
        while let Some(mutant) = to_reduce.pop() {
            reduce_one(
                self.reducer.as_ref(),
                &self.csmith_root,
                &self.compiler_executable,
                mutant,
                &mut to_reduce,
            )
            .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interestingness_script_embeds_mutant_and_compiler() {
        let script = render_interestingness_script(
            Path::new("/csmith"),
            Path::new("/bin/mutated-cc"),
            "__prog_to_reduce.c",
            42,
        );
        assert!(script.contains("DREDD_ENABLED_MUTATION=\"42\""));
        assert!(script.contains("/bin/mutated-cc"));
        assert!(script.contains("__prog_to_reduce.c"));
    }
}
