//! Stable scratch filenames shared by every component that touches the
//! working directory. Each operation deletes its own targets before
//! writing; the working directory is exclusive to one driver run.

pub const GENERATED_SOURCE: &str = "__prog.c";
pub const REFERENCE_EXECUTABLE: &str = "__prog";
pub const MUTATED_EXECUTABLE: &str = "__prog_mutated";
pub const COVERED_MUTANTS_SOURCE_COPY: &str = "__prog_covered_mutants";
pub const MUTANT_TRACKING_FILE: &str = "__dredd_covered_mutants";
pub const INTERESTINGNESS_SCRIPT: &str = "__interesting.py";
pub const PROGRAM_TO_REDUCE: &str = "__prog_to_reduce.c";

/// `__kills_<id1>_<id2>_….c` — archived name for a reduced reproducer,
/// encoding every mutant id it was confirmed to still kill.
pub fn reduced_archive_name(ids: &[crate::model::MutationId]) -> String {
    let joined = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join("_");
    format!("__kills_{joined}.c")
}

/// Removes a scratch file if present; a missing file is not an error.
pub fn remove_if_present(path: &std::path::Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
