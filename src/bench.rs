//! Benchmark commands
//!
//! The `benchmark` crate carries two harnesses: `criterion` (one bench per
//! day, with named baselines for before/after comparisons) and `iai`.

use anyhow::Result;

use crate::config::{BuildConfig, Workspace};
use crate::runner::Task;

fn criterion_task(workspace: &Workspace, build: &BuildConfig, filter: &str) -> Task {
    Task::new("cargo")
        .args(["bench", "--bench", "criterion", "--", filter])
        .envs(build.cargo_env(true))
        .current_dir(&workspace.root)
}

fn set_baseline_task(workspace: &Workspace, build: &BuildConfig, filter: &str, name: &str) -> Task {
    criterion_task(workspace, build, filter).args(["--save-baseline", name, "--verbose"])
}

fn compare_task(workspace: &Workspace, build: &BuildConfig, filter: &str, name: &str) -> Task {
    criterion_task(workspace, build, filter).args(["--baseline", name, "--verbose"])
}

/// Runs criterion for `filter` and saves the results as baseline `name`
pub fn set_baseline(workspace: &Workspace, build: &BuildConfig, filter: &str, name: &str) -> Result<()> {
    set_baseline_task(workspace, build, filter, name).run()?;
    Ok(())
}

/// Runs criterion for `filter` against the saved baseline `name`
pub fn compare(workspace: &Workspace, build: &BuildConfig, filter: &str, name: &str) -> Result<()> {
    compare_task(workspace, build, filter, name).run()?;
    Ok(())
}

/// Benchmarks the committed code as the baseline, then the working changes
/// against it. A failure mid-way leaves the changes stashed.
pub fn compare_by_stashing(
    workspace: &Workspace,
    build: &BuildConfig,
    filter: &str,
    name: &str,
) -> Result<()> {
    Task::new("git")
        .args(["stash", "push", "-m", "Stashing for benchmarking"])
        .current_dir(&workspace.root)
        .run()?;
    set_baseline(workspace, build, filter, name)?;
    Task::new("git")
        .args(["stash", "pop"])
        .current_dir(&workspace.root)
        .run()?;
    compare(workspace, build, filter, name)
}

/// Plain criterion run, no baselines involved
pub fn criterion(workspace: &Workspace, build: &BuildConfig, filter: &str) -> Result<()> {
    criterion_task(workspace, build, filter).arg("--verbose").run()?;
    Ok(())
}

pub fn iai(workspace: &Workspace, build: &BuildConfig) -> Result<()> {
    Task::new("cargo")
        .args(["bench", "--bench", "iai"])
        .envs(build.cargo_env(true))
        .current_dir(&workspace.root)
        .run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> BuildConfig {
        BuildConfig {
            native_cpu: true,
            backtrace: false,
        }
    }

    #[test]
    fn test_set_baseline_command() {
        let workspace = Workspace::new("/aoc");
        let task = set_baseline_task(&workspace, &build(), "day05", "previous");
        assert_eq!(
            task.command_line(),
            "cargo bench --bench criterion -- day05 --save-baseline previous --verbose"
        );
        let options = task.options().unwrap();
        assert!(options.contains("RUSTFLAGS=\"-C target-cpu=native\""));
        assert!(options.contains("cwd=/aoc"));
    }

    #[test]
    fn test_compare_command() {
        let workspace = Workspace::new("/aoc");
        let task = compare_task(&workspace, &build(), "all", "before-simd");
        assert_eq!(
            task.command_line(),
            "cargo bench --bench criterion -- all --baseline before-simd --verbose"
        );
    }
}
