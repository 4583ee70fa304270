//! Running the current day's solution
//!
//! These run from the current directory, so cargo picks the day crate the
//! user is standing in. Debug-style runs drop `RUSTFLAGS` entirely.

use anyhow::Result;

use crate::config::BuildConfig;
use crate::runner::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// `cargo run`
    Debug,
    /// `cargo run --release`
    Release,
    /// Re-run on every change
    Watch,
    /// Re-run `prototype.py` on every change
    Prototype,
}

fn run_task(mode: RunMode, build: &BuildConfig) -> Task {
    match mode {
        RunMode::Debug => Task::new("cargo")
            .arg("run")
            .env_remove("RUSTFLAGS")
            .envs(build.cargo_env(false)),
        RunMode::Release => Task::new("cargo")
            .args(["run", "--release"])
            .envs(build.cargo_env(true)),
        RunMode::Watch => Task::new("cargo")
            .args(["watch", "--clear", "--exec", "run"])
            .env_remove("RUSTFLAGS")
            .envs(build.cargo_env(false)),
        RunMode::Prototype => {
            Task::new("cargo").args(["watch", "--clear", "--shell", "python3 prototype.py"])
        }
    }
}

pub fn run(mode: RunMode, build: &BuildConfig) -> Result<()> {
    run_task(mode, build).run()?;
    Ok(())
}
