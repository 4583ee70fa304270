//! Day scaffolding
//!
//! `start_day` turns a puzzle day into a workspace member: a binary crate with
//! a `solve()` stub, the puzzle input and problem text, and a registration in
//! both benchmark harnesses.
//!
//! Only the existence of the day directory guards against re-running. Nothing
//! is rolled back if a later step fails: a failing `cargo new` leaves the
//! manifest already updated, and so on down the list.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::client::PuzzleClient;
use crate::config::{day_name, Workspace};
use crate::manifest::{WorkspaceManifest, START_TIME};
use crate::runner::Task;

/// Generated `src/main.rs`; `{crate}` is replaced by the crate name
const MAIN_TEMPLATE: &str = r#"fn main() {
    let (part1, part2) = {crate}::solve();
    println!("{part1}");
    println!("{part2}");
}
"#;

/// Generated `src/lib.rs`
const LIB_TEMPLATE: &str = r#"use std::fmt::Display;

#[inline]
pub fn solve() -> (impl Display, impl Display) {
    ("TODO", "TODO")
}
"#;

#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Created,
    AlreadyExists,
}

pub fn main_source(crate_name: &str) -> String {
    MAIN_TEMPLATE.replace("{crate}", crate_name)
}

/// Line registering a day with the criterion harness
fn criterion_line(crate_name: &str) -> String {
    format!("    {},", crate_name)
}

/// Line registering a day with the iai harness
fn iai_line(crate_name: &str) -> String {
    format!("    {0}: {0}_solve,", crate_name)
}

/// Scaffolds `dayNN` for the given puzzle and registers it everywhere.
pub async fn start_day(
    workspace: &Workspace,
    client: &PuzzleClient,
    year: i32,
    day: u8,
) -> Result<StartOutcome> {
    let crate_name = day_name(day);
    let crate_path = workspace.day_dir(day);

    if crate_path.exists() {
        println!("{} already exists.", crate_name);
        return Ok(StartOutcome::AlreadyExists);
    }

    // Fetch first: a locked or missing puzzle must not leave anything behind
    let puzzle_input = client
        .fetch_input(year, day)
        .await
        .with_context(|| format!("Failed to fetch input for {} {}", year, crate_name))?;

    let mut manifest = WorkspaceManifest::load(&workspace.manifest_path())?;
    manifest.add_member(&crate_name)?;
    manifest.set_time(&crate_name, START_TIME, Local::now())?;
    manifest.save()?;

    Task::new("cargo")
        .args(["new", "--bin", crate_name.as_str()])
        .current_dir(&workspace.root)
        .run()?;
    Task::new("cargo")
        .args([
            "add",
            "--manifest-path",
            "benchmark/Cargo.toml",
            "--path",
            crate_name.as_str(),
            crate_name.as_str(),
        ])
        .current_dir(&workspace.root)
        .run()?;

    let src = crate_path.join("src");
    write_file(&src.join("main.rs"), &main_source(&crate_name))?;
    write_file(&src.join("lib.rs"), LIB_TEMPLATE)?;
    write_file(&src.join("input.txt"), &normalize_newlines(&puzzle_input))?;

    let benches = workspace.bench_dir().join("benches");
    add_line(&benches.join("criterion.rs"), &criterion_line(&crate_name))?;
    add_line(&benches.join("iai.rs"), &iai_line(&crate_name))?;

    save_problem(workspace, client, year, day).await?;

    Task::new("git")
        .args(["add", crate_name.as_str()])
        .current_dir(&workspace.root)
        .run()?;

    let url = client.day_url(year, day);
    if let Err(e) = open::that(&url) {
        tracing::warn!(%url, error = %e, "could not open browser");
    }

    println!("Scaffolded {}.", crate_name);
    Ok(StartOutcome::Created)
}

/// Fetches the problem statement into `dayNN/problem.md`
pub async fn save_problem(
    workspace: &Workspace,
    client: &PuzzleClient,
    year: i32,
    day: u8,
) -> Result<PathBuf> {
    let dir = workspace.day_dir(day);
    if !dir.is_dir() {
        anyhow::bail!("{} has not been started", day_name(day));
    }

    let problem = client.fetch_problem(year, day).await?;
    let path = dir.join("problem.md");
    write_file(&path, &normalize_newlines(&problem))?;
    Ok(path)
}

/// Inserts `line` just before the last line of the file (the closing
/// delimiter of the list it extends), ending the file with one newline.
pub fn add_line(path: &Path, line: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    write_file(path, &insert_before_last(&content, line))
}

fn insert_before_last(text: &str, line: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last() == Some(&"") {
        lines.pop();
    }
    let at = lines.len().saturating_sub(1);
    lines.insert(at, line);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}
