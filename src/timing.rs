//! Completion-time tracking
//!
//! `start_time` is written when a day is scaffolded and `completion_time` when
//! the user marks it solved. Days from before that bookkeeping existed fall
//! back to file timestamps.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::{day_name, Workspace};
use crate::manifest::{DayTimes, WorkspaceManifest, COMPLETION_TIME};

/// Records `completion_time = now` for a day
pub fn set_completion_time(workspace: &Workspace, day: u8) -> Result<()> {
    let name = day_name(day);
    let mut manifest = WorkspaceManifest::load(&workspace.manifest_path())?;
    manifest.set_time(&name, COMPLETION_TIME, Local::now())?;
    manifest.save()?;
    println!("Recorded completion time for {}.", name);
    Ok(())
}

/// Prints how long each day took, from start to completion
pub fn measure_completion_time(workspace: &Workspace) -> Result<()> {
    let rows = completion_times(workspace)?;
    if rows.is_empty() {
        println!("No days found.");
        return Ok(());
    }

    let rows: Vec<(String, String)> = rows
        .into_iter()
        .map(|(name, took)| (name, format_duration(took)))
        .collect();
    print!("{}", render_table(&rows));
    Ok(())
}

/// (day name, start to completion) for every day directory, in day order
pub fn completion_times(workspace: &Workspace) -> Result<Vec<(String, Duration)>> {
    let manifest = WorkspaceManifest::load(&workspace.manifest_path())?;

    workspace
        .existing_days()?
        .into_iter()
        .map(|day| {
            let name = day_name(day);
            let src = workspace.day_dir(day).join("src");
            let took = elapsed(&manifest.times(&name), &src)
                .with_context(|| format!("Failed to measure {}", name))?;
            Ok((name, took))
        })
        .collect()
}

fn elapsed(times: &DayTimes, src: &Path) -> Result<Duration> {
    let start = match times.start_time {
        Some(start) => start,
        None => input_created(&src.join("input.txt"))?,
    };
    let end = match times.completion_time {
        Some(end) => end,
        None => newest_source(src)?,
    };
    Ok(end - start)
}

fn input_created(path: &Path) -> Result<DateTime<Local>> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("Failed to stat {:?}", path))?;
    // Creation time is not available on every filesystem
    let created = metadata
        .created()
        .or_else(|_| metadata.modified())
        .with_context(|| format!("No timestamps for {:?}", path))?;
    Ok(created.into())
}

fn newest_source(src: &Path) -> Result<DateTime<Local>> {
    let mut newest = None;
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", src))?;
        if entry.path().extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }
        let modified = entry
            .metadata()
            .with_context(|| format!("Failed to stat {:?}", entry.path()))?
            .modified()?;
        newest = newest.max(Some(modified));
    }
    newest
        .map(DateTime::<Local>::from)
        .with_context(|| format!("No .rs files under {:?}", src))
}

/// `H:MM:SS`, prefixed with `N day(s), ` past a day
pub fn format_duration(duration: Duration) -> String {
    let sign = if duration < Duration::zero() { "-" } else { "" };
    let total = duration.num_seconds().abs();
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, minutes, seconds) = (rest / 3600, rest % 3600 / 60, rest % 60);

    let clock = format!("{}:{:02}:{:02}", hours, minutes, seconds);
    match days {
        0 => format!("{}{}", sign, clock),
        1 => format!("{}1 day, {}", sign, clock),
        n => format!("{}{} days, {}", sign, n, clock),
    }
}

fn render_table(rows: &[(String, String)]) -> String {
    const HEADERS: (&str, &str) = ("Day", "Completion Time");
    let left = rows.iter().map(|r| r.0.len()).chain([HEADERS.0.len()]).max().unwrap_or(0);
    let right = rows.iter().map(|r| r.1.len()).chain([HEADERS.1.len()]).max().unwrap_or(0);

    let mut out = String::new();
    out.push_str(&format!("{:<left$}  {:<right$}\n", HEADERS.0, HEADERS.1));
    out.push_str(&format!("{}  {}\n", "-".repeat(left), "-".repeat(right)));
    for (day, took) in rows {
        out.push_str(&format!("{:<left$}  {:<right$}\n", day, took));
    }
    out
}
