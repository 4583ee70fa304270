//! Remote flamegraph profiling
//!
//! Ships the workspace to a remote box over ssh, runs `cargo flamegraph` on
//! the criterion harness there and brings `flamegraph.svg` back.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Component, Path};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Workspace;
use crate::runner::Task;

/// Path components never shipped to the remote
const EXCLUDED: &[&str] = &[".git", "target"];

pub fn flamegraph(workspace: &Workspace, filter: &str, remote: &str) -> Result<()> {
    let stem = Uuid::new_v4().to_string();
    let archive_name = format!("{}.tar.gz", stem);

    {
        let tmpdir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let archive_path = tmpdir.path().join(&archive_name);

        println!("Compressing...");
        let files = archive_workspace(&workspace.root, &archive_path)?;
        println!("Archived {} files.", files);

        Task::new("scp")
            .args([
                "-C".to_string(),
                archive_path.display().to_string(),
                format!("{}:/tmp/{}", remote, archive_name),
            ])
            .run()?;
        ssh(remote)
            .args(["tar", "-xzf"])
            .arg(format!("/tmp/{}", archive_name))
            .args(["--one-top-level", "-C", "/tmp"])
            .run()?;
    }

    bench_task(remote, &stem, filter).run()?;

    Task::new("scp")
        .arg(format!("{}:/tmp/{}/flamegraph.svg", remote, stem))
        .arg(".")
        .current_dir(&workspace.root)
        .run()?;
    ssh(remote)
        .args(["rm", "-rf"])
        .arg(format!("/tmp/{}", stem))
        .arg(format!("/tmp/{}", archive_name))
        .run()?;

    let svg = workspace.root.join("flamegraph.svg");
    if let Err(e) = open::that(&svg) {
        tracing::warn!(path = %svg.display(), error = %e, "could not open flamegraph");
    }
    Ok(())
}

fn ssh(remote: &str) -> Task {
    Task::new("ssh").arg(remote)
}

fn bench_task(remote: &str, stem: &str, filter: &str) -> Task {
    ssh(remote)
        .arg("cd")
        .arg(format!("/tmp/{}", stem))
        .args([
            "&&",
            "CARGO_PROFILE_BENCH_DEBUG=true",
            "cargo",
            "flamegraph",
            "--bench",
            "criterion",
            "--",
            "--bench",
            filter,
        ])
}

fn is_excluded(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => EXCLUDED.iter().any(|x| name == *x),
        _ => false,
    })
}

/// Writes a gzipped tarball of `root` to `dest`, paths relative to `root`.
/// Returns the number of files archived.
pub fn archive_workspace(root: &Path, dest: &Path) -> Result<usize> {
    let file = File::create(dest).with_context(|| format!("Failed to create {:?}", dest))?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut files = 0;
    let walker = WalkDir::new(root).min_depth(1).into_iter().filter_entry(|entry| {
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let keep = !is_excluded(relative);
        if !keep {
            tracing::debug!(path = %relative.display(), "skipped");
        }
        keep
    });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;
        let relative = entry.path().strip_prefix(root)?;
        let appended = if entry.file_type().is_dir() {
            tar.append_dir(relative, entry.path())
        } else {
            files += 1;
            tar.append_path_with_name(entry.path(), relative)
        };
        appended.with_context(|| format!("Failed to archive {:?}", entry.path()))?;
        tracing::debug!(path = %relative.display(), "added to tarball");
    }

    tar.into_inner()
        .context("Failed to finish archive")?
        .finish()
        .context("Failed to finish compression")?;
    Ok(files)
}
