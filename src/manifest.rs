//! Workspace manifest editing
//!
//! The root Cargo.toml lists every day's crate under `workspace.members` and
//! keeps per-day timestamps under `[workspace.metadata.dayNN]`. Edits go
//! through `toml_edit` so comments, ordering and layout survive a rewrite.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
use std::path::{Path, PathBuf};
use toml_edit::{Array, Datetime, DocumentMut, Item, Table, Value};

/// Metadata field recorded when a day is scaffolded
pub const START_TIME: &str = "start_time";
/// Metadata field recorded when a day is marked solved
pub const COMPLETION_TIME: &str = "completion_time";

/// Timestamps recorded for one day
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DayTimes {
    pub start_time: Option<DateTime<Local>>,
    pub completion_time: Option<DateTime<Local>>,
}

/// The workspace's root Cargo.toml, loaded for editing
pub struct WorkspaceManifest {
    path: PathBuf,
    doc: DocumentMut,
}

impl WorkspaceManifest {
    /// Parses the manifest; it must exist and contain a `[workspace]` table
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workspace manifest: {:?}", path))?;
        let doc: DocumentMut = content
            .parse()
            .with_context(|| format!("Failed to parse workspace manifest: {:?}", path))?;

        let manifest = Self {
            path: path.to_path_buf(),
            doc,
        };
        manifest.workspace()?;
        Ok(manifest)
    }

    /// Writes the document back over the file it was loaded from
    pub fn save(&self) -> Result<()> {
        std::fs::write(&self.path, self.doc.to_string())
            .with_context(|| format!("Failed to write workspace manifest: {:?}", self.path))
    }

    fn workspace(&self) -> Result<&Table> {
        self.doc
            .get("workspace")
            .and_then(Item::as_table)
            .with_context(|| format!("No [workspace] table in {:?}", self.path))
    }

    fn workspace_mut(&mut self) -> Result<&mut Table> {
        let path = &self.path;
        self.doc
            .get_mut("workspace")
            .and_then(Item::as_table_mut)
            .with_context(|| format!("No [workspace] table in {:?}", path))
    }

    fn metadata(&self) -> Option<&Table> {
        self.workspace().ok()?.get("metadata")?.as_table()
    }

    /// Member crate names in file order
    pub fn members(&self) -> Vec<String> {
        self.workspace()
            .ok()
            .and_then(|w| w.get("members"))
            .and_then(Item::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Appends `name` unless already present. Returns whether it was added.
    pub fn add_member(&mut self, name: &str) -> Result<bool> {
        let members = self
            .workspace_mut()?
            .entry("members")
            .or_insert_with(|| Item::Value(Value::Array(Array::new())))
            .as_array_mut()
            .context("workspace.members is not an array")?;

        if members.iter().any(|m| m.as_str() == Some(name)) {
            return Ok(false);
        }

        // Lay the new entry out like the one before it (one per line, usually)
        let prefix = members
            .iter()
            .last()
            .and_then(|last| last.decor().prefix())
            .and_then(|prefix| prefix.as_str())
            .map(str::to_string);
        match prefix {
            Some(prefix) => members.push_formatted(Value::from(name).decorated(prefix, "")),
            None => members.push(name),
        }
        Ok(true)
    }

    /// Upserts `[workspace.metadata.<name>] <field> = value`
    pub fn set_metadata(&mut self, name: &str, field: &str, value: impl Into<Value>) -> Result<()> {
        let metadata = self
            .workspace_mut()?
            .entry("metadata")
            .or_insert_with(|| {
                let mut table = Table::new();
                table.set_implicit(true);
                Item::Table(table)
            })
            .as_table_mut()
            .context("workspace.metadata is not a table")?;

        let day = metadata
            .entry(name)
            .or_insert_with(|| Item::Table(Table::new()))
            .as_table_mut()
            .with_context(|| format!("workspace.metadata.{} is not a table", name))?;

        day.insert(field, Item::Value(value.into()));
        Ok(())
    }

    /// Records a local timestamp for a day
    pub fn set_time(&mut self, name: &str, field: &str, at: DateTime<Local>) -> Result<()> {
        self.set_metadata(name, field, to_toml_datetime(at)?)
    }

    /// Timestamps recorded for `name`; missing fields are None
    pub fn times(&self, name: &str) -> DayTimes {
        let day = self
            .metadata()
            .and_then(|m| m.get(name))
            .and_then(Item::as_table_like);
        let read = |field: &str| {
            day.and_then(|d| d.get(field))
                .and_then(item_timestamp)
        };
        DayTimes {
            start_time: read(START_TIME),
            completion_time: read(COMPLETION_TIME),
        }
    }

    /// Puzzle year pinned in `[metadata] year`, else `[workspace.metadata] year`
    pub fn year(&self) -> Option<i32> {
        let top_level = self.doc.get("metadata").and_then(Item::as_table_like);
        top_level
            .and_then(|m| m.get("year"))
            .and_then(item_year)
            .or_else(|| self.metadata()?.get("year").and_then(item_year))
    }
}

fn item_year(item: &Item) -> Option<i32> {
    item.as_integer().and_then(|year| i32::try_from(year).ok())
}

fn to_toml_datetime(at: DateTime<Local>) -> Result<Datetime> {
    let stamp = at.to_rfc3339_opts(SecondsFormat::Micros, false);
    stamp
        .parse()
        .with_context(|| format!("Failed to encode timestamp {}", stamp))
}

fn item_timestamp(item: &Item) -> Option<DateTime<Local>> {
    match item.as_value()? {
        Value::Datetime(dt) => parse_timestamp(&dt.value().to_string()),
        Value::String(s) => parse_timestamp(s.value()),
        _ => None,
    }
}

/// Accepts RFC 3339 stamps and offset-less local ones (`2023-12-01T06:00:03.5`)
fn parse_timestamp(stamp: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(stamp) {
        return Some(dt.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const MANIFEST: &str = r#"# Advent of Code workspace
[workspace]
resolver = "2"
members = [
    "benchmark",
    "day01",
    "day02",
]

[workspace.metadata]
year = 2023

[profile.release]
lto = true # keep
"#;

    fn write_manifest(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Cargo.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_add_member_appends_in_order() {
        let (_dir, path) = write_manifest(MANIFEST);
        let mut manifest = WorkspaceManifest::load(&path).unwrap();

        assert!(manifest.add_member("day03").unwrap());
        assert_eq!(manifest.members(), vec!["benchmark", "day01", "day02", "day03"]);
    }

    #[test]
    fn test_add_member_is_idempotent() {
        let (_dir, path) = write_manifest(MANIFEST);
        let mut manifest = WorkspaceManifest::load(&path).unwrap();

        assert!(!manifest.add_member("day02").unwrap());
        assert!(manifest.add_member("day04").unwrap());
        assert!(!manifest.add_member("day04").unwrap());
        let members = manifest.members();
        assert_eq!(members.iter().filter(|m| *m == "day04").count(), 1);
        assert_eq!(members.len(), 4);
    }

    #[test]
    fn test_add_member_keeps_one_per_line() {
        let (_dir, path) = write_manifest(MANIFEST);
        let mut manifest = WorkspaceManifest::load(&path).unwrap();
        manifest.add_member("day03").unwrap();
        manifest.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("    \"day02\",\n    \"day03\","));
    }

    #[test]
    fn test_add_member_creates_members_list() {
        let (_dir, path) = write_manifest("[workspace]\n");
        let mut manifest = WorkspaceManifest::load(&path).unwrap();
        manifest.add_member("day01").unwrap();
        assert_eq!(manifest.members(), vec!["day01"]);
    }

    #[test]
    fn test_untouched_manifest_saves_identically() {
        let (_dir, path) = write_manifest(MANIFEST);
        WorkspaceManifest::load(&path).unwrap().save().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), MANIFEST);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let (_dir, path) = write_manifest(MANIFEST);
        let start = Local::now() - Duration::hours(2);
        let end = Local::now();

        let mut manifest = WorkspaceManifest::load(&path).unwrap();
        manifest.add_member("day03").unwrap();
        manifest.set_time("day03", START_TIME, start).unwrap();
        manifest.save().unwrap();

        let mut reloaded = WorkspaceManifest::load(&path).unwrap();
        assert_eq!(reloaded.members(), manifest.members());
        assert_eq!(reloaded.times("day03"), manifest.times("day03"));
        assert_eq!(
            reloaded.times("day03").start_time.unwrap().timestamp_micros(),
            start.timestamp_micros()
        );

        reloaded.set_time("day03", COMPLETION_TIME, end).unwrap();
        reloaded.save().unwrap();

        let times = WorkspaceManifest::load(&path).unwrap().times("day03");
        assert!(times.start_time.is_some());
        assert_eq!(
            times.completion_time.unwrap().timestamp_micros(),
            end.timestamp_micros()
        );
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[workspace.metadata.day03]"));
        assert!(text.contains("lto = true # keep"));
        assert_eq!(WorkspaceManifest::load(&path).unwrap().year(), Some(2023));
    }

    #[test]
    fn test_metadata_table_created_when_absent() {
        let (_dir, path) = write_manifest("[workspace]\nmembers = []\n");
        let mut manifest = WorkspaceManifest::load(&path).unwrap();
        assert_eq!(manifest.year(), None);
        assert_eq!(manifest.times("day01"), DayTimes::default());

        manifest.set_time("day01", COMPLETION_TIME, Local::now()).unwrap();
        manifest.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[workspace.metadata.day01]"));
        assert!(!text.contains("[workspace.metadata]\n"));
    }

    #[test]
    fn test_year_from_either_metadata_table() {
        let (_dir, path) =
            write_manifest("[workspace]\nmembers = [\"benchmark\"]\n\n[metadata]\nyear = 2022\n");
        assert_eq!(WorkspaceManifest::load(&path).unwrap().year(), Some(2022));

        let (_dir, path) = write_manifest(MANIFEST);
        assert_eq!(WorkspaceManifest::load(&path).unwrap().year(), Some(2023));

        // Top-level wins when both are present
        let (_dir, path) = write_manifest(&format!("{}\n[metadata]\nyear = 2021\n", MANIFEST));
        assert_eq!(WorkspaceManifest::load(&path).unwrap().year(), Some(2021));
    }

    #[test]
    fn test_offsetless_timestamps_are_read_as_local() {
        let (_dir, path) = write_manifest(
            "[workspace]\nmembers = []\n\n[workspace.metadata.day01]\nstart_time = 2023-12-01T06:00:03.123456\n",
        );
        let manifest = WorkspaceManifest::load(&path).unwrap();
        let start = manifest.times("day01").start_time.unwrap();
        assert_eq!(start.naive_local().to_string(), "2023-12-01 06:00:03.123456");
    }

    #[test]
    fn test_missing_or_malformed_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WorkspaceManifest::load(&dir.path().join("Cargo.toml")).is_err());

        let (_dir, path) = write_manifest("[workspace\nmembers = ");
        assert!(WorkspaceManifest::load(&path).is_err());

        let (_dir, path) = write_manifest("[package]\nname = \"day01\"\n");
        assert!(WorkspaceManifest::load(&path).is_err());
    }
}
