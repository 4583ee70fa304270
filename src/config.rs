use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global task-runner configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub bench: BenchConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Environment variable holding the session cookie
    #[serde(default = "default_session_env")]
    pub env_var: String,
    /// Browser whose cookie store is read when the variable is unset
    #[serde(default)]
    pub browser: Browser,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Firefox,
    Chrome,
    Chromium,
    Edge,
    Brave,
    /// Every browser rookie knows about
    Any,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build release runs with `-C target-cpu=native`
    #[serde(default = "default_true")]
    pub native_cpu: bool,
    /// Export RUST_BACKTRACE=1 to cargo invocations
    #[serde(default)]
    pub backtrace: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Baseline name used when none is given
    #[serde(default = "default_baseline")]
    pub baseline: String,
    /// ssh alias used by `flamegraph`
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_session_env() -> String {
    "SESSION_COOKIE".to_string()
}

fn default_base_url() -> String {
    "https://adventofcode.com".to_string()
}

fn default_user_agent() -> String {
    concat!(
        "aoc-tasks/",
        env!("CARGO_PKG_VERSION"),
        " (personal workspace task runner)"
    )
    .to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_baseline() -> String {
    "previous".to_string()
}

fn default_remote() -> String {
    "linode".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            env_var: default_session_env(),
            browser: Browser::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            native_cpu: true,
            backtrace: false,
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            baseline: default_baseline(),
            remote: default_remote(),
        }
    }
}

impl BuildConfig {
    /// Environment overrides for a cargo invocation. Debug-style runs pass
    /// `native = false` so they never build with CPU-specific codegen.
    pub fn cargo_env(&self, native: bool) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if native && self.native_cpu {
            env.push(("RUSTFLAGS".to_string(), "-C target-cpu=native".to_string()));
        }
        if self.backtrace {
            env.push(("RUST_BACKTRACE".to_string(), "1".to_string()));
        }
        env
    }
}

/// Returns the task-runner config directory (~/.config/aoc-tasks/)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("aoc-tasks");
    Ok(config_dir)
}

/// Returns the config file path (~/.config/aoc-tasks/config.toml)
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config, falling back to defaults if it doesn't exist
pub fn load_config() -> Result<Config> {
    load_config_from(&config_file()?)
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Directory name for a day, e.g. `day07`
pub fn day_name(day: u8) -> String {
    format!("day{:02}", day)
}

/// Parses a `dayNN` directory name back into its day number
pub fn parse_day_name(name: &str) -> Option<u8> {
    let digits = name.strip_prefix("day")?;
    if digits.len() != 2 {
        return None;
    }
    digits.parse().ok().filter(|day| (1..=25).contains(day))
}

/// The cargo workspace holding every day's crate
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walks up from `start` to the first Cargo.toml with a `[workspace]` table
    pub fn discover(start: &Path) -> Result<Self> {
        for dir in start.ancestors() {
            let manifest = dir.join("Cargo.toml");
            if !manifest.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&manifest)
                .with_context(|| format!("Failed to read manifest: {:?}", manifest))?;
            let table: toml::Table = toml::from_str(&content)
                .with_context(|| format!("Failed to parse manifest: {:?}", manifest))?;
            if table.contains_key("workspace") {
                return Ok(Self::new(dir));
            }
        }
        bail!("No cargo workspace found above {:?}", start)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("Cargo.toml")
    }

    pub fn day_dir(&self, day: u8) -> PathBuf {
        self.root.join(day_name(day))
    }

    /// The benchmark crate every day is registered with
    pub fn bench_dir(&self) -> PathBuf {
        self.root.join("benchmark")
    }

    /// Days that already have a directory, ascending
    pub fn existing_days(&self) -> Result<Vec<u8>> {
        let mut days: Vec<u8> = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list workspace: {:?}", self.root))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| parse_day_name(&e.file_name().to_string_lossy()))
            .collect();
        days.sort_unstable();
        Ok(days)
    }

    /// The lowest day in 1..=25 with no directory yet
    pub fn first_missing_day(&self) -> Result<Option<u8>> {
        let existing = self.existing_days()?;
        Ok((1..=25).find(|day| !existing.contains(day)))
    }

    /// The day whose directory contains `cwd`, if any
    pub fn current_day(&self, cwd: &Path) -> Option<u8> {
        let relative = cwd.strip_prefix(&self.root).ok()?;
        let first = relative.components().next()?;
        parse_day_name(&first.as_os_str().to_string_lossy())
    }
}
