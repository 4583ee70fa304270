//! External command execution
//!
//! Every tool the task runner drives (cargo, git, ssh, scp) goes through
//! [`Task::run`], which echoes the command line before running it and turns a
//! non-zero exit into [`CommandFailed`]. `main` maps that error to the child's
//! exit code.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

/// A checked command exited unsuccessfully
#[derive(Debug, thiserror::Error)]
#[error("`{program}` exited with status {code}")]
pub struct CommandFailed {
    pub program: String,
    pub code: i32,
}

/// An external command and the options it runs under
#[derive(Debug, Clone)]
pub struct Task {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    env_remove: Vec<String>,
    current_dir: Option<PathBuf>,
    check: bool,
}

impl Task {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            env_remove: Vec::new(),
            current_dir: None,
            check: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Whether a non-zero exit is an error (the default)
    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Shell-quoted command line, as echoed before running
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|word| quote_word(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Describes env and cwd overrides, or None when there are none
    pub fn options(&self) -> Option<String> {
        let mut parts = Vec::new();
        for (key, value) in &self.env {
            parts.push(format!("{}={:?}", key, value));
        }
        for key in &self.env_remove {
            parts.push(format!("unset {}", key));
        }
        if let Some(dir) = &self.current_dir {
            parts.push(format!("cwd={}", dir.display()));
        }
        if parts.is_empty() {
            None
        } else {
            Some(format!("{{{}}}", parts.join(", ")))
        }
    }

    /// Runs the command with inherited stdio, waiting for it to finish
    pub fn run(&self) -> Result<ExitStatus> {
        let options = self
            .options()
            .map(|o| format!("(w/ options {})", o).green().to_string())
            .unwrap_or_default();
        println!("{} {} {}", "$".green().bold(), self.command_line(), options);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for key in &self.env_remove {
            cmd.env_remove(key);
        }
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let status = cmd
            .status()
            .with_context(|| format!("Failed to start {}. Is it installed and in PATH?", self.program))?;

        if self.check && !status.success() {
            println!("{}", "Failed.".red().bold());
            // Killed by a signal: no code to forward
            let code = status.code().unwrap_or(1);
            return Err(CommandFailed {
                program: self.program.clone(),
                code,
            }
            .into());
        }

        Ok(status)
    }
}

/// Leaves words made only of shell-safe characters bare, `KEY=value` included
fn quote_word(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        return word.to_string();
    }
    match shlex::try_quote(word) {
        Ok(quoted) => quoted.into_owned(),
        // Only NUL bytes are unquotable; echo them as-is
        Err(_) => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_arguments() {
        let task = Task::new("cargo").args(["watch", "--shell", "python3 prototype.py"]);
        assert_eq!(
            task.command_line(),
            "cargo watch --shell 'python3 prototype.py'"
        );
    }

    #[test]
    fn test_command_line_leaves_assignments_bare() {
        let task = Task::new("ssh").args(["box", "cd", "/tmp/x", "&&", "A=b", "", "a:b@c,d%e+f"]);
        assert_eq!(
            task.command_line(),
            "ssh box cd /tmp/x '&&' A=b '' a:b@c,d%e+f"
        );
    }

    #[test]
    fn test_options_only_when_overridden() {
        assert!(Task::new("git").arg("status").options().is_none());

        let task = Task::new("cargo")
            .arg("run")
            .env_remove("RUSTFLAGS")
            .envs([("RUST_BACKTRACE".to_string(), "1".to_string())]);
        assert_eq!(
            task.options().unwrap(),
            "{RUST_BACKTRACE=\"1\", unset RUSTFLAGS}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_run() {
        let status = Task::new("true").run().unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_carries_exit_code() {
        let err = Task::new("sh").args(["-c", "exit 3"]).run().unwrap_err();
        let failed = err.downcast_ref::<CommandFailed>().unwrap();
        assert_eq!(failed.code, 3);
        assert_eq!(failed.program, "sh");
    }

    #[cfg(unix)]
    #[test]
    fn test_unchecked_failure_is_returned() {
        let status = Task::new("false").check(false).run().unwrap();
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        Task::new("sh")
            .args(["-c", "test \"$MARKER\" = yes && touch seen"])
            .envs([("MARKER".to_string(), "yes".to_string())])
            .current_dir(dir.path())
            .run()
            .unwrap();
        assert!(dir.path().join("seen").exists());
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let err = Task::new("definitely-not-a-real-program-xyz").run().unwrap_err();
        assert!(err.downcast_ref::<CommandFailed>().is_none());
    }
}
