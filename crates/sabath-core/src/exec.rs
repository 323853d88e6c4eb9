//! Shell command execution.
//!
//! Commands run as `sh -c <command>` in an explicit working directory. The
//! process-wide working directory and environment are never modified; all
//! variables a child needs travel in an [`ExecContext`].

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::descriptor::Commands;
use crate::error::{Result, SabathError};
use crate::vars::Vars;

/// Files receiving child stdout/stderr, appended to on every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCapture {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

impl OutputCapture {
    pub fn new(stdout: impl Into<PathBuf>, stderr: impl Into<PathBuf>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Create both files if missing, without truncating.
    pub fn touch(&self) -> Result<()> {
        append(&self.stdout)?;
        append(&self.stderr)?;
        Ok(())
    }

    fn stdio(&self) -> Result<(Stdio, Stdio)> {
        Ok((
            Stdio::from(append(&self.stdout)?),
            Stdio::from(append(&self.stderr)?),
        ))
    }
}

fn append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Everything a spawned command needs besides its text and working directory.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    /// Base substitution table; per-call overlays are merged over it.
    pub vars: Vars,
    /// Extra environment variables exported to every child.
    pub env: BTreeMap<String, String>,
    /// Where child output goes; `None` inherits the parent's stdio.
    pub capture: Option<OutputCapture>,
}

impl ExecContext {
    pub fn new(vars: Vars) -> Self {
        Self {
            vars,
            ..Self::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name, value);
        self
    }

    pub fn with_capture(mut self, capture: OutputCapture) -> Self {
        self.capture = Some(capture);
        self
    }
}

/// Runs shell commands, turning a non-zero exit into [`SabathError::CommandFailed`].
///
/// No retries: the first failing command aborts the sequence.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    ctx: ExecContext,
}

impl Executor {
    pub fn new(ctx: ExecContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    /// Run `commands` in order inside `cwd`, stopping at the first failure.
    pub fn execute(&self, commands: &Commands, cwd: &Path, overlay: &Vars) -> Result<()> {
        let vars = self.ctx.vars.merged(overlay);
        for command in commands.iter() {
            self.run_shell(&vars.substitute(command), cwd)?;
        }
        Ok(())
    }

    /// Run a single command string inside `cwd`.
    pub fn execute_one(&self, command: &str, cwd: &Path, overlay: &Vars) -> Result<()> {
        let vars = self.ctx.vars.merged(overlay);
        self.run_shell(&vars.substitute(command), cwd)
    }

    /// Run a program with explicit arguments (no shell, no substitution).
    pub fn run_program(&self, program: &str, args: &[&str], cwd: &Path) -> Result<()> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let mut cmd = Command::new(program);
        cmd.args(args);
        self.spawn(cmd, command_line, cwd)
    }

    fn run_shell(&self, command: &str, cwd: &Path) -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        self.spawn(cmd, command.to_string(), cwd)
    }

    /// Logged and reported text is the command as executed, after substitution.
    fn spawn(&self, mut cmd: Command, command_line: String, cwd: &Path) -> Result<()> {
        info!("SHELL> {}", command_line);
        let start = Instant::now();

        cmd.current_dir(cwd).envs(&self.ctx.env);
        if let Some(capture) = &self.ctx.capture {
            let (stdout, stderr) = capture.stdio()?;
            cmd.stdout(stdout).stderr(stderr);
        }

        let status = cmd.status().map_err(|source| SabathError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        debug!(
            command = %command_line,
            exit_code = ?status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "command finished"
        );

        if !status.success() {
            error!("command failed: {} (in {})", command_line, cwd.display());
            return Err(SabathError::CommandFailed {
                command: command_line,
                cwd: cwd.to_path_buf(),
                exit_code: status.code(),
            });
        }
        Ok(())
    }
}
