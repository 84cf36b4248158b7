//! External command execution
//!
//! Every external program the installer touches goes through the
//! [`CommandRunner`] trait. The production [`SystemRunner`] pins the search
//! path, ties children to the installer's lifetime and registers them for
//! signal cleanup. [`RecordingRunner`] replays scripted results so the
//! dispatch logic can be tested without touching the host.

use crate::error::{Result, SetupError};
use crate::process_guard::{ChildRegistry, CommandLifecycle};
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Search path used for every child process and executable lookup
pub const SAFE_PATH: &str = "/bin:/sbin:/usr/bin:/usr/sbin:/usr/local/bin:/usr/local/sbin";

/// Where a child's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Share the installer's terminal (package managers, sudo prompts)
    #[default]
    Inherit,
    /// Capture stdout and stderr for inspection
    Capture,
    /// Discard stdout, keep stderr for error reporting
    Silent,
}

/// A single external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin_data: Option<String>,
    pub cwd: Option<PathBuf>,
    pub output: OutputMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin_data: None,
            cwd: None,
            output: OutputMode::Inherit,
        }
    }

    /// `sudo <program> ...`
    pub fn sudo(program: impl Into<String>) -> Self {
        Self::new("sudo").arg(program)
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

    /// Feed `data` to the child's stdin
    pub fn stdin_data(mut self, data: impl Into<String>) -> Self {
        self.stdin_data = Some(data.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn capture(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }

    pub fn silent(mut self) -> Self {
        self.output = OutputMode::Silent;
        self
    }

    /// Full command line as a single string, used for matching and display
    pub fn command_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output (empty unless captured)
    pub stdout: String,
    /// Standard error (empty when inherited)
    pub stderr: String,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
    /// Whether the command exited with status 0
    pub success: bool,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self::with_code(0, "")
    }

    pub fn with_code(code: i32, stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(code),
            success: code == 0,
        }
    }

    /// Turn a non-zero exit into `SetupError::CommandFailed`
    pub fn ensure_success(self, spec: &CommandSpec) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(SetupError::CommandFailed {
                command: spec.to_string(),
                code: self.exit_code.unwrap_or(-1),
                stderr: self.stderr,
            })
        }
    }
}

/// Seam between the installer logic and the host system
pub trait CommandRunner {
    /// Run a command to completion. A non-zero exit is not an error here.
    fn run(&mut self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Start a command that outlives the installer
    fn spawn_detached(&mut self, spec: &CommandSpec) -> Result<()>;

    /// Resolve an executable on the pinned search path
    fn which(&self, program: &str) -> Option<PathBuf>;

    /// Run a command and fail on non-zero exit
    fn run_checked(&mut self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec)?;
        output.ensure_success(spec)
    }

    /// Run a command whose failure is logged and otherwise ignored
    fn run_logged(&mut self, spec: &CommandSpec) -> bool {
        match self.run(spec) {
            Ok(output) if output.success => true,
            Ok(output) => {
                tracing::warn!(
                    "`{}` exited with {:?}: {}",
                    spec,
                    output.exit_code,
                    output.stderr.trim()
                );
                false
            }
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    fn exists(&self, program: &str) -> bool {
        self.which(program).is_some()
    }
}

// ============================================================================
// Production runner
// ============================================================================

/// Runs commands on the host
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn build(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).env("PATH", SAFE_PATH);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!("Running: {}", spec);

        let mut cmd = Self::build(spec);
        match spec.output {
            OutputMode::Inherit => {}
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Silent => {
                cmd.stdout(Stdio::null()).stderr(Stdio::piped());
            }
        }
        if spec.stdin_data.is_some() {
            cmd.stdin(Stdio::piped());
        }
        // Same process group as the installer: sudo must be able to read the
        // password from the controlling terminal.
        cmd.die_with_parent();

        let mut child = cmd.spawn().map_err(|source| SetupError::Spawn {
            command: spec.to_string(),
            source,
        })?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        if let (Some(data), Some(mut stdin)) = (&spec.stdin_data, child.stdin.take()) {
            if let Err(e) = stdin.write_all(data.as_bytes()) {
                tracing::warn!("Failed writing stdin of `{}`: {}", spec, e);
            }
        }

        let waited = child.wait_with_output();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let output = waited?;
        let exit_code = output.status.code();
        tracing::debug!("`{}` finished with {:?}", spec.program, exit_code);

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
            success: output.status.success(),
        })
    }

    fn spawn_detached(&mut self, spec: &CommandSpec) -> Result<()> {
        tracing::info!("Launching detached: {}", spec);
        Self::build(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .detach()
            .spawn()
            .map(|_| ())
            .map_err(|source| SetupError::Spawn {
                command: spec.to_string(),
                source,
            })
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        which::which_in(program, Some(SAFE_PATH), cwd).ok()
    }
}

// ============================================================================
// Test double
// ============================================================================

/// Records every invocation and answers from a script of responses
///
/// Commands not matched by any response succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    programs: HashSet<String>,
    responses: Vec<(String, CommandOutput)>,
    calls: Vec<CommandSpec>,
    detached: Vec<CommandSpec>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs that `which` will report as present
    pub fn with_programs(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn add_program(&mut self, program: &str) {
        self.programs.insert(program.to_string());
    }

    /// Answer commands whose command line starts with `prefix`.
    /// The longest matching prefix wins.
    pub fn respond(&mut self, prefix: &str, code: i32, stdout: &str) -> &mut Self {
        self.responses
            .push((prefix.to_string(), CommandOutput::with_code(code, stdout)));
        self
    }

    /// All command lines run so far, in order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.iter().map(CommandSpec::command_line).collect()
    }

    pub fn calls(&self) -> &[CommandSpec] {
        &self.calls
    }

    pub fn detached(&self) -> &[CommandSpec] {
        &self.detached
    }

    /// Whether any command line starts with `prefix`
    pub fn ran(&self, prefix: &str) -> bool {
        self.command_lines().iter().any(|c| c.starts_with(prefix))
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.command_line();
        self.calls.push(spec.clone());

        let output = self
            .responses
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, output)| output.clone())
            .unwrap_or_else(CommandOutput::ok);
        Ok(output)
    }

    fn spawn_detached(&mut self, spec: &CommandSpec) -> Result<()> {
        self.detached.push(spec.clone());
        Ok(())
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.programs
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}
