//! Command execution seam.
//!
//! Every host mutation is expressed as an [`Action`]: either running an
//! external tool or writing a value into a kernel file (`/proc/sys`,
//! `/proc/irq`). Actions go through a [`Runner`], which either prints them
//! (show-only mode) or hands them to an [`Executor`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};

use crate::error::HostError;

/// A single host mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run { program: String, args: Vec<String> },
    Write { path: PathBuf, contents: String },
}

impl Action {
    pub fn run(program: &str, args: &[&str]) -> Self {
        Action::Run {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Action::Write {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Renders the shell line an operator would type to do the same thing.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Run { program, args } => {
                f.write_str(program)?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Action::Write { path, contents } => {
                write!(f, "echo '{}' > {}", contents, path.display())
            }
        }
    }
}

/// Something that can carry out actions against a host.
pub trait Executor {
    fn execute(&self, action: &Action) -> Result<(), HostError>;

    /// Runs a read-only command and reports whether it exited successfully.
    fn probe(&self, program: &str, args: &[&str]) -> bool;

    fn read_to_string(&self, path: &Path) -> Result<String, HostError>;
}

impl<T: Executor + ?Sized> Executor for &T {
    fn execute(&self, action: &Action) -> Result<(), HostError> {
        (**self).execute(action)
    }

    fn probe(&self, program: &str, args: &[&str]) -> bool {
        (**self).probe(program, args)
    }

    fn read_to_string(&self, path: &Path) -> Result<String, HostError> {
        (**self).read_to_string(path)
    }
}

// ── Real host ───────────────────────────────────────────────────────

/// Executes actions on the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, action: &Action) -> Result<(), HostError> {
        match action {
            Action::Run { program, args } => {
                let output = Command::new(program)
                    .args(args)
                    .output()
                    .map_err(|source| HostError::Spawn {
                        program: program.clone(),
                        source,
                    })?;
                if !output.status.success() {
                    return Err(HostError::CommandFailed {
                        command: action.to_string(),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    });
                }
                Ok(())
            }
            Action::Write { path, contents } => {
                std::fs::write(path, contents).map_err(|source| HostError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    fn probe(&self, program: &str, args: &[&str]) -> bool {
        Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn read_to_string(&self, path: &Path) -> Result<String, HostError> {
        std::fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Runner ──────────────────────────────────────────────────────────

/// Applies actions through an executor, honouring show-only mode.
///
/// In show-only mode every mutating action is printed to stdout and nothing
/// is executed. Probes and reads still go to the executor since they do not
/// change the host.
pub struct Runner<E> {
    executor: E,
    show_only: bool,
}

impl<E: Executor> Runner<E> {
    pub fn new(executor: E, show_only: bool) -> Self {
        Self {
            executor,
            show_only,
        }
    }

    pub fn show_only(&self) -> bool {
        self.show_only
    }

    pub fn apply(&self, action: &Action) -> Result<(), HostError> {
        if self.show_only {
            println!("{action}");
            return Ok(());
        }

        tracing::debug!(command = %action, "executing");
        self.executor.execute(action)?;
        match action {
            Action::Run { .. } => {
                tracing::info!(command = %action, "command executed successfully");
            }
            Action::Write { path, contents } => {
                tracing::info!(path = %path.display(), value = %contents, "wrote kernel value");
            }
        }
        Ok(())
    }

    pub fn probe(&self, program: &str, args: &[&str]) -> bool {
        self.executor.probe(program, args)
    }

    pub fn read_to_string(&self, path: &Path) -> Result<String, HostError> {
        self.executor.read_to_string(path)
    }
}

// ── Recording executor ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct Recorded {
    actions: Vec<Action>,
    failures: Vec<String>,
    probes: HashMap<String, bool>,
    files: HashMap<PathBuf, String>,
    reads: Vec<PathBuf>,
}

/// In-memory executor that records every action instead of touching the host.
///
/// Commands whose rendered line contains a pattern registered with
/// [`fail_when`](Self::fail_when) return [`HostError::CommandFailed`]. Writes
/// land in an in-memory file table that [`read_to_string`](Executor::read_to_string)
/// serves from.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    inner: Mutex<Recorded>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn fail_when(&self, pattern: &str) {
        self.with(|r| r.failures.push(pattern.to_string()));
    }

    /// Sets the outcome of a probe, keyed by its rendered command line.
    pub fn set_probe(&self, command_line: &str, success: bool) {
        self.with(|r| r.probes.insert(command_line.to_string(), success));
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, contents: &str) {
        self.with(|r| r.files.insert(path.into(), contents.to_string()));
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.with(|r| r.files.get(path.as_ref()).cloned())
    }

    /// Every path passed to `read_to_string`, in call order.
    pub fn reads(&self) -> Vec<PathBuf> {
        self.with(|r| r.reads.clone())
    }

    pub fn actions(&self) -> Vec<Action> {
        self.with(|r| r.actions.clone())
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.with(|r| r.actions.iter().map(|a| a.to_string()).collect())
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, action: &Action) -> Result<(), HostError> {
        self.with(|r| {
            r.actions.push(action.clone());
            let line = action.to_string();
            if r.failures.iter().any(|p| line.contains(p.as_str())) {
                return Err(HostError::CommandFailed {
                    command: line,
                    stderr: "scripted failure".into(),
                });
            }
            if let Action::Write { path, contents } = action {
                r.files.insert(path.clone(), contents.clone());
            }
            Ok(())
        })
    }

    fn probe(&self, program: &str, args: &[&str]) -> bool {
        let line = Action::run(program, args).to_string();
        self.with(|r| r.probes.get(&line).copied().unwrap_or(false))
    }

    fn read_to_string(&self, path: &Path) -> Result<String, HostError> {
        self.with(|r| {
            r.reads.push(path.to_path_buf());
            r.files.get(path).cloned().ok_or_else(|| HostError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        })
    }
}
