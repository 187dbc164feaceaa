//! Process boundary to the external aligner and pileup tools.
//!
//! Two narrow seams hide the concrete tools from the typing core:
//!
//! - [`Aligner`]: assembly + reference -> sorted, indexed alignment ([`AlignmentHandle`])
//! - [`PileupReader`]: alignment + typing sites -> one [`PileupColumn`] per reported site
//!
//! [`minimap2::Minimap2Aligner`] and [`samtools::SamtoolsPileup`] implement them by
//! running `minimap2` and `samtools` as subprocesses. All files a tool writes go
//! into the caller's scratch directory; every wait on a subprocess polls a
//! [`CancelToken`] so an interrupted run kills its children promptly.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::core::assembly::FailureKind;
use crate::core::target::TargetTable;
use crate::parsing::pileup::PileupColumn;
use crate::parsing::sam::AlignmentStats;

pub mod minimap2;
pub mod samtools;

pub use minimap2::{Minimap2Aligner, MinimapPreset};
pub use samtools::SamtoolsPileup;

/// How often a running subprocess is checked for exit or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Number of stderr lines quoted in failure messages
const LOG_TAIL_LINES: usize = 5;

/// Per-assembly failures raised while driving external tools
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("alignment failed: {0}")]
    AlignmentFailed(String),

    #[error("pileup extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("{0}")]
    Infrastructure(String),

    #[error("{tool} not usable at '{path}': {reason}")]
    MissingTool {
        tool: &'static str,
        path: String,
        reason: String,
    },

    #[error("interrupted")]
    Interrupted,
}

impl ToolError {
    /// The failure category recorded in the output row
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AlignmentFailed(_) => FailureKind::AlignmentFailed,
            Self::ExtractionFailed(_) => FailureKind::ExtractionFailed,
            Self::Infrastructure(_) | Self::MissingTool { .. } => FailureKind::Infrastructure,
            Self::Interrupted => FailureKind::Interrupted,
        }
    }

    fn io(context: impl std::fmt::Display, err: &std::io::Error) -> Self {
        Self::Infrastructure(format!("{context}: {err}"))
    }
}

/// Shared interruption flag, set once and observed by every worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A sorted, indexed alignment of one assembly against the reference
#[derive(Debug, Clone)]
pub struct AlignmentHandle {
    /// Coordinate-sorted BAM
    pub bam: PathBuf,

    /// `.bai` index next to `bam`
    pub index: PathBuf,

    pub stats: AlignmentStats,
}

/// Aligns one assembly to the reference
pub trait Aligner: Send + Sync {
    /// Align `assembly` to `reference`, writing all artifacts under `scratch`.
    ///
    /// # Errors
    ///
    /// `ToolError::AlignmentFailed` if the aligner fails or nothing aligns,
    /// `ToolError::Infrastructure` for I/O and sorting/indexing problems,
    /// `ToolError::Interrupted` if `cancel` fires.
    fn align(
        &self,
        reference: &Path,
        assembly: &Path,
        scratch: &Path,
        cancel: &CancelToken,
    ) -> Result<AlignmentHandle, ToolError>;
}

/// Reads the pileup of an alignment at the typing sites
pub trait PileupReader: Send + Sync {
    /// Report pileup columns for the sites in `targets`.
    ///
    /// Sites missing from the returned columns are treated as uncovered.
    ///
    /// # Errors
    ///
    /// `ToolError::ExtractionFailed` if the pileup cannot be produced or read,
    /// `ToolError::Infrastructure` for I/O problems,
    /// `ToolError::Interrupted` if `cancel` fires.
    fn pileup(
        &self,
        reference: &Path,
        alignment: &AlignmentHandle,
        targets: &TargetTable,
        scratch: &Path,
        cancel: &CancelToken,
    ) -> Result<Vec<PileupColumn>, ToolError>;
}

/// External executables and aligner settings for a run
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub minimap2: PathBuf,
    pub samtools: PathBuf,
    pub preset: MinimapPreset,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            minimap2: PathBuf::from("minimap2"),
            samtools: PathBuf::from("samtools"),
            preset: MinimapPreset::default(),
        }
    }
}

impl Toolchain {
    /// Verify both tools can be executed, returning their version strings.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::MissingTool` for the first tool that cannot be run.
    pub fn check(&self) -> Result<(String, String), ToolError> {
        let minimap2 = check_tool("minimap2", &self.minimap2)?;
        let samtools = check_tool("samtools", &self.samtools)?;
        Ok((minimap2, samtools))
    }

    #[must_use]
    pub fn aligner(&self) -> Minimap2Aligner {
        Minimap2Aligner::new(self.minimap2.clone(), self.samtools.clone(), self.preset)
    }

    #[must_use]
    pub fn pileup_reader(&self) -> SamtoolsPileup {
        SamtoolsPileup::new(self.samtools.clone())
    }

    /// Prepare the run's private, indexed copy of `reference` in `dir`.
    ///
    /// # Errors
    ///
    /// See [`samtools::stage_reference`].
    pub fn stage_reference(
        &self,
        reference: &Path,
        dir: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf, ToolError> {
        samtools::stage_reference(&self.samtools, reference, dir, cancel)
    }
}

/// Run `<program> --version` and return the first line it prints
///
/// # Errors
///
/// Returns `ToolError::MissingTool` if the program cannot be started or
/// exits unsuccessfully.
pub fn check_tool(tool: &'static str, program: &Path) -> Result<String, ToolError> {
    let missing = |reason: String| ToolError::MissingTool {
        tool,
        path: program.display().to_string(),
        reason,
    };

    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| missing(e.to_string()))?;

    if !output.status.success() {
        return Err(missing(format!("'--version' exited with {}", output.status)));
    }

    let version = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    debug!(tool, version = %version, "Found external tool");
    Ok(version)
}

/// Run a tool to completion with stderr captured to `log` and stdout either
/// written to `stdout` or discarded.
///
/// Returns the exit status; interpreting a non-zero status is up to the caller.
///
/// # Errors
///
/// Returns `ToolError::Infrastructure` if the tool cannot be started or the
/// redirect files cannot be created, and `ToolError::Interrupted` if `cancel`
/// fires while the tool runs (the child is killed and reaped first).
pub fn run_tool(
    tool: &str,
    mut command: Command,
    stdout: Option<&Path>,
    log: &Path,
    cancel: &CancelToken,
) -> Result<ExitStatus, ToolError> {
    if cancel.is_cancelled() {
        return Err(ToolError::Interrupted);
    }

    let stderr = File::create(log)
        .map_err(|e| ToolError::io(format!("cannot create {}", log.display()), &e))?;
    command.stdin(Stdio::null()).stderr(Stdio::from(stderr));

    if let Some(path) = stdout {
        let file = File::create(path)
            .map_err(|e| ToolError::io(format!("cannot create {}", path.display()), &e))?;
        command.stdout(Stdio::from(file));
    } else {
        command.stdout(Stdio::null());
    }

    debug!(tool, command = ?command, "Running external tool");
    let mut child = command
        .spawn()
        .map_err(|e| ToolError::io(format!("failed to start {tool}"), &e))?;

    wait_cancellable(tool, &mut child, cancel)
}

fn wait_cancellable(
    tool: &str,
    child: &mut Child,
    cancel: &CancelToken,
) -> Result<ExitStatus, ToolError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                trace!(tool, %status, "External tool finished");
                return Ok(status);
            }
            Ok(None) => {}
            Err(e) => return Err(ToolError::io(format!("failed waiting on {tool}"), &e)),
        }

        if cancel.is_cancelled() {
            debug!(tool, pid = child.id(), "Killing external tool");
            // The child may exit between try_wait and kill
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::Interrupted);
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Map a finished tool's exit status onto a result.
///
/// A non-zero exit code becomes `on_failure(message)`; death by signal is a
/// crash and always becomes `ToolError::Infrastructure`.
///
/// # Errors
///
/// See above.
pub fn check_exit(
    tool: &str,
    status: ExitStatus,
    log: &Path,
    on_failure: fn(String) -> ToolError,
) -> Result<(), ToolError> {
    if status.success() {
        return Ok(());
    }

    let tail = log_tail(log, LOG_TAIL_LINES);
    let detail = if tail.is_empty() {
        String::new()
    } else {
        format!(": {tail}")
    };

    match status.code() {
        Some(code) => Err(on_failure(format!("{tool} exited with status {code}{detail}"))),
        None => Err(ToolError::Infrastructure(format!(
            "{tool} was terminated by a signal{detail}"
        ))),
    }
}

/// Last `n` non-empty lines of a log file joined with `"; "`
fn log_tail(log: &Path, n: usize) -> String {
    let Ok(file) = File::open(log) else {
        return String::new();
    };
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|l| !l.trim().is_empty())
        .collect();
    lines[lines.len().saturating_sub(n)..].join("; ")
}
