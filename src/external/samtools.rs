//! Pileup extraction with `samtools mpileup`.
//!
//! The typing sites are written to `targets.bed` in the scratch directory and
//! passed with `--positions`, so only those coordinates are reported. `-aa`
//! makes samtools emit zero-depth sites too. Base qualities carry no meaning
//! for assembly alignments, so BAQ and the base-quality filter are disabled.
//!
//! mpileup needs an uncompressed, `faidx`-indexed reference. [`stage_reference`]
//! prepares one private copy per run, so workers never build an index next to
//! the user's file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::core::target::TargetTable;
use crate::external::{
    check_exit, run_tool, AlignmentHandle, CancelToken, PileupReader, ToolError,
};
use crate::parsing::pileup::{parse_pileup_file, PileupColumn};
use crate::utils::validation::open_text;

/// File name of the staged reference inside the staging directory
pub const STAGED_REFERENCE: &str = "reference.fa";

/// Copy `reference` into `dir` (decompressing gzip/bgzip) and index it with
/// `samtools faidx`.
///
/// Returns the path of the staged FASTA; its `.fai` sits next to it.
///
/// # Errors
///
/// Returns `ToolError::Infrastructure` if the copy fails or `samtools faidx`
/// fails or leaves no index, and `ToolError::Interrupted` if `cancel` fires.
pub fn stage_reference(
    samtools: &Path,
    reference: &Path,
    dir: &Path,
    cancel: &CancelToken,
) -> Result<PathBuf, ToolError> {
    let staged = dir.join(STAGED_REFERENCE);
    copy_plain(reference, &staged).map_err(|e| {
        ToolError::Infrastructure(format!(
            "cannot stage reference {} into {}: {e}",
            reference.display(),
            staged.display()
        ))
    })?;

    let log = dir.join("samtools_faidx.log");
    let mut command = Command::new(samtools);
    command.arg("faidx").arg(&staged);

    let status = run_tool("samtools faidx", command, None, &log, cancel)?;
    check_exit("samtools faidx", status, &log, ToolError::Infrastructure)?;

    let index = PathBuf::from(format!("{}.fai", staged.display()));
    if !index.is_file() {
        return Err(ToolError::Infrastructure(format!(
            "samtools faidx did not produce {}",
            index.display()
        )));
    }

    info!(reference = %reference.display(), staged = %staged.display(), "Staged reference");
    Ok(staged)
}

fn copy_plain(source: &Path, destination: &Path) -> std::io::Result<()> {
    let mut reader = open_text(source)?;
    let mut writer = BufWriter::new(File::create(destination)?);
    std::io::copy(&mut reader, &mut writer)?;
    writer.flush()
}

/// [`PileupReader`] backed by `samtools mpileup`
#[derive(Debug, Clone)]
pub struct SamtoolsPileup {
    samtools: PathBuf,
}

impl SamtoolsPileup {
    #[must_use]
    pub fn new(samtools: PathBuf) -> Self {
        Self { samtools }
    }
}

impl PileupReader for SamtoolsPileup {
    fn pileup(
        &self,
        reference: &Path,
        alignment: &AlignmentHandle,
        targets: &TargetTable,
        scratch: &Path,
        cancel: &CancelToken,
    ) -> Result<Vec<PileupColumn>, ToolError> {
        let bed = scratch.join("targets.bed");
        std::fs::write(&bed, targets.to_bed()).map_err(|e| {
            ToolError::Infrastructure(format!("cannot write {}: {e}", bed.display()))
        })?;

        let output = scratch.join("pileup.txt");
        let log = scratch.join("samtools_mpileup.log");

        let mut command = Command::new(&self.samtools);
        command
            .arg("mpileup")
            .arg("-aa")
            .arg("-B")
            .args(["-Q", "0"])
            .arg("--positions")
            .arg(&bed)
            .arg("-f")
            .arg(reference)
            .arg(&alignment.bam);

        let status = run_tool("samtools mpileup", command, Some(&output), &log, cancel)?;
        check_exit("samtools mpileup", status, &log, ToolError::ExtractionFailed)?;

        parse_pileup_file(&output)
            .map_err(|e| ToolError::ExtractionFailed(format!("cannot read pileup: {e}")))
    }
}
