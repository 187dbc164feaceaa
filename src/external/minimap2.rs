//! Alignment of an assembly to the reference with `minimap2`, followed by
//! `samtools sort` and `samtools index`.
//!
//! Artifacts written to the scratch directory:
//!
//! | File | Producer |
//! |------|----------|
//! | `aln.sam` | `minimap2 -a -x <preset> <reference> <assembly>` |
//! | `aln.bam` | `samtools sort` |
//! | `aln.bam.bai` | `samtools index` |
//! | `*.log` | stderr of each step |

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::external::{
    check_exit, run_tool, AlignmentHandle, Aligner, CancelToken, ToolError,
};
use crate::parsing::sam::scan_sam_file;

/// Whole-assembly presets for closely related genomes.
///
/// Short-read presets are deliberately not offered: the query is an assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MinimapPreset {
    /// ~0.1% sequence divergence
    #[default]
    Asm5,
    /// ~1% sequence divergence
    Asm10,
    /// ~5% sequence divergence
    Asm20,
}

impl MinimapPreset {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asm5 => "asm5",
            Self::Asm10 => "asm10",
            Self::Asm20 => "asm20",
        }
    }
}

impl std::fmt::Display for MinimapPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// [`Aligner`] backed by `minimap2` and `samtools`
#[derive(Debug, Clone)]
pub struct Minimap2Aligner {
    minimap2: PathBuf,
    samtools: PathBuf,
    preset: MinimapPreset,
}

impl Minimap2Aligner {
    #[must_use]
    pub fn new(minimap2: PathBuf, samtools: PathBuf, preset: MinimapPreset) -> Self {
        Self {
            minimap2,
            samtools,
            preset,
        }
    }

    fn map(
        &self,
        reference: &Path,
        assembly: &Path,
        sam: &Path,
        scratch: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ToolError> {
        let log = scratch.join("minimap2.log");
        let mut command = Command::new(&self.minimap2);
        command
            .arg("-a")
            .args(["-x", self.preset.as_str()])
            // One thread per worker; parallelism comes from the worker pool
            .args(["-t", "1"])
            .arg(reference)
            .arg(assembly);

        let status = run_tool("minimap2", command, Some(sam), &log, cancel)?;
        check_exit("minimap2", status, &log, ToolError::AlignmentFailed)
    }

    fn sort(
        &self,
        sam: &Path,
        bam: &Path,
        scratch: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ToolError> {
        let log = scratch.join("samtools_sort.log");
        let mut command = Command::new(&self.samtools);
        command
            .arg("sort")
            .arg("-T")
            .arg(scratch.join("sort.tmp"))
            .arg("-o")
            .arg(bam)
            .arg(sam);

        let status = run_tool("samtools sort", command, None, &log, cancel)?;
        check_exit("samtools sort", status, &log, ToolError::Infrastructure)
    }

    fn index(&self, bam: &Path, scratch: &Path, cancel: &CancelToken) -> Result<(), ToolError> {
        let log = scratch.join("samtools_index.log");
        let mut command = Command::new(&self.samtools);
        command.arg("index").arg(bam);

        let status = run_tool("samtools index", command, None, &log, cancel)?;
        check_exit("samtools index", status, &log, ToolError::Infrastructure)
    }
}

impl Aligner for Minimap2Aligner {
    fn align(
        &self,
        reference: &Path,
        assembly: &Path,
        scratch: &Path,
        cancel: &CancelToken,
    ) -> Result<AlignmentHandle, ToolError> {
        if !assembly.is_file() {
            return Err(ToolError::Infrastructure(format!(
                "assembly not found: {}",
                assembly.display()
            )));
        }

        let sam = scratch.join("aln.sam");
        self.map(reference, assembly, &sam, scratch, cancel)?;

        let stats = scan_sam_file(&sam).map_err(|e| {
            ToolError::Infrastructure(format!("cannot read minimap2 output: {e}"))
        })?;
        debug!(
            assembly = %assembly.display(),
            records = stats.records,
            mapped = stats.mapped,
            "Aligned assembly"
        );
        if stats.is_empty() {
            return Err(ToolError::AlignmentFailed(format!(
                "assembly does not align to the reference ({} records, none mapped)",
                stats.records
            )));
        }

        let bam = scratch.join("aln.bam");
        self.sort(&sam, &bam, scratch, cancel)?;
        self.index(&bam, scratch, cancel)?;

        let index = PathBuf::from(format!("{}.bai", bam.display()));
        if !index.is_file() {
            return Err(ToolError::Infrastructure(format!(
                "samtools index did not produce {}",
                index.display()
            )));
        }

        Ok(AlignmentHandle { bam, index, stats })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable shell script standing in for a tool
    fn stub_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    const SAMTOOLS: &str = r#"case "$1" in
  sort) while [ $# -gt 1 ]; do [ "$1" = "-o" ] && out="$2"; shift; done; cp "$1" "$out" ;;
  index) touch "$2.bai" ;;
esac"#;

    fn fixture(minimap2_body: &str) -> (tempfile::TempDir, Minimap2Aligner, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let minimap2 = stub_tool(dir.path(), "minimap2", minimap2_body);
        let samtools = stub_tool(dir.path(), "samtools", SAMTOOLS);

        let reference = dir.path().join("ref.fa");
        std::fs::write(&reference, ">chr1\nACGT\n").unwrap();
        let assembly = dir.path().join("asm.fa");
        std::fs::write(&assembly, ">contig1\nACGT\n").unwrap();

        let scratch = dir.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();

        let aligner = Minimap2Aligner::new(minimap2, samtools, MinimapPreset::Asm5);
        (dir, aligner, reference, assembly)
    }

    #[test]
    fn test_align_success() {
        let (dir, aligner, reference, assembly) = fixture(
            r#"printf '@SQ\tSN:chr1\tLN:4\n'
printf 'contig1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\t*\n'"#,
        );
        let scratch = dir.path().join("scratch");

        let handle = aligner
            .align(&reference, &assembly, &scratch, &CancelToken::new())
            .unwrap();
        assert_eq!(handle.stats.mapped, 1);
        assert!(handle.bam.is_file());
        assert!(handle.index.is_file());
        assert!(handle.bam.starts_with(&scratch));
    }

    #[test]
    fn test_align_nothing_mapped() {
        let (dir, aligner, reference, assembly) = fixture(
            r#"printf '@SQ\tSN:chr1\tLN:4\n'
printf 'contig1\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n'"#,
        );
        let result = aligner.align(
            &reference,
            &assembly,
            &dir.path().join("scratch"),
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(ToolError::AlignmentFailed(_))));
    }

    #[test]
    fn test_align_nonzero_exit() {
        let (dir, aligner, reference, assembly) = fixture("echo 'ERROR: bad index' >&2; exit 1");
        let err = aligner
            .align(
                &reference,
                &assembly,
                &dir.path().join("scratch"),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ToolError::AlignmentFailed(_)));
        assert!(err.to_string().contains("bad index"));
    }

    #[test]
    fn test_align_missing_assembly() {
        let (dir, aligner, reference, _) = fixture("exit 0");
        let result = aligner.align(
            &reference,
            &dir.path().join("missing.fa"),
            &dir.path().join("scratch"),
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(ToolError::Infrastructure(_))));
    }
}
