use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::core::assembly::{AssemblyRecord, AssemblyResult, Failure, FailureKind, SiteCall};
use crate::core::target::TargetTable;
use crate::external::{Aligner, CancelToken, PileupReader, ToolError};
use crate::typing::classify::call_sites;
use crate::typing::extract::{extract, CallPolicy};

/// Turns one assembly into one result row
pub trait ProcessAssembly: Sync {
    /// Never fails: problems are recorded as a failed row
    fn process(&self, record: &AssemblyRecord) -> AssemblyResult;
}

/// Aligns, extracts and classifies a single assembly.
///
/// Shared read-only across the worker pool. Each call to
/// [`process`](ProcessAssembly::process) works in its own scratch directory
/// under `scratch_root`, removed when the call returns.
pub struct AssemblyWorker<'a> {
    reference: &'a Path,
    targets: &'a TargetTable,
    aligner: &'a dyn Aligner,
    pileup: &'a dyn PileupReader,
    policy: CallPolicy,
    scratch_root: PathBuf,
    cancel: CancelToken,
}

impl<'a> AssemblyWorker<'a> {
    #[must_use]
    pub fn new(
        reference: &'a Path,
        targets: &'a TargetTable,
        aligner: &'a dyn Aligner,
        pileup: &'a dyn PileupReader,
    ) -> Self {
        Self {
            reference,
            targets,
            aligner,
            pileup,
            policy: CallPolicy::default(),
            scratch_root: std::env::temp_dir(),
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn try_process(&self, record: &AssemblyRecord) -> Result<Vec<SiteCall>, ToolError> {
        if self.cancel.is_cancelled() {
            return Err(ToolError::Interrupted);
        }

        // Unique per assembly, so concurrent workers never share artifact paths
        let scratch = tempfile::Builder::new()
            .prefix(&format!("snptyper-{}-", record.ordinal))
            .tempdir_in(&self.scratch_root)
            .map_err(|e| {
                ToolError::Infrastructure(format!(
                    "cannot create scratch directory in {}: {e}",
                    self.scratch_root.display()
                ))
            })?;
        debug!(
            sample = %record.label,
            scratch = %scratch.path().display(),
            "Created scratch directory"
        );

        let alignment =
            self.aligner
                .align(self.reference, &record.path, scratch.path(), &self.cancel)?;

        let observations = extract(
            self.pileup,
            self.reference,
            &alignment,
            self.targets,
            &self.policy,
            scratch.path(),
            &self.cancel,
        )?;

        let calls = call_sites(&observations, self.targets);
        if calls.len() != self.targets.len() {
            return Err(ToolError::ExtractionFailed(format!(
                "expected {} calls, got {}",
                self.targets.len(),
                calls.len()
            )));
        }

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(
                scratch = %scratch_path.display(),
                "Failed to remove scratch directory: {e}"
            );
        }

        Ok(calls)
    }
}

impl ProcessAssembly for AssemblyWorker<'_> {
    fn process(&self, record: &AssemblyRecord) -> AssemblyResult {
        match self.try_process(record) {
            Ok(calls) => {
                info!(sample = %record.label, "Processed");
                AssemblyResult::typed(record, calls)
            }
            Err(err) => {
                let kind = err.kind();
                match kind {
                    FailureKind::Infrastructure => {
                        error!(sample = %record.label, path = %record.path.display(), "Tooling error: {err}");
                    }
                    FailureKind::Interrupted => {
                        debug!(sample = %record.label, "Interrupted");
                    }
                    FailureKind::AlignmentFailed | FailureKind::ExtractionFailed => {
                        warn!(sample = %record.label, path = %record.path.display(), "Could not type assembly: {err}");
                    }
                }
                AssemblyResult::failed(
                    record,
                    Failure {
                        kind,
                        message: err.to_string(),
                    },
                )
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::target::VariantTarget;
    use crate::core::types::{Base, Category};
    use crate::external::AlignmentHandle;
    use crate::parsing::pileup::{parse_pileup_text, PileupColumn};
    use crate::parsing::sam::AlignmentStats;

    /// Aligner that writes a marker artifact and fails for selected assemblies
    pub(crate) struct FakeAligner {
        pub fail_for: Vec<String>,
    }

    impl Aligner for FakeAligner {
        fn align(
            &self,
            _reference: &Path,
            assembly: &Path,
            scratch: &Path,
            _cancel: &CancelToken,
        ) -> Result<AlignmentHandle, ToolError> {
            let bam = scratch.join("aln.bam");
            std::fs::write(&bam, b"BAM\x01").unwrap();

            let name = assembly.display().to_string();
            if self.fail_for.contains(&name) {
                return Err(ToolError::AlignmentFailed(
                    "assembly does not align to the reference".to_string(),
                ));
            }
            Ok(AlignmentHandle {
                index: scratch.join("aln.bam.bai"),
                bam,
                stats: AlignmentStats {
                    reference_names: vec!["chr1".to_string()],
                    records: 1,
                    mapped: 1,
                },
            })
        }
    }

    /// Aligner that leaves a partial artifact, fires the run's cancel token
    /// and reports the interruption, as a killed minimap2 would
    pub(crate) struct CancellingAligner {
        pub cancel: CancelToken,
    }

    impl Aligner for CancellingAligner {
        fn align(
            &self,
            _reference: &Path,
            _assembly: &Path,
            scratch: &Path,
            _cancel: &CancelToken,
        ) -> Result<AlignmentHandle, ToolError> {
            std::fs::write(scratch.join("aln.sam"), b"@SQ\tSN:chr1\tLN:1000\n").unwrap();
            self.cancel.cancel();
            Err(ToolError::Interrupted)
        }
    }

    /// Pileup reader answering every assembly with the same mpileup text
    pub(crate) struct FakePileup {
        pub pileup: String,
    }

    impl PileupReader for FakePileup {
        fn pileup(
            &self,
            _reference: &Path,
            _alignment: &AlignmentHandle,
            _targets: &TargetTable,
            _scratch: &Path,
            _cancel: &CancelToken,
        ) -> Result<Vec<PileupColumn>, ToolError> {
            parse_pileup_text(&self.pileup)
                .map_err(|e| ToolError::ExtractionFailed(e.to_string()))
        }
    }

    fn single_target() -> TargetTable {
        TargetTable::new(vec![VariantTarget::new("chr1", 100, Base::A, Base::T)]).unwrap()
    }

    fn run_one(pileup: &str) -> AssemblyResult {
        let scratch = tempfile::tempdir().unwrap();
        let targets = single_target();
        let aligner = FakeAligner { fail_for: vec![] };
        let reader = FakePileup {
            pileup: pileup.to_string(),
        };
        let worker = AssemblyWorker::new(Path::new("ref.fa"), &targets, &aligner, &reader)
            .with_scratch_root(scratch.path());
        worker.process(&AssemblyRecord::new("asm/sample1.fasta", 0))
    }

    #[test]
    fn test_alternate_call() {
        let result = run_one("chr1\t100\tA\t1\tT\t~\n");
        assert!(!result.is_failed());
        assert_eq!(result.label(), "sample1");
        assert_eq!(result.calls().len(), 1);
        assert_eq!(result.calls()[0].category, Category::Alternate);
        assert_eq!(result.calls()[0].observed_base, Base::T);
    }

    #[test]
    fn test_zero_coverage_is_no_data() {
        let result = run_one("chr1\t100\tA\t0\t\t\n");
        assert_eq!(result.calls()[0].category, Category::NoData);

        // Site missing from the pileup entirely
        let result = run_one("");
        assert_eq!(result.calls()[0].category, Category::NoData);
        assert_eq!(result.calls()[0].depth, 0);
    }

    #[test]
    fn test_third_base_is_other() {
        let result = run_one("chr1\t100\tA\t1\tG\t~\n");
        assert_eq!(result.calls()[0].category, Category::Other);
        assert_eq!(result.calls()[0].observed_base, Base::G);
    }

    #[test]
    fn test_reference_call() {
        let result = run_one("chr1\t100\tA\t1\t,\t~\n");
        assert_eq!(result.calls()[0].category, Category::Reference);
    }

    #[test]
    fn test_alignment_failure_is_isolated_and_cleaned_up() {
        let scratch = tempfile::tempdir().unwrap();
        let targets = single_target();
        let aligner = FakeAligner {
            fail_for: vec!["wrong_species.fa".to_string()],
        };
        let reader = FakePileup {
            pileup: "chr1\t100\tA\t1\tT\t~\n".to_string(),
        };
        let worker = AssemblyWorker::new(Path::new("ref.fa"), &targets, &aligner, &reader)
            .with_scratch_root(scratch.path());

        let failed = worker.process(&AssemblyRecord::new("wrong_species.fa", 0));
        let failure = failed.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::AlignmentFailed);
        assert!(failed.calls().is_empty());

        let ok = worker.process(&AssemblyRecord::new("good.fa", 1));
        assert!(!ok.is_failed());

        // No artifacts survive either path
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_extraction_failure() {
        let result = run_one("garbage\n");
        assert_eq!(result.failure().unwrap().kind, FailureKind::ExtractionFailed);
        assert!(result.calls().is_empty());
    }

    #[test]
    fn test_missing_scratch_root_is_infrastructure() {
        let targets = single_target();
        let aligner = FakeAligner { fail_for: vec![] };
        let reader = FakePileup {
            pileup: String::new(),
        };
        let worker = AssemblyWorker::new(Path::new("ref.fa"), &targets, &aligner, &reader)
            .with_scratch_root("/nonexistent/scratch/root");

        let result = worker.process(&AssemblyRecord::new("a.fa", 0));
        assert_eq!(result.failure().unwrap().kind, FailureKind::Infrastructure);
    }

    #[test]
    fn test_cancelled_worker_does_not_start() {
        let targets = single_target();
        let aligner = FakeAligner { fail_for: vec![] };
        let reader = FakePileup {
            pileup: String::new(),
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        let worker = AssemblyWorker::new(Path::new("ref.fa"), &targets, &aligner, &reader)
            .with_cancel(cancel);

        let result = worker.process(&AssemblyRecord::new("a.fa", 0));
        assert_eq!(result.failure().unwrap().kind, FailureKind::Interrupted);
    }

    #[test]
    fn test_cancel_mid_alignment_removes_scratch() {
        let scratch = tempfile::tempdir().unwrap();
        let targets = single_target();
        let cancel = CancelToken::new();
        let aligner = CancellingAligner {
            cancel: cancel.clone(),
        };
        let reader = FakePileup {
            pileup: "chr1\t100\tA\t1\tT\t~\n".to_string(),
        };
        let worker = AssemblyWorker::new(Path::new("ref.fa"), &targets, &aligner, &reader)
            .with_scratch_root(scratch.path())
            .with_cancel(cancel.clone());

        let result = worker.process(&AssemblyRecord::new("a.fa", 0));
        assert_eq!(result.failure().unwrap().kind, FailureKind::Interrupted);
        assert!(result.calls().is_empty());
        assert!(cancel.is_cancelled());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_multi_site_row_in_table_order() {
        let scratch = tempfile::tempdir().unwrap();
        let targets = TargetTable::new(vec![
            VariantTarget::new("chr1", 200, Base::C, Base::G),
            VariantTarget::new("chr1", 100, Base::A, Base::T),
        ])
        .unwrap();
        let aligner = FakeAligner { fail_for: vec![] };
        let reader = FakePileup {
            pileup: "chr1\t100\tA\t1\tT\t~\nchr1\t200\tC\t2\t..\t~~\n".to_string(),
        };
        let worker = AssemblyWorker::new(Path::new("ref.fa"), &targets, &aligner, &reader)
            .with_scratch_root(scratch.path());

        let result = worker.process(&AssemblyRecord::new("a.fa", 0));
        let categories: Vec<Category> = result.calls().iter().map(|c| c.category).collect();
        assert_eq!(categories, vec![Category::Reference, Category::Alternate]);
        assert_eq!(result.calls()[0].depth, 2);
    }
}
