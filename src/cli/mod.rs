//! Command-line interface for assembly-snptyper.
//!
//! Types a list of bacterial genome assemblies at the SNP sites of a typing
//! scheme. Each assembly is aligned to the reference with minimap2, the base
//! at every site is read from a samtools pileup, and classified against the
//! site's expected alleles.
//!
//! ## Usage
//!
//! ```text
//! # Type every assembly in a list on 4 workers
//! assembly-snptyper --vcf scheme.vcf --reference ref.fa --list_input assemblies.txt -p 4
//!
//! # Per-sample counters instead of per-site calls
//! assembly-snptyper --vcf scheme.vcf --reference ref.fa --list_input assemblies.txt --format summary
//!
//! # Full results for scripting, with progress logging
//! assembly-snptyper --vcf scheme.vcf --reference ref.fa --list_input assemblies.txt --format json -v
//! ```

use std::future::Future;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use tracing::{info, warn};

use crate::external::{CancelToken, MinimapPreset, ToolError, Toolchain};
use crate::parsing::{assembly_list, fasta, vcf};
use crate::typing::dispatch::{self, DispatchError};
use crate::typing::extract::{CallPolicy, DEFAULT_MAJORITY_FRACTION, DEFAULT_MIN_DEPTH};
use crate::typing::worker::AssemblyWorker;
use crate::utils::validation::require_file;

pub mod render;

pub use render::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "assembly-snptyper")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Genotype bacterial genome assemblies at the SNP sites of a typing scheme")]
#[command(
    long_about = "assembly-snptyper aligns each genome assembly to a reference with minimap2 and reports, for every SNP in a variant-call file, whether the assembly carries the reference allele, the alternate allele, another base, or has no usable coverage.\n\nAssemblies are processed in parallel; output rows always follow the order of the input list. An assembly that cannot be typed gets a FAILED row instead of aborting the run."
)]
pub struct Cli {
    /// Variant-call file with the typing sites (CHROM POS ID REF ALT ...; may be gzipped)
    #[arg(long, required = true)]
    pub vcf: PathBuf,

    /// Reference FASTA the sites are defined on (may be gzipped)
    #[arg(long, required = true)]
    pub reference: PathBuf,

    /// File listing one assembly FASTA path per line
    #[arg(long = "list_input", required = true)]
    pub list_input: PathBuf,

    /// Number of assemblies processed concurrently
    #[arg(
        short = 'p',
        long,
        default_value = "1",
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub processes: usize,

    /// Increase logging verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "tsv")]
    pub format: OutputFormat,

    /// minimap2 assembly-to-reference preset
    #[arg(long, value_enum, default_value = "asm5")]
    pub preset: MinimapPreset,

    /// minimap2 executable
    #[arg(long, default_value = "minimap2")]
    pub minimap2: PathBuf,

    /// samtools executable
    #[arg(long, default_value = "samtools")]
    pub samtools: PathBuf,

    /// Minimum number of aligned bases for a site to be called
    #[arg(long, default_value_t = DEFAULT_MIN_DEPTH)]
    pub min_depth: u32,

    /// Share of the depth the dominant base must exceed, in [0.5, 1.0)
    #[arg(long, default_value_t = DEFAULT_MAJORITY_FRACTION)]
    pub majority_fraction: f64,

    /// Directory for per-assembly scratch files (default: system temp dir)
    #[arg(long)]
    pub tmpdir: Option<PathBuf>,
}

/// Run a full typing job
///
/// # Errors
///
/// Returns an error on any setup failure (missing input, unusable tool,
/// malformed variant file, sites absent from the reference), when the run is
/// interrupted, or when every assembly failed to type.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    require_file(&cli.vcf, "Variant file")?;
    require_file(&cli.reference, "Reference FASTA")?;
    require_file(&cli.list_input, "Assembly list")?;
    if let Some(dir) = &cli.tmpdir {
        if !dir.is_dir() {
            bail!("Scratch directory does not exist: {}", dir.display());
        }
    }
    let policy = CallPolicy::new(cli.min_depth, cli.majority_fraction)?;

    let toolchain = Toolchain {
        minimap2: cli.minimap2.clone(),
        samtools: cli.samtools.clone(),
        preset: cli.preset,
    };
    let (minimap2_version, samtools_version) = toolchain.check()?;
    info!(
        minimap2 = %minimap2_version,
        samtools = %samtools_version,
        preset = %toolchain.preset,
        "External tools found"
    );

    let targets = vcf::load(&cli.vcf)
        .with_context(|| format!("Failed to load variants from {}", cli.vcf.display()))?;
    let dictionary = fasta::parse_reference_dictionary(&cli.reference)
        .with_context(|| format!("Failed to read reference {}", cli.reference.display()))?;
    dictionary.validate_targets(&targets)?;
    info!(
        sites = targets.len(),
        contigs = dictionary.contigs().len(),
        "Loaded typing scheme"
    );

    let records = assembly_list::parse_assembly_list(&cli.list_input).with_context(|| {
        format!(
            "Failed to read assembly list {}",
            cli.list_input.display()
        )
    })?;
    if records.is_empty() {
        warn!("No assemblies listed in {}", cli.list_input.display());
    }

    let cancel = CancelToken::new();
    install_interrupt_handler(cancel.clone())?;

    // One indexed copy of the reference shared read-only by every worker
    let scratch_root = cli.tmpdir.clone().unwrap_or_else(std::env::temp_dir);
    let staging = tempfile::Builder::new()
        .prefix("snptyper-reference-")
        .tempdir_in(&scratch_root)
        .with_context(|| {
            format!(
                "Failed to create reference staging directory in {}",
                scratch_root.display()
            )
        })?;
    let reference = match toolchain.stage_reference(&cli.reference, staging.path(), &cancel) {
        Ok(path) => path,
        Err(ToolError::Interrupted) => bail!("Interrupted; no results written"),
        Err(e) => return Err(e).context("Failed to prepare reference"),
    };

    let aligner = toolchain.aligner();
    let pileup = toolchain.pileup_reader();
    let worker = AssemblyWorker::new(&reference, &targets, &aligner, &pileup)
        .with_policy(policy)
        .with_scratch_root(&scratch_root)
        .with_cancel(cancel.clone());

    let results = match dispatch::run(&records, cli.processes, &worker, &cancel) {
        Ok(results) => results,
        Err(DispatchError::Interrupted) => bail!("Interrupted; no results written"),
        Err(e) => return Err(e.into()),
    };

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    render::render(&results, &targets, cli.format, &mut out)?;

    let failed = results.iter().filter(|r| r.is_failed()).count();
    if failed > 0 {
        warn!("{failed} of {} assemblies could not be typed", results.len());
    }
    if !results.is_empty() && failed == results.len() {
        bail!("All {failed} assemblies failed to genotype");
    }

    Ok(())
}

/// Exit status after a second Ctrl-C (128 + SIGINT)
const FORCED_EXIT_CODE: i32 = 130;

/// Cancel `cancel` on Ctrl-C, and exit at once on a second Ctrl-C.
///
/// The signal is awaited on a current-thread tokio runtime owned by a
/// dedicated thread, leaving the worker pool untouched.
fn install_interrupt_handler(cancel: CancelToken) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal handler runtime")?;

    std::thread::Builder::new()
        .name("snptyper-signal".to_string())
        .spawn(move || {
            runtime.block_on(watch_interrupts(cancel, tokio::signal::ctrl_c, || {
                std::process::exit(FORCED_EXIT_CODE);
            }));
        })
        .context("Failed to spawn signal handler thread")?;

    Ok(())
}

/// First interrupt cancels the run; a second one calls `force_exit`.
///
/// If the signal listener itself fails, the run is left alone.
async fn watch_interrupts<F, Fut, E>(cancel: CancelToken, mut interrupted: F, force_exit: E)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
    E: FnOnce(),
{
    if let Err(e) = interrupted().await {
        warn!("Cannot listen for Ctrl-C: {e}");
        return;
    }
    warn!("Interrupt received, stopping workers (Ctrl-C again to exit immediately)");
    cancel.cancel();

    if interrupted().await.is_ok() {
        warn!("Second interrupt received, exiting");
        force_exit();
    }
}
