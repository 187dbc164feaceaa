//! Result formatting.
//!
//! Rows are written in the order given, which the dispatcher guarantees is
//! input-list order, so identical inputs give byte-identical output.

use std::io::Write;

use serde::Serialize;

use crate::core::assembly::AssemblyResult;
use crate::core::target::{TargetTable, VariantTarget};

/// Output rendering selected with `--format`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One categorical call per site
    #[default]
    Tsv,
    /// Per-sample counters
    Summary,
    /// Full results, including observed bases and depths
    Json,
}

/// Prefix of the cell that replaces the calls of a failed row
pub const FAILED_MARKER: &str = "FAILED";

const SUMMARY_HEADER: &str = "sample\tmatching_variants\twt_variants\tvariants_in_scheme\tvariants_missing\tvariants_multiple_cov\tother_variants\tstatus";

#[derive(Serialize)]
struct JsonReport<'a> {
    targets: &'a [VariantTarget],
    results: &'a [AssemblyResult],
}

/// Write `results` to `out` in the chosen format
///
/// # Errors
///
/// Returns an error if writing to `out` fails or JSON serialization fails.
pub fn render<W: Write>(
    results: &[AssemblyResult],
    targets: &TargetTable,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Tsv => render_tsv(results, targets, out)?,
        OutputFormat::Summary => render_summary(results, out)?,
        OutputFormat::Json => render_json(results, targets, out)?,
    }
    out.flush()?;
    Ok(())
}

fn render_tsv<W: Write>(
    results: &[AssemblyResult],
    targets: &TargetTable,
    out: &mut W,
) -> std::io::Result<()> {
    // Header
    write!(out, "sample")?;
    for target in targets {
        write!(out, "\t{}", target.site_id())?;
    }
    writeln!(out)?;

    for result in results {
        write!(out, "{}", result.label())?;
        if let Some(failure) = result.failure() {
            write!(out, "\t{FAILED_MARKER}:{}", failure.kind)?;
        } else {
            for call in result.calls() {
                write!(out, "\t{}", call.category)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn render_summary<W: Write>(results: &[AssemblyResult], out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{SUMMARY_HEADER}")?;

    for result in results {
        match (result.summary(), result.failure()) {
            (Some(summary), _) => writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\tok",
                result.label(),
                summary.alternate,
                summary.reference,
                summary.in_scheme,
                summary.missing,
                summary.multiple_coverage,
                summary.other,
            )?,
            (None, failure) => {
                let status = failure.map_or("unknown", |f| f.kind.as_str());
                writeln!(
                    out,
                    "{}\tNA\tNA\tNA\tNA\tNA\tNA\t{status}",
                    result.label()
                )?;
            }
        }
    }
    Ok(())
}

fn render_json<W: Write>(
    results: &[AssemblyResult],
    targets: &TargetTable,
    out: &mut W,
) -> anyhow::Result<()> {
    let report = JsonReport {
        targets: targets.as_slice(),
        results,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}
