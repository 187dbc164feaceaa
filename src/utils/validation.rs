//! Centralized validation and input helpers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Maximum number of typing sites accepted from a variant file
pub const MAX_TARGETS: usize = 1_000_000;

/// Maximum number of assemblies accepted from an input list
pub const MAX_ASSEMBLIES: usize = 1_000_000;

/// Check if adding another typing site would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new target.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_target_limit(count: usize) -> Option<String> {
    if count >= MAX_TARGETS {
        Some(format!(
            "Too many variant records: adding another would exceed maximum of {MAX_TARGETS}"
        ))
    } else {
        None
    }
}

/// Input validation error types
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{what} not found: {path}")]
    NotFound { what: &'static str, path: String },
    #[error("{what} is not a regular file: {path}")]
    NotAFile { what: &'static str, path: String },
    #[error("Majority fraction must be in [0.5, 1.0), got {0}")]
    MajorityFraction(f64),
}

/// Ensure a required input file exists and is a regular file.
///
/// # Errors
///
/// Returns `ValidationError::NotFound` if nothing exists at `path`, or
/// `ValidationError::NotAFile` if it is a directory or other non-file.
pub fn require_file(path: &Path, what: &'static str) -> Result<(), ValidationError> {
    let metadata = std::fs::metadata(path).map_err(|_| ValidationError::NotFound {
        what,
        path: path.display().to_string(),
    })?;

    if metadata.is_file() {
        Ok(())
    } else {
        Err(ValidationError::NotAFile {
            what,
            path: path.display().to_string(),
        })
    }
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
#[must_use]
pub fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Open a text file for buffered reading, transparently decompressing
/// gzip/bgzip input.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be opened.
pub fn open_text(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if is_gzipped(path) {
        // bgzip is a series of gzip members
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_is_gzipped() {
        assert!(is_gzipped(Path::new("ref.fa.gz")));
        assert!(is_gzipped(Path::new("sites.VCF.GZ")));
        assert!(is_gzipped(Path::new("ref.fna.bgz")));
        assert!(!is_gzipped(Path::new("ref.fa")));
    }

    #[test]
    fn test_require_file() {
        let temp = NamedTempFile::new().unwrap();
        assert!(require_file(temp.path(), "VCF").is_ok());

        let missing = require_file(Path::new("/definitely/not/here.vcf"), "VCF");
        assert!(matches!(missing, Err(ValidationError::NotFound { .. })));

        let dir = tempfile::tempdir().unwrap();
        let not_file = require_file(dir.path(), "Reference");
        assert!(matches!(not_file, Err(ValidationError::NotAFile { .. })));
    }

    #[test]
    fn test_open_text_gzipped() {
        let mut temp = NamedTempFile::with_suffix(".txt.gz").unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"hello\nworld\n").unwrap();
        temp.write_all(&encoder.finish().unwrap()).unwrap();
        temp.flush().unwrap();

        let mut content = String::new();
        open_text(temp.path())
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello\nworld\n");
    }

    #[test]
    fn test_check_target_limit() {
        assert!(check_target_limit(0).is_none());
        assert!(check_target_limit(MAX_TARGETS).is_some());
    }
}
