//! Parser for the assembly list: one assembly path per line.
//!
//! Blank lines and lines starting with `#` are ignored. Paths are used as
//! written (relative paths resolve against the working directory).

use std::io::BufRead;
use std::path::Path;

use crate::core::assembly::AssemblyRecord;
use crate::parsing::ParseError;
use crate::utils::validation::{open_text, MAX_ASSEMBLIES};

/// Read the assembly list, assigning ordinals in list order
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::TooManyAssemblies` if the limit is exceeded.
pub fn parse_assembly_list(path: &Path) -> Result<Vec<AssemblyRecord>, ParseError> {
    let reader = open_text(path)?;
    parse_assembly_reader(reader)
}

/// Parse an assembly list from text
///
/// # Errors
///
/// Returns `ParseError::TooManyAssemblies` if the limit is exceeded.
pub fn parse_assembly_list_text(text: &str) -> Result<Vec<AssemblyRecord>, ParseError> {
    parse_assembly_reader(text.as_bytes())
}

fn parse_assembly_reader<R: BufRead>(reader: R) -> Result<Vec<AssemblyRecord>, ParseError> {
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }

        if records.len() >= MAX_ASSEMBLIES {
            return Err(ParseError::TooManyAssemblies(records.len()));
        }

        let ordinal = records.len();
        records.push(AssemblyRecord::new(entry, ordinal));
    }

    Ok(records)
}
