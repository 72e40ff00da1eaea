//! Reads a popularity table from a file or stdin into owned entries.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use dedup_gen::PopularityEntry;

use crate::error::Result;

/// Opens `path` for buffered reading, or wraps stdin when `path` is `None`.
pub fn open_reader(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(p) => Ok(Box::new(BufReader::new(File::open(p)?))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Reads every non-skipped line of a popularity table into memory.
///
/// The generator itself only needs an `IntoIterator<Item = PopularityEntry>`,
/// so a `Vec` here is the simplest adapter between the line-oriented text
/// format and the generator's entry sequence.
pub fn read_all(reader: impl BufRead) -> Result<Vec<PopularityEntry>> {
    let mut entries = Vec::new();
    for parsed in dedup_gen::parse_popularity_table(reader) {
        if let Some(entry) = parsed? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dedup_codec::Hash160;

    #[test]
    fn reads_and_skips_per_the_dash_rule() {
        let hash = "c".repeat(40);
        let table = format!("{hash}  5  10\n{hash}  -1  10\n");
        let entries = read_all(table.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hash, Hash160::from_be_bytes([0xcc; 20]));
        assert_eq!(entries[0].count, 5);
    }

    #[test]
    fn propagates_malformed_lines_as_errors() {
        let err = read_all("deadbeef 10 20\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }
}
