//! Row Emitter
//!
//! CSV assembly for report files: every field is double-quoted with embedded
//! quotes doubled, the header is written exactly once, and a row's field
//! count must equal the header's column count.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Escape one CSV field: always quoted, embedded quotes doubled
pub fn escape_csv(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Build one CSV line from pre-rendered fields
pub fn build_csv_row(fields: &[String]) -> String {
    let mut row = fields
        .iter()
        .map(|f| escape_csv(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

/// One open report file with its column contract
pub struct CsvFile {
    writer: BufWriter<File>,
    path: PathBuf,
    columns: usize,
}

impl CsvFile {
    /// Create the file and write the header row
    pub fn create(path: &Path, headers: &[String]) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(build_csv_row(headers).as_bytes())
            .context("Failed to write report header")?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            columns: headers.len(),
        })
    }

    /// Write one row; the field count must match the header
    pub fn write_row(&mut self, fields: &[String]) -> Result<()> {
        anyhow::ensure!(
            fields.len() == self.columns,
            "Row has {} fields but the header declares {} columns",
            fields.len(),
            self.columns
        );
        self.writer
            .write_all(build_csv_row(fields).as_bytes())
            .with_context(|| format!("Failed to write row to {}", self.path.display()))
    }

    /// Flush and close, returning the file path
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain_field() {
        assert_eq!(escape_csv("vm-1"), "\"vm-1\"");
    }

    #[test]
    fn test_escape_embedded_quote_and_delimiter() {
        assert_eq!(escape_csv("a\"b"), "\"a\"\"b\"");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
    }

    #[test]
    fn test_build_row_joins_and_terminates() {
        let row = build_csv_row(&["a".to_string(), "b,c".to_string()]);
        assert_eq!(row, "\"a\",\"b,c\"\n");
    }

    #[test]
    fn test_csv_file_rejects_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let headers = vec!["A".to_string(), "B".to_string()];
        let mut file = CsvFile::create(&path, &headers).unwrap();

        assert!(file.write_row(&["only-one".to_string()]).is_err());
        assert!(file
            .write_row(&["one".to_string(), "two".to_string()])
            .is_ok());

        let written = file.finish().unwrap();
        let content = std::fs::read_to_string(written).unwrap();
        assert_eq!(content, "\"A\",\"B\"\n\"one\",\"two\"\n");
    }
}
