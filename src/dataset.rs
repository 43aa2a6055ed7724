//! Dataset I/O.
//!
//! Experiment datasets are line-delimited JSON with the columns `Question`,
//! `Domain`, `Subject`, `Code_Answer`, `Text_Answer`. Any other columns pass
//! through untouched. Batch runners rewrite the output file after every row
//! so a crash preserves prior progress, and record per-cell failures in an
//! append-only `{row}-{column}` error log.

use crate::error::{Error, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Code_Answer")]
    pub code_answer: String,
    #[serde(rename = "Text_Answer")]
    pub text_answer: String,
    /// Columns this harness does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A row augmented with an experiment's outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: Record,
    #[serde(rename = "Results")]
    pub results: String,
    #[serde(rename = "Evaluation")]
    pub evaluation: String,
}

/// The columns the translate runner rewrites, addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Question,
    Domain,
    Subject,
    CodeAnswer,
    TextAnswer,
}

impl Column {
    /// The column's name as it appears in the dataset files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "Question",
            Self::Domain => "Domain",
            Self::Subject => "Subject",
            Self::CodeAnswer => "Code_Answer",
            Self::TextAnswer => "Text_Answer",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Record {
    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::Question => &self.question,
            Column::Domain => &self.domain,
            Column::Subject => &self.subject,
            Column::CodeAnswer => &self.code_answer,
            Column::TextAnswer => &self.text_answer,
        }
    }

    pub fn set(&mut self, column: Column, value: String) {
        match column {
            Column::Question => self.question = value,
            Column::Domain => self.domain = value,
            Column::Subject => self.subject = value,
            Column::CodeAnswer => self.code_answer = value,
            Column::TextAnswer => self.text_answer = value,
        }
    }
}

/// Load a JSONL dataset. A missing required column fails here, naming the
/// column and the offending line.
pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open dataset {}", path.display()))
        .map_err(Error::config)?;

    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line
            .with_context(|| format!("failed to read dataset {}", path.display()))
            .map_err(Error::config)?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line)
            .with_context(|| format!("invalid record on line {} of {}", number + 1, path.display()))
            .map_err(Error::config)?;
        records.push(record);
    }
    Ok(records)
}

/// Write rows as JSONL, replacing the file.
pub fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))
        .map_err(Error::config)?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)
            .context("failed to serialize record")
            .map_err(Error::config)?;
        writer.write_all(b"\n").map_err(Error::config)?;
    }
    writer.flush().map_err(Error::config)?;
    Ok(())
}

/// Append-only log of failed cells, one `{row}-{column}` line each.
pub struct ErrorLog {
    file: File,
}

impl ErrorLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open error log {}", path.display()))
            .map_err(Error::config)?;
        Ok(Self { file })
    }

    pub fn record(&mut self, row: usize, column: &str) -> Result<()> {
        writeln!(self.file, "{row}-{column}").map_err(Error::config)?;
        self.file.flush().map_err(Error::config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(n: usize) -> Record {
        Record {
            question: format!("question {n}"),
            domain: "Cyber Security".to_string(),
            subject: format!("subject {n}"),
            code_answer: format!("code {n}"),
            text_answer: format!("text {n}"),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");

        let records = vec![sample_record(1), sample_record(2)];
        write_jsonl(&path, &records).unwrap();

        let loaded = load_jsonl(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_extra_columns_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");

        std::fs::write(
            &path,
            concat!(
                r#"{"Question":"q","Domain":"d","Subject":"s","Code_Answer":"c","Text_Answer":"t","#,
                r#""Index":7}"#,
                "\n"
            ),
        )
        .unwrap();

        let loaded = load_jsonl(&path).unwrap();
        assert_eq!(loaded[0].extra["Index"], 7);

        write_jsonl(&path, &loaded).unwrap();
        let line = std::fs::read_to_string(&path).unwrap();
        assert!(line.contains(r#""Index":7"#));
    }

    #[test]
    fn test_missing_column_names_the_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");

        std::fs::write(&path, "{\"Question\":\"q\"}\n").unwrap();

        let err = load_jsonl(&path).unwrap_err();
        let mut messages = Vec::new();
        let mut current: Option<&dyn std::error::Error> = Some(&err);
        while let Some(e) = current {
            messages.push(e.to_string());
            current = e.source();
        }
        let text = messages.join("; ");
        assert!(text.contains("line 1"), "unexpected error: {text}");
        assert!(text.contains("Domain"), "unexpected error: {text}");
    }

    #[test]
    fn test_column_get_set() {
        let mut record = sample_record(1);
        assert_eq!(record.get(Column::Question), "question 1");

        record.set(Column::CodeAnswer, "translated".to_string());
        assert_eq!(record.code_answer, "translated");
    }

    #[test]
    fn test_error_log_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");

        let mut log = ErrorLog::open(&path).unwrap();
        log.record(1, "Question").unwrap();
        log.record(2, "Code_Answer").unwrap();
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1-Question\n2-Code_Answer\n");
    }
}
