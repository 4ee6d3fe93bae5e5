//! Report export as CSV, JSON or JSON Lines.
//!
//! All three formats use the same six keys. CSV always starts with the
//! header row, even for an empty report.

use serde::Serialize;
use std::io::{self, Write};

use crate::batch::{BatchItemRecord, COLUMNS};
use crate::error::Result;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Single JSON object or array
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// A writer that serializes report records in one of the [`OutputFormat`]s.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects JSON.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
        }
    }

    /// Write all records in the configured format.
    pub fn write_records(&mut self, records: &[BatchItemRecord]) -> Result<()> {
        match self.format {
            OutputFormat::Csv => {
                let mut csv = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(&mut self.writer);
                csv.write_record(COLUMNS)?;
                for record in records {
                    csv.write_record(record.to_row())?;
                }
                csv.flush()?;
            }
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, records)?;
                } else {
                    serde_json::to_writer(&mut self.writer, records)?;
                }
                writeln!(self.writer)?;
            }
            OutputFormat::JsonLines => {
                for record in records {
                    self.write_line(record)?;
                }
            }
        }
        Ok(())
    }

    /// Write one item as a single JSON line.
    pub fn write_line<T: Serialize>(&mut self, item: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, item)?;
        writeln!(self.writer)?;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ItemStatus;

    fn records() -> Vec<BatchItemRecord> {
        vec![
            BatchItemRecord::success(
                "beach.jpg",
                "a dog, running on sand",
                &["running".to_string(), "sand".to_string()],
                "a dog, running on sand",
                Some(0.02),
            ),
            BatchItemRecord::error("broken.png", "Decode error"),
        ]
    }

    fn render(format: OutputFormat, records: &[BatchItemRecord]) -> String {
        let mut buffer = Vec::new();
        OutputWriter::new(&mut buffer, format, false)
            .write_records(records)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let output = render(OutputFormat::Csv, &records());
        let mut lines = output.lines();
        assert_eq!(
            lines.next().unwrap(),
            "File,Caption,Keywords,Meta Description,NSFW Score,Status"
        );
        assert_eq!(
            lines.next().unwrap(),
            "beach.jpg,\"a dog, running on sand\",\"running, sand\",\"a dog, running on sand\",2.0%,Success"
        );
        assert_eq!(lines.next().unwrap(), "broken.png,,,,N/A,Error: Decode error");
    }

    #[test]
    fn test_csv_empty_report_has_header() {
        let output = render(OutputFormat::Csv, &[]);
        assert_eq!(
            output.trim_end(),
            "File,Caption,Keywords,Meta Description,NSFW Score,Status"
        );
    }

    #[test]
    fn test_csv_round_trips_through_serde() {
        let output = render(OutputFormat::Csv, &records());
        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let parsed: Vec<BatchItemRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(parsed, records());
        assert_eq!(
            parsed[1].status(),
            &ItemStatus::Error("Decode error".to_string())
        );
    }

    #[test]
    fn test_json_array() {
        let output = render(OutputFormat::Json, &records());
        assert!(output.starts_with('['));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["Meta Description"], "a dog, running on sand");
        assert_eq!(value[1]["Status"], "Error: Decode error");
    }

    #[test]
    fn test_jsonl_one_object_per_line() {
        let output = render(OutputFormat::JsonLines, &records());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"File\":\"beach.jpg\""));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("CSV"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("jsonl"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("xlsx"), None);
    }
}
