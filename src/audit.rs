//! Audit trail of committed edits.

use crate::error::{ProofError, Result};
use crate::style::Highlight;
use serde::Serialize;
use std::io::Write;

/// One committed span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Container entry the paragraph lives in, e.g. `word/document.xml`.
    pub part: String,
    /// Zero-based paragraph index within the part.
    pub paragraph: usize,
    pub rule: String,
    /// Text the rule matched.
    pub original: String,
    pub replacement: String,
    pub highlight: Highlight,
    /// Full text of the run the span starts in.
    pub segment_text: String,
    /// Text of the matching window the span was found in.
    pub window_text: String,
}

/// Append-only destination for audit records, written in commit order.
pub trait AuditSink {
    fn record(&mut self, record: &AuditRecord) -> Result<()>;

    /// Flush buffered output. Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Human-readable block log.
pub struct TextAuditLog<W: Write> {
    out: W,
}

impl<W: Write> TextAuditLog<W> {
    /// Start a log, writing a timestamped header line.
    pub fn create(mut out: W) -> Result<Self> {
        writeln!(
            out,
            "# proofmark audit log, {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        Ok(Self { out })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> AuditSink for TextAuditLog<W> {
    fn record(&mut self, r: &AuditRecord) -> Result<()> {
        writeln!(self.out, "Part: {} (paragraph {})", r.part, r.paragraph + 1)?;
        writeln!(self.out, "Matched Rule: {}", r.rule)?;
        writeln!(self.out, "Original Text: {}", r.segment_text)?;
        writeln!(self.out, "Combined Text: {}", r.window_text)?;
        writeln!(self.out, "Original Text (Matched Part): {}", r.original)?;
        writeln!(self.out, "Replaced Text: {}", r.replacement)?;
        writeln!(self.out, "Highlight: {}", r.highlight)?;
        writeln!(self.out, "{}", "-".repeat(40))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// One CSV row per record, with a header row.
pub struct CsvAuditLog<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvAuditLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| ProofError::Io(e.into_error()))
    }
}

impl<W: Write> AuditSink for CsvAuditLog<W> {
    fn record(&mut self, record: &AuditRecord) -> Result<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    pub records: Vec<AuditRecord>,
}

impl AuditSink for MemoryAudit {
    fn record(&mut self, record: &AuditRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuditRecord {
        AuditRecord {
            part: "word/document.xml".to_string(),
            paragraph: 0,
            rule: "全角数字を半角数字に変換".to_string(),
            original: "１".to_string(),
            replacement: "1".to_string(),
            highlight: Highlight::Green,
            segment_text: "第１条".to_string(),
            window_text: "第１条".to_string(),
        }
    }

    #[test]
    fn test_text_log_format() {
        let mut log = TextAuditLog::create(Vec::new()).unwrap();
        log.record(&sample()).unwrap();
        log.finish().unwrap();
        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("# proofmark audit log, "));
        assert_eq!(lines[1], "Part: word/document.xml (paragraph 1)");
        assert_eq!(lines[2], "Matched Rule: 全角数字を半角数字に変換");
        assert_eq!(lines[5], "Original Text (Matched Part): １");
        assert_eq!(lines[6], "Replaced Text: 1");
        assert_eq!(lines[7], "Highlight: green");
        assert_eq!(lines[8], "-".repeat(40));
    }

    #[test]
    fn test_csv_log() {
        let mut buf = Vec::new();
        {
            let mut log = CsvAuditLog::new(&mut buf);
            log.record(&sample()).unwrap();
            log.finish().unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "part,paragraph,rule,original,replacement,highlight,segment_text,window_text"
        );
        assert_eq!(
            lines.next().unwrap(),
            "word/document.xml,0,全角数字を半角数字に変換,１,1,green,第１条,第１条"
        );
    }
}
