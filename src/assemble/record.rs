//! The wheel's file manifest (`RECORD`).
//!
//! One CSV row per archived file: path, `sha256=` digest in urlsafe
//! base64 without padding, and size in bytes. The manifest closes with
//! a digestless row naming itself.

use std::borrow::Cow;

use crate::util::hash::record_digest;

/// One manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub path: String,
    pub digest: String,
    pub size: u64,
}

/// Accumulates rows while archive entries are written; rendered last.
#[derive(Debug, Default)]
pub struct Record {
    entries: Vec<RecordEntry>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note one written file.
    pub fn push(&mut self, path: impl Into<String>, data: &[u8]) {
        self.entries.push(RecordEntry {
            path: path.into(),
            digest: format!("sha256={}", record_digest(data)),
            size: data.len() as u64,
        });
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    /// Render the manifest, closing with the self-referential row.
    pub fn render(&self, record_path: &str) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&csv_field(&entry.path));
            out.push(',');
            out.push_str(&entry.digest);
            out.push(',');
            out.push_str(&entry.size.to_string());
            out.push('\n');
        }
        out.push_str(&csv_field(record_path));
        out.push_str(",,\n");
        out
    }

    /// Parse a rendered manifest back into rows. The closing
    /// self-referential row comes back with an empty digest and size
    /// zero. Quoted fields are not handled; wheel paths do not need
    /// them.
    pub fn parse(text: &str) -> Vec<RecordEntry> {
        let mut out = Vec::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(3, ',');
            let path = fields.next().unwrap_or_default().to_string();
            let digest = fields.next().unwrap_or_default().to_string();
            let size = fields
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            out.push(RecordEntry { path, digest, size });
        }
        out
    }
}

fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_closes_with_self_row() {
        let mut record = Record::new();
        record.push("demo/__init__.py", b"x = 1\n");
        let text = record.render("demo-1.0.dist-info/RECORD");
        assert!(text.ends_with("demo-1.0.dist-info/RECORD,,\n"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_rows_carry_digest_and_size() {
        let mut record = Record::new();
        record.push("demo/data.bin", b"hello");
        let entry = &record.entries()[0];
        assert_eq!(
            entry.digest,
            "sha256=LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ"
        );
        assert_eq!(entry.size, 5);
    }

    #[test]
    fn test_round_trip() {
        let mut record = Record::new();
        record.push("demo/__init__.py", b"");
        record.push("demo/core.py", b"def f():\n    pass\n");
        let text = record.render("demo-1.0.dist-info/RECORD");

        let parsed = Record::parse(&text);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], record.entries()[0]);
        assert_eq!(parsed[1], record.entries()[1]);
        assert_eq!(parsed[2].path, "demo-1.0.dist-info/RECORD");
        assert_eq!(parsed[2].digest, "");
        assert_eq!(parsed[2].size, 0);
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain/path.py"), "plain/path.py");
        assert_eq!(csv_field("odd,name"), "\"odd,name\"");
    }
}
