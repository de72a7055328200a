//! Debug metadata: source file ids and deferred `.DEBUG-*` records.

use super::sanitize::quote_string;
use super::INDENT;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

/// A region of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub file: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceSpan {
    pub fn new(
        file: impl Into<String>,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// A span covering a single position.
    pub fn point(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self::new(file, line, column, line, column)
    }
}

/// Assigns file ids and collects records that are written with the data
/// segment.
#[derive(Debug, Default)]
pub struct DebugFileBuilder {
    files: Vec<String>,
    file_ids: HashMap<String, u32>,
    stored_lines: Vec<String>,
}

impl DebugFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `path`, assigning the next one (from 1) on first sight.
    pub fn file_id(&mut self, path: &str) -> u32 {
        if let Some(&id) = self.file_ids.get(path) {
            return id;
        }
        self.files.push(path.to_string());
        let id = self.files.len() as u32;
        self.file_ids.insert(path.to_string(), id);
        id
    }

    /// `.DEBUG-LINE` for the start of `span`.
    pub fn line_record(&mut self, span: &SourceSpan) -> String {
        let file = self.file_id(&span.file);
        format!(".DEBUG-LINE {},{},{}", file, span.start_line, span.start_column)
    }

    pub fn mark_object(&mut self, object: &str, name: &str, span: &SourceSpan) {
        let file = self.file_id(&span.file);
        self.stored_lines.push(format!(
            ".DEBUG-OBJECT {},{},{},{},{},{},{},{}",
            object,
            quote_string(name),
            file,
            span.start_line,
            span.start_column,
            file,
            span.end_line,
            span.end_column
        ));
    }

    pub fn mark_action(&mut self, action: &str, name: &str) {
        self.stored_lines
            .push(format!(".DEBUG-ACTION {},{}", action, quote_string(name)));
    }

    pub fn map(&mut self, key: &str, value: &str) {
        self.stored_lines.push(format!(
            ".DEBUG-MAP {}={}",
            quote_string(key),
            quote_string(value)
        ));
    }

    /// Store a preformatted record.
    pub fn store_line(&mut self, line: impl Into<String>) {
        self.stored_lines.push(line.into());
    }

    pub fn stored_lines(&self) -> &[String] {
        &self.stored_lines
    }

    /// `(id, path)` in id order.
    pub fn files(&self) -> impl Iterator<Item = (u32, &str)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, path)| (i as u32 + 1, path.as_str()))
    }

    pub(crate) fn write_files(&self, out: &mut String) {
        for (id, path) in self.files() {
            let base = Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string());
            let _ = writeln!(
                out,
                "{}.DEBUG-FILE {},{},{}",
                INDENT,
                id,
                quote_string(&base),
                quote_string(path)
            );
        }
    }

    pub(crate) fn write_stored_lines(&self, out: &mut String) {
        for line in &self.stored_lines {
            let _ = writeln!(out, "{}{}", INDENT, line);
        }
    }
}
