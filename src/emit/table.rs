//! User tables and vocabulary words.

use super::operand::Operand;
use super::sanitize::quote_string;
use super::INDENT;
use std::fmt::Write as _;
use std::ops::{Deref, DerefMut};

/// Entries per `.BYTE`/`.WORD` directive.
const RUN_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
enum TableEntry {
    Byte(u8),
    ByteOperand(Operand),
    Word(i16),
    WordOperand(Operand),
}

impl TableEntry {
    fn size(&self) -> usize {
        match self {
            TableEntry::Byte(_) | TableEntry::ByteOperand(_) => 1,
            TableEntry::Word(_) | TableEntry::WordOperand(_) => 2,
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            TableEntry::Byte(_) | TableEntry::ByteOperand(_) => ".BYTE",
            TableEntry::Word(_) | TableEntry::WordOperand(_) => ".WORD",
        }
    }

    fn is_literal(&self) -> bool {
        matches!(self, TableEntry::Byte(_) | TableEntry::Word(_))
    }

    fn render(&self) -> String {
        match self {
            TableEntry::Byte(b) => b.to_string(),
            TableEntry::Word(w) => w.to_string(),
            TableEntry::ByteOperand(op) | TableEntry::WordOperand(op) => op.to_string(),
        }
    }
}

/// An ordered run of bytes and words.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBuilder {
    name: String,
    pure: bool,
    entries: Vec<TableEntry>,
    size: usize,
}

impl TableBuilder {
    pub(crate) fn new(name: impl Into<String>, pure: bool) -> Self {
        Self {
            name: name.into(),
            pure,
            entries: Vec::new(),
            size: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    pub fn operand(&self) -> Operand {
        Operand::symbol(self.name.clone())
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: TableEntry) {
        self.size += entry.size();
        self.entries.push(entry);
    }

    pub fn add_byte(&mut self, value: u8) {
        self.push(TableEntry::Byte(value));
    }

    pub fn add_byte_operand(&mut self, value: Operand) {
        self.push(TableEntry::ByteOperand(value));
    }

    pub fn add_short(&mut self, value: i16) {
        self.push(TableEntry::Word(value));
    }

    pub fn add_short_operand(&mut self, value: Operand) {
        self.push(TableEntry::WordOperand(value));
    }

    /// Write the entries without a label, grouped into directive runs.
    pub(crate) fn write_entries(&self, out: &mut String) {
        let mut run: Vec<String> = Vec::new();
        let mut current: Option<&TableEntry> = None;

        for entry in &self.entries {
            let breaks = match current {
                Some(prev) => {
                    prev.directive() != entry.directive()
                        || prev.is_literal() != entry.is_literal()
                        || run.len() == RUN_LIMIT
                }
                None => false,
            };
            if breaks {
                if let Some(prev) = current {
                    let _ = writeln!(out, "{}{} {}", INDENT, prev.directive(), run.join(","));
                }
                run.clear();
            }
            run.push(entry.render());
            current = Some(entry);
        }
        if let Some(prev) = current {
            let _ = writeln!(out, "{}{} {}", INDENT, prev.directive(), run.join(","));
        }
    }

    /// Write the table with its global label.
    pub(crate) fn write_to(&self, out: &mut String) {
        let _ = writeln!(out, "{}::", self.name);
        self.write_entries(out);
    }
}

/// A vocabulary word: the dictionary text plus the table of data that
/// follows it in the dictionary entry.
#[derive(Debug, Clone, PartialEq)]
pub struct WordBuilder {
    table: TableBuilder,
    word: String,
}

impl WordBuilder {
    pub(crate) fn new(symbol: String, word: String) -> Self {
        Self {
            table: TableBuilder::new(symbol, true),
            word,
        }
    }

    /// Dictionary text, lower case.
    pub fn word(&self) -> &str {
        &self.word
    }

    /// Write one dictionary entry padded to `entry_data_size` data bytes.
    pub(crate) fn write_entry(&self, out: &mut String, entry_data_size: usize) {
        let _ = writeln!(out, "{}::", self.table.name);
        let _ = writeln!(out, "{}.ZWORD {}", INDENT, quote_string(&self.word));
        self.table.write_entries(out);
        for _ in self.table.size()..entry_data_size {
            let _ = writeln!(out, "{}.BYTE 0", INDENT);
        }
    }
}

impl Deref for WordBuilder {
    type Target = TableBuilder;

    fn deref(&self) -> &TableBuilder {
        &self.table
    }
}

impl DerefMut for WordBuilder {
    fn deref_mut(&mut self) -> &mut TableBuilder {
        &mut self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_accounting() {
        let mut table = TableBuilder::new("TBL?0", false);
        table.add_byte(1);
        table.add_short(-2);
        table.add_byte_operand(Operand::numeric(3));
        table.add_short_operand(Operand::symbol("LAMP"));
        assert_eq!(table.size(), 6);
    }

    #[test]
    fn test_runs_break_on_width_and_kind() {
        let mut table = TableBuilder::new("TBL?0", false);
        table.add_byte(1);
        table.add_byte(2);
        table.add_byte_operand(Operand::symbol("X"));
        table.add_short(300);
        table.add_short(-1);
        let mut out = String::new();
        table.write_to(&mut out);
        assert_eq!(
            out,
            "TBL?0::\n\t.BYTE 1,2\n\t.BYTE X\n\t.WORD 300,-1\n"
        );
    }

    #[test]
    fn test_runs_break_every_ten() {
        let mut table = TableBuilder::new("T", true);
        for i in 0..12 {
            table.add_short(i);
        }
        let mut out = String::new();
        table.write_entries(&mut out);
        assert_eq!(
            out,
            "\t.WORD 0,1,2,3,4,5,6,7,8,9\n\t.WORD 10,11\n"
        );
    }

    #[test]
    fn test_empty_table() {
        let table = TableBuilder::new("T", true);
        let mut out = String::new();
        table.write_to(&mut out);
        assert_eq!(out, "T::\n");
    }

    #[test]
    fn test_word_entry_padding() {
        let mut word = WordBuilder::new("W?LAMP".into(), "lamp".into());
        word.add_byte(128);
        let mut out = String::new();
        word.write_entry(&mut out, 3);
        assert_eq!(
            out,
            "W?LAMP::\n\t.ZWORD \"lamp\"\n\t.BYTE 128\n\t.BYTE 0\n\t.BYTE 0\n"
        );
    }
}
