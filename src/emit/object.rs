//! Objects and the numbered entities they refer to: properties, flags,
//! and globals.

use super::error::{EmitError, EmitResult};
use super::operand::{Operand, VarScope};
use super::sanitize::quote_string;
use super::table::TableBuilder;
use super::INDENT;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Index of an object in the module's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

impl ObjectId {
    /// Object number as seen by the game (1-based).
    pub fn number(self) -> u16 {
        self.0 as u16 + 1
    }
}

/// A property handle. Carries the property number so objects can be
/// given values without looking the property up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId {
    pub(crate) index: usize,
    pub(crate) number: u16,
}

impl PropertyId {
    pub fn number(self) -> u16 {
        self.number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagId {
    pub(crate) index: usize,
    pub(crate) number: u16,
}

impl FlagId {
    pub fn number(self) -> u16 {
        self.number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct PropertyBuilder {
    name: String,
    symbol: String,
    number: u16,
    /// Value reported for objects that lack the property.
    pub default_value: Option<Operand>,
}

impl PropertyBuilder {
    pub(crate) fn new(name: String, number: u16) -> Self {
        Self {
            symbol: format!("P?{}", name),
            name,
            number,
            default_value: None,
        }
    }

    /// Sanitized name without the `P?` prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn operand(&self) -> Operand {
        Operand::symbol(self.symbol.clone())
    }
}

#[derive(Debug, Clone)]
pub struct FlagBuilder {
    name: String,
    number: u16,
}

impl FlagBuilder {
    pub(crate) fn new(name: String, number: u16) -> Self {
        Self { name, number }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn operand(&self) -> Operand {
        Operand::symbol(self.name.clone())
    }
}

#[derive(Debug, Clone)]
pub struct GlobalBuilder {
    name: String,
    pub default_value: Option<Operand>,
}

impl GlobalBuilder {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            default_value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operand(&self) -> Operand {
        Operand::variable(self.name.clone(), VarScope::Global)
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        match &self.default_value {
            Some(value) => {
                let _ = writeln!(out, "{}.GVAR {}={}", INDENT, self.name, value);
            }
            None => {
                let _ = writeln!(out, "{}.GVAR {}", INDENT, self.name);
            }
        }
    }
}

#[derive(Debug, Clone)]
enum PropertyValue {
    Byte(Operand),
    Word(Operand),
    Table(TableBuilder),
}

#[derive(Debug, Clone)]
struct PropertyEntry {
    number: u16,
    value: PropertyValue,
}

/// One node of the object tree. Tree links are arena indices, so they can be
/// rewired freely before the module is finished.
#[derive(Debug, Clone)]
pub struct ObjectBuilder {
    id: ObjectId,
    symbolic_name: String,
    pub descriptive_name: Option<String>,
    pub parent: Option<ObjectId>,
    pub child: Option<ObjectId>,
    pub sibling: Option<ObjectId>,
    properties: Vec<PropertyEntry>,
    flags: BTreeSet<u16>,
}

impl ObjectBuilder {
    pub(crate) fn new(id: ObjectId, symbolic_name: String) -> Self {
        Self {
            id,
            symbolic_name,
            descriptive_name: None,
            parent: None,
            child: None,
            sibling: None,
            properties: Vec::new(),
            flags: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn number(&self) -> u16 {
        self.id.number()
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    pub fn operand(&self) -> Operand {
        Operand::symbol(self.symbolic_name.clone())
    }

    fn property_table_symbol(&self) -> String {
        format!("?PTBL?{}", self.symbolic_name)
    }

    fn add_property(&mut self, prop: PropertyId, value: PropertyValue) -> EmitResult<()> {
        if self.properties.iter().any(|p| p.number == prop.number) {
            return Err(EmitError::InvalidOperation(format!(
                "object {} already has property {}",
                self.symbolic_name, prop.number
            )));
        }
        self.properties.push(PropertyEntry {
            number: prop.number,
            value,
        });
        Ok(())
    }

    pub fn add_byte_property(&mut self, prop: PropertyId, value: Operand) -> EmitResult<()> {
        self.add_property(prop, PropertyValue::Byte(value))
    }

    pub fn add_word_property(&mut self, prop: PropertyId, value: Operand) -> EmitResult<()> {
        self.add_property(prop, PropertyValue::Word(value))
    }

    /// Add a table-valued property and return the table to fill in.
    pub fn add_complex_property(&mut self, prop: PropertyId) -> EmitResult<&mut TableBuilder> {
        let name = format!("{}?{}", self.property_table_symbol(), prop.number);
        self.add_property(prop, PropertyValue::Table(TableBuilder::new(name, true)))?;
        match self.properties.last_mut().map(|p| &mut p.value) {
            Some(PropertyValue::Table(table)) => Ok(table),
            _ => Err(EmitError::Internal("complex property was not recorded".to_string())),
        }
    }

    pub fn set_flag(&mut self, flag: FlagId) {
        self.flags.insert(flag.number);
    }

    pub fn clear_flag(&mut self, flag: FlagId) {
        self.flags.remove(&flag.number);
    }

    pub fn has_flag(&self, flag: FlagId) -> bool {
        self.flags.contains(&flag.number)
    }

    /// Flag bitmask words. Flag 0 is the high bit of the first word.
    pub(crate) fn flag_words(&self, word_count: usize) -> Vec<u16> {
        let mut words = vec![0u16; word_count];
        for &flag in &self.flags {
            let index = flag as usize / 16;
            if let Some(word) = words.get_mut(index) {
                *word |= 0x8000 >> (flag % 16);
            }
        }
        words
    }

    /// The `.OBJECT` record. `name_of` renders a linked object or `0`.
    pub(crate) fn write_record<F>(&self, out: &mut String, flag_words: usize, name_of: F)
    where
        F: Fn(Option<ObjectId>) -> String,
    {
        let flags: Vec<String> = self
            .flag_words(flag_words)
            .iter()
            .map(|w| w.to_string())
            .collect();
        let _ = writeln!(
            out,
            "{}.OBJECT {},{},{},{},{},{}",
            INDENT,
            self.symbolic_name,
            flags.join(","),
            name_of(self.parent),
            name_of(self.sibling),
            name_of(self.child),
            self.property_table_symbol()
        );
    }

    /// The property table: short name, properties by descending number,
    /// terminator.
    pub(crate) fn write_property_table(
        &self,
        out: &mut String,
        max_length: usize,
    ) -> EmitResult<()> {
        let _ = writeln!(out, "{}::", self.property_table_symbol());
        match &self.descriptive_name {
            Some(desc) => {
                let _ = writeln!(out, "{}.STRL {}", INDENT, quote_string(desc));
            }
            None => {
                let _ = writeln!(out, "{}.BYTE 0", INDENT);
            }
        }

        let mut entries: Vec<&PropertyEntry> = self.properties.iter().collect();
        entries.sort_by(|a, b| b.number.cmp(&a.number));

        for entry in entries {
            match &entry.value {
                PropertyValue::Byte(value) => {
                    let _ = writeln!(out, "{}.PROP 1,{}", INDENT, entry.number);
                    let _ = writeln!(out, "{}.BYTE {}", INDENT, value);
                }
                PropertyValue::Word(value) => {
                    let _ = writeln!(out, "{}.PROP 2,{}", INDENT, entry.number);
                    let _ = writeln!(out, "{}.WORD {}", INDENT, value);
                }
                PropertyValue::Table(table) => {
                    let size = table.size();
                    if size == 0 || size > max_length {
                        return Err(EmitError::InvalidOperation(format!(
                            "property {} of {} is {} bytes long (allowed 1-{})",
                            entry.number, self.symbolic_name, size, max_length
                        )));
                    }
                    let _ = writeln!(out, "{}.PROP {},{}", INDENT, size, entry.number);
                    table.write_entries(out);
                }
            }
        }

        let _ = writeln!(out, "{}.BYTE 0", INDENT);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(number: u16) -> PropertyId {
        PropertyId { index: 0, number }
    }

    fn flag(number: u16) -> FlagId {
        FlagId { index: 0, number }
    }

    #[test]
    fn test_flag_words() {
        let mut obj = ObjectBuilder::new(ObjectId(0), "LAMP".into());
        obj.set_flag(flag(0));
        obj.set_flag(flag(15));
        obj.set_flag(flag(31));
        obj.set_flag(flag(47));
        assert_eq!(obj.flag_words(2), vec![0x8001, 0x0001]);
        assert_eq!(obj.flag_words(3), vec![0x8001, 0x0001, 0x0001]);
        obj.clear_flag(flag(0));
        assert!(!obj.has_flag(flag(0)));
        assert_eq!(obj.flag_words(2)[0], 0x0001);
    }

    #[test]
    fn test_record() {
        let mut obj = ObjectBuilder::new(ObjectId(1), "LAMP".into());
        obj.parent = Some(ObjectId(0));
        obj.set_flag(flag(1));
        let mut out = String::new();
        obj.write_record(&mut out, 2, |id| match id {
            Some(ObjectId(0)) => "ROOM".to_string(),
            Some(other) => format!("OBJ{}", other.0),
            None => "0".to_string(),
        });
        assert_eq!(out, "\t.OBJECT LAMP,16384,0,ROOM,0,0,?PTBL?LAMP\n");
        assert_eq!(obj.number(), 2);
    }

    #[test]
    fn test_property_table_descending() {
        let mut obj = ObjectBuilder::new(ObjectId(0), "LAMP".into());
        obj.descriptive_name = Some("brass \"lamp\"".into());
        obj.add_byte_property(prop(5), Operand::numeric(1)).unwrap();
        obj.add_word_property(prop(30), Operand::symbol("ROOM")).unwrap();
        let table = obj.add_complex_property(prop(12)).unwrap();
        table.add_short(1);
        table.add_short(2);

        let mut out = String::new();
        obj.write_property_table(&mut out, 8).unwrap();
        assert_eq!(
            out,
            "?PTBL?LAMP::\n\t.STRL \"brass \"\"lamp\"\"\"\n\
             \t.PROP 2,30\n\t.WORD ROOM\n\
             \t.PROP 4,12\n\t.WORD 1,2\n\
             \t.PROP 1,5\n\t.BYTE 1\n\
             \t.BYTE 0\n"
        );
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let mut obj = ObjectBuilder::new(ObjectId(0), "LAMP".into());
        obj.add_byte_property(prop(5), Operand::numeric(1)).unwrap();
        assert!(matches!(
            obj.add_word_property(prop(5), Operand::numeric(2)),
            Err(EmitError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_oversized_property_rejected() {
        let mut obj = ObjectBuilder::new(ObjectId(0), "LAMP".into());
        let table = obj.add_complex_property(prop(9)).unwrap();
        for _ in 0..5 {
            table.add_short(0);
        }
        let mut out = String::new();
        assert!(obj.write_property_table(&mut out, 8).is_err());
        assert!(obj.write_property_table(&mut out, 64).is_ok());
    }

    #[test]
    fn test_global_rendering() {
        let mut global = GlobalBuilder::new("SCORE".into());
        let mut out = String::new();
        global.write_to(&mut out);
        global.default_value = Some(Operand::numeric(10));
        global.write_to(&mut out);
        assert_eq!(out, "\t.GVAR SCORE\n\t.GVAR SCORE=10\n");
        assert!(global.operand().is_variable());
    }
}
