//! The module builder: owns every definition of one story file and writes
//! the four ZAP segments when finished.

use super::debug::{DebugFileBuilder, SourceSpan};
use super::error::{EmitError, EmitResult};
use super::object::{
    FlagBuilder, FlagId, GlobalBuilder, GlobalId, ObjectBuilder, ObjectId, PropertyBuilder,
    PropertyId,
};
use super::operand::{Operand, OperandPool};
use super::routine::{RoutineBuilder, RoutineId};
use super::sanitize::{quote_string, sanitize_symbol};
use super::stream::{Segment, ZapStreamFactory};
use super::symbols::{SymbolKind, SymbolTable};
use super::table::{TableBuilder, WordBuilder};
use super::version::ZVersion;
use super::INDENT;
use std::fmt::Write as _;
use std::io::Write as _;

/// Globals that version 1-3 interpreters read for the status line, in the
/// slots they must occupy.
const STATUS_GLOBALS: [&str; 3] = ["HERE", "SCORE", "MOVES"];

/// Header symbols that default to 0 on versions with a header block.
const HEADER_SYMBOLS: [&str; 3] = ["RELEASEID", "FLAGS", "FLAGS2"];

const MAX_GLOBALS: usize = 240;

/// Entries in the frequent-words stub.
const FREQUENT_WORDS: usize = 96;

/// Word separators recorded in the vocabulary header: `.`, `,` and `"`.
const SEPARATORS: [u8; 3] = [b'.', b',', b'"'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordId(usize);

/// Builds one story file.
///
/// Handles returned by the `define_*` methods index into this builder; using
/// a handle from another builder panics.
pub struct ModuleBuilder {
    version: ZVersion,
    factory: Box<dyn ZapStreamFactory>,
    want_debug: bool,
    symbols: SymbolTable,
    pool: OperandPool,
    constants: Vec<(String, Operand)>,
    globals: Vec<GlobalBuilder>,
    tables: Vec<TableBuilder>,
    routines: Vec<RoutineBuilder>,
    /// Finished routine text, indexed like `routines`.
    bodies: Vec<String>,
    entry_point: Option<RoutineId>,
    objects: Vec<ObjectBuilder>,
    properties: Vec<PropertyBuilder>,
    flags: Vec<FlagBuilder>,
    words: Vec<WordBuilder>,
    debug: DebugFileBuilder,
}

impl std::fmt::Debug for ModuleBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleBuilder")
            .field("version", &self.version)
            .field("want_debug", &self.want_debug)
            .field("symbols", &self.symbols.len())
            .finish_non_exhaustive()
    }
}

impl ModuleBuilder {
    pub fn new(
        version: i32,
        factory: Box<dyn ZapStreamFactory>,
        want_debug_info: bool,
    ) -> EmitResult<Self> {
        let version = ZVersion::new(version)?;
        log::debug!("new module for version {}", version);
        Ok(Self {
            version,
            factory,
            want_debug: want_debug_info,
            symbols: SymbolTable::new(),
            pool: OperandPool::new(),
            constants: Vec::new(),
            globals: Vec::new(),
            tables: Vec::new(),
            routines: Vec::new(),
            bodies: Vec::new(),
            entry_point: None,
            objects: Vec::new(),
            properties: Vec::new(),
            flags: Vec::new(),
            words: Vec::new(),
            debug: DebugFileBuilder::new(),
        })
    }

    pub fn version(&self) -> ZVersion {
        self.version
    }

    pub fn max_property_length(&self) -> usize {
        self.version.max_property_length()
    }

    pub fn max_call_arguments(&self) -> usize {
        self.version.max_call_arguments()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// The debug registry, if debug information was requested.
    pub fn debug_file(&mut self) -> Option<&mut DebugFileBuilder> {
        if self.want_debug {
            Some(&mut self.debug)
        } else {
            None
        }
    }

    // ------------------------------------------------------------
    // Operands
    // ------------------------------------------------------------

    pub fn zero(&self) -> Operand {
        self.pool.zero()
    }

    pub fn one(&self) -> Operand {
        self.pool.one()
    }

    pub fn stack(&self) -> Operand {
        self.pool.stack()
    }

    pub fn make_number(&mut self, value: i32) -> Operand {
        self.pool.number(value)
    }

    pub fn make_string(&mut self, text: &str) -> Operand {
        self.pool.string(text)
    }

    // ------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------

    fn claim(&mut self, name: &str, kind: SymbolKind) -> EmitResult<String> {
        let name = sanitize_symbol(name);
        self.symbols.define(&name, kind)?;
        log::debug!("defined {:?} {}", kind, name);
        Ok(name)
    }

    pub fn define_constant(&mut self, name: &str, value: Operand) -> EmitResult<Operand> {
        let name = self.claim(name, SymbolKind::Constant)?;
        self.constants.push((name.clone(), value));
        Ok(Operand::symbol(name))
    }

    pub fn define_global(&mut self, name: &str) -> EmitResult<GlobalId> {
        if self.globals.len() >= MAX_GLOBALS {
            return Err(EmitError::InvalidOperation(format!(
                "too many globals (limit {})",
                MAX_GLOBALS
            )));
        }
        let name = self.claim(name, SymbolKind::Global)?;
        self.globals.push(GlobalBuilder::new(name));
        Ok(GlobalId(self.globals.len() - 1))
    }

    pub fn define_table(&mut self, pure: bool) -> EmitResult<TableId> {
        let name = format!("TBL?{}", self.tables.len());
        self.symbols.define(&name, SymbolKind::Table)?;
        self.tables.push(TableBuilder::new(name, pure));
        Ok(TableId(self.tables.len() - 1))
    }

    pub fn define_routine(
        &mut self,
        name: &str,
        entry_point: bool,
        cleanup_stack: bool,
    ) -> EmitResult<RoutineId> {
        if entry_point {
            if let Some(existing) = self.entry_point {
                return Err(EmitError::InvalidOperation(format!(
                    "entry point already defined as {}",
                    self.routines[existing.0].name()
                )));
            }
        }
        let name = self.claim(name, SymbolKind::Routine)?;
        let id = RoutineId(self.routines.len());
        self.routines.push(RoutineBuilder::new(
            name,
            self.version,
            entry_point,
            cleanup_stack,
            self.want_debug,
        ));
        self.bodies.push(String::new());
        if entry_point {
            self.entry_point = Some(id);
        }
        Ok(id)
    }

    pub fn define_object(&mut self, name: &str) -> EmitResult<ObjectId> {
        let limit = if self.version.number() < 4 { 255 } else { 65535 };
        if self.objects.len() >= limit {
            return Err(EmitError::InvalidOperation(format!(
                "too many objects for version {} (limit {})",
                self.version, limit
            )));
        }
        let name = self.claim(name, SymbolKind::Object)?;
        let id = ObjectId(self.objects.len());
        self.objects.push(ObjectBuilder::new(id, name));
        Ok(id)
    }

    /// Properties are numbered downward from the version's maximum.
    pub fn define_property(&mut self, name: &str) -> EmitResult<PropertyId> {
        let max = self.version.max_properties();
        let used = self.properties.len() as u16;
        if used >= max {
            return Err(EmitError::InvalidOperation(format!(
                "too many properties for version {} (limit {})",
                self.version, max
            )));
        }
        let name = sanitize_symbol(name);
        self.claim(&format!("P?{}", name), SymbolKind::Property)?;
        let number = max - used;
        self.properties.push(PropertyBuilder::new(name, number));
        Ok(PropertyId {
            index: self.properties.len() - 1,
            number,
        })
    }

    /// Flags are numbered downward from the version's maximum, ending at 0.
    pub fn define_flag(&mut self, name: &str) -> EmitResult<FlagId> {
        let max = self.version.max_flags();
        let used = self.flags.len() as u16;
        if used > max {
            return Err(EmitError::InvalidOperation(format!(
                "too many flags for version {} (limit {})",
                self.version,
                max + 1
            )));
        }
        let name = self.claim(name, SymbolKind::Flag)?;
        let number = max - used;
        self.flags.push(FlagBuilder::new(name, number));
        Ok(FlagId {
            index: self.flags.len() - 1,
            number,
        })
    }

    pub fn define_vocabulary_word(&mut self, word: &str) -> EmitResult<WordId> {
        let symbol = format!("W?{}", sanitize_symbol(&word.to_uppercase()));
        self.symbols.define(&symbol, SymbolKind::Word)?;
        log::debug!("defined vocabulary word {}", symbol);
        self.words.push(WordBuilder::new(symbol, word.to_lowercase()));
        Ok(WordId(self.words.len() - 1))
    }

    // ------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------

    pub fn global(&self, id: GlobalId) -> &GlobalBuilder {
        &self.globals[id.0]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut GlobalBuilder {
        &mut self.globals[id.0]
    }

    pub fn table(&self, id: TableId) -> &TableBuilder {
        &self.tables[id.0]
    }

    pub fn table_mut(&mut self, id: TableId) -> &mut TableBuilder {
        &mut self.tables[id.0]
    }

    pub fn routine(&self, id: RoutineId) -> &RoutineBuilder {
        &self.routines[id.0]
    }

    pub fn routine_mut(&mut self, id: RoutineId) -> &mut RoutineBuilder {
        &mut self.routines[id.0]
    }

    pub fn object(&self, id: ObjectId) -> &ObjectBuilder {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut ObjectBuilder {
        &mut self.objects[id.0]
    }

    pub fn property(&self, id: PropertyId) -> &PropertyBuilder {
        &self.properties[id.index]
    }

    pub fn property_mut(&mut self, id: PropertyId) -> &mut PropertyBuilder {
        &mut self.properties[id.index]
    }

    pub fn flag(&self, id: FlagId) -> &FlagBuilder {
        &self.flags[id.index]
    }

    pub fn word(&self, id: WordId) -> &WordBuilder {
        &self.words[id.0]
    }

    pub fn word_mut(&mut self, id: WordId) -> &mut WordBuilder {
        &mut self.words[id.0]
    }

    // ------------------------------------------------------------
    // Routines
    // ------------------------------------------------------------

    /// Attach a `.DEBUG-LINE` for `span` to the routine's next instruction.
    /// Does nothing when debug information is off.
    pub fn mark_sequence_point(&mut self, routine: RoutineId, span: &SourceSpan) -> EmitResult<()> {
        if !self.want_debug {
            return Ok(());
        }
        let record = self.debug.line_record(span);
        self.routines[routine.0].add_debug_line(record)
    }

    pub fn finish_routine(&mut self, id: RoutineId) -> EmitResult<()> {
        let debug = if self.want_debug {
            Some(&mut self.debug)
        } else {
            None
        };
        self.routines[id.0].finish(&mut self.bodies[id.0], debug)
    }

    // ------------------------------------------------------------
    // Finishing
    // ------------------------------------------------------------

    /// Write all four segments. Routines not finished yet are finished first.
    pub fn finish(mut self) -> EmitResult<()> {
        for index in 0..self.routines.len() {
            if !self.routines[index].is_finished() {
                self.finish_routine(RoutineId(index))?;
            }
        }
        if self.entry_point.is_none() {
            log::warn!("module has no entry point routine; START is undefined");
        }

        let main = self.main_segment();
        self.write_segment(Segment::Main, &main)?;

        let data = self.data_segment()?;
        self.write_segment(Segment::Data, &data)?;

        let strings = self.string_segment();
        self.write_segment(Segment::Strings, &strings)?;

        if self.factory.frequent_words_file_exists() {
            log::debug!(
                "keeping existing {}",
                self.factory.file_name(Segment::FrequentWords, true)
            );
        } else {
            let words = frequent_words_segment();
            self.write_segment(Segment::FrequentWords, &words)?;
        }
        Ok(())
    }

    fn write_segment(&mut self, segment: Segment, text: &str) -> EmitResult<()> {
        let mut stream = self.factory.create_stream(segment)?;
        stream.write_all(text.as_bytes())?;
        stream.flush()?;
        log::debug!(
            "wrote {} ({} bytes)",
            self.factory.file_name(segment, true),
            text.len()
        );
        Ok(())
    }

    fn main_segment(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}.NEW {}", INDENT, self.version);
        if self.version.has_header_block() {
            self.write_header(&mut out);
        }
        for segment in [Segment::FrequentWords, Segment::Data] {
            let _ = writeln!(
                out,
                "{}.INSERT {}",
                INDENT,
                quote_string(&self.factory.file_name(segment, false))
            );
        }
        for body in &self.bodies {
            out.push_str(body);
        }
        out.push('\n');
        let _ = writeln!(
            out,
            "{}.INSERT {}",
            INDENT,
            quote_string(&self.factory.file_name(Segment::Strings, false))
        );
        let _ = writeln!(out, "{}.END", INDENT);
        out
    }

    /// The 64-byte story header.
    fn write_header(&self, out: &mut String) {
        let _ = writeln!(out, "{}.BYTE {}", INDENT, self.version);
        let _ = writeln!(out, "{}.BYTE FLAGS", INDENT);
        for word in [
            "RELEASEID", "ENDLOD", "START", "VOCAB", "OBJECT", "GLOBAL", "IMPURE", "FLAGS2",
        ] {
            let _ = writeln!(out, "{}.WORD {}", INDENT, word);
        }
        // Serial number.
        let _ = writeln!(out, "{}.BYTE 0,0,0,0,0,0", INDENT);
        let _ = writeln!(out, "{}.WORD WORDS", INDENT);
        // Length and checksum, filled in by the assembler.
        let _ = writeln!(out, "{}.WORD 0,0", INDENT);
        let _ = writeln!(out, "{}.WORD {}", INDENT, vec!["0"; 17].join(","));
    }

    /// Globals in table order. Versions 1-3 need the status line globals
    /// first.
    fn ordered_globals(&self) -> Vec<&GlobalBuilder> {
        let mut ordered: Vec<&GlobalBuilder> = Vec::with_capacity(self.globals.len());
        if self.version.number() < 4 {
            for name in STATUS_GLOBALS {
                ordered.extend(self.globals.iter().find(|g| g.name() == name));
            }
            ordered.extend(
                self.globals
                    .iter()
                    .filter(|g| !STATUS_GLOBALS.contains(&g.name())),
            );
        } else {
            ordered.extend(self.globals.iter());
        }
        ordered
    }

    fn data_segment(&self) -> EmitResult<String> {
        let mut out = String::new();

        // Symbol assignments.
        if self.version.has_header_block() {
            for name in HEADER_SYMBOLS {
                if !self.symbols.contains(name) {
                    let _ = writeln!(out, "{}{}=0", INDENT, name);
                }
            }
        }
        let mut flags: Vec<&FlagBuilder> = self.flags.iter().collect();
        flags.sort_by_key(|f| f.number());
        for flag in flags {
            let _ = writeln!(out, "{}{}={}", INDENT, flag.name(), flag.number());
        }
        let mut properties: Vec<&PropertyBuilder> = self.properties.iter().collect();
        properties.sort_by_key(|p| p.number());
        for prop in properties {
            let _ = writeln!(out, "{}{}={}", INDENT, prop.symbol(), prop.number());
        }
        let mut constants: Vec<&(String, Operand)> = self.constants.iter().collect();
        constants.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in constants {
            let _ = writeln!(out, "{}{}={}", INDENT, name, value);
        }

        // Globals.
        let globals = self.ordered_globals();
        out.push_str("\nGLOBAL::\n");
        for global in &globals {
            global.write_to(&mut out);
        }

        // Objects.
        out.push_str("\nOBJECT::\n");
        for number in 1..=self.version.max_properties() {
            let default = self
                .properties
                .iter()
                .find(|p| p.number() == number)
                .and_then(|p| p.default_value.as_ref());
            match default {
                Some(value) => {
                    let _ = writeln!(out, "{}.WORD {}", INDENT, value);
                }
                None => {
                    let _ = writeln!(out, "{}.WORD 0", INDENT);
                }
            }
        }
        let name_of = |id: Option<ObjectId>| {
            id.and_then(|id| self.objects.get(id.0))
                .map(|o| o.symbolic_name().to_string())
                .unwrap_or_else(|| "0".to_string())
        };
        for object in &self.objects {
            object.write_record(&mut out, self.version.flag_words(), name_of);
        }
        for object in &self.objects {
            out.push('\n');
            object.write_property_table(&mut out, self.version.max_property_length())?;
        }

        // Impure tables.
        for table in self.tables.iter().filter(|t| !t.is_pure()) {
            out.push('\n');
            table.write_to(&mut out);
        }
        out.push_str("\nIMPURE::\n");

        // Vocabulary.
        let data_size = self.words.iter().map(|w| w.size()).max().unwrap_or(0);
        let entry_length = self.version.zword_bytes() + data_size;
        let mut words: Vec<&WordBuilder> = self.words.iter().collect();
        words.sort_by(|a, b| a.word().cmp(b.word()));
        out.push_str("\nVOCAB::\n");
        let separators: Vec<String> = SEPARATORS.iter().map(|b| b.to_string()).collect();
        let _ = writeln!(out, "{}.BYTE {}", INDENT, SEPARATORS.len());
        let _ = writeln!(out, "{}.BYTE {}", INDENT, separators.join(","));
        let _ = writeln!(out, "{}.BYTE {}", INDENT, entry_length);
        let _ = writeln!(out, "{}.WORD {}", INDENT, words.len());
        for word in words {
            word.write_entry(&mut out, data_size);
        }

        // Pure tables.
        for table in self.tables.iter().filter(|t| t.is_pure()) {
            out.push('\n');
            table.write_to(&mut out);
        }
        out.push_str("\nENDLOD::\n");

        if self.want_debug {
            out.push('\n');
            self.write_debug_records(&mut out, &globals);
        }
        Ok(out)
    }

    fn write_debug_records(&self, out: &mut String, globals: &[&GlobalBuilder]) {
        self.debug.write_files(out);

        let mut flags: Vec<&str> = self.flags.iter().map(|f| f.name()).collect();
        flags.sort_unstable();
        for name in flags {
            let _ = writeln!(out, "{}.DEBUG-ATTR {},{}", INDENT, name, quote_string(name));
        }

        let mut properties: Vec<&PropertyBuilder> = self.properties.iter().collect();
        properties.sort_by(|a, b| a.name().cmp(b.name()));
        for prop in properties {
            let _ = writeln!(
                out,
                "{}.DEBUG-PROP {},{}",
                INDENT,
                prop.symbol(),
                quote_string(prop.name())
            );
        }

        for global in globals {
            let _ = writeln!(
                out,
                "{}.DEBUG-GLOBAL {},{}",
                INDENT,
                global.name(),
                quote_string(global.name())
            );
        }

        let mut tables: Vec<&str> = self.tables.iter().map(|t| t.name()).collect();
        tables.sort_unstable();
        for name in tables {
            let _ = writeln!(out, "{}.DEBUG-ARRAY {},{}", INDENT, name, quote_string(name));
        }

        self.debug.write_stored_lines(out);
    }

    fn string_segment(&self) -> String {
        let mut out = String::new();
        for (text, operand) in self.pool.sorted_strings() {
            let _ = writeln!(out, "{}.GSTR {},{}", INDENT, operand, quote_string(text));
        }
        out
    }
}

fn frequent_words_segment() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}.FSTR FSTR?DUMMY,\"\"", INDENT);
    out.push_str("WORDS::\n");
    for _ in 0..FREQUENT_WORDS {
        let _ = writeln!(out, "{}FSTR?DUMMY", INDENT);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::stream::MemoryStreamFactory;

    fn module(version: i32) -> (ModuleBuilder, MemoryStreamFactory) {
        let factory = MemoryStreamFactory::new("game");
        let module = ModuleBuilder::new(version, Box::new(factory.clone()), false).unwrap();
        (module, factory)
    }

    #[test]
    fn test_unsupported_versions() {
        for version in [0, 9, -1] {
            let factory = MemoryStreamFactory::new("game");
            assert!(matches!(
                ModuleBuilder::new(version, Box::new(factory), false),
                Err(EmitError::UnsupportedVersion(v)) if v == version
            ));
        }
    }

    #[test]
    fn test_limits_by_version() {
        let (v3, _) = module(3);
        assert_eq!(v3.max_property_length(), 8);
        assert_eq!(v3.max_call_arguments(), 3);
        let (v4, _) = module(4);
        assert_eq!(v4.max_property_length(), 64);
        assert_eq!(v4.max_call_arguments(), 7);
    }

    #[test]
    fn test_descending_numbers_v3() {
        let (mut m, _) = module(3);
        let size = m.define_property("SIZE").unwrap();
        let capacity = m.define_property("CAPACITY").unwrap();
        assert_eq!((size.number(), capacity.number()), (31, 30));
        let light = m.define_flag("LIGHTBIT").unwrap();
        let open = m.define_flag("OPENBIT").unwrap();
        assert_eq!((light.number(), open.number()), (31, 30));
        assert_eq!(m.property(size).symbol(), "P?SIZE");
    }

    #[test]
    fn test_descending_numbers_v5() {
        let (mut m, _) = module(5);
        assert_eq!(m.define_property("SIZE").unwrap().number(), 63);
        assert_eq!(m.define_flag("LIGHTBIT").unwrap().number(), 47);
    }

    #[test]
    fn test_property_exhaustion() {
        let (mut m, _) = module(3);
        for i in 0..31 {
            m.define_property(&format!("P{}", i)).unwrap();
        }
        assert!(matches!(
            m.define_property("ONE-TOO-MANY"),
            Err(EmitError::InvalidOperation(_))
        ));
        for i in 0..32 {
            assert_eq!(m.define_flag(&format!("F{}", i)).unwrap().number(), 31 - i);
        }
        assert!(m.define_flag("EXTRA").is_err());
    }

    #[test]
    fn test_duplicate_routine() {
        let (mut m, _) = module(3);
        let first = m.define_routine("FOO", false, false).unwrap();
        assert!(matches!(
            m.define_routine("FOO", false, false),
            Err(EmitError::DuplicateSymbol(name)) if name == "FOO"
        ));
        assert_eq!(m.routine(first).name(), "FOO");
    }

    #[test]
    fn test_shared_namespace_uses_sanitized_names() {
        let (mut m, _) = module(3);
        m.define_object("LAMP").unwrap();
        assert!(m.define_global("LAMP").is_err());
        m.define_constant("A.B", m.one()).unwrap();
        assert!(m.define_constant("A.B", m.zero()).is_err());
        assert_eq!(m.symbols().kind_of("A$002eB"), Some(SymbolKind::Constant));
    }

    #[test]
    fn test_single_entry_point() {
        let (mut m, _) = module(3);
        m.define_routine("GO", true, false).unwrap();
        assert!(matches!(
            m.define_routine("GO2", true, false),
            Err(EmitError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_pooled_operands() {
        let (mut m, _) = module(3);
        let a = m.make_number(5);
        let b = m.make_number(5);
        assert!(Operand::same(&a, &b));
        assert!(Operand::same(&m.make_number(0), &m.zero()));
        assert!(Operand::same(&m.make_number(1), &m.one()));
        let s = m.make_string("abc");
        assert!(Operand::same(&s, &m.make_string("abc")));
    }

    #[test]
    fn test_vocabulary_symbols() {
        let (mut m, _) = module(3);
        let word = m.define_vocabulary_word("Lamp").unwrap();
        assert_eq!(m.word(word).name(), "W?LAMP");
        assert_eq!(m.word(word).word(), "lamp");
        assert!(m.define_vocabulary_word("LAMP").is_err());
    }

    #[test]
    fn test_global_reorder_v3() {
        let (mut m, _) = module(3);
        for name in ["FOO", "MOVES", "SCORE", "HERE"] {
            m.define_global(name).unwrap();
        }
        let order: Vec<&str> = m.ordered_globals().iter().map(|g| g.name()).collect();
        assert_eq!(order, vec!["HERE", "SCORE", "MOVES", "FOO"]);
    }

    #[test]
    fn test_no_reorder_v4() {
        let (mut m, _) = module(4);
        for name in ["FOO", "MOVES", "HERE"] {
            m.define_global(name).unwrap();
        }
        let order: Vec<&str> = m.ordered_globals().iter().map(|g| g.name()).collect();
        assert_eq!(order, vec!["FOO", "MOVES", "HERE"]);
    }

    #[test]
    fn test_header_block_only_after_v4() {
        let (m4, _) = module(4);
        assert!(!m4.main_segment().contains(".WORD RELEASEID"));
        let (m5, _) = module(5);
        let main = m5.main_segment();
        assert!(main.starts_with("\t.NEW 5\n\t.BYTE 5\n\t.BYTE FLAGS\n\t.WORD RELEASEID\n"));
        assert!(main.contains("\t.WORD WORDS\n\t.WORD 0,0\n"));
    }

    #[test]
    fn test_header_symbols_default_unless_defined() {
        let (mut m, _) = module(5);
        m.define_constant("RELEASEID", Operand::numeric(7)).unwrap();
        let data = m.data_segment().unwrap();
        assert!(data.starts_with("\tFLAGS=0\n\tFLAGS2=0\n"));
        assert!(data.contains("\tRELEASEID=7\n"));
        assert!(!data.contains("RELEASEID=0"));
    }

    #[test]
    fn test_frequent_words_stub() {
        let text = frequent_words_segment();
        assert!(text.starts_with("\t.FSTR FSTR?DUMMY,\"\"\nWORDS::\n"));
        assert_eq!(text.matches("\tFSTR?DUMMY\n").count(), 96);
    }
}
