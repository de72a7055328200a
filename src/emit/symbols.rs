use super::error::{EmitError, EmitResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// What a global symbol was defined as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Constant,
    Global,
    Table,
    Routine,
    Object,
    Property,
    Flag,
    Word,
}

/// The module-wide namespace. Constants, globals, tables, routines, objects,
/// properties, flags and vocabulary words all share it.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct SymbolTable {
    symbols: BTreeMap<String, SymbolKind>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an already sanitized name.
    pub fn define(&mut self, name: &str, kind: SymbolKind) -> EmitResult<()> {
        if self.symbols.contains_key(name) {
            return Err(EmitError::DuplicateSymbol(name.to_string()));
        }
        self.symbols.insert(name.to_string(), kind);
        Ok(())
    }

    pub fn kind_of(&self, name: &str) -> Option<SymbolKind> {
        self.symbols.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SymbolKind)> {
        self.symbols.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_across_kinds() {
        let mut table = SymbolTable::new();
        table.define("LAMP", SymbolKind::Object).unwrap();
        let err = table.define("LAMP", SymbolKind::Routine).unwrap_err();
        assert!(matches!(err, EmitError::DuplicateSymbol(name) if name == "LAMP"));
        assert_eq!(table.kind_of("LAMP"), Some(SymbolKind::Object));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_json_dump() {
        let mut table = SymbolTable::new();
        table.define("P?SIZE", SymbolKind::Property).unwrap();
        table.define("GO", SymbolKind::Routine).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"GO":"routine","P?SIZE":"property"}"#);
    }
}
