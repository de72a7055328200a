//! Operands and the interning pool behind `make_number`/`make_string`.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Where a variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    Local,
    Global,
    Stack,
}

#[derive(Debug, PartialEq)]
enum OperandValue {
    Numeric(i32),
    /// Pooled string: assembler name plus source text.
    Str { name: String, text: String },
    Symbol(String),
    Variable { name: String, scope: VarScope },
}

/// An immutable operand. Cloning is cheap and keeps identity, so pooled
/// operands can be compared with [`Operand::same`].
#[derive(Debug, Clone, PartialEq)]
pub struct Operand(Rc<OperandValue>);

impl Operand {
    pub(crate) fn numeric(value: i32) -> Self {
        Operand(Rc::new(OperandValue::Numeric(value)))
    }

    pub(crate) fn symbol(name: impl Into<String>) -> Self {
        Operand(Rc::new(OperandValue::Symbol(name.into())))
    }

    pub(crate) fn variable(name: impl Into<String>, scope: VarScope) -> Self {
        Operand(Rc::new(OperandValue::Variable {
            name: name.into(),
            scope,
        }))
    }

    pub(crate) fn stack() -> Self {
        Operand::variable("STACK", VarScope::Stack)
    }

    /// Same pooled instance, not merely an equal value.
    pub fn same(a: &Operand, b: &Operand) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn as_number(&self) -> Option<i32> {
        match *self.0 {
            OperandValue::Numeric(n) => Some(n),
            _ => None,
        }
    }

    pub fn string_text(&self) -> Option<&str> {
        match &*self.0 {
            OperandValue::Str { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(*self.0, OperandValue::Variable { .. })
    }

    pub fn is_stack(&self) -> bool {
        matches!(
            *self.0,
            OperandValue::Variable {
                scope: VarScope::Stack,
                ..
            }
        )
    }

    pub fn scope(&self) -> Option<VarScope> {
        match &*self.0 {
            OperandValue::Variable { scope, .. } => Some(*scope),
            _ => None,
        }
    }

    /// The operand as written where an instruction wants a variable number
    /// rather than a value (`'X`). Non-variables are written as values.
    pub fn var_ref(&self) -> String {
        match &*self.0 {
            OperandValue::Variable { name, .. } => format!("'{}", name),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            OperandValue::Numeric(n) => write!(f, "{}", n),
            OperandValue::Str { name, .. } => f.write_str(name),
            OperandValue::Symbol(name) => f.write_str(name),
            OperandValue::Variable { name, .. } => f.write_str(name),
        }
    }
}

/// Interns numeric and string literals.
#[derive(Debug)]
pub struct OperandPool {
    numbers: HashMap<i32, Operand>,
    strings: HashMap<String, Operand>,
    stack: Operand,
}

impl Default for OperandPool {
    fn default() -> Self {
        Self::new()
    }
}

impl OperandPool {
    pub fn new() -> Self {
        let mut numbers = HashMap::new();
        numbers.insert(0, Operand::numeric(0));
        numbers.insert(1, Operand::numeric(1));
        Self {
            numbers,
            strings: HashMap::new(),
            stack: Operand::stack(),
        }
    }

    pub fn zero(&self) -> Operand {
        self.numbers[&0].clone()
    }

    pub fn one(&self) -> Operand {
        self.numbers[&1].clone()
    }

    pub fn stack(&self) -> Operand {
        self.stack.clone()
    }

    pub fn number(&mut self, value: i32) -> Operand {
        self.numbers
            .entry(value)
            .or_insert_with(|| Operand::numeric(value))
            .clone()
    }

    pub fn string(&mut self, text: &str) -> Operand {
        if let Some(op) = self.strings.get(text) {
            return op.clone();
        }
        let name = format!("STR?{}", self.strings.len());
        let op = Operand(Rc::new(OperandValue::Str {
            name,
            text: text.to_string(),
        }));
        self.strings.insert(text.to_string(), op.clone());
        op
    }

    /// Pooled strings ordered by source text, as `(text, operand)`.
    pub fn sorted_strings(&self) -> Vec<(&str, &Operand)> {
        let mut strings: Vec<(&str, &Operand)> = self
            .strings
            .iter()
            .map(|(text, op)| (text.as_str(), op))
            .collect();
        strings.sort_by(|a, b| a.0.cmp(b.0));
        strings
    }
}
