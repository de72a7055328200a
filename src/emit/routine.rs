//! Routine builder: turns abstract operations into ZAP instructions.
//!
//! Every emission call picks the opcode for the target version, checks its
//! operands and appends a line to the routine's peephole buffer. Nothing is
//! written until the routine is finished.

use super::debug::{DebugFileBuilder, SourceSpan};
use super::error::{EmitError, EmitResult};
use super::instr::{Instr, ZapCombiner, write_line};
use super::operand::{Operand, VarScope};
use super::peephole::{Label, LineKind, PeepholeBuffer};
use super::sanitize::{quote_string, sanitize_symbol};
use super::version::ZVersion;
use super::INDENT;
use std::fmt::Write as _;

/// Parameters and locals share the 15 local variable slots.
const MAX_LOCALS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutineId(pub(crate) usize);

/// Branch conditions with their own opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Decrement the variable, branch if now less than the value.
    DecCheck,
    Greater,
    /// Increment the variable, branch if now greater than the value.
    IncCheck,
    /// Object is directly inside another object.
    Inside,
    Less,
    TestAttr,
    TestBits,
    /// Branch if the object has a child. The child is pushed on the stack.
    HasChild,
    /// Branch if the object has a sibling. The sibling is pushed on the stack.
    HasSibling,
    ArgProvided,
    Verify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    Nullary,
    Unary,
    Binary,
}

impl Condition {
    fn arity(self) -> Arity {
        match self {
            Condition::Verify => Arity::Nullary,
            Condition::HasChild | Condition::HasSibling | Condition::ArgProvided => Arity::Unary,
            Condition::DecCheck
            | Condition::Greater
            | Condition::IncCheck
            | Condition::Inside
            | Condition::Less
            | Condition::TestAttr
            | Condition::TestBits => Arity::Binary,
        }
    }

    fn needs_variable(self) -> bool {
        matches!(self, Condition::DecCheck | Condition::IncCheck)
    }

    fn stores(self) -> bool {
        matches!(self, Condition::HasChild | Condition::HasSibling)
    }

    fn opcode(self, version: ZVersion) -> Option<&'static str> {
        let op = match self {
            Condition::DecCheck => "DLESS?",
            Condition::Greater => "GRTR?",
            Condition::IncCheck => "IGRTR?",
            Condition::Inside => "IN?",
            Condition::Less => "LESS?",
            Condition::TestAttr => "FSET?",
            Condition::TestBits => "BTST",
            Condition::HasChild => "FIRST?",
            Condition::HasSibling => "NEXT?",
            Condition::ArgProvided if version.number() >= 5 => "ASSIGNED?",
            Condition::Verify if version.number() >= 3 => "VERIFY",
            Condition::ArgProvided | Condition::Verify => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullaryOp {
    Quit,
    Restart,
    ShowStatus,
    Catch,
    Save,
    Restore,
    SaveUndo,
    RestoreUndo,
}

impl NullaryOp {
    /// (opcode, stores a result, line kind)
    fn select(self, version: ZVersion) -> Option<(&'static str, bool, LineKind)> {
        let v = version.number();
        let selected = match self {
            NullaryOp::Quit => ("QUIT", false, LineKind::HeavyTerminator),
            NullaryOp::Restart => ("RESTART", false, LineKind::HeavyTerminator),
            NullaryOp::ShowStatus if v <= 3 => ("USL", false, LineKind::Plain),
            NullaryOp::Catch if v >= 5 => ("CATCH", true, LineKind::Plain),
            NullaryOp::Save if v >= 4 => ("SAVE", true, LineKind::Plain),
            NullaryOp::Restore if v >= 4 => ("RESTORE", true, LineKind::Plain),
            NullaryOp::SaveUndo if v >= 5 => ("ISAVE", true, LineKind::Plain),
            NullaryOp::RestoreUndo if v >= 5 => ("IRESTORE", true, LineKind::Plain),
            _ => return None,
        };
        Some(selected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    GetParent,
    GetPropSize,
    LoadIndirect,
    Random,
    RemoveObject,
    ClearWindow,
    SplitWindow,
    SetWindow,
    DirectOutput,
    DirectInput,
    EraseLine,
    SetFont,
}

impl UnaryOp {
    /// (opcode, stores a result)
    fn select(self, version: ZVersion) -> Option<(&'static str, bool)> {
        let v = version.number();
        let selected = match self {
            UnaryOp::Neg => ("SUB", true),
            UnaryOp::Not => ("BCOM", true),
            UnaryOp::GetParent => ("LOC", true),
            UnaryOp::GetPropSize => ("PTSIZE", true),
            UnaryOp::LoadIndirect => ("VALUE", true),
            UnaryOp::Random => ("RANDOM", true),
            UnaryOp::RemoveObject => ("REMOVE", false),
            UnaryOp::SplitWindow if v >= 3 => ("SPLIT", false),
            UnaryOp::SetWindow if v >= 3 => ("SCREEN", false),
            UnaryOp::DirectOutput if v >= 3 => ("DIROUT", false),
            UnaryOp::DirectInput if v >= 3 => ("DIRIN", false),
            UnaryOp::ClearWindow if v >= 4 => ("CLEAR", false),
            UnaryOp::EraseLine if v >= 4 => ("ERASE", false),
            UnaryOp::SetFont if v >= 5 => ("FONT", true),
            _ => return None,
        };
        Some(selected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    ArtShift,
    LogShift,
    GetWord,
    GetByte,
    GetProperty,
    GetPropertyAddress,
    GetNextProperty,
    MoveObject,
    SetFlag,
    ClearFlag,
    SetCursor,
    SetColor,
    Throw,
}

impl BinaryOp {
    /// (opcode, stores a result, line kind)
    fn select(self, version: ZVersion) -> Option<(&'static str, bool, LineKind)> {
        let v = version.number();
        let selected = match self {
            BinaryOp::Add => ("ADD", true, LineKind::Plain),
            BinaryOp::Sub => ("SUB", true, LineKind::Plain),
            BinaryOp::Mul => ("MUL", true, LineKind::Plain),
            BinaryOp::Div => ("DIV", true, LineKind::Plain),
            BinaryOp::Mod => ("MOD", true, LineKind::Plain),
            BinaryOp::And => ("BAND", true, LineKind::Plain),
            BinaryOp::Or => ("BOR", true, LineKind::Plain),
            BinaryOp::GetWord => ("GET", true, LineKind::Plain),
            BinaryOp::GetByte => ("GETB", true, LineKind::Plain),
            BinaryOp::GetProperty => ("GETP", true, LineKind::Plain),
            BinaryOp::GetPropertyAddress => ("GETPT", true, LineKind::Plain),
            BinaryOp::GetNextProperty => ("NEXTP", true, LineKind::Plain),
            BinaryOp::MoveObject => ("MOVE", false, LineKind::Plain),
            BinaryOp::SetFlag => ("FSET", false, LineKind::Plain),
            BinaryOp::ClearFlag => ("FCLEAR", false, LineKind::Plain),
            BinaryOp::SetCursor if v >= 4 => ("CURSET", false, LineKind::Plain),
            BinaryOp::ArtShift if v >= 5 => ("ASHIFT", true, LineKind::Plain),
            BinaryOp::LogShift if v >= 5 => ("SHIFT", true, LineKind::Plain),
            BinaryOp::SetColor if v >= 5 => ("COLOR", false, LineKind::Plain),
            BinaryOp::Throw if v >= 5 => ("THROW", false, LineKind::Terminator),
            _ => return None,
        };
        Some(selected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TernaryOp {
    PutWord,
    PutByte,
    PutProperty,
    CopyTable,
}

impl TernaryOp {
    fn select(self, version: ZVersion) -> Option<&'static str> {
        match self {
            TernaryOp::PutWord => Some("PUT"),
            TernaryOp::PutByte => Some("PUTB"),
            TernaryOp::PutProperty => Some("PUTP"),
            TernaryOp::CopyTable if version.number() >= 5 => Some("COPYT"),
            TernaryOp::CopyTable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOp {
    Number,
    Character,
    PackedString,
    AddressString,
    ObjectName,
    Unicode,
}

impl PrintOp {
    fn select(self, version: ZVersion) -> Option<&'static str> {
        match self {
            PrintOp::Number => Some("PRINTN"),
            PrintOp::Character => Some("PRINTC"),
            PrintOp::PackedString => Some("PRINT"),
            PrintOp::AddressString => Some("PRINTB"),
            PrintOp::ObjectName => Some("PRINTD"),
            PrintOp::Unicode if version.number() >= 5 => Some("PRINTU"),
            PrintOp::Unicode => None,
        }
    }
}

#[derive(Debug, Clone)]
struct LocalVar {
    name: String,
    default: Option<Operand>,
}

impl LocalVar {
    fn operand(&self) -> Operand {
        Operand::variable(self.name.clone(), VarScope::Local)
    }
}

#[derive(Debug)]
pub struct RoutineBuilder {
    name: String,
    version: ZVersion,
    entry_point: bool,
    cleanup_stack: bool,
    want_debug: bool,
    required: Vec<LocalVar>,
    optional: Vec<LocalVar>,
    locals: Vec<LocalVar>,
    buffer: PeepholeBuffer<Instr>,
    next_label: u32,
    span: Option<SourceSpan>,
    finished: bool,
}

fn unsupported(what: impl std::fmt::Debug, version: ZVersion) -> EmitError {
    EmitError::Internal(format!("{:?} has no translation for version {}", what, version))
}

fn require_variable(operand: &Operand, role: &str) -> EmitResult<()> {
    if operand.is_variable() {
        Ok(())
    } else {
        Err(EmitError::InvalidOperand(format!(
            "{} must be a variable, got {}",
            role, operand
        )))
    }
}

fn branch_kind(polarity: bool) -> LineKind {
    if polarity {
        LineKind::BranchPositive
    } else {
        LineKind::BranchNegative
    }
}

impl RoutineBuilder {
    pub(crate) fn new(
        name: String,
        version: ZVersion,
        entry_point: bool,
        cleanup_stack: bool,
        want_debug: bool,
    ) -> Self {
        Self {
            name,
            version,
            entry_point,
            cleanup_stack,
            want_debug,
            required: Vec::new(),
            optional: Vec::new(),
            locals: Vec::new(),
            buffer: PeepholeBuffer::new(),
            next_label: 0,
            span: None,
            finished: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operand(&self) -> Operand {
        Operand::symbol(self.name.clone())
    }

    pub fn is_entry_point(&self) -> bool {
        self.entry_point
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stack(&self) -> Operand {
        Operand::stack()
    }

    /// Branch target that returns true.
    pub fn rtrue(&self) -> Label {
        Label::ReturnTrue
    }

    /// Branch target that returns false.
    pub fn rfalse(&self) -> Label {
        Label::ReturnFalse
    }

    /// Source span of the whole routine, used for debug records.
    pub fn set_source_span(&mut self, span: SourceSpan) {
        self.span = Some(span);
    }

    fn ensure_open(&self) -> EmitResult<()> {
        if self.finished {
            return Err(EmitError::InvalidOperation(format!(
                "routine {} is already finished",
                self.name
            )));
        }
        Ok(())
    }

    fn add(&mut self, instr: Instr, target: Option<Label>, kind: LineKind) -> EmitResult<()> {
        self.ensure_open()?;
        self.buffer.add_line(instr, target, kind);
        Ok(())
    }

    fn store_target(result: Option<&Operand>) -> EmitResult<Option<String>> {
        match result {
            Some(op) => {
                require_variable(op, "result")?;
                Ok(Some(op.to_string()))
            }
            None => Ok(None),
        }
    }

    fn reject_result(op: &str, result: Option<&Operand>) -> EmitResult<()> {
        match result {
            Some(_) => Err(EmitError::InvalidOperand(format!("{} produces no result", op))),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------
    // Parameters and locals
    // ------------------------------------------------------------

    fn declare(&mut self, name: &str, default: Option<Operand>) -> EmitResult<LocalVar> {
        self.ensure_open()?;
        if self.entry_point {
            return Err(EmitError::InvalidOperation(format!(
                "entry point routine {} cannot have parameters or locals",
                self.name
            )));
        }
        let name = sanitize_symbol(name);
        let taken = self
            .required
            .iter()
            .chain(&self.optional)
            .chain(&self.locals)
            .any(|local| local.name == name);
        if taken {
            return Err(EmitError::DuplicateSymbol(name));
        }
        if self.required.len() + self.optional.len() + self.locals.len() >= MAX_LOCALS {
            return Err(EmitError::InvalidOperation(format!(
                "routine {} has more than {} parameters and locals",
                self.name, MAX_LOCALS
            )));
        }
        Ok(LocalVar { name, default })
    }

    pub fn define_required_parameter(&mut self, name: &str) -> EmitResult<Operand> {
        let local = self.declare(name, None)?;
        let op = local.operand();
        self.required.push(local);
        Ok(op)
    }

    pub fn define_optional_parameter(
        &mut self,
        name: &str,
        default: Option<Operand>,
    ) -> EmitResult<Operand> {
        let local = self.declare(name, default)?;
        let op = local.operand();
        self.optional.push(local);
        Ok(op)
    }

    pub fn define_local(&mut self, name: &str, default: Option<Operand>) -> EmitResult<Operand> {
        let local = self.declare(name, default)?;
        let op = local.operand();
        self.locals.push(local);
        Ok(op)
    }

    // ------------------------------------------------------------
    // Labels and debug lines
    // ------------------------------------------------------------

    pub fn define_label(&mut self) -> Label {
        let label = Label::Local(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn mark_label(&mut self, label: Label) -> EmitResult<()> {
        self.ensure_open()?;
        match label {
            Label::Local(_) => {
                self.buffer.mark_label(label);
                Ok(())
            }
            _ => Err(EmitError::InvalidOperation(format!(
                "{} cannot be placed in a routine",
                label
            ))),
        }
    }

    /// Attach a preformatted debug directive to the next instruction.
    pub(crate) fn add_debug_line(&mut self, text: String) -> EmitResult<()> {
        self.ensure_open()?;
        if self.want_debug {
            self.buffer.add_debug(text);
        }
        Ok(())
    }

    // ------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------

    pub fn jump(&mut self, target: Label) -> EmitResult<()> {
        match target {
            Label::ReturnTrue => self.add(Instr::new("RTRUE"), None, LineKind::Terminator),
            Label::ReturnFalse => self.add(Instr::new("RFALSE"), None, LineKind::Terminator),
            Label::Local(_) => self.add(Instr::new("JUMP"), Some(target), LineKind::BranchAlways),
        }
    }

    pub fn branch(
        &mut self,
        condition: Condition,
        left: Option<&Operand>,
        right: Option<&Operand>,
        target: Label,
        polarity: bool,
    ) -> EmitResult<()> {
        let arity_ok = match (condition.arity(), left, right) {
            (Arity::Nullary, None, None) => true,
            (Arity::Unary, Some(_), None) => true,
            (Arity::Binary, Some(_), Some(_)) => true,
            _ => false,
        };
        if !arity_ok {
            return Err(EmitError::InvalidOperand(format!(
                "wrong number of operands for {:?}",
                condition
            )));
        }
        if condition.needs_variable() {
            if let Some(left) = left {
                require_variable(left, &format!("left operand of {:?}", condition))?;
            }
        }
        let op = condition
            .opcode(self.version)
            .ok_or_else(|| unsupported(condition, self.version))?;

        let mut instr = Instr::new(op);
        if let Some(left) = left {
            let is_ref = condition.needs_variable() || condition == Condition::ArgProvided;
            instr = instr.arg(if is_ref { left.var_ref() } else { left.to_string() });
        }
        if let Some(right) = right {
            instr = instr.arg(right.to_string());
        }
        if condition.stores() {
            instr = instr.store(Some("STACK".to_string()));
        }
        self.add(instr, Some(target), branch_kind(polarity))
    }

    /// `EQUAL?` against one to three values.
    pub fn branch_equal(
        &mut self,
        left: &Operand,
        rights: &[Operand],
        target: Label,
        polarity: bool,
    ) -> EmitResult<()> {
        if rights.is_empty() || rights.len() > 3 {
            return Err(EmitError::InvalidOperand(format!(
                "EQUAL? takes 1 to 3 values to compare against, got {}",
                rights.len()
            )));
        }
        let instr = Instr::new("EQUAL?")
            .arg(left.to_string())
            .args(rights.iter().map(|r| r.to_string()));
        self.add(instr, Some(target), branch_kind(polarity))
    }

    pub fn branch_zero(
        &mut self,
        value: &Operand,
        target: Label,
        polarity: bool,
    ) -> EmitResult<()> {
        self.add(
            Instr::new("ZERO?").arg(value.to_string()),
            Some(target),
            branch_kind(polarity),
        )
    }

    fn tree_branch(
        &mut self,
        op: &'static str,
        object: &Operand,
        dest: &Operand,
        target: Label,
        polarity: bool,
    ) -> EmitResult<()> {
        let store = Self::store_target(Some(dest))?;
        let instr = Instr::new(op).arg(object.to_string()).store(store);
        self.add(instr, Some(target), branch_kind(polarity))
    }

    /// Store the first child of `object` in `dest`, branching if there is one.
    pub fn get_child(
        &mut self,
        object: &Operand,
        dest: &Operand,
        target: Label,
        polarity: bool,
    ) -> EmitResult<()> {
        self.tree_branch("FIRST?", object, dest, target, polarity)
    }

    /// Store the next sibling of `object` in `dest`, branching if there is one.
    pub fn get_sibling(
        &mut self,
        object: &Operand,
        dest: &Operand,
        target: Label,
        polarity: bool,
    ) -> EmitResult<()> {
        self.tree_branch("NEXT?", object, dest, target, polarity)
    }

    // ------------------------------------------------------------
    // Arithmetic and object operations
    // ------------------------------------------------------------

    pub fn nullary(&mut self, op: NullaryOp, result: Option<&Operand>) -> EmitResult<()> {
        let (opcode, stores, kind) = op
            .select(self.version)
            .ok_or_else(|| unsupported(op, self.version))?;
        let store = if stores {
            Self::store_target(result)?
        } else {
            Self::reject_result(opcode, result)?;
            None
        };
        self.add(Instr::new(opcode).store(store), None, kind)
    }

    pub fn unary(
        &mut self,
        op: UnaryOp,
        value: &Operand,
        result: Option<&Operand>,
    ) -> EmitResult<()> {
        let (opcode, stores) = op
            .select(self.version)
            .ok_or_else(|| unsupported(op, self.version))?;
        let store = if stores {
            Self::store_target(result)?
        } else {
            Self::reject_result(opcode, result)?;
            None
        };
        let instr = match op {
            UnaryOp::Neg => Instr::new(opcode).arg("0").arg(value.to_string()),
            _ => Instr::new(opcode).arg(value.to_string()),
        };
        self.add(instr.store(store), None, LineKind::Plain)
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        left: &Operand,
        right: &Operand,
        result: Option<&Operand>,
    ) -> EmitResult<()> {
        if let Some(dest) = result.filter(|r| r.is_variable()) {
            let is_one = |op: &Operand| op.as_number() == Some(1);
            let step = match op {
                BinaryOp::Add
                    if (dest == left && is_one(right)) || (dest == right && is_one(left)) =>
                {
                    Some("INC")
                }
                BinaryOp::Sub if dest == left && is_one(right) => Some("DEC"),
                _ => None,
            };
            if let Some(step) = step {
                return self.add(Instr::new(step).arg(dest.var_ref()), None, LineKind::Plain);
            }
        }

        let (opcode, stores, kind) = op
            .select(self.version)
            .ok_or_else(|| unsupported(op, self.version))?;
        let store = if stores {
            Self::store_target(result)?
        } else {
            Self::reject_result(opcode, result)?;
            None
        };
        let instr = Instr::new(opcode)
            .arg(left.to_string())
            .arg(right.to_string())
            .store(store);
        self.add(instr, None, kind)
    }

    pub fn ternary(
        &mut self,
        op: TernaryOp,
        a: &Operand,
        b: &Operand,
        c: &Operand,
    ) -> EmitResult<()> {
        let opcode = op
            .select(self.version)
            .ok_or_else(|| unsupported(op, self.version))?;
        let instr = Instr::new(opcode).args([a.to_string(), b.to_string(), c.to_string()]);
        self.add(instr, None, LineKind::Plain)
    }

    // ------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------

    pub fn store(&mut self, dest: &Operand, src: &Operand) -> EmitResult<()> {
        require_variable(dest, "store destination")?;
        if dest == src {
            return self.ensure_open();
        }
        if src.is_stack() {
            self.add(Instr::new("POP").arg(dest.var_ref()), None, LineKind::Plain)
        } else if dest.is_stack() {
            self.add(Instr::new("PUSH").arg(src.to_string()), None, LineKind::Plain)
        } else {
            let instr = Instr::new("SET").arg(dest.var_ref()).arg(src.to_string());
            self.add(instr, None, LineKind::Plain)
        }
    }

    // ------------------------------------------------------------
    // Calls and returns
    // ------------------------------------------------------------

    pub fn call(
        &mut self,
        routine: &Operand,
        args: &[Operand],
        result: Option<&Operand>,
    ) -> EmitResult<()> {
        let max = self.version.max_call_arguments();
        if args.len() > max {
            return Err(EmitError::TooManyArguments {
                callee: routine.to_string(),
                count: args.len(),
                max,
                version: self.version.number(),
            });
        }
        let store = Self::store_target(result)?;

        let opcode = if !self.version.has_sized_calls() {
            "CALL"
        } else if result.is_none() && self.version.has_no_store_calls() {
            match args.len() {
                0 => "ICALL1",
                1 => "ICALL2",
                2 | 3 => "ICALL",
                _ => "IXCALL",
            }
        } else {
            match args.len() {
                0 => "CALL1",
                1 => "CALL2",
                2 | 3 => "CALL",
                _ => "XCALL",
            }
        };

        let instr = Instr::new(opcode)
            .arg(routine.to_string())
            .args(args.iter().map(|a| a.to_string()))
            .store(store);
        self.add(instr, None, LineKind::Plain)?;

        if result.is_none() && !self.version.has_no_store_calls() && self.cleanup_stack {
            self.add(Instr::new("FSTACK"), None, LineKind::Plain)?;
        }
        Ok(())
    }

    pub fn ret(&mut self, value: &Operand) -> EmitResult<()> {
        let instr = match value.as_number() {
            Some(1) => Instr::new("RTRUE"),
            Some(0) => Instr::new("RFALSE"),
            _ if value.is_stack() => Instr::new("RSTACK"),
            _ => Instr::new("RETURN").arg(value.to_string()),
        };
        self.add(instr, None, LineKind::Terminator)
    }

    // ------------------------------------------------------------
    // Output and input
    // ------------------------------------------------------------

    pub fn print(&mut self, op: PrintOp, value: &Operand) -> EmitResult<()> {
        let opcode = op
            .select(self.version)
            .ok_or_else(|| unsupported(op, self.version))?;
        self.add(Instr::new(opcode).arg(value.to_string()), None, LineKind::Plain)
    }

    pub fn print_string(&mut self, text: &str) -> EmitResult<()> {
        self.add(Instr::new("PRINTI").arg(quote_string(text)), None, LineKind::Plain)
    }

    pub fn print_new_line(&mut self) -> EmitResult<()> {
        self.add(Instr::new("CRLF"), None, LineKind::Plain)
    }

    /// Read a line of input. `timed` is `(interval, routine)` and needs
    /// version 4; a result needs version 5.
    pub fn read(
        &mut self,
        text: &Operand,
        parse: &Operand,
        timed: Option<(&Operand, &Operand)>,
        result: Option<&Operand>,
    ) -> EmitResult<()> {
        let v = self.version.number();
        if timed.is_some() && v < 4 {
            return Err(EmitError::InvalidOperand(format!(
                "timed input needs version 4 or later (target is {})",
                v
            )));
        }
        if result.is_some() && v < 5 {
            return Err(EmitError::InvalidOperand(format!(
                "READ stores a result only from version 5 (target is {})",
                v
            )));
        }
        let mut instr = Instr::new("READ").arg(text.to_string()).arg(parse.to_string());
        if let Some((interval, routine)) = timed {
            instr = instr.arg(interval.to_string()).arg(routine.to_string());
        }
        let store = Self::store_target(result)?;
        self.add(instr.store(store), None, LineKind::Plain)
    }

    /// `INTBL?`: search `table` for `value`, storing the address found.
    #[allow(clippy::too_many_arguments)]
    pub fn scan_table(
        &mut self,
        value: &Operand,
        table: &Operand,
        length: &Operand,
        form: Option<&Operand>,
        result: &Operand,
        target: Label,
        polarity: bool,
    ) -> EmitResult<()> {
        let v = self.version.number();
        if v < 4 {
            return Err(unsupported("ScanTable", self.version));
        }
        if form.is_some() && v < 5 {
            return Err(EmitError::InvalidOperand(
                "INTBL? form argument needs version 5".to_string(),
            ));
        }
        let mut instr = Instr::new("INTBL?").args([
            value.to_string(),
            table.to_string(),
            length.to_string(),
        ]);
        if let Some(form) = form {
            instr = instr.arg(form.to_string());
        }
        let store = Self::store_target(Some(result))?;
        self.add(instr.store(store), Some(target), branch_kind(polarity))
    }

    // ------------------------------------------------------------
    // Finishing
    // ------------------------------------------------------------

    fn all_locals(&self) -> impl Iterator<Item = &LocalVar> {
        self.required.iter().chain(&self.optional).chain(&self.locals)
    }

    /// Default assignments that version 5+ does in code rather than in the
    /// routine header.
    fn prologue(&mut self) -> PeepholeBuffer<Instr> {
        let mut prologue = PeepholeBuffer::new();
        if self.version.has_header_defaults() {
            return prologue;
        }

        let optional: Vec<LocalVar> = self.optional.clone();
        for param in optional {
            if let Some(default) = &param.default {
                let skip = self.define_label();
                prologue.add_line(
                    Instr::new("ASSIGNED?").arg(format!("'{}", param.name)),
                    Some(skip),
                    LineKind::BranchPositive,
                );
                prologue.add_line(
                    Instr::new("SET").arg(format!("'{}", param.name)).arg(default.to_string()),
                    None,
                    LineKind::Plain,
                );
                prologue.mark_label(skip);
            }
        }
        for local in &self.locals {
            if let Some(default) = &local.default {
                prologue.add_line(
                    Instr::new("SET").arg(format!("'{}", local.name)).arg(default.to_string()),
                    None,
                    LineKind::Plain,
                );
            }
        }
        prologue
    }

    fn funct_line(&self) -> String {
        let mut line = format!("{}.FUNCT {}", INDENT, self.name);
        for param in &self.required {
            let _ = write!(line, ",{}", param.name);
        }
        for local in self.optional.iter().chain(&self.locals) {
            let _ = write!(line, ",{}", local.name);
            if self.version.has_header_defaults() {
                if let Some(default) = &local.default {
                    let _ = write!(line, "={}", default);
                }
            }
        }
        line
    }

    /// Write the routine to `out`. A routine can only be finished once.
    pub(crate) fn finish(
        &mut self,
        out: &mut String,
        debug: Option<&mut DebugFileBuilder>,
    ) -> EmitResult<()> {
        self.ensure_open()?;

        let debug_span = match (&self.span, debug) {
            (Some(span), Some(debug)) if self.want_debug => {
                Some((debug.file_id(&span.file), span.clone()))
            }
            _ => None,
        };

        out.push('\n');
        if let Some((file, span)) = &debug_span {
            let _ = write!(
                out,
                "{}.DEBUG-ROUTINE {},{},{},{}",
                INDENT,
                file,
                span.start_line,
                span.start_column,
                quote_string(&self.name)
            );
            for local in self.all_locals() {
                let _ = write!(out, ",{}", quote_string(&local.name));
            }
            out.push('\n');
        }

        let _ = writeln!(out, "{}", self.funct_line());
        if self.entry_point {
            out.push_str("START::\n");
        }

        let mut lines = self.prologue();
        lines.append(std::mem::take(&mut self.buffer));
        let flushed = lines.flush(&ZapCombiner);
        for line in &flushed.lines {
            write_line(out, line);
        }
        for debug in &flushed.trailing_debug {
            let _ = writeln!(out, "{}{}", INDENT, debug);
        }
        if let Some(label) = flushed.trailing_label {
            let _ = writeln!(out, "{}:", label);
        }

        if let Some((file, span)) = &debug_span {
            let _ = writeln!(
                out,
                "{}.DEBUG-ROUTINE-END {},{},{}",
                INDENT, file, span.end_line, span.end_column
            );
        }

        self.finished = true;
        log::debug!(
            "finished routine {} ({} lines)",
            self.name,
            flushed.lines.len()
        );
        Ok(())
    }
}
