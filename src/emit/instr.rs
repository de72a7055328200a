//! ZAP instructions and the fusion rules applied to them.

use super::peephole::{Combiner, Fused, Label, Line, LineKind};
use super::INDENT;
use std::fmt::Write as _;

/// Internal marker for `CRLF` followed by `RTRUE`. Written back out as two
/// lines unless a preceding `PRINTI` absorbs it into `PRINTR`.
pub const CRLF_RTRUE: &str = "CRLF+RTRUE";

/// One ZAP instruction: mnemonic, operands and an optional store target.
/// Branch targets live on the buffer line, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: &'static str,
    pub args: Vec<String>,
    pub store: Option<String>,
}

impl Instr {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            args: Vec::new(),
            store: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn store(mut self, store: Option<String>) -> Self {
        self.store = store;
        self
    }

    fn is(&self, op: &str) -> bool {
        self.op == op
    }

    fn single_arg(&self) -> Option<&str> {
        match self.args.as_slice() {
            [arg] => Some(arg),
            _ => None,
        }
    }
}

/// Write a flushed line, expanding the `CRLF+RTRUE` marker.
pub fn write_line(out: &mut String, line: &Line<Instr>) {
    for debug in &line.debug {
        let _ = writeln!(out, "{}{}", INDENT, debug);
    }
    if let Some(label) = line.label {
        let _ = write!(out, "{}:", label);
    }

    let instr = &line.code;
    if instr.is(CRLF_RTRUE) {
        let _ = writeln!(out, "{}CRLF", INDENT);
        let _ = writeln!(out, "{}RTRUE", INDENT);
        return;
    }

    let _ = write!(out, "{}{}", INDENT, instr.op);
    match (line.kind, line.target) {
        (LineKind::BranchAlways, Some(target)) => {
            let _ = write!(out, " {}", target);
        }
        _ => {
            if !instr.args.is_empty() {
                let _ = write!(out, " {}", instr.args.join(","));
            }
        }
    }
    if let Some(store) = &instr.store {
        let _ = write!(out, " >{}", store);
    }
    match (line.kind, line.target) {
        (LineKind::BranchPositive, Some(target)) => {
            let _ = write!(out, " /{}", target);
        }
        (LineKind::BranchNegative, Some(target)) => {
            let _ = write!(out, " \\{}", target);
        }
        _ => {}
    }
    out.push('\n');
}

/// The six pairwise rewrites ZAP output relies on.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZapCombiner;

impl ZapCombiner {
    fn fuse(code: Instr, target: Option<Label>, kind: LineKind) -> Option<Fused<Instr>> {
        Some(Fused { code, target, kind })
    }
}

impl Combiner<Instr> for ZapCombiner {
    fn combine(&self, first: &Line<Instr>, second: &Line<Instr>) -> Option<Fused<Instr>> {
        let a = &first.code;
        let b = &second.code;

        // CRLF, RTRUE
        if a.is("CRLF") && b.is("RTRUE") {
            return Self::fuse(Instr::new(CRLF_RTRUE), None, LineKind::Terminator);
        }

        // PRINTI "x", CRLF+RTRUE
        if a.is("PRINTI") && b.is(CRLF_RTRUE) {
            let text = a.single_arg()?;
            return Self::fuse(
                Instr::new("PRINTR").arg(text),
                None,
                LineKind::HeavyTerminator,
            );
        }

        // PUSH x, RSTACK
        if a.is("PUSH") && b.is("RSTACK") {
            let value = a.single_arg()?;
            let code = match value {
                "STACK" => return None,
                "0" => Instr::new("RFALSE"),
                "1" => Instr::new("RTRUE"),
                _ => Instr::new("RETURN").arg(value),
            };
            return Self::fuse(code, None, LineKind::Terminator);
        }

        // op ... >STACK, POP 'V
        if first.kind == LineKind::Plain
            && a.store.as_deref() == Some("STACK")
            && b.is("POP")
            && b.store.is_none()
        {
            let dest = b.single_arg()?.strip_prefix('\'')?;
            let mut code = a.clone();
            code.store = Some(dest.to_string());
            return Self::fuse(code, None, LineKind::Plain);
        }

        // INC 'V, GRTR? V,Y  /  DEC 'V, LESS? V,Y
        let fused_op = match (a.op, b.op) {
            ("INC", "GRTR?") => Some("IGRTR?"),
            ("DEC", "LESS?") => Some("DLESS?"),
            _ => None,
        };
        if let Some(op) = fused_op {
            if first.kind != LineKind::Plain {
                return None;
            }
            let var = a.single_arg()?.strip_prefix('\'')?;
            if var == "STACK" {
                return None;
            }
            // The fused form compares against the value from before the step.
            match b.args.as_slice() {
                [left, right] if left == var && right != var => {
                    return Self::fuse(
                        Instr::new(op).arg(format!("'{}", var)).arg(right.clone()),
                        second.target,
                        second.kind,
                    );
                }
                _ => return None,
            }
        }

        None
    }
}
