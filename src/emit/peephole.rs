//! Deferred instruction buffer with one-step lookahead fusion.
//!
//! A routine pushes lines into the buffer as it emits them. Nothing is
//! written until [`PeepholeBuffer::flush`], which:
//! - resolves label aliases (two labels marked at the same spot),
//! - offers each line and its successor to a [`Combiner`],
//! - drops lines that cannot be reached after an unconditional transfer,
//! - drops jumps to the line that immediately follows.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// A branch target inside one routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Local(u32),
    /// Branching here returns true from the routine.
    ReturnTrue,
    /// Branching here returns false from the routine.
    ReturnFalse,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Local(n) => write!(f, "?L{}", n),
            Label::ReturnTrue => f.write_str("TRUE"),
            Label::ReturnFalse => f.write_str("FALSE"),
        }
    }
}

/// How a line affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Plain,
    BranchAlways,
    BranchPositive,
    BranchNegative,
    Terminator,
    HeavyTerminator,
}

impl LineKind {
    /// Control never falls through to the next line.
    pub fn is_unconditional(self) -> bool {
        matches!(
            self,
            LineKind::BranchAlways | LineKind::Terminator | LineKind::HeavyTerminator
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line<T> {
    pub label: Option<Label>,
    pub code: T,
    pub target: Option<Label>,
    pub kind: LineKind,
    /// Debug directives written just before the line.
    pub debug: Vec<String>,
}

/// Result of fusing two adjacent lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Fused<T> {
    pub code: T,
    pub target: Option<Label>,
    pub kind: LineKind,
}

/// Decides whether two adjacent lines can become one.
pub trait Combiner<T> {
    fn combine(&self, first: &Line<T>, second: &Line<T>) -> Option<Fused<T>>;
}

/// Lines ready to be written, plus what is left dangling at the very end.
#[derive(Debug)]
pub struct Flushed<T> {
    pub lines: Vec<Line<T>>,
    /// Debug directives with no line left to precede.
    pub trailing_debug: Vec<String>,
    pub trailing_label: Option<Label>,
}

#[derive(Debug)]
pub struct PeepholeBuffer<T> {
    lines: Vec<Line<T>>,
    pending_label: Option<Label>,
    pending_debug: Vec<String>,
    aliases: HashMap<Label, Label>,
}

impl<T> Default for PeepholeBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PeepholeBuffer<T> {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            pending_label: None,
            pending_debug: Vec::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Attach `label` to the next line. A second label at the same spot
    /// becomes an alias of the first.
    pub fn mark_label(&mut self, label: Label) {
        match self.pending_label {
            Some(existing) if existing != label => {
                self.aliases.insert(label, existing);
            }
            Some(_) => {}
            None => self.pending_label = Some(label),
        }
    }

    /// Attach a debug directive to the next line.
    pub fn add_debug(&mut self, text: String) {
        self.pending_debug.push(text);
    }

    pub fn add_line(&mut self, code: T, target: Option<Label>, kind: LineKind) {
        self.lines.push(Line {
            label: self.pending_label.take(),
            code,
            target,
            kind,
            debug: std::mem::take(&mut self.pending_debug),
        });
    }

    /// Move every line of `other` after the lines of `self`.
    pub fn append(&mut self, other: PeepholeBuffer<T>) {
        for (from, to) in other.aliases {
            self.aliases.insert(from, to);
        }
        for line in other.lines {
            if let Some(label) = line.label {
                self.mark_label(label);
            }
            for text in line.debug {
                self.add_debug(text);
            }
            self.add_line(line.code, line.target, line.kind);
        }
        if let Some(label) = other.pending_label {
            self.mark_label(label);
        }
        self.pending_debug.extend(other.pending_debug);
    }

    fn resolve(&self, mut label: Label) -> Label {
        // Alias chains are short and acyclic: every alias points at a label
        // that was pending before it.
        while let Some(&next) = self.aliases.get(&label) {
            label = next;
        }
        label
    }

    /// Apply the combiner and the control-flow cleanups, consuming the buffer.
    pub fn flush<C: Combiner<T>>(mut self, combiner: &C) -> Flushed<T> {
        let targets: Vec<Option<Label>> = self
            .lines
            .iter()
            .map(|line| line.target.map(|t| self.resolve(t)))
            .collect();
        let trailing_label = self.pending_label.take();
        let mut lines = std::mem::take(&mut self.lines);
        for (line, target) in lines.iter_mut().zip(targets) {
            line.target = target;
        }

        let referenced: HashSet<Label> = lines.iter().filter_map(|l| l.target).collect();

        fuse_lines(&mut lines, combiner, &referenced);
        let mut trailing_debug = drop_unreachable(&mut lines, &referenced);
        drop_jumps_to_next(&mut lines);
        trailing_debug.append(&mut self.pending_debug);

        Flushed {
            lines,
            trailing_debug,
            trailing_label,
        }
    }
}

fn fuse_lines<T, C: Combiner<T>>(
    lines: &mut Vec<Line<T>>,
    combiner: &C,
    referenced: &HashSet<Label>,
) {
    let mut i = 0;
    while i + 1 < lines.len() {
        let blocked = lines[i + 1]
            .label
            .is_some_and(|label| referenced.contains(&label));
        let fused = if blocked {
            None
        } else {
            combiner.combine(&lines[i], &lines[i + 1])
        };

        match fused {
            Some(fused) => {
                let second = lines.remove(i + 1);
                let first = &mut lines[i];
                log::trace!("peephole: fused line {} with its successor", i);
                first.code = fused.code;
                first.target = fused.target;
                first.kind = fused.kind;
                first.debug.extend(second.debug);
                if first.label.is_none() {
                    // Unreferenced, but keep it so nothing can dangle.
                    first.label = second.label;
                }
                // The fused line may now combine with its predecessor.
                i = i.saturating_sub(1);
            }
            None => i += 1,
        }
    }
}

/// Returns the debug directives of dropped lines that no kept line follows.
fn drop_unreachable<T>(lines: &mut Vec<Line<T>>, referenced: &HashSet<Label>) -> Vec<String> {
    let mut reachable = true;
    let mut carried = Vec::new();
    let mut kept = Vec::with_capacity(lines.len());
    for mut line in lines.drain(..) {
        if line.label.is_some_and(|label| referenced.contains(&label)) {
            reachable = true;
        }
        if !reachable {
            log::trace!("peephole: dropped unreachable line");
            carried.append(&mut line.debug);
            continue;
        }
        if !carried.is_empty() {
            carried.append(&mut line.debug);
            line.debug = std::mem::take(&mut carried);
        }
        if line.kind.is_unconditional() {
            reachable = false;
        }
        kept.push(line);
    }
    *lines = kept;
    carried
}

fn drop_jumps_to_next<T>(lines: &mut Vec<Line<T>>) {
    let mut i = 0;
    while i + 1 < lines.len() {
        let line = &lines[i];
        let jumps_to_next = line.kind == LineKind::BranchAlways
            && line.label.is_none()
            && line.target.is_some()
            && line.target == lines[i + 1].label;
        if jumps_to_next {
            let removed = lines.remove(i);
            if let Some(next) = lines.get_mut(i) {
                let mut debug = removed.debug;
                debug.append(&mut next.debug);
                next.debug = debug;
            }
            log::trace!("peephole: dropped jump to next line");
        } else {
            i += 1;
        }
    }
}
