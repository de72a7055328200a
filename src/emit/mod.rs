pub mod debug;
mod error;
pub mod instr;
mod module;
mod object;
mod operand;
pub mod peephole;
mod routine;
pub mod sanitize;
pub mod stream;
mod symbols;
mod table;
mod version;

pub use debug::{DebugFileBuilder, SourceSpan};
pub use error::{EmitError, EmitResult};
pub use module::{ModuleBuilder, TableId, WordId};
pub use object::{
    FlagBuilder, FlagId, GlobalBuilder, GlobalId, ObjectBuilder, ObjectId, PropertyBuilder,
    PropertyId,
};
pub use operand::{Operand, OperandPool, VarScope};
pub use peephole::Label;
pub use routine::{
    BinaryOp, Condition, NullaryOp, PrintOp, RoutineBuilder, RoutineId, TernaryOp, UnaryOp,
};
pub use sanitize::{quote_string, sanitize_symbol};
pub use stream::{FileStreamFactory, MemoryStreamFactory, Segment, ZapStreamFactory};
pub use symbols::{SymbolKind, SymbolTable};
pub use table::{TableBuilder, WordBuilder};
pub use version::ZVersion;

/// One indentation unit. Every directive and instruction line starts with it.
pub(crate) const INDENT: &str = "\t";
