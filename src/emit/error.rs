use std::io;
use thiserror::Error;

/// Errors raised by the emitter. All of them are fatal for the module being
/// built; callers are expected to abort rather than keep emitting.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("unsupported Z-machine version {0} (expected 1-8)")]
    UnsupportedVersion(i32),

    #[error("duplicate symbol '{0}'")]
    DuplicateSymbol(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("too many arguments to {callee}: {count} given, version {version} allows {max}")]
    TooManyArguments {
        callee: String,
        count: usize,
        max: usize,
        version: u8,
    },

    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type EmitResult<T> = Result<T, EmitError>;
