//! GL layer error types.

use thiserror::Error;

use crate::types::ShaderStage;

/// Errors that can occur in the GL handle layer.
///
/// All of these are reported synchronously at the offending call. Driver
/// diagnostics travel separately through the debug channel (see [`crate::debug`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GlError {
    /// Operation on a destroyed wrapper, or on a wrapper that refers to a
    /// destroyed resource.
    #[error("invalid {kind} handle")]
    InvalidHandle {
        /// Kind of resource the handle refers to.
        kind: &'static str,
    },
    /// A value outside a closed enumerant set reached a dispatch point.
    #[error("unknown {family} enumerant 0x{value:04X}")]
    UnknownEnumerant {
        /// Name of the enumerant family.
        family: &'static str,
        /// The raw value that was not recognized.
        value: u32,
    },
    /// A sub-range lies outside the allocated extent.
    #[error("range [{offset}, {offset}+{size}) exceeds extent of {extent} bytes")]
    OutOfBounds {
        /// Start of the requested range.
        offset: usize,
        /// Length of the requested range.
        size: usize,
        /// Size of the allocation the range was checked against.
        extent: usize,
    },
    /// The native layer failed an operation assumed to be infallible.
    #[error("engine error: {0}")]
    Engine(String),
    /// The info log had a different length than the one just queried.
    #[error("info log length mismatch: queried {expected} bytes, received {actual}")]
    InfoLogMismatch {
        /// Length reported by the length query, terminator included.
        expected: usize,
        /// Length actually written by the driver, terminator included.
        actual: usize,
    },
    /// The call is not legal in the wrapper's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// An argument is outside its accepted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The owning context has been dropped.
    #[error("GL context has been dropped")]
    ContextLost,
    /// The backend could not be initialized.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// A shader stage failed to compile.
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompilationFailed {
        /// Stage that failed.
        stage: ShaderStage,
        /// Compiler diagnostics.
        log: String,
    },
    /// A program failed to link.
    #[error("program failed to link: {log}")]
    ProgramLinkFailed {
        /// Linker diagnostics.
        log: String,
    },
}

/// Result alias used throughout the crate.
pub type GlResult<T> = Result<T, GlError>;
