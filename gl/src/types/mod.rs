//! Typed parameters for the GL call boundary.
//!
//! This module contains the bitmask flag families and the closed enumerant
//! families used by every resource and state operation.

mod enums;
mod flags;

pub use enums::{
    BufferUsage, Capability, DataType, DebugKind, DebugSeverity, DebugSource, PrimitiveTopology,
    ProgramParameter, ShaderParameter, ShaderStage,
};
pub use flags::{BufferMapAccess, BufferStorageFlags, ClearBufferBits};
