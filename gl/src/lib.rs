//! # RedLilium GL
//!
//! Type-safe handles over the OpenGL 4.5 direct-state-access API.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GlContext`] - Owner of one driver context and factory for every resource
//! - [`Buffer`], [`VertexArray`], [`Shader`], [`Program`] - Wrappers exclusively owning one object name
//! - [`types`] - Typed flag families and closed enumerant sets for every parameter
//! - [`debug`] - Classification of driver debug messages, delivered to a [`DebugSink`]
//! - [`state`] - Clears, capabilities and draw calls
//! - Backends: `native` (function pointers loaded through the `gl` crate) and `dummy` (in-memory emulation for tests)
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_gl::{
//!     state, BufferUsage, ContextDescriptor, DataType, GlContext, NativeBackend, PrimitiveTopology,
//! };
//!
//! let backend = NativeBackend::load_with(|name| window.get_proc_address(name))?;
//! let context = GlContext::new(backend, ContextDescriptor::new())?;
//!
//! let mut vertices = context.create_buffer()?;
//! vertices.data_from(&[0.0f32, 0.5, -0.5, -0.5, 0.5, -0.5], BufferUsage::StaticDraw)?;
//!
//! let mut vertex_array = context.create_vertex_array()?;
//! vertex_array.enable_attrib(0)?;
//! vertex_array.attrib_format(0, 2, DataType::Float, false, 0)?;
//! vertex_array.vertex_buffer(0, &vertices, 0, 8)?;
//! vertex_array.bind()?;
//! state::draw_arrays(&context, PrimitiveTopology::Triangles, 0, 3)?;
//! ```

pub mod backend;
pub mod context;
pub mod debug;
pub mod error;
mod registry;
pub mod resources;
pub mod state;
pub mod types;

// Re-export main types for convenience
#[cfg(feature = "dummy")]
pub use backend::DummyBackend;
#[cfg(feature = "native")]
pub use backend::NativeBackend;
pub use backend::{DebugHandler, GlBackend, RawDebugMessage};
pub use context::{ContextDescriptor, ContextLimits, GlContext};
pub use debug::{DebugEvent, DebugSink, LogSink, RecordingSink};
pub use error::{GlError, GlResult};
pub use resources::{Buffer, BufferMapping, Program, ResourceId, Shader, VertexArray};
pub use types::{
    BufferMapAccess, BufferStorageFlags, BufferUsage, Capability, ClearBufferBits, DataType,
    DebugKind, DebugSeverity, DebugSource, PrimitiveTopology, ProgramParameter, ShaderParameter,
    ShaderStage,
};

/// GL library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
