//! Native call boundary.
//!
//! This module defines the trait every GL implementation must provide. The
//! methods map one-to-one onto OpenGL 4.5 direct-state-access entry points and
//! take raw object names and raw enum values: all type checking happens in the
//! layers above.
//!
//! # Available Backends
//!
//! - `dummy` (default): in-memory emulation of a context for tests and headless tools
//! - `native` (default): the real driver through the `gl` crate's function pointers
//!
//! # Error Reporting
//!
//! Like the driver itself, a backend never fails in-band. A rejected call sets
//! the context error flag (read with [`GlBackend::get_error`]) and, when debug
//! output is enabled, is reported to the installed [`DebugHandler`].

#[cfg(feature = "dummy")]
pub mod dummy;

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "dummy")]
pub use dummy::DummyBackend;

#[cfg(feature = "native")]
pub use native::NativeBackend;

/// A debug message exactly as the driver delivered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDebugMessage<'a> {
    /// Raw `GL_DEBUG_SOURCE_*` value.
    pub source: u32,
    /// Raw `GL_DEBUG_TYPE_*` value.
    pub kind: u32,
    /// Implementation-defined message id.
    pub id: u32,
    /// Raw `GL_DEBUG_SEVERITY_*` value.
    pub severity: u32,
    /// Message text.
    pub message: &'a str,
}

/// Callback receiving raw debug messages.
///
/// Runs on the thread that owns the context, at a point chosen by the driver.
/// A handler may replace or remove itself while it runs.
pub type DebugHandler = Box<dyn Fn(&RawDebugMessage<'_>)>;

/// GL backend trait.
///
/// Implementations are bound to a single context and are only called from the
/// thread where that context is current.
pub trait GlBackend: 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    // Buffers

    /// `glCreateBuffers` for a single name; zero on failure.
    fn create_buffer(&self) -> u32;

    /// `glDeleteBuffers` for a single name.
    fn delete_buffer(&self, buffer: u32);

    /// `glNamedBufferStorage`.
    fn buffer_storage(&self, buffer: u32, size: usize, data: Option<&[u8]>, flags: u32);

    /// `glNamedBufferData`.
    fn buffer_data(&self, buffer: u32, size: usize, data: Option<&[u8]>, usage: u32);

    /// `glNamedBufferSubData`.
    fn buffer_sub_data(&self, buffer: u32, offset: usize, data: &[u8]);

    /// `glGetNamedBufferSubData`.
    fn get_buffer_sub_data(&self, buffer: u32, offset: usize, data: &mut [u8]);

    /// `glCopyNamedBufferSubData`.
    fn copy_buffer_sub_data(
        &self,
        read: u32,
        write: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    );

    /// `glMapNamedBufferRange`; null on failure.
    fn map_buffer_range(&self, buffer: u32, offset: usize, length: usize, access: u32) -> *mut u8;

    /// `glFlushMappedNamedBufferRange`, offset relative to the mapping.
    fn flush_mapped_buffer_range(&self, buffer: u32, offset: usize, length: usize);

    /// `glUnmapNamedBuffer`; `false` when the data store became corrupt.
    fn unmap_buffer(&self, buffer: u32) -> bool;

    /// `glInvalidateBufferData`.
    fn invalidate_buffer_data(&self, buffer: u32);

    /// `glInvalidateBufferSubData`.
    fn invalidate_buffer_sub_data(&self, buffer: u32, offset: usize, length: usize);

    // Vertex arrays

    /// `glCreateVertexArrays` for a single name; zero on failure.
    fn create_vertex_array(&self) -> u32;

    /// `glDeleteVertexArrays` for a single name.
    fn delete_vertex_array(&self, vertex_array: u32);

    /// `glBindVertexArray`; zero unbinds.
    fn bind_vertex_array(&self, vertex_array: u32);

    /// `glEnableVertexArrayAttrib`.
    fn enable_vertex_array_attrib(&self, vertex_array: u32, index: u32);

    /// `glDisableVertexArrayAttrib`.
    fn disable_vertex_array_attrib(&self, vertex_array: u32, index: u32);

    /// `glVertexArrayAttribBinding`.
    fn vertex_array_attrib_binding(&self, vertex_array: u32, attrib: u32, binding: u32);

    /// `glVertexArrayAttribFormat`.
    fn vertex_array_attrib_format(
        &self,
        vertex_array: u32,
        attrib: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        relative_offset: u32,
    );

    /// `glVertexArrayVertexBuffer`.
    fn vertex_array_vertex_buffer(
        &self,
        vertex_array: u32,
        binding: u32,
        buffer: u32,
        offset: usize,
        stride: u32,
    );

    /// `glVertexArrayElementBuffer`.
    fn vertex_array_element_buffer(&self, vertex_array: u32, buffer: u32);

    // Shaders

    /// `glCreateShader`; zero on failure.
    fn create_shader(&self, stage: u32) -> u32;

    /// `glDeleteShader`.
    fn delete_shader(&self, shader: u32);

    /// `glShaderSource` with a single string.
    fn shader_source(&self, shader: u32, source: &str);

    /// `glCompileShader`.
    fn compile_shader(&self, shader: u32);

    /// `glGetShaderiv`.
    fn get_shader_iv(&self, shader: u32, pname: u32) -> i32;

    /// `glGetShaderInfoLog` into `buffer`; returns the number of bytes
    /// written, excluding the terminator.
    fn get_shader_info_log(&self, shader: u32, buffer: &mut [u8]) -> usize;

    // Programs

    /// `glCreateProgram`; zero on failure.
    fn create_program(&self) -> u32;

    /// `glDeleteProgram`.
    fn delete_program(&self, program: u32);

    /// `glAttachShader`.
    fn attach_shader(&self, program: u32, shader: u32);

    /// `glDetachShader`.
    fn detach_shader(&self, program: u32, shader: u32);

    /// `glLinkProgram`.
    fn link_program(&self, program: u32);

    /// `glUseProgram`; zero unbinds.
    fn use_program(&self, program: u32);

    /// `glGetProgramiv`.
    fn get_program_iv(&self, program: u32, pname: u32) -> i32;

    /// `glGetProgramInfoLog` into `buffer`; returns the number of bytes
    /// written, excluding the terminator.
    fn get_program_info_log(&self, program: u32, buffer: &mut [u8]) -> usize;

    // Global state

    /// `glClearColor`.
    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);

    /// `glClear`.
    fn clear(&self, mask: u32);

    /// `glEnable`.
    fn enable(&self, capability: u32);

    /// `glDisable`.
    fn disable(&self, capability: u32);

    /// `glDrawArrays`.
    fn draw_arrays(&self, mode: u32, first: i32, count: i32);

    /// `glDrawElements` reading indices from the bound element buffer.
    fn draw_elements(&self, mode: u32, count: i32, ty: u32, offset: usize);

    /// `glGetError`; returns and clears the error flag.
    fn get_error(&self) -> u32;

    /// `glGetIntegerv` for a single-valued implementation limit.
    fn get_integer(&self, pname: u32) -> i32;

    // Debug output

    /// Install or remove the debug message handler (`glDebugMessageCallback`).
    fn set_debug_handler(&self, handler: Option<DebugHandler>);

    /// `glDebugMessageInsert`.
    fn debug_message_insert(&self, source: u32, kind: u32, id: u32, severity: u32, message: &str);
}
