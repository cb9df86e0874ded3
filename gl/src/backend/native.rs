//! Native OpenGL backend.
//!
//! Calls the driver through the function pointers generated by the `gl`
//! crate. The windowing layer creates the context, makes it current and hands
//! its `get_proc_address` to [`NativeBackend::load_with`].

use std::cell::RefCell;
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::rc::Rc;

use gl::types::{GLchar, GLenum, GLint, GLintptr, GLsizei, GLsizeiptr, GLuint};

use crate::error::GlError;

use super::{DebugHandler, GlBackend, RawDebugMessage};

/// Backend driving a real OpenGL 4.5 context.
pub struct NativeBackend {
    // Reference counted so the driver receives a thin pointer, and a running
    // callback keeps its handler alive when it is replaced.
    debug_handler: RefCell<Option<Rc<DebugHandler>>>,
}

impl NativeBackend {
    /// Load the entry points from the current context.
    ///
    /// # Errors
    ///
    /// Returns an error if the context does not expose the 4.5
    /// direct-state-access entry points this layer is built on.
    pub fn load_with<F>(mut loader: F) -> Result<Self, GlError>
    where
        F: FnMut(&str) -> *const c_void,
    {
        gl::load_with(|symbol| loader(symbol));

        let required = [
            ("glCreateBuffers", gl::CreateBuffers::is_loaded()),
            ("glNamedBufferStorage", gl::NamedBufferStorage::is_loaded()),
            ("glMapNamedBufferRange", gl::MapNamedBufferRange::is_loaded()),
            ("glCreateVertexArrays", gl::CreateVertexArrays::is_loaded()),
            ("glVertexArrayAttribFormat", gl::VertexArrayAttribFormat::is_loaded()),
            ("glDebugMessageCallback", gl::DebugMessageCallback::is_loaded()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, loaded)| !loaded)
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(GlError::InitializationFailed(format!(
                "missing OpenGL 4.5 entry points: {}",
                missing.join(", ")
            )));
        }

        log::info!("NativeBackend: OpenGL entry points loaded");

        Ok(Self {
            debug_handler: RefCell::new(None),
        })
    }
}

impl std::fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend")
            .field("debug_handler", &self.debug_handler.borrow().is_some())
            .finish()
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        if self.debug_handler.borrow().is_some() {
            // SAFETY: entry points were loaded in `load_with`
            unsafe { gl::DebugMessageCallback(None, std::ptr::null()) };
        }
    }
}

/// Debug callback registered with the driver.
extern "system" fn debug_callback(
    source: GLenum,
    gltype: GLenum,
    id: GLuint,
    severity: GLenum,
    length: GLsizei,
    message: *const GLchar,
    user_param: *mut c_void,
) {
    if user_param.is_null() || message.is_null() {
        return;
    }

    // SAFETY: `user_param` came from `Rc::as_ptr` on the handler owned by
    // `NativeBackend`, which unregisters the callback before releasing it.
    // Taking a strong reference keeps it alive if the handler replaces itself.
    let handler = unsafe {
        let ptr = user_param as *const DebugHandler;
        Rc::increment_strong_count(ptr);
        Rc::from_raw(ptr)
    };

    // SAFETY: the driver guarantees `message` is valid for the callback's duration
    let bytes = unsafe {
        if length >= 0 {
            std::slice::from_raw_parts(message as *const u8, length as usize)
        } else {
            CStr::from_ptr(message as *const c_char).to_bytes()
        }
    };
    let text = String::from_utf8_lossy(bytes);

    (*handler)(&RawDebugMessage {
        source,
        kind: gltype,
        id,
        severity,
        message: &text,
    });
}

fn as_ptr(data: Option<&[u8]>) -> *const c_void {
    data.map_or(std::ptr::null(), |bytes| bytes.as_ptr() as *const c_void)
}

// SAFETY (all methods): the entry points were loaded in `load_with`, the context is
// current on this thread, and every slice passed to the driver outlives the call.
impl GlBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "Native OpenGL"
    }

    fn create_buffer(&self) -> u32 {
        let mut name = 0;
        unsafe { gl::CreateBuffers(1, &mut name) };
        name
    }

    fn delete_buffer(&self, buffer: u32) {
        unsafe { gl::DeleteBuffers(1, &buffer) };
    }

    fn buffer_storage(&self, buffer: u32, size: usize, data: Option<&[u8]>, flags: u32) {
        unsafe { gl::NamedBufferStorage(buffer, size as GLsizeiptr, as_ptr(data), flags) };
    }

    fn buffer_data(&self, buffer: u32, size: usize, data: Option<&[u8]>, usage: u32) {
        unsafe { gl::NamedBufferData(buffer, size as GLsizeiptr, as_ptr(data), usage) };
    }

    fn buffer_sub_data(&self, buffer: u32, offset: usize, data: &[u8]) {
        unsafe {
            gl::NamedBufferSubData(
                buffer,
                offset as GLintptr,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const c_void,
            )
        };
    }

    fn get_buffer_sub_data(&self, buffer: u32, offset: usize, data: &mut [u8]) {
        unsafe {
            gl::GetNamedBufferSubData(
                buffer,
                offset as GLintptr,
                data.len() as GLsizeiptr,
                data.as_mut_ptr() as *mut c_void,
            )
        };
    }

    fn copy_buffer_sub_data(
        &self,
        read: u32,
        write: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        unsafe {
            gl::CopyNamedBufferSubData(
                read,
                write,
                read_offset as GLintptr,
                write_offset as GLintptr,
                size as GLsizeiptr,
            )
        };
    }

    fn map_buffer_range(&self, buffer: u32, offset: usize, length: usize, access: u32) -> *mut u8 {
        unsafe {
            gl::MapNamedBufferRange(buffer, offset as GLintptr, length as GLsizeiptr, access)
                as *mut u8
        }
    }

    fn flush_mapped_buffer_range(&self, buffer: u32, offset: usize, length: usize) {
        unsafe {
            gl::FlushMappedNamedBufferRange(buffer, offset as GLintptr, length as GLsizeiptr)
        };
    }

    fn unmap_buffer(&self, buffer: u32) -> bool {
        unsafe { gl::UnmapNamedBuffer(buffer) == gl::TRUE }
    }

    fn invalidate_buffer_data(&self, buffer: u32) {
        unsafe { gl::InvalidateBufferData(buffer) };
    }

    fn invalidate_buffer_sub_data(&self, buffer: u32, offset: usize, length: usize) {
        unsafe {
            gl::InvalidateBufferSubData(buffer, offset as GLintptr, length as GLsizeiptr)
        };
    }

    fn create_vertex_array(&self) -> u32 {
        let mut name = 0;
        unsafe { gl::CreateVertexArrays(1, &mut name) };
        name
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        unsafe { gl::DeleteVertexArrays(1, &vertex_array) };
    }

    fn bind_vertex_array(&self, vertex_array: u32) {
        unsafe { gl::BindVertexArray(vertex_array) };
    }

    fn enable_vertex_array_attrib(&self, vertex_array: u32, index: u32) {
        unsafe { gl::EnableVertexArrayAttrib(vertex_array, index) };
    }

    fn disable_vertex_array_attrib(&self, vertex_array: u32, index: u32) {
        unsafe { gl::DisableVertexArrayAttrib(vertex_array, index) };
    }

    fn vertex_array_attrib_binding(&self, vertex_array: u32, attrib: u32, binding: u32) {
        unsafe { gl::VertexArrayAttribBinding(vertex_array, attrib, binding) };
    }

    fn vertex_array_attrib_format(
        &self,
        vertex_array: u32,
        attrib: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        relative_offset: u32,
    ) {
        let normalized = if normalized { gl::TRUE } else { gl::FALSE };
        unsafe {
            gl::VertexArrayAttribFormat(vertex_array, attrib, size, ty, normalized, relative_offset)
        };
    }

    fn vertex_array_vertex_buffer(
        &self,
        vertex_array: u32,
        binding: u32,
        buffer: u32,
        offset: usize,
        stride: u32,
    ) {
        unsafe {
            gl::VertexArrayVertexBuffer(
                vertex_array,
                binding,
                buffer,
                offset as GLintptr,
                stride as GLsizei,
            )
        };
    }

    fn vertex_array_element_buffer(&self, vertex_array: u32, buffer: u32) {
        unsafe { gl::VertexArrayElementBuffer(vertex_array, buffer) };
    }

    fn create_shader(&self, stage: u32) -> u32 {
        unsafe { gl::CreateShader(stage) }
    }

    fn delete_shader(&self, shader: u32) {
        unsafe { gl::DeleteShader(shader) };
    }

    fn shader_source(&self, shader: u32, source: &str) {
        let pointer = source.as_ptr() as *const GLchar;
        let length = source.len() as GLint;
        unsafe { gl::ShaderSource(shader, 1, &pointer, &length) };
    }

    fn compile_shader(&self, shader: u32) {
        unsafe { gl::CompileShader(shader) };
    }

    fn get_shader_iv(&self, shader: u32, pname: u32) -> i32 {
        let mut value = 0;
        unsafe { gl::GetShaderiv(shader, pname, &mut value) };
        value
    }

    fn get_shader_info_log(&self, shader: u32, buffer: &mut [u8]) -> usize {
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetShaderInfoLog(
                shader,
                buffer.len() as GLsizei,
                &mut written,
                buffer.as_mut_ptr() as *mut GLchar,
            )
        };
        written.max(0) as usize
    }

    fn create_program(&self) -> u32 {
        unsafe { gl::CreateProgram() }
    }

    fn delete_program(&self, program: u32) {
        unsafe { gl::DeleteProgram(program) };
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        unsafe { gl::AttachShader(program, shader) };
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        unsafe { gl::DetachShader(program, shader) };
    }

    fn link_program(&self, program: u32) {
        unsafe { gl::LinkProgram(program) };
    }

    fn use_program(&self, program: u32) {
        unsafe { gl::UseProgram(program) };
    }

    fn get_program_iv(&self, program: u32, pname: u32) -> i32 {
        let mut value = 0;
        unsafe { gl::GetProgramiv(program, pname, &mut value) };
        value
    }

    fn get_program_info_log(&self, program: u32, buffer: &mut [u8]) -> usize {
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetProgramInfoLog(
                program,
                buffer.len() as GLsizei,
                &mut written,
                buffer.as_mut_ptr() as *mut GLchar,
            )
        };
        written.max(0) as usize
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        unsafe { gl::ClearColor(red, green, blue, alpha) };
    }

    fn clear(&self, mask: u32) {
        unsafe { gl::Clear(mask) };
    }

    fn enable(&self, capability: u32) {
        unsafe { gl::Enable(capability) };
    }

    fn disable(&self, capability: u32) {
        unsafe { gl::Disable(capability) };
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { gl::DrawArrays(mode, first, count) };
    }

    fn draw_elements(&self, mode: u32, count: i32, ty: u32, offset: usize) {
        unsafe { gl::DrawElements(mode, count, ty, offset as *const c_void) };
    }

    fn get_error(&self) -> u32 {
        unsafe { gl::GetError() }
    }

    fn get_integer(&self, pname: u32) -> i32 {
        let mut value: GLint = 0;
        unsafe { gl::GetIntegerv(pname, &mut value) };
        value
    }

    fn set_debug_handler(&self, handler: Option<DebugHandler>) {
        // Unregister first so the driver never sees a dangling pointer.
        unsafe { gl::DebugMessageCallback(None, std::ptr::null()) };

        let handler = handler.map(Rc::new);
        // The previous handler may own a context; drop it outside the borrow.
        let previous = std::mem::replace(&mut *self.debug_handler.borrow_mut(), handler.clone());
        drop(previous);

        if let Some(handler) = handler {
            let user_param = Rc::as_ptr(&handler) as *const c_void;
            unsafe { gl::DebugMessageCallback(Some(debug_callback), user_param) };
        }
    }

    fn debug_message_insert(&self, source: u32, kind: u32, id: u32, severity: u32, message: &str) {
        unsafe {
            gl::DebugMessageInsert(
                source,
                kind,
                id,
                severity,
                message.len() as GLsizei,
                message.as_ptr() as *const GLchar,
            )
        };
    }
}
