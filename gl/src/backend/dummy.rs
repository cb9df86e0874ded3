//! Dummy GL backend for testing and development.
//!
//! This backend emulates an OpenGL 4.5 core context in memory. Buffer
//! contents are stored and can be mapped, shaders are run through a small
//! syntax checker, programs are linked, and draw calls fetch their vertex
//! attributes so tests can inspect what the pipeline would have consumed.
//! Rejected calls set the error flag and raise a debug message the way a
//! driver does.
//!
//! Clones share the same emulated context, so a test can keep a clone around
//! to inspect state while a [`GlContext`](crate::GlContext) owns the other.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use crate::types::{
    BufferUsage, Capability, DataType, DebugKind, DebugSeverity, PrimitiveTopology, ShaderStage,
};

use super::{DebugHandler, GlBackend, RawDebugMessage};

/// `GL_MAX_VERTEX_ATTRIBS` reported by the emulation.
pub const MAX_VERTEX_ATTRIBS: u32 = 16;

/// `GL_MAX_VERTEX_ATTRIB_BINDINGS` reported by the emulation.
pub const MAX_VERTEX_ATTRIB_BINDINGS: u32 = 16;

/// `GL_MAX_VERTEX_ATTRIB_STRIDE` reported by the emulation.
pub const MAX_VERTEX_ATTRIB_STRIDE: u32 = 2048;

/// `GL_MAX_VERTEX_ATTRIB_RELATIVE_OFFSET` reported by the emulation.
pub const MAX_VERTEX_ATTRIB_RELATIVE_OFFSET: u32 = 2047;

/// `GL_MAX_DEBUG_MESSAGE_LENGTH` reported by the emulation.
pub const MAX_DEBUG_MESSAGE_LENGTH: usize = 1024;

/// Message id used for buffer placement notifications.
const BUFFER_PLACEMENT_MESSAGE_ID: u32 = 131_185;

/// Message id used for shader compiler reports.
const SHADER_COMPILER_MESSAGE_ID: u32 = 1;

/// Message id used for undefined vertex fetches.
const UNDEFINED_FETCH_MESSAGE_ID: u32 = 2;

const VALID_STORAGE_BITS: u32 = gl::MAP_READ_BIT
    | gl::MAP_WRITE_BIT
    | gl::MAP_PERSISTENT_BIT
    | gl::MAP_COHERENT_BIT
    | gl::DYNAMIC_STORAGE_BIT
    | gl::CLIENT_STORAGE_BIT;

const VALID_ACCESS_BITS: u32 = gl::MAP_READ_BIT
    | gl::MAP_WRITE_BIT
    | gl::MAP_INVALIDATE_RANGE_BIT
    | gl::MAP_INVALIDATE_BUFFER_BIT
    | gl::MAP_FLUSH_EXPLICIT_BIT
    | gl::MAP_UNSYNCHRONIZED_BIT
    | gl::MAP_PERSISTENT_BIT
    | gl::MAP_COHERENT_BIT;

const VALID_CLEAR_BITS: u32 = gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT;

// ============================================================================
// Recorded Commands
// ============================================================================

/// A draw call accepted by the emulation, with the attributes it fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Raw primitive topology.
    pub mode: u32,
    /// Program current at the time of the draw.
    pub program: u32,
    /// Vertex array bound at the time of the draw.
    pub vertex_array: u32,
    /// Indices read from the element buffer, for indexed draws.
    pub indices: Option<Vec<u32>>,
    /// Fetched components per enabled attribute index, one entry per vertex.
    pub attributes: BTreeMap<u32, Vec<Vec<f32>>>,
}

impl DrawCall {
    /// Number of vertices processed by the draw.
    pub fn vertex_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.attributes.values().next().map_or(0, Vec::len),
        }
    }
}

/// A clear accepted by the emulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearRecord {
    /// Raw clear mask.
    pub mask: u32,
    /// Clear color in effect.
    pub color: [f32; 4],
}

// ============================================================================
// Emulated Objects
// ============================================================================

/// Lowest-free name allocator, mirroring how drivers recycle names.
#[derive(Debug)]
struct NameAllocator {
    next: u32,
    free: BTreeSet<u32>,
}

impl NameAllocator {
    fn new() -> Self {
        Self {
            next: 1,
            free: BTreeSet::new(),
        }
    }

    fn allocate(&mut self) -> u32 {
        if let Some(name) = self.free.pop_first() {
            return name;
        }
        let name = self.next;
        self.next += 1;
        name
    }

    fn release(&mut self, name: u32) {
        self.free.insert(name);
    }
}

#[derive(Debug)]
struct DummyMapping {
    offset: usize,
    access: u32,
    staging: Vec<u8>,
}

#[derive(Debug, Default)]
struct DummyBuffer {
    data: Vec<u8>,
    immutable: bool,
    storage_flags: u32,
    usage: u32,
    mapping: Option<DummyMapping>,
}

impl DummyBuffer {
    /// Mapped in a way that forbids other access to the store.
    fn exclusively_mapped(&self) -> bool {
        self.mapping
            .as_ref()
            .is_some_and(|m| m.access & gl::MAP_PERSISTENT_BIT == 0)
    }
}

#[derive(Debug, Clone, Copy)]
struct DummyAttrib {
    enabled: bool,
    binding: u32,
    size: i32,
    ty: u32,
    normalized: bool,
    relative_offset: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct DummyBinding {
    buffer: u32,
    offset: usize,
    stride: u32,
}

#[derive(Debug)]
struct DummyVertexArray {
    attribs: Vec<DummyAttrib>,
    bindings: Vec<DummyBinding>,
    element_buffer: u32,
}

impl DummyVertexArray {
    fn new() -> Self {
        let attribs = (0..MAX_VERTEX_ATTRIBS)
            .map(|index| DummyAttrib {
                enabled: false,
                binding: index,
                size: 4,
                ty: gl::FLOAT,
                normalized: false,
                relative_offset: 0,
            })
            .collect();
        Self {
            attribs,
            bindings: vec![DummyBinding::default(); MAX_VERTEX_ATTRIB_BINDINGS as usize],
            element_buffer: 0,
        }
    }
}

#[derive(Debug)]
struct DummyShader {
    stage: u32,
    source: Option<String>,
    compiled: bool,
    info_log: String,
    delete_pending: bool,
    inputs: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Default)]
struct DummyProgram {
    attached: Vec<u32>,
    linked: bool,
    info_log: String,
    delete_pending: bool,
    active_attributes: Vec<String>,
    active_uniforms: Vec<String>,
}

#[derive(Debug)]
struct PendingMessage {
    source: u32,
    kind: u32,
    id: u32,
    severity: u32,
    message: String,
}

// ============================================================================
// Context State
// ============================================================================

#[derive(Debug)]
struct DummyState {
    buffer_names: NameAllocator,
    vertex_array_names: NameAllocator,
    // Shaders and programs share one namespace.
    object_names: NameAllocator,

    buffers: HashMap<u32, DummyBuffer>,
    vertex_arrays: HashMap<u32, DummyVertexArray>,
    shaders: HashMap<u32, DummyShader>,
    programs: HashMap<u32, DummyProgram>,

    bound_vertex_array: u32,
    current_program: u32,
    capabilities: HashSet<u32>,
    clear_color: [f32; 4],
    error: u32,

    clears: Vec<ClearRecord>,
    draw_calls: Vec<DrawCall>,
    pending: Vec<PendingMessage>,

    fail_next_create: bool,
    fail_next_allocation: bool,
    fail_next_unmap: bool,
    info_log_skew: i32,
}

impl DummyState {
    fn new() -> Self {
        Self {
            buffer_names: NameAllocator::new(),
            vertex_array_names: NameAllocator::new(),
            object_names: NameAllocator::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            bound_vertex_array: 0,
            current_program: 0,
            capabilities: [gl::DEBUG_OUTPUT, gl::DITHER, gl::MULTISAMPLE]
                .into_iter()
                .collect(),
            clear_color: [0.0; 4],
            error: gl::NO_ERROR,
            clears: Vec::new(),
            draw_calls: Vec::new(),
            pending: Vec::new(),
            fail_next_create: false,
            fail_next_allocation: false,
            fail_next_unmap: false,
            info_log_skew: 0,
        }
    }

    /// Record an API error: set the flag and queue a high-severity message.
    fn reject(&mut self, code: u32, message: impl Into<String>) {
        let message = message.into();
        log::trace!("DummyBackend: rejected call: {}", message);
        if self.error == gl::NO_ERROR {
            self.error = code;
        }
        self.report(
            gl::DEBUG_SOURCE_API,
            gl::DEBUG_TYPE_ERROR,
            code,
            gl::DEBUG_SEVERITY_HIGH,
            message,
        );
    }

    fn report(&mut self, source: u32, kind: u32, id: u32, severity: u32, message: impl Into<String>) {
        self.pending.push(PendingMessage {
            source,
            kind,
            id,
            severity,
            message: message.into(),
        });
    }

    fn take_create_failure(&mut self, call: &str) -> bool {
        if self.fail_next_create {
            self.fail_next_create = false;
            self.reject(gl::OUT_OF_MEMORY, format!("{call}: out of memory"));
            return true;
        }
        false
    }

    fn take_allocation_failure(&mut self, call: &str) -> bool {
        if self.fail_next_allocation {
            self.fail_next_allocation = false;
            self.reject(gl::OUT_OF_MEMORY, format!("{call}: out of memory"));
            return true;
        }
        false
    }

    fn check_buffer(&mut self, call: &str, buffer: u32) -> bool {
        if self.buffers.contains_key(&buffer) {
            return true;
        }
        self.reject(
            gl::INVALID_OPERATION,
            format!("{call}: buffer {buffer} is not the name of an existing buffer object"),
        );
        false
    }

    fn check_vertex_array(&mut self, call: &str, vertex_array: u32) -> bool {
        if self.vertex_arrays.contains_key(&vertex_array) {
            return true;
        }
        self.reject(
            gl::INVALID_OPERATION,
            format!("{call}: vertex array {vertex_array} is not the name of an existing vertex array object"),
        );
        false
    }

    fn check_shader(&mut self, call: &str, shader: u32) -> bool {
        if self.shaders.contains_key(&shader) {
            return true;
        }
        if self.programs.contains_key(&shader) {
            self.reject(gl::INVALID_OPERATION, format!("{call}: {shader} is a program object"));
        } else {
            self.reject(gl::INVALID_VALUE, format!("{call}: {shader} is not a shader object"));
        }
        false
    }

    fn check_program(&mut self, call: &str, program: u32) -> bool {
        if self.programs.contains_key(&program) {
            return true;
        }
        if self.shaders.contains_key(&program) {
            self.reject(gl::INVALID_OPERATION, format!("{call}: {program} is a shader object"));
        } else {
            self.reject(gl::INVALID_VALUE, format!("{call}: {program} is not a program object"));
        }
        false
    }

    fn check_range(&mut self, call: &str, offset: usize, length: usize, extent: usize) -> bool {
        if range_within(offset, length, extent) {
            return true;
        }
        self.reject(
            gl::INVALID_VALUE,
            format!("{call}: range [{offset}, {offset}+{length}) exceeds buffer size {extent}"),
        );
        false
    }

    fn placement_notice(&mut self, buffer: u32, usage: &str) {
        self.report(
            gl::DEBUG_SOURCE_API,
            gl::DEBUG_TYPE_OTHER,
            BUFFER_PLACEMENT_MESSAGE_ID,
            gl::DEBUG_SEVERITY_NOTIFICATION,
            format!(
                "Buffer object {buffer} (bound to NONE, usage hint is {usage}) will use VIDEO memory as the source for buffer object operations."
            ),
        );
    }

    // ------------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------------

    fn create_buffer(&mut self) -> u32 {
        if self.take_create_failure("glCreateBuffers") {
            return 0;
        }
        let name = self.buffer_names.allocate();
        self.buffers.insert(name, DummyBuffer::default());
        log::trace!("DummyBackend: created buffer {}", name);
        name
    }

    fn delete_buffer(&mut self, buffer: u32) {
        if self.buffers.remove(&buffer).is_none() {
            return;
        }
        self.buffer_names.release(buffer);

        // Only the bound vertex array loses its references.
        if let Some(vao) = self.vertex_arrays.get_mut(&self.bound_vertex_array) {
            for binding in vao.bindings.iter_mut().filter(|b| b.buffer == buffer) {
                binding.buffer = 0;
            }
            if vao.element_buffer == buffer {
                vao.element_buffer = 0;
            }
        }
        log::trace!("DummyBackend: deleted buffer {}", buffer);
    }

    fn buffer_storage(&mut self, buffer: u32, size: usize, data: Option<&[u8]>, flags: u32) {
        const CALL: &str = "glNamedBufferStorage";
        if !self.check_buffer(CALL, buffer) || self.take_allocation_failure(CALL) {
            return;
        }
        if size == 0 {
            self.reject(gl::INVALID_VALUE, format!("{CALL}: size must be greater than zero"));
            return;
        }
        if flags & !VALID_STORAGE_BITS != 0 {
            self.reject(gl::INVALID_VALUE, format!("{CALL}: invalid flags 0x{flags:X}"));
            return;
        }
        if flags & gl::MAP_PERSISTENT_BIT != 0 && flags & (gl::MAP_READ_BIT | gl::MAP_WRITE_BIT) == 0 {
            self.reject(
                gl::INVALID_VALUE,
                format!("{CALL}: GL_MAP_PERSISTENT_BIT requires GL_MAP_READ_BIT or GL_MAP_WRITE_BIT"),
            );
            return;
        }
        if flags & gl::MAP_COHERENT_BIT != 0 && flags & gl::MAP_PERSISTENT_BIT == 0 {
            self.reject(
                gl::INVALID_VALUE,
                format!("{CALL}: GL_MAP_COHERENT_BIT requires GL_MAP_PERSISTENT_BIT"),
            );
            return;
        }

        let Some(object) = self.buffers.get_mut(&buffer) else {
            return;
        };
        if object.immutable {
            self.reject(
                gl::INVALID_OPERATION,
                format!("{CALL}: buffer {buffer} already has immutable storage"),
            );
            return;
        }

        object.data = initial_contents(size, data);
        object.immutable = true;
        object.storage_flags = flags;
        object.mapping = None;
        log::trace!(
            "DummyBackend: {}(buffer {}, size {}, flags 0x{:X})",
            CALL,
            buffer,
            size,
            flags
        );
        self.placement_notice(buffer, "GL_STATIC_DRAW");
    }

    fn buffer_data(&mut self, buffer: u32, size: usize, data: Option<&[u8]>, usage: u32) {
        const CALL: &str = "glNamedBufferData";
        if !self.check_buffer(CALL, buffer) || self.take_allocation_failure(CALL) {
            return;
        }
        let Ok(hint) = BufferUsage::try_from(usage) else {
            self.reject(gl::INVALID_ENUM, format!("{CALL}: invalid usage 0x{usage:04X}"));
            return;
        };

        let Some(object) = self.buffers.get_mut(&buffer) else {
            return;
        };
        if object.immutable {
            self.reject(
                gl::INVALID_OPERATION,
                format!("{CALL}: buffer {buffer} has immutable storage"),
            );
            return;
        }

        // Respecifying the store implicitly unmaps it.
        object.mapping = None;
        object.data = initial_contents(size, data);
        object.usage = usage;
        log::trace!(
            "DummyBackend: {}(buffer {}, size {}, usage {})",
            CALL,
            buffer,
            size,
            hint
        );
        self.placement_notice(buffer, &format!("GL_{}", hint.label().to_uppercase().replace(' ', "_")));
    }

    fn buffer_sub_data(&mut self, buffer: u32, offset: usize, data: &[u8]) {
        const CALL: &str = "glNamedBufferSubData";
        if !self.check_buffer(CALL, buffer) {
            return;
        }
        let (extent, immutable, flags, mapped) = {
            let object = &self.buffers[&buffer];
            (
                object.data.len(),
                object.immutable,
                object.storage_flags,
                object.exclusively_mapped(),
            )
        };
        if !self.check_range(CALL, offset, data.len(), extent) {
            return;
        }
        if immutable && flags & gl::DYNAMIC_STORAGE_BIT == 0 {
            self.reject(
                gl::INVALID_OPERATION,
                format!("{CALL}: buffer {buffer} storage lacks GL_DYNAMIC_STORAGE_BIT"),
            );
            return;
        }
        if mapped {
            self.reject(gl::INVALID_OPERATION, format!("{CALL}: buffer {buffer} is mapped"));
            return;
        }
        if let Some(object) = self.buffers.get_mut(&buffer) {
            object.data[offset..offset + data.len()].copy_from_slice(data);
        }
    }

    fn get_buffer_sub_data(&mut self, buffer: u32, offset: usize, out: &mut [u8]) {
        const CALL: &str = "glGetNamedBufferSubData";
        if !self.check_buffer(CALL, buffer) {
            return;
        }
        let (extent, mapped) = {
            let object = &self.buffers[&buffer];
            (object.data.len(), object.exclusively_mapped())
        };
        if !self.check_range(CALL, offset, out.len(), extent) {
            return;
        }
        if mapped {
            self.reject(gl::INVALID_OPERATION, format!("{CALL}: buffer {buffer} is mapped"));
            return;
        }
        let object = &self.buffers[&buffer];
        out.copy_from_slice(&object.data[offset..offset + out.len()]);
    }

    fn copy_buffer_sub_data(
        &mut self,
        read: u32,
        write: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        const CALL: &str = "glCopyNamedBufferSubData";
        if !self.check_buffer(CALL, read) || !self.check_buffer(CALL, write) {
            return;
        }
        let read_extent = self.buffers[&read].data.len();
        let write_extent = self.buffers[&write].data.len();
        if !self.check_range(CALL, read_offset, size, read_extent)
            || !self.check_range(CALL, write_offset, size, write_extent)
        {
            return;
        }
        if read == write && ranges_overlap(read_offset, write_offset, size) {
            self.reject(
                gl::INVALID_VALUE,
                format!("{CALL}: source and destination ranges overlap"),
            );
            return;
        }
        if self.buffers[&read].exclusively_mapped() || self.buffers[&write].exclusively_mapped() {
            self.reject(gl::INVALID_OPERATION, format!("{CALL}: a buffer is mapped"));
            return;
        }

        let chunk = self.buffers[&read].data[read_offset..read_offset + size].to_vec();
        if let Some(object) = self.buffers.get_mut(&write) {
            object.data[write_offset..write_offset + size].copy_from_slice(&chunk);
        }
    }

    fn map_buffer_range(&mut self, buffer: u32, offset: usize, length: usize, access: u32) -> *mut u8 {
        const CALL: &str = "glMapNamedBufferRange";
        if !self.check_buffer(CALL, buffer) {
            return std::ptr::null_mut();
        }
        let extent = self.buffers[&buffer].data.len();
        if length == 0 {
            self.reject(gl::INVALID_VALUE, format!("{CALL}: length must be greater than zero"));
            return std::ptr::null_mut();
        }
        if !self.check_range(CALL, offset, length, extent) {
            return std::ptr::null_mut();
        }
        if access & !VALID_ACCESS_BITS != 0 {
            self.reject(gl::INVALID_VALUE, format!("{CALL}: invalid access bits 0x{access:X}"));
            return std::ptr::null_mut();
        }
        if let Some(reason) = self.mapping_violation(buffer, access) {
            self.reject(gl::INVALID_OPERATION, format!("{CALL}: {reason}"));
            return std::ptr::null_mut();
        }

        let Some(object) = self.buffers.get_mut(&buffer) else {
            return std::ptr::null_mut();
        };
        let discard = access & (gl::MAP_INVALIDATE_RANGE_BIT | gl::MAP_INVALIDATE_BUFFER_BIT) != 0;
        let staging = if discard {
            vec![0; length]
        } else {
            object.data[offset..offset + length].to_vec()
        };
        let mapping = object.mapping.insert(DummyMapping {
            offset,
            access,
            staging,
        });
        log::trace!(
            "DummyBackend: mapped buffer {} [{}, {}+{}) access 0x{:X}",
            buffer,
            offset,
            offset,
            length,
            access
        );
        mapping.staging.as_mut_ptr()
    }

    fn mapping_violation(&self, buffer: u32, access: u32) -> Option<String> {
        let object = &self.buffers[&buffer];
        if object.mapping.is_some() {
            return Some(format!("buffer {buffer} is already mapped"));
        }
        if access & (gl::MAP_READ_BIT | gl::MAP_WRITE_BIT) == 0 {
            return Some("neither GL_MAP_READ_BIT nor GL_MAP_WRITE_BIT is set".into());
        }
        let read_forbidden =
            gl::MAP_INVALIDATE_RANGE_BIT | gl::MAP_INVALIDATE_BUFFER_BIT | gl::MAP_UNSYNCHRONIZED_BIT;
        if access & gl::MAP_READ_BIT != 0 && access & read_forbidden != 0 {
            return Some("GL_MAP_READ_BIT combined with invalidate or unsynchronized access".into());
        }
        if access & gl::MAP_FLUSH_EXPLICIT_BIT != 0 && access & gl::MAP_WRITE_BIT == 0 {
            return Some("GL_MAP_FLUSH_EXPLICIT_BIT requires GL_MAP_WRITE_BIT".into());
        }
        let storage_bits =
            gl::MAP_READ_BIT | gl::MAP_WRITE_BIT | gl::MAP_PERSISTENT_BIT | gl::MAP_COHERENT_BIT;
        if object.immutable {
            let missing = access & storage_bits & !object.storage_flags;
            if missing != 0 {
                return Some(format!(
                    "access bits 0x{missing:X} were not requested at storage allocation"
                ));
            }
        } else if access & (gl::MAP_PERSISTENT_BIT | gl::MAP_COHERENT_BIT) != 0 {
            return Some("persistent mappings require immutable storage".into());
        }
        None
    }

    fn flush_mapped_buffer_range(&mut self, buffer: u32, offset: usize, length: usize) {
        const CALL: &str = "glFlushMappedNamedBufferRange";
        if !self.check_buffer(CALL, buffer) {
            return;
        }
        let (mapped_length, explicit) = match &self.buffers[&buffer].mapping {
            Some(mapping) => (
                mapping.staging.len(),
                mapping.access & gl::MAP_FLUSH_EXPLICIT_BIT != 0,
            ),
            None => {
                self.reject(gl::INVALID_OPERATION, format!("{CALL}: buffer {buffer} is not mapped"));
                return;
            }
        };
        if !explicit {
            self.reject(
                gl::INVALID_OPERATION,
                format!("{CALL}: buffer {buffer} was not mapped with GL_MAP_FLUSH_EXPLICIT_BIT"),
            );
            return;
        }
        if !self.check_range(CALL, offset, length, mapped_length) {
            return;
        }
        if let Some(object) = self.buffers.get_mut(&buffer) {
            if let Some(mapping) = &object.mapping {
                let start = mapping.offset + offset;
                object.data[start..start + length]
                    .copy_from_slice(&mapping.staging[offset..offset + length]);
            }
        }
    }

    fn unmap_buffer(&mut self, buffer: u32) -> bool {
        const CALL: &str = "glUnmapNamedBuffer";
        if !self.check_buffer(CALL, buffer) {
            return false;
        }
        let Some(object) = self.buffers.get_mut(&buffer) else {
            return false;
        };
        let Some(mapping) = object.mapping.take() else {
            self.reject(gl::INVALID_OPERATION, format!("{CALL}: buffer {buffer} is not mapped"));
            return false;
        };

        let writes_back = mapping.access & gl::MAP_WRITE_BIT != 0
            && mapping.access & gl::MAP_FLUSH_EXPLICIT_BIT == 0;
        if writes_back {
            let end = mapping.offset + mapping.staging.len();
            object.data[mapping.offset..end].copy_from_slice(&mapping.staging);
        }
        log::trace!("DummyBackend: unmapped buffer {}", buffer);

        if self.fail_next_unmap {
            self.fail_next_unmap = false;
            return false;
        }
        true
    }

    fn invalidate_buffer_sub_data(&mut self, call: &str, buffer: u32, offset: usize, length: usize) {
        if !self.check_buffer(call, buffer) {
            return;
        }
        let (extent, mapped) = {
            let object = &self.buffers[&buffer];
            (object.data.len(), object.exclusively_mapped())
        };
        if !self.check_range(call, offset, length, extent) {
            return;
        }
        if mapped {
            self.reject(gl::INVALID_OPERATION, format!("{call}: buffer {buffer} is mapped"));
            return;
        }
        // Invalidated contents are undefined; the emulation reads them back as zero.
        if let Some(object) = self.buffers.get_mut(&buffer) {
            object.data[offset..offset + length].fill(0);
        }
    }

    // ------------------------------------------------------------------------
    // Vertex arrays
    // ------------------------------------------------------------------------

    fn create_vertex_array(&mut self) -> u32 {
        if self.take_create_failure("glCreateVertexArrays") {
            return 0;
        }
        let name = self.vertex_array_names.allocate();
        self.vertex_arrays.insert(name, DummyVertexArray::new());
        log::trace!("DummyBackend: created vertex array {}", name);
        name
    }

    fn delete_vertex_array(&mut self, vertex_array: u32) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            return;
        }
        self.vertex_array_names.release(vertex_array);
        if self.bound_vertex_array == vertex_array {
            self.bound_vertex_array = 0;
        }
        log::trace!("DummyBackend: deleted vertex array {}", vertex_array);
    }

    fn bind_vertex_array(&mut self, vertex_array: u32) {
        if vertex_array != 0 && !self.check_vertex_array("glBindVertexArray", vertex_array) {
            return;
        }
        self.bound_vertex_array = vertex_array;
    }

    fn attrib_mut(&mut self, call: &str, vertex_array: u32, index: u32) -> Option<&mut DummyAttrib> {
        if !self.check_vertex_array(call, vertex_array) {
            return None;
        }
        if index >= MAX_VERTEX_ATTRIBS {
            self.reject(
                gl::INVALID_VALUE,
                format!("{call}: index {index} exceeds GL_MAX_VERTEX_ATTRIBS"),
            );
            return None;
        }
        self.vertex_arrays
            .get_mut(&vertex_array)
            .map(|vao| &mut vao.attribs[index as usize])
    }

    fn set_attrib_enabled(&mut self, call: &str, vertex_array: u32, index: u32, enabled: bool) {
        if let Some(attrib) = self.attrib_mut(call, vertex_array, index) {
            attrib.enabled = enabled;
        }
    }

    fn vertex_array_attrib_binding(&mut self, vertex_array: u32, attrib: u32, binding: u32) {
        const CALL: &str = "glVertexArrayAttribBinding";
        if binding >= MAX_VERTEX_ATTRIB_BINDINGS {
            self.reject(
                gl::INVALID_VALUE,
                format!("{CALL}: binding {binding} exceeds GL_MAX_VERTEX_ATTRIB_BINDINGS"),
            );
            return;
        }
        if let Some(attrib) = self.attrib_mut(CALL, vertex_array, attrib) {
            attrib.binding = binding;
        }
    }

    fn vertex_array_attrib_format(
        &mut self,
        vertex_array: u32,
        attrib: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        relative_offset: u32,
    ) {
        const CALL: &str = "glVertexArrayAttribFormat";
        if !(1..=4).contains(&size) {
            self.reject(gl::INVALID_VALUE, format!("{CALL}: size {size} is not in 1..=4"));
            return;
        }
        if DataType::try_from(ty).is_err() {
            self.reject(gl::INVALID_ENUM, format!("{CALL}: invalid type 0x{ty:04X}"));
            return;
        }
        if relative_offset > MAX_VERTEX_ATTRIB_RELATIVE_OFFSET {
            self.reject(
                gl::INVALID_VALUE,
                format!("{CALL}: relative offset {relative_offset} is too large"),
            );
            return;
        }
        if let Some(attrib) = self.attrib_mut(CALL, vertex_array, attrib) {
            attrib.size = size;
            attrib.ty = ty;
            attrib.normalized = normalized;
            attrib.relative_offset = relative_offset;
        }
    }

    fn vertex_array_vertex_buffer(
        &mut self,
        vertex_array: u32,
        binding: u32,
        buffer: u32,
        offset: usize,
        stride: u32,
    ) {
        const CALL: &str = "glVertexArrayVertexBuffer";
        if !self.check_vertex_array(CALL, vertex_array) {
            return;
        }
        if binding >= MAX_VERTEX_ATTRIB_BINDINGS {
            self.reject(
                gl::INVALID_VALUE,
                format!("{CALL}: binding {binding} exceeds GL_MAX_VERTEX_ATTRIB_BINDINGS"),
            );
            return;
        }
        if stride > MAX_VERTEX_ATTRIB_STRIDE {
            self.reject(
                gl::INVALID_VALUE,
                format!("{CALL}: stride {stride} exceeds GL_MAX_VERTEX_ATTRIB_STRIDE"),
            );
            return;
        }
        if buffer != 0 && !self.check_buffer(CALL, buffer) {
            return;
        }
        if let Some(vao) = self.vertex_arrays.get_mut(&vertex_array) {
            vao.bindings[binding as usize] = DummyBinding {
                buffer,
                offset,
                stride,
            };
        }
    }

    fn vertex_array_element_buffer(&mut self, vertex_array: u32, buffer: u32) {
        const CALL: &str = "glVertexArrayElementBuffer";
        if !self.check_vertex_array(CALL, vertex_array) {
            return;
        }
        if buffer != 0 && !self.check_buffer(CALL, buffer) {
            return;
        }
        if let Some(vao) = self.vertex_arrays.get_mut(&vertex_array) {
            vao.element_buffer = buffer;
        }
    }

    // ------------------------------------------------------------------------
    // Shaders
    // ------------------------------------------------------------------------

    fn create_shader(&mut self, stage: u32) -> u32 {
        if ShaderStage::try_from(stage).is_err() {
            self.reject(gl::INVALID_ENUM, format!("glCreateShader: invalid type 0x{stage:04X}"));
            return 0;
        }
        if self.take_create_failure("glCreateShader") {
            return 0;
        }
        let name = self.object_names.allocate();
        self.shaders.insert(
            name,
            DummyShader {
                stage,
                source: None,
                compiled: false,
                info_log: String::new(),
                delete_pending: false,
                inputs: Vec::new(),
                uniforms: Vec::new(),
            },
        );
        log::trace!("DummyBackend: created shader {}", name);
        name
    }

    fn delete_shader(&mut self, shader: u32) {
        if shader == 0 || !self.check_shader("glDeleteShader", shader) {
            return;
        }
        let attached = self.programs.values().any(|p| p.attached.contains(&shader));
        if attached {
            if let Some(object) = self.shaders.get_mut(&shader) {
                object.delete_pending = true;
            }
        } else {
            self.remove_shader(shader);
        }
    }

    fn remove_shader(&mut self, shader: u32) {
        self.shaders.remove(&shader);
        self.object_names.release(shader);
        log::trace!("DummyBackend: deleted shader {}", shader);
    }

    fn shader_source(&mut self, shader: u32, source: &str) {
        if !self.check_shader("glShaderSource", shader) {
            return;
        }
        if let Some(object) = self.shaders.get_mut(&shader) {
            object.source = Some(source.to_owned());
        }
    }

    fn compile_shader(&mut self, shader: u32) {
        if !self.check_shader("glCompileShader", shader) {
            return;
        }
        let Some(object) = self.shaders.get_mut(&shader) else {
            return;
        };
        let source = object.source.as_deref().unwrap_or("");
        match compile_source(source, object.stage) {
            Ok(declarations) => {
                object.compiled = true;
                object.info_log.clear();
                object.inputs = declarations.inputs;
                object.uniforms = declarations.uniforms;
                log::trace!("DummyBackend: compiled shader {}", shader);
            }
            Err(info_log) => {
                object.compiled = false;
                object.info_log = info_log;
                object.inputs.clear();
                object.uniforms.clear();
                self.report(
                    gl::DEBUG_SOURCE_SHADER_COMPILER,
                    gl::DEBUG_TYPE_ERROR,
                    SHADER_COMPILER_MESSAGE_ID,
                    gl::DEBUG_SEVERITY_MEDIUM,
                    format!("shader {shader} failed to compile"),
                );
            }
        }
    }

    fn skewed_log_length(&mut self, log: &str) -> i32 {
        let length = if log.is_empty() { 0 } else { log.len() as i32 + 1 };
        let skew = std::mem::take(&mut self.info_log_skew);
        length + skew
    }

    fn get_shader_iv(&mut self, shader: u32, pname: u32) -> i32 {
        const CALL: &str = "glGetShaderiv";
        if !self.check_shader(CALL, shader) {
            return 0;
        }
        let object = &self.shaders[&shader];
        match pname {
            gl::SHADER_TYPE => object.stage as i32,
            gl::DELETE_STATUS => object.delete_pending as i32,
            gl::COMPILE_STATUS => object.compiled as i32,
            gl::INFO_LOG_LENGTH => {
                let log = object.info_log.clone();
                self.skewed_log_length(&log)
            }
            gl::SHADER_SOURCE_LENGTH => object.source.as_ref().map_or(0, |s| s.len() as i32 + 1),
            _ => {
                self.reject(gl::INVALID_ENUM, format!("{CALL}: invalid pname 0x{pname:04X}"));
                0
            }
        }
    }

    fn get_shader_info_log(&mut self, shader: u32, out: &mut [u8]) -> usize {
        if !self.check_shader("glGetShaderInfoLog", shader) {
            return 0;
        }
        write_log(&self.shaders[&shader].info_log, out)
    }

    // ------------------------------------------------------------------------
    // Programs
    // ------------------------------------------------------------------------

    fn create_program(&mut self) -> u32 {
        if self.take_create_failure("glCreateProgram") {
            return 0;
        }
        let name = self.object_names.allocate();
        self.programs.insert(name, DummyProgram::default());
        log::trace!("DummyBackend: created program {}", name);
        name
    }

    fn delete_program(&mut self, program: u32) {
        if program == 0 || !self.check_program("glDeleteProgram", program) {
            return;
        }
        if self.current_program == program {
            if let Some(object) = self.programs.get_mut(&program) {
                object.delete_pending = true;
            }
        } else {
            self.remove_program(program);
        }
    }

    fn remove_program(&mut self, program: u32) {
        let Some(object) = self.programs.remove(&program) else {
            return;
        };
        self.object_names.release(program);
        for shader in object.attached {
            self.release_if_orphaned(shader);
        }
        log::trace!("DummyBackend: deleted program {}", program);
    }

    fn release_if_orphaned(&mut self, shader: u32) {
        let pending = self.shaders.get(&shader).is_some_and(|s| s.delete_pending);
        let attached = self.programs.values().any(|p| p.attached.contains(&shader));
        if pending && !attached {
            self.remove_shader(shader);
        }
    }

    fn attach_shader(&mut self, program: u32, shader: u32) {
        const CALL: &str = "glAttachShader";
        if !self.check_program(CALL, program) || !self.check_shader(CALL, shader) {
            return;
        }
        if self.programs[&program].attached.contains(&shader) {
            self.reject(
                gl::INVALID_OPERATION,
                format!("{CALL}: shader {shader} is already attached to program {program}"),
            );
            return;
        }
        if let Some(object) = self.programs.get_mut(&program) {
            object.attached.push(shader);
        }
    }

    fn detach_shader(&mut self, program: u32, shader: u32) {
        const CALL: &str = "glDetachShader";
        if !self.check_program(CALL, program) || !self.check_shader(CALL, shader) {
            return;
        }
        let Some(object) = self.programs.get_mut(&program) else {
            return;
        };
        let Some(position) = object.attached.iter().position(|&s| s == shader) else {
            self.reject(
                gl::INVALID_OPERATION,
                format!("{CALL}: shader {shader} is not attached to program {program}"),
            );
            return;
        };
        object.attached.remove(position);
        self.release_if_orphaned(shader);
    }

    fn link_program(&mut self, program: u32) {
        if !self.check_program("glLinkProgram", program) {
            return;
        }
        let attached: Vec<&DummyShader> = self.programs[&program]
            .attached
            .iter()
            .filter_map(|name| self.shaders.get(name))
            .collect();

        let mut errors = Vec::new();
        let has = |stage: u32| attached.iter().any(|s| s.stage == stage);
        if attached.is_empty() {
            errors.push("error: no shaders attached to the program".to_owned());
        }
        if attached.iter().any(|s| !s.compiled) {
            errors.push("error: linking with uncompiled shader".to_owned());
        }
        if has(gl::COMPUTE_SHADER) {
            if attached.iter().any(|s| s.stage != gl::COMPUTE_SHADER) {
                errors.push(
                    "error: compute shaders may not be linked with any other type of shader"
                        .to_owned(),
                );
            }
        } else if !attached.is_empty() {
            if !has(gl::VERTEX_SHADER) {
                errors.push("error: program lacks a vertex shader".to_owned());
            }
            if !has(gl::FRAGMENT_SHADER) {
                errors.push("error: program lacks a fragment shader".to_owned());
            }
        }

        let attributes: Vec<String> = attached
            .iter()
            .filter(|s| s.stage == gl::VERTEX_SHADER)
            .flat_map(|s| s.inputs.iter().cloned())
            .collect();
        let uniforms: Vec<String> = attached
            .iter()
            .flat_map(|s| s.uniforms.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let Some(object) = self.programs.get_mut(&program) else {
            return;
        };
        if errors.is_empty() {
            object.linked = true;
            object.info_log.clear();
            object.active_attributes = attributes;
            object.active_uniforms = uniforms;
            log::trace!("DummyBackend: linked program {}", program);
        } else {
            object.linked = false;
            object.info_log = errors.iter().map(|e| format!("{e}\n")).collect();
            object.active_attributes.clear();
            object.active_uniforms.clear();
        }
    }

    fn use_program(&mut self, program: u32) {
        const CALL: &str = "glUseProgram";
        if program != 0 {
            if !self.check_program(CALL, program) {
                return;
            }
            if !self.programs[&program].linked {
                self.reject(
                    gl::INVALID_OPERATION,
                    format!("{CALL}: program {program} has not been linked successfully"),
                );
                return;
            }
        }
        let previous = std::mem::replace(&mut self.current_program, program);
        if previous != program && self.programs.get(&previous).is_some_and(|p| p.delete_pending) {
            self.remove_program(previous);
        }
    }

    fn get_program_iv(&mut self, program: u32, pname: u32) -> i32 {
        const CALL: &str = "glGetProgramiv";
        if !self.check_program(CALL, program) {
            return 0;
        }
        let object = &self.programs[&program];
        let max_length = |names: &[String]| names.iter().map(|n| n.len() as i32 + 1).max().unwrap_or(0);
        match pname {
            gl::DELETE_STATUS => object.delete_pending as i32,
            gl::LINK_STATUS | gl::VALIDATE_STATUS => object.linked as i32,
            gl::INFO_LOG_LENGTH => {
                let log = object.info_log.clone();
                self.skewed_log_length(&log)
            }
            gl::ATTACHED_SHADERS => object.attached.len() as i32,
            gl::ACTIVE_ATTRIBUTES => object.active_attributes.len() as i32,
            gl::ACTIVE_ATTRIBUTE_MAX_LENGTH => max_length(&object.active_attributes),
            gl::ACTIVE_UNIFORMS => object.active_uniforms.len() as i32,
            gl::ACTIVE_UNIFORM_MAX_LENGTH => max_length(&object.active_uniforms),
            _ => {
                self.reject(gl::INVALID_ENUM, format!("{CALL}: invalid pname 0x{pname:04X}"));
                0
            }
        }
    }

    fn get_program_info_log(&mut self, program: u32, out: &mut [u8]) -> usize {
        if !self.check_program("glGetProgramInfoLog", program) {
            return 0;
        }
        write_log(&self.programs[&program].info_log, out)
    }

    // ------------------------------------------------------------------------
    // Global state
    // ------------------------------------------------------------------------

    fn set_capability(&mut self, call: &str, capability: u32, enabled: bool) {
        match Capability::try_from(capability) {
            Ok(cap) if cap.is_core() => {
                if enabled {
                    self.capabilities.insert(capability);
                } else {
                    self.capabilities.remove(&capability);
                }
            }
            Ok(cap) => self.reject(
                gl::INVALID_ENUM,
                format!("{call}({cap}) is not supported in a core profile context"),
            ),
            Err(_) => self.reject(
                gl::INVALID_ENUM,
                format!("{call}: invalid capability 0x{capability:04X}"),
            ),
        }
    }

    fn clear(&mut self, mask: u32) {
        if mask & !VALID_CLEAR_BITS != 0 {
            self.reject(gl::INVALID_VALUE, format!("glClear: invalid mask 0x{mask:X}"));
            return;
        }
        self.clears.push(ClearRecord {
            mask,
            color: self.clear_color,
        });
    }

    /// Checks shared by both draw entry points.
    fn check_draw(&mut self, call: &str, mode: u32, count: i32) -> bool {
        if PrimitiveTopology::try_from(mode).is_err() {
            self.reject(gl::INVALID_ENUM, format!("{call}: invalid mode 0x{mode:04X}"));
            return false;
        }
        if count < 0 {
            self.reject(gl::INVALID_VALUE, format!("{call}: count {count} is negative"));
            return false;
        }
        if self.current_program == 0 {
            self.reject(gl::INVALID_OPERATION, format!("{call}: no program is in use"));
            return false;
        }
        let Some(vao) = self.vertex_arrays.get(&self.bound_vertex_array) else {
            self.reject(gl::INVALID_OPERATION, format!("{call}: no vertex array object is bound"));
            return false;
        };
        let mapped = vao
            .attribs
            .iter()
            .filter(|a| a.enabled)
            .filter_map(|a| self.buffers.get(&vao.bindings[a.binding as usize].buffer))
            .any(DummyBuffer::exclusively_mapped);
        if mapped {
            self.reject(
                gl::INVALID_OPERATION,
                format!("{call}: an enabled attribute reads from a mapped buffer"),
            );
            return false;
        }
        true
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        const CALL: &str = "glDrawArrays";
        if first < 0 {
            self.reject(gl::INVALID_VALUE, format!("{CALL}: first {first} is negative"));
            return;
        }
        if !self.check_draw(CALL, mode, count) {
            return;
        }
        // Both are non-negative i32, so the end cannot overflow.
        let start = first as u32;
        self.record_draw(mode, start..start + count as u32, None);
    }

    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: usize) {
        const CALL: &str = "glDrawElements";
        let index_type = match DataType::try_from(ty) {
            Ok(index_type) if index_type.is_index_type() => index_type,
            _ => {
                self.reject(gl::INVALID_ENUM, format!("{CALL}: invalid index type 0x{ty:04X}"));
                return;
            }
        };
        if !self.check_draw(CALL, mode, count) {
            return;
        }
        let element_buffer = self.vertex_arrays[&self.bound_vertex_array].element_buffer;
        let Some(elements) = self.buffers.get(&element_buffer) else {
            self.reject(gl::INVALID_OPERATION, format!("{CALL}: no element array buffer is bound"));
            return;
        };
        if elements.exclusively_mapped() {
            self.reject(gl::INVALID_OPERATION, format!("{CALL}: element array buffer is mapped"));
            return;
        }

        let stride = index_type.size_in_bytes();
        let mut truncated = false;
        let indices: Vec<u32> = (0..count as usize)
            .map(|i| {
                let start = i.checked_mul(stride).and_then(|s| s.checked_add(offset));
                match fetch(&elements.data, start, stride) {
                    Some(bytes) => decode_index(bytes),
                    None => {
                        truncated = true;
                        0
                    }
                }
            })
            .collect();
        if truncated {
            self.report(
                gl::DEBUG_SOURCE_API,
                gl::DEBUG_TYPE_UNDEFINED_BEHAVIOR,
                UNDEFINED_FETCH_MESSAGE_ID,
                gl::DEBUG_SEVERITY_MEDIUM,
                format!("{CALL}: index fetch beyond the end of element buffer {element_buffer}"),
            );
        }
        let vertices = indices.clone();
        self.record_draw(mode, vertices.into_iter(), Some(indices));
    }

    fn record_draw(
        &mut self,
        mode: u32,
        vertices: impl Iterator<Item = u32> + Clone,
        indices: Option<Vec<u32>>,
    ) {
        let vao = &self.vertex_arrays[&self.bound_vertex_array];
        let mut undefined = false;
        let mut attributes = BTreeMap::new();

        for (index, attrib) in vao.attribs.iter().enumerate().filter(|(_, a)| a.enabled) {
            let binding = vao.bindings[attrib.binding as usize];
            let data = self.buffers.get(&binding.buffer).map(|b| b.data.as_slice());
            let component_size = DataType::try_from(attrib.ty).map_or(4, DataType::size_in_bytes);
            let fetched = vertices
                .clone()
                .map(|vertex| {
                    let base = (vertex as usize)
                        .checked_mul(binding.stride as usize)
                        .and_then(|v| v.checked_add(binding.offset))
                        .and_then(|v| v.checked_add(attrib.relative_offset as usize));
                    (0..attrib.size as usize)
                        .map(|component| {
                            let start = base.and_then(|b| b.checked_add(component * component_size));
                            match data.and_then(|d| fetch(d, start, component_size)) {
                                Some(bytes) => decode_component(bytes, attrib.ty, attrib.normalized),
                                None => {
                                    undefined = true;
                                    0.0
                                }
                            }
                        })
                        .collect::<Vec<f32>>()
                })
                .collect::<Vec<_>>();
            attributes.insert(index as u32, fetched);
        }

        let call = DrawCall {
            mode,
            program: self.current_program,
            vertex_array: self.bound_vertex_array,
            indices,
            attributes,
        };
        log::trace!(
            "DummyBackend: draw {} vertices with program {}",
            call.vertex_count(),
            call.program
        );
        self.draw_calls.push(call);

        if undefined {
            self.report(
                gl::DEBUG_SOURCE_API,
                gl::DEBUG_TYPE_UNDEFINED_BEHAVIOR,
                UNDEFINED_FETCH_MESSAGE_ID,
                gl::DEBUG_SEVERITY_MEDIUM,
                "vertex attribute fetch outside of any buffer store",
            );
        }
    }

    fn get_integer(&mut self, pname: u32) -> i32 {
        let value = match pname {
            gl::MAX_VERTEX_ATTRIBS => MAX_VERTEX_ATTRIBS,
            gl::MAX_VERTEX_ATTRIB_BINDINGS => MAX_VERTEX_ATTRIB_BINDINGS,
            gl::MAX_VERTEX_ATTRIB_STRIDE => MAX_VERTEX_ATTRIB_STRIDE,
            gl::MAX_VERTEX_ATTRIB_RELATIVE_OFFSET => MAX_VERTEX_ATTRIB_RELATIVE_OFFSET,
            gl::MAX_DEBUG_MESSAGE_LENGTH => MAX_DEBUG_MESSAGE_LENGTH as u32,
            _ => {
                self.reject(gl::INVALID_ENUM, format!("glGetIntegerv: invalid pname 0x{pname:04X}"));
                return 0;
            }
        };
        value as i32
    }

    fn debug_message_insert(&mut self, source: u32, kind: u32, id: u32, severity: u32, message: &str) {
        const CALL: &str = "glDebugMessageInsert";
        if source != gl::DEBUG_SOURCE_APPLICATION && source != gl::DEBUG_SOURCE_THIRD_PARTY {
            self.reject(gl::INVALID_ENUM, format!("{CALL}: invalid source 0x{source:04X}"));
            return;
        }
        if DebugKind::try_from(kind).is_err() {
            self.reject(gl::INVALID_ENUM, format!("{CALL}: invalid type 0x{kind:04X}"));
            return;
        }
        if DebugSeverity::try_from(severity).is_err() {
            self.reject(gl::INVALID_ENUM, format!("{CALL}: invalid severity 0x{severity:04X}"));
            return;
        }
        if message.len() >= MAX_DEBUG_MESSAGE_LENGTH {
            self.reject(
                gl::INVALID_VALUE,
                format!("{CALL}: message length exceeds GL_MAX_DEBUG_MESSAGE_LENGTH"),
            );
            return;
        }
        self.report(source, kind, id, severity, message);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn range_within(offset: usize, length: usize, extent: usize) -> bool {
    offset.checked_add(length).is_some_and(|end| end <= extent)
}

/// Bytes `start..start + len` of `data`; `None` when out of range or when
/// the address computation overflowed.
fn fetch(data: &[u8], start: Option<usize>, len: usize) -> Option<&[u8]> {
    let start = start?;
    data.get(start..start.checked_add(len)?)
}

fn ranges_overlap(a: usize, b: usize, size: usize) -> bool {
    a < b + size && b < a + size
}

fn initial_contents(size: usize, data: Option<&[u8]>) -> Vec<u8> {
    let mut contents = vec![0; size];
    if let Some(data) = data {
        let n = data.len().min(size);
        contents[..n].copy_from_slice(&data[..n]);
    }
    contents
}

/// Copy a NUL-terminated log into `out`, returning bytes written without the NUL.
fn write_log(log: &str, out: &mut [u8]) -> usize {
    let Some(capacity) = out.len().checked_sub(1) else {
        return 0;
    };
    let n = log.len().min(capacity);
    out[..n].copy_from_slice(&log.as_bytes()[..n]);
    out[n] = 0;
    n
}

fn decode_index(bytes: &[u8]) -> u32 {
    match *bytes {
        [b] => u32::from(b),
        [a, b] => u32::from(u16::from_le_bytes([a, b])),
        [a, b, c, d] => u32::from_le_bytes([a, b, c, d]),
        _ => 0,
    }
}

fn decode_component(bytes: &[u8], ty: u32, normalized: bool) -> f32 {
    match (ty, bytes) {
        (gl::FLOAT, &[a, b, c, d]) => f32::from_le_bytes([a, b, c, d]),
        (gl::DOUBLE, &[a, b, c, d, e, f, g, h]) => f64::from_le_bytes([a, b, c, d, e, f, g, h]) as f32,
        (gl::BYTE, &[a]) => signed(f32::from(a as i8), f32::from(i8::MAX), normalized),
        (gl::UNSIGNED_BYTE, &[a]) => unsigned(f32::from(a), f32::from(u8::MAX), normalized),
        (gl::SHORT, &[a, b]) => signed(f32::from(i16::from_le_bytes([a, b])), f32::from(i16::MAX), normalized),
        (gl::UNSIGNED_SHORT, &[a, b]) => {
            unsigned(f32::from(u16::from_le_bytes([a, b])), f32::from(u16::MAX), normalized)
        }
        (gl::INT, &[a, b, c, d]) => signed(i32::from_le_bytes([a, b, c, d]) as f32, i32::MAX as f32, normalized),
        (gl::UNSIGNED_INT, &[a, b, c, d]) => {
            unsigned(u32::from_le_bytes([a, b, c, d]) as f32, u32::MAX as f32, normalized)
        }
        _ => 0.0,
    }
}

fn signed(value: f32, max: f32, normalized: bool) -> f32 {
    if normalized {
        (value / max).max(-1.0)
    } else {
        value
    }
}

fn unsigned(value: f32, max: f32, normalized: bool) -> f32 {
    if normalized {
        value / max
    } else {
        value
    }
}

// ============================================================================
// Shader Checker
// ============================================================================

#[derive(Debug, Default)]
struct Declarations {
    inputs: Vec<String>,
    uniforms: Vec<String>,
}

/// Check a shader source and collect its global declarations.
///
/// Errors are reported in the `0:line(column): error: ...` format drivers use.
fn compile_source(source: &str, stage: u32) -> Result<Declarations, String> {
    let cleaned = strip_comments_and_directives(source);
    let last_line = cleaned.lines().count().max(1);

    if cleaned.trim().is_empty() {
        return Err(format!(
            "0:{last_line}(1): error: syntax error, unexpected end of file\n"
        ));
    }

    let mut stack: Vec<char> = Vec::new();
    for (line_index, line) in cleaned.lines().enumerate() {
        for (column, c) in line.chars().enumerate() {
            match c {
                '{' | '(' | '[' => stack.push(c),
                '}' | ')' | ']' => {
                    let open = match c {
                        '}' => '{',
                        ')' => '(',
                        _ => '[',
                    };
                    if stack.pop() != Some(open) {
                        return Err(format!(
                            "0:{}({}): error: syntax error, unexpected '{}'\n",
                            line_index + 1,
                            column + 1,
                            c
                        ));
                    }
                }
                _ => {}
            }
        }
    }
    if let Some(open) = stack.pop() {
        let close = match open {
            '{' => '}',
            '(' => ')',
            _ => ']',
        };
        return Err(format!(
            "0:{last_line}(1): error: syntax error, unexpected end of file, expecting '{close}'\n"
        ));
    }

    let words: Vec<&str> = cleaned
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();
    if !words.windows(2).any(|w| w == ["void", "main"]) {
        let label = ShaderStage::try_from(stage).map_or("unknown", ShaderStage::label);
        return Err(format!("0:{last_line}(1): error: {label} shader lacks `main'\n"));
    }

    Ok(collect_declarations(&cleaned, stage))
}

fn strip_comments_and_directives(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    let mut block = false;
    let mut pending: Option<char> = None;

    loop {
        let Some(c) = pending.take().or_else(|| chars.next()) else {
            break;
        };
        if block {
            if c == '*' {
                match chars.next() {
                    Some('/') => block = false,
                    other => pending = other,
                }
            } else if c == '\n' {
                out.push('\n');
            }
            continue;
        }
        if c == '/' {
            match chars.next() {
                Some('/') => {
                    for n in chars.by_ref() {
                        if n == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => block = true,
                other => {
                    out.push(c);
                    pending = other;
                }
            }
            continue;
        }
        out.push(c);
    }

    out.lines()
        .map(|line| if line.trim_start().starts_with('#') { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_declarations(cleaned: &str, stage: u32) -> Declarations {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in cleaned.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                // A function body ends the declaration that introduced it.
                if depth == 0 && current.contains('(') {
                    current.clear();
                }
            }
            ';' if depth == 0 => statements.push(std::mem::take(&mut current)),
            _ if depth == 0 => current.push(c),
            _ => {}
        }
    }

    const QUALIFIERS: &[&str] = &[
        "flat", "smooth", "noperspective", "invariant", "precise", "highp", "mediump", "lowp",
    ];

    let mut declarations = Declarations::default();
    for statement in &statements {
        let mut text = statement.trim();
        if text.starts_with("layout") {
            text = text.find(')').map_or("", |end| &text[end + 1..]);
        }
        let words: Vec<&str> = text
            .split_whitespace()
            .filter(|w| !QUALIFIERS.contains(w))
            .collect();
        if words.len() < 3 {
            continue;
        }
        let names = words[2..]
            .join(" ")
            .split(',')
            .filter_map(|declarator| {
                let name = declarator.split(|c| c == '[' || c == '=').next()?.trim();
                (!name.is_empty()).then(|| name.to_owned())
            })
            .collect::<Vec<_>>();
        match words[0] {
            "uniform" => declarations.uniforms.extend(names),
            "in" | "attribute" if stage == gl::VERTEX_SHADER => declarations.inputs.extend(names),
            _ => {}
        }
    }
    declarations
}

// ============================================================================
// Backend
// ============================================================================

struct DummyShared {
    state: RefCell<DummyState>,
    handler: RefCell<Option<Rc<DebugHandler>>>,
}

/// Dummy GL backend.
#[derive(Clone)]
pub struct DummyBackend {
    shared: Rc<DummyShared>,
}

impl DummyBackend {
    /// Create a fresh emulated context.
    pub fn new() -> Self {
        Self {
            shared: Rc::new(DummyShared {
                state: RefCell::new(DummyState::new()),
                handler: RefCell::new(None),
            }),
        }
    }

    /// Run `f` against the state, then deliver the debug messages it queued.
    fn with_state<R>(&self, f: impl FnOnce(&mut DummyState) -> R) -> R {
        let (result, messages) = {
            let mut state = self.shared.state.borrow_mut();
            let result = f(&mut state);
            let messages = std::mem::take(&mut state.pending);
            let output = state.capabilities.contains(&gl::DEBUG_OUTPUT);
            (result, if output { messages } else { Vec::new() })
        };

        if !messages.is_empty() {
            // Cloned out so the handler may replace itself or drop the context.
            let handler = self.shared.handler.borrow().clone();
            if let Some(handler) = handler {
                for message in &messages {
                    (*handler)(&RawDebugMessage {
                        source: message.source,
                        kind: message.kind,
                        id: message.id,
                        severity: message.severity,
                        message: &message.message,
                    });
                }
            }
        }
        result
    }

    fn inspect<R>(&self, f: impl FnOnce(&DummyState) -> R) -> R {
        f(&self.shared.state.borrow())
    }

    // ------------------------------------------------------------------------
    // Test hooks
    // ------------------------------------------------------------------------

    /// Raise a debug message without any validation, as a driver may.
    pub fn inject_debug_message(&self, source: u32, kind: u32, id: u32, severity: u32, message: &str) {
        self.with_state(|state| state.report(source, kind, id, severity, message));
    }

    /// Make the next `create_*` call fail with `GL_OUT_OF_MEMORY`.
    pub fn fail_next_create(&self) {
        self.with_state(|state| state.fail_next_create = true);
    }

    /// Make the next buffer storage allocation fail with `GL_OUT_OF_MEMORY`.
    pub fn fail_next_allocation(&self) {
        self.with_state(|state| state.fail_next_allocation = true);
    }

    /// Make the next successful unmap report a corrupted data store.
    pub fn fail_next_unmap(&self) {
        self.with_state(|state| state.fail_next_unmap = true);
    }

    /// Offset the next `GL_INFO_LOG_LENGTH` answer by `delta` bytes.
    pub fn skew_next_info_log_length(&self, delta: i32) {
        self.with_state(|state| state.info_log_skew = delta);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Number of buffer names currently allocated.
    pub fn live_buffer_count(&self) -> usize {
        self.inspect(|s| s.buffers.len())
    }

    /// Number of vertex array names currently allocated.
    pub fn live_vertex_array_count(&self) -> usize {
        self.inspect(|s| s.vertex_arrays.len())
    }

    /// Number of shader objects not yet deleted.
    pub fn live_shader_count(&self) -> usize {
        self.inspect(|s| s.shaders.len())
    }

    /// Number of program objects not yet deleted.
    pub fn live_program_count(&self) -> usize {
        self.inspect(|s| s.programs.len())
    }

    /// Copy of a buffer's data store.
    pub fn buffer_contents(&self, buffer: u32) -> Option<Vec<u8>> {
        self.inspect(|s| s.buffers.get(&buffer).map(|b| b.data.clone()))
    }

    /// Whether a buffer currently has a mapping.
    pub fn is_buffer_mapped(&self, buffer: u32) -> bool {
        self.inspect(|s| s.buffers.get(&buffer).is_some_and(|b| b.mapping.is_some()))
    }

    /// Draw calls accepted so far.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.inspect(|s| s.draw_calls.clone())
    }

    /// Draw calls accepted since the last drain, leaving the record empty.
    pub fn take_draw_calls(&self) -> Vec<DrawCall> {
        self.with_state(|s| std::mem::take(&mut s.draw_calls))
    }

    /// Forget every recorded draw and clear.
    pub fn reset_recording(&self) {
        self.with_state(|s| {
            s.draw_calls.clear();
            s.clears.clear();
        });
    }

    /// Clears accepted so far.
    pub fn clears(&self) -> Vec<ClearRecord> {
        self.inspect(|s| s.clears.clone())
    }

    /// Whether a raw capability is enabled.
    pub fn is_enabled(&self, capability: u32) -> bool {
        self.inspect(|s| s.capabilities.contains(&capability))
    }

    /// Current clear color.
    pub fn clear_color(&self) -> [f32; 4] {
        self.inspect(|s| s.clear_color)
    }

    /// Name of the program in use, zero for none.
    pub fn current_program(&self) -> u32 {
        self.inspect(|s| s.current_program)
    }

    /// Name of the bound vertex array, zero for none.
    pub fn bound_vertex_array(&self) -> u32 {
        self.inspect(|s| s.bound_vertex_array)
    }

    /// Whether a debug handler is installed.
    pub fn has_debug_handler(&self) -> bool {
        self.shared.handler.borrow().is_some()
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DummyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("DummyBackend")
            .field("buffers", &state.buffers.len())
            .field("vertex_arrays", &state.vertex_arrays.len())
            .field("shaders", &state.shaders.len())
            .field("programs", &state.programs.len())
            .finish()
    }
}

impl GlBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn create_buffer(&self) -> u32 {
        self.with_state(DummyState::create_buffer)
    }

    fn delete_buffer(&self, buffer: u32) {
        self.with_state(|s| s.delete_buffer(buffer));
    }

    fn buffer_storage(&self, buffer: u32, size: usize, data: Option<&[u8]>, flags: u32) {
        self.with_state(|s| s.buffer_storage(buffer, size, data, flags));
    }

    fn buffer_data(&self, buffer: u32, size: usize, data: Option<&[u8]>, usage: u32) {
        self.with_state(|s| s.buffer_data(buffer, size, data, usage));
    }

    fn buffer_sub_data(&self, buffer: u32, offset: usize, data: &[u8]) {
        self.with_state(|s| s.buffer_sub_data(buffer, offset, data));
    }

    fn get_buffer_sub_data(&self, buffer: u32, offset: usize, data: &mut [u8]) {
        self.with_state(|s| s.get_buffer_sub_data(buffer, offset, data));
    }

    fn copy_buffer_sub_data(
        &self,
        read: u32,
        write: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        self.with_state(|s| s.copy_buffer_sub_data(read, write, read_offset, write_offset, size));
    }

    fn map_buffer_range(&self, buffer: u32, offset: usize, length: usize, access: u32) -> *mut u8 {
        self.with_state(|s| s.map_buffer_range(buffer, offset, length, access))
    }

    fn flush_mapped_buffer_range(&self, buffer: u32, offset: usize, length: usize) {
        self.with_state(|s| s.flush_mapped_buffer_range(buffer, offset, length));
    }

    fn unmap_buffer(&self, buffer: u32) -> bool {
        self.with_state(|s| s.unmap_buffer(buffer))
    }

    fn invalidate_buffer_data(&self, buffer: u32) {
        self.with_state(|s| {
            let extent = s.buffers.get(&buffer).map_or(0, |b| b.data.len());
            s.invalidate_buffer_sub_data("glInvalidateBufferData", buffer, 0, extent);
        });
    }

    fn invalidate_buffer_sub_data(&self, buffer: u32, offset: usize, length: usize) {
        self.with_state(|s| {
            s.invalidate_buffer_sub_data("glInvalidateBufferSubData", buffer, offset, length)
        });
    }

    fn create_vertex_array(&self) -> u32 {
        self.with_state(DummyState::create_vertex_array)
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        self.with_state(|s| s.delete_vertex_array(vertex_array));
    }

    fn bind_vertex_array(&self, vertex_array: u32) {
        self.with_state(|s| s.bind_vertex_array(vertex_array));
    }

    fn enable_vertex_array_attrib(&self, vertex_array: u32, index: u32) {
        self.with_state(|s| {
            s.set_attrib_enabled("glEnableVertexArrayAttrib", vertex_array, index, true)
        });
    }

    fn disable_vertex_array_attrib(&self, vertex_array: u32, index: u32) {
        self.with_state(|s| {
            s.set_attrib_enabled("glDisableVertexArrayAttrib", vertex_array, index, false)
        });
    }

    fn vertex_array_attrib_binding(&self, vertex_array: u32, attrib: u32, binding: u32) {
        self.with_state(|s| s.vertex_array_attrib_binding(vertex_array, attrib, binding));
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
        self.with_state(|s| {
            s.vertex_array_attrib_format(vertex_array, attrib, size, ty, normalized, relative_offset)
        });
    }

    fn vertex_array_vertex_buffer(
        &self,
        vertex_array: u32,
        binding: u32,
        buffer: u32,
        offset: usize,
        stride: u32,
    ) {
        self.with_state(|s| s.vertex_array_vertex_buffer(vertex_array, binding, buffer, offset, stride));
    }

    fn vertex_array_element_buffer(&self, vertex_array: u32, buffer: u32) {
        self.with_state(|s| s.vertex_array_element_buffer(vertex_array, buffer));
    }

    fn create_shader(&self, stage: u32) -> u32 {
        self.with_state(|s| s.create_shader(stage))
    }

    fn delete_shader(&self, shader: u32) {
        self.with_state(|s| s.delete_shader(shader));
    }

    fn shader_source(&self, shader: u32, source: &str) {
        self.with_state(|s| s.shader_source(shader, source));
    }

    fn compile_shader(&self, shader: u32) {
        self.with_state(|s| s.compile_shader(shader));
    }

    fn get_shader_iv(&self, shader: u32, pname: u32) -> i32 {
        self.with_state(|s| s.get_shader_iv(shader, pname))
    }

    fn get_shader_info_log(&self, shader: u32, buffer: &mut [u8]) -> usize {
        self.with_state(|s| s.get_shader_info_log(shader, buffer))
    }

    fn create_program(&self) -> u32 {
        self.with_state(DummyState::create_program)
    }

    fn delete_program(&self, program: u32) {
        self.with_state(|s| s.delete_program(program));
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        self.with_state(|s| s.attach_shader(program, shader));
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        self.with_state(|s| s.detach_shader(program, shader));
    }

    fn link_program(&self, program: u32) {
        self.with_state(|s| s.link_program(program));
    }

    fn use_program(&self, program: u32) {
        self.with_state(|s| s.use_program(program));
    }

    fn get_program_iv(&self, program: u32, pname: u32) -> i32 {
        self.with_state(|s| s.get_program_iv(program, pname))
    }

    fn get_program_info_log(&self, program: u32, buffer: &mut [u8]) -> usize {
        self.with_state(|s| s.get_program_info_log(program, buffer))
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.with_state(|s| {
            s.clear_color = [red, green, blue, alpha].map(|c| c.clamp(0.0, 1.0));
        });
    }

    fn clear(&self, mask: u32) {
        self.with_state(|s| s.clear(mask));
    }

    fn enable(&self, capability: u32) {
        self.with_state(|s| s.set_capability("glEnable", capability, true));
    }

    fn disable(&self, capability: u32) {
        self.with_state(|s| s.set_capability("glDisable", capability, false));
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        self.with_state(|s| s.draw_arrays(mode, first, count));
    }

    fn draw_elements(&self, mode: u32, count: i32, ty: u32, offset: usize) {
        self.with_state(|s| s.draw_elements(mode, count, ty, offset));
    }

    fn get_error(&self) -> u32 {
        self.with_state(|s| std::mem::replace(&mut s.error, gl::NO_ERROR))
    }

    fn get_integer(&self, pname: u32) -> i32 {
        self.with_state(|s| s.get_integer(pname))
    }

    fn set_debug_handler(&self, handler: Option<DebugHandler>) {
        // The previous handler may own a context; drop it outside the borrow.
        let previous = std::mem::replace(&mut *self.shared.handler.borrow_mut(), handler.map(Rc::new));
        drop(previous);
    }

    fn debug_message_insert(&self, source: u32, kind: u32, id: u32, severity: u32, message: &str) {
        self.with_state(|s| s.debug_message_insert(source, kind, id, severity, message));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    fn recording(backend: &DummyBackend) -> Rc<RefCell<Vec<(u32, u32, u32, String)>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        backend.set_debug_handler(Some(Box::new(move |m: &RawDebugMessage<'_>| {
            sink.borrow_mut()
                .push((m.source, m.kind, m.severity, m.message.to_owned()));
        })));
        seen
    }

    #[test]
    fn test_backend_name() {
        assert_eq!(DummyBackend::new().name(), "Dummy Backend");
    }

    #[test]
    fn test_names_are_recycled_lowest_first() {
        let backend = DummyBackend::new();
        let a = backend.create_buffer();
        let b = backend.create_buffer();
        let c = backend.create_buffer();
        assert_eq!((a, b, c), (1, 2, 3));
        backend.delete_buffer(b);
        backend.delete_buffer(a);
        assert_eq!(backend.create_buffer(), 1);
        assert_eq!(backend.create_buffer(), 2);
        assert_eq!(backend.live_buffer_count(), 3);
    }

    #[test]
    fn test_shaders_and_programs_share_names() {
        let backend = DummyBackend::new();
        let shader = backend.create_shader(gl::VERTEX_SHADER);
        let program = backend.create_program();
        assert_ne!(shader, program);
        assert_eq!(backend.create_vertex_array(), 1);
    }

    #[test]
    fn test_storage_then_data_is_rejected() {
        let backend = DummyBackend::new();
        let seen = recording(&backend);
        let buffer = backend.create_buffer();
        backend.buffer_storage(buffer, 16, None, gl::DYNAMIC_STORAGE_BIT);
        assert_eq!(backend.get_error(), gl::NO_ERROR);

        backend.buffer_data(buffer, 16, None, gl::STATIC_DRAW);
        assert_eq!(backend.get_error(), gl::INVALID_OPERATION);
        assert_eq!(backend.get_error(), gl::NO_ERROR);

        let seen = seen.borrow();
        let (source, kind, severity, _) = seen.last().unwrap();
        assert_eq!(*source, gl::DEBUG_SOURCE_API);
        assert_eq!(*kind, gl::DEBUG_TYPE_ERROR);
        assert_eq!(*severity, gl::DEBUG_SEVERITY_HIGH);
    }

    #[test]
    fn test_first_error_is_kept() {
        let backend = DummyBackend::new();
        backend.clear(0xFFFF_FFFF);
        backend.enable(0x1234);
        assert_eq!(backend.get_error(), gl::INVALID_VALUE);
        assert_eq!(backend.get_error(), gl::NO_ERROR);
    }

    #[test]
    fn test_mapping_writes_back_on_unmap() {
        let backend = DummyBackend::new();
        let buffer = backend.create_buffer();
        backend.buffer_storage(buffer, 8, Some(&[1; 8]), gl::MAP_WRITE_BIT);
        let ptr = backend.map_buffer_range(buffer, 2, 4, gl::MAP_WRITE_BIT);
        assert!(!ptr.is_null());
        unsafe { std::ptr::write_bytes(ptr, 9, 4) };
        assert!(backend.is_buffer_mapped(buffer));
        assert!(backend.unmap_buffer(buffer));
        assert_eq!(backend.buffer_contents(buffer).unwrap(), vec![1, 1, 9, 9, 9, 9, 1, 1]);
    }

    #[test]
    fn test_flush_explicit_only_writes_flushed_ranges() {
        let backend = DummyBackend::new();
        let buffer = backend.create_buffer();
        backend.buffer_data(buffer, 4, Some(&[0; 4]), gl::DYNAMIC_DRAW);
        let ptr = backend.map_buffer_range(
            buffer,
            0,
            4,
            gl::MAP_WRITE_BIT | gl::MAP_FLUSH_EXPLICIT_BIT,
        );
        unsafe { std::ptr::write_bytes(ptr, 7, 4) };
        backend.flush_mapped_buffer_range(buffer, 1, 2);
        assert!(backend.unmap_buffer(buffer));
        assert_eq!(backend.buffer_contents(buffer).unwrap(), vec![0, 7, 7, 0]);
    }

    #[test]
    fn test_mapping_rules() {
        let backend = DummyBackend::new();
        let buffer = backend.create_buffer();
        backend.buffer_storage(buffer, 8, None, gl::MAP_READ_BIT);

        let write = backend.map_buffer_range(buffer, 0, 8, gl::MAP_WRITE_BIT);
        assert!(write.is_null());
        assert_eq!(backend.get_error(), gl::INVALID_OPERATION);

        let read_invalidate =
            backend.map_buffer_range(buffer, 0, 8, gl::MAP_READ_BIT | gl::MAP_INVALIDATE_RANGE_BIT);
        assert!(read_invalidate.is_null());
        assert_eq!(backend.get_error(), gl::INVALID_OPERATION);

        let out_of_range = backend.map_buffer_range(buffer, 4, 8, gl::MAP_READ_BIT);
        assert!(out_of_range.is_null());
        assert_eq!(backend.get_error(), gl::INVALID_VALUE);
    }

    #[test]
    fn test_overlapping_copy_is_rejected() {
        let backend = DummyBackend::new();
        let buffer = backend.create_buffer();
        backend.buffer_data(buffer, 8, Some(&[0, 1, 2, 3, 4, 5, 6, 7]), gl::STATIC_COPY);
        backend.copy_buffer_sub_data(buffer, buffer, 0, 2, 4);
        assert_eq!(backend.get_error(), gl::INVALID_VALUE);
        backend.copy_buffer_sub_data(buffer, buffer, 0, 4, 4);
        assert_eq!(backend.get_error(), gl::NO_ERROR);
        assert_eq!(backend.buffer_contents(buffer).unwrap(), vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_compile_reports_line_numbers() {
        let backend = DummyBackend::new();
        let shader = backend.create_shader(gl::FRAGMENT_SHADER);
        backend.shader_source(shader, "#version 450 core\nvoid main() {\n    foo);\n}\n");
        backend.compile_shader(shader);
        assert_eq!(backend.get_shader_iv(shader, gl::COMPILE_STATUS), 0);

        let length = backend.get_shader_iv(shader, gl::INFO_LOG_LENGTH);
        let mut log = vec![0u8; length as usize];
        let written = backend.get_shader_info_log(shader, &mut log);
        assert_eq!(written + 1, length as usize);
        let text = std::str::from_utf8(&log[..written]).unwrap();
        assert!(text.starts_with("0:3(8)"), "{text}");
    }

    #[test]
    fn test_compile_ignores_comments_and_collects_declarations() {
        let source = "#version 450 core\n\
                      // a comment with ( unbalanced\n\
                      layout(location = 0) in vec3 position;\n\
                      in vec2 uv, extra;\n\
                      uniform mat4 mvp;\n\
                      /* block { */\n\
                      void main() { gl_Position = mvp * vec4(position, 1.0); }\n\
                      uniform float late[4];\n";
        let declarations = compile_source(source, gl::VERTEX_SHADER).unwrap();
        assert_eq!(declarations.inputs, vec!["position", "uv", "extra"]);
        assert_eq!(declarations.uniforms, vec!["mvp", "late"]);
    }

    #[test]
    fn test_missing_main_fails() {
        let err = compile_source("void helper() {}", gl::VERTEX_SHADER).unwrap_err();
        assert!(err.contains("vertex shader lacks `main'"));
        assert!(compile_source("   \n", gl::VERTEX_SHADER).is_err());
    }

    #[test]
    fn test_link_requires_vertex_and_fragment() {
        let backend = DummyBackend::new();
        let vertex = backend.create_shader(gl::VERTEX_SHADER);
        backend.shader_source(vertex, "void main() {}");
        backend.compile_shader(vertex);
        let program = backend.create_program();
        backend.attach_shader(program, vertex);
        backend.link_program(program);
        assert_eq!(backend.get_program_iv(program, gl::LINK_STATUS), 0);
        assert!(backend.get_program_iv(program, gl::INFO_LOG_LENGTH) > 0);

        backend.use_program(program);
        assert_eq!(backend.get_error(), gl::INVALID_OPERATION);
    }

    #[test]
    fn test_deleted_shader_survives_until_detached() {
        let backend = DummyBackend::new();
        let shader = backend.create_shader(gl::COMPUTE_SHADER);
        let program = backend.create_program();
        backend.attach_shader(program, shader);
        backend.delete_shader(shader);
        assert_eq!(backend.live_shader_count(), 1);
        assert_eq!(backend.get_shader_iv(shader, gl::DELETE_STATUS), 1);
        backend.detach_shader(program, shader);
        assert_eq!(backend.live_shader_count(), 0);
    }

    #[test]
    fn test_draw_fetches_normalized_attributes() {
        let backend = DummyBackend::new();
        let vertex = backend.create_shader(gl::VERTEX_SHADER);
        backend.shader_source(vertex, "in vec4 color; void main() {}");
        backend.compile_shader(vertex);
        let fragment = backend.create_shader(gl::FRAGMENT_SHADER);
        backend.shader_source(fragment, "void main() {}");
        backend.compile_shader(fragment);
        let program = backend.create_program();
        backend.attach_shader(program, vertex);
        backend.attach_shader(program, fragment);
        backend.link_program(program);
        backend.use_program(program);
        assert_eq!(backend.get_program_iv(program, gl::ACTIVE_ATTRIBUTES), 1);

        let buffer = backend.create_buffer();
        backend.buffer_data(buffer, 4, Some(&[0, 255, 51, 255]), gl::STATIC_DRAW);
        let vao = backend.create_vertex_array();
        backend.enable_vertex_array_attrib(vao, 0);
        backend.vertex_array_attrib_format(vao, 0, 2, gl::UNSIGNED_BYTE, true, 0);
        backend.vertex_array_vertex_buffer(vao, 0, buffer, 0, 2);
        backend.bind_vertex_array(vao);
        backend.draw_arrays(gl::POINTS, 0, 2);
        assert_eq!(backend.get_error(), gl::NO_ERROR);

        let draws = backend.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].vertex_count(), 2);
        assert_eq!(draws[0].attributes[&0], vec![vec![0.0, 1.0], vec![0.2, 1.0]]);
    }

    #[test]
    fn test_debug_output_disabled_suppresses_messages() {
        let backend = DummyBackend::new();
        let seen = recording(&backend);
        backend.disable(gl::DEBUG_OUTPUT);
        backend.clear(0xFFFF_FFFF);
        assert!(seen.borrow().is_empty());
        assert_eq!(backend.get_error(), gl::INVALID_VALUE);
    }

    #[test]
    fn test_imaging_capability_is_rejected() {
        let backend = DummyBackend::new();
        backend.enable(Capability::Histogram.raw());
        assert_eq!(backend.get_error(), gl::INVALID_ENUM);
        backend.enable(Capability::DepthTest.raw());
        assert!(backend.is_enabled(gl::DEPTH_TEST));
    }

    #[test]
    fn test_handler_may_replace_itself() {
        let backend = DummyBackend::new();
        let inner = backend.clone();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        backend.set_debug_handler(Some(Box::new(move |_: &RawDebugMessage<'_>| {
            counter.set(counter.get() + 1);
            inner.set_debug_handler(None);
        })));

        backend.clear(0xFFFF_FFFF);
        backend.clear(0xFFFF_FFFF);
        assert_eq!(calls.get(), 1);
        assert!(!backend.has_debug_handler());
    }

    #[test]
    fn test_huge_index_offset_is_undefined_fetch() {
        let backend = DummyBackend::new();
        let seen = recording(&backend);
        let vertex = backend.create_shader(gl::VERTEX_SHADER);
        backend.shader_source(vertex, "void main() {}");
        backend.compile_shader(vertex);
        let fragment = backend.create_shader(gl::FRAGMENT_SHADER);
        backend.shader_source(fragment, "void main() {}");
        backend.compile_shader(fragment);
        let program = backend.create_program();
        backend.attach_shader(program, vertex);
        backend.attach_shader(program, fragment);
        backend.link_program(program);
        backend.use_program(program);

        let buffer = backend.create_buffer();
        backend.buffer_data(buffer, 12, Some(&[0; 12]), gl::STATIC_DRAW);
        let vao = backend.create_vertex_array();
        backend.enable_vertex_array_attrib(vao, 0);
        backend.vertex_array_vertex_buffer(vao, 0, buffer, usize::MAX - 2, MAX_VERTEX_ATTRIB_STRIDE);
        backend.vertex_array_element_buffer(vao, buffer);
        backend.bind_vertex_array(vao);
        seen.borrow_mut().clear();

        backend.draw_elements(gl::TRIANGLES, 3, gl::UNSIGNED_INT, usize::MAX - 2);
        assert_eq!(backend.get_error(), gl::NO_ERROR);
        let draws = backend.take_draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices, Some(vec![0, 0, 0]));
        assert!(backend.draw_calls().is_empty());

        let undefined = seen
            .borrow()
            .iter()
            .filter(|(_, kind, _, _)| *kind == gl::DEBUG_TYPE_UNDEFINED_BEHAVIOR)
            .count();
        assert_eq!(undefined, 2);
    }

    #[test]
    fn test_reset_recording() {
        let backend = DummyBackend::new();
        backend.clear(gl::COLOR_BUFFER_BIT);
        assert_eq!(backend.clears().len(), 1);
        backend.reset_recording();
        assert!(backend.clears().is_empty());
        assert!(backend.draw_calls().is_empty());
    }

    #[test]
    fn test_info_log_never_overruns() {
        let mut out = [0xAA; 4];
        assert_eq!(write_log("abcdef", &mut out), 3);
        assert_eq!(&out, b"abc\0");
        assert_eq!(write_log("abc", &mut []), 0);
    }
}
