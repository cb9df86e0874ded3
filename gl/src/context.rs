//! GL context.
//!
//! The [`GlContext`] owns the backend for one driver context and is the
//! factory for every resource wrapper. It is created once the windowing layer
//! has made the driver context current, and must only be used on that thread.

use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::num::NonZeroU32;
use std::rc::{Rc, Weak};

use crate::backend::{GlBackend, RawDebugMessage};
use crate::debug::{self, DebugSink, LogSink};
use crate::error::{GlError, GlResult};
use crate::registry::AttachmentRegistry;
use crate::resources::{Buffer, Handle, Program, ResourceId, Shader, VertexArray};
use crate::types::{Capability, ShaderStage};

/// Configuration for a [`GlContext`].
#[derive(Clone)]
pub struct ContextDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Whether driver debug output is enabled.
    pub debug_output: bool,
    /// Whether debug messages are delivered inside the call that raised them.
    pub synchronous_debug: bool,
    /// Receiver of decoded debug events.
    pub debug_sink: Option<Rc<dyn DebugSink>>,
}

impl ContextDescriptor {
    /// Create a descriptor with debug output routed to the `log` facade.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Route debug events to `sink`.
    pub fn with_debug_sink(mut self, sink: Rc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    /// Deliver debug messages inside the call that raised them.
    pub fn with_synchronous_debug(mut self) -> Self {
        self.synchronous_debug = true;
        self
    }

    /// Disable driver debug output entirely.
    pub fn without_debug_output(mut self) -> Self {
        self.debug_output = false;
        self
    }
}

impl Default for ContextDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            debug_output: true,
            synchronous_debug: false,
            debug_sink: Some(Rc::new(LogSink)),
        }
    }
}

impl fmt::Debug for ContextDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextDescriptor")
            .field("label", &self.label)
            .field("debug_output", &self.debug_output)
            .field("synchronous_debug", &self.synchronous_debug)
            .field("debug_sink", &self.debug_sink.is_some())
            .finish()
    }
}

/// Implementation limits queried when the context is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextLimits {
    /// `GL_MAX_VERTEX_ATTRIBS`.
    pub max_vertex_attribs: u32,
    /// `GL_MAX_VERTEX_ATTRIB_BINDINGS`.
    pub max_vertex_attrib_bindings: u32,
}

impl ContextLimits {
    // Minimums guaranteed by OpenGL 4.5.
    const MIN_VERTEX_ATTRIBS: u32 = 16;
    const MIN_VERTEX_ATTRIB_BINDINGS: u32 = 16;

    fn query(backend: &dyn GlBackend) -> Self {
        let query = |pname, minimum: u32| {
            u32::try_from(backend.get_integer(pname))
                .ok()
                .filter(|&value| value >= minimum)
                .unwrap_or(minimum)
        };
        Self {
            max_vertex_attribs: query(gl::MAX_VERTEX_ATTRIBS, Self::MIN_VERTEX_ATTRIBS),
            max_vertex_attrib_bindings: query(
                gl::MAX_VERTEX_ATTRIB_BINDINGS,
                Self::MIN_VERTEX_ATTRIB_BINDINGS,
            ),
        }
    }
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_vertex_attribs: Self::MIN_VERTEX_ATTRIBS,
            max_vertex_attrib_bindings: Self::MIN_VERTEX_ATTRIB_BINDINGS,
        }
    }
}

/// A GL context.
///
/// Handed out as `Rc<GlContext>`: the context and all its wrappers are tied
/// to the thread that owns the driver context.
///
/// # Example
///
/// ```ignore
/// let context = GlContext::new(NativeBackend::load_with(loader)?, ContextDescriptor::new())?;
///
/// let mut buffer = context.create_buffer()?;
/// buffer.storage_from(&[1.0f32, 2.0, 3.0], BufferStorageFlags::DYNAMIC_STORAGE)?;
/// ```
pub struct GlContext {
    backend: Box<dyn GlBackend>,
    label: Option<String>,
    debug_sink: Option<Rc<dyn DebugSink>>,
    limits: ContextLimits,
    registry: RefCell<AttachmentRegistry>,
    bound_vertex_array: Cell<Option<ResourceId>>,
    current_program: Cell<Option<ResourceId>>,
    next_id: Cell<u64>,
    /// Weak self-reference handed to every wrapper.
    self_ref: Weak<GlContext>,
}

impl GlContext {
    /// Create a context on top of `backend`.
    ///
    /// Installs the descriptor's debug sink; it stays installed until the
    /// context is dropped. Errors already pending on the driver context are
    /// discarded first.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the debug output setup.
    pub fn new(backend: impl GlBackend, descriptor: ContextDescriptor) -> GlResult<Rc<Self>> {
        let ContextDescriptor {
            label,
            debug_output,
            synchronous_debug,
            debug_sink,
        } = descriptor;

        log::info!(
            "Creating GlContext {:?} using backend: {}",
            label,
            backend.name()
        );

        let stale = drain_errors(&backend);
        if stale != gl::NO_ERROR {
            log::warn!(
                "Discarding GL error 0x{:04X} raised before the context was wrapped",
                stale
            );
        }

        if debug_output {
            backend.enable(Capability::DebugOutput.raw());
            if synchronous_debug {
                backend.enable(Capability::DebugOutputSynchronous.raw());
            }
            if let Some(sink) = &debug_sink {
                let sink = Rc::clone(sink);
                backend.set_debug_handler(Some(Box::new(move |raw: &RawDebugMessage<'_>| {
                    debug::dispatch(sink.as_ref(), raw)
                })));
            }
        } else {
            backend.disable(Capability::DebugOutput.raw());
        }

        let error = drain_errors(&backend);
        if error != gl::NO_ERROR {
            backend.set_debug_handler(None);
            return Err(GlError::InitializationFailed(format!(
                "debug output setup raised GL error 0x{error:04X}"
            )));
        }

        let limits = ContextLimits::query(&backend);
        drain_errors(&backend);
        log::debug!("GlContext limits: {:?}", limits);

        Ok(Rc::new_cyclic(|self_ref| Self {
            backend: Box::new(backend),
            label,
            debug_sink,
            limits,
            registry: RefCell::new(AttachmentRegistry::new()),
            bound_vertex_array: Cell::new(None),
            current_program: Cell::new(None),
            next_id: Cell::new(1),
            self_ref: self_ref.clone(),
        }))
    }

    /// Get the context label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Get the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Implementation limits of the driver context.
    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    /// Get the installed debug sink.
    pub fn debug_sink(&self) -> Option<&Rc<dyn DebugSink>> {
        self.debug_sink.as_ref()
    }

    /// The vertex array bound through [`VertexArray::bind`], if any.
    pub fn bound_vertex_array(&self) -> Option<ResourceId> {
        self.bound_vertex_array.get()
    }

    /// The program made current through [`Program::use_program`], if any.
    pub fn current_program(&self) -> Option<ResourceId> {
        self.current_program.get()
    }

    // ========================================================================
    // Factories
    // ========================================================================

    /// Create a buffer with no storage.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::Engine`] if the driver returns no name.
    #[doc(alias = "glCreateBuffers")]
    pub fn create_buffer(&self) -> GlResult<Buffer> {
        let name = self.checked_name("glCreateBuffers", self.backend.create_buffer())?;
        let id = self.allocate_id();
        self.registry.borrow_mut().register_buffer(id);
        log::trace!("GlContext: created buffer {} (name {})", id, name);
        Ok(Buffer::new(Handle::new(self.self_ref.clone(), id, name, "buffer")))
    }

    /// Create a vertex array with every attribute disabled.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::Engine`] if the driver returns no name.
    #[doc(alias = "glCreateVertexArrays")]
    pub fn create_vertex_array(&self) -> GlResult<VertexArray> {
        let name = self.checked_name("glCreateVertexArrays", self.backend.create_vertex_array())?;
        let id = self.allocate_id();
        self.registry.borrow_mut().register_vertex_array(id);
        log::trace!("GlContext: created vertex array {} (name {})", id, name);
        Ok(VertexArray::new(Handle::new(
            self.self_ref.clone(),
            id,
            name,
            "vertex array",
        )))
    }

    /// Create a shader object for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::Engine`] if the driver returns no name.
    #[doc(alias = "glCreateShader")]
    pub fn create_shader(&self, stage: ShaderStage) -> GlResult<Shader> {
        let name = self.checked_name("glCreateShader", self.backend.create_shader(stage.raw()))?;
        let id = self.allocate_id();
        log::trace!("GlContext: created {} shader {} (name {})", stage, id, name);
        Ok(Shader::new(
            Handle::new(self.self_ref.clone(), id, name, "shader"),
            stage,
        ))
    }

    /// Create an empty program object.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::Engine`] if the driver returns no name.
    #[doc(alias = "glCreateProgram")]
    pub fn create_program(&self) -> GlResult<Program> {
        let name = self.checked_name("glCreateProgram", self.backend.create_program())?;
        let id = self.allocate_id();
        log::trace!("GlContext: created program {} (name {})", id, name);
        Ok(Program::new(Handle::new(
            self.self_ref.clone(),
            id,
            name,
            "program",
        )))
    }

    /// Compile `stages` and link them into a program.
    ///
    /// The intermediate shader objects are detached and destroyed once the
    /// program is linked.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::ShaderCompilationFailed`] or
    /// [`GlError::ProgramLinkFailed`] carrying the driver's log.
    pub fn build_program(&self, stages: &[(ShaderStage, &str)]) -> GlResult<Program> {
        let mut program = self.create_program()?;
        let mut shaders = Vec::with_capacity(stages.len());

        for &(stage, source) in stages {
            let mut shader = self.create_shader(stage)?;
            shader.source(source)?;
            shader.compile()?;
            if !shader.compile_status()? {
                return Err(GlError::ShaderCompilationFailed {
                    stage,
                    log: shader.info_log()?,
                });
            }
            program.attach_shader(&shader)?;
            shaders.push(shader);
        }

        program.link()?;
        for mut shader in shaders {
            program.detach_shader(&shader)?;
            shader.destroy()?;
        }

        if !program.link_status()? {
            return Err(GlError::ProgramLinkFailed {
                log: program.info_log()?,
            });
        }
        Ok(program)
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Get the backend (internal use only).
    pub(crate) fn backend(&self) -> &dyn GlBackend {
        self.backend.as_ref()
    }

    /// Run a backend call and report a driver rejection as [`GlError::Engine`].
    ///
    /// Errors left pending by earlier calls are discarded first so they are
    /// not attributed to `call`.
    pub(crate) fn checked<R>(&self, call: &str, f: impl FnOnce(&dyn GlBackend) -> R) -> GlResult<R> {
        let stale = drain_errors(self.backend());
        if stale != gl::NO_ERROR {
            log::trace!("GlContext: discarding stale GL error 0x{:04X} before {}", stale, call);
        }
        let result = f(self.backend());
        match drain_errors(self.backend()) {
            gl::NO_ERROR => Ok(result),
            code => Err(GlError::Engine(format!("{call} failed (GL error 0x{code:04X})"))),
        }
    }

    pub(crate) fn registry(&self) -> RefMut<'_, AttachmentRegistry> {
        self.registry.borrow_mut()
    }

    pub(crate) fn set_bound_vertex_array(&self, vertex_array: Option<ResourceId>) {
        self.bound_vertex_array.set(vertex_array);
    }

    pub(crate) fn set_current_program(&self, program: Option<ResourceId>) {
        self.current_program.set(program);
    }

    fn allocate_id(&self) -> ResourceId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ResourceId::new(id)
    }

    fn checked_name(&self, call: &str, name: u32) -> GlResult<NonZeroU32> {
        NonZeroU32::new(name).ok_or_else(|| {
            GlError::Engine(format!(
                "{} returned no name (GL error 0x{:04X})",
                call,
                self.backend.get_error()
            ))
        })
    }

    pub(crate) fn release_buffer(&self, id: ResourceId, name: u32) {
        self.backend.delete_buffer(name);
        let dangling = self
            .registry
            .borrow_mut()
            .release_buffer(id, self.bound_vertex_array.get());
        for vertex_array in dangling {
            log::warn!(
                "Buffer {} destroyed while still attached to vertex array {}",
                id,
                vertex_array
            );
        }
        log::trace!("GlContext: released buffer {} (name {})", id, name);
    }

    pub(crate) fn release_vertex_array(&self, id: ResourceId, name: u32) {
        self.backend.delete_vertex_array(name);
        self.registry.borrow_mut().release_vertex_array(id);
        if self.bound_vertex_array.get() == Some(id) {
            self.bound_vertex_array.set(None);
        }
        log::trace!("GlContext: released vertex array {} (name {})", id, name);
    }

    pub(crate) fn release_shader(&self, id: ResourceId, name: u32) {
        self.backend.delete_shader(name);
        log::trace!("GlContext: released shader {} (name {})", id, name);
    }

    pub(crate) fn release_program(&self, id: ResourceId, name: u32) {
        // The driver keeps a current program alive until it is replaced.
        self.backend.delete_program(name);
        log::trace!("GlContext: released program {} (name {})", id, name);
    }
}

/// Read the error flags until clear, returning the first error seen.
fn drain_errors(backend: &dyn GlBackend) -> u32 {
    // A driver may hold several flags; a lost context keeps reporting.
    const MAX_FLAGS: usize = 8;
    let first = backend.get_error();
    if first != gl::NO_ERROR {
        for _ in 1..MAX_FLAGS {
            if backend.get_error() == gl::NO_ERROR {
                break;
            }
        }
    }
    first
}

impl fmt::Debug for GlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlContext")
            .field("label", &self.label)
            .field("backend", &self.backend.name())
            .field("bound_vertex_array", &self.bound_vertex_array.get())
            .field("current_program", &self.current_program.get())
            .finish()
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        self.backend.set_debug_handler(None);
        log::info!("Destroying GlContext {:?}", self.label);
    }
}

// The context is bound to the thread owning the driver context.
static_assertions::assert_not_impl_any!(GlContext: Send, Sync);
static_assertions::assert_not_impl_any!(ContextDescriptor: Send, Sync);
