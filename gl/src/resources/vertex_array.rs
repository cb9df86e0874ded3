//! Vertex array objects.

use std::fmt;

use crate::context::GlContext;
use crate::error::{GlError, GlResult};
use crate::resources::{ensure_same_context, Buffer, Handle, ResourceId};
use crate::types::DataType;

/// A vertex array object.
///
/// Attachments are recorded by buffer id. Destroying an attached buffer does
/// not invalidate the vertex array, but a draw reading through the stale slot
/// is rejected.
pub struct VertexArray {
    handle: Handle,
}

impl VertexArray {
    pub(crate) fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Context-unique id of this vertex array.
    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    /// Native name, zero once destroyed.
    pub fn raw(&self) -> u32 {
        self.handle.raw()
    }

    /// Whether the vertex array still owns its name.
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// Bind for subsequent draws.
    #[doc(alias = "glBindVertexArray")]
    pub fn bind(&self) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        context.backend().bind_vertex_array(name);
        context.set_bound_vertex_array(Some(self.handle.id()));
        Ok(())
    }

    /// Bind no vertex array.
    pub fn unbind(context: &GlContext) {
        context.backend().bind_vertex_array(0);
        context.set_bound_vertex_array(None);
    }

    /// Let draws read attribute `index`.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::InvalidParameter`] if `index` is not below
    /// [`ContextLimits::max_vertex_attribs`](crate::ContextLimits::max_vertex_attribs).
    #[doc(alias = "glEnableVertexArrayAttrib")]
    pub fn enable_attrib(&mut self, index: u32) -> GlResult<()> {
        self.set_attrib_enabled(index, true)
    }

    /// Stop draws from reading attribute `index`.
    #[doc(alias = "glDisableVertexArrayAttrib")]
    pub fn disable_attrib(&mut self, index: u32) -> GlResult<()> {
        self.set_attrib_enabled(index, false)
    }

    fn set_attrib_enabled(&mut self, index: u32, enabled: bool) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        check_index("attribute", index, context.limits().max_vertex_attribs)?;
        if enabled {
            context.checked("glEnableVertexArrayAttrib", |backend| {
                backend.enable_vertex_array_attrib(name, index)
            })?;
        } else {
            context.checked("glDisableVertexArrayAttrib", |backend| {
                backend.disable_vertex_array_attrib(name, index)
            })?;
        }
        context.registry().set_enabled(self.handle.id(), index, enabled);
        Ok(())
    }

    /// Route attribute `attrib` to buffer binding slot `binding`.
    #[doc(alias = "glVertexArrayAttribBinding")]
    pub fn attrib_binding(&mut self, attrib: u32, binding: u32) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        let limits = context.limits();
        check_index("attribute", attrib, limits.max_vertex_attribs)?;
        check_index("binding", binding, limits.max_vertex_attrib_bindings)?;
        context.checked("glVertexArrayAttribBinding", |backend| {
            backend.vertex_array_attrib_binding(name, attrib, binding)
        })?;
        context
            .registry()
            .set_attrib_binding(self.handle.id(), attrib, binding);
        Ok(())
    }

    /// Describe the layout of attribute `attrib`.
    ///
    /// `size` is the component count and must be 1 to 4.
    #[doc(alias = "glVertexArrayAttribFormat")]
    pub fn attrib_format(
        &mut self,
        attrib: u32,
        size: u32,
        ty: DataType,
        normalized: bool,
        relative_offset: u32,
    ) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        check_index("attribute", attrib, context.limits().max_vertex_attribs)?;
        if !(1..=4).contains(&size) {
            return Err(GlError::InvalidParameter(format!(
                "attribute size must be 1 to 4, got {size}"
            )));
        }
        context.backend().vertex_array_attrib_format(
            name,
            attrib,
            size as i32,
            ty.raw(),
            normalized,
            relative_offset,
        );
        Ok(())
    }

    /// Attach `buffer` to binding slot `binding`.
    #[doc(alias = "glVertexArrayVertexBuffer")]
    pub fn vertex_buffer(
        &mut self,
        binding: u32,
        buffer: &Buffer,
        offset: usize,
        stride: u32,
    ) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        let (_, buffer_name) = buffer.handle().get()?;
        ensure_same_context(&context, buffer.handle())?;
        check_index("binding", binding, context.limits().max_vertex_attrib_bindings)?;

        context.checked("glVertexArrayVertexBuffer", |backend| {
            backend.vertex_array_vertex_buffer(name, binding, buffer_name, offset, stride)
        })?;
        context
            .registry()
            .set_vertex_buffer(self.handle.id(), binding, buffer.id());
        log::trace!(
            "VertexArray {}: binding {} -> buffer {}",
            self.handle.id(),
            binding,
            buffer.id()
        );
        Ok(())
    }

    /// Attach `buffer` as the source of indices.
    #[doc(alias = "glVertexArrayElementBuffer")]
    pub fn element_buffer(&mut self, buffer: &Buffer) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        let (_, buffer_name) = buffer.handle().get()?;
        ensure_same_context(&context, buffer.handle())?;

        context.checked("glVertexArrayElementBuffer", |backend| {
            backend.vertex_array_element_buffer(name, buffer_name)
        })?;
        context
            .registry()
            .set_element_buffer(self.handle.id(), buffer.id());
        Ok(())
    }

    /// Release the vertex array name; unbinds it if bound.
    #[doc(alias = "glDeleteVertexArrays")]
    pub fn destroy(&mut self) -> GlResult<()> {
        let (context, name) = self.handle.take()?;
        context.release_vertex_array(self.handle.id(), name);
        Ok(())
    }
}

fn check_index(what: &str, index: u32, limit: u32) -> GlResult<()> {
    if index >= limit {
        return Err(GlError::InvalidParameter(format!(
            "{what} index {index} is not below the limit of {limit}"
        )));
    }
    Ok(())
}

impl fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexArray")
            .field("id", &self.handle.id())
            .field("name", &self.handle.raw())
            .finish()
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        if let Some((context, name)) = self.handle.take_for_drop() {
            context.release_vertex_array(self.handle.id(), name);
        }
    }
}

static_assertions::assert_not_impl_any!(VertexArray: Send, Sync, Clone);
