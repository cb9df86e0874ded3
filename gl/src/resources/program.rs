//! Program objects.

use std::fmt;

use crate::context::GlContext;
use crate::error::GlResult;
use crate::resources::{ensure_same_context, read_info_log, Handle, ResourceId, Shader};
use crate::types::ProgramParameter;

/// A linkable program object.
pub struct Program {
    handle: Handle,
}

impl Program {
    pub(crate) fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Context-unique id of this program.
    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    /// Native name, zero once destroyed.
    pub fn raw(&self) -> u32 {
        self.handle.raw()
    }

    /// Whether the program still owns its name.
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// Attach `shader` for the next link.
    #[doc(alias = "glAttachShader")]
    pub fn attach_shader(&mut self, shader: &Shader) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        let (_, shader_name) = shader.handle().get()?;
        ensure_same_context(&context, shader.handle())?;
        context.backend().attach_shader(name, shader_name);
        Ok(())
    }

    /// Detach `shader`; a linked program keeps working without it.
    #[doc(alias = "glDetachShader")]
    pub fn detach_shader(&mut self, shader: &Shader) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        let (_, shader_name) = shader.handle().get()?;
        ensure_same_context(&context, shader.handle())?;
        context.backend().detach_shader(name, shader_name);
        Ok(())
    }

    /// Link the attached shaders.
    ///
    /// Link failure is not an error here; check [`link_status`](Self::link_status).
    #[doc(alias = "glLinkProgram")]
    pub fn link(&mut self) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        context.backend().link_program(name);
        log::trace!("Program {}: linked", self.handle.id());
        Ok(())
    }

    /// Make this program current.
    #[doc(alias = "glUseProgram")]
    pub fn use_program(&self) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        context.backend().use_program(name);
        context.set_current_program(Some(self.handle.id()));
        Ok(())
    }

    /// Make no program current.
    pub fn use_none(context: &GlContext) {
        context.backend().use_program(0);
        context.set_current_program(None);
    }

    /// Query a raw program parameter.
    #[doc(alias = "glGetProgramiv")]
    pub fn parameter(&self, parameter: ProgramParameter) -> GlResult<i32> {
        let (context, name) = self.handle.get()?;
        Ok(context.backend().get_program_iv(name, parameter.raw()))
    }

    /// Whether the last link succeeded.
    pub fn link_status(&self) -> GlResult<bool> {
        Ok(self.parameter(ProgramParameter::LinkStatus)? != 0)
    }

    /// Fetch the linker log, querying its length first.
    #[doc(alias = "glGetProgramInfoLog")]
    pub fn info_log(&self) -> GlResult<String> {
        let (context, name) = self.handle.get()?;
        let length = context
            .backend()
            .get_program_iv(name, ProgramParameter::InfoLogLength.raw());
        read_info_log(length, |out| context.backend().get_program_info_log(name, out))
    }

    /// Delete the program; the driver keeps it while it is current.
    #[doc(alias = "glDeleteProgram")]
    pub fn destroy(&mut self) -> GlResult<()> {
        let (context, name) = self.handle.take()?;
        context.release_program(self.handle.id(), name);
        Ok(())
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.handle.id())
            .field("name", &self.handle.raw())
            .finish()
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        if let Some((context, name)) = self.handle.take_for_drop() {
            context.release_program(self.handle.id(), name);
        }
    }
}

static_assertions::assert_not_impl_any!(Program: Send, Sync, Clone);
