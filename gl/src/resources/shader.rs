//! Shader objects.

use std::fmt;

use crate::error::GlResult;
use crate::resources::{read_info_log, Handle, ResourceId};
use crate::types::{ShaderParameter, ShaderStage};

/// A shader object for one pipeline stage.
pub struct Shader {
    handle: Handle,
    stage: ShaderStage,
}

impl Shader {
    pub(crate) fn new(handle: Handle, stage: ShaderStage) -> Self {
        Self { handle, stage }
    }

    /// Context-unique id of this shader.
    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    /// Native name, zero once destroyed.
    pub fn raw(&self) -> u32 {
        self.handle.raw()
    }

    /// Whether the shader still owns its name.
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// Stage the shader was created for.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Replace the source text.
    #[doc(alias = "glShaderSource")]
    pub fn source(&mut self, text: &str) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        context.backend().shader_source(name, text);
        Ok(())
    }

    /// Compile the current source.
    ///
    /// Compilation failure is not an error here; check
    /// [`compile_status`](Self::compile_status) and [`info_log`](Self::info_log).
    #[doc(alias = "glCompileShader")]
    pub fn compile(&mut self) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        context.backend().compile_shader(name);
        log::trace!("Shader {}: compiled {} stage", self.handle.id(), self.stage);
        Ok(())
    }

    /// Query a raw shader parameter.
    #[doc(alias = "glGetShaderiv")]
    pub fn parameter(&self, parameter: ShaderParameter) -> GlResult<i32> {
        let (context, name) = self.handle.get()?;
        Ok(context.backend().get_shader_iv(name, parameter.raw()))
    }

    /// Whether the last compilation succeeded.
    pub fn compile_status(&self) -> GlResult<bool> {
        Ok(self.parameter(ShaderParameter::CompileStatus)? != 0)
    }

    /// Fetch the compiler log.
    ///
    /// The length is queried right before the fetch; a driver writing a
    /// different number of bytes yields [`GlError::InfoLogMismatch`](crate::GlError::InfoLogMismatch).
    #[doc(alias = "glGetShaderInfoLog")]
    pub fn info_log(&self) -> GlResult<String> {
        let (context, name) = self.handle.get()?;
        let length = context
            .backend()
            .get_shader_iv(name, ShaderParameter::InfoLogLength.raw());
        read_info_log(length, |out| context.backend().get_shader_info_log(name, out))
    }

    /// Delete the shader; the driver keeps it until detached from every program.
    #[doc(alias = "glDeleteShader")]
    pub fn destroy(&mut self) -> GlResult<()> {
        let (context, name) = self.handle.take()?;
        context.release_shader(self.handle.id(), name);
        Ok(())
    }
}

impl fmt::Debug for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.handle.id())
            .field("name", &self.handle.raw())
            .field("stage", &self.stage)
            .finish()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some((context, name)) = self.handle.take_for_drop() {
            context.release_shader(self.handle.id(), name);
        }
    }
}

static_assertions::assert_not_impl_any!(Shader: Send, Sync, Clone);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::context::{ContextDescriptor, GlContext};
    use crate::error::GlError;

    #[test]
    fn test_compile_and_log() {
        let backend = DummyBackend::new();
        let context = GlContext::new(backend.clone(), ContextDescriptor::new()).unwrap();
        let mut shader = context.create_shader(ShaderStage::Fragment).unwrap();
        assert_eq!(shader.stage(), ShaderStage::Fragment);
        assert_eq!(
            shader.parameter(ShaderParameter::ShaderType).unwrap() as u32,
            gl::FRAGMENT_SHADER
        );

        shader.source("out vec4 color;\nvoid main() { color = vec4(1.0); }").unwrap();
        shader.compile().unwrap();
        assert!(shader.compile_status().unwrap());
        assert_eq!(shader.info_log().unwrap(), "");

        shader.source("void main() { broken(; }").unwrap();
        shader.compile().unwrap();
        assert!(!shader.compile_status().unwrap());
        let log = shader.info_log().unwrap();
        let length = shader.parameter(ShaderParameter::InfoLogLength).unwrap();
        assert_eq!(log.len() + 1, length as usize);
    }

    #[test]
    fn test_info_log_mismatch() {
        let backend = DummyBackend::new();
        let context = GlContext::new(backend.clone(), ContextDescriptor::new()).unwrap();
        let mut shader = context.create_shader(ShaderStage::Vertex).unwrap();
        shader.source("int x;").unwrap();
        shader.compile().unwrap();
        backend.skew_next_info_log_length(4);
        assert!(matches!(
            shader.info_log(),
            Err(GlError::InfoLogMismatch { .. })
        ));
    }

    #[test]
    fn test_destroy_twice() {
        let backend = DummyBackend::new();
        let context = GlContext::new(backend.clone(), ContextDescriptor::new()).unwrap();
        let mut shader = context.create_shader(ShaderStage::Compute).unwrap();
        shader.destroy().unwrap();
        assert_eq!(backend.live_shader_count(), 0);
        assert_eq!(shader.destroy(), Err(GlError::InvalidHandle { kind: "shader" }));
        assert_eq!(shader.compile(), Err(GlError::InvalidHandle { kind: "shader" }));
    }
}
