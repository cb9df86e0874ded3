//! Common utilities for GL integration tests.
//!
//! Every test runs against the in-memory `DummyBackend`, with a
//! `RecordingSink` capturing the debug stream.

use std::rc::Rc;

use redlilium_gl::{
    Buffer, BufferUsage, ContextDescriptor, DummyBackend, GlContext, Program, RecordingSink,
    ShaderStage,
};

/// Pass-through vertex shader with one 2-component input.
pub const VERTEX_SOURCE: &str = "#version 450 core
layout(location = 0) in vec2 position;
void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}
";

/// Fragment shader writing a constant color.
pub const FRAGMENT_SOURCE: &str = "#version 450 core
out vec4 color;
void main() {
    color = vec4(1.0, 0.5, 0.2, 1.0);
}
";

/// Three vertices of two floats each.
pub const TRIANGLE: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A context over a fresh dummy backend, recording every debug event.
pub struct TestContext {
    pub backend: DummyBackend,
    pub sink: Rc<RecordingSink>,
    pub context: Rc<GlContext>,
}

impl TestContext {
    pub fn new() -> Self {
        init_logging();
        let backend = DummyBackend::new();
        let sink = Rc::new(RecordingSink::new());
        let context = GlContext::new(
            backend.clone(),
            ContextDescriptor::new()
                .with_label("integration")
                .with_debug_sink(sink.clone())
                .with_synchronous_debug(),
        )
        .expect("dummy context creation cannot fail");
        Self {
            backend,
            sink,
            context,
        }
    }

    /// Link the pass-through program and make it current.
    pub fn use_default_program(&self) -> Program {
        let program = self
            .context
            .build_program(&[
                (ShaderStage::Vertex, VERTEX_SOURCE),
                (ShaderStage::Fragment, FRAGMENT_SOURCE),
            ])
            .expect("default program links");
        program.use_program().expect("program is live");
        program
    }

    /// A buffer holding `data` in mutable storage.
    #[allow(dead_code)]
    pub fn buffer_with(&self, data: &[f32]) -> Buffer {
        let mut buffer = self.context.create_buffer().expect("buffer creation");
        buffer
            .data_from(data, BufferUsage::StaticDraw)
            .expect("buffer data");
        buffer
    }
}
