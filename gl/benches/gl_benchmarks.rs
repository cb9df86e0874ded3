use criterion::{black_box, criterion_group, criterion_main, Criterion};

use redlilium_gl::backend::RawDebugMessage;
use redlilium_gl::{
    state, BufferMapAccess, BufferStorageFlags, BufferUsage, ContextDescriptor, DataType,
    DebugEvent, DummyBackend, GlContext, PrimitiveTopology, ShaderStage,
};

const VERTEX: &str = "in vec2 position;\nvoid main() {}";
const FRAGMENT: &str = "out vec4 color;\nvoid main() {}";

fn quiet_context() -> std::rc::Rc<GlContext> {
    quiet_context_with(DummyBackend::new())
}

fn quiet_context_with(backend: DummyBackend) -> std::rc::Rc<GlContext> {
    GlContext::new(backend, ContextDescriptor::new().without_debug_output()).unwrap()
}

// ---------------------------------------------------------------------------
// Resource lifecycle
// ---------------------------------------------------------------------------

fn bench_buffer_create_destroy(c: &mut Criterion) {
    let context = quiet_context();
    c.bench_function("buffer_create_destroy", |b| {
        b.iter(|| {
            let mut buffer = context.create_buffer().unwrap();
            buffer.destroy().unwrap();
            black_box(buffer.raw());
        });
    });
}

fn bench_buffer_upload(c: &mut Criterion) {
    let context = quiet_context();
    let mut buffer = context.create_buffer().unwrap();
    buffer
        .storage(4096, None, BufferStorageFlags::DYNAMIC_STORAGE)
        .unwrap();
    let payload = vec![0x5Au8; 4096];

    c.bench_function("buffer_sub_data_4k", |b| {
        b.iter(|| buffer.sub_data(0, black_box(&payload)).unwrap());
    });
}

fn bench_buffer_map_write(c: &mut Criterion) {
    let context = quiet_context();
    let mut buffer = context.create_buffer().unwrap();
    buffer.data(4096, None, BufferUsage::StreamDraw).unwrap();

    c.bench_function("buffer_map_write_unmap_4k", |b| {
        b.iter(|| {
            let mut mapping = buffer
                .map_range(0, 4096, BufferMapAccess::WRITE | BufferMapAccess::INVALIDATE_RANGE)
                .unwrap();
            mapping.as_mut_slice().unwrap().fill(black_box(7));
            mapping.unmap().unwrap();
        });
    });
}

// ---------------------------------------------------------------------------
// Draw path
// ---------------------------------------------------------------------------

fn bench_validated_draw(c: &mut Criterion) {
    let backend = DummyBackend::new();
    let context = quiet_context_with(backend.clone());
    let program = context
        .build_program(&[(ShaderStage::Vertex, VERTEX), (ShaderStage::Fragment, FRAGMENT)])
        .unwrap();
    program.use_program().unwrap();

    let mut vertices = context.create_buffer().unwrap();
    vertices
        .data_from(&[0.0f32, 0.5, -0.5, -0.5, 0.5, -0.5], BufferUsage::StaticDraw)
        .unwrap();
    let mut vertex_array = context.create_vertex_array().unwrap();
    vertex_array.enable_attrib(0).unwrap();
    vertex_array
        .attrib_format(0, 2, DataType::Float, false, 0)
        .unwrap();
    vertex_array.vertex_buffer(0, &vertices, 0, 8).unwrap();
    vertex_array.bind().unwrap();

    c.bench_function("draw_arrays_validated", |b| {
        b.iter(|| {
            state::draw_arrays(&context, PrimitiveTopology::Triangles, 0, black_box(3)).unwrap();
            // Keep the emulation's draw record from growing with the iteration count.
            backend.reset_recording();
        });
    });
}

// ---------------------------------------------------------------------------
// Debug classification
// ---------------------------------------------------------------------------

fn bench_classify(c: &mut Criterion) {
    let raw = RawDebugMessage {
        source: gl::DEBUG_SOURCE_API,
        kind: gl::DEBUG_TYPE_PERFORMANCE,
        id: 131218,
        severity: gl::DEBUG_SEVERITY_MEDIUM,
        message: "Program/shader state performance warning",
    };
    c.bench_function("debug_event_classify", |b| {
        b.iter(|| DebugEvent::classify(black_box(&raw)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_buffer_create_destroy,
    bench_buffer_upload,
    bench_buffer_map_write,
    bench_validated_draw,
    bench_classify,
);
criterion_main!(benches);
