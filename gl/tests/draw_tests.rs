//! Vertex array wiring and draw call tests.

mod common;

use rstest::rstest;

use common::{TestContext, TRIANGLE};
use redlilium_gl::{
    state, Buffer, BufferUsage, DataType, DebugKind, GlError, PrimitiveTopology, VertexArray,
};

fn triangle_vertex_array(ctx: &TestContext, buffer: &Buffer) -> VertexArray {
    let mut vertex_array = ctx.context.create_vertex_array().unwrap();
    vertex_array.enable_attrib(0).unwrap();
    vertex_array.attrib_binding(0, 0).unwrap();
    vertex_array
        .attrib_format(0, 2, DataType::Float, false, 0)
        .unwrap();
    vertex_array.vertex_buffer(0, buffer, 0, 8).unwrap();
    vertex_array
}

#[test]
fn test_three_vertex_draw_reads_every_float() {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let buffer = ctx.buffer_with(&TRIANGLE);
    let vertex_array = triangle_vertex_array(&ctx, &buffer);
    vertex_array.bind().unwrap();

    state::draw_arrays(&ctx.context, PrimitiveTopology::Triangles, 0, 3).unwrap();

    let draws = ctx.backend.draw_calls();
    assert_eq!(draws.len(), 1);
    let draw = &draws[0];
    assert_eq!(draw.mode, gl::TRIANGLES);
    assert_eq!(draw.vertex_count(), 3);
    assert_eq!(draw.attributes.len(), 1);
    assert_eq!(
        draw.attributes[&0],
        vec![vec![0.0, 0.5], vec![-0.5, -0.5], vec![0.5, -0.5]]
    );
    assert!(ctx.sink.failures().is_empty());
}

#[rstest]
#[case::unsigned_byte(DataType::UnsignedByte, vec![2u8, 1, 0])]
#[case::unsigned_short(DataType::UnsignedShort, bytemuck::cast_slice::<u16, u8>(&[2, 1, 0]).to_vec())]
#[case::unsigned_int(DataType::UnsignedInt, bytemuck::cast_slice::<u32, u8>(&[2, 1, 0]).to_vec())]
fn test_indexed_draw(#[case] index_type: DataType, #[case] indices: Vec<u8>) {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let vertices = ctx.buffer_with(&TRIANGLE);
    let mut elements = ctx.context.create_buffer().unwrap();
    elements
        .data(indices.len(), Some(&indices), BufferUsage::StaticDraw)
        .unwrap();

    let mut vertex_array = triangle_vertex_array(&ctx, &vertices);
    vertex_array.element_buffer(&elements).unwrap();
    vertex_array.bind().unwrap();

    state::draw_elements(&ctx.context, PrimitiveTopology::Triangles, 3, index_type, 0).unwrap();

    let draw = &ctx.backend.draw_calls()[0];
    assert_eq!(draw.indices, Some(vec![2, 1, 0]));
    assert_eq!(draw.attributes[&0][0], vec![0.5, -0.5]);
}

#[test]
fn test_huge_index_offset_is_undefined_fetch() {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let vertices = ctx.buffer_with(&TRIANGLE);
    let mut elements = ctx.context.create_buffer().unwrap();
    elements.data_from(&[2u32, 1, 0], BufferUsage::StaticDraw).unwrap();

    let mut vertex_array = triangle_vertex_array(&ctx, &vertices);
    vertex_array.element_buffer(&elements).unwrap();
    vertex_array.bind().unwrap();

    state::draw_elements(
        &ctx.context,
        PrimitiveTopology::Triangles,
        3,
        DataType::UnsignedInt,
        usize::MAX - 2,
    )
    .unwrap();

    let draws = ctx.backend.take_draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].indices, Some(vec![0, 0, 0]));
    let failures = ctx.sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, DebugKind::UndefinedBehavior);
}

#[test]
fn test_attribute_index_at_limit_is_rejected() {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let buffer = ctx.buffer_with(&TRIANGLE);
    let mut vertex_array = triangle_vertex_array(&ctx, &buffer);
    let limit = ctx.context.limits().max_vertex_attribs;

    assert!(matches!(
        vertex_array.enable_attrib(limit),
        Err(GlError::InvalidParameter(_))
    ));
    assert!(matches!(
        vertex_array.attrib_binding(0, ctx.context.limits().max_vertex_attrib_bindings),
        Err(GlError::InvalidParameter(_))
    ));

    // The rejected calls left the wiring intact.
    vertex_array.bind().unwrap();
    state::draw_arrays(&ctx.context, PrimitiveTopology::Triangles, 0, 3).unwrap();
    assert_eq!(ctx.backend.draw_calls().len(), 1);
    assert!(ctx.sink.failures().is_empty());
}

#[test]
fn test_indexed_draw_without_element_buffer() {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let vertices = ctx.buffer_with(&TRIANGLE);
    let vertex_array = triangle_vertex_array(&ctx, &vertices);
    vertex_array.bind().unwrap();

    assert!(matches!(
        state::draw_elements(&ctx.context, PrimitiveTopology::Triangles, 3, DataType::UnsignedInt, 0),
        Err(GlError::InvalidOperation(_))
    ));
    assert!(ctx.backend.draw_calls().is_empty());
}

#[test]
fn test_draw_through_destroyed_buffer_is_invalid_handle() {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let mut buffer = ctx.buffer_with(&TRIANGLE);
    let vertex_array = triangle_vertex_array(&ctx, &buffer);

    // Not bound while destroyed, so the slot keeps the stale reference.
    buffer.destroy().unwrap();

    // The recycled name must not be read through the stale slot.
    let _reused = ctx.buffer_with(&[1.0; 6]);

    vertex_array.bind().unwrap();
    assert_eq!(
        state::draw_arrays(&ctx.context, PrimitiveTopology::Triangles, 0, 3),
        Err(GlError::InvalidHandle { kind: "buffer" })
    );
    assert!(ctx.backend.draw_calls().is_empty());
}

#[test]
fn test_destroying_buffer_detaches_from_bound_vertex_array() {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let mut buffer = ctx.buffer_with(&TRIANGLE);
    let vertex_array = triangle_vertex_array(&ctx, &buffer);
    vertex_array.bind().unwrap();

    buffer.destroy().unwrap();
    assert!(matches!(
        state::draw_arrays(&ctx.context, PrimitiveTopology::Triangles, 0, 3),
        Err(GlError::InvalidOperation(_))
    ));
}

#[test]
fn test_disabled_attribute_ignores_destroyed_buffer() {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let mut buffer = ctx.buffer_with(&TRIANGLE);
    let mut vertex_array = triangle_vertex_array(&ctx, &buffer);
    buffer.destroy().unwrap();

    vertex_array.disable_attrib(0).unwrap();
    vertex_array.bind().unwrap();
    state::draw_arrays(&ctx.context, PrimitiveTopology::Points, 0, 3).unwrap();
    assert_eq!(ctx.backend.draw_calls().len(), 1);
}

#[test]
fn test_driver_rejection_goes_to_debug_channel() {
    let ctx = TestContext::new();
    let buffer = ctx.buffer_with(&TRIANGLE);
    let vertex_array = triangle_vertex_array(&ctx, &buffer);
    vertex_array.bind().unwrap();

    // No program in use: the driver refuses, the wrapper does not.
    state::draw_arrays(&ctx.context, PrimitiveTopology::Triangles, 0, 3).unwrap();
    assert!(ctx.backend.draw_calls().is_empty());

    let failures = ctx.sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, DebugKind::Error);
    assert!(failures[0].message.contains("no program"));
}

#[test]
fn test_unbind_and_use_none() {
    let ctx = TestContext::new();
    let _program = ctx.use_default_program();
    let buffer = ctx.buffer_with(&TRIANGLE);
    let vertex_array = triangle_vertex_array(&ctx, &buffer);
    vertex_array.bind().unwrap();

    VertexArray::unbind(&ctx.context);
    redlilium_gl::Program::use_none(&ctx.context);
    assert_eq!(ctx.context.bound_vertex_array(), None);
    assert_eq!(ctx.context.current_program(), None);

    state::draw_arrays(&ctx.context, PrimitiveTopology::Triangles, 0, 3).unwrap();
    assert!(ctx.backend.draw_calls().is_empty());
}

#[test]
fn test_clear_sequence() {
    let ctx = TestContext::new();
    state::clear_color(&ctx.context, 0.0, 0.0, 0.0, 1.0);
    state::clear(&ctx.context, redlilium_gl::ClearBufferBits::ALL);
    let clears = ctx.backend.clears();
    assert_eq!(clears.len(), 1);
    assert_eq!(clears[0].color, [0.0, 0.0, 0.0, 1.0]);
}
