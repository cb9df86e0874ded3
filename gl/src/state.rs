//! Global pipeline state and draw calls.
//!
//! These calls act on whatever the context currently has bound. Rejections by
//! the driver surface through the debug channel only; the draw calls return
//! an error solely for wrapper-level checks that must never reach the driver.

use crate::context::GlContext;
use crate::error::{GlError, GlResult};
use crate::types::{
    Capability, ClearBufferBits, DataType, DebugKind, DebugSeverity, DebugSource,
    PrimitiveTopology,
};

/// Set the color used by [`clear`]; components are clamped to `[0, 1]`.
#[doc(alias = "glClearColor")]
pub fn clear_color(context: &GlContext, red: f32, green: f32, blue: f32, alpha: f32) {
    context.backend().clear_color(red, green, blue, alpha);
}

/// Clear the buffers selected by `mask`.
#[doc(alias = "glClear")]
pub fn clear(context: &GlContext, mask: ClearBufferBits) {
    context.backend().clear(mask.bits());
}

/// Enable a capability.
#[doc(alias = "glEnable")]
pub fn enable(context: &GlContext, capability: Capability) {
    context.backend().enable(capability.raw());
}

/// Disable a capability.
#[doc(alias = "glDisable")]
pub fn disable(context: &GlContext, capability: Capability) {
    context.backend().disable(capability.raw());
}

fn to_count(value: u32, what: &str) -> GlResult<i32> {
    i32::try_from(value)
        .map_err(|_| GlError::InvalidParameter(format!("{what} {value} exceeds the GLint range")))
}

fn validate_bound(context: &GlContext, indexed: bool) -> GlResult<()> {
    match context.bound_vertex_array() {
        Some(vertex_array) => context.registry().validate_draw(vertex_array, indexed),
        None => Ok(()),
    }
}

/// Draw `count` vertices starting at `first` from the bound vertex array.
///
/// # Errors
///
/// Returns [`GlError::InvalidHandle`] if an enabled attribute of the bound
/// vertex array reads a destroyed buffer.
#[doc(alias = "glDrawArrays")]
pub fn draw_arrays(
    context: &GlContext,
    topology: PrimitiveTopology,
    first: u32,
    count: u32,
) -> GlResult<()> {
    let first = to_count(first, "first vertex")?;
    let count = to_count(count, "vertex count")?;
    validate_bound(context, false)?;
    context.backend().draw_arrays(topology.raw(), first, count);
    Ok(())
}

/// Draw `count` indices of `index_type` read from the element buffer at byte `offset`.
///
/// # Errors
///
/// Returns [`GlError::InvalidParameter`] for an index type other than the
/// three unsigned integer types, and [`GlError::InvalidHandle`] as for
/// [`draw_arrays`] or when the element buffer was destroyed.
#[doc(alias = "glDrawElements")]
pub fn draw_elements(
    context: &GlContext,
    topology: PrimitiveTopology,
    count: u32,
    index_type: DataType,
    offset: usize,
) -> GlResult<()> {
    if !index_type.is_index_type() {
        return Err(GlError::InvalidParameter(format!(
            "{index_type} cannot be used as an index type"
        )));
    }
    let count = to_count(count, "index count")?;
    validate_bound(context, true)?;
    context
        .backend()
        .draw_elements(topology.raw(), count, index_type.raw(), offset);
    Ok(())
}

/// Insert an application message into the debug stream.
#[doc(alias = "glDebugMessageInsert")]
pub fn insert_debug_message(
    context: &GlContext,
    source: DebugSource,
    kind: DebugKind,
    id: u32,
    severity: DebugSeverity,
    text: &str,
) {
    context
        .backend()
        .debug_message_insert(source.raw(), kind.raw(), id, severity.raw(), text);
}
