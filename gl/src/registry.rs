//! Attachment tracking between vertex arrays and buffers.
//!
//! The driver lets a vertex array keep referring to a buffer name after the
//! buffer wrapper is gone, and the name may be recycled for an unrelated
//! buffer. The registry records which buffer *ids* each vertex array slot
//! refers to, so such a slot is caught before a draw reads through it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{GlError, GlResult};
use crate::resources::ResourceId;

/// What one vertex array refers to.
#[derive(Debug, Default)]
struct VertexArrayWiring {
    enabled: BTreeSet<u32>,
    // Attribute index to binding slot; absent means the default (same index).
    attrib_bindings: BTreeMap<u32, u32>,
    vertex_buffers: BTreeMap<u32, ResourceId>,
    element_buffer: Option<ResourceId>,
}

impl VertexArrayWiring {
    fn binding_of(&self, attrib: u32) -> u32 {
        self.attrib_bindings.get(&attrib).copied().unwrap_or(attrib)
    }

    fn refers_to(&self, buffer: ResourceId) -> bool {
        self.element_buffer == Some(buffer) || self.vertex_buffers.values().any(|&b| b == buffer)
    }

    fn detach(&mut self, buffer: ResourceId) {
        self.vertex_buffers.retain(|_, b| *b != buffer);
        if self.element_buffer == Some(buffer) {
            self.element_buffer = None;
        }
    }
}

/// Per-context relation between vertex arrays and the buffers they read.
///
/// Relations only: the registry never owns a resource.
#[derive(Debug, Default)]
pub(crate) struct AttachmentRegistry {
    live_buffers: HashSet<ResourceId>,
    vertex_arrays: HashMap<ResourceId, VertexArrayWiring>,
}

impl AttachmentRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register_buffer(&mut self, buffer: ResourceId) {
        self.live_buffers.insert(buffer);
    }

    pub(crate) fn is_buffer_live(&self, buffer: ResourceId) -> bool {
        self.live_buffers.contains(&buffer)
    }

    /// Forget a released buffer.
    ///
    /// The driver detaches it from the bound vertex array only; returns the
    /// other vertex arrays still referring to it.
    pub(crate) fn release_buffer(
        &mut self,
        buffer: ResourceId,
        bound_vertex_array: Option<ResourceId>,
    ) -> Vec<ResourceId> {
        self.live_buffers.remove(&buffer);

        if let Some(wiring) = bound_vertex_array.and_then(|id| self.vertex_arrays.get_mut(&id)) {
            wiring.detach(buffer);
        }

        let mut dangling: Vec<ResourceId> = self
            .vertex_arrays
            .iter()
            .filter(|(_, wiring)| wiring.refers_to(buffer))
            .map(|(&id, _)| id)
            .collect();
        dangling.sort();
        dangling
    }

    pub(crate) fn register_vertex_array(&mut self, vertex_array: ResourceId) {
        self.vertex_arrays
            .insert(vertex_array, VertexArrayWiring::default());
    }

    pub(crate) fn release_vertex_array(&mut self, vertex_array: ResourceId) {
        self.vertex_arrays.remove(&vertex_array);
    }

    fn wiring(&mut self, vertex_array: ResourceId) -> &mut VertexArrayWiring {
        self.vertex_arrays.entry(vertex_array).or_default()
    }

    pub(crate) fn set_enabled(&mut self, vertex_array: ResourceId, attrib: u32, enabled: bool) {
        let wiring = self.wiring(vertex_array);
        if enabled {
            wiring.enabled.insert(attrib);
        } else {
            wiring.enabled.remove(&attrib);
        }
    }

    pub(crate) fn set_attrib_binding(&mut self, vertex_array: ResourceId, attrib: u32, binding: u32) {
        self.wiring(vertex_array).attrib_bindings.insert(attrib, binding);
    }

    pub(crate) fn set_vertex_buffer(
        &mut self,
        vertex_array: ResourceId,
        binding: u32,
        buffer: ResourceId,
    ) {
        self.wiring(vertex_array).vertex_buffers.insert(binding, buffer);
    }

    pub(crate) fn set_element_buffer(&mut self, vertex_array: ResourceId, buffer: ResourceId) {
        self.wiring(vertex_array).element_buffer = Some(buffer);
    }

    /// Check that a draw through `vertex_array` only reads live buffers.
    pub(crate) fn validate_draw(&self, vertex_array: ResourceId, indexed: bool) -> GlResult<()> {
        let Some(wiring) = self.vertex_arrays.get(&vertex_array) else {
            return Err(GlError::InvalidHandle {
                kind: "vertex array",
            });
        };

        for &attrib in &wiring.enabled {
            let binding = wiring.binding_of(attrib);
            match wiring.vertex_buffers.get(&binding) {
                Some(buffer) if self.live_buffers.contains(buffer) => {}
                Some(buffer) => {
                    log::warn!(
                        "Attribute {} of vertex array {} reads destroyed buffer {} through binding {}",
                        attrib,
                        vertex_array,
                        buffer,
                        binding
                    );
                    return Err(GlError::InvalidHandle { kind: "buffer" });
                }
                None => {
                    return Err(GlError::InvalidOperation(format!(
                        "attribute {attrib} is enabled but binding {binding} has no buffer"
                    )));
                }
            }
        }

        if indexed {
            match wiring.element_buffer {
                Some(buffer) if self.live_buffers.contains(&buffer) => {}
                Some(_) => return Err(GlError::InvalidHandle { kind: "buffer" }),
                None => {
                    return Err(GlError::InvalidOperation(
                        "indexed draw without an element buffer".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}
