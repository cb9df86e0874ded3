//! GL resource wrappers.
//!
//! Every wrapper exclusively owns one native object name. Wrappers are created
//! by the [`GlContext`] factory methods, hold a weak reference back to the
//! context, and release their name on [`destroy`](Buffer::destroy) or drop.

mod buffer;
mod program;
mod shader;
mod vertex_array;

pub use buffer::{Buffer, BufferMapping};
pub use program::Program;
pub use shader::Shader;
pub use vertex_array::VertexArray;

use std::fmt;
use std::num::NonZeroU32;
use std::rc::{Rc, Weak};

use crate::context::GlContext;
use crate::error::{GlError, GlResult};

/// Context-unique identity of a resource wrapper.
///
/// Native names are recycled by the driver; ids never are, so a stale
/// reference can always be told apart from a newer object with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw id value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ownership core shared by all wrappers.
pub(crate) struct Handle {
    context: Weak<GlContext>,
    id: ResourceId,
    // None once destroyed.
    name: Option<NonZeroU32>,
    kind: &'static str,
}

impl Handle {
    pub(crate) fn new(
        context: Weak<GlContext>,
        id: ResourceId,
        name: NonZeroU32,
        kind: &'static str,
    ) -> Self {
        Self {
            context,
            id,
            name: Some(name),
            kind,
        }
    }

    pub(crate) fn id(&self) -> ResourceId {
        self.id
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn raw(&self) -> u32 {
        self.name.map_or(0, NonZeroU32::get)
    }

    pub(crate) fn is_live(&self) -> bool {
        self.name.is_some()
    }

    /// The owning context and native name of a live wrapper.
    pub(crate) fn get(&self) -> GlResult<(Rc<GlContext>, u32)> {
        let name = self.name.ok_or(GlError::InvalidHandle { kind: self.kind })?;
        let context = self.context.upgrade().ok_or(GlError::ContextLost)?;
        Ok((context, name.get()))
    }

    /// Reset the sentinel, returning the name that was owned.
    pub(crate) fn take(&mut self) -> GlResult<(Rc<GlContext>, u32)> {
        let name = self
            .name
            .take()
            .ok_or(GlError::InvalidHandle { kind: self.kind })?;
        let context = self.context.upgrade().ok_or(GlError::ContextLost)?;
        Ok((context, name.get()))
    }

    /// Whether the wrapper was created by `context`.
    pub(crate) fn belongs_to(&self, context: &GlContext) -> bool {
        std::ptr::eq(self.context.as_ptr(), context)
    }

    /// Take the name for release on drop, if there is still a context to release it in.
    pub(crate) fn take_for_drop(&mut self) -> Option<(Rc<GlContext>, u32)> {
        let name = self.name.take()?;
        let context = self.context.upgrade()?;
        log::debug!(
            "{} {} dropped while live, releasing name {}",
            self.kind,
            self.id,
            name
        );
        Some((context, name.get()))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("name", &self.raw())
            .finish()
    }
}

/// Ensure another wrapper lives in the same context as the one being configured.
pub(crate) fn ensure_same_context(context: &GlContext, other: &Handle) -> GlResult<()> {
    if other.belongs_to(context) {
        Ok(())
    } else {
        Err(GlError::InvalidParameter(format!(
            "{} {} belongs to a different context",
            other.kind(),
            other.id()
        )))
    }
}

/// Fetch an info log whose length was queried just before.
///
/// `expected` is the queried length including the terminator; `fetch` fills
/// the buffer and returns the bytes written without it.
pub(crate) fn read_info_log(
    expected: i32,
    fetch: impl FnOnce(&mut [u8]) -> usize,
) -> GlResult<String> {
    let expected = usize::try_from(expected).unwrap_or(0);
    if expected == 0 {
        return Ok(String::new());
    }

    let mut bytes = vec![0u8; expected];
    let written = fetch(&mut bytes);
    if written + 1 != expected {
        return Err(GlError::InfoLogMismatch {
            expected,
            actual: written + 1,
        });
    }
    bytes.truncate(written);
    Ok(String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}
