//! Bitmask parameter families.
//!
//! Each family is its own type, so a mapping-access mask can never be passed
//! where a clear mask is expected. All families share the `bitflags` operator
//! set (`|`, `&`, `^`, `!`, `contains`, `is_empty`) and expose `bits()` /
//! `from_bits_retain()` for the native call boundary.

use bitflags::bitflags;

bitflags! {
    /// Access bits for mapping a buffer range.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferMapAccess: u32 {
        /// The mapping may be read.
        const READ = gl::MAP_READ_BIT;
        /// The mapping may be written.
        const WRITE = gl::MAP_WRITE_BIT;
        /// Previous contents of the range may be discarded.
        const INVALIDATE_RANGE = gl::MAP_INVALIDATE_RANGE_BIT;
        /// Previous contents of the whole buffer may be discarded.
        const INVALIDATE_BUFFER = gl::MAP_INVALIDATE_BUFFER_BIT;
        /// Writes become visible only through explicit flushes.
        const FLUSH_EXPLICIT = gl::MAP_FLUSH_EXPLICIT_BIT;
        /// No synchronization with pending GPU work.
        const UNSYNCHRONIZED = gl::MAP_UNSYNCHRONIZED_BIT;
        /// The mapping may stay alive while the buffer is used by the GPU.
        const PERSISTENT = gl::MAP_PERSISTENT_BIT;
        /// Persistent writes are visible without explicit barriers.
        const COHERENT = gl::MAP_COHERENT_BIT;
    }
}

bitflags! {
    /// Flags for immutable buffer storage.
    ///
    /// The mapping bits share values with [`BufferMapAccess`]; use
    /// `BufferStorageFlags::from(access)` to promote an access mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferStorageFlags: u32 {
        /// The storage may be mapped for reading.
        const MAP_READ = gl::MAP_READ_BIT;
        /// The storage may be mapped for writing.
        const MAP_WRITE = gl::MAP_WRITE_BIT;
        /// The storage may be mapped persistently.
        const MAP_PERSISTENT = gl::MAP_PERSISTENT_BIT;
        /// Persistent mappings may be coherent.
        const MAP_COHERENT = gl::MAP_COHERENT_BIT;
        /// Contents may be updated with `sub_data`.
        const DYNAMIC_STORAGE = gl::DYNAMIC_STORAGE_BIT;
        /// Prefer client-side memory.
        const CLIENT_STORAGE = gl::CLIENT_STORAGE_BIT;
    }
}

impl BufferStorageFlags {
    /// No storage capabilities: contents are fixed at allocation.
    pub const NONE: Self = Self::empty();

    /// Mapping bits a storage allocation must carry for a mapping to be legal.
    pub(crate) const MAPPABLE: Self = Self::MAP_READ
        .union(Self::MAP_WRITE)
        .union(Self::MAP_PERSISTENT)
        .union(Self::MAP_COHERENT);
}

impl From<BufferMapAccess> for BufferStorageFlags {
    /// Promote a mapping mask into the storage family.
    ///
    /// Only read, write, persistent and coherent have a storage counterpart;
    /// the remaining access bits are per-mapping and are dropped.
    fn from(access: BufferMapAccess) -> Self {
        Self::from_bits_truncate(access.bits()) & Self::MAPPABLE
    }
}

impl Default for BufferStorageFlags {
    fn default() -> Self {
        Self::NONE
    }
}

bitflags! {
    /// Framebuffer attachments cleared by [`crate::state::clear`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearBufferBits: u32 {
        /// Color attachments.
        const COLOR = gl::COLOR_BUFFER_BIT;
        /// Depth attachment.
        const DEPTH = gl::DEPTH_BUFFER_BIT;
        /// Stencil attachment.
        const STENCIL = gl::STENCIL_BUFFER_BIT;
    }
}

impl ClearBufferBits {
    /// Color, depth and stencil together.
    pub const ALL: Self = Self::COLOR.union(Self::DEPTH).union(Self::STENCIL);
}
