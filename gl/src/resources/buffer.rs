//! Buffer objects.

use std::fmt;
use std::ptr::NonNull;

use bytemuck::Pod;

use crate::error::{GlError, GlResult};
use crate::resources::{ensure_same_context, Handle, ResourceId};
use crate::types::{BufferMapAccess, BufferStorageFlags, BufferUsage};

/// Storage currently backing a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Allocation {
    None,
    Mutable {
        size: usize,
        usage: BufferUsage,
    },
    Immutable {
        size: usize,
        flags: BufferStorageFlags,
    },
}

impl Allocation {
    fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Mutable { size, .. } | Self::Immutable { size, .. } => size,
        }
    }
}

fn check_range(offset: usize, size: usize, extent: usize) -> GlResult<()> {
    match offset.checked_add(size) {
        Some(end) if end <= extent => Ok(()),
        _ => Err(GlError::OutOfBounds {
            offset,
            size,
            extent,
        }),
    }
}

fn check_data_len(size: usize, data: Option<&[u8]>) -> GlResult<()> {
    match data {
        Some(bytes) if bytes.len() != size => Err(GlError::InvalidParameter(format!(
            "initial data is {} bytes but the allocation is {} bytes",
            bytes.len(),
            size
        ))),
        _ => Ok(()),
    }
}

/// A buffer object.
///
/// Created empty by [`GlContext::create_buffer`](crate::GlContext::create_buffer);
/// give it storage with [`storage`](Self::storage) (immutable, one time) or
/// [`data`](Self::data) (mutable, may be respecified).
pub struct Buffer {
    handle: Handle,
    allocation: Allocation,
    // Set while a mapping exists, including one leaked with `mem::forget`.
    mapped: bool,
}

impl Buffer {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            handle,
            allocation: Allocation::None,
            mapped: false,
        }
    }

    /// Context-unique id of this buffer.
    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    /// Native name, zero once destroyed.
    pub fn raw(&self) -> u32 {
        self.handle.raw()
    }

    /// Whether the buffer still owns its name.
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// Size of the current allocation in bytes.
    pub fn size(&self) -> usize {
        self.allocation.size()
    }

    /// Whether the storage was allocated with [`storage`](Self::storage).
    pub fn is_immutable(&self) -> bool {
        matches!(self.allocation, Allocation::Immutable { .. })
    }

    /// Usage hint of a mutable allocation.
    pub fn usage(&self) -> Option<BufferUsage> {
        match self.allocation {
            Allocation::Mutable { usage, .. } => Some(usage),
            _ => None,
        }
    }

    /// Flags of an immutable allocation.
    pub fn storage_flags(&self) -> BufferStorageFlags {
        match self.allocation {
            Allocation::Immutable { flags, .. } => flags,
            _ => BufferStorageFlags::NONE,
        }
    }

    /// Whether a mapping of this buffer is outstanding.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    fn ensure_unmapped(&self) -> GlResult<()> {
        if self.mapped {
            return Err(GlError::InvalidOperation(format!(
                "buffer {} is mapped",
                self.handle.id()
            )));
        }
        Ok(())
    }

    /// Allocate immutable storage.
    ///
    /// Storage can be allocated once; after this neither `storage` nor
    /// [`data`](Self::data) may be called again.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::InvalidParameter`] for bits outside
    /// [`BufferStorageFlags`] or an illegal combination, and
    /// [`GlError::Engine`] if the driver refuses the allocation. The buffer
    /// keeps no storage in either case.
    #[doc(alias = "glNamedBufferStorage")]
    pub fn storage(
        &mut self,
        size: usize,
        data: Option<&[u8]>,
        flags: BufferStorageFlags,
    ) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        if self.is_immutable() {
            return Err(GlError::InvalidOperation(
                "buffer already has immutable storage".into(),
            ));
        }
        self.ensure_unmapped()?;
        if size == 0 {
            return Err(GlError::InvalidParameter(
                "buffer storage size cannot be zero".into(),
            ));
        }
        check_data_len(size, data)?;
        let unknown = flags.bits() & !BufferStorageFlags::all().bits();
        if unknown != 0 {
            return Err(GlError::InvalidParameter(format!(
                "unknown buffer storage bits 0x{unknown:X}"
            )));
        }
        if flags.contains(BufferStorageFlags::MAP_PERSISTENT)
            && !flags.intersects(BufferStorageFlags::MAP_READ | BufferStorageFlags::MAP_WRITE)
        {
            return Err(GlError::InvalidParameter(
                "persistent storage must be mappable for reading or writing".into(),
            ));
        }
        if flags.contains(BufferStorageFlags::MAP_COHERENT)
            && !flags.contains(BufferStorageFlags::MAP_PERSISTENT)
        {
            return Err(GlError::InvalidParameter(
                "coherent storage must also be persistent".into(),
            ));
        }

        context.checked("glNamedBufferStorage", |backend| {
            backend.buffer_storage(name, size, data, flags.bits())
        })?;
        self.allocation = Allocation::Immutable { size, flags };
        Ok(())
    }

    /// Allocate immutable storage initialized from a typed slice.
    pub fn storage_from<T: Pod>(&mut self, data: &[T], flags: BufferStorageFlags) -> GlResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.storage(bytes.len(), Some(bytes), flags)
    }

    /// Allocate (or reallocate) mutable storage.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::Engine`] if the driver refuses the allocation, in
    /// which case the previous storage is kept.
    #[doc(alias = "glNamedBufferData")]
    pub fn data(&mut self, size: usize, data: Option<&[u8]>, usage: BufferUsage) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        if self.is_immutable() {
            return Err(GlError::InvalidOperation(
                "cannot respecify immutable buffer storage".into(),
            ));
        }
        self.ensure_unmapped()?;
        check_data_len(size, data)?;

        context.checked("glNamedBufferData", |backend| {
            backend.buffer_data(name, size, data, usage.raw())
        })?;
        self.allocation = Allocation::Mutable { size, usage };
        Ok(())
    }

    /// Allocate mutable storage initialized from a typed slice.
    pub fn data_from<T: Pod>(&mut self, data: &[T], usage: BufferUsage) -> GlResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.data(bytes.len(), Some(bytes), usage)
    }

    /// Overwrite part of the store.
    #[doc(alias = "glNamedBufferSubData")]
    pub fn sub_data(&mut self, offset: usize, data: &[u8]) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        check_range(offset, data.len(), self.size())?;
        if self.is_immutable() && !self.storage_flags().contains(BufferStorageFlags::DYNAMIC_STORAGE) {
            return Err(GlError::InvalidOperation(
                "immutable storage was allocated without DYNAMIC_STORAGE".into(),
            ));
        }
        self.ensure_unmapped()?;

        context.backend().buffer_sub_data(name, offset, data);
        Ok(())
    }

    /// Overwrite part of the store from a typed slice.
    pub fn sub_data_from<T: Pod>(&mut self, offset: usize, data: &[T]) -> GlResult<()> {
        self.sub_data(offset, bytemuck::cast_slice(data))
    }

    /// Read part of the store into `out`.
    #[doc(alias = "glGetNamedBufferSubData")]
    pub fn get_sub_data(&self, offset: usize, out: &mut [u8]) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        check_range(offset, out.len(), self.size())?;
        self.ensure_unmapped()?;

        context.backend().get_buffer_sub_data(name, offset, out);
        Ok(())
    }

    /// Read `count` elements of `T` starting at byte `offset`.
    pub fn get_sub_data_as<T: Pod>(&self, offset: usize, count: usize) -> GlResult<Vec<T>> {
        let mut out = vec![T::zeroed(); count];
        self.get_sub_data(offset, bytemuck::cast_slice_mut(&mut out))?;
        Ok(out)
    }

    /// Map a range of the store.
    ///
    /// The returned guard borrows the buffer, so nothing else can touch it
    /// until the mapping is released by [`BufferMapping::unmap`] or drop.
    #[doc(alias = "glMapNamedBufferRange")]
    pub fn map_range(
        &mut self,
        offset: usize,
        length: usize,
        access: BufferMapAccess,
    ) -> GlResult<BufferMapping<'_>> {
        let (context, name) = self.handle.get()?;
        if length == 0 {
            return Err(GlError::InvalidParameter("mapping length cannot be zero".into()));
        }
        check_range(offset, length, self.size())?;
        if self.mapped {
            return Err(GlError::InvalidOperation("buffer is already mapped".into()));
        }
        self.check_access(access)?;

        let ptr = context
            .backend()
            .map_buffer_range(name, offset, length, access.bits());
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            GlError::Engine(format!(
                "glMapNamedBufferRange failed (GL error 0x{:04X})",
                context.backend().get_error()
            ))
        })?;

        self.mapped = true;
        Ok(BufferMapping {
            buffer: self,
            ptr,
            offset,
            length,
            access,
            released: false,
        })
    }

    fn check_access(&self, access: BufferMapAccess) -> GlResult<()> {
        let invalid = |reason: &str| Err(GlError::InvalidOperation(reason.to_owned()));

        if !access.intersects(BufferMapAccess::READ | BufferMapAccess::WRITE) {
            return invalid("mapping needs READ or WRITE access");
        }
        if access.contains(BufferMapAccess::FLUSH_EXPLICIT) && !access.contains(BufferMapAccess::WRITE) {
            return invalid("FLUSH_EXPLICIT requires WRITE access");
        }
        let read_forbidden = BufferMapAccess::INVALIDATE_RANGE
            | BufferMapAccess::INVALIDATE_BUFFER
            | BufferMapAccess::UNSYNCHRONIZED;
        if access.contains(BufferMapAccess::READ) && access.intersects(read_forbidden) {
            return invalid("READ cannot be combined with INVALIDATE or UNSYNCHRONIZED");
        }

        let required = BufferStorageFlags::from(access);
        match self.allocation {
            Allocation::Immutable { flags, .. } if !flags.contains(required) => {
                invalid("requested access was not enabled when the storage was allocated")
            }
            Allocation::Mutable { .. } | Allocation::None
                if required.intersects(
                    BufferStorageFlags::MAP_PERSISTENT | BufferStorageFlags::MAP_COHERENT,
                ) =>
            {
                invalid("persistent mappings require immutable storage")
            }
            _ => Ok(()),
        }
    }

    /// Discard the whole store.
    #[doc(alias = "glInvalidateBufferData")]
    pub fn invalidate_data(&mut self) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        self.ensure_unmapped()?;
        context.backend().invalidate_buffer_data(name);
        Ok(())
    }

    /// Discard a range of the store.
    #[doc(alias = "glInvalidateBufferSubData")]
    pub fn invalidate_sub_data(&mut self, offset: usize, length: usize) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        check_range(offset, length, self.size())?;
        self.ensure_unmapped()?;
        context.backend().invalidate_buffer_sub_data(name, offset, length);
        Ok(())
    }

    /// Copy `size` bytes from `read` into `write`.
    #[doc(alias = "glCopyNamedBufferSubData")]
    pub fn copy_sub_data(
        read: &Buffer,
        write: &mut Buffer,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) -> GlResult<()> {
        let (context, read_name) = read.handle.get()?;
        let (_, write_name) = write.handle.get()?;
        ensure_same_context(&context, &write.handle)?;
        check_range(read_offset, size, read.size())?;
        check_range(write_offset, size, write.size())?;
        read.ensure_unmapped()?;
        write.ensure_unmapped()?;

        context
            .backend()
            .copy_buffer_sub_data(read_name, write_name, read_offset, write_offset, size);
        Ok(())
    }

    /// Copy `size` bytes between two non-overlapping ranges of this buffer.
    pub fn copy_within(&mut self, read_offset: usize, write_offset: usize, size: usize) -> GlResult<()> {
        let (context, name) = self.handle.get()?;
        check_range(read_offset, size, self.size())?;
        check_range(write_offset, size, self.size())?;
        if read_offset < write_offset + size && write_offset < read_offset + size {
            return Err(GlError::InvalidParameter(format!(
                "source [{read_offset}, {read_offset}+{size}) overlaps destination [{write_offset}, {write_offset}+{size})"
            )));
        }
        self.ensure_unmapped()?;

        context
            .backend()
            .copy_buffer_sub_data(name, name, read_offset, write_offset, size);
        Ok(())
    }

    /// Release the buffer name.
    ///
    /// A second call reports [`GlError::InvalidHandle`].
    #[doc(alias = "glDeleteBuffers")]
    pub fn destroy(&mut self) -> GlResult<()> {
        let (context, name) = self.handle.take()?;
        context.release_buffer(self.handle.id(), name);
        self.allocation = Allocation::None;
        self.mapped = false;
        Ok(())
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.handle.id())
            .field("name", &self.handle.raw())
            .field("allocation", &self.allocation)
            .field("mapped", &self.mapped)
            .finish()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some((context, name)) = self.handle.take_for_drop() {
            context.release_buffer(self.handle.id(), name);
        }
    }
}

/// A mapped range of a [`Buffer`].
///
/// Offsets passed to the guard are relative to the start of the mapping.
pub struct BufferMapping<'a> {
    buffer: &'a mut Buffer,
    ptr: NonNull<u8>,
    offset: usize,
    length: usize,
    access: BufferMapAccess,
    released: bool,
}

impl BufferMapping<'_> {
    /// Offset of the mapping in the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Always false: empty mappings cannot be created.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Access the mapping was created with.
    pub fn access(&self) -> BufferMapAccess {
        self.access
    }

    /// View the mapped bytes.
    pub fn as_slice(&self) -> GlResult<&[u8]> {
        if !self.access.contains(BufferMapAccess::READ) {
            return Err(GlError::InvalidOperation("mapping is not readable".into()));
        }
        // SAFETY: the driver keeps `length` bytes at `ptr` valid until unmap,
        // which cannot happen while `self` is borrowed.
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.length) })
    }

    /// Mutably view the mapped bytes.
    pub fn as_mut_slice(&mut self) -> GlResult<&mut [u8]> {
        if !self.access.contains(BufferMapAccess::WRITE) {
            return Err(GlError::InvalidOperation("mapping is not writable".into()));
        }
        // SAFETY: as in `as_slice`; the exclusive borrow of `self` prevents aliasing.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.length) })
    }

    /// Make writes to a range of the mapping visible.
    #[doc(alias = "glFlushMappedNamedBufferRange")]
    pub fn flush_range(&mut self, offset: usize, length: usize) -> GlResult<()> {
        if !self.access.contains(BufferMapAccess::FLUSH_EXPLICIT) {
            return Err(GlError::InvalidOperation(
                "flush_range requires a FLUSH_EXPLICIT mapping".into(),
            ));
        }
        check_range(offset, length, self.length)?;
        let (context, name) = self.buffer.handle.get()?;
        context.backend().flush_mapped_buffer_range(name, offset, length);
        Ok(())
    }

    /// Release the mapping.
    ///
    /// # Errors
    ///
    /// Returns [`GlError::Engine`] if the driver reports that the data store
    /// was corrupted while mapped.
    #[doc(alias = "glUnmapNamedBuffer")]
    pub fn unmap(mut self) -> GlResult<()> {
        self.release()
    }

    fn release(&mut self) -> GlResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.buffer.mapped = false;

        let (context, name) = self.buffer.handle.get()?;
        if context.backend().unmap_buffer(name) {
            Ok(())
        } else {
            Err(GlError::Engine(format!(
                "data store of buffer {} was corrupted while mapped",
                self.buffer.handle.id()
            )))
        }
    }
}

impl fmt::Debug for BufferMapping<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferMapping")
            .field("buffer", &self.buffer.handle.id())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("access", &self.access)
            .finish()
    }
}

impl Drop for BufferMapping<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log::warn!("Failed to unmap buffer on drop: {}", err);
        }
    }
}

static_assertions::assert_not_impl_any!(Buffer: Send, Sync, Clone);
static_assertions::assert_not_impl_any!(BufferMapping<'static>: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::backend::{DummyBackend, GlBackend};
    use crate::context::{ContextDescriptor, GlContext};

    fn setup() -> (DummyBackend, Rc<GlContext>) {
        let backend = DummyBackend::new();
        let context = GlContext::new(backend.clone(), ContextDescriptor::new()).unwrap();
        (backend, context)
    }

    #[test]
    fn test_buffer_debug() {
        let (_backend, context) = setup();
        let buffer = context.create_buffer().unwrap();
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("Buffer"));
        assert!(debug.contains("None"));
    }

    #[test]
    fn test_storage_is_one_time() {
        let (_backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.storage(16, None, BufferStorageFlags::DYNAMIC_STORAGE).unwrap();
        assert!(buffer.is_immutable());
        assert_eq!(buffer.size(), 16);

        assert!(matches!(
            buffer.storage(16, None, BufferStorageFlags::NONE),
            Err(GlError::InvalidOperation(_))
        ));
        assert!(matches!(
            buffer.data(16, None, BufferUsage::StaticDraw),
            Err(GlError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_data_length_must_match() {
        let (_backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        assert!(matches!(
            buffer.data(8, Some(&[0; 4]), BufferUsage::StaticDraw),
            Err(GlError::InvalidParameter(_))
        ));
        assert!(matches!(
            buffer.storage(0, None, BufferStorageFlags::NONE),
            Err(GlError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_mutable_reallocation() {
        let (backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.data(4, Some(&[1, 2, 3, 4]), BufferUsage::StaticDraw).unwrap();
        buffer.data_from(&[7u16, 8], BufferUsage::DynamicDraw).unwrap();
        assert_eq!(buffer.usage(), Some(BufferUsage::DynamicDraw));
        assert_eq!(buffer.storage_flags(), BufferStorageFlags::NONE);
        assert_eq!(backend.buffer_contents(buffer.raw()).unwrap(), vec![7, 0, 8, 0]);
    }

    #[test]
    fn test_unknown_storage_bits_are_rejected() {
        let (backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        let flags = BufferStorageFlags::from_bits_retain(0x8000_0000) | BufferStorageFlags::DYNAMIC_STORAGE;
        assert!(matches!(
            buffer.storage(16, Some(&[7; 16]), flags),
            Err(GlError::InvalidParameter(_))
        ));
        assert_eq!(buffer.size(), 0);
        assert!(!buffer.is_immutable());
        assert_eq!(backend.buffer_contents(buffer.raw()).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_driver_refused_allocation_keeps_previous_storage() {
        let (_backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.data(4, Some(&[1, 2, 3, 4]), BufferUsage::StaticDraw).unwrap();

        // A name deleted behind the wrapper's back is refused by the driver.
        let (ctx, name) = buffer.handle().get().unwrap();
        ctx.backend().delete_buffer(name);
        assert!(matches!(
            buffer.data(8, None, BufferUsage::DynamicDraw),
            Err(GlError::Engine(ref message)) if message.contains("0x0502")
        ));
        assert_eq!(buffer.size(), 4);
        assert_eq!(buffer.usage(), Some(BufferUsage::StaticDraw));
    }

    #[test]
    fn test_stale_error_is_not_attributed_to_allocation() {
        let (backend, context) = setup();
        backend.clear(0xFFFF_FFFF);
        let mut buffer = context.create_buffer().unwrap();
        buffer.storage(4, None, BufferStorageFlags::NONE).unwrap();
        assert_eq!(buffer.size(), 4);
    }

    #[test]
    fn test_sub_data_requires_dynamic_storage() {
        let (_backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.storage(4, Some(&[0; 4]), BufferStorageFlags::NONE).unwrap();
        assert!(matches!(
            buffer.sub_data(0, &[1]),
            Err(GlError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_out_of_bounds_ranges() {
        let (_backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.data(12, None, BufferUsage::StaticDraw).unwrap();
        assert_eq!(
            buffer.sub_data(8, &[0; 8]),
            Err(GlError::OutOfBounds {
                offset: 8,
                size: 8,
                extent: 12
            })
        );
        let mut out = [0u8; 4];
        assert!(matches!(
            buffer.get_sub_data(usize::MAX, &mut out),
            Err(GlError::OutOfBounds { .. })
        ));
        assert!(matches!(
            buffer.invalidate_sub_data(10, 4),
            Err(GlError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_mapping_round_trip() {
        let (backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer
            .storage(
                8,
                Some(&[0; 8]),
                BufferStorageFlags::MAP_READ | BufferStorageFlags::MAP_WRITE,
            )
            .unwrap();

        let mut mapping = buffer
            .map_range(4, 4, BufferMapAccess::READ | BufferMapAccess::WRITE)
            .unwrap();
        assert_eq!(mapping.as_slice().unwrap(), &[0; 4]);
        mapping.as_mut_slice().unwrap().copy_from_slice(&[1, 2, 3, 4]);
        mapping.unmap().unwrap();

        assert!(!buffer.is_mapped());
        assert_eq!(
            backend.buffer_contents(buffer.raw()).unwrap(),
            vec![0, 0, 0, 0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_mapping_released_on_drop() {
        let (backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer
            .storage(4, None, BufferStorageFlags::MAP_WRITE)
            .unwrap();
        {
            let mut mapping = buffer.map_range(0, 4, BufferMapAccess::WRITE).unwrap();
            mapping.as_mut_slice().unwrap().fill(5);
            assert!(matches!(mapping.as_slice(), Err(GlError::InvalidOperation(_))));
        }
        assert!(!backend.is_buffer_mapped(buffer.raw()));
        assert_eq!(backend.buffer_contents(buffer.raw()).unwrap(), vec![5; 4]);
    }

    #[test]
    fn test_mapping_access_rules() {
        let (_backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.storage(8, None, BufferStorageFlags::MAP_READ).unwrap();

        let cases = [
            BufferMapAccess::empty(),
            BufferMapAccess::WRITE,
            BufferMapAccess::READ | BufferMapAccess::FLUSH_EXPLICIT,
            BufferMapAccess::READ | BufferMapAccess::INVALIDATE_BUFFER,
            BufferMapAccess::READ | BufferMapAccess::PERSISTENT,
        ];
        for access in cases {
            assert!(
                matches!(buffer.map_range(0, 8, access), Err(GlError::InvalidOperation(_))),
                "{access:?}"
            );
        }
        assert!(buffer.map_range(0, 8, BufferMapAccess::READ).is_ok());
    }

    #[test]
    fn test_flush_explicit() {
        let (backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.data(4, Some(&[0; 4]), BufferUsage::DynamicDraw).unwrap();

        let mut mapping = buffer
            .map_range(0, 4, BufferMapAccess::WRITE | BufferMapAccess::FLUSH_EXPLICIT)
            .unwrap();
        mapping.as_mut_slice().unwrap().fill(3);
        mapping.flush_range(2, 2).unwrap();
        assert!(matches!(
            mapping.flush_range(3, 2),
            Err(GlError::OutOfBounds { .. })
        ));
        mapping.unmap().unwrap();
        assert_eq!(backend.buffer_contents(buffer.raw()).unwrap(), vec![0, 0, 3, 3]);

        let mut plain = buffer.map_range(0, 4, BufferMapAccess::WRITE).unwrap();
        assert!(matches!(
            plain.flush_range(0, 4),
            Err(GlError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_corrupted_unmap_is_engine_error() {
        let (backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.data(4, None, BufferUsage::StreamDraw).unwrap();
        let mapping = buffer.map_range(0, 4, BufferMapAccess::READ).unwrap();
        backend.fail_next_unmap();
        assert!(matches!(mapping.unmap(), Err(GlError::Engine(_))));
        assert!(!buffer.is_mapped());
    }

    #[test]
    fn test_leaked_mapping_blocks_access() {
        let (_backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.data(4, None, BufferUsage::StreamDraw).unwrap();
        std::mem::forget(buffer.map_range(0, 4, BufferMapAccess::WRITE).unwrap());
        assert!(buffer.is_mapped());
        assert!(matches!(
            buffer.sub_data(0, &[1]),
            Err(GlError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_copy_between_buffers() {
        let (_backend, context) = setup();
        let mut source = context.create_buffer().unwrap();
        source.data_from(&[1u32, 2, 3], BufferUsage::StaticCopy).unwrap();
        let mut target = context.create_buffer().unwrap();
        target.data(12, Some(&[0; 12]), BufferUsage::StaticDraw).unwrap();

        Buffer::copy_sub_data(&source, &mut target, 4, 0, 8).unwrap();
        assert_eq!(target.get_sub_data_as::<u32>(0, 3).unwrap(), vec![2, 3, 0]);

        assert!(matches!(
            Buffer::copy_sub_data(&source, &mut target, 8, 8, 8),
            Err(GlError::OutOfBounds { .. })
        ));
        assert!(matches!(
            target.copy_within(0, 2, 4),
            Err(GlError::InvalidParameter(_))
        ));
        target.copy_within(0, 8, 4).unwrap();
        assert_eq!(target.get_sub_data_as::<u32>(0, 3).unwrap(), vec![2, 3, 2]);
    }

    #[test]
    fn test_copy_across_contexts_is_rejected() {
        let (_backend, first) = setup();
        let (_other, second) = setup();
        let mut source = first.create_buffer().unwrap();
        source.data(4, None, BufferUsage::StaticCopy).unwrap();
        let mut target = second.create_buffer().unwrap();
        target.data(4, None, BufferUsage::StaticCopy).unwrap();
        assert!(matches!(
            Buffer::copy_sub_data(&source, &mut target, 0, 0, 4),
            Err(GlError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_destroy_twice() {
        let (backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        buffer.destroy().unwrap();
        assert!(!buffer.is_live());
        assert_eq!(buffer.raw(), 0);
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(
            buffer.destroy(),
            Err(GlError::InvalidHandle { kind: "buffer" })
        );
        assert_eq!(
            buffer.sub_data(0, &[]),
            Err(GlError::InvalidHandle { kind: "buffer" })
        );
    }

    #[test]
    fn test_context_lost() {
        let (backend, context) = setup();
        let mut buffer = context.create_buffer().unwrap();
        drop(context);
        assert_eq!(
            buffer.data(4, None, BufferUsage::StaticDraw),
            Err(GlError::ContextLost)
        );
        drop(buffer);
        // The name died with the context; nothing is released twice.
        assert_eq!(backend.live_buffer_count(), 1);
    }
}
