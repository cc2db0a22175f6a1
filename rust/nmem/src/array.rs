//! `NativeArray`: an owned or borrowed native byte region with typed access.

use std::sync::Arc;

use half::f16;
use nmem_buffers::{BufferView, SupportedWidth, Width};
use nmem_common::{Result, verify_arg, verify_range};
use nmem_native::{AllocationOrigin, access};
use nmem_tracker::MemoryContext;

use crate::{
    block::MemoryBlock,
    stream::{NativeMemoryStream, StreamMode},
    transfer::TransferAgent,
};

/// A contiguous native byte region.
///
/// The region is either allocated for the array (owning, tracked tier) or wraps a
/// foreign address with an explicit origin and ownership flag. Every accessor checks
/// its bounds (`offset + width <= len`) and fails with `Disposed` once the array has
/// been released.
#[derive(Debug)]
pub struct NativeArray {
    block: MemoryBlock,
}

macro_rules! typed_accessors {
    ($($ty:ty: $w:literal => $get:ident, $set:ident, $view_get:ident, $view_from:ident;)*) => {
        $(
            #[doc = concat!("Reads a `", stringify!($ty), "` at `offset`.")]
            #[inline]
            pub fn $get(&self, offset: usize) -> Result<$ty> {
                Ok(self.read_view::<$w>(offset)?.$view_get())
            }

            #[doc = concat!("Writes a `", stringify!($ty), "` at `offset`.")]
            #[inline]
            pub fn $set(&mut self, offset: usize, value: $ty) -> Result<()> {
                self.write_view(offset, &BufferView::<$w>::$view_from(value))
            }
        )*
    };
}

impl NativeArray {
    /// Allocates a zero-filled array of `len` bytes in the global memory context.
    pub fn new(len: usize) -> Result<NativeArray> {
        NativeArray::new_in(&MemoryContext::global(), len)
    }

    /// Allocates an array of `len` bytes from the tracked tier of `context`.
    pub fn new_in(context: &Arc<MemoryContext>, len: usize) -> Result<NativeArray> {
        let block = MemoryBlock::allocate(context, AllocationOrigin::Tracked, len)?;
        Ok(NativeArray { block })
    }

    /// Allocates an array in the global memory context and fills it with `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<NativeArray> {
        NativeArray::from_bytes_in(&MemoryContext::global(), bytes)
    }

    pub fn from_bytes_in(context: &Arc<MemoryContext>, bytes: &[u8]) -> Result<NativeArray> {
        let mut array = NativeArray::new_in(context, bytes.len())?;
        if !bytes.is_empty() {
            array.write_at(0, bytes)?;
        }
        Ok(array)
    }

    /// Wraps a foreign region in the global memory context.
    ///
    /// # Safety
    ///
    /// See [`MemoryBlock::from_raw_parts`].
    pub unsafe fn from_raw_parts(
        ptr: *mut u8,
        len: usize,
        origin: AllocationOrigin,
        owns: bool,
    ) -> NativeArray {
        unsafe {
            NativeArray::from_raw_parts_in(&MemoryContext::global(), ptr, len, origin, owns)
        }
    }

    /// Wraps a foreign region.
    ///
    /// # Safety
    ///
    /// See [`MemoryBlock::from_raw_parts`].
    pub unsafe fn from_raw_parts_in(
        context: &Arc<MemoryContext>,
        ptr: *mut u8,
        len: usize,
        origin: AllocationOrigin,
        owns: bool,
    ) -> NativeArray {
        NativeArray {
            block: unsafe { MemoryBlock::from_raw_parts(context, ptr, len, origin, owns) },
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.block.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.block.is_disposed()
    }

    #[inline]
    pub fn owns(&self) -> bool {
        self.block.owns()
    }

    #[inline]
    pub fn origin(&self) -> AllocationOrigin {
        self.block.origin()
    }

    pub fn block(&self) -> &MemoryBlock {
        &self.block
    }

    /// The native address of the region.
    #[inline]
    pub fn as_ptr(&self) -> Result<*mut u8> {
        self.block.as_ptr()
    }

    /// Releases the region if this array owns it. Idempotent.
    ///
    /// Returns `true` if a native free was issued.
    pub fn dispose(&mut self) -> bool {
        self.block.release()
    }

    /// Reads the `W`-byte window at `offset`.
    pub fn read_view<const W: usize>(&self, offset: usize) -> Result<BufferView<W>>
    where
        Width<W>: SupportedWidth,
    {
        let ptr = self.as_ptr()?;
        verify_range!(offset, W, self.len());
        Ok(unsafe { BufferView::<W>::read_from(ptr, offset) })
    }

    /// Writes a `W`-byte window at `offset`.
    pub fn write_view<const W: usize>(&mut self, offset: usize, view: &BufferView<W>) -> Result<()>
    where
        Width<W>: SupportedWidth,
    {
        let ptr = self.as_ptr()?;
        verify_range!(offset, W, self.len());
        unsafe { view.write_to(ptr, offset) };
        Ok(())
    }

    typed_accessors! {
        u8: 1 => get_u8, set_u8, as_u8, from_u8;
        i8: 1 => get_i8, set_i8, as_i8, from_i8;
        u16: 2 => get_u16, set_u16, as_u16, from_u16;
        i16: 2 => get_i16, set_i16, as_i16, from_i16;
        f16: 2 => get_f16, set_f16, as_f16, from_f16;
        u32: 4 => get_u32, set_u32, as_u32, from_u32;
        i32: 4 => get_i32, set_i32, as_i32, from_i32;
        f32: 4 => get_f32, set_f32, as_f32, from_f32;
        u64: 8 => get_u64, set_u64, as_u64, from_u64;
        i64: 8 => get_i64, set_i64, as_i64, from_i64;
        f64: 8 => get_f64, set_f64, as_f64, from_f64;
    }

    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let ptr = self.as_ptr()?;
        verify_range!(offset, dst.len(), self.len());
        unsafe { access::copy_out(ptr, offset, dst) };
        Ok(())
    }

    /// Copies `src` into the region starting at `offset`.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        let ptr = self.as_ptr()?;
        verify_range!(offset, src.len(), self.len());
        unsafe { access::copy_in(ptr, offset, src) };
        Ok(())
    }

    /// Borrows the whole region.
    pub fn as_slice(&self) -> Result<&[u8]> {
        let ptr = self.as_ptr()?;
        Ok(unsafe { std::slice::from_raw_parts(ptr, self.len()) })
    }

    /// Mutably borrows the whole region.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        let ptr = self.as_ptr()?;
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr, self.len()) })
    }

    /// Copies the whole region into a new vector.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(self.as_slice()?.to_vec())
    }

    /// Decodes the whole region into typed elements through `agent`.
    pub fn to_typed_vec<T, A>(&self, agent: &A) -> Result<Vec<T>>
    where
        A: TransferAgent<T> + ?Sized,
    {
        let count = agent.object_count(self.as_slice()?);
        let mut objects = Vec::with_capacity(count);
        let mut stream = NativeMemoryStream::reader(self)?;
        agent.read(&mut stream, &mut objects, crate::transfer::ReadPlacement::Append, count)?;
        stream.close()?;
        Ok(objects)
    }

    /// Encodes `objects[first_index..first_index + count]` through `agent` into the
    /// region, starting at `offset`.
    ///
    /// Returns the number of bytes written.
    pub fn write<T, A>(
        &mut self,
        objects: &[T],
        agent: &A,
        offset: usize,
        first_index: usize,
        count: usize,
    ) -> Result<usize>
    where
        A: TransferAgent<T> + ?Sized,
    {
        self.as_ptr()?;
        verify_arg!(
            first_index,
            first_index
                .checked_add(count)
                .is_some_and(|end| end <= objects.len())
        );
        verify_range!(offset, 0, self.len());
        let objects = &objects[first_index..first_index + count];
        verify_range!(offset, agent.bytes_needed_for(objects), self.len());

        let mut stream = NativeMemoryStream::new(self, StreamMode::Write)?;
        stream.set_position(offset)?;
        let written = agent.write(&mut stream, objects)?;
        stream.close()?;
        Ok(written)
    }
}
