use std::alloc::{Layout, alloc_zeroed, dealloc};

use crate::{AllocationOrigin, NativeRuntime};

/// A [`NativeRuntime`] emulated on top of the global Rust allocator.
///
/// Every heap is served by the same allocator. The requested size is stored in a
/// small header in front of the returned address, so that `free` needs nothing but
/// the pointer, like the engine's own `free` primitive.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRuntime;

impl SystemRuntime {
    /// Alignment of every address handed out, and size of the size header.
    pub const ALIGNMENT: usize = 16;

    pub fn new() -> SystemRuntime {
        SystemRuntime
    }

    fn layout(size: usize) -> Option<Layout> {
        let total = size.checked_add(Self::ALIGNMENT)?;
        Layout::from_size_align(total, Self::ALIGNMENT).ok()
    }
}

impl NativeRuntime for SystemRuntime {
    fn allocate(&self, origin: AllocationOrigin, size: usize) -> *mut u8 {
        let Some(layout) = Self::layout(size) else {
            return std::ptr::null_mut();
        };
        let base = unsafe { alloc_zeroed(layout) };
        if base.is_null() {
            log::debug!("system runtime: {origin} allocation of {size} bytes failed");
            return base;
        }
        unsafe {
            (base as *mut usize).write(size);
            base.add(Self::ALIGNMENT)
        }
    }

    unsafe fn free(&self, _origin: AllocationOrigin, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        unsafe {
            let base = ptr.sub(Self::ALIGNMENT);
            let size = (base as *const usize).read();
            // The layout was valid when the block was allocated.
            let layout = Layout::from_size_align_unchecked(size + Self::ALIGNMENT, Self::ALIGNMENT);
            dealloc(base, layout);
        }
    }
}
