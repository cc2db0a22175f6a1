use std::sync::Arc;

use nmem_native::{AllocationOrigin, NativeRuntime};

/// The raw allocation tier: an unconditional pass-through to the runtime's raw heap.
///
/// Nothing is booked, no pressure is reported and there is no double-free guard.
/// Callers own the full lifetime of every address they obtain here.
#[derive(Clone)]
pub struct RawAllocator {
    runtime: Arc<dyn NativeRuntime>,
}

impl RawAllocator {
    pub fn new(runtime: Arc<dyn NativeRuntime>) -> RawAllocator {
        RawAllocator { runtime }
    }

    /// Allocates `size` bytes; returns null on failure.
    #[inline]
    pub fn allocate(&self, size: usize) -> *mut u8 {
        self.runtime.allocate(AllocationOrigin::Raw, size)
    }

    /// # Safety
    ///
    /// `ptr` must come from [`RawAllocator::allocate`] on the same runtime and must not
    /// have been freed.
    #[inline]
    pub unsafe fn free(&self, ptr: *mut u8) {
        unsafe { self.runtime.free(AllocationOrigin::Raw, ptr) }
    }
}

impl std::fmt::Debug for RawAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawAllocator").finish_non_exhaustive()
    }
}
