//! `MemoryBlock`: the ownership handle for a native address.

use std::sync::Arc;

use nmem_common::{Error, Result};
use nmem_native::AllocationOrigin;
use nmem_tracker::MemoryContext;

/// A native memory region together with the information needed to release it.
///
/// The handle records where the address came from (`origin`) and whether this
/// instance is responsible for freeing it (`owns`). Release is routed through the
/// context by origin, happens at most once, and is skipped entirely for
/// non-owning handles.
///
/// A zero-sized block is born disposed. Once disposed, every further release is a
/// no-op, and every access fails with `Disposed`.
pub struct MemoryBlock {
    ptr: *mut u8,
    len: usize,
    origin: AllocationOrigin,
    owns: bool,
    disposed: bool,
    context: Arc<MemoryContext>,
}

impl MemoryBlock {
    /// Allocates a new owning block of `len` bytes from the heap matching `origin`.
    pub fn allocate(
        context: &Arc<MemoryContext>,
        origin: AllocationOrigin,
        len: usize,
    ) -> Result<MemoryBlock> {
        if len == 0 {
            return Ok(MemoryBlock::empty(context, origin));
        }
        let ptr = context.allocate(origin, len)?;
        let block = MemoryBlock {
            ptr,
            len,
            origin,
            owns: true,
            disposed: false,
            context: context.clone(),
        };
        leak_detector::acquired();
        log::trace!("memory block: allocated {len} {origin} bytes at {ptr:p}");
        Ok(block)
    }

    /// Wraps a foreign address.
    ///
    /// A zero-length wrap is born disposed; if it owns a non-null address, that
    /// address is released immediately.
    ///
    /// # Safety
    ///
    /// If `ptr` is non-null, `len` bytes at `ptr` must stay valid for the lifetime of
    /// the block. If `owns` is set, `ptr` must be a live address of the heap named by
    /// `origin` in `context`, and nothing else may release it.
    pub unsafe fn from_raw_parts(
        context: &Arc<MemoryContext>,
        ptr: *mut u8,
        len: usize,
        origin: AllocationOrigin,
        owns: bool,
    ) -> MemoryBlock {
        if len == 0 {
            if owns && !ptr.is_null() {
                // Nothing to access, but the address is still ours to free.
                log::trace!("memory block: releasing empty {origin} region at {ptr:p}");
                unsafe { context.release(origin, ptr) };
            }
            return MemoryBlock::empty(context, origin);
        }
        if owns && !ptr.is_null() {
            leak_detector::acquired();
        }
        MemoryBlock {
            ptr,
            len,
            origin,
            owns,
            disposed: false,
            context: context.clone(),
        }
    }

    fn empty(context: &Arc<MemoryContext>, origin: AllocationOrigin) -> MemoryBlock {
        MemoryBlock {
            ptr: std::ptr::null_mut(),
            len: 0,
            origin,
            owns: false,
            disposed: true,
            context: context.clone(),
        }
    }

    /// The native address, validated for access.
    ///
    /// Fails with `Disposed` after release and with `NullPointer` if the block wraps a
    /// null address.
    #[inline]
    pub fn as_ptr(&self) -> Result<*mut u8> {
        if self.disposed {
            return Err(Error::disposed("memory block"));
        }
        if self.ptr.is_null() {
            return Err(Error::null_pointer("memory block address"));
        }
        Ok(self.ptr)
    }

    /// The native address without validation. Null once the block is disposed.
    #[inline]
    pub fn raw_ptr(&self) -> *mut u8 {
        self.ptr
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn origin(&self) -> AllocationOrigin {
        self.origin
    }

    #[inline]
    pub fn owns(&self) -> bool {
        self.owns
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn context(&self) -> &Arc<MemoryContext> {
        &self.context
    }

    /// Gives up ownership: the block stays usable, but will never free its address.
    ///
    /// Returns the address, which the caller is now responsible for.
    pub fn disown(&mut self) -> *mut u8 {
        if self.owns && !self.disposed && !self.ptr.is_null() {
            leak_detector::released();
        }
        self.owns = false;
        self.ptr
    }

    /// Releases the block.
    ///
    /// Frees the address through the release path of its origin if, and only if, this
    /// block owns it. Returns `true` if a native free was issued. Calling `release` on
    /// a disposed block does nothing.
    pub fn release(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        let ptr = std::mem::replace(&mut self.ptr, std::ptr::null_mut());
        if !self.owns || ptr.is_null() {
            return false;
        }
        leak_detector::released();
        log::trace!(
            "memory block: releasing {} {} bytes at {ptr:p}",
            self.len,
            self.origin
        );
        // SAFETY: an owning block holds a live address of its origin's heap, and the
        // disposed flag guarantees this point is reached once.
        unsafe { self.context.release(self.origin, ptr) }
    }
}

impl Drop for MemoryBlock {
    fn drop(&mut self) {
        if !self.disposed && self.owns {
            log::debug!(
                "memory block of {} {} bytes released on drop",
                self.len,
                self.origin
            );
        }
        self.release();
    }
}

// SAFETY: the block exclusively owns (or exclusively views) its region; moving it
// to another thread moves that responsibility along with it. It is not `Sync`.
unsafe impl Send for MemoryBlock {}

impl std::fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlock")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("origin", &self.origin)
            .field("owns", &self.owns)
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Number of owning blocks currently alive in this process.
///
/// Only tracked in debug builds.
#[cfg(debug_assertions)]
pub fn live_owning_blocks() -> usize {
    leak_detector::live()
}

mod leak_detector {
    #[cfg(debug_assertions)]
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[cfg(debug_assertions)]
    static LIVE: AtomicUsize = AtomicUsize::new(0);

    #[inline]
    pub(super) fn acquired() {
        #[cfg(debug_assertions)]
        LIVE.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(super) fn released() {
        #[cfg(debug_assertions)]
        LIVE.fetch_sub(1, Ordering::Relaxed);
    }

    #[cfg(debug_assertions)]
    pub(super) fn live() -> usize {
        LIVE.load(Ordering::Relaxed)
    }
}
