//! The memory context: one native runtime together with its allocation tiers.
//!
//! A process normally uses the single global context returned by
//! [`MemoryContext::global`]. The host may install its own runtime with
//! [`MemoryContext::init_global`] before the first use; afterwards the global is
//! fixed for the lifetime of the process. Teardown is
//! `MemoryContext::global().tracked().release_all()`.

use std::sync::{Arc, OnceLock};

use nmem_common::{Error, Result};
use nmem_native::{AllocationOrigin, NativeRuntime, SystemRuntime};

use crate::{MemoryPressure, NoPressure, RawAllocator, TrackedAllocator};

static GLOBAL: OnceLock<Arc<MemoryContext>> = OnceLock::new();

pub struct MemoryContext {
    runtime: Arc<dyn NativeRuntime>,
    tracked: TrackedAllocator,
    raw: RawAllocator,
}

impl MemoryContext {
    pub fn new(
        runtime: Arc<dyn NativeRuntime>,
        pressure: Arc<dyn MemoryPressure>,
    ) -> Arc<MemoryContext> {
        Arc::new(MemoryContext {
            tracked: TrackedAllocator::new(runtime.clone(), pressure),
            raw: RawAllocator::new(runtime.clone()),
            runtime,
        })
    }

    /// A fresh context over [`SystemRuntime`] that reports no memory pressure.
    pub fn system() -> Arc<MemoryContext> {
        MemoryContext::new(Arc::new(SystemRuntime), Arc::new(NoPressure))
    }

    /// The process-wide context, created over [`SystemRuntime`] on first use unless
    /// [`MemoryContext::init_global`] installed another one.
    pub fn global() -> Arc<MemoryContext> {
        GLOBAL.get_or_init(MemoryContext::system).clone()
    }

    /// Installs `context` as the process-wide context.
    ///
    /// Fails if the global context was already initialized, either explicitly or by
    /// a prior call to [`MemoryContext::global`].
    pub fn init_global(context: Arc<MemoryContext>) -> Result<()> {
        GLOBAL.set(context).map_err(|_| {
            Error::invalid_arg("context", "global memory context is already initialized")
        })
    }

    pub fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.runtime
    }

    pub fn tracked(&self) -> &TrackedAllocator {
        &self.tracked
    }

    pub fn raw(&self) -> &RawAllocator {
        &self.raw
    }

    /// Allocates `size` bytes from the heap matching `origin`.
    ///
    /// The returned pointer is never null: every tier's null result is reported as
    /// `OutOfMemory`.
    pub fn allocate(&self, origin: AllocationOrigin, size: usize) -> Result<*mut u8> {
        let ptr = match origin {
            AllocationOrigin::Tracked => return self.tracked.allocate(size),
            AllocationOrigin::Raw => self.raw.allocate(size),
            AllocationOrigin::RuntimeManaged => {
                self.runtime.allocate(AllocationOrigin::RuntimeManaged, size)
            }
        };
        if ptr.is_null() {
            Err(Error::out_of_memory(size))
        } else {
            Ok(ptr)
        }
    }

    /// Releases `ptr` through the path matching `origin`.
    ///
    /// Tracked addresses go through the tracked tier without `force`, so an address
    /// the tier does not know is left alone. Returns `true` if a native free was
    /// issued.
    ///
    /// # Safety
    ///
    /// For raw and runtime-managed origins, `ptr` must be a live address of that heap
    /// and must not be released again afterwards.
    pub unsafe fn release(&self, origin: AllocationOrigin, ptr: *mut u8) -> bool {
        if ptr.is_null() {
            return false;
        }
        match origin {
            AllocationOrigin::Tracked => unsafe { self.tracked.free(ptr, false) },
            AllocationOrigin::Raw => {
                unsafe { self.raw.free(ptr) };
                true
            }
            AllocationOrigin::RuntimeManaged => {
                unsafe {
                    self.runtime
                        .free(AllocationOrigin::RuntimeManaged, ptr)
                };
                true
            }
        }
    }
}

impl std::fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContext")
            .field("tracked", &self.tracked)
            .finish_non_exhaustive()
    }
}
