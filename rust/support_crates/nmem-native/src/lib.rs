//! The native runtime boundary.
//!
//! This crate describes the primitives the engine runtime exposes to the managed side:
//! allocation and release for each heap ([`NativeRuntime`]), and the fixed-width
//! `get`/`set` byte transfers at `(address, offset)` ([`access`]). Everything above it
//! treats these as opaque capabilities.

pub mod access;
pub mod system;

pub use system::SystemRuntime;

/// The heap a native address was obtained from. Determines the release path that
/// must be used to free it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationOrigin {
    /// Allocated through the tracked tier; the allocation is booked and reported as
    /// memory pressure.
    Tracked,
    /// Allocated through the raw tier; no bookkeeping of any kind.
    Raw,
    /// Allocated by the runtime itself on behalf of the managed side.
    RuntimeManaged,
}

impl AllocationOrigin {
    pub fn name(&self) -> &'static str {
        match self {
            AllocationOrigin::Tracked => "tracked",
            AllocationOrigin::Raw => "raw",
            AllocationOrigin::RuntimeManaged => "runtime-managed",
        }
    }
}

impl std::fmt::Display for AllocationOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Allocation primitives of the native runtime.
///
/// Each [`AllocationOrigin`] names a distinct heap. An address must be released
/// through the same origin it was allocated from, exactly once.
pub trait NativeRuntime: Send + Sync + 'static {
    /// Allocates `size` bytes from the heap serving `origin`.
    ///
    /// Returns a null pointer when the allocation cannot be satisfied. A zero-sized
    /// request may return either a null or a unique non-null pointer.
    fn allocate(&self, origin: AllocationOrigin, size: usize) -> *mut u8;

    /// Releases an address previously returned by [`NativeRuntime::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` with the same `origin`, and must
    /// not have been released already.
    unsafe fn free(&self, origin: AllocationOrigin, ptr: *mut u8);
}
