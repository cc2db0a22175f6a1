//! Allocator tiers over the native runtime.
//!
//! - [`TrackedAllocator`] books every allocation in an address table, keeps an aggregate
//!   byte counter equal to the sum of the table, and reports off-heap memory pressure.
//! - [`RawAllocator`] is a bare pass-through with no bookkeeping.
//! - [`MemoryContext`] bundles a runtime with both tiers and routes releases by origin.

pub mod context;
pub mod counter;
pub mod raw;
pub mod tracked;

pub use context::MemoryContext;
pub use nmem_native::{AllocationOrigin, NativeRuntime};
pub use raw::RawAllocator;
pub use tracked::TrackedAllocator;

/// Receiver of off-heap memory pressure notifications, the managed runtime's garbage
/// collector in a real host.
pub trait MemoryPressure: Send + Sync + 'static {
    /// Reports `bytes` of newly allocated native memory held by managed objects.
    fn add_pressure(&self, bytes: u64);

    /// Reports that `bytes` of native memory were released.
    fn remove_pressure(&self, bytes: u64);
}

/// A [`MemoryPressure`] sink that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPressure;

impl MemoryPressure for NoPressure {
    fn add_pressure(&self, _bytes: u64) {}

    fn remove_pressure(&self, _bytes: u64) {}
}
