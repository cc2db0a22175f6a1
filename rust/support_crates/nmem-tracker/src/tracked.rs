use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;
use nmem_common::{Error, Result};
use nmem_native::{AllocationOrigin, NativeRuntime};

use crate::{MemoryPressure, counter::Counter};

/// The tracked allocation tier.
///
/// Every live allocation is recorded in an address-to-size table guarded by a lock.
/// The aggregate counter is only modified while that lock is held, so outside of a
/// call it always equals the sum of the sizes in the table.
pub struct TrackedAllocator {
    runtime: Arc<dyn NativeRuntime>,
    pressure: Arc<dyn MemoryPressure>,
    table: Mutex<AHashMap<usize, usize>>,
    allocated: Counter,
}

impl TrackedAllocator {
    pub fn new(
        runtime: Arc<dyn NativeRuntime>,
        pressure: Arc<dyn MemoryPressure>,
    ) -> TrackedAllocator {
        TrackedAllocator {
            runtime,
            pressure,
            table: Mutex::new(AHashMap::new()),
            allocated: Counter::new(0),
        }
    }

    /// Allocates `size` bytes from the tracked native heap and books the allocation.
    ///
    /// A null result from the runtime is an `OutOfMemory` error, including for
    /// `size == 0`.
    pub fn allocate(&self, size: usize) -> Result<*mut u8> {
        let ptr = self.runtime.allocate(AllocationOrigin::Tracked, size);
        if ptr.is_null() {
            return Err(Error::out_of_memory(size));
        }
        {
            let mut table = self.table();
            let previous = table.insert(ptr as usize, size);
            debug_assert!(previous.is_none(), "runtime returned a live address");
            self.allocated.deposit(size as u64);
        }
        self.pressure.add_pressure(size as u64);
        log::trace!("tracked allocate: {size} bytes at {ptr:p}");
        Ok(ptr)
    }

    /// Frees a tracked allocation.
    ///
    /// If `ptr` is not in the table, nothing happens unless `force` is set, in which
    /// case the address is handed to the native free primitive regardless.
    ///
    /// Returns `true` if a native free was issued.
    ///
    /// # Safety
    ///
    /// With `force == true` and an untracked `ptr`, the caller must guarantee that `ptr`
    /// is a live address of the tracked native heap.
    pub unsafe fn free(&self, ptr: *mut u8, force: bool) -> bool {
        if ptr.is_null() {
            return false;
        }
        let size = {
            let mut table = self.table();
            let size = table.remove(&(ptr as usize));
            if let Some(size) = size {
                let withdrawn = self.allocated.withdraw(size as u64);
                debug_assert!(withdrawn, "tracked counter below booked size");
            }
            size
        };
        match size {
            Some(size) => {
                unsafe { self.runtime.free(AllocationOrigin::Tracked, ptr) };
                self.pressure.remove_pressure(size as u64);
                log::trace!("tracked free: {size} bytes at {ptr:p}");
                true
            }
            None if force => {
                log::warn!("forced free of untracked address {ptr:p}");
                unsafe { self.runtime.free(AllocationOrigin::Tracked, ptr) };
                true
            }
            None => false,
        }
    }

    /// Total size of the outstanding tracked allocations.
    pub fn allocated_bytes(&self) -> u64 {
        let _table = self.table();
        self.allocated.read()
    }

    /// Number of outstanding tracked allocations.
    pub fn outstanding(&self) -> usize {
        self.table().len()
    }

    pub fn is_tracked(&self, ptr: *const u8) -> bool {
        self.table().contains_key(&(ptr as usize))
    }

    /// Booked size of a tracked allocation.
    pub fn size_of(&self, ptr: *const u8) -> Option<usize> {
        self.table().get(&(ptr as usize)).copied()
    }

    /// Frees every outstanding tracked allocation and returns how many were freed.
    ///
    /// Intended for host teardown, after every handle to a tracked address is gone.
    /// A handle that outlives this call still holds a freed address: if the runtime
    /// hands that address out again, releasing the stale handle frees the new
    /// allocation.
    pub fn release_all(&self) -> usize {
        let entries = {
            let mut table = self.table();
            self.allocated.drain();
            std::mem::take(&mut *table)
        };
        let count = entries.len();
        let mut total = 0u64;
        for (address, size) in entries {
            unsafe {
                self.runtime
                    .free(AllocationOrigin::Tracked, address as *mut u8)
            };
            total += size as u64;
        }
        if total != 0 {
            self.pressure.remove_pressure(total);
        }
        log::debug!("tracked teardown released {count} allocations ({total} bytes)");
        count
    }

    fn table(&self) -> MutexGuard<'_, AHashMap<usize, usize>> {
        // The table and the counter are updated together under the lock and neither
        // update can panic halfway, so a poisoned table is still consistent.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TrackedAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedAllocator")
            .field("outstanding", &self.outstanding())
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    };

    use nmem_native::SystemRuntime;

    use super::*;

    #[derive(Default)]
    struct Gauge(AtomicI64);

    impl MemoryPressure for Gauge {
        fn add_pressure(&self, bytes: u64) {
            self.0.fetch_add(bytes as i64, Ordering::Relaxed);
        }

        fn remove_pressure(&self, bytes: u64) {
            self.0.fetch_sub(bytes as i64, Ordering::Relaxed);
        }
    }

    fn allocator() -> (TrackedAllocator, Arc<Gauge>) {
        let gauge = Arc::new(Gauge::default());
        let allocator = TrackedAllocator::new(Arc::new(SystemRuntime), gauge.clone());
        (allocator, gauge)
    }

    #[test]
    fn test_allocate_and_free() {
        let (allocator, gauge) = allocator();
        let a = allocator.allocate(16).unwrap();
        let b = allocator.allocate(100).unwrap();
        assert_eq!(allocator.allocated_bytes(), 116);
        assert_eq!(allocator.outstanding(), 2);
        assert_eq!(allocator.size_of(b), Some(100));
        assert_eq!(gauge.0.load(Ordering::Relaxed), 116);

        assert!(unsafe { allocator.free(a, false) });
        assert_eq!(allocator.allocated_bytes(), 100);
        assert!(!allocator.is_tracked(a));
        assert!(unsafe { allocator.free(b, false) });
        assert_eq!(allocator.allocated_bytes(), 0);
        assert_eq!(gauge.0.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_free_untracked_is_noop() {
        let (allocator, _) = allocator();
        let a = allocator.allocate(8).unwrap();
        assert!(unsafe { allocator.free(a, false) });
        // Second free of the same address: no longer tracked, silently ignored.
        assert!(!unsafe { allocator.free(a, false) });
        assert!(!unsafe { allocator.free(std::ptr::null_mut(), true) });
        assert_eq!(allocator.allocated_bytes(), 0);
    }

    #[test]
    fn test_forced_free_of_foreign_address() {
        let runtime = Arc::new(SystemRuntime);
        let (allocator, _) = allocator();
        let foreign = runtime.allocate(AllocationOrigin::Tracked, 32);
        assert!(!allocator.is_tracked(foreign));
        assert!(unsafe { allocator.free(foreign, true) });
        assert_eq!(allocator.allocated_bytes(), 0);
    }

    #[test]
    fn test_zero_size_allocation_is_booked() {
        let (allocator, _) = allocator();
        let p = allocator.allocate(0).unwrap();
        assert!(allocator.is_tracked(p));
        assert_eq!(allocator.allocated_bytes(), 0);
        assert!(unsafe { allocator.free(p, false) });
        assert_eq!(allocator.outstanding(), 0);
    }

    #[test]
    fn test_out_of_memory() {
        let (allocator, gauge) = allocator();
        let err = allocator.allocate(usize::MAX).unwrap_err();
        assert!(matches!(
            err.kind(),
            nmem_common::ErrorKind::OutOfMemory { size } if *size == usize::MAX
        ));
        assert_eq!(allocator.outstanding(), 0);
        assert_eq!(gauge.0.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_accounting_matches_table() {
        let (allocator, gauge) = allocator();
        let mut rng = fastrand::Rng::with_seed(7);
        let mut live: Vec<(*mut u8, usize)> = Vec::new();
        for _ in 0..500 {
            if live.is_empty() || rng.bool() {
                let size = rng.usize(0..300);
                live.push((allocator.allocate(size).unwrap(), size));
            } else {
                let (ptr, _) = live.swap_remove(rng.usize(..live.len()));
                assert!(unsafe { allocator.free(ptr, false) });
            }
            let expected: usize = live.iter().map(|(_, size)| size).sum();
            assert_eq!(allocator.allocated_bytes(), expected as u64);
            assert_eq!(gauge.0.load(Ordering::Relaxed), expected as i64);
        }
        assert_eq!(allocator.release_all(), live.len());
        assert_eq!(allocator.allocated_bytes(), 0);
        assert_eq!(gauge.0.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_concurrent_accounting() {
        let (allocator, _) = allocator();
        let allocator = Arc::new(allocator);
        let handles = (0..4)
            .map(|t| {
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let ptr = allocator.allocate(t * 10 + i).unwrap();
                        assert!(unsafe { allocator.free(ptr, false) });
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(allocator.allocated_bytes(), 0);
        assert_eq!(allocator.outstanding(), 0);
    }
}
