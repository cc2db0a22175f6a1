use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
};

use nmem_native::{AllocationOrigin, NativeRuntime, SystemRuntime};
use nmem_tracker::{MemoryContext, MemoryPressure};

const ORIGINS: usize = 3;

fn slot(origin: AllocationOrigin) -> usize {
    match origin {
        AllocationOrigin::Tracked => 0,
        AllocationOrigin::Raw => 1,
        AllocationOrigin::RuntimeManaged => 2,
    }
}

/// A [`NativeRuntime`] over [`SystemRuntime`] that counts every call per heap.
#[derive(Default)]
pub struct CountingRuntime {
    inner: SystemRuntime,
    allocations: [AtomicUsize; ORIGINS],
    frees: [AtomicUsize; ORIGINS],
    fail_allocations: AtomicBool,
}

impl CountingRuntime {
    pub fn new() -> Arc<CountingRuntime> {
        Arc::new(CountingRuntime::default())
    }

    /// A private memory context over a new counting runtime, reporting no pressure.
    pub fn context() -> (Arc<CountingRuntime>, Arc<MemoryContext>) {
        let runtime = CountingRuntime::new();
        let context = MemoryContext::new(runtime.clone(), Arc::new(nmem_tracker::NoPressure));
        (runtime, context)
    }

    /// Like [`CountingRuntime::context`], with a [`PressureGauge`] attached.
    pub fn context_with_gauge() -> (Arc<CountingRuntime>, Arc<PressureGauge>, Arc<MemoryContext>)
    {
        let runtime = CountingRuntime::new();
        let gauge = Arc::new(PressureGauge::default());
        let context = MemoryContext::new(runtime.clone(), gauge.clone());
        (runtime, gauge, context)
    }

    /// Makes every subsequent allocation return null until reset.
    pub fn fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::Relaxed);
    }

    pub fn allocations(&self, origin: AllocationOrigin) -> usize {
        self.allocations[slot(origin)].load(Ordering::Relaxed)
    }

    pub fn frees(&self, origin: AllocationOrigin) -> usize {
        self.frees[slot(origin)].load(Ordering::Relaxed)
    }

    pub fn total_allocations(&self) -> usize {
        self.allocations
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    pub fn total_frees(&self) -> usize {
        self.frees.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Allocations not yet matched by a free, across all heaps.
    pub fn outstanding(&self) -> usize {
        self.total_allocations() - self.total_frees()
    }
}

impl NativeRuntime for CountingRuntime {
    fn allocate(&self, origin: AllocationOrigin, size: usize) -> *mut u8 {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return std::ptr::null_mut();
        }
        let ptr = self.inner.allocate(origin, size);
        if !ptr.is_null() {
            self.allocations[slot(origin)].fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn free(&self, origin: AllocationOrigin, ptr: *mut u8) {
        self.frees[slot(origin)].fetch_add(1, Ordering::Relaxed);
        unsafe { self.inner.free(origin, ptr) }
    }
}

/// A [`MemoryPressure`] sink keeping the running balance of reported bytes.
#[derive(Default, Debug)]
pub struct PressureGauge(AtomicI64);

impl PressureGauge {
    pub fn balance(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl MemoryPressure for PressureGauge {
    fn add_pressure(&self, bytes: u64) {
        self.0.fetch_add(bytes as i64, Ordering::Relaxed);
    }

    fn remove_pressure(&self, bytes: u64) {
        self.0.fetch_sub(bytes as i64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_origin() {
        let (runtime, ctx) = CountingRuntime::context();
        let a = ctx.allocate(AllocationOrigin::Tracked, 10).unwrap();
        let b = ctx.allocate(AllocationOrigin::Raw, 10).unwrap();
        assert_eq!(runtime.allocations(AllocationOrigin::Tracked), 1);
        assert_eq!(runtime.allocations(AllocationOrigin::Raw), 1);
        assert_eq!(runtime.outstanding(), 2);
        unsafe {
            ctx.release(AllocationOrigin::Tracked, a);
            ctx.release(AllocationOrigin::Raw, b);
        }
        assert_eq!(runtime.outstanding(), 0);
    }

    #[test]
    fn test_injected_failure() {
        let (runtime, gauge, ctx) = CountingRuntime::context_with_gauge();
        runtime.fail_allocations(true);
        assert!(ctx.allocate(AllocationOrigin::Tracked, 0).is_err());
        assert!(ctx.allocate(AllocationOrigin::Raw, 4).is_err());
        runtime.fail_allocations(false);
        let p = ctx.allocate(AllocationOrigin::Tracked, 4).unwrap();
        assert_eq!(gauge.balance(), 4);
        unsafe { ctx.release(AllocationOrigin::Tracked, p) };
        assert_eq!(gauge.balance(), 0);
    }
}
