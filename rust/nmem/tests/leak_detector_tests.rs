#![cfg(debug_assertions)]

use nmem::{AllocationOrigin, MemoryBlock, NativeArray, NativeMemoryStream, NtString, StreamMode};
use nmem_testkit::CountingRuntime;

#[test]
fn test_live_owning_blocks() {
    let (_, ctx) = CountingRuntime::context();
    let base = nmem::block::live_owning_blocks();

    let array = NativeArray::new_in(&ctx, 32).unwrap();
    let text = NtString::new_in(&ctx, "leak?", AllocationOrigin::Raw).unwrap();
    let mut block = MemoryBlock::allocate(&ctx, AllocationOrigin::RuntimeManaged, 8).unwrap();
    let stream = NativeMemoryStream::with_capacity_in(&ctx, 16, StreamMode::Write).unwrap();
    assert_eq!(nmem::block::live_owning_blocks(), base + 4);

    let _empty = NativeArray::new_in(&ctx, 0).unwrap();
    assert_eq!(nmem::block::live_owning_blocks(), base + 4);

    block.release();
    drop(stream);
    drop(text);
    drop(array);
    assert_eq!(nmem::block::live_owning_blocks(), base);

    let ptr = ctx.allocate(AllocationOrigin::Raw, 4).unwrap();
    let borrowed =
        unsafe { MemoryBlock::from_raw_parts(&ctx, ptr, 4, AllocationOrigin::Raw, false) };
    assert_eq!(nmem::block::live_owning_blocks(), base);
    drop(borrowed);
    unsafe { ctx.release(AllocationOrigin::Raw, ptr) };
}
