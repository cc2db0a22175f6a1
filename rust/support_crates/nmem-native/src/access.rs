//! Fixed-width byte transfers between native memory and local byte arrays.
//!
//! These mirror the runtime's `GetN`/`SetN`/`SetNPartial` primitives. None of them
//! validates its arguments; callers check bounds and null pointers first.

/// Reads `N` bytes at `address + offset`.
///
/// # Safety
///
/// `address` must be non-null and `address + offset .. address + offset + N` must lie
/// within a single live allocation.
#[inline]
pub unsafe fn get<const N: usize>(address: *const u8, offset: usize) -> [u8; N] {
    unsafe { std::ptr::read_unaligned(address.add(offset) as *const [u8; N]) }
}

/// Writes all `N` bytes of `bytes` at `address + offset`.
///
/// # Safety
///
/// Same requirements as [`get`], and the range must be writable.
#[inline]
pub unsafe fn set<const N: usize>(address: *mut u8, offset: usize, bytes: &[u8; N]) {
    unsafe { std::ptr::write_unaligned(address.add(offset) as *mut [u8; N], *bytes) }
}

/// Writes the first `count` bytes of `bytes` at `address + offset`, leaving the
/// remainder of the `N`-byte span untouched.
///
/// # Safety
///
/// `address + offset .. address + offset + count` must be writable memory within a
/// single live allocation.
///
/// # Panics
///
/// Panics if `count > N`.
#[inline]
pub unsafe fn set_partial<const N: usize>(
    address: *mut u8,
    offset: usize,
    count: usize,
    bytes: &[u8; N],
) {
    assert!(count <= N);
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), address.add(offset), count) }
}

/// Copies `dst.len()` bytes starting at `address + offset` into `dst`.
///
/// # Safety
///
/// The source range must be readable and must not overlap `dst`.
#[inline]
pub unsafe fn copy_out(address: *const u8, offset: usize, dst: &mut [u8]) {
    unsafe { std::ptr::copy_nonoverlapping(address.add(offset), dst.as_mut_ptr(), dst.len()) }
}

/// Copies `src` into native memory at `address + offset`.
///
/// # Safety
///
/// The destination range must be writable and must not overlap `src`.
#[inline]
pub unsafe fn copy_in(address: *mut u8, offset: usize, src: &[u8]) {
    unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), address.add(offset), src.len()) }
}
