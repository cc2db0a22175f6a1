//! Width dispatch over the closed set of buffer views.

use nmem_common::{Error, Result};

use crate::view::BufferView;

macro_rules! any_buffer_view {
    ($($variant:ident => $w:literal),* $(,)?) => {
        /// A buffer view whose width is chosen at run time.
        ///
        /// Every operation dispatches to the concrete [`BufferView`] whose width
        /// exactly equals the requested one; any other width is rejected.
        #[derive(Clone, Copy, PartialEq, Eq, Debug)]
        pub enum AnyBufferView {
            $($variant(BufferView<$w>),)*
        }

        impl AnyBufferView {
            /// A zero-filled view of `width` bytes.
            pub fn zeroed(width: usize) -> Result<AnyBufferView> {
                match width {
                    $($w => Ok(AnyBufferView::$variant(BufferView::<$w>::zeroed())),)*
                    _ => Err(unsupported_width(width)),
                }
            }

            /// Reads `width` bytes at `address + offset`.
            ///
            /// # Safety
            ///
            /// `address` must be non-null and `width` bytes at `address + offset` must be
            /// readable.
            pub unsafe fn read_from(
                address: *const u8,
                offset: usize,
                width: usize,
            ) -> Result<AnyBufferView> {
                match width {
                    $($w => Ok(AnyBufferView::$variant(unsafe {
                        BufferView::<$w>::read_from(address, offset)
                    })),)*
                    _ => Err(unsupported_width(width)),
                }
            }

            #[inline]
            pub fn len(&self) -> usize {
                match self {
                    $(AnyBufferView::$variant(_) => $w,)*
                }
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                false
            }

            #[inline]
            pub fn as_slice(&self) -> &[u8] {
                match self {
                    $(AnyBufferView::$variant(v) => v.as_bytes(),)*
                }
            }

            #[inline]
            pub fn as_mut_slice(&mut self) -> &mut [u8] {
                match self {
                    $(AnyBufferView::$variant(v) => v.as_bytes_mut(),)*
                }
            }

            /// Stores the whole view at `address + offset`.
            ///
            /// # Safety
            ///
            /// `self.len()` bytes at `address + offset` must be writable.
            pub unsafe fn write_to(&self, address: *mut u8, offset: usize) {
                match self {
                    $(AnyBufferView::$variant(v) => unsafe { v.write_to(address, offset) },)*
                }
            }

            /// Stores the first `count` bytes of the view at `address + offset`.
            ///
            /// # Safety
            ///
            /// `count` bytes at `address + offset` must be writable.
            ///
            /// # Panics
            ///
            /// Panics if `count > self.len()`.
            pub unsafe fn write_partial_to(&self, address: *mut u8, offset: usize, count: usize) {
                match self {
                    $(AnyBufferView::$variant(v) => unsafe {
                        v.write_partial_to(address, offset, count)
                    },)*
                }
            }
        }

        $(
            impl From<BufferView<$w>> for AnyBufferView {
                fn from(view: BufferView<$w>) -> Self {
                    AnyBufferView::$variant(view)
                }
            }
        )*
    };
}

any_buffer_view!(
    W1 => 1,
    W2 => 2,
    W4 => 4,
    W8 => 8,
    W32 => 32,
    W64 => 64,
    W128 => 128,
    W256 => 256,
    W512 => 512,
);

#[cold]
fn unsupported_width(width: usize) -> Error {
    Error::invalid_arg(
        "width",
        format!("{width} is not a supported buffer view width"),
    )
}

/// Writes `buffer` to `address + offset`, dispatching on `buffer.len()`.
///
/// Fails with `InvalidArgument` when the slice length is not a supported width; no
/// bytes are written in that case.
///
/// # Safety
///
/// `buffer.len()` bytes at `address + offset` must be writable.
pub unsafe fn set(address: *mut u8, buffer: &[u8], offset: usize) -> Result<()> {
    let mut view = AnyBufferView::zeroed(buffer.len())?;
    view.as_mut_slice().copy_from_slice(buffer);
    unsafe { view.write_to(address, offset) };
    Ok(())
}

/// Reads `width` bytes at `address + offset` into a new vector, dispatching on
/// `width`.
///
/// # Safety
///
/// `width` bytes at `address + offset` must be readable.
pub unsafe fn get(address: *const u8, offset: usize, width: usize) -> Result<Vec<u8>> {
    let view = unsafe { AnyBufferView::read_from(address, offset, width)? };
    Ok(view.as_slice().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widths::WIDTHS;

    #[test]
    fn test_zeroed_for_every_width() {
        for &w in &WIDTHS {
            let view = AnyBufferView::zeroed(w).unwrap();
            assert_eq!(view.len(), w);
            assert!(view.as_slice().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_unsupported_width_rejected() {
        for w in [0, 3, 5, 16, 100, 513, 1024] {
            let err = AnyBufferView::zeroed(w).unwrap_err();
            assert!(matches!(
                err.kind(),
                nmem_common::ErrorKind::InvalidArgument { .. }
            ));
        }
    }

    #[test]
    fn test_dispatch_set_get() {
        let mut memory = vec![0u8; 1024];
        let ptr = memory.as_mut_ptr();
        let mut rng = fastrand::Rng::with_seed(11);
        for &w in &WIDTHS {
            let data: Vec<u8> = std::iter::repeat_with(|| rng.u8(..)).take(w).collect();
            unsafe {
                set(ptr, &data, 100).unwrap();
                assert_eq!(get(ptr, 100, w).unwrap(), data);
            }
        }
    }

    #[test]
    fn test_dispatch_set_unsupported_writes_nothing() {
        let mut memory = vec![0u8; 16];
        let result = unsafe { set(memory.as_mut_ptr(), &[1, 2, 3], 0) };
        assert!(result.is_err());
        assert!(memory.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_concrete_view() {
        let view: AnyBufferView = BufferView::<4>::from_u32(0xDEADBEEF).into();
        assert_eq!(view.len(), 4);
        assert_eq!(view.as_slice(), &0xDEADBEEFu32.to_ne_bytes());
    }
}
