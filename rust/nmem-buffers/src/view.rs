//! Fixed-width byte windows.

use half::f16;
use nmem_common::{Error, Result};
use nmem_native::access;

/// Type-level marker for a buffer view width.
pub struct Width<const W: usize>;

mod sealed {
    pub trait Sealed {}
}

/// Implemented for exactly the widths listed in [`crate::widths::WIDTHS`].
pub trait SupportedWidth: sealed::Sealed {}

macro_rules! supported_widths {
    ($($w:literal),*) => {
        $(
            impl sealed::Sealed for Width<$w> {}
            impl SupportedWidth for Width<$w> {}
        )*
    };
}

supported_widths!(1, 2, 4, 8, 32, 64, 128, 256, 512);

/// A byte window of fixed width `W`.
///
/// `W` is restricted to the closed set of supported widths. Narrow views (1, 2, 4 and
/// 8 bytes) also expose accessors that reinterpret the same bytes as integers,
/// floating point numbers or UTF-16 code units; these are bit casts in native byte
/// order, never value conversions. Wide views are opaque bulk-copy windows.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferView<const W: usize> {
    bytes: [u8; W],
}

pub type Buffer1 = BufferView<1>;
pub type Buffer2 = BufferView<2>;
pub type Buffer4 = BufferView<4>;
pub type Buffer8 = BufferView<8>;
pub type Buffer32 = BufferView<32>;
pub type Buffer64 = BufferView<64>;
pub type Buffer128 = BufferView<128>;
pub type Buffer256 = BufferView<256>;
pub type Buffer512 = BufferView<512>;

impl<const W: usize> BufferView<W>
where
    Width<W>: SupportedWidth,
{
    pub const WIDTH: usize = W;

    #[inline]
    pub fn zeroed() -> Self {
        BufferView { bytes: [0u8; W] }
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; W]) -> Self {
        BufferView { bytes }
    }

    /// Copies `W` bytes out of `slice`.
    ///
    /// Fails with `InvalidArgument` unless `slice.len() == W`.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes = <[u8; W]>::try_from(slice).map_err(|_| {
            Error::invalid_arg("slice", format!("expected {W} bytes, got {}", slice.len()))
        })?;
        Ok(BufferView { bytes })
    }

    #[inline]
    pub fn len(&self) -> usize {
        W
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; W] {
        &self.bytes
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8; W] {
        &mut self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> [u8; W] {
        self.bytes
    }

    /// Bounds-checked byte read.
    #[inline]
    pub fn get(&self, index: usize) -> Result<u8> {
        self.bytes
            .get(index)
            .copied()
            .ok_or_else(|| Error::overflow(index, 1, W))
    }

    /// Bounds-checked byte write.
    #[inline]
    pub fn set(&mut self, index: usize, value: u8) -> Result<()> {
        let slot = self
            .bytes
            .get_mut(index)
            .ok_or_else(|| Error::overflow(index, 1, W))?;
        *slot = value;
        Ok(())
    }

    /// Loads the view from `address + offset`.
    ///
    /// # Safety
    ///
    /// `address` must be non-null and `W` bytes at `address + offset` must be readable.
    #[inline]
    pub unsafe fn read_from(address: *const u8, offset: usize) -> Self {
        BufferView {
            bytes: unsafe { access::get::<W>(address, offset) },
        }
    }

    /// Stores the whole view at `address + offset`.
    ///
    /// # Safety
    ///
    /// `address` must be non-null and `W` bytes at `address + offset` must be writable.
    #[inline]
    pub unsafe fn write_to(&self, address: *mut u8, offset: usize) {
        unsafe { access::set::<W>(address, offset, &self.bytes) }
    }

    /// Stores the first `count` bytes of the view at `address + offset`.
    ///
    /// # Safety
    ///
    /// `count` bytes at `address + offset` must be writable.
    ///
    /// # Panics
    ///
    /// Panics if `count > W`.
    #[inline]
    pub unsafe fn write_partial_to(&self, address: *mut u8, offset: usize, count: usize) {
        unsafe { access::set_partial::<W>(address, offset, count, &self.bytes) }
    }
}

impl<const W: usize> Default for BufferView<W>
where
    Width<W>: SupportedWidth,
{
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const W: usize> std::ops::Index<usize> for BufferView<W> {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.bytes[index]
    }
}

impl<const W: usize> std::ops::IndexMut<usize> for BufferView<W> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.bytes[index]
    }
}

impl<const W: usize> AsRef<[u8]> for BufferView<W> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const W: usize> AsMut<[u8]> for BufferView<W> {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl<const W: usize> std::fmt::Debug for BufferView<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if W <= 8 {
            f.debug_tuple("BufferView").field(&self.bytes).finish()
        } else {
            f.debug_struct("BufferView").field("width", &W).finish()
        }
    }
}

macro_rules! reinterpret {
    ($w:literal: $($ty:ty => $get:ident, $set:ident, $from:ident;)*) => {
        impl BufferView<$w> {
            $(
                #[inline]
                pub fn $get(&self) -> $ty {
                    bytemuck::cast(self.bytes)
                }

                #[inline]
                pub fn $set(&mut self, value: $ty) {
                    self.bytes = bytemuck::cast(value);
                }

                #[inline]
                pub fn $from(value: $ty) -> Self {
                    BufferView { bytes: bytemuck::cast(value) }
                }
            )*
        }
    };
}

reinterpret!(1:
    u8 => as_u8, set_u8, from_u8;
    i8 => as_i8, set_i8, from_i8;
);

reinterpret!(2:
    u16 => as_u16, set_u16, from_u16;
    i16 => as_i16, set_i16, from_i16;
);

reinterpret!(4:
    u32 => as_u32, set_u32, from_u32;
    i32 => as_i32, set_i32, from_i32;
    f32 => as_f32, set_f32, from_f32;
);

reinterpret!(8:
    u64 => as_u64, set_u64, from_u64;
    i64 => as_i64, set_i64, from_i64;
    f64 => as_f64, set_f64, from_f64;
);

impl BufferView<2> {
    #[inline]
    pub fn as_f16(&self) -> f16 {
        f16::from_bits(self.as_u16())
    }

    #[inline]
    pub fn set_f16(&mut self, value: f16) {
        self.set_u16(value.to_bits());
    }

    #[inline]
    pub fn from_f16(value: f16) -> Self {
        Self::from_u16(value.to_bits())
    }

    /// The bytes as a single UTF-16 code unit (possibly half of a surrogate pair).
    #[inline]
    pub fn as_utf16_unit(&self) -> u16 {
        self.as_u16()
    }

    /// The bytes as a character, if they hold a code unit outside the surrogate range.
    #[inline]
    pub fn as_char(&self) -> Option<char> {
        char::decode_utf16([self.as_u16()]).next()?.ok()
    }

    #[inline]
    pub fn set_utf16_unit(&mut self, unit: u16) {
        self.set_u16(unit);
    }
}
