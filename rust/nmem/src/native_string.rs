//! Null-terminated text in native memory.
//!
//! Native strings carry a symbol width: 1 (ASCII), 2 (UTF-16) or 4 (UTF-32), each
//! symbol in native byte order, terminated by one all-zero symbol. Decoding never
//! fails hard: an unsupported width or a null address is logged and yields `None`,
//! and undecodable symbols become U+FFFD.

use std::sync::Arc;

use nmem_common::{Error, Result};
use nmem_native::{AllocationOrigin, access};
use nmem_tracker::MemoryContext;

use crate::{array::NativeArray, block::MemoryBlock};

/// Byte width of one symbol of a native string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SymbolWidth {
    Ascii = 1,
    Utf16 = 2,
    Utf32 = 4,
}

impl SymbolWidth {
    #[inline]
    pub fn bytes(&self) -> usize {
        *self as usize
    }
}

impl TryFrom<usize> for SymbolWidth {
    type Error = Error;

    fn try_from(width: usize) -> Result<SymbolWidth> {
        match width {
            1 => Ok(SymbolWidth::Ascii),
            2 => Ok(SymbolWidth::Utf16),
            4 => Ok(SymbolWidth::Utf32),
            _ => Err(Error::invalid_arg(
                "symbol_width",
                format!("{width} is not one of 1, 2, 4"),
            )),
        }
    }
}

fn decode(bytes: &[u8], width: SymbolWidth) -> String {
    match width {
        SymbolWidth::Ascii => bytes
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
            .collect(),
        SymbolWidth::Utf16 => {
            let units = bytes
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]));
            char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        SymbolWidth::Utf32 => bytes
            .chunks_exact(4)
            .map(|c| {
                char::from_u32(u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .unwrap_or(char::REPLACEMENT_CHARACTER)
            })
            .collect(),
    }
}

fn symbol_width_or_warn(width: usize) -> Option<SymbolWidth> {
    match SymbolWidth::try_from(width) {
        Ok(width) => Some(width),
        Err(_) => {
            log::warn!("native string: unsupported symbol width {width}, substituting no text");
            None
        }
    }
}

/// Decodes `length` symbols of `symbol_width` bytes each starting at `address`.
///
/// Returns `None` (after logging a warning) for an unsupported width or a null
/// address.
///
/// # Safety
///
/// Unless `address` is null, `length * symbol_width` bytes at `address` must be
/// readable.
pub unsafe fn from_wide(address: *const u8, length: usize, symbol_width: usize) -> Option<String> {
    let width = symbol_width_or_warn(symbol_width)?;
    if length == 0 {
        return Some(String::new());
    }
    if address.is_null() {
        log::warn!("native string: null address for {length} symbols");
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(address, length * width.bytes()) };
    Some(decode(bytes, width))
}

/// Number of symbols before the terminator.
///
/// # Safety
///
/// `address` must be non-null and point to a terminated string of `width`.
unsafe fn terminated_len(address: *const u8, width: SymbolWidth) -> usize {
    let w = width.bytes();
    let mut len = 0;
    loop {
        let zero = unsafe {
            match width {
                SymbolWidth::Ascii => access::get::<1>(address, len * w) == [0; 1],
                SymbolWidth::Utf16 => access::get::<2>(address, len * w) == [0; 2],
                SymbolWidth::Utf32 => access::get::<4>(address, len * w) == [0; 4],
            }
        };
        if zero {
            return len;
        }
        len += 1;
    }
}

/// Decodes a null-terminated string of `symbol_width` starting at `address`.
///
/// # Safety
///
/// Unless `address` is null, it must point to readable memory containing a
/// terminator symbol.
pub unsafe fn from_terminated(address: *const u8, symbol_width: usize) -> Option<String> {
    let width = symbol_width_or_warn(symbol_width)?;
    if address.is_null() {
        log::warn!("native string: null address");
        return None;
    }
    let length = unsafe { terminated_len(address, width) };
    unsafe { from_wide(address, length, symbol_width) }
}

fn encode_utf16(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_ne_bytes)
        .collect()
}

/// Encodes `text` as UTF-16 followed by a 2-byte terminator into a new owned array
/// from the global context.
pub fn to_wide(text: &str) -> Result<NativeArray> {
    to_wide_in(&MemoryContext::global(), text)
}

pub fn to_wide_in(context: &Arc<MemoryContext>, text: &str) -> Result<NativeArray> {
    NativeArray::from_bytes_in(context, &encode_utf16(text))
}

/// A null-terminated native string tagged with the heap it came from.
///
/// A managing `NtString` releases its memory through the release path of its origin
/// when disposed or dropped; a non-managing one never does.
#[derive(Debug)]
pub struct NtString {
    block: MemoryBlock,
    symbol_width: SymbolWidth,
}

impl NtString {
    /// Allocates a managing UTF-16 string from the heap matching `origin` in the
    /// global context.
    pub fn new(text: &str, origin: AllocationOrigin) -> Result<NtString> {
        NtString::new_in(&MemoryContext::global(), text, origin)
    }

    pub fn new_in(
        context: &Arc<MemoryContext>,
        text: &str,
        origin: AllocationOrigin,
    ) -> Result<NtString> {
        let bytes = encode_utf16(text);
        let block = MemoryBlock::allocate(context, origin, bytes.len())?;
        unsafe { access::copy_in(block.as_ptr()?, 0, &bytes) };
        Ok(NtString {
            block,
            symbol_width: SymbolWidth::Utf16,
        })
    }

    /// Wraps a foreign null-terminated string. The terminator is located by scanning.
    ///
    /// # Safety
    ///
    /// Unless `ptr` is null, it must point to a terminated string of `symbol_width`
    /// that stays valid for the lifetime of the result. If `managing` is set, `ptr`
    /// must be a live address of the heap named by `origin` in `context`, and nothing
    /// else may release it.
    pub unsafe fn from_raw(
        context: &Arc<MemoryContext>,
        ptr: *mut u8,
        symbol_width: SymbolWidth,
        origin: AllocationOrigin,
        managing: bool,
    ) -> NtString {
        let len = if ptr.is_null() {
            0
        } else {
            (unsafe { terminated_len(ptr, symbol_width) } + 1) * symbol_width.bytes()
        };
        let block = unsafe { MemoryBlock::from_raw_parts(context, ptr, len, origin, managing) };
        NtString {
            block,
            symbol_width,
        }
    }

    pub fn symbol_width(&self) -> SymbolWidth {
        self.symbol_width
    }

    pub fn origin(&self) -> AllocationOrigin {
        self.block.origin()
    }

    /// `true` if this string releases its memory.
    pub fn is_managing(&self) -> bool {
        self.block.owns()
    }

    pub fn is_disposed(&self) -> bool {
        self.block.is_disposed()
    }

    /// Number of symbols, excluding the terminator.
    pub fn len(&self) -> usize {
        (self.block.len() / self.symbol_width.bytes()).saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ptr(&self) -> Result<*mut u8> {
        self.block.as_ptr()
    }

    /// Decodes the string, replacing undecodable symbols with U+FFFD.
    pub fn to_string_lossy(&self) -> Result<String> {
        let ptr = self.block.as_ptr()?;
        let bytes = unsafe {
            std::slice::from_raw_parts(ptr, self.len() * self.symbol_width.bytes())
        };
        Ok(decode(bytes, self.symbol_width))
    }

    /// Releases the string through its origin's release path if managing.
    /// Idempotent; returns `true` if a native free was issued.
    pub fn dispose(&mut self) -> bool {
        self.block.release()
    }
}
