//! `NativeMemoryStream`: a seekable, mode-aware, buffered cursor over a `NativeArray`.
//!
//! Reads and writes are staged in a *window*: a buffer view loaded from the backing
//! region at the current position. The window width is the largest supported width
//! that fits in the remaining bytes, so a window never extends past the end of the
//! region. A write window is pushed back to native memory when the cursor leaves it,
//! on [`NativeMemoryStream::flush`], when a read-write stream switches from writing
//! to reading, and on close.
//!
//! Invariant: while a window is active, `window.start <= position < window.start +
//! window.len()`.

use std::sync::Arc;

use nmem_buffers::{AnyBufferView, BufferView, SupportedWidth, Width, widths};
use nmem_common::{Error, Result, verify_arg, verify_range};
use nmem_tracker::MemoryContext;

use crate::array::NativeArray;

/// Access mode of a stream, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Read,
    Write,
    ReadWrite,
}

impl StreamMode {
    pub fn can_read(&self) -> bool {
        matches!(self, StreamMode::Read | StreamMode::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, StreamMode::Write | StreamMode::ReadWrite)
    }
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Reference point of [`NativeMemoryStream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Begin,
    Current,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Read,
    Write,
}

struct Window {
    start: usize,
    view: AnyBufferView,
    operation: Operation,
    /// Number of leading window bytes that must be pushed back on flush.
    dirty: usize,
}

impl Window {
    #[inline]
    fn end(&self) -> usize {
        self.start + self.view.len()
    }

    #[inline]
    fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.end()
    }
}

enum Backing<'a> {
    Owned(NativeArray),
    Borrowed(&'a mut NativeArray),
    Shared(&'a NativeArray),
}

impl Backing<'_> {
    fn array(&self) -> &NativeArray {
        match self {
            Backing::Owned(array) => array,
            Backing::Borrowed(array) => array,
            Backing::Shared(array) => array,
        }
    }
}

/// A buffered cursor over one [`NativeArray`].
///
/// The stream either owns its array (created for it, disposed on close) or borrows
/// one supplied by the caller (left alone on close). Closing is idempotent, and
/// dropping an open stream closes it.
pub struct NativeMemoryStream<'a> {
    /// `None` once the stream is closed.
    backing: Option<Backing<'a>>,
    len: usize,
    mode: StreamMode,
    position: usize,
    last_operation: Option<Operation>,
    window: Option<Window>,
}

impl<'a> NativeMemoryStream<'a> {
    /// Creates a stream over a caller-supplied array; the array is not disposed when
    /// the stream closes.
    pub fn new(array: &'a mut NativeArray, mode: StreamMode) -> Result<NativeMemoryStream<'a>> {
        array.as_ptr()?;
        let len = array.len();
        Ok(NativeMemoryStream::with_backing(
            Backing::Borrowed(array),
            len,
            mode,
        ))
    }

    /// Creates a read-only stream over a shared array.
    pub fn reader(array: &'a NativeArray) -> Result<NativeMemoryStream<'a>> {
        array.as_ptr()?;
        let len = array.len();
        Ok(NativeMemoryStream::with_backing(
            Backing::Shared(array),
            len,
            StreamMode::Read,
        ))
    }

    fn with_backing(backing: Backing<'a>, len: usize, mode: StreamMode) -> NativeMemoryStream<'a> {
        NativeMemoryStream {
            backing: Some(backing),
            len,
            mode,
            position: 0,
            last_operation: None,
            window: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes between the position and the end of the region.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.backing.is_none()
    }

    /// `true` if the stream disposes its array on close.
    pub fn owns_array(&self) -> bool {
        matches!(self.backing, Some(Backing::Owned(_)))
    }

    /// Moves the cursor to `position`, which must lie in `0..=len`.
    ///
    /// Leaving the active window flushes it; a window for the last operation is then
    /// primed at the new position.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        self.check_open()?;
        verify_range!(position, 0, self.len);
        if self.window.as_ref().is_some_and(|w| w.contains(position)) {
            self.position = position;
            return Ok(());
        }
        self.retire_window()?;
        self.position = position;
        if let Some(operation) = self.last_operation {
            if position < self.len {
                self.prime_window(operation)?;
            }
        }
        Ok(())
    }

    /// Moves the cursor by `offset` relative to `origin` and returns the new position.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<usize> {
        self.check_open()?;
        if offset == 0 && origin == SeekOrigin::Current {
            return Ok(self.position);
        }
        let base = match origin {
            SeekOrigin::Begin => 0,
            SeekOrigin::Current => self.position,
            SeekOrigin::End => self.len,
        };
        let target = if offset >= 0 {
            base.checked_add(offset as usize)
        } else {
            base.checked_sub(offset.unsigned_abs() as usize)
        };
        let Some(target) = target else {
            return Err(if offset < 0 {
                Error::invalid_arg("offset", "seek before the beginning of the stream")
            } else {
                Error::overflow(base, offset as usize, self.len)
            });
        };
        self.set_position(target)?;
        Ok(target)
    }

    /// Fills `dst` from the current position.
    ///
    /// Fails with `Overflow` (reading nothing) if fewer than `dst.len()` bytes remain.
    pub fn read_slice(&mut self, dst: &mut [u8]) -> Result<()> {
        self.begin(Operation::Read)?;
        verify_range!(self.position, dst.len(), self.len);
        let mut done = 0;
        while done < dst.len() {
            let position = self.position;
            let window = self.window_for(Operation::Read)?;
            let at = position - window.start;
            let n = (window.view.len() - at).min(dst.len() - done);
            dst[done..done + n].copy_from_slice(&window.view.as_slice()[at..at + n]);
            done += n;
            self.advance(n)?;
        }
        Ok(())
    }

    /// Writes `src` at the current position.
    ///
    /// Fails with `Overflow` (writing nothing) if fewer than `src.len()` bytes remain.
    pub fn write_slice(&mut self, src: &[u8]) -> Result<()> {
        self.begin(Operation::Write)?;
        verify_range!(self.position, src.len(), self.len);
        let mut done = 0;
        while done < src.len() {
            let position = self.position;
            let window = self.window_for(Operation::Write)?;
            let at = position - window.start;
            let n = (window.view.len() - at).min(src.len() - done);
            window.view.as_mut_slice()[at..at + n].copy_from_slice(&src[done..done + n]);
            window.dirty = window.dirty.max(at + n);
            done += n;
            self.advance(n)?;
        }
        Ok(())
    }

    /// Reads `count` bytes into `buffer[offset..offset + count]`.
    pub fn read_bytes(&mut self, buffer: &mut [u8], offset: usize, count: usize) -> Result<usize> {
        verify_arg!(
            offset,
            offset.checked_add(count).is_some_and(|end| end <= buffer.len())
        );
        self.read_slice(&mut buffer[offset..offset + count])?;
        Ok(count)
    }

    /// Writes `buffer[offset..offset + count]`.
    pub fn write_bytes(&mut self, buffer: &[u8], offset: usize, count: usize) -> Result<usize> {
        verify_arg!(
            offset,
            offset.checked_add(count).is_some_and(|end| end <= buffer.len())
        );
        self.write_slice(&buffer[offset..offset + count])?;
        Ok(count)
    }

    /// Reads the next `W` bytes as a buffer view.
    pub fn read_view<const W: usize>(&mut self) -> Result<BufferView<W>>
    where
        Width<W>: SupportedWidth,
    {
        let mut view = BufferView::<W>::zeroed();
        self.read_slice(view.as_bytes_mut())?;
        Ok(view)
    }

    /// Writes a `W`-byte buffer view.
    pub fn write_view<const W: usize>(&mut self, view: &BufferView<W>) -> Result<()>
    where
        Width<W>: SupportedWidth,
    {
        self.write_slice(view.as_bytes())
    }

    /// Pushes pending writes to native memory and clears the window.
    ///
    /// Write streams always push; read-write streams push only if the last
    /// operation was a write; read streams never push.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        let push = match self.mode {
            StreamMode::Write => true,
            StreamMode::ReadWrite => self.last_operation == Some(Operation::Write),
            StreamMode::Read => false,
        };
        if let Some(window) = self.window.take() {
            if push {
                self.push(&window)?;
            }
        }
        Ok(())
    }

    /// Flushes, then disposes the backing array if the stream owns it.
    ///
    /// Idempotent. The stream is closed even if the final flush fails.
    pub fn close(&mut self) -> Result<()> {
        if self.backing.is_none() {
            return Ok(());
        }
        let flushed = self.flush();
        self.window = None;
        if let Some(Backing::Owned(mut array)) = self.backing.take() {
            array.dispose();
        }
        flushed
    }

    /// Flushes and closes the stream, handing back the array it owns (if any)
    /// instead of disposing it.
    pub fn into_array(mut self) -> Result<Option<NativeArray>> {
        self.flush()?;
        match self.backing.take() {
            Some(Backing::Owned(array)) => Ok(Some(array)),
            _ => Ok(None),
        }
    }

    fn check_open(&self) -> Result<&NativeArray> {
        match &self.backing {
            Some(backing) => Ok(backing.array()),
            None => Err(Error::disposed("native memory stream")),
        }
    }

    fn ptr(&self) -> Result<*mut u8> {
        self.check_open()?.as_ptr()
    }

    /// Validates the mode for `operation` and retires a window staged for the other
    /// operation.
    fn begin(&mut self, operation: Operation) -> Result<()> {
        self.check_open()?;
        let allowed = match operation {
            Operation::Read => self.mode.can_read(),
            Operation::Write => self.mode.can_write(),
        };
        if !allowed {
            let name = match operation {
                Operation::Read => "read",
                Operation::Write => "write",
            };
            return Err(Error::unsupported(name, self.mode.to_string()));
        }
        if self
            .window
            .as_ref()
            .is_some_and(|w| w.operation != operation)
        {
            self.retire_window()?;
        }
        self.last_operation = Some(operation);
        Ok(())
    }

    /// The active window for `operation`, priming one at the position if needed.
    ///
    /// Callers guarantee `position < len`.
    fn window_for(&mut self, operation: Operation) -> Result<&mut Window> {
        if self.window.is_none() {
            self.prime_window(operation)?;
        }
        let (position, len) = (self.position, self.len);
        self.window
            .as_mut()
            .ok_or_else(|| Error::overflow(position, 1, len))
    }

    fn prime_window(&mut self, operation: Operation) -> Result<()> {
        debug_assert!(self.window.is_none());
        let Some(width) = widths::window_width(self.remaining()) else {
            return Ok(());
        };
        let ptr = self.ptr()?;
        // The width never exceeds the remaining bytes, so the window is in bounds.
        let view = unsafe { AnyBufferView::read_from(ptr, self.position, width)? };
        log::trace!(
            "stream: primed {width}-byte {operation:?} window at {}",
            self.position
        );
        self.window = Some(Window {
            start: self.position,
            view,
            operation,
            dirty: 0,
        });
        Ok(())
    }

    /// Moves the cursor forward within the active window, retiring the window when
    /// the cursor reaches its end.
    fn advance(&mut self, n: usize) -> Result<()> {
        self.position += n;
        if self
            .window
            .as_ref()
            .is_some_and(|w| self.position >= w.end())
        {
            self.retire_window()?;
        }
        Ok(())
    }

    /// Drops the active window, pushing it first if it holds writes.
    fn retire_window(&mut self) -> Result<()> {
        if let Some(window) = self.window.take() {
            if window.operation == Operation::Write {
                self.push(&window)?;
            }
        }
        Ok(())
    }

    fn push(&self, window: &Window) -> Result<()> {
        if window.dirty == 0 {
            return Ok(());
        }
        let ptr = self.ptr()?;
        unsafe {
            if window.dirty == window.view.len() {
                window.view.write_to(ptr, window.start);
            } else {
                window.view.write_partial_to(ptr, window.start, window.dirty);
            }
        }
        log::trace!(
            "stream: pushed {} bytes at {}",
            window.dirty,
            window.start
        );
        Ok(())
    }
}

impl NativeMemoryStream<'static> {
    /// Creates a stream over a new array of `len` bytes in the global memory context.
    /// The stream owns the array and disposes it on close.
    ///
    /// Fails with `UnsupportedOperation` for [`StreamMode::Read`]: a fresh array has
    /// nothing to read.
    pub fn with_capacity(len: usize, mode: StreamMode) -> Result<NativeMemoryStream<'static>> {
        NativeMemoryStream::with_capacity_in(&MemoryContext::global(), len, mode)
    }

    pub fn with_capacity_in(
        context: &Arc<MemoryContext>,
        len: usize,
        mode: StreamMode,
    ) -> Result<NativeMemoryStream<'static>> {
        if mode == StreamMode::Read {
            return Err(Error::unsupported("creating a stream over a new array", "Read"));
        }
        let array = NativeArray::new_in(context, len)?;
        array.as_ptr()?;
        Ok(NativeMemoryStream::with_backing(
            Backing::Owned(array),
            len,
            mode,
        ))
    }

    /// Creates a stream that takes ownership of `array`.
    pub fn from_array(array: NativeArray, mode: StreamMode) -> Result<NativeMemoryStream<'static>> {
        array.as_ptr()?;
        let len = array.len();
        Ok(NativeMemoryStream::with_backing(
            Backing::Owned(array),
            len,
            mode,
        ))
    }
}

macro_rules! typed_stream_ops {
    ($($ty:ty: $w:literal => $read:ident, $write:ident, $view_get:ident, $view_from:ident;)*) => {
        impl NativeMemoryStream<'_> {
            $(
                #[doc = concat!("Reads a `", stringify!($ty), "` and advances the position.")]
                #[inline]
                pub fn $read(&mut self) -> Result<$ty> {
                    Ok(self.read_view::<$w>()?.$view_get())
                }

                #[doc = concat!("Writes a `", stringify!($ty), "` and advances the position.")]
                #[inline]
                pub fn $write(&mut self, value: $ty) -> Result<()> {
                    self.write_view(&BufferView::<$w>::$view_from(value))
                }
            )*
        }
    };
}

typed_stream_ops! {
    u8: 1 => read_u8, write_u8, as_u8, from_u8;
    i8: 1 => read_i8, write_i8, as_i8, from_i8;
    u16: 2 => read_u16, write_u16, as_u16, from_u16;
    i16: 2 => read_i16, write_i16, as_i16, from_i16;
    half::f16: 2 => read_f16, write_f16, as_f16, from_f16;
    u32: 4 => read_u32, write_u32, as_u32, from_u32;
    i32: 4 => read_i32, write_i32, as_i32, from_i32;
    f32: 4 => read_f32, write_f32, as_f32, from_f32;
    u64: 8 => read_u64, write_u64, as_u64, from_u64;
    i64: 8 => read_i64, write_i64, as_i64, from_i64;
    f64: 8 => read_f64, write_f64, as_f64, from_f64;
}

impl Drop for NativeMemoryStream<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("native memory stream: error while closing on drop: {e}");
        }
    }
}

impl std::fmt::Debug for NativeMemoryStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMemoryStream")
            .field("len", &self.len)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl std::io::Read for NativeMemoryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.remaining());
        self.read_slice(&mut buf[..n])?;
        Ok(n)
    }
}

impl std::io::Write for NativeMemoryStream<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.remaining());
        self.write_slice(&buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        NativeMemoryStream::flush(self)?;
        Ok(())
    }
}

impl std::io::Seek for NativeMemoryStream<'_> {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        let (offset, origin) = match pos {
            std::io::SeekFrom::Start(offset) => {
                let offset = i64::try_from(offset).map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek offset too large")
                })?;
                (offset, SeekOrigin::Begin)
            }
            std::io::SeekFrom::Current(offset) => (offset, SeekOrigin::Current),
            std::io::SeekFrom::End(offset) => (offset, SeekOrigin::End),
        };
        let position = NativeMemoryStream::seek(self, offset, origin)?;
        Ok(position as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};

    use nmem_testkit::{CountingRuntime, data_gen};

    use super::*;

    fn context() -> Arc<MemoryContext> {
        CountingRuntime::context().1
    }

    #[test]
    fn test_write_then_read_across_windows() {
        let ctx = context();
        for len in [1, 7, 31, 33, 100, 511, 512, 513, 600, 1500] {
            let data = data_gen::random_bytes(len as u64, len);
            let mut array = NativeArray::new_in(&ctx, len).unwrap();
            {
                let mut stream = NativeMemoryStream::new(&mut array, StreamMode::Write).unwrap();
                stream.write_slice(&data).unwrap();
                assert_eq!(stream.position(), len);
                stream.close().unwrap();
            }
            assert_eq!(array.to_vec().unwrap(), data);

            let mut stream = NativeMemoryStream::reader(&array).unwrap();
            let mut out = vec![0u8; len];
            stream.read_slice(&mut out).unwrap();
            assert_eq!(out, data);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let ctx = context();
        let data = data_gen::non_zero_sequence(300);
        let mut array = NativeArray::new_in(&ctx, 300).unwrap();
        let mut stream = NativeMemoryStream::new(&mut array, StreamMode::ReadWrite).unwrap();
        for &b in &data {
            stream.write_u8(b).unwrap();
        }
        stream.set_position(0).unwrap();
        for &b in &data {
            assert_eq!(stream.read_u8().unwrap(), b);
        }
        drop(stream);
        assert_eq!(array.to_vec().unwrap(), data);
    }

    #[test]
    fn test_writes_invisible_until_flush() {
        let ctx = context();
        let mut array = NativeArray::new_in(&ctx, 64).unwrap();
        let ptr = array.as_ptr().unwrap();
        let mut stream = NativeMemoryStream::new(&mut array, StreamMode::Write).unwrap();
        stream.write_slice(&[1, 2, 3]).unwrap();
        assert_eq!(unsafe { *ptr }, 0);
        stream.flush().unwrap();
        assert_eq!(unsafe { std::slice::from_raw_parts(ptr, 4) }, &[1, 2, 3, 0]);
    }

    #[test]
    fn test_partial_window_preserves_existing_bytes() {
        let ctx = context();
        let mut array = NativeArray::from_bytes_in(&ctx, &[9u8; 40]).unwrap();
        {
            let mut stream = NativeMemoryStream::new(&mut array, StreamMode::Write).unwrap();
            stream.set_position(5).unwrap();
            stream.write_slice(&[1, 2]).unwrap();
        }
        let mut expected = vec![9u8; 40];
        expected[5] = 1;
        expected[6] = 2;
        assert_eq!(array.to_vec().unwrap(), expected);
    }

    #[test]
    fn test_mode_enforcement() {
        let ctx = context();
        let mut array = NativeArray::new_in(&ctx, 8).unwrap();
        {
            let mut writer = NativeMemoryStream::new(&mut array, StreamMode::Write).unwrap();
            assert!(writer.read_u8().unwrap_err().is_unsupported());
            assert!(writer.write_u8(1).is_ok());
        }
        let mut reader = NativeMemoryStream::new(&mut array, StreamMode::Read).unwrap();
        assert!(reader.write_u8(1).unwrap_err().is_unsupported());
        assert_eq!(reader.read_u8().unwrap(), 1);
    }

    #[test]
    fn test_fresh_read_stream_rejected() {
        let ctx = context();
        let err = NativeMemoryStream::with_capacity_in(&ctx, 16, StreamMode::Read).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_overflow_is_all_or_nothing() {
        let ctx = context();
        let mut stream =
            NativeMemoryStream::with_capacity_in(&ctx, 10, StreamMode::ReadWrite).unwrap();
        stream.write_slice(&[7; 8]).unwrap();
        assert!(stream.write_u32(1).unwrap_err().is_overflow());
        assert_eq!(stream.position(), 8);
        stream.write_u16(0x0101).unwrap();
        assert_eq!(stream.position(), 10);
        assert!(stream.write_u8(0).unwrap_err().is_overflow());
        assert!(stream.read_u8().unwrap_err().is_overflow());
        stream.set_position(4).unwrap();
        let mut buf = [0u8; 7];
        assert!(stream.read_slice(&mut buf).unwrap_err().is_overflow());
        assert_eq!(stream.position(), 4);
        let mut buf = [0u8; 6];
        stream.read_slice(&mut buf).unwrap();
        assert_eq!(buf, [7, 7, 7, 7, 1, 1]);
    }

    #[test]
    fn test_position_bounds() {
        let ctx = context();
        let mut stream = NativeMemoryStream::with_capacity_in(&ctx, 10, StreamMode::Write).unwrap();
        assert!(stream.set_position(10).is_ok());
        assert!(stream.set_position(11).unwrap_err().is_overflow());
        assert!(stream.set_position(0).is_ok());
    }

    #[test]
    fn test_seek() {
        let ctx = context();
        let mut stream =
            NativeMemoryStream::with_capacity_in(&ctx, 100, StreamMode::ReadWrite).unwrap();
        assert_eq!(stream.seek(10, SeekOrigin::Begin).unwrap(), 10);
        assert_eq!(stream.seek(5, SeekOrigin::Current).unwrap(), 15);
        assert_eq!(stream.seek(0, SeekOrigin::Current).unwrap(), 15);
        assert_eq!(stream.seek(-20, SeekOrigin::End).unwrap(), 80);
        assert_eq!(stream.seek(0, SeekOrigin::End).unwrap(), 100);
        assert!(stream.seek(1, SeekOrigin::End).unwrap_err().is_overflow());
        assert!(stream.seek(-1, SeekOrigin::Begin).is_err());
        assert!(stream.seek(i64::MIN, SeekOrigin::Current).is_err());
        assert_eq!(stream.position(), 100);
    }

    #[test]
    fn test_read_write_switching() {
        let ctx = context();
        let mut array = NativeArray::new_in(&ctx, 64).unwrap();
        let mut stream = NativeMemoryStream::new(&mut array, StreamMode::ReadWrite).unwrap();
        stream.write_u32(0xA1B2C3D4).unwrap();
        // Reading right after a write flushes it first.
        stream.set_position(0).unwrap();
        assert_eq!(stream.read_u32().unwrap(), 0xA1B2C3D4);
        // Overwrite in the middle of data that was just read.
        stream.set_position(2).unwrap();
        stream.write_u8(0xEE).unwrap();
        stream.set_position(0).unwrap();
        assert_eq!(stream.read_u32().unwrap().to_ne_bytes()[2], 0xEE);
        drop(stream);
        assert_eq!(array.get_u8(2).unwrap(), 0xEE);
    }

    #[test]
    fn test_seek_within_write_window() {
        let ctx = context();
        let mut array = NativeArray::new_in(&ctx, 600).unwrap();
        {
            let mut stream = NativeMemoryStream::new(&mut array, StreamMode::Write).unwrap();
            stream.write_slice(&[1; 100]).unwrap();
            stream.set_position(50).unwrap();
            stream.write_slice(&[2; 10]).unwrap();
            stream.set_position(550).unwrap();
            stream.write_slice(&[3; 50]).unwrap();
            stream.close().unwrap();
        }
        let bytes = array.to_vec().unwrap();
        assert!(bytes[..50].iter().all(|&b| b == 1));
        assert!(bytes[50..60].iter().all(|&b| b == 2));
        assert!(bytes[60..100].iter().all(|&b| b == 1));
        assert!(bytes[100..550].iter().all(|&b| b == 0));
        assert!(bytes[550..].iter().all(|&b| b == 3));
    }

    #[test]
    fn test_close_is_idempotent_and_owning() {
        let (runtime, ctx) = CountingRuntime::context();
        let mut stream = NativeMemoryStream::with_capacity_in(&ctx, 32, StreamMode::Write).unwrap();
        assert!(stream.owns_array());
        stream.write_u64(5).unwrap();
        stream.close().unwrap();
        stream.close().unwrap();
        assert!(stream.is_closed());
        assert!(stream.write_u8(1).unwrap_err().is_disposed());
        assert!(stream.flush().unwrap_err().is_disposed());
        assert!(stream.set_position(0).unwrap_err().is_disposed());
        drop(stream);
        assert_eq!(runtime.total_frees(), 1);
        assert_eq!(ctx.tracked().allocated_bytes(), 0);
    }

    #[test]
    fn test_borrowed_array_survives_close() {
        let (runtime, ctx) = CountingRuntime::context();
        let mut array = NativeArray::new_in(&ctx, 16).unwrap();
        let mut stream = NativeMemoryStream::new(&mut array, StreamMode::Write).unwrap();
        assert!(!stream.owns_array());
        stream.write_i16(-3).unwrap();
        stream.close().unwrap();
        drop(stream);
        assert_eq!(runtime.total_frees(), 0);
        assert_eq!(array.get_i16(0).unwrap(), -3);
    }

    #[test]
    fn test_into_array_reopen_for_read() {
        let ctx = context();
        let mut stream = NativeMemoryStream::with_capacity_in(&ctx, 12, StreamMode::Write).unwrap();
        stream.write_f64(2.5).unwrap();
        stream.write_f32(-1.0).unwrap();
        let array = stream.into_array().unwrap().unwrap();
        let mut reader = NativeMemoryStream::from_array(array, StreamMode::Read).unwrap();
        assert_eq!(reader.read_f64().unwrap(), 2.5);
        assert_eq!(reader.read_f32().unwrap(), -1.0);
    }

    #[test]
    fn test_disposed_array_rejected() {
        let ctx = context();
        let mut array = NativeArray::new_in(&ctx, 4).unwrap();
        array.dispose();
        assert!(NativeMemoryStream::new(&mut array, StreamMode::Read).unwrap_err().is_disposed());
        let empty = NativeArray::new_in(&ctx, 0).unwrap();
        assert!(NativeMemoryStream::reader(&empty).unwrap_err().is_disposed());
    }

    #[test]
    fn test_null_backing_pointer() {
        let ctx = context();
        let mut array = unsafe {
            NativeArray::from_raw_parts_in(
                &ctx,
                std::ptr::null_mut(),
                8,
                nmem_native::AllocationOrigin::Raw,
                false,
            )
        };
        let err = NativeMemoryStream::new(&mut array, StreamMode::Read).unwrap_err();
        assert!(matches!(err.kind(), nmem_common::ErrorKind::NullPointer { .. }));
    }

    #[test]
    fn test_read_write_bytes_with_offset() {
        let ctx = context();
        let mut stream =
            NativeMemoryStream::with_capacity_in(&ctx, 8, StreamMode::ReadWrite).unwrap();
        let src = [0, 0, 5, 6, 7, 0];
        assert_eq!(stream.write_bytes(&src, 2, 3).unwrap(), 3);
        assert!(stream.write_bytes(&src, 4, 3).is_err());
        stream.set_position(0).unwrap();
        let mut dst = [0u8; 5];
        assert_eq!(stream.read_bytes(&mut dst, 1, 3).unwrap(), 3);
        assert_eq!(dst, [0, 5, 6, 7, 0]);
    }

    #[test]
    fn test_wide_views() {
        let ctx = context();
        let mut stream =
            NativeMemoryStream::with_capacity_in(&ctx, 1000, StreamMode::ReadWrite).unwrap();
        let mut wide = BufferView::<256>::zeroed();
        wide.as_bytes_mut().copy_from_slice(&data_gen::random_bytes(9, 256));
        stream.write_u8(0xFF).unwrap();
        stream.write_view(&wide).unwrap();
        stream.set_position(1).unwrap();
        assert_eq!(stream.read_view::<256>().unwrap(), wide);
        assert_eq!(stream.position(), 257);
    }

    #[test]
    fn test_std_io_traits() {
        let ctx = context();
        let mut array = NativeArray::new_in(&ctx, 20).unwrap();
        {
            let mut stream = NativeMemoryStream::new(&mut array, StreamMode::ReadWrite).unwrap();
            stream.write_all(b"hello, native memory").unwrap();
            assert_eq!(stream.write(b"!").unwrap(), 0);
            Write::flush(&mut stream).unwrap();
            Seek::seek(&mut stream, SeekFrom::Start(7)).unwrap();
            let mut word = String::new();
            stream.read_to_string(&mut word).unwrap();
            assert_eq!(word, "native memory");
            Seek::seek(&mut stream, SeekFrom::End(-6)).unwrap();
            let mut buf = [0u8; 100];
            assert_eq!(stream.read(&mut buf).unwrap(), 6);
            assert_eq!(&buf[..6], b"memory");
            assert_eq!(stream.read(&mut buf).unwrap(), 0);
        }
        assert_eq!(array.to_vec().unwrap(), b"hello, native memory");
    }
}
