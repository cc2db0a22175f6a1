//! Transfer agents: codecs between a [`NativeMemoryStream`] and typed collections.
//!
//! An agent chooses the physical layout of its elements. Whatever layout it picks,
//! writing a collection and reading it back through the same agent over the same
//! bytes must reproduce identical values.

use std::marker::PhantomData;

use bytemuck::Pod;
use nmem_common::{Error, Result, verify_arg, verify_range};

use crate::stream::NativeMemoryStream;

/// Where decoded objects land in the target collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPlacement {
    /// Push after the existing elements.
    #[default]
    Append,
    /// Overwrite starting at the given index, growing the collection as needed.
    /// The index may be at most the current length.
    At(usize),
}

/// A codec for collections of `T` over native memory.
pub trait TransferAgent<T> {
    /// Bytes needed to encode `count` objects. For variable-layout agents this is a
    /// lower bound.
    fn bytes_needed(&self, count: usize) -> usize;

    /// Exact number of bytes needed to encode `objects`.
    fn bytes_needed_for(&self, objects: &[T]) -> usize {
        self.bytes_needed(objects.len())
    }

    /// Number of whole objects encoded in `region`, for sizing decode targets.
    fn object_count(&self, region: &[u8]) -> usize;

    /// Encodes `objects` at the stream position and returns the number of bytes
    /// written.
    fn write(&self, stream: &mut NativeMemoryStream<'_>, objects: &[T]) -> Result<usize>;

    /// Decodes `count` objects from the stream position into `objects`, or every
    /// object available if `count` is zero. Returns the number of objects read.
    fn read(
        &self,
        stream: &mut NativeMemoryStream<'_>,
        objects: &mut Vec<T>,
        placement: ReadPlacement,
        count: usize,
    ) -> Result<usize>;
}

fn check_placement<T>(objects: &[T], placement: ReadPlacement) -> Result<()> {
    if let ReadPlacement::At(index) = placement {
        verify_arg!(index, index <= objects.len());
    }
    Ok(())
}

fn place<T>(objects: &mut Vec<T>, placement: ReadPlacement, decoded: Vec<T>) {
    match placement {
        ReadPlacement::Append => objects.extend(decoded),
        ReadPlacement::At(index) => {
            let overlap = (objects.len() - index).min(decoded.len());
            let mut decoded = decoded.into_iter();
            for (slot, value) in objects[index..index + overlap].iter_mut().zip(&mut decoded) {
                *slot = value;
            }
            objects.extend(decoded);
        }
    }
}

/// Fixed-layout agent for plain-old-data element types: elements are packed back to
/// back in native byte order.
pub struct PodAgent<T> {
    _p: PhantomData<fn() -> T>,
}

impl<T: Pod> PodAgent<T> {
    pub const fn new() -> Self {
        const { assert!(std::mem::size_of::<T>() > 0, "zero-sized element type") };
        PodAgent { _p: PhantomData }
    }

    const ELEMENT_SIZE: usize = std::mem::size_of::<T>();
}

impl<T: Pod> Default for PodAgent<T> {
    fn default() -> Self {
        PodAgent::new()
    }
}

impl<T> std::fmt::Debug for PodAgent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PodAgent<{}>", std::any::type_name::<T>())
    }
}

impl<T: Pod> TransferAgent<T> for PodAgent<T> {
    fn bytes_needed(&self, count: usize) -> usize {
        count * Self::ELEMENT_SIZE
    }

    fn object_count(&self, region: &[u8]) -> usize {
        region.len() / Self::ELEMENT_SIZE
    }

    fn write(&self, stream: &mut NativeMemoryStream<'_>, objects: &[T]) -> Result<usize> {
        let bytes: &[u8] = bytemuck::cast_slice(objects);
        stream.write_slice(bytes)?;
        Ok(bytes.len())
    }

    fn read(
        &self,
        stream: &mut NativeMemoryStream<'_>,
        objects: &mut Vec<T>,
        placement: ReadPlacement,
        count: usize,
    ) -> Result<usize> {
        check_placement(objects, placement)?;
        let count = if count == 0 {
            stream.remaining() / Self::ELEMENT_SIZE
        } else {
            count
        };
        let size = count
            .checked_mul(Self::ELEMENT_SIZE)
            .ok_or_else(|| Error::overflow(stream.position(), usize::MAX, stream.len()))?;
        verify_range!(stream.position(), size, stream.len());

        let mut decoded = vec![T::zeroed(); count];
        stream.read_slice(bytemuck::cast_slice_mut(&mut decoded))?;
        place(objects, placement, decoded);
        Ok(count)
    }
}

const LENGTH_PREFIX: usize = std::mem::size_of::<u32>();

/// Variable-layout agent for strings: each string is a native-endian `u32` byte
/// length followed by its UTF-8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringAgent;

impl TransferAgent<String> for StringAgent {
    fn bytes_needed(&self, count: usize) -> usize {
        count * LENGTH_PREFIX
    }

    fn bytes_needed_for(&self, objects: &[String]) -> usize {
        objects
            .iter()
            .map(|s| LENGTH_PREFIX + s.len())
            .sum()
    }

    fn object_count(&self, region: &[u8]) -> usize {
        let mut count = 0;
        let mut rest = region;
        while let Some((prefix, tail)) = rest.split_first_chunk::<LENGTH_PREFIX>() {
            let len = u32::from_ne_bytes(*prefix) as usize;
            if len > tail.len() {
                break;
            }
            rest = &tail[len..];
            count += 1;
        }
        count
    }

    fn write(&self, stream: &mut NativeMemoryStream<'_>, objects: &[String]) -> Result<usize> {
        let needed = self.bytes_needed_for(objects);
        verify_range!(stream.position(), needed, stream.len());
        for s in objects {
            let bytes = s.as_bytes();
            stream.write_u32(Self::prefix(bytes.len())?)?;
            stream.write_slice(bytes)?;
        }
        Ok(needed)
    }

    fn read(
        &self,
        stream: &mut NativeMemoryStream<'_>,
        objects: &mut Vec<String>,
        placement: ReadPlacement,
        count: usize,
    ) -> Result<usize> {
        check_placement(objects, placement)?;
        let start = stream.position();
        let decoded = match StringAgent::decode(stream, count) {
            Ok(decoded) => decoded,
            Err(e) => {
                stream.set_position(start)?;
                return Err(e);
            }
        };
        let read = decoded.len();
        place(objects, placement, decoded);
        Ok(read)
    }
}

impl StringAgent {
    fn prefix(len: usize) -> Result<u32> {
        u32::try_from(len).map_err(|_| {
            Error::invalid_arg("objects", format!("string of {len} bytes is too long"))
        })
    }

    /// Decodes `count` records (all complete records if zero). A truncated record
    /// ends an open-ended read and fails a counted one.
    fn decode(stream: &mut NativeMemoryStream<'_>, count: usize) -> Result<Vec<String>> {
        let mut decoded = Vec::new();
        while count == 0 || decoded.len() < count {
            let record = stream.position();
            if count == 0 && stream.remaining() < LENGTH_PREFIX {
                break;
            }
            let len = stream.read_u32()? as usize;
            if len > stream.remaining() {
                if count == 0 {
                    stream.set_position(record)?;
                    break;
                }
                return Err(Error::overflow(stream.position(), len, stream.len()));
            }
            let mut bytes = vec![0u8; len];
            stream.read_slice(&mut bytes)?;
            let text = String::from_utf8(bytes)
                .map_err(|e| Error::invalid_arg("stream", format!("invalid UTF-8: {e}")))?;
            decoded.push(text);
        }
        Ok(decoded)
    }
}
