//! Marshaling and streaming over native memory:
//! - `MemoryBlock`: ownership handle routing release to the heap an address came from.
//! - `NativeArray`: a bounds-checked native byte region with typed accessors.
//! - `NativeMemoryStream`: a buffered, seekable, mode-aware cursor over an array.
//! - `TransferAgent`: pluggable codecs between streams and typed collections.
//! - `native_string`: null-terminated text bridge (`NtString`).

pub mod array;
pub mod block;
pub mod native_string;
pub mod stream;
pub mod transfer;

pub use array::NativeArray;
pub use block::MemoryBlock;
pub use native_string::{NtString, SymbolWidth};
pub use stream::{NativeMemoryStream, SeekOrigin, StreamMode};
pub use transfer::{PodAgent, ReadPlacement, StringAgent, TransferAgent};

pub use nmem_common::{Error, ErrorKind, Result};
pub use nmem_native::AllocationOrigin;
pub use nmem_tracker::MemoryContext;
