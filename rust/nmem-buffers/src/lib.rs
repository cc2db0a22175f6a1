//! Fixed-width byte windows used as the unit of transfer between local code and
//! native memory.
//!
//! [`BufferView<W>`](view::BufferView) covers the closed width set
//! {1, 2, 4, 8, 32, 64, 128, 256, 512}; [`AnyBufferView`](any::AnyBufferView) selects
//! one of them by a run-time width.

pub mod any;
pub mod view;
pub mod widths;

pub use any::AnyBufferView;
pub use view::{
    Buffer1, Buffer2, Buffer4, Buffer8, Buffer32, Buffer64, Buffer128, Buffer256, Buffer512,
    BufferView, SupportedWidth, Width,
};
