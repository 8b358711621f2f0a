//! # Transport Layer
//!
//! Frame-level I/O: exact-count reads over a possibly zstd-framed stream,
//! per-packet frame writes, and the shared compression switches a session
//! uses to upgrade all of its endpoints mid-stream.

pub mod frame;

pub use frame::{CompressionSwitch, FrameReader, FrameWriter};
