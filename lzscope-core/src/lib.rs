//! # lzscope Core
//!
//! Core components shared by the lzscope codec and command-line crates:
//!
//! - [`error`]: Error type and `Result` alias
//! - [`crc`]: CRC-32 and CRC-64 checks
//! - [`window`]: Sliding window dictionary for back-references
//! - [`traits`]: Streaming compressor/decompressor traits
//!
//! ## Example
//!
//! ```rust
//! use lzscope_core::crc::Crc32;
//! use lzscope_core::window::SlidingWindow;
//!
//! let mut window = SlidingWindow::new(4096);
//! window.append(b"abc");
//! assert_eq!(window.at(1).unwrap(), b'c');
//!
//! assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crc;
pub mod error;
pub mod traits;
pub mod window;

// Re-exports for convenience
pub use crc::{Crc32, Crc64};
pub use error::{LzScopeError, Result};
pub use traits::{StreamCompressor, StreamDecompressor};
pub use window::SlidingWindow;
