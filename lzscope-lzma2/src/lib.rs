//! # lzscope LZMA2
//!
//! A parameterized LZMA2 streaming compressor, its decoder, XZ framing and
//! the measurements used to compare parameter choices.
//!
//! ## Features
//!
//! - **Pure Rust** encoder and decoder
//! - Five match finders: hash chains (HC3, HC4) and binary trees (BT2, BT3, BT4)
//! - Fast (greedy) and Normal (lazy) parsing
//! - Streaming input in slices of any size with feed-independent output
//! - Raw LZMA2 or XZ output with CRC-32/CRC-64 checks
//! - Compression reports and parameter sweeps (parallel with `parallel`)
//!
//! ## Usage
//!
//! ```rust
//! use lzscope_lzma2::{Compressor, ParameterSet, decompress};
//!
//! let params = ParameterSet::preset(6).unwrap().dict_size(1 << 16);
//! let mut compressor = Compressor::new(params).unwrap();
//!
//! let data = b"Hello, Hello, Hello, World!".repeat(100);
//! let mut packed = compressor.compress(&data).unwrap();
//! packed.extend(compressor.flush().unwrap());
//!
//! let report = compressor.report();
//! assert!(report.compression_ratio() < 0.1);
//! assert_eq!(decompress(&packed, params.dict_size).unwrap(), data);
//! ```
//!
//! ## Layout
//!
//! - [`params`]: parameter set, presets and validation
//! - [`match_finder`]: history buffer with hash chain and binary tree search
//! - [`model`], [`range_coder`], [`encoder`]: LZMA coding
//! - [`lzma2`]: chunk framing and the packetizer
//! - [`decoder`]: LZMA2 decoding
//! - [`xz`]: XZ container
//! - [`compressor`]: sessions and reports
//! - [`report`]: measurements and sweeps

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod compressor;
pub mod decoder;
pub mod encoder;
pub mod lzma2;
pub mod match_finder;
pub mod model;
pub mod params;
pub mod range_coder;
pub mod report;
pub mod xz;

// Re-exports
pub use compressor::{CompressionReport, Compressor, Container, compress, decompress};
pub use decoder::Lzma2Decoder;
pub use encoder::{EncodeContext, LzmaEncoder, Token, TokenEncoder};
pub use lzma2::{CHUNK_SIZE, Chunk, ChunkStats, Packetizer, StateReset};
pub use match_finder::{Match, MatchFinder};
pub use model::{LzmaModel, LzmaProperties, State};
pub use params::{MatchFinderKind, Mode, ParameterSet};
pub use range_coder::{RangeDecoder, RangeEncoder};
pub use report::{Measurement, SweepAxis, SweepPoint, measure, sweep};
pub use xz::{CheckType, XzStreamWriter, decompress_xz, dict_size_from_props, props_from_dict_size};
