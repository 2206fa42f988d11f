//! Command implementations for lzscope CLI.

pub mod compress;
pub mod decompress;
pub mod sweep;
pub mod verify;

pub use compress::{CompressOptions, cmd_compress};
pub use decompress::{DecompressOptions, cmd_decompress};
pub use sweep::{SweepOptions, cmd_sweep};
pub use verify::{VerifyOptions, cmd_verify};
