//! Decompress command implementation.

use lzscope_lzma2::decompress;
use lzscope_lzma2::xz::XZ_MAGIC;
use std::io::{self, Write};
use std::path::Path;

/// Window used for raw streams when no size is given.
const DEFAULT_RAW_DICT_KIB: u32 = 1536 * 1024;

/// Options for the decompress command.
pub struct DecompressOptions<'a> {
    pub input: &'a Path,
    pub output: Option<&'a Path>,
    pub dict_kib: Option<u32>,
}

pub fn cmd_decompress(options: &DecompressOptions) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(options.input)?;
    let is_xz = data.starts_with(&XZ_MAGIC);
    let dict_kib = options.dict_kib.unwrap_or(DEFAULT_RAW_DICT_KIB);
    let dict_size = dict_kib
        .checked_mul(1024)
        .ok_or_else(|| format!("dictionary size of {} KiB is too large", dict_kib))?;
    log::debug!(
        "decoding {} ({} bytes, {})",
        options.input.display(),
        data.len(),
        if is_xz { "xz" } else { "raw lzma2" }
    );

    let decoded = decompress(&data, dict_size)?;

    match options.output {
        Some(path) => {
            std::fs::write(path, &decoded)?;
            eprintln!(
                "{} -> {} ({} bytes)",
                options.input.display(),
                path.display(),
                decoded.len()
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&decoded)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
