//! Compression sessions.
//!
//! A [`Compressor`] owns everything one stream needs: validated
//! parameters, the packetizer (match finder, coder state, pending input)
//! and the optional XZ framing. Sessions share nothing, so any number can
//! run side by side.

use crate::decoder;
use crate::lzma2::{CONTROL_END, Chunk, ChunkStats, Packetizer};
use crate::params::ParameterSet;
use crate::xz::{CheckType, XZ_MAGIC, XzStreamWriter, decompress_xz};
use lzscope_core::error::Result;
use lzscope_core::traits::StreamCompressor;
use std::time::{Duration, Instant};

/// Output framing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Container {
    /// Bare LZMA2 chunks ending with the end marker.
    #[default]
    Raw,
    /// LZMA2 wrapped in an XZ stream with the given check.
    Xz(CheckType),
}

impl Container {
    /// Short name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Xz(_) => "xz",
        }
    }
}

/// Running totals of a compression session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompressionReport {
    /// Input bytes accepted.
    pub original_size: u64,
    /// Output bytes produced.
    pub compressed_size: u64,
    /// Time spent inside `compress` and `flush`.
    pub elapsed: Duration,
    /// Chunk counters.
    pub chunks: ChunkStats,
}

impl CompressionReport {
    /// Compressed size over original size; an empty input counts as one byte.
    pub fn compression_ratio(&self) -> f64 {
        self.compressed_size as f64 / self.original_size.max(1) as f64
    }

    /// Percentage of the input saved (negative when the output is larger).
    pub fn space_savings(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.compression_ratio()) * 100.0
    }

    /// Input throughput in MiB/s, if any time was measured.
    pub fn throughput_mib_s(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.original_size as f64 / (1024.0 * 1024.0) / secs)
    }
}

/// A streaming LZMA2 compressor.
#[derive(Debug)]
pub struct Compressor {
    params: ParameterSet,
    container: Container,
    packetizer: Packetizer,
    xz: Option<XzStreamWriter>,
    report: CompressionReport,
}

impl Compressor {
    /// Start a raw LZMA2 session.
    pub fn new(params: ParameterSet) -> Result<Self> {
        Self::with_container(params, Container::Raw)
    }

    /// Start a session writing the given container.
    pub fn with_container(params: ParameterSet, container: Container) -> Result<Self> {
        params.validate()?;
        let xz = match container {
            Container::Raw => None,
            Container::Xz(check) => Some(XzStreamWriter::new(check, params.dict_size)),
        };
        log::debug!(
            "session: level {} dict {} lc {} lp {} pb {} {} {} nice {} depth {}, {} output",
            params.level,
            params.dict_size,
            params.lc,
            params.lp,
            params.pb,
            params.mode,
            params.match_finder,
            params.nice_len,
            params.effective_depth(),
            container.name()
        );
        Ok(Self {
            params,
            container,
            packetizer: Packetizer::new(&params),
            xz,
            report: CompressionReport::default(),
        })
    }

    /// Parameters of this session.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Output container of this session.
    pub fn container(&self) -> Container {
        self.container
    }

    /// Totals so far.
    pub fn report(&self) -> CompressionReport {
        CompressionReport {
            chunks: self.packetizer.stats(),
            ..self.report
        }
    }

    /// Feed input, returning the output of every chunk it completed.
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let start = Instant::now();
        let chunks = self.packetizer.feed(data)?;
        let output = self.frame(data, &chunks, false);
        self.account(data.len(), output.len(), start);
        Ok(output)
    }

    /// Close the stream, returning the remaining output.
    ///
    /// Flushing again returns nothing.
    pub fn flush(&mut self) -> Result<Vec<u8>> {
        if self.packetizer.is_finished() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let chunks = self.packetizer.flush();
        let output = self.frame(&[], &chunks, true);
        self.account(0, output.len(), start);

        let report = self.report();
        log::info!(
            "compressed {} -> {} bytes (ratio {:.4}) in {:.3?}",
            report.original_size,
            report.compressed_size,
            report.compression_ratio(),
            report.elapsed
        );
        Ok(output)
    }

    /// Emit buffered input as a chunk and start a fresh dictionary.
    pub fn reset_dictionary(&mut self) -> Result<Vec<u8>> {
        let start = Instant::now();
        let chunks = self.packetizer.reset_dictionary()?;
        let output = self.frame(&[], &chunks, false);
        self.account(0, output.len(), start);
        Ok(output)
    }

    /// Whether the stream has been flushed.
    pub fn is_finished(&self) -> bool {
        self.packetizer.is_finished()
    }

    fn frame(&mut self, input: &[u8], chunks: &[Chunk], last: bool) -> Vec<u8> {
        let mut lzma2 = Vec::with_capacity(chunks.iter().map(Chunk::encoded_len).sum::<usize>() + 1);
        for chunk in chunks {
            chunk.write_to(&mut lzma2);
        }
        if last {
            lzma2.push(CONTROL_END);
        }

        match self.xz.as_mut() {
            None => lzma2,
            Some(xz) => {
                let mut output = Vec::with_capacity(lzma2.len() + 64);
                if last {
                    xz.finish(input, &lzma2, &mut output);
                } else {
                    xz.write(input, &lzma2, &mut output);
                }
                output
            }
        }
    }

    fn account(&mut self, input: usize, output: usize, start: Instant) {
        self.report.original_size += input as u64;
        self.report.compressed_size += output as u64;
        self.report.elapsed += start.elapsed();
    }
}

impl StreamCompressor for Compressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        Compressor::compress(self, data)
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        Compressor::flush(self)
    }

    fn is_finished(&self) -> bool {
        Compressor::is_finished(self)
    }
}

/// Compress `data` in one call.
pub fn compress(data: &[u8], params: ParameterSet, container: Container) -> Result<Vec<u8>> {
    Compressor::with_container(params, container)?.compress_all(data)
}

/// Decode the output of a session.
///
/// XZ streams are recognized by their magic; anything else is decoded as
/// raw LZMA2 with a `dict_size` window.
pub fn decompress(data: &[u8], dict_size: u32) -> Result<Vec<u8>> {
    if data.starts_with(&XZ_MAGIC) {
        decompress_xz(data)
    } else {
        decoder::decompress(data, dict_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lzscope_core::error::LzScopeError;

    #[test]
    fn test_decompress_needs_full_xz_magic() {
        // 0xFD is also a valid LZMA chunk control byte.
        let err = decompress(&[0xFD, 0x37, 0x7A, 0x00], 1 << 16).unwrap_err();
        assert!(!matches!(err, LzScopeError::InvalidMagic { .. }), "{:?}", err);

        let container = Container::Xz(CheckType::Crc32);
        let mut compressor = Compressor::with_container(ParameterSet::default(), container).unwrap();
        let mut stream = compressor.compress(b"magic").unwrap();
        stream.extend(compressor.flush().unwrap());
        assert_eq!(decompress(&stream, 1 << 16).unwrap(), b"magic");
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let err = Compressor::new(ParameterSet::default().lc(3).lp(2)).unwrap_err();
        assert!(matches!(
            err,
            LzScopeError::InvalidParameters {
                parameter: "lc+lp",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_raw_stream() {
        let mut compressor = Compressor::new(ParameterSet::default()).unwrap();
        assert!(compressor.compress(&[]).unwrap().is_empty());
        assert_eq!(compressor.flush().unwrap(), vec![0x00]);
        assert!(compressor.flush().unwrap().is_empty());
        let report = compressor.report();
        assert_eq!(report.original_size, 0);
        assert_eq!(report.compressed_size, 1);
        assert_eq!(report.compression_ratio(), 1.0);
        assert_eq!(report.space_savings(), 0.0);
    }

    #[test]
    fn test_report_tracks_sizes() {
        let mut compressor = Compressor::new(ParameterSet::default()).unwrap();
        let data = vec![b'A'; 10_000];
        let mut output = compressor.compress(&data).unwrap();
        output.extend(compressor.flush().unwrap());
        let report = compressor.report();
        assert_eq!(report.original_size, 10_000);
        assert_eq!(report.compressed_size, output.len() as u64);
        assert!(report.compression_ratio() < 0.1);
        assert!(report.space_savings() > 90.0);
        assert_eq!(report.chunks.compressed, 1);
    }

    #[test]
    fn test_feed_after_flush() {
        let mut compressor = Compressor::with_container(
            ParameterSet::default(),
            Container::Xz(CheckType::Crc64),
        )
        .unwrap();
        compressor.flush().unwrap();
        assert!(compressor.is_finished());
        let err = compressor.compress(b"more").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_decompress_detects_container() {
        let data = b"detect the container by its magic bytes".repeat(20);
        for container in [Container::Raw, Container::Xz(CheckType::Crc32)] {
            let packed = compress(&data, ParameterSet::default(), container).unwrap();
            assert_eq!(decompress(&packed, 1 << 23).unwrap(), data);
        }
    }
}
