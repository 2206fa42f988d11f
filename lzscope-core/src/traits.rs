//! Streaming traits shared by encoders and decoders.

use crate::error::Result;

/// A push-style streaming compressor.
///
/// Input is accepted in slices of any size; output bytes are returned as
/// soon as the encoder has framed them. `flush` terminates the stream.
pub trait StreamCompressor {
    /// Feed more input, returning any output that became ready.
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>>;

    /// Finish the stream, returning the remaining output.
    fn flush(&mut self) -> Result<Vec<u8>>;

    /// Check if the stream has been flushed.
    fn is_finished(&self) -> bool;

    /// Compress all data at once (convenience method).
    fn compress_all(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut output = self.compress(data)?;
        output.extend(self.flush()?);
        Ok(output)
    }

    /// Compress data fed in slices of at most `increment` bytes.
    fn compress_in_increments(&mut self, data: &[u8], increment: usize) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        for part in data.chunks(increment.max(1)) {
            output.extend(self.compress(part)?);
        }
        output.extend(self.flush()?);
        Ok(output)
    }
}

/// A streaming decompressor.
pub trait StreamDecompressor {
    /// Decode input, returning the bytes produced.
    fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    /// Check if the end of the stream has been reached.
    fn is_finished(&self) -> bool;
}
