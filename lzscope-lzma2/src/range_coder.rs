//! Binary range coder.
//!
//! Bits are coded against adaptive 11-bit probabilities: a probability
//! `p` is the chance of a zero scaled to 2048, and after each bit it moves
//! 1/32 of the way towards the observed value. The 32-bit range is
//! renormalized a byte at a time once it falls below 2^24.
//!
//! Every LZMA2 chunk restarts the coder, so the decoder reads straight from
//! the chunk payload slice.

use lzscope_core::error::{LzScopeError, Result};

/// Probability precision in bits.
pub const PROB_BITS: u32 = 11;

/// Probability of a fresh context (one half).
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Scale of the probabilities.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Adaptation speed: probabilities move by `1 / 2^MOVE_BITS` of the gap.
pub const MOVE_BITS: u32 = 5;

/// Renormalize once the range drops below this.
const RANGE_TOP: u32 = 1 << 24;

/// Bytes consumed when a decoder is initialized.
pub const INIT_BYTES: usize = 5;

/// Split point of `range` for a bit with probability `prob`.
#[inline]
fn split(range: u32, prob: u16) -> u32 {
    (range >> PROB_BITS) * u32::from(prob)
}

/// Move `prob` towards the bit just coded.
#[inline]
fn adapt(prob: &mut u16, bit: u32) {
    if bit == 0 {
        *prob += (PROB_MAX - *prob) >> MOVE_BITS;
    } else {
        *prob -= *prob >> MOVE_BITS;
    }
}

/// Range decoder over one chunk payload.
#[derive(Debug)]
pub struct RangeDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    range: u32,
    code: u32,
}

impl<'a> RangeDecoder<'a> {
    /// Start decoding `input`; the first byte must be zero.
    pub fn new(input: &'a [u8]) -> Result<Self> {
        let Some(head) = input.get(..INIT_BYTES) else {
            return Err(LzScopeError::unexpected_eof(INIT_BYTES - input.len()));
        };
        if head[0] != 0 {
            return Err(LzScopeError::corrupted(0, "range coder must start with 0x00"));
        }
        let code = u32::from_be_bytes([head[1], head[2], head[3], head[4]]);
        if code == u32::MAX {
            return Err(LzScopeError::corrupted(1, "invalid range coder initial code"));
        }

        Ok(Self {
            input,
            pos: INIT_BYTES,
            range: u32::MAX,
            code,
        })
    }

    /// Bytes consumed from the payload so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn refill(&mut self) -> Result<()> {
        if self.range >= RANGE_TOP {
            return Ok(());
        }
        let Some(&byte) = self.input.get(self.pos) else {
            return Err(LzScopeError::unexpected_eof(1));
        };
        self.pos += 1;
        self.range <<= 8;
        self.code = (self.code << 8) | u32::from(byte);
        Ok(())
    }

    /// Decode one bit and adapt `prob`.
    #[inline]
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        self.refill()?;
        let bound = split(self.range, *prob);
        let bit = if self.code < bound {
            self.range = bound;
            0
        } else {
            self.range -= bound;
            self.code -= bound;
            1
        };
        adapt(prob, bit);
        Ok(bit)
    }

    /// Decode `count` equiprobable bits, most significant first.
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            self.refill()?;
            self.range >>= 1;
            let bit = u32::from(self.code >= self.range);
            self.code -= self.range * bit;
            value = (value << 1) | bit;
        }
        Ok(value)
    }

    /// Decode a `num_bits` symbol from a tree, most significant bit first.
    pub fn decode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32> {
        let mut node = 1usize;
        for _ in 0..num_bits {
            node = (node << 1) | self.decode_bit(&mut probs[node])? as usize;
        }
        Ok(node as u32 - (1 << num_bits))
    }

    /// Decode a `num_bits` symbol from a tree, least significant bit first.
    pub fn decode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32> {
        let mut node = 1usize;
        let mut value = 0u32;
        for shift in 0..num_bits {
            let bit = self.decode_bit(&mut probs[node])?;
            node = (node << 1) | bit as usize;
            value |= bit << shift;
        }
        Ok(value)
    }
}

/// Range encoder producing one chunk payload.
///
/// A byte whose value may still change through a carry is held in
/// `cache`, followed by `ff_run` bytes of 0xFF that the carry would also
/// ripple through.
#[derive(Debug)]
pub struct RangeEncoder {
    out: Vec<u8>,
    /// Bits 0-31 are the low end of the interval; bit 32 is a carry.
    low: u64,
    range: u32,
    cache: u8,
    ff_run: usize,
}

impl RangeEncoder {
    /// Create an encoder with an empty interval history.
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            low: 0,
            range: u32::MAX,
            cache: 0,
            ff_run: 0,
        }
    }

    fn shift_low(&mut self) {
        let top = (self.low >> 24) as u8;
        if (self.low as u32) < 0xFF00_0000 || self.low > u64::from(u32::MAX) {
            let carry = (self.low >> 32) as u8;
            self.out.push(self.cache.wrapping_add(carry));
            self.out
                .extend(std::iter::repeat_n(0xFFu8.wrapping_add(carry), self.ff_run));
            self.ff_run = 0;
            self.cache = top;
        } else {
            self.ff_run += 1;
        }
        self.low = (self.low & 0x00FF_FFFF) << 8;
    }

    #[inline]
    fn renormalize(&mut self) {
        if self.range < RANGE_TOP {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode one bit and adapt `prob`.
    #[inline]
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = split(self.range, *prob);
        if bit == 0 {
            self.range = bound;
        } else {
            self.low += u64::from(bound);
            self.range -= bound;
        }
        adapt(prob, bit);
        self.renormalize();
    }

    /// Encode the low `count` bits of `value` as equiprobable bits, most
    /// significant first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for shift in (0..count).rev() {
            self.range >>= 1;
            if (value >> shift) & 1 != 0 {
                self.low += u64::from(self.range);
            }
            self.renormalize();
        }
    }

    /// Encode a `num_bits` symbol through a tree, most significant bit first.
    pub fn encode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut node = 1usize;
        for shift in (0..num_bits).rev() {
            let bit = (value >> shift) & 1;
            self.encode_bit(&mut probs[node], bit);
            node = (node << 1) | bit as usize;
        }
    }

    /// Encode a `num_bits` symbol through a tree, least significant bit first.
    pub fn encode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut node = 1usize;
        let mut rest = value;
        for _ in 0..num_bits {
            let bit = rest & 1;
            rest >>= 1;
            self.encode_bit(&mut probs[node], bit);
            node = (node << 1) | bit as usize;
        }
    }

    /// Output size if the encoder were finished now.
    ///
    /// Every renormalization adds exactly one byte, so the value never
    /// shrinks as more bits are coded.
    pub fn pending_len(&self) -> usize {
        self.out.len() + 1 + self.ff_run + 4
    }

    /// Flush the interval and return the payload.
    pub fn finish(mut self) -> Vec<u8> {
        for _ in 0..INIT_BYTES {
            self.shift_low();
        }
        self.out
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapt_moves_towards_bit() {
        let mut prob = PROB_INIT;
        adapt(&mut prob, 0);
        assert_eq!(prob, PROB_INIT + (PROB_MAX - PROB_INIT) / 32);
        let mut prob = PROB_INIT;
        adapt(&mut prob, 1);
        assert_eq!(prob, PROB_INIT - PROB_INIT / 32);
    }

    #[test]
    fn test_empty_encoder_output() {
        assert_eq!(RangeEncoder::new().finish(), vec![0u8; 5]);
    }

    #[test]
    fn test_bits_round_trip() {
        let bits = [0u32, 1, 0, 1, 1, 1, 0, 0, 1, 0];
        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for &bit in &bits {
            encoder.encode_bit(&mut prob, bit);
        }
        let payload = encoder.finish();

        let mut decoder = RangeDecoder::new(&payload).unwrap();
        let mut prob = PROB_INIT;
        let decoded: Vec<u32> = bits
            .iter()
            .map(|_| decoder.decode_bit(&mut prob).unwrap())
            .collect();
        assert_eq!(decoded, bits);
    }

    #[test]
    fn test_direct_bits_and_trees() {
        let mut encoder = RangeEncoder::new();
        let (mut tree, mut rev) = ([PROB_INIT; 64], [PROB_INIT; 16]);
        encoder.encode_direct_bits(0x2A5, 10);
        encoder.encode_bit_tree(&mut tree, 6, 45);
        encoder.encode_bit_tree_reverse(&mut rev, 4, 9);
        let payload = encoder.finish();

        let mut decoder = RangeDecoder::new(&payload).unwrap();
        let (mut tree, mut rev) = ([PROB_INIT; 64], [PROB_INIT; 16]);
        assert_eq!(decoder.decode_direct_bits(10).unwrap(), 0x2A5);
        assert_eq!(decoder.decode_bit_tree(&mut tree, 6).unwrap(), 45);
        assert_eq!(decoder.decode_bit_tree_reverse(&mut rev, 4).unwrap(), 9);
    }

    #[test]
    fn test_skewed_probabilities() {
        // Long runs push probabilities to their limits and produce carries.
        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for i in 0..20_000u32 {
            encoder.encode_bit(&mut prob, u32::from(i % 97 == 0));
        }
        let payload = encoder.finish();

        let mut decoder = RangeDecoder::new(&payload).unwrap();
        let mut prob = PROB_INIT;
        for i in 0..20_000u32 {
            assert_eq!(decoder.decode_bit(&mut prob).unwrap(), u32::from(i % 97 == 0));
        }
        assert!(decoder.position() <= payload.len());
    }

    #[test]
    fn test_pending_len_is_exact_and_grows() {
        let mut encoder = RangeEncoder::new();
        assert_eq!(encoder.pending_len(), INIT_BYTES);
        let mut probs = [PROB_INIT; 256];
        let mut last = encoder.pending_len();
        for i in 0..5_000u32 {
            encoder.encode_bit_tree(&mut probs, 8, i.wrapping_mul(2_654_435_761) >> 24);
            assert!(encoder.pending_len() >= last);
            last = encoder.pending_len();
        }
        assert_eq!(encoder.finish().len(), last);
    }

    #[test]
    fn test_decoder_rejects_bad_start() {
        assert!(RangeDecoder::new(&[1, 0, 0, 0, 0]).is_err());
        assert!(RangeDecoder::new(&[0, 0, 0]).is_err());
        assert!(RangeDecoder::new(&[0, 0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }
}
