//! LZMA2 stream decoder.
//!
//! Decodes the chunk sequence written by the packetizer (or any
//! conforming LZMA2 encoder) and enforces the reset protocol: the first
//! chunk must reset the dictionary, and properties must be known before the
//! first LZMA chunk.

use crate::lzma2::{
    CONTROL_COPY, CONTROL_COPY_RESET_DICT, CONTROL_END, CONTROL_LZMA, StateReset,
};
use crate::model::{
    DIST_ALIGN_BITS, DIST_SLOT_BITS, END_POS_MODEL_INDEX, LEN_HIGH_BITS, LEN_LOW_BITS,
    LEN_LOW_SYMBOLS, LEN_MID_BITS, LEN_MID_SYMBOLS, LITERAL_CODER_SIZE, LengthModel, LzmaModel,
    LzmaProperties, MATCH_LEN_MIN, REPS, State, dist_state, special_offset,
};
use crate::range_coder::RangeDecoder;
use lzscope_core::error::{LzScopeError, Result};
use lzscope_core::traits::StreamDecompressor;
use lzscope_core::window::SlidingWindow;

/// Distance value LZMA uses as an end marker; invalid inside LZMA2.
const END_MARKER: u32 = 0xFFFF_FFFF;

/// Decode a length.
fn decode_length(rc: &mut RangeDecoder<'_>, len_model: &mut LengthModel, pos_state: usize) -> Result<u32> {
    let len = if rc.decode_bit(&mut len_model.choice)? == 0 {
        rc.decode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS)?
    } else if rc.decode_bit(&mut len_model.choice2)? == 0 {
        LEN_LOW_SYMBOLS as u32 + rc.decode_bit_tree(&mut len_model.mid[pos_state], LEN_MID_BITS)?
    } else {
        (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32
            + rc.decode_bit_tree(&mut len_model.high, LEN_HIGH_BITS)?
    };
    Ok(len + MATCH_LEN_MIN as u32)
}

/// Decode a zero-based distance.
fn decode_distance(rc: &mut RangeDecoder<'_>, model: &mut LzmaModel, len: u32) -> Result<u32> {
    let slot = rc.decode_bit_tree(&mut model.distance.slot[dist_state(len)], DIST_SLOT_BITS)?;
    if slot < 4 {
        return Ok(slot);
    }

    let num_direct_bits = (slot >> 1) - 1;
    let base = (2 | (slot & 1)) << num_direct_bits;

    if slot < END_POS_MODEL_INDEX as u32 {
        let offset = special_offset(slot, base);
        let mut m = 1usize;
        let mut reduced = 0u32;
        for i in 0..num_direct_bits {
            let bit = rc.decode_bit(&mut model.distance.special[offset + m - 1])?;
            m = (m << 1) | bit as usize;
            reduced |= bit << i;
        }
        Ok(base + reduced)
    } else {
        let direct = rc.decode_direct_bits(num_direct_bits - DIST_ALIGN_BITS)?;
        let align = rc.decode_bit_tree_reverse(&mut model.distance.align, DIST_ALIGN_BITS)?;
        Ok(base
            .wrapping_add(direct << DIST_ALIGN_BITS)
            .wrapping_add(align))
    }
}

/// Decode a literal, using `match_byte` as context after a match.
fn decode_literal(
    rc: &mut RangeDecoder<'_>,
    probs: &mut [u16; LITERAL_CODER_SIZE],
    match_byte: Option<u8>,
) -> Result<u8> {
    let mut symbol = 1usize;

    if let Some(match_byte) = match_byte {
        let mut match_byte = match_byte as usize;
        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;
            let bit = rc.decode_bit(&mut probs[0x100 + (match_bit << 8) + symbol])? as usize;
            symbol = (symbol << 1) | bit;
            if bit != match_bit {
                break;
            }
        }
    }

    while symbol < 0x100 {
        let bit = rc.decode_bit(&mut probs[symbol])?;
        symbol = (symbol << 1) | bit as usize;
    }
    Ok((symbol - 0x100) as u8)
}

/// Read a big-endian `u16` at `at`.
fn be16(input: &[u8], at: usize) -> usize {
    u16::from_be_bytes([input[at], input[at + 1]]) as usize
}

/// LZMA2 decoder.
#[derive(Debug)]
pub struct Lzma2Decoder {
    window: SlidingWindow,
    model: Option<LzmaModel>,
    state: State,
    /// Recent distances, zero-based.
    reps: [u32; REPS],
    need_dict_reset: bool,
    need_props: bool,
    finished: bool,
    /// Stream bytes consumed, for error offsets.
    consumed: u64,
    /// Unconsumed input kept by the streaming interface.
    pending: Vec<u8>,
}

impl Lzma2Decoder {
    /// Create a decoder whose window holds `dict_size` bytes.
    pub fn new(dict_size: u32) -> Result<Self> {
        if dict_size == 0 {
            return Err(LzScopeError::invalid_parameters(
                "dict_size",
                "dictionary size must be non-zero",
            ));
        }
        Ok(Self {
            window: SlidingWindow::new(dict_size as usize),
            model: None,
            state: State::new(),
            reps: [0; REPS],
            need_dict_reset: true,
            need_props: true,
            finished: false,
            consumed: 0,
            pending: Vec::new(),
        })
    }

    /// Dictionary size in bytes.
    pub fn dict_size(&self) -> usize {
        self.window.capacity()
    }

    /// Whether the end marker has been read.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode every complete chunk in `input`.
    ///
    /// Returns the decoded bytes and the number of input bytes consumed.
    /// Decoding stops after the end marker or before a chunk that is not
    /// entirely contained in `input`.
    pub fn decode(&mut self, input: &[u8]) -> Result<(Vec<u8>, usize)> {
        let mut output = Vec::new();
        let mut pos = 0;

        while !self.finished && pos < input.len() {
            let Some(len) = Self::chunk_len(&input[pos..]) else {
                break;
            };
            if pos + len > input.len() {
                break;
            }
            self.decode_chunk(&input[pos..pos + len], &mut output)?;
            pos += len;
            self.consumed += len as u64;
        }

        Ok((output, pos))
    }

    /// Total size of the chunk starting `input`, if its header is complete.
    fn chunk_len(input: &[u8]) -> Option<usize> {
        let control = *input.first()?;
        match control {
            CONTROL_END => Some(1),
            CONTROL_COPY_RESET_DICT | CONTROL_COPY => {
                (input.len() >= 3).then(|| 3 + be16(input, 1) + 1)
            }
            CONTROL_LZMA..=0xFF => {
                if input.len() < 5 {
                    return None;
                }
                let props = usize::from(StateReset::from_control(control).has_props());
                Some(5 + props + be16(input, 3) + 1)
            }
            // Invalid controls are reported by decode_chunk.
            _ => Some(1),
        }
    }

    fn decode_chunk(&mut self, chunk: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let offset = self.consumed;
        let control = chunk[0];

        if control == CONTROL_END {
            self.finished = true;
            log::debug!("lzma2 end marker at offset {}", offset);
            return Ok(());
        }
        if (CONTROL_COPY + 1..CONTROL_LZMA).contains(&control) {
            return Err(LzScopeError::corrupted(
                offset,
                format!("invalid LZMA2 control byte 0x{:02X}", control),
            ));
        }

        if control == CONTROL_COPY_RESET_DICT || control >= 0xE0 {
            self.window.reset();
            self.need_dict_reset = false;
            self.need_props = true;
            log::trace!("lzma2 dictionary reset at offset {}", offset);
        } else if self.need_dict_reset {
            return Err(LzScopeError::corrupted(
                offset,
                "first LZMA2 chunk must reset the dictionary",
            ));
        }

        if control < CONTROL_LZMA {
            let data = &chunk[3..];
            self.window.append(data);
            output.extend_from_slice(data);
            log::debug!("lzma2 uncompressed chunk: {} bytes", data.len());
            return Ok(());
        }

        let uncompressed_len = (((control & 0x1F) as usize) << 16) + be16(chunk, 1) + 1;
        let reset = StateReset::from_control(control);
        let mut header_len = 5;

        if reset.has_props() {
            let byte = chunk[5];
            let props = LzmaProperties::from_byte(byte).ok_or_else(|| {
                LzScopeError::corrupted(offset + 5, format!("invalid LZMA properties 0x{:02X}", byte))
            })?;
            self.model = Some(LzmaModel::new(props));
            self.need_props = false;
            header_len = 6;
        } else if self.need_props {
            return Err(LzScopeError::corrupted(
                offset,
                "LZMA chunk without properties after a dictionary reset",
            ));
        }

        if reset >= StateReset::State {
            if let Some(model) = self.model.as_mut() {
                model.reset();
            }
            self.state = State::new();
            self.reps = [0; REPS];
        }

        let payload = &chunk[header_len..];
        let start = output.len();
        self.decode_lzma(payload, uncompressed_len, output)
            .map_err(|err| match err {
                LzScopeError::UnexpectedEof { .. } => LzScopeError::corrupted(
                    offset,
                    "LZMA payload ended before the chunk was complete",
                ),
                other => other,
            })?;

        log::debug!(
            "lzma2 chunk 0x{:02X}: {} -> {} bytes",
            control,
            chunk.len(),
            output.len() - start
        );
        Ok(())
    }

    /// Decode one LZMA payload producing exactly `uncompressed_len` bytes.
    fn decode_lzma(
        &mut self,
        payload: &[u8],
        uncompressed_len: usize,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        let offset = self.consumed;
        let Some(model) = self.model.as_mut() else {
            return Err(LzScopeError::corrupted(offset, "LZMA properties not initialized"));
        };
        let props = model.props;
        let window = &mut self.window;
        let mut rc = RangeDecoder::new(payload)?;
        let mut produced = 0usize;

        while produced < uncompressed_len {
            let position = window.total_appended();
            let pos_state = props.pos_state(position);
            let state = self.state.value();

            if rc.decode_bit(&mut model.is_match[state][pos_state])? == 0 {
                let lit_state = props.literal_state(position, window.last_byte());
                let match_byte = if self.state.is_literal() {
                    None
                } else {
                    Some(window.at(self.reps[0] as usize + 1)?)
                };
                let byte = decode_literal(&mut rc, &mut model.literal[lit_state], match_byte)?;
                window.push(byte);
                output.push(byte);
                self.state.update_literal();
                produced += 1;
                continue;
            }

            let len = if rc.decode_bit(&mut model.is_rep[state])? == 0 {
                let len = decode_length(&mut rc, &mut model.match_len, pos_state)?;
                let dist = decode_distance(&mut rc, model, len)?;
                if dist == END_MARKER {
                    return Err(LzScopeError::corrupted(
                        offset,
                        "end marker is not allowed in LZMA2",
                    ));
                }
                self.reps = [dist, self.reps[0], self.reps[1], self.reps[2]];
                self.state.update_match();
                len
            } else {
                if rc.decode_bit(&mut model.is_rep0[state])? == 0 {
                    if rc.decode_bit(&mut model.is_rep0_long[state][pos_state])? == 0 {
                        let byte = window.at(self.reps[0] as usize + 1)?;
                        window.push(byte);
                        output.push(byte);
                        self.state.update_short_rep();
                        produced += 1;
                        continue;
                    }
                } else {
                    let index = if rc.decode_bit(&mut model.is_rep1[state])? == 0 {
                        1
                    } else if rc.decode_bit(&mut model.is_rep2[state])? == 0 {
                        2
                    } else {
                        3
                    };
                    let dist = self.reps[index];
                    for i in (1..=index).rev() {
                        self.reps[i] = self.reps[i - 1];
                    }
                    self.reps[0] = dist;
                }
                let len = decode_length(&mut rc, &mut model.rep_len, pos_state)?;
                self.state.update_long_rep();
                len
            };

            let len = len as usize;
            if len > uncompressed_len - produced {
                return Err(LzScopeError::corrupted(
                    offset,
                    format!(
                        "match of {} bytes exceeds the {} bytes left in the chunk",
                        len,
                        uncompressed_len - produced
                    ),
                ));
            }
            window.copy_match(self.reps[0] as usize + 1, len, output)?;
            produced += len;
        }

        if rc.position() > payload.len() {
            return Err(LzScopeError::corrupted(offset, "LZMA payload overrun"));
        }
        Ok(())
    }
}

impl StreamDecompressor for Lzma2Decoder {
    fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if self.finished {
            return Ok(Vec::new());
        }
        self.pending.extend_from_slice(input);
        let pending = std::mem::take(&mut self.pending);
        let (output, consumed) = self.decode(&pending)?;
        if !self.finished {
            self.pending = pending[consumed..].to_vec();
        }
        Ok(output)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Decode a complete LZMA2 stream.
///
/// The stream must end with the end marker and nothing may follow it.
pub fn decompress(data: &[u8], dict_size: u32) -> Result<Vec<u8>> {
    let mut decoder = Lzma2Decoder::new(dict_size)?;
    let (output, consumed) = decoder.decode(data)?;
    if !decoder.is_finished() {
        return Err(LzScopeError::unexpected_eof(1));
    }
    if consumed != data.len() {
        return Err(LzScopeError::corrupted(
            consumed as u64,
            format!("{} trailing bytes after the end marker", data.len() - consumed),
        ));
    }
    Ok(output)
}
