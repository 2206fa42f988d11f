//! LZMA2 chunk framing.
//!
//! LZMA2 cuts an LZMA stream into independently sized chunks so that
//! incompressible input can be stored as-is and coder state can be reset
//! mid-stream.
//!
//! ## Chunk Format
//!
//! Each chunk starts with a control byte:
//! - `0x00`: end of stream
//! - `0x01`: uncompressed chunk, dictionary reset
//! - `0x02`: uncompressed chunk, no reset
//! - `0x80..=0xFF`: LZMA chunk. Bits 5-6 select the reset level and bits
//!   0-4 hold bits 16-20 of `uncompressed size - 1`.
//!
//! Uncompressed chunks continue with a big-endian `size - 1` (2 bytes).
//! LZMA chunks continue with the low 16 bits of `uncompressed size - 1`,
//! `compressed size - 1` (2 bytes), and a properties byte when the reset
//! level includes new properties.

use crate::encoder::LzmaEncoder;
use crate::model::LzmaProperties;
use crate::params::ParameterSet;
use lzscope_core::error::{LzScopeError, Result};

/// Largest compressed payload of an LZMA chunk.
pub const COMPRESSED_MAX: usize = 1 << 16;

/// Largest uncompressed size of an LZMA chunk a decoder must accept.
pub const UNCOMPRESSED_MAX: usize = 1 << 21;

/// Largest uncompressed chunk.
pub const COPY_MAX: usize = 1 << 16;

/// Uncompressed bytes per emitted chunk.
///
/// Every chunk must fit either framing, since the choice is made after
/// encoding.
pub const CHUNK_SIZE: usize = COPY_MAX;

const _: () = assert!(CHUNK_SIZE <= UNCOMPRESSED_MAX);

/// End of stream.
pub const CONTROL_END: u8 = 0x00;
/// Uncompressed chunk that resets the dictionary.
pub const CONTROL_COPY_RESET_DICT: u8 = 0x01;
/// Uncompressed chunk.
pub const CONTROL_COPY: u8 = 0x02;
/// Lowest LZMA chunk control byte.
pub const CONTROL_LZMA: u8 = 0x80;

/// Header bytes of an uncompressed chunk.
const COPY_HEADER_LEN: usize = 3;

/// What an LZMA chunk resets before its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StateReset {
    /// Continue with the previous chunk's state (0x80).
    None,
    /// Reset probabilities and state machine (0xA0).
    State,
    /// Reset state and read new properties (0xC0).
    StateProps,
    /// Reset state, properties and the dictionary (0xE0).
    All,
}

impl StateReset {
    /// The two reset bits of the control byte.
    pub fn bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::State => 1,
            Self::StateProps => 2,
            Self::All => 3,
        }
    }

    /// Decode the reset level of an LZMA control byte.
    pub fn from_control(control: u8) -> Self {
        match (control >> 5) & 0x03 {
            0 => Self::None,
            1 => Self::State,
            2 => Self::StateProps,
            _ => Self::All,
        }
    }

    /// Whether a properties byte follows the sizes.
    pub fn has_props(self) -> bool {
        self >= Self::StateProps
    }
}

/// One framed LZMA2 chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Raw bytes.
    Uncompressed {
        /// Whether the decoder must reset its dictionary first.
        dict_reset: bool,
        /// The stored bytes (1..=65536).
        data: Vec<u8>,
    },
    /// An LZMA-coded payload.
    Lzma {
        /// Reset level.
        reset: StateReset,
        /// Properties, written when `reset` includes them.
        props: LzmaProperties,
        /// Bytes the payload decodes to (1..=2 MiB).
        uncompressed_len: usize,
        /// Range coder output (1..=65536 bytes).
        payload: Vec<u8>,
    },
}

impl Chunk {
    /// Bytes of input this chunk represents.
    pub fn uncompressed_len(&self) -> usize {
        match self {
            Self::Uncompressed { data, .. } => data.len(),
            Self::Lzma {
                uncompressed_len, ..
            } => *uncompressed_len,
        }
    }

    /// Whether the chunk resets the decoder's dictionary.
    pub fn is_dict_reset(&self) -> bool {
        match self {
            Self::Uncompressed { dict_reset, .. } => *dict_reset,
            Self::Lzma { reset, .. } => *reset == StateReset::All,
        }
    }

    /// Whether the chunk is LZMA-coded.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Lzma { .. })
    }

    /// The control byte opening the chunk.
    pub fn control_byte(&self) -> u8 {
        match self {
            Self::Uncompressed { dict_reset, .. } => {
                if *dict_reset {
                    CONTROL_COPY_RESET_DICT
                } else {
                    CONTROL_COPY
                }
            }
            Self::Lzma {
                reset,
                uncompressed_len,
                ..
            } => {
                CONTROL_LZMA
                    | (reset.bits() << 5)
                    | (((uncompressed_len - 1) >> 16) as u8 & 0x1F)
            }
        }
    }

    /// Header size, control byte included.
    pub fn header_len(&self) -> usize {
        match self {
            Self::Uncompressed { .. } => COPY_HEADER_LEN,
            Self::Lzma { reset, .. } => lzma_header_len(*reset),
        }
    }

    /// Serialized size.
    pub fn encoded_len(&self) -> usize {
        self.header_len()
            + match self {
                Self::Uncompressed { data, .. } => data.len(),
                Self::Lzma { payload, .. } => payload.len(),
            }
    }

    /// Append the serialized chunk to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.control_byte());
        match self {
            Self::Uncompressed { data, .. } => {
                debug_assert!((1..=COPY_MAX).contains(&data.len()));
                out.extend_from_slice(&((data.len() - 1) as u16).to_be_bytes());
                out.extend_from_slice(data);
            }
            Self::Lzma {
                reset,
                props,
                uncompressed_len,
                payload,
            } => {
                debug_assert!((1..=UNCOMPRESSED_MAX).contains(uncompressed_len));
                debug_assert!((1..=COMPRESSED_MAX).contains(&payload.len()));
                out.extend_from_slice(&(((uncompressed_len - 1) & 0xFFFF) as u16).to_be_bytes());
                out.extend_from_slice(&((payload.len() - 1) as u16).to_be_bytes());
                if reset.has_props() {
                    out.push(props.to_byte());
                }
                out.extend_from_slice(payload);
            }
        }
    }
}

/// Header size of an LZMA chunk.
fn lzma_header_len(reset: StateReset) -> usize {
    if reset.has_props() { 6 } else { 5 }
}

/// Counters kept by a [`Packetizer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    /// LZMA chunks emitted.
    pub compressed: u64,
    /// Uncompressed chunks emitted.
    pub uncompressed: u64,
}

/// Splits a byte stream into LZMA2 chunks.
///
/// Input is buffered until a full chunk is available, so the chunk
/// boundaries (and the output) only depend on the concatenated input.
#[derive(Debug)]
pub struct Packetizer {
    encoder: LzmaEncoder,
    props: LzmaProperties,
    need_dict_reset: bool,
    need_props: bool,
    need_state_reset: bool,
    finished: bool,
    stats: ChunkStats,
}

impl Packetizer {
    /// Create a packetizer for validated parameters.
    pub fn new(params: &ParameterSet) -> Self {
        Self {
            encoder: LzmaEncoder::new(params),
            props: params.properties(),
            need_dict_reset: true,
            need_props: true,
            need_state_reset: true,
            finished: false,
            stats: ChunkStats::default(),
        }
    }

    /// Buffer `data`, returning every chunk it completes.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Chunk>> {
        self.check_open("feed")?;
        let mut chunks = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let room = CHUNK_SIZE - self.encoder.pending();
            let (head, tail) = rest.split_at(room.min(rest.len()));
            self.encoder.append(head);
            rest = tail;
            if self.encoder.pending() == CHUNK_SIZE {
                chunks.push(self.emit_chunk());
            }
        }
        Ok(chunks)
    }

    /// Emit the buffered partial chunk and close the stream.
    ///
    /// The caller writes the end marker. Flushing a closed stream
    /// returns nothing.
    pub fn flush(&mut self) -> Vec<Chunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        self.close_chunk()
    }

    /// Emit the partial chunk and start a new dictionary.
    pub fn reset_dictionary(&mut self) -> Result<Vec<Chunk>> {
        self.check_open("reset_dictionary")?;
        let chunks = self.close_chunk();
        self.encoder.reset_dictionary();
        self.need_dict_reset = true;
        self.need_props = true;
        self.need_state_reset = true;
        log::trace!("dictionary reset requested");
        Ok(chunks)
    }

    /// Bytes buffered for the next chunk.
    pub fn pending(&self) -> usize {
        self.encoder.pending()
    }

    /// Whether `flush` has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Chunk counters so far.
    pub fn stats(&self) -> ChunkStats {
        self.stats
    }

    fn check_open(&self, operation: &str) -> Result<()> {
        if self.finished {
            return Err(LzScopeError::stream_misuse(format!(
                "{} called after flush",
                operation
            )));
        }
        Ok(())
    }

    fn close_chunk(&mut self) -> Vec<Chunk> {
        if self.encoder.pending() == 0 {
            Vec::new()
        } else {
            vec![self.emit_chunk()]
        }
    }

    /// Encode every pending byte as one chunk.
    ///
    /// LZMA framing is kept only if the payload fits and the chunk is
    /// smaller than storing the bytes.
    fn emit_chunk(&mut self) -> Chunk {
        let len = self.encoder.pending();
        let raw = self.encoder.pending_bytes().to_vec();

        if self.need_state_reset {
            self.encoder.reset_state();
        }

        let reset = if self.need_dict_reset {
            StateReset::All
        } else if self.need_props {
            StateReset::StateProps
        } else if self.need_state_reset {
            StateReset::State
        } else {
            StateReset::None
        };
        let limit = (len + COPY_HEADER_LEN)
            .saturating_sub(lzma_header_len(reset) + 1)
            .min(COMPRESSED_MAX);

        let chunk = match self.encoder.encode_chunk(len, limit) {
            Some(payload) => {
                self.need_dict_reset = false;
                self.need_props = false;
                self.need_state_reset = false;
                Chunk::Lzma {
                    reset,
                    props: self.props,
                    uncompressed_len: len,
                    payload,
                }
            }
            None => {
                // The decoder never sees these tokens, so the next LZMA chunk restarts the coder.
                let chunk = Chunk::Uncompressed {
                    dict_reset: self.need_dict_reset,
                    data: raw,
                };
                self.need_dict_reset = false;
                self.need_state_reset = true;
                chunk
            }
        };
        if chunk.is_compressed() {
            self.stats.compressed += 1;
        } else {
            self.stats.uncompressed += 1;
        }

        log::debug!(
            "lzma2 chunk 0x{:02X}: {} -> {} bytes",
            chunk.control_byte(),
            len,
            chunk.encoded_len()
        );
        chunk
    }
}
