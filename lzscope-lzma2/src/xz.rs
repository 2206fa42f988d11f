//! XZ container around an LZMA2 stream.
//!
//! Based on the XZ file format specification:
//! <https://tukaani.org/xz/xz-file-format.txt>
//!
//! The writer streams: it emits the stream header, then a single block
//! whose header carries no size fields, the LZMA2 data as it is produced,
//! and finally the block check, index and footer. Empty input produces a
//! stream without blocks.

use crate::decoder::Lzma2Decoder;
use lzscope_core::crc::{Crc32, Crc64};
use lzscope_core::error::{LzScopeError, Result};

/// XZ magic bytes: 0xFD, '7', 'z', 'X', 'Z', 0x00
pub const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];

/// XZ footer magic bytes: 'Y', 'Z'
pub const XZ_FOOTER_MAGIC: [u8; 2] = [0x59, 0x5A];

/// LZMA2 filter ID.
pub const FILTER_LZMA2: u64 = 0x21;

/// Stream header and footer size.
const STREAM_HEADER_LEN: usize = 12;

/// Size of the block header this writer produces.
const BLOCK_HEADER_LEN: usize = 12;

/// Largest dictionary property byte.
const DICT_PROPS_MAX: u8 = 40;

/// Integrity check stored after each block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CheckType {
    /// No check.
    None = 0x00,
    /// CRC-32.
    Crc32 = 0x01,
    /// CRC-64.
    #[default]
    Crc64 = 0x04,
}

impl CheckType {
    /// Create from check ID.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Crc32),
            0x04 => Some(Self::Crc64),
            _ => None,
        }
    }

    /// Size of the check in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Crc32 => 4,
            Self::Crc64 => 8,
        }
    }

    /// Short name.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Crc32 => "crc32",
            Self::Crc64 => "crc64",
        }
    }

    /// Stream flags bytes.
    fn flags(self) -> [u8; 2] {
        [0x00, self as u8]
    }
}

/// Running block check.
#[derive(Debug, Clone)]
enum Check {
    None,
    Crc32(Crc32),
    Crc64(Crc64),
}

impl Check {
    fn new(check: CheckType) -> Self {
        match check {
            CheckType::None => Self::None,
            CheckType::Crc32 => Self::Crc32(Crc32::new()),
            CheckType::Crc64 => Self::Crc64(Crc64::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::None => {}
            Self::Crc32(crc) => crc.update(data),
            Self::Crc64(crc) => crc.update(data),
        }
    }

    /// Little-endian check value.
    fn finish(&self) -> Vec<u8> {
        match self {
            Self::None => Vec::new(),
            Self::Crc32(crc) => crc.finalize().to_le_bytes().to_vec(),
            Self::Crc64(crc) => crc.finalize().to_le_bytes().to_vec(),
        }
    }
}

/// Get dictionary size from LZMA2 properties byte.
///
/// Formula: `(2 | (props & 1)) << (props / 2 + 11)`, with 40 meaning
/// `u32::MAX`.
pub fn dict_size_from_props(props: u8) -> Option<u32> {
    match props {
        0..=39 => Some((2 | (props as u32 & 1)) << (props / 2 + 11)),
        DICT_PROPS_MAX => Some(u32::MAX),
        _ => None,
    }
}

/// Smallest LZMA2 properties byte whose dictionary holds `dict_size`.
pub fn props_from_dict_size(dict_size: u32) -> u8 {
    (0..DICT_PROPS_MAX)
        .find(|&props| dict_size_from_props(props).is_some_and(|size| size >= dict_size))
        .unwrap_or(DICT_PROPS_MAX)
}

/// Append an XZ variable-length integer.
fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Read an XZ variable-length integer.
fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64> {
    let mut result = 0u64;
    for i in 0..9 {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| LzScopeError::unexpected_eof(1))?;
        *pos += 1;
        result |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            if byte == 0 && i > 0 {
                return Err(LzScopeError::corrupted(*pos as u64, "non-minimal integer"));
            }
            return Ok(result);
        }
    }
    Err(LzScopeError::corrupted(*pos as u64, "integer too long"))
}

/// Zero bytes needed to align `len` to four.
fn padding(len: u64) -> usize {
    ((4 - len % 4) % 4) as usize
}

/// Streaming XZ framing for one LZMA2 stream.
#[derive(Debug, Clone)]
pub struct XzStreamWriter {
    check_type: CheckType,
    dict_props: u8,
    check: Check,
    header_written: bool,
    block_open: bool,
    finished: bool,
    /// LZMA2 bytes written into the block.
    block_data: u64,
    /// Input bytes covered by the block.
    uncompressed: u64,
}

impl XzStreamWriter {
    /// Create a writer for an LZMA2 stream with the given dictionary.
    pub fn new(check_type: CheckType, dict_size: u32) -> Self {
        Self {
            check_type,
            dict_props: props_from_dict_size(dict_size),
            check: Check::new(check_type),
            header_written: false,
            block_open: false,
            finished: false,
            block_data: 0,
            uncompressed: 0,
        }
    }

    /// The check type in use.
    pub fn check_type(&self) -> CheckType {
        self.check_type
    }

    /// Frame newly produced LZMA2 bytes for `input`.
    pub fn write(&mut self, input: &[u8], lzma2: &[u8], out: &mut Vec<u8>) {
        self.write_stream_header(out);
        self.check.update(input);
        self.uncompressed += input.len() as u64;
        if !lzma2.is_empty() {
            self.open_block(out);
            self.block_data += lzma2.len() as u64;
            out.extend_from_slice(lzma2);
        }
    }

    /// Frame the final LZMA2 bytes (end marker included) and close the stream.
    pub fn finish(&mut self, input: &[u8], lzma2_tail: &[u8], out: &mut Vec<u8>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.write_stream_header(out);
        self.check.update(input);
        self.uncompressed += input.len() as u64;

        // A stream holding only the end marker needs no block.
        if self.block_open || lzma2_tail.len() > 1 {
            self.open_block(out);
            self.block_data += lzma2_tail.len() as u64;
            out.extend_from_slice(lzma2_tail);
            out.resize(out.len() + padding(self.block_data), 0);
            out.extend_from_slice(&self.check.finish());
        }

        let index_len = self.write_index(out);
        self.write_footer(index_len, out);
    }

    fn write_stream_header(&mut self, out: &mut Vec<u8>) {
        if self.header_written {
            return;
        }
        self.header_written = true;
        let flags = self.check_type.flags();
        out.extend_from_slice(&XZ_MAGIC);
        out.extend_from_slice(&flags);
        out.extend_from_slice(&Crc32::compute(&flags).to_le_bytes());
    }

    fn open_block(&mut self, out: &mut Vec<u8>) {
        if self.block_open {
            return;
        }
        self.block_open = true;
        let header = [
            (BLOCK_HEADER_LEN / 4 - 1) as u8,
            0x00, // one filter, no sizes
            FILTER_LZMA2 as u8,
            0x01,
            self.dict_props,
            0x00,
            0x00,
            0x00,
        ];
        out.extend_from_slice(&header);
        out.extend_from_slice(&Crc32::compute(&header).to_le_bytes());
    }

    /// Write the index, returning its size.
    fn write_index(&self, out: &mut Vec<u8>) -> usize {
        let mut index = vec![0x00];
        if self.block_open {
            write_varint(&mut index, 1);
            let unpadded = (BLOCK_HEADER_LEN + self.check_type.size()) as u64 + self.block_data;
            write_varint(&mut index, unpadded);
            write_varint(&mut index, self.uncompressed);
        } else {
            write_varint(&mut index, 0);
        }
        index.resize(index.len() + padding(index.len() as u64), 0);
        let crc = Crc32::compute(&index);
        index.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&index);
        index.len()
    }

    fn write_footer(&self, index_len: usize, out: &mut Vec<u8>) {
        let mut body = [0u8; 6];
        body[..4].copy_from_slice(&((index_len / 4 - 1) as u32).to_le_bytes());
        body[4..].copy_from_slice(&self.check_type.flags());
        out.extend_from_slice(&Crc32::compute(&body).to_le_bytes());
        out.extend_from_slice(&body);
        out.extend_from_slice(&XZ_FOOTER_MAGIC);
    }
}

/// Parse stream flags.
fn parse_flags(flags: &[u8]) -> Result<CheckType> {
    if flags[0] != 0 || flags[1] & 0xF0 != 0 {
        return Err(LzScopeError::invalid_header("reserved XZ stream flag bits are set"));
    }
    CheckType::from_id(flags[1]).ok_or_else(|| {
        LzScopeError::invalid_header(format!("unsupported XZ check type {}", flags[1]))
    })
}

fn verify_crc32(data: &[u8], stored: &[u8]) -> Result<()> {
    let expected = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
    let computed = Crc32::compute(data);
    if expected != computed {
        return Err(LzScopeError::checksum_mismatch(
            u64::from(expected),
            u64::from(computed),
        ));
    }
    Ok(())
}

fn need(data: &[u8], pos: usize, len: usize) -> Result<()> {
    if data.len() < pos + len {
        return Err(LzScopeError::unexpected_eof(pos + len - data.len()));
    }
    Ok(())
}

/// Parse a block header, returning its length and the dictionary size.
fn parse_block_header(data: &[u8], start: usize) -> Result<(usize, u32, Option<u64>)> {
    let header_len = (data[start] as usize + 1) * 4;
    need(data, start, header_len)?;
    let header = &data[start..start + header_len];
    verify_crc32(&header[..header_len - 4], &header[header_len - 4..])?;

    let flags = header[1];
    if flags & 0x3C != 0 {
        return Err(LzScopeError::invalid_header("reserved block flag bits are set"));
    }
    if flags & 0x03 != 0 {
        return Err(LzScopeError::invalid_header("only a single LZMA2 filter is supported"));
    }

    let body = &header[..header_len - 4];
    let mut pos = 2;
    let compressed_size = if flags & 0x40 != 0 {
        Some(read_varint(body, &mut pos)?)
    } else {
        None
    };
    if flags & 0x80 != 0 {
        read_varint(body, &mut pos)?;
    }

    let filter = read_varint(body, &mut pos)?;
    if filter != FILTER_LZMA2 {
        return Err(LzScopeError::invalid_header(format!(
            "unsupported filter 0x{:02X}",
            filter
        )));
    }
    if read_varint(body, &mut pos)? != 1 {
        return Err(LzScopeError::invalid_header("LZMA2 filter properties must be one byte"));
    }
    let props = *body
        .get(pos)
        .ok_or_else(|| LzScopeError::invalid_header("truncated filter properties"))?;
    let dict_size = dict_size_from_props(props).ok_or_else(|| {
        LzScopeError::invalid_header(format!("invalid dictionary property {}", props))
    })?;
    if body[pos + 1..].iter().any(|&b| b != 0) {
        return Err(LzScopeError::invalid_header("non-zero block header padding"));
    }

    Ok((header_len, dict_size, compressed_size))
}

/// Decode a single XZ stream.
pub fn decompress_xz(data: &[u8]) -> Result<Vec<u8>> {
    need(data, 0, STREAM_HEADER_LEN)?;
    if data[..6] != XZ_MAGIC {
        return Err(LzScopeError::invalid_magic(&XZ_MAGIC[..], &data[..6]));
    }
    let check_type = parse_flags(&data[6..8])?;
    verify_crc32(&data[6..8], &data[8..12])?;

    let mut output = Vec::new();
    let mut records = Vec::new();
    let mut pos = STREAM_HEADER_LEN;

    loop {
        need(data, pos, 1)?;
        if data[pos] == 0x00 {
            break;
        }
        let block_start = pos;
        let (header_len, dict_size, compressed_size) = parse_block_header(data, pos)?;
        pos += header_len;

        let mut decoder = Lzma2Decoder::new(dict_size)?;
        let (block, consumed) = decoder.decode(&data[pos..])?;
        if !decoder.is_finished() {
            return Err(LzScopeError::unexpected_eof(1));
        }
        if compressed_size.is_some_and(|size| size != consumed as u64) {
            return Err(LzScopeError::corrupted(
                pos as u64,
                "block size does not match its header",
            ));
        }
        pos += consumed;

        let pad = padding((pos - block_start) as u64);
        need(data, pos, pad + check_type.size())?;
        if data[pos..pos + pad].iter().any(|&b| b != 0) {
            return Err(LzScopeError::corrupted(pos as u64, "non-zero block padding"));
        }
        pos += pad;

        let mut check = Check::new(check_type);
        check.update(&block);
        let stored = &data[pos..pos + check_type.size()];
        let computed = check.finish();
        if stored != computed.as_slice() {
            let mut expected = [0u8; 8];
            let mut actual = [0u8; 8];
            expected[..stored.len()].copy_from_slice(stored);
            actual[..computed.len()].copy_from_slice(&computed);
            return Err(LzScopeError::checksum_mismatch(
                u64::from_le_bytes(expected),
                u64::from_le_bytes(actual),
            ));
        }
        pos += check_type.size();

        let unpadded = (pos - block_start - pad) as u64;
        records.push((unpadded, block.len() as u64));
        log::debug!(
            "xz block: {} bytes -> {} bytes",
            pos - block_start,
            block.len()
        );
        output.extend_from_slice(&block);
    }

    let index_start = pos;
    pos += 1;
    let count = read_varint(data, &mut pos)?;
    if count != records.len() as u64 {
        return Err(LzScopeError::corrupted(
            index_start as u64,
            "index record count does not match the blocks",
        ));
    }
    for &(unpadded, uncompressed) in &records {
        if read_varint(data, &mut pos)? != unpadded || read_varint(data, &mut pos)? != uncompressed
        {
            return Err(LzScopeError::corrupted(
                index_start as u64,
                "index record does not match its block",
            ));
        }
    }
    let pad = padding((pos - index_start) as u64);
    need(data, pos, pad + 4)?;
    if data[pos..pos + pad].iter().any(|&b| b != 0) {
        return Err(LzScopeError::corrupted(pos as u64, "non-zero index padding"));
    }
    pos += pad;
    verify_crc32(&data[index_start..pos], &data[pos..pos + 4])?;
    pos += 4;
    let index_len = pos - index_start;

    need(data, pos, STREAM_HEADER_LEN)?;
    let footer = &data[pos..pos + STREAM_HEADER_LEN];
    if footer[10..] != XZ_FOOTER_MAGIC {
        return Err(LzScopeError::invalid_magic(&XZ_FOOTER_MAGIC[..], &footer[10..]));
    }
    verify_crc32(&footer[4..10], &footer[..4])?;
    let backward = u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]) as usize;
    if (backward + 1) * 4 != index_len {
        return Err(LzScopeError::corrupted(pos as u64, "backward size does not match the index"));
    }
    if parse_flags(&footer[8..10])? != check_type {
        return Err(LzScopeError::invalid_header("stream flags in footer don't match header"));
    }

    let trailing = &data[pos + STREAM_HEADER_LEN..];
    if trailing.iter().any(|&b| b != 0) || trailing.len() % 4 != 0 {
        return Err(LzScopeError::corrupted(
            (pos + STREAM_HEADER_LEN) as u64,
            "unexpected data after the stream",
        ));
    }

    Ok(output)
}
