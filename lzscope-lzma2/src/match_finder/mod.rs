//! Match finding over the encoder's history buffer.
//!
//! [`MatchFinder`] owns the bytes the encoder still needs: at least the
//! last `dict_size` bytes before the current position plus the chunk being
//! encoded. Candidate lookup is delegated to a [`SearchStrategy`]:
//!
//! - [`HashChain`]: HC3/HC4, a hash table of chain heads plus a cyclic
//!   array linking each position to the previous one with the same hash.
//! - [`BinaryTree`]: BT2/BT3/BT4, one binary search tree per hash bucket,
//!   stored as pairs of child links in a cyclic array.
//!
//! Strategies store positions as `buffer index + 1` (0 = empty) and are
//! rebased when the buffer slides. Cyclic slots are addressed by stream
//! position, which is stable across slides.

mod binary_tree;
mod hash_chain;

pub use binary_tree::BinaryTree;
pub use hash_chain::HashChain;

use crate::lzma2::CHUNK_SIZE;
use crate::params::{MatchFinderKind, Mode, ParameterSet};
use std::fmt;

/// Empty slot marker in hash and link tables.
pub(crate) const EMPTY: u32 = 0;

/// Candidate lengths kept per position in fast mode.
pub const FAST_MAX_CANDIDATES: usize = 4;

/// Upper bound on the bytes dropped in one slide.
const SLIDE_STEP_MAX: usize = 256 << 20;

/// A back-reference candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Distance back from the current position (1 = previous byte).
    pub distance: u32,
    /// Number of matching bytes.
    pub length: u32,
}

impl Match {
    /// Create a match.
    pub fn new(distance: usize, length: usize) -> Self {
        Self {
            distance: distance as u32,
            length: length as u32,
        }
    }
}

/// Search state at one position, handed to a [`SearchStrategy`].
#[derive(Debug, Clone, Copy)]
pub struct SearchCursor<'a> {
    /// History buffer.
    pub buf: &'a [u8],
    /// Buffer index of the position being searched.
    pub pos: usize,
    /// Stream position since the last dictionary reset.
    pub abs: u64,
    /// Bytes from `pos` to the end of the current chunk.
    pub avail: usize,
    /// Largest distance that may be reported.
    pub dict_size: usize,
    /// Length at which searching stops.
    pub nice_len: usize,
    /// Maximum candidates examined.
    pub depth: u32,
    /// Maximum candidate lengths reported.
    pub max_candidates: usize,
}

/// Candidate lookup strategy.
///
/// `find` and `skip` must be called for consecutive positions; both index
/// the current position so later searches can reach it.
pub trait SearchStrategy: fmt::Debug + Send {
    /// Index the position and append candidates of strictly increasing length.
    fn find(&mut self, cursor: &SearchCursor<'_>, matches: &mut Vec<Match>);

    /// Index the position without reporting candidates.
    fn skip(&mut self, cursor: &SearchCursor<'_>);

    /// Rebase stored positions after `amount` bytes were dropped from the buffer.
    fn shift(&mut self, amount: usize);

    /// Forget every indexed position.
    fn clear(&mut self);
}

/// Length of the common prefix of `buf[a..]` and `buf[b..]`, capped at `limit`.
#[inline]
pub fn common_prefix(buf: &[u8], a: usize, b: usize, limit: usize) -> usize {
    let mut len = 0;
    while len < limit && buf[a + len] == buf[b + len] {
        len += 1;
    }
    len
}

/// Cyclic slot of a stream position.
#[inline]
pub(crate) fn cyclic_slot(abs: u64, cyclic_size: usize) -> usize {
    (abs % cyclic_size as u64) as usize
}

/// Subtract `amount` from every stored position, emptying those that fall off.
pub(crate) fn rebase(table: &mut [u32], amount: usize) {
    let amount = amount as u32;
    for value in table.iter_mut() {
        *value = value.saturating_sub(amount);
    }
}

/// Hash table size (log2) for a hash width and dictionary size.
pub(crate) fn hash_bits(hash_bytes: usize, dict_size: usize) -> u32 {
    if hash_bytes == 2 {
        return 16;
    }
    let dict_bits = usize::BITS - (dict_size.max(2) - 1).leading_zeros();
    dict_bits.saturating_sub(1).clamp(16, 20)
}

/// Hash the first `hash_bytes` bytes of `data`.
#[inline]
pub(crate) fn hash_bytes(data: &[u8], hash_bytes: usize, mask: usize) -> usize {
    if hash_bytes == 2 {
        return data[0] as usize | (data[1] as usize) << 8;
    }
    // FNV-1a
    let mut h = 2_166_136_261u32;
    for &byte in &data[..hash_bytes] {
        h ^= byte as u32;
        h = h.wrapping_mul(16_777_619);
    }
    (h as usize) & mask
}

/// Match finder bound to one compression session.
#[derive(Debug)]
pub struct MatchFinder {
    kind: MatchFinderKind,
    strategy: Box<dyn SearchStrategy>,
    /// History plus unencoded input.
    buf: Vec<u8>,
    /// Stream position of `buf[0]`.
    base: u64,
    /// Buffer index of the next position to index.
    next: usize,
    dict_size: usize,
    nice_len: usize,
    depth: u32,
    max_candidates: usize,
    slide_step: usize,
}

impl MatchFinder {
    /// Create a match finder for validated parameters.
    pub fn new(params: &ParameterSet) -> Self {
        let dict_size = params.dict_size as usize;
        let kind = params.match_finder;
        let strategy: Box<dyn SearchStrategy> = if kind.is_binary_tree() {
            Box::new(BinaryTree::new(kind.hash_bytes(), dict_size))
        } else {
            Box::new(HashChain::new(kind.hash_bytes(), dict_size))
        };
        let max_candidates = match params.mode {
            Mode::Fast => FAST_MAX_CANDIDATES,
            Mode::Normal => usize::MAX,
        };

        Self {
            kind,
            strategy,
            buf: Vec::new(),
            base: 0,
            next: 0,
            dict_size,
            nice_len: params.effective_nice_len(),
            depth: params.effective_depth().max(1),
            max_candidates,
            slide_step: dict_size.clamp(CHUNK_SIZE, SLIDE_STEP_MAX),
        }
    }

    /// The strategy in use.
    pub fn kind(&self) -> MatchFinderKind {
        self.kind
    }

    /// Add input after the buffered bytes.
    pub fn append(&mut self, data: &[u8]) {
        self.slide();
        self.buf.extend_from_slice(data);
    }

    /// Buffer contents (history and unencoded input).
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Buffer index of the next position to search.
    pub fn index(&self) -> usize {
        self.next
    }

    /// Stream position of a buffer index, counted from the last dictionary reset.
    pub fn stream_position(&self, index: usize) -> u64 {
        self.base + index as u64
    }

    /// Bytes appended but not yet searched.
    pub fn pending(&self) -> usize {
        self.buf.len() - self.next
    }

    /// Largest distance a match may use.
    pub fn dict_size(&self) -> usize {
        self.dict_size
    }

    /// Collect candidates at the next position and advance past it.
    ///
    /// `end` is the buffer index no match may reach beyond. Lengths in
    /// `matches` strictly increase, so the last entry is the best one and
    /// each length is reported at its smallest distance.
    pub fn find_matches(&mut self, end: usize, matches: &mut Vec<Match>) {
        debug_assert!(self.next < end && end <= self.buf.len());
        matches.clear();
        let cursor = SearchCursor {
            buf: &self.buf,
            pos: self.next,
            abs: self.base + self.next as u64,
            avail: end - self.next,
            dict_size: self.dict_size,
            nice_len: self.nice_len,
            depth: self.depth,
            max_candidates: self.max_candidates,
        };
        self.strategy.find(&cursor, matches);
        self.next += 1;
    }

    /// Longest match at the next position, advancing past it.
    pub fn find_best_match(&mut self, end: usize) -> Option<Match> {
        let mut matches = Vec::new();
        self.find_matches(end, &mut matches);
        matches.last().copied()
    }

    /// Index `count` positions without searching them.
    pub fn skip(&mut self, count: usize, end: usize) {
        for _ in 0..count {
            debug_assert!(self.next < end && end <= self.buf.len());
            let cursor = SearchCursor {
                buf: &self.buf,
                pos: self.next,
                abs: self.base + self.next as u64,
                avail: end - self.next,
                dict_size: self.dict_size,
                nice_len: self.nice_len,
                depth: self.depth,
                max_candidates: self.max_candidates,
            };
            self.strategy.skip(&cursor);
            self.next += 1;
        }
    }

    /// Drop all history; the next position becomes stream position 0.
    pub fn reset(&mut self) {
        self.buf.drain(..self.next);
        self.next = 0;
        self.base = 0;
        self.strategy.clear();
    }

    /// Drop bytes that can no longer be referenced.
    fn slide(&mut self) {
        let drop = self.next.saturating_sub(self.dict_size);
        if drop < self.slide_step {
            return;
        }
        self.buf.drain(..drop);
        self.next -= drop;
        self.base += drop as u64;
        self.strategy.shift(drop);
        log::trace!(
            "match finder slid {} bytes, {} bytes of history kept",
            drop,
            self.next
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder(kind: MatchFinderKind, mode: Mode) -> MatchFinder {
        let params = ParameterSet::default()
            .dict_size(4096)
            .match_finder(kind)
            .mode(mode)
            .nice_len(273);
        MatchFinder::new(&params)
    }

    #[test]
    fn test_common_prefix() {
        let buf = b"abcdabcx";
        assert_eq!(common_prefix(buf, 0, 4, 4), 3);
        assert_eq!(common_prefix(buf, 0, 4, 2), 2);
    }

    #[test]
    fn test_hash_bits() {
        assert_eq!(hash_bits(2, 1 << 26), 16);
        assert_eq!(hash_bits(4, 4096), 16);
        assert_eq!(hash_bits(4, 1 << 18), 17);
        assert_eq!(hash_bits(3, 1 << 26), 20);
    }

    #[test]
    fn test_rebase() {
        let mut table = [0u32, 5, 10, 11];
        rebase(&mut table, 10);
        assert_eq!(table, [0, 0, 0, 1]);
    }

    #[test]
    fn test_finds_repeat_every_kind() {
        for kind in MatchFinderKind::ALL {
            let mut mf = finder(kind, Mode::Normal);
            mf.append(b"abcdefgh_abcdefgh");
            let end = mf.buffer().len();
            mf.skip(9, end);
            let best = mf.find_best_match(end).unwrap();
            assert_eq!(best, Match { distance: 9, length: 8 }, "{:?}", kind);
        }
    }

    #[test]
    fn test_increasing_lengths_prefer_near() {
        for kind in MatchFinderKind::ALL {
            let mut mf = finder(kind, Mode::Normal);
            // "abcX" at 0, "abcd" at 4, "abcd" at 8, probe at 12.
            mf.append(b"abcXabcdabcdabcd");
            let end = mf.buffer().len();
            mf.skip(12, end);
            let mut matches = Vec::new();
            mf.find_matches(end, &mut matches);
            let best = *matches.last().unwrap();
            assert_eq!(best.length, 4, "{:?}", kind);
            assert_eq!(best.distance, 4, "{:?}", kind);
            assert!(matches.windows(2).all(|w| w[0].length < w[1].length));
        }
    }

    #[test]
    fn test_respects_chunk_end() {
        let mut mf = finder(MatchFinderKind::Hc4, Mode::Normal);
        mf.append(b"0123456789012345678901234567890123456789");
        mf.skip(10, 40);
        let best = mf.find_best_match(15).unwrap();
        assert_eq!(best.distance, 10);
        assert_eq!(best.length, 5);
    }

    #[test]
    fn test_distance_limited_by_dictionary() {
        for kind in MatchFinderKind::ALL {
            let mut mf = finder(kind, Mode::Normal);
            let mut data = b"WXYZ".to_vec();
            data.extend_from_slice(&[b'.'; 4096]);
            data.extend_from_slice(b"WXYZ");
            mf.append(&data);
            let end = data.len();
            mf.skip(data.len() - 4, end);
            // "WXYZ" is 4100 bytes back, beyond the 4096-byte dictionary.
            let best = mf.find_best_match(end);
            assert!(best.is_none(), "{:?} reported {:?}", kind, best);
        }
    }

    #[test]
    fn test_fast_mode_caps_candidates() {
        let mut mf = finder(MatchFinderKind::Hc4, Mode::Fast);
        let mut data = Vec::new();
        for len in 4..12 {
            data.extend_from_slice(&b"abcdefghijklmnop"[..len]);
            data.push(b'#');
        }
        data.extend_from_slice(b"abcdefghijklmnop");
        mf.append(&data);
        let end = data.len();
        mf.skip(data.len() - 16, end);
        let mut matches = Vec::new();
        mf.find_matches(end, &mut matches);
        assert!(matches.len() <= FAST_MAX_CANDIDATES);
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut mf = finder(MatchFinderKind::Bt4, Mode::Normal);
        mf.append(b"hello hello");
        mf.skip(6, 11);
        mf.reset();
        assert_eq!(mf.index(), 0);
        assert_eq!(mf.stream_position(0), 0);
        mf.append(b"hello");
        let end = mf.buffer().len();
        assert!(mf.find_best_match(end).is_none());
    }

    #[test]
    fn test_slide_keeps_matches() {
        let params = ParameterSet::default()
            .dict_size(1 << 17)
            .match_finder(MatchFinderKind::Hc4);
        let mut mf = MatchFinder::new(&params);
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let block: Vec<u8> = (0..CHUNK_SIZE)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                (state >> 33) as u8
            })
            .collect();
        for _ in 0..5 {
            mf.append(&block);
            let end = mf.buffer().len();
            let todo = mf.pending();
            mf.skip(todo, end);
        }
        assert!(mf.index() < 5 * CHUNK_SIZE);
        assert_eq!(mf.stream_position(mf.index()), 5 * CHUNK_SIZE as u64);

        mf.append(&block[..64]);
        let end = mf.buffer().len();
        let best = mf.find_best_match(end).unwrap();
        assert_eq!(best, Match::new(CHUNK_SIZE, 64));
    }
}
