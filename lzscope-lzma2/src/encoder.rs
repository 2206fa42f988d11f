//! LZMA token encoding and parsing.
//!
//! [`TokenEncoder`] codes one token at a time through the range encoder
//! and tracks the coder state (state machine, repeated distances,
//! probabilities). [`LzmaEncoder`] drives it: it asks the match finder for
//! candidates, picks tokens, and produces one compressed payload per chunk.
//!
//! ## Parsing
//!
//! - `Fast`: greedy. The finder reports at most a few candidate lengths and
//!   the longest worthwhile one is taken.
//! - `Normal`: one step of lazy matching. Before committing to a match the
//!   next position is searched too; if it offers a longer match, a literal
//!   is emitted instead and the longer match is considered next.
//!
//! Both modes prefer a repeated distance when it is about as long as the
//! best new match, since it codes much more cheaply.

use crate::match_finder::{Match, MatchFinder, common_prefix};
use crate::model::{
    DIST_ALIGN_BITS, DIST_SLOT_BITS, END_POS_MODEL_INDEX, LEN_HIGH_BITS, LEN_LOW_BITS,
    LEN_LOW_SYMBOLS, LEN_MID_BITS, LEN_MID_SYMBOLS, LITERAL_CODER_SIZE, LengthModel, LzmaModel,
    LzmaProperties, MATCH_LEN_MAX, MATCH_LEN_MIN, REPS, State, dist_slot, dist_state,
    special_offset,
};
use crate::params::{Mode, ParameterSet};
use crate::range_coder::RangeEncoder;

/// One LZMA coding decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A single byte coded on its own.
    Literal(u8),
    /// Copy `length` bytes starting `distance` bytes back.
    Match {
        /// Distance back (1 = previous byte).
        distance: u32,
        /// Number of bytes copied (2..=273).
        length: u32,
    },
    /// Copy `length` bytes from the `index`-th most recent distance.
    Rep {
        /// Index into the recent distances (0..=3).
        index: usize,
        /// Number of bytes copied (2..=273).
        length: u32,
    },
    /// Copy one byte from the most recent distance.
    ShortRep,
}

impl Token {
    /// Number of uncompressed bytes the token stands for.
    pub fn uncompressed_len(&self) -> usize {
        match *self {
            Self::Literal(_) | Self::ShortRep => 1,
            Self::Match { length, .. } | Self::Rep { length, .. } => length as usize,
        }
    }
}

/// Position-dependent context a token is coded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeContext {
    /// Stream position since the last dictionary reset.
    pub position: u64,
    /// Byte before `position` (0 right after a dictionary reset).
    pub prev_byte: u8,
    /// Byte at the most recent distance; only read after a match.
    pub match_byte: u8,
}

/// Encode a length.
fn encode_length(rc: &mut RangeEncoder, len_model: &mut LengthModel, len: u32, pos_state: usize) {
    let len = len - MATCH_LEN_MIN as u32;

    if len < LEN_LOW_SYMBOLS as u32 {
        rc.encode_bit(&mut len_model.choice, 0);
        rc.encode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS, len);
    } else if len < (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32 {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 0);
        rc.encode_bit_tree(
            &mut len_model.mid[pos_state],
            LEN_MID_BITS,
            len - LEN_LOW_SYMBOLS as u32,
        );
    } else {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 1);
        rc.encode_bit_tree(
            &mut len_model.high,
            LEN_HIGH_BITS,
            len - (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32,
        );
    }
}

/// Encode a zero-based distance.
fn encode_distance(rc: &mut RangeEncoder, model: &mut LzmaModel, dist: u32, len: u32) {
    let slot = dist_slot(dist);
    rc.encode_bit_tree(
        &mut model.distance.slot[dist_state(len)],
        DIST_SLOT_BITS,
        slot,
    );

    if slot < 4 {
        return;
    }

    let num_direct_bits = (slot >> 1) - 1;
    let base = (2 | (slot & 1)) << num_direct_bits;
    let reduced = dist - base;

    if slot < END_POS_MODEL_INDEX as u32 {
        let offset = special_offset(slot, base);
        let mut m = 1usize;
        for i in 0..num_direct_bits {
            let bit = (reduced >> i) & 1;
            rc.encode_bit(&mut model.distance.special[offset + m - 1], bit);
            m = (m << 1) | bit as usize;
        }
    } else {
        rc.encode_direct_bits(reduced >> DIST_ALIGN_BITS, num_direct_bits - DIST_ALIGN_BITS);
        rc.encode_bit_tree_reverse(
            &mut model.distance.align,
            DIST_ALIGN_BITS,
            reduced & ((1 << DIST_ALIGN_BITS) - 1),
        );
    }
}

/// Encode a literal without match context.
fn encode_literal_normal(rc: &mut RangeEncoder, probs: &mut [u16; LITERAL_CODER_SIZE], byte: u8) {
    let mut symbol = (byte as usize) | 0x100;
    let mut context = 1usize;

    while context < 0x100 {
        let bit = (symbol >> 7) & 1;
        symbol <<= 1;
        rc.encode_bit(&mut probs[context], bit as u32);
        context = (context << 1) | bit;
    }
}

/// Encode a literal using the byte at rep0 as context until the first mismatch.
fn encode_literal_matched(
    rc: &mut RangeEncoder,
    probs: &mut [u16; LITERAL_CODER_SIZE],
    byte: u8,
    match_byte: u8,
) {
    let mut symbol = (byte as usize) | 0x100;
    let mut match_symbol = (match_byte as usize) << 1;
    let mut context = 1usize;

    while context < 0x100 {
        let match_bit = (match_symbol >> 8) & 1;
        match_symbol <<= 1;
        let bit = (symbol >> 7) & 1;
        symbol <<= 1;

        rc.encode_bit(&mut probs[0x100 + (match_bit << 8) + context], bit as u32);
        context = (context << 1) | bit;

        if bit != match_bit {
            while context < 0x100 {
                let bit = (symbol >> 7) & 1;
                symbol <<= 1;
                rc.encode_bit(&mut probs[context], bit as u32);
                context = (context << 1) | bit;
            }
            break;
        }
    }
}

/// Token-level LZMA encoder.
#[derive(Debug)]
pub struct TokenEncoder {
    rc: RangeEncoder,
    model: LzmaModel,
    state: State,
    /// Recent distances, zero-based.
    reps: [u32; REPS],
}

impl TokenEncoder {
    /// Create an encoder with fresh state.
    pub fn new(props: LzmaProperties) -> Self {
        Self {
            rc: RangeEncoder::new(),
            model: LzmaModel::new(props),
            state: State::new(),
            reps: [0; REPS],
        }
    }

    /// Literal/position properties in use.
    pub fn properties(&self) -> LzmaProperties {
        self.model.props
    }

    /// Current state machine state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The `index`-th most recent distance (1-based).
    pub fn rep_distance(&self, index: usize) -> u32 {
        self.reps[index] + 1
    }

    /// Reset probabilities, state and recent distances.
    pub fn reset_state(&mut self) {
        self.model.reset();
        self.state = State::new();
        self.reps = [0; REPS];
    }

    /// Code one token.
    pub fn encode(&mut self, token: Token, ctx: &EncodeContext) {
        let pos_state = self.model.props.pos_state(ctx.position);
        let state = self.state.value();
        let rc = &mut self.rc;
        let model = &mut self.model;

        match token {
            Token::Literal(byte) => {
                rc.encode_bit(&mut model.is_match[state][pos_state], 0);
                let lit_state = model.props.literal_state(ctx.position, ctx.prev_byte);
                let probs = &mut model.literal[lit_state];
                if self.state.is_literal() {
                    encode_literal_normal(rc, probs, byte);
                } else {
                    encode_literal_matched(rc, probs, byte, ctx.match_byte);
                }
                self.state.update_literal();
            }
            Token::Match { distance, length } => {
                rc.encode_bit(&mut model.is_match[state][pos_state], 1);
                rc.encode_bit(&mut model.is_rep[state], 0);
                encode_length(rc, &mut model.match_len, length, pos_state);
                let dist = distance - 1;
                encode_distance(rc, model, dist, length);
                self.reps = [dist, self.reps[0], self.reps[1], self.reps[2]];
                self.state.update_match();
            }
            Token::ShortRep => {
                rc.encode_bit(&mut model.is_match[state][pos_state], 1);
                rc.encode_bit(&mut model.is_rep[state], 1);
                rc.encode_bit(&mut model.is_rep0[state], 0);
                rc.encode_bit(&mut model.is_rep0_long[state][pos_state], 0);
                self.state.update_short_rep();
            }
            Token::Rep { index, length } => {
                rc.encode_bit(&mut model.is_match[state][pos_state], 1);
                rc.encode_bit(&mut model.is_rep[state], 1);
                if index == 0 {
                    rc.encode_bit(&mut model.is_rep0[state], 0);
                    rc.encode_bit(&mut model.is_rep0_long[state][pos_state], 1);
                } else {
                    rc.encode_bit(&mut model.is_rep0[state], 1);
                    if index == 1 {
                        rc.encode_bit(&mut model.is_rep1[state], 0);
                    } else {
                        rc.encode_bit(&mut model.is_rep1[state], 1);
                        rc.encode_bit(&mut model.is_rep2[state], (index - 2) as u32);
                    }
                    let dist = self.reps[index];
                    for i in (1..=index).rev() {
                        self.reps[i] = self.reps[i - 1];
                    }
                    self.reps[0] = dist;
                }
                encode_length(rc, &mut model.rep_len, length, pos_state);
                self.state.update_long_rep();
            }
        }
    }

    /// Payload size if the chunk were finished now.
    pub fn pending_len(&self) -> usize {
        self.rc.pending_len()
    }

    /// Flush the range coder and return the chunk payload.
    ///
    /// Model state carries over to the next chunk; the range coder restarts.
    pub fn finish_chunk(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.rc).finish()
    }
}

/// Whether a match one byte longer is worth a much larger distance.
#[inline]
fn change_pair(small_dist: u32, big_dist: u32) -> bool {
    (big_dist >> 7) > small_dist
}

/// Stream encoder: match finding, parsing and token coding for one session.
#[derive(Debug)]
pub struct LzmaEncoder {
    tokens: TokenEncoder,
    finder: MatchFinder,
    mode: Mode,
    nice_len: usize,
    /// Candidates at the position being parsed.
    matches: Vec<Match>,
    /// Candidates at the following position (lazy matching).
    lookahead: Vec<Match>,
}

impl LzmaEncoder {
    /// Create an encoder for validated parameters.
    pub fn new(params: &ParameterSet) -> Self {
        Self {
            tokens: TokenEncoder::new(params.properties()),
            finder: MatchFinder::new(params),
            mode: params.mode,
            nice_len: params.effective_nice_len(),
            matches: Vec::new(),
            lookahead: Vec::new(),
        }
    }

    /// Buffer input for later chunks.
    pub fn append(&mut self, data: &[u8]) {
        self.finder.append(data);
    }

    /// Bytes buffered but not yet encoded.
    pub fn pending(&self) -> usize {
        self.finder.pending()
    }

    /// The unencoded bytes, in order.
    pub fn pending_bytes(&self) -> &[u8] {
        &self.finder.buffer()[self.finder.index()..]
    }

    /// Reset coder state (probabilities, state machine, recent distances).
    pub fn reset_state(&mut self) {
        self.tokens.reset_state();
    }

    /// Forget the dictionary; pending input is kept.
    pub fn reset_dictionary(&mut self) {
        self.finder.reset();
    }

    /// Encode the next `len` pending bytes as one chunk payload.
    ///
    /// Returns `None` once the payload would exceed `limit` bytes. The
    /// remaining bytes are still indexed, so the match finder ends up in
    /// the same state either way; the coder state is left unusable and
    /// must be reset before the next chunk.
    pub fn encode_chunk(&mut self, len: usize, limit: usize) -> Option<Vec<u8>> {
        debug_assert!(len > 0 && len <= self.pending());
        let start = self.finder.index();
        let end = start + len;
        let mut pos = start;
        let mut have_matches = false;

        while pos < end {
            if !have_matches {
                self.finder.find_matches(end, &mut self.matches);
            }
            have_matches = false;

            let mut token = self.choose(pos, end - pos);
            if self.mode == Mode::Normal {
                let len = token.uncompressed_len();
                if len >= MATCH_LEN_MIN && len < self.nice_len && pos + 1 < end {
                    self.finder.find_matches(end, &mut self.lookahead);
                    let next_len = self.lookahead.last().map_or(0, |m| m.length as usize);
                    if next_len > len {
                        std::mem::swap(&mut self.matches, &mut self.lookahead);
                        have_matches = true;
                        token = self.single_byte(pos);
                    }
                }
            }

            let ctx = self.context(pos);
            self.tokens.encode(token, &ctx);

            if self.tokens.pending_len() > limit {
                let indexed = self.finder.index();
                self.finder.skip(end - indexed, end);
                self.tokens.finish_chunk();
                return None;
            }

            let target = pos + token.uncompressed_len();
            let indexed = self.finder.index();
            if indexed < target {
                self.finder.skip(target - indexed, end);
            }
            pos = target;
        }

        let payload = self.tokens.finish_chunk();
        debug_assert!(payload.len() <= limit);
        Some(payload)
    }

    fn context(&self, pos: usize) -> EncodeContext {
        let buf = self.finder.buffer();
        let rep0 = self.tokens.rep_distance(0) as usize;
        EncodeContext {
            position: self.finder.stream_position(pos),
            prev_byte: if pos > 0 { buf[pos - 1] } else { 0 },
            match_byte: if rep0 <= pos { buf[pos - rep0] } else { 0 },
        }
    }

    /// Length of the match at a recent distance.
    fn rep_len(&self, pos: usize, limit: usize, index: usize) -> usize {
        let dist = self.tokens.rep_distance(index) as usize;
        if dist > pos || dist > self.finder.dict_size() {
            return 0;
        }
        common_prefix(self.finder.buffer(), pos - dist, pos, limit)
    }

    /// Literal or short rep for one byte.
    fn single_byte(&self, pos: usize) -> Token {
        let buf = self.finder.buffer();
        let rep0 = self.tokens.rep_distance(0) as usize;
        if rep0 <= pos && buf[pos - rep0] == buf[pos] {
            Token::ShortRep
        } else {
            Token::Literal(buf[pos])
        }
    }

    /// Pick a token for `pos` from the current candidates and recent distances.
    fn choose(&self, pos: usize, avail: usize) -> Token {
        if avail < MATCH_LEN_MIN {
            return self.single_byte(pos);
        }
        let limit = avail.min(MATCH_LEN_MAX);

        let mut rep_len = 0;
        let mut rep_index = 0;
        for index in 0..REPS {
            let len = self.rep_len(pos, limit, index);
            if len >= self.nice_len {
                return Token::Rep {
                    index,
                    length: len as u32,
                };
            }
            if len > rep_len {
                rep_len = len;
                rep_index = index;
            }
        }

        let mut main_len = 0usize;
        let mut main_dist = 0u32;
        if let Some(best) = self.matches.last() {
            main_len = best.length as usize;
            main_dist = best.distance;
            if main_len >= self.nice_len {
                return Token::Match {
                    distance: main_dist,
                    length: main_len as u32,
                };
            }

            // Step down to a one-byte-shorter match when it is much closer.
            let mut count = self.matches.len();
            while count > 1 {
                let shorter = self.matches[count - 2];
                if main_len != shorter.length as usize + 1
                    || !change_pair(shorter.distance, main_dist)
                {
                    break;
                }
                count -= 1;
                main_len = shorter.length as usize;
                main_dist = shorter.distance;
            }

            // A 2-byte match far away costs more than two literals.
            if main_len == MATCH_LEN_MIN && main_dist > 0x80 {
                main_len = 1;
            }
        }

        if rep_len >= MATCH_LEN_MIN
            && (rep_len + 1 >= main_len
                || (rep_len + 2 >= main_len && main_dist > (1 << 9))
                || (rep_len + 3 >= main_len && main_dist > (1 << 15)))
        {
            return Token::Rep {
                index: rep_index,
                length: rep_len as u32,
            };
        }

        if main_len >= MATCH_LEN_MIN {
            return Token::Match {
                distance: main_dist,
                length: main_len as u32,
            };
        }

        self.single_byte(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MatchFinderKind;

    #[test]
    fn test_token_lengths() {
        assert_eq!(Token::Literal(b'a').uncompressed_len(), 1);
        assert_eq!(Token::ShortRep.uncompressed_len(), 1);
        assert_eq!(
            Token::Match {
                distance: 5,
                length: 17
            }
            .uncompressed_len(),
            17
        );
        assert_eq!(Token::Rep { index: 2, length: 9 }.uncompressed_len(), 9);
    }

    #[test]
    fn test_rep_distance_rotation() {
        let mut enc = TokenEncoder::new(LzmaProperties::default());
        let ctx = EncodeContext::default();
        for distance in [10, 20, 30, 40] {
            enc.encode(
                Token::Match {
                    distance,
                    length: 2,
                },
                &ctx,
            );
        }
        assert_eq!(enc.rep_distance(0), 40);
        assert_eq!(enc.rep_distance(3), 10);

        enc.encode(Token::Rep { index: 2, length: 3 }, &ctx);
        assert_eq!(
            [0, 1, 2, 3].map(|i| enc.rep_distance(i)),
            [20, 40, 30, 10]
        );

        enc.encode(Token::Rep { index: 0, length: 3 }, &ctx);
        assert_eq!(enc.rep_distance(0), 20);
        assert!(!enc.state().is_literal());

        enc.reset_state();
        assert_eq!(enc.rep_distance(0), 1);
        assert!(enc.state().is_literal());
    }

    #[test]
    fn test_finish_chunk_restarts_coder() {
        let mut enc = TokenEncoder::new(LzmaProperties::default());
        enc.encode(Token::Literal(b'x'), &EncodeContext::default());
        let first = enc.finish_chunk();
        assert_eq!(first[0], 0x00);
        assert!(first.len() >= 5);
        let empty = enc.finish_chunk();
        assert_eq!(empty, vec![0u8; 5]);
    }

    #[test]
    fn test_repetitive_chunk_is_small() {
        let params = ParameterSet::default().dict_size(1 << 16);
        let mut enc = LzmaEncoder::new(&params);
        let data = vec![b'A'; 10_000];
        enc.append(&data);
        let payload = enc.encode_chunk(data.len(), usize::MAX).unwrap();
        assert!(payload.len() < 100, "payload {} bytes", payload.len());
        assert_eq!(enc.pending(), 0);
    }

    #[test]
    fn test_choose_prefers_rep() {
        let params = ParameterSet::default()
            .dict_size(1 << 16)
            .match_finder(MatchFinderKind::Hc4)
            .mode(Mode::Fast);
        let mut enc = LzmaEncoder::new(&params);
        enc.append(b"0123456789-0123456789-0123456789");
        let payload = enc.encode_chunk(32, usize::MAX).unwrap();
        assert!(payload.len() < 32);
    }

    #[test]
    fn test_encode_chunk_gives_up_past_limit() {
        let params = ParameterSet::default().dict_size(1 << 16);
        let mut enc = LzmaEncoder::new(&params);
        let mut state = 0x2545_F491u32;
        let noise: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        enc.append(&noise);
        assert!(enc.encode_chunk(noise.len(), 100).is_none());
        assert_eq!(enc.pending(), 0);

        // The abandoned bytes were indexed and can be matched.
        enc.reset_state();
        enc.append(&noise);
        let payload = enc.encode_chunk(noise.len(), usize::MAX).unwrap();
        assert!(payload.len() < 200, "payload {} bytes", payload.len());
    }

    #[test]
    fn test_pending_len_tracks_payload() {
        let mut enc = TokenEncoder::new(LzmaProperties::default());
        let ctx = EncodeContext::default();
        for byte in b"pending length" {
            enc.encode(Token::Literal(*byte), &ctx);
        }
        let bound = enc.pending_len();
        assert_eq!(enc.finish_chunk().len(), bound);
    }

    #[test]
    fn test_change_pair() {
        assert!(change_pair(1, 1 << 10));
        assert!(!change_pair(100, 1 << 10));
    }
}
