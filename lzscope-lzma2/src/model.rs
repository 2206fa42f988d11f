//! Adaptive probability tables and the coder state machine.
//!
//! One [`LzmaModel`] holds every probability an LZMA coder adapts: the
//! match/rep decision bits, literal coders, two length coders and the
//! distance trees. Encoder and decoder each own one and update it in
//! lockstep.

use crate::params::{LC_LP_MAX, PROP_BITS_MAX};
use crate::range_coder::PROB_INIT;

/// Position states with the largest `pb` (4).
pub const POS_STATES_MAX: usize = 16;

/// States of the coder state machine.
pub const NUM_STATES: usize = 12;

/// Tree depth of short lengths (2..=9).
pub const LEN_LOW_BITS: u32 = 3;
/// Tree depth of medium lengths (10..=17).
pub const LEN_MID_BITS: u32 = 3;
/// Tree depth of long lengths (18..=273).
pub const LEN_HIGH_BITS: u32 = 8;

/// Lengths coded by the low tree.
pub const LEN_LOW_SYMBOLS: usize = 1 << LEN_LOW_BITS;
/// Lengths coded by the mid tree.
pub const LEN_MID_SYMBOLS: usize = 1 << LEN_MID_BITS;
/// Lengths coded by the high tree.
pub const LEN_HIGH_SYMBOLS: usize = 1 << LEN_HIGH_BITS;

/// Shortest match.
pub const MATCH_LEN_MIN: usize = 2;

/// Longest match (273).
pub const MATCH_LEN_MAX: usize =
    MATCH_LEN_MIN + LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + LEN_HIGH_SYMBOLS - 1;

/// Match lengths distinguished when picking a slot tree (2, 3, 4, 5+).
pub const DIST_STATES: usize = 4;

/// Slot tree depth.
pub const DIST_SLOT_BITS: u32 = 6;

/// Slots per tree.
pub const DIST_SLOTS: usize = 1 << DIST_SLOT_BITS;

/// Low distance bits coded through the align tree.
pub const DIST_ALIGN_BITS: u32 = 4;

/// Align tree size.
pub const DIST_ALIGN_SIZE: usize = 1 << DIST_ALIGN_BITS;

/// Distances below this are coded entirely with probabilities.
pub const FULL_DISTANCES: usize = 128;

/// First distance slot coded with direct bits.
pub const END_POS_MODEL_INDEX: usize = 14;

/// Probabilities per literal coder: a plain tree and two matched trees.
pub const LITERAL_CODER_SIZE: usize = 0x300;

/// Repeated distances remembered.
pub const REPS: usize = 4;

/// Successor state after a literal.
const NEXT_LITERAL: [u8; NUM_STATES] = [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 4, 5];
/// Successor state after a new-distance match.
const NEXT_MATCH: [u8; NUM_STATES] = [7, 7, 7, 7, 7, 7, 7, 10, 10, 10, 10, 10];
/// Successor state after a repeated-distance match.
const NEXT_LONG_REP: [u8; NUM_STATES] = [8, 8, 8, 8, 8, 8, 8, 11, 11, 11, 11, 11];
/// Successor state after a one-byte rep0 copy.
const NEXT_SHORT_REP: [u8; NUM_STATES] = [9, 9, 9, 9, 9, 9, 9, 11, 11, 11, 11, 11];

/// Coder state: a summary of the last few token kinds.
///
/// States 0-6 follow a literal; 7-11 follow a match of some kind, after
/// which literals are coded against the byte at rep0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct State(u8);

impl State {
    /// The state after a reset.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Index into the per-state tables.
    pub fn value(self) -> usize {
        self.0 as usize
    }

    /// Whether the last token was a literal.
    pub fn is_literal(self) -> bool {
        self.0 < 7
    }

    /// Advance after a literal.
    pub fn update_literal(&mut self) {
        self.0 = NEXT_LITERAL[self.value()];
    }

    /// Advance after a match with a new distance.
    pub fn update_match(&mut self) {
        self.0 = NEXT_MATCH[self.value()];
    }

    /// Advance after a short rep.
    pub fn update_short_rep(&mut self) {
        self.0 = NEXT_SHORT_REP[self.value()];
    }

    /// Advance after a rep match.
    pub fn update_long_rep(&mut self) {
        self.0 = NEXT_LONG_REP[self.value()];
    }
}

/// The lc/lp/pb triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProperties {
    /// High bits of the previous byte used as literal context.
    pub lc: u32,
    /// Low position bits used as literal context.
    pub lp: u32,
    /// Low position bits used as match/length context.
    pub pb: u32,
}

impl LzmaProperties {
    /// Bundle lc, lp and pb.
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self { lc, lp, pb }
    }

    /// Decode `(pb * 5 + lp) * 9 + lc`, rejecting what LZMA2 forbids
    /// (`pb > 4` or `lc + lp > 4`).
    pub fn from_byte(byte: u8) -> Option<Self> {
        let mut rest = u32::from(byte);
        let lc = rest % 9;
        rest /= 9;
        let lp = rest % 5;
        let pb = rest / 5;
        (pb <= PROP_BITS_MAX && lc + lp <= LC_LP_MAX).then_some(Self { lc, lp, pb })
    }

    /// The properties byte.
    pub fn to_byte(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }

    /// Number of literal coders (`2^(lc + lp)`).
    pub fn num_lit_states(&self) -> usize {
        1 << (self.lc + self.lp)
    }

    /// Position state for the match and length contexts.
    #[inline]
    pub fn pos_state(&self, pos: u64) -> usize {
        (pos as usize) & ((1 << self.pb) - 1)
    }

    /// Literal coder for a position and the byte before it.
    #[inline]
    pub fn literal_state(&self, pos: u64, prev_byte: u8) -> usize {
        let low_pos = (pos as usize) & ((1 << self.lp) - 1);
        (low_pos << self.lc) | (usize::from(prev_byte) >> (8 - self.lc))
    }
}

impl Default for LzmaProperties {
    fn default() -> Self {
        Self::new(3, 0, 2)
    }
}

/// Probabilities of one length coder.
///
/// `choice` selects the low tree, otherwise `choice2` selects mid or high.
/// Low and mid trees are kept per position state.
#[derive(Debug, Clone)]
pub struct LengthModel {
    /// Low tree or not.
    pub choice: u16,
    /// Mid tree or high tree.
    pub choice2: u16,
    /// Lengths 2..=9, per position state.
    pub low: [[u16; LEN_LOW_SYMBOLS]; POS_STATES_MAX],
    /// Lengths 10..=17, per position state.
    pub mid: [[u16; LEN_MID_SYMBOLS]; POS_STATES_MAX],
    /// Lengths 18..=273.
    pub high: [u16; LEN_HIGH_SYMBOLS],
}

impl LengthModel {
    fn new() -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: [[PROB_INIT; LEN_LOW_SYMBOLS]; POS_STATES_MAX],
            mid: [[PROB_INIT; LEN_MID_SYMBOLS]; POS_STATES_MAX],
            high: [PROB_INIT; LEN_HIGH_SYMBOLS],
        }
    }
}

/// Probabilities of the distance coder.
#[derive(Debug, Clone)]
pub struct DistanceModel {
    /// Slot trees, one per [`dist_state`].
    pub slot: [[u16; DIST_SLOTS]; DIST_STATES],
    /// Reverse trees of slots 4-13, packed; see [`special_offset`].
    pub special: [u16; FULL_DISTANCES - END_POS_MODEL_INDEX],
    /// Reverse tree of the low four bits of large distances.
    pub align: [u16; DIST_ALIGN_SIZE],
}

impl DistanceModel {
    fn new() -> Self {
        Self {
            slot: [[PROB_INIT; DIST_SLOTS]; DIST_STATES],
            special: [PROB_INIT; FULL_DISTANCES - END_POS_MODEL_INDEX],
            align: [PROB_INIT; DIST_ALIGN_SIZE],
        }
    }
}

/// Slot tree selector for a match length.
#[inline]
pub fn dist_state(len: u32) -> usize {
    (len as usize - MATCH_LEN_MIN).min(DIST_STATES - 1)
}

/// Slot of a zero-based distance: the top bit position and the bit below it.
pub fn dist_slot(dist: u32) -> u32 {
    if dist < 4 {
        return dist;
    }
    let top = 31 - dist.leading_zeros();
    (top << 1) | ((dist >> (top - 1)) & 1)
}

/// Start of a slot's reverse tree inside [`DistanceModel::special`].
///
/// Tree nodes are addressed as `offset + m - 1` with `m` starting at 1.
#[inline]
pub fn special_offset(slot: u32, base: u32) -> usize {
    (base - slot) as usize
}

/// Every adaptive probability of one LZMA coder.
#[derive(Debug, Clone)]
pub struct LzmaModel {
    /// Properties the literal tables were sized for.
    pub props: LzmaProperties,
    /// Match or literal, per state and position state.
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// Rep or new distance, per state.
    pub is_rep: [u16; NUM_STATES],
    /// rep0 or an older rep.
    pub is_rep0: [u16; NUM_STATES],
    /// rep1 or older.
    pub is_rep1: [u16; NUM_STATES],
    /// rep2 or rep3.
    pub is_rep2: [u16; NUM_STATES],
    /// Long rep0 or short rep, per state and position state.
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// Lengths of new-distance matches.
    pub match_len: LengthModel,
    /// Lengths of rep matches.
    pub rep_len: LengthModel,
    /// One coder per literal state.
    pub literal: Vec<[u16; LITERAL_CODER_SIZE]>,
    /// Distances.
    pub distance: DistanceModel,
}

impl LzmaModel {
    /// Fresh tables for `props`.
    pub fn new(props: LzmaProperties) -> Self {
        Self {
            props,
            is_match: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep0: [PROB_INIT; NUM_STATES],
            is_rep1: [PROB_INIT; NUM_STATES],
            is_rep2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            match_len: LengthModel::new(),
            rep_len: LengthModel::new(),
            literal: vec![[PROB_INIT; LITERAL_CODER_SIZE]; props.num_lit_states()],
            distance: DistanceModel::new(),
        }
    }

    /// Return every probability to one half, keeping the literal tables.
    pub fn reset(&mut self) {
        let literal = std::mem::take(&mut self.literal);
        *self = Self {
            literal,
            ..Self::new(self.props)
        };
        for coder in &mut self.literal {
            coder.fill(PROB_INIT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_walk() {
        let mut state = State::new();
        assert!(state.is_literal());

        state.update_match();
        assert_eq!(state.value(), 7);
        assert!(!state.is_literal());

        state.update_literal();
        assert_eq!(state.value(), 4);
        assert!(state.is_literal());

        state.update_short_rep();
        assert_eq!(state.value(), 9);
        state.update_long_rep();
        assert_eq!(state.value(), 11);
        state.update_literal();
        assert_eq!(state.value(), 5);

        let mut state = State(10);
        state.update_literal();
        assert_eq!(state.value(), 4);
    }

    #[test]
    fn test_properties_byte() {
        let props = LzmaProperties::new(3, 0, 2);
        assert_eq!(props.to_byte(), 0x5D);
        assert_eq!(LzmaProperties::from_byte(0x5D), Some(props));

        let props = LzmaProperties::new(0, 4, 4);
        assert_eq!(LzmaProperties::from_byte(props.to_byte()), Some(props));
    }

    #[test]
    fn test_properties_rejected() {
        // lc 4 + lp 1
        assert!(LzmaProperties::from_byte(13).is_none());
        // pb 5
        assert!(LzmaProperties::from_byte(225).is_none());
    }

    #[test]
    fn test_literal_state() {
        let props = LzmaProperties::new(3, 0, 2);
        assert_eq!(props.literal_state(5, 0xFF), 7);
        assert_eq!(props.literal_state(5, 0x1F), 0);
        assert_eq!(LzmaProperties::new(0, 2, 2).literal_state(7, 0xFF), 3);
        assert_eq!(LzmaProperties::new(2, 1, 0).literal_state(1, 0x80), 6);
    }

    #[test]
    fn test_pos_state() {
        assert_eq!(LzmaProperties::new(3, 0, 2).pos_state(6), 2);
        assert_eq!(LzmaProperties::new(3, 0, 0).pos_state(6), 0);
    }

    #[test]
    fn test_length_limits() {
        assert_eq!(MATCH_LEN_MAX, 273);
        assert_eq!(dist_state(2), 0);
        assert_eq!(dist_state(273), 3);
    }

    #[test]
    fn test_dist_slot() {
        let cases = [(0, 0), (3, 3), (4, 4), (5, 4), (6, 5), (127, 13), (128, 14)];
        for (dist, slot) in cases {
            assert_eq!(dist_slot(dist), slot, "distance {}", dist);
        }
        assert_eq!(dist_slot(u32::MAX), 63);
    }

    #[test]
    fn test_special_trees_disjoint() {
        let mut used = [false; FULL_DISTANCES - END_POS_MODEL_INDEX];
        for slot in 4..END_POS_MODEL_INDEX as u32 {
            let direct = (slot >> 1) - 1;
            let base = (2 | (slot & 1)) << direct;
            let offset = special_offset(slot, base);
            for node in 1..(1usize << direct) {
                assert!(!used[offset + node - 1], "slot {} overlaps", slot);
                used[offset + node - 1] = true;
            }
        }
    }

    #[test]
    fn test_reset_restores_tables() {
        let mut model = LzmaModel::new(LzmaProperties::new(4, 0, 2));
        assert_eq!(model.literal.len(), 16);
        model.is_match[3][1] = 7;
        model.literal[9][100] = 7;
        model.rep_len.high[5] = 7;
        model.reset();
        assert_eq!(model.is_match[3][1], PROB_INIT);
        assert_eq!(model.literal[9][100], PROB_INIT);
        assert_eq!(model.rep_len.high[5], PROB_INIT);
        assert_eq!(model.literal.len(), 16);
    }
}
