//! Hash chain match finder (HC3/HC4).

use super::{
    EMPTY, Match, SearchCursor, SearchStrategy, common_prefix, cyclic_slot, hash_bits,
    hash_bytes, rebase,
};
use crate::model::{MATCH_LEN_MAX, MATCH_LEN_MIN};

/// Hash chains: newest position per hash, each linked to its predecessor.
#[derive(Debug)]
pub struct HashChain {
    hash_bytes: usize,
    hash_mask: usize,
    /// Most recent position per hash bucket.
    head: Vec<u32>,
    /// Previous position with the same hash, per cyclic slot.
    chain: Vec<u32>,
    cyclic_size: usize,
}

impl HashChain {
    /// Create a hash chain keyed on `hash_bytes` bytes.
    pub fn new(hash_bytes: usize, dict_size: usize) -> Self {
        let bits = hash_bits(hash_bytes, dict_size);
        Self {
            hash_bytes,
            hash_mask: (1 << bits) - 1,
            head: vec![EMPTY; 1 << bits],
            chain: Vec::new(),
            cyclic_size: dict_size + 1,
        }
    }

    /// Link the position into its chain, returning the previous head.
    fn insert(&mut self, cursor: &SearchCursor<'_>) -> u32 {
        let h = hash_bytes(&cursor.buf[cursor.pos..], self.hash_bytes, self.hash_mask);
        let previous = self.head[h];
        self.head[h] = (cursor.pos + 1) as u32;

        let slot = cyclic_slot(cursor.abs, self.cyclic_size);
        if slot >= self.chain.len() {
            self.chain.resize(slot + 1, EMPTY);
        }
        self.chain[slot] = previous;
        previous
    }
}

impl SearchStrategy for HashChain {
    fn find(&mut self, cursor: &SearchCursor<'_>, matches: &mut Vec<Match>) {
        if cursor.avail < self.hash_bytes {
            return;
        }
        let mut candidate = self.insert(cursor);

        let buf = cursor.buf;
        let limit = cursor.avail.min(MATCH_LEN_MAX);
        let mut best_len = MATCH_LEN_MIN - 1;
        let mut depth = cursor.depth;

        while candidate != EMPTY && depth > 0 {
            depth -= 1;
            let cand_pos = candidate as usize - 1;
            let delta = cursor.pos - cand_pos;
            if delta > cursor.dict_size {
                break;
            }
            let next = self.chain[cyclic_slot(cursor.abs - delta as u64, self.cyclic_size)];

            // Cheap reject: the byte that would extend the best match must agree.
            if buf[cand_pos + best_len] == buf[cursor.pos + best_len] {
                let len = common_prefix(buf, cand_pos, cursor.pos, limit);
                if len > best_len {
                    best_len = len;
                    matches.push(Match::new(delta, len));
                    if len >= cursor.nice_len
                        || len == limit
                        || matches.len() >= cursor.max_candidates
                    {
                        break;
                    }
                }
            }
            candidate = next;
        }
    }

    fn skip(&mut self, cursor: &SearchCursor<'_>) {
        if cursor.avail >= self.hash_bytes {
            self.insert(cursor);
        }
    }

    fn shift(&mut self, amount: usize) {
        rebase(&mut self.head, amount);
        rebase(&mut self.chain, amount);
    }

    fn clear(&mut self) {
        self.head.fill(EMPTY);
        self.chain.clear();
    }
}
