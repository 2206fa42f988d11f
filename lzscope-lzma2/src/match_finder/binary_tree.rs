//! Binary tree match finder (BT2/BT3/BT4).
//!
//! Each hash bucket roots a binary search tree of earlier positions ordered
//! by the bytes that follow them. Inserting a position walks the tree from
//! the newest node, splitting it into the new node's left (smaller) and
//! right (greater) subtrees; the same walk reports the matches it meets.

use super::{
    EMPTY, Match, SearchCursor, SearchStrategy, common_prefix, cyclic_slot, hash_bits,
    hash_bytes, rebase,
};
use crate::model::{MATCH_LEN_MAX, MATCH_LEN_MIN};

/// Binary trees over the history, two child links per cyclic slot.
#[derive(Debug)]
pub struct BinaryTree {
    hash_bytes: usize,
    hash_mask: usize,
    /// Newest position (tree root) per hash bucket.
    head: Vec<u32>,
    /// `son[2 * slot]` is the smaller child, `son[2 * slot + 1]` the greater one.
    son: Vec<u32>,
    cyclic_size: usize,
}

impl BinaryTree {
    /// Create a binary tree finder keyed on `hash_bytes` bytes.
    pub fn new(hash_bytes: usize, dict_size: usize) -> Self {
        let bits = hash_bits(hash_bytes, dict_size);
        Self {
            hash_bytes,
            hash_mask: (1 << bits) - 1,
            head: vec![EMPTY; 1 << bits],
            son: Vec::new(),
            cyclic_size: dict_size + 1,
        }
    }

    /// Insert the cursor position, reporting matches when `matches` is given.
    fn walk(&mut self, cursor: &SearchCursor<'_>, mut matches: Option<&mut Vec<Match>>) {
        if cursor.avail < self.hash_bytes {
            return;
        }

        let buf = cursor.buf;
        let pos = cursor.pos;
        let h = hash_bytes(&buf[pos..], self.hash_bytes, self.hash_mask);
        let mut candidate = self.head[h];
        self.head[h] = (pos + 1) as u32;

        let slot = cyclic_slot(cursor.abs, self.cyclic_size);
        if 2 * slot + 2 > self.son.len() {
            self.son.resize(2 * slot + 2, EMPTY);
        }

        let len_limit = cursor.avail.min(cursor.nice_len).min(MATCH_LEN_MAX);
        let mut ptr0 = 2 * slot + 1;
        let mut ptr1 = 2 * slot;
        let mut len0 = 0usize;
        let mut len1 = 0usize;
        let mut best_len = MATCH_LEN_MIN - 1;
        let mut depth = cursor.depth;

        loop {
            if candidate == EMPTY || depth == 0 {
                self.son[ptr0] = EMPTY;
                self.son[ptr1] = EMPTY;
                break;
            }
            depth -= 1;

            let cand_pos = candidate as usize - 1;
            let delta = pos - cand_pos;
            if delta > cursor.dict_size {
                self.son[ptr0] = EMPTY;
                self.son[ptr1] = EMPTY;
                break;
            }
            let pair = 2 * cyclic_slot(cursor.abs - delta as u64, self.cyclic_size);

            // Both bounding subtrees share at least this prefix with `pos`.
            let mut len = len0.min(len1);
            if buf[cand_pos + len] == buf[pos + len] {
                len += 1;
                while len < len_limit && buf[cand_pos + len] == buf[pos + len] {
                    len += 1;
                }

                if let Some(out) = matches.as_deref_mut() {
                    if len > best_len && out.len() < cursor.max_candidates {
                        // Nodes indexed near a chunk end were ordered on a shorter
                        // prefix, so the inherited length is re-checked.
                        let verified = if buf[cand_pos..cand_pos + len] == buf[pos..pos + len] {
                            len
                        } else {
                            common_prefix(buf, cand_pos, pos, len_limit)
                        };
                        if verified > best_len {
                            best_len = verified;
                            out.push(Match::new(delta, verified));
                        }
                    }
                }

                if len == len_limit {
                    // Identical up to the limit: the new node takes over both subtrees.
                    self.son[ptr1] = self.son[pair];
                    self.son[ptr0] = self.son[pair + 1];
                    break;
                }
            }

            if buf[cand_pos + len] < buf[pos + len] {
                self.son[ptr1] = candidate;
                ptr1 = pair + 1;
                candidate = self.son[ptr1];
                len1 = len;
            } else {
                self.son[ptr0] = candidate;
                ptr0 = pair;
                candidate = self.son[ptr0];
                len0 = len;
            }
        }

        // A match cut at nice_len is extended as far as the chunk allows.
        if let Some(out) = matches {
            let max_len = cursor.avail.min(MATCH_LEN_MAX);
            if let Some(last) = out.last_mut() {
                let len = last.length as usize;
                if len == len_limit && len < max_len {
                    let from = pos - last.distance as usize;
                    last.length = common_prefix(buf, from, pos, max_len) as u32;
                }
            }
        }
    }
}

impl SearchStrategy for BinaryTree {
    fn find(&mut self, cursor: &SearchCursor<'_>, matches: &mut Vec<Match>) {
        self.walk(cursor, Some(matches));
    }

    fn skip(&mut self, cursor: &SearchCursor<'_>) {
        self.walk(cursor, None);
    }

    fn shift(&mut self, amount: usize) {
        rebase(&mut self.head, amount);
        rebase(&mut self.son, amount);
    }

    fn clear(&mut self) {
        self.head.fill(EMPTY);
        self.son.clear();
    }
}
