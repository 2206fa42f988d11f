//! Sliding window dictionary.
//!
//! Holds the most recent `capacity` bytes of a stream so back-references
//! can be resolved. Storage grows on demand up to the capacity and then
//! wraps, overwriting the oldest byte; the logical capacity never changes.

use crate::error::{LzScopeError, Result};

/// Bounded byte history addressed by distance from the write cursor.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    /// Stored bytes (at most `capacity`).
    buffer: Vec<u8>,
    /// Maximum number of bytes retained.
    capacity: usize,
    /// Next write index into `buffer`.
    position: usize,
    /// Bytes appended since the last reset.
    total: u64,
}

impl SlidingWindow {
    /// Create a window retaining at most `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            buffer: Vec::new(),
            capacity,
            position: 0,
            total: 0,
        }
    }

    /// Maximum number of bytes the window retains.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently addressable.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes appended since construction or the last reset.
    pub fn total_appended(&self) -> u64 {
        self.total
    }

    /// Append a single byte, evicting the oldest one when full.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(byte);
        } else {
            self.buffer[self.position] = byte;
        }
        self.position += 1;
        if self.position == self.capacity {
            self.position = 0;
        }
        self.total += 1;
    }

    /// Append bytes in order.
    pub fn append(&mut self, data: &[u8]) {
        // Only the tail can survive when the input exceeds the capacity.
        let skipped = data.len().saturating_sub(self.capacity);
        if skipped > 0 {
            self.total += skipped as u64;
            // Keep `position` consistent with the skipped bytes.
            self.position = (self.position + skipped) % self.capacity;
            if self.buffer.len() < self.capacity {
                self.buffer.resize(self.capacity, 0);
            }
        }
        for &byte in &data[skipped..] {
            self.push(byte);
        }
    }

    /// Byte `distance` positions behind the write cursor (1 = most recent).
    #[inline]
    pub fn at(&self, distance: usize) -> Result<u8> {
        let held = self.buffer.len();
        if distance == 0 || distance > held {
            return Err(LzScopeError::out_of_range(distance, held));
        }
        let index = if self.position >= distance {
            self.position - distance
        } else {
            self.capacity - (distance - self.position)
        };
        Ok(self.buffer[index])
    }

    /// The most recent byte, or 0 when empty.
    pub fn last_byte(&self) -> u8 {
        self.at(1).unwrap_or(0)
    }

    /// Replay a back-reference, appending each copied byte to the window and `out`.
    ///
    /// The source may overlap the bytes being produced (distance < length).
    pub fn copy_match(&mut self, distance: usize, length: usize, out: &mut Vec<u8>) -> Result<()> {
        // Validate once; each push keeps the distance addressable.
        self.at(distance)?;
        out.reserve(length);
        for _ in 0..length {
            let byte = self.at(distance)?;
            self.push(byte);
            out.push(byte);
        }
        Ok(())
    }

    /// Forget all content.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.position = 0;
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_at() {
        let mut window = SlidingWindow::new(8);
        window.append(b"abc");
        assert_eq!(window.at(1).unwrap(), b'c');
        assert_eq!(window.at(3).unwrap(), b'a');
        assert_eq!(window.len(), 3);
        assert_eq!(window.last_byte(), b'c');
    }

    #[test]
    fn test_eviction() {
        let mut window = SlidingWindow::new(4);
        window.append(b"abcdef");
        assert_eq!(window.len(), 4);
        assert_eq!(window.at(1).unwrap(), b'f');
        assert_eq!(window.at(4).unwrap(), b'c');
        assert!(matches!(
            window.at(5),
            Err(LzScopeError::OutOfRange {
                distance: 5,
                available: 4
            })
        ));
        assert_eq!(window.total_appended(), 6);
    }

    #[test]
    fn test_push_wraps() {
        let mut window = SlidingWindow::new(3);
        for byte in b"0123456" {
            window.push(*byte);
        }
        assert_eq!(window.at(1).unwrap(), b'6');
        assert_eq!(window.at(2).unwrap(), b'5');
        assert_eq!(window.at(3).unwrap(), b'4');
    }

    #[test]
    fn test_zero_distance_rejected() {
        let mut window = SlidingWindow::new(4);
        window.push(1);
        assert!(window.at(0).is_err());
    }

    #[test]
    fn test_empty_window() {
        let window = SlidingWindow::new(16);
        assert!(window.is_empty());
        assert_eq!(window.last_byte(), 0);
        assert!(window.at(1).is_err());
    }

    #[test]
    fn test_distance_equal_to_capacity() {
        let mut window = SlidingWindow::new(5);
        window.append(b"hello world");
        assert_eq!(window.at(5).unwrap(), b'w');
        assert!(window.at(6).is_err());
    }

    #[test]
    fn test_copy_match_overlapping() {
        let mut window = SlidingWindow::new(64);
        let mut out = Vec::new();
        window.append(b"ab");
        window.copy_match(2, 6, &mut out).unwrap();
        assert_eq!(out, b"ababab");
        assert_eq!(window.at(1).unwrap(), b'b');
        assert_eq!(window.len(), 8);
    }

    #[test]
    fn test_copy_match_out_of_range() {
        let mut window = SlidingWindow::new(64);
        let mut out = Vec::new();
        window.append(b"abc");
        assert!(window.copy_match(4, 2, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_large_append_keeps_tail() {
        let mut window = SlidingWindow::new(4);
        window.push(b'x');
        window.append(b"0123456789");
        assert_eq!(window.at(1).unwrap(), b'9');
        assert_eq!(window.at(4).unwrap(), b'6');
        assert_eq!(window.total_appended(), 11);
    }

    #[test]
    fn test_reset() {
        let mut window = SlidingWindow::new(4);
        window.append(b"abcd");
        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.total_appended(), 0);
        window.push(b'z');
        assert_eq!(window.at(1).unwrap(), b'z');
    }
}
