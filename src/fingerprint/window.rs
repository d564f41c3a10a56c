//! FIFO of the bytes currently inside a sliding fingerprint window.

use std::collections::VecDeque;

/// Bounded byte FIFO with room for one byte past the window.
///
/// A push that takes the fill past `window_size` is followed immediately by
/// a pop, so the extra slot is the only headroom ever needed.
#[derive(Debug, Clone, Default)]
pub struct ByteWindow {
    bytes: VecDeque<u8>,
    window_size: usize,
}

impl ByteWindow {
    /// Empty window for `window_size` bytes.
    pub fn new(window_size: usize) -> Self {
        Self {
            bytes: VecDeque::with_capacity(window_size + 1),
            window_size,
        }
    }

    /// Append at the leading edge.
    pub fn push(&mut self, byte: u8) {
        self.bytes.push_back(byte);
    }

    /// Remove and return the oldest byte.
    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    /// True once the fill exceeds the window and the oldest byte must go.
    pub fn overflowing(&self) -> bool {
        self.bytes.len() > self.window_size
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The configured window.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Drop every byte, keeping the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}
