// src/framing.rs - Reassembly of terminator-delimited firmware messages
use crate::envelope::TERMINATOR;

/// Upper bound on bytes held without seeing a terminator.
pub const MAX_PENDING: usize = 1 << 20;

/// Accumulates raw socket bytes and yields complete message bodies.
///
/// Bodies are returned without the terminator and decoded lossily. Empty
/// bodies (back-to-back terminators) are dropped.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_PENDING && !self.pending.contains(&TERMINATOR) {
            tracing::warn!(
                "Discarding {} buffered bytes with no message terminator",
                self.pending.len()
            );
            self.pending.clear();
        }
    }

    /// Pop the oldest complete message, if any.
    pub fn next_frame(&mut self) -> Option<String> {
        loop {
            let end = self.pending.iter().position(|&b| b == TERMINATOR)?;
            let frame: Vec<u8> = self.pending.drain(..=end).collect();
            let body = &frame[..frame.len() - 1];
            if !body.is_empty() {
                return Some(String::from_utf8_lossy(body).into_owned());
            }
        }
    }

    /// Bytes of an incomplete message still waiting for its terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
