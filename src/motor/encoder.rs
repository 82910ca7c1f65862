// Quadrature encoder tick counting
//
// Edge handlers run in interrupt-like context: they only read the two channel
// levels and do one atomic update. Each wheel's count shares a 64-bit word
// with a reset epoch, so a snapshot is never torn and an edge sampled before a
// reset can be refused atomically after it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::messages::Wheel;

/// Encoder channel whose level changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}

/// One detected transition with both channel levels sampled after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub channel: Channel,
    pub a: bool,
    pub b: bool,
}

/// Tick delta implied by an edge.
///
/// A leading B (A edge with the levels now different) is forward; the B
/// channel counts the opposite way. Out of sequence edges are not detected.
#[inline]
fn edge_delta(edge: Edge) -> i32 {
    let dir = if edge.a != edge.b { 1 } else { -1 };
    match edge.channel {
        Channel::A => dir,
        Channel::B => -dir,
    }
}

// Word layout: epoch in the high half, count (two's complement) in the low half
#[inline]
fn pack(epoch: u32, count: i32) -> u64 {
    ((epoch as u64) << 32) | count as u32 as u64
}

#[inline]
fn epoch_of(word: u64) -> u32 {
    (word >> 32) as u32
}

#[inline]
fn count_of(word: u64) -> i32 {
    word as u32 as i32
}

/// Signed tick counts for both wheels
#[derive(Debug, Default)]
pub struct EncoderCounter {
    words: [AtomicU64; 2],
}

impl EncoderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edge handler; bounded time, never blocks
    #[inline]
    pub fn on_edge(&self, wheel: Wheel, edge: Edge) {
        let delta = edge_delta(edge);
        let _ = self.words[wheel.index()].fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
            Some(pack(epoch_of(w), count_of(w).wrapping_add(delta)))
        });
    }

    /// Edge handler for a producer that sampled its input at `epoch`.
    /// Returns false, leaving the count alone, if a reset happened since.
    #[inline]
    pub fn on_edge_at(&self, wheel: Wheel, epoch: u32, edge: Edge) -> bool {
        let delta = edge_delta(edge);
        self.words[wheel.index()]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                (epoch_of(w) == epoch).then(|| pack(epoch, count_of(w).wrapping_add(delta)))
            })
            .is_ok()
    }

    /// Instantaneous count for one wheel
    pub fn snapshot(&self, wheel: Wheel) -> i32 {
        count_of(self.words[wheel.index()].load(Ordering::Acquire))
    }

    /// Number of resets seen by one wheel
    pub fn epoch(&self, wheel: Wheel) -> u32 {
        epoch_of(self.words[wheel.index()].load(Ordering::Acquire))
    }

    /// Zero one wheel and start a new epoch. Only call with the motor
    /// stopped; edges tagged with an older epoch are refused from now on.
    pub fn reset(&self, wheel: Wheel) {
        let _ = self.words[wheel.index()].fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
            Some(pack(epoch_of(w).wrapping_add(1), 0))
        });
    }

    pub fn reset_all(&self) {
        for wheel in Wheel::ALL {
            self.reset(wheel);
        }
    }
}
