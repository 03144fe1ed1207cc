//! Decapsulation Queue
//!
//! Buffers packets produced by the network stack's receive callback until
//! the OS VPN channel pulls them out in `decapsulate`.
//!
//! # Threading
//!
//! ```text
//!  netstack thread ──push──▶ ┌──────────────┐ ──drain──▶ OS channel thread
//!                            │  DecapQueue  │
//!                            └──────────────┘
//! ```
//!
//! A single `parking_lot::Mutex` guards every operation. The lock is held
//! for one push or one drain pass and never across socket I/O.

use crate::transport::WakeSignal;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Thread-safe FIFO of owned packet buffers.
#[derive(Debug, Default)]
pub struct DecapQueue {
    packets: Mutex<VecDeque<Vec<u8>>>,
}

impl DecapQueue {
    /// Create a new empty queue
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy `packet` to the tail of the queue.
    ///
    /// Returns `true` if the queue was empty immediately before this push.
    pub fn push(&self, packet: &[u8]) -> bool {
        let owned = packet.to_vec();
        let mut queue = self.packets.lock();
        let was_empty = queue.is_empty();
        queue.push_back(owned);
        trace!("Queued {} byte packet (depth {})", packet.len(), queue.len());
        was_empty
    }

    /// Pop the oldest packet
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.packets.lock().pop_front()
    }

    /// Pop every queued packet in arrival order
    pub fn pop_all(&self) -> Vec<Vec<u8>> {
        self.packets.lock().drain(..).collect()
    }

    /// Pop packets front to back under a single lock hold, handing each to
    /// `accept`. Stops after the first packet `accept` rejects; that packet
    /// is gone, everything behind it stays queued.
    ///
    /// Returns the number of accepted packets.
    pub fn drain_until<F>(&self, mut accept: F) -> usize
    where
        F: FnMut(Vec<u8>) -> bool,
    {
        let mut queue = self.packets.lock();
        let mut accepted = 0;
        while let Some(packet) = queue.pop_front() {
            if !accept(packet) {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Discard every queued packet
    pub fn clear(&self) {
        self.packets.lock().clear();
    }

    /// Number of queued packets
    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }
}

/// Output context handed to the network stack on registration.
///
/// Holds only what the receive path needs: the queue and the wake signal.
/// It never refers back to the relay itself.
#[derive(Debug, Clone)]
pub struct PacketSink {
    queue: Arc<DecapQueue>,
    wake: WakeSignal,
}

impl PacketSink {
    /// Create a sink feeding `queue` and waking through `wake`
    pub fn new(queue: Arc<DecapQueue>, wake: WakeSignal) -> Self {
        Self { queue, wake }
    }

    /// Receive callback body: enqueue a packet coming out of the stack.
    ///
    /// When the push turns the queue non-empty, one wake datagram is sent
    /// after the queue lock has been released.
    pub fn deliver(&self, packet: &[u8]) {
        if self.queue.push(packet) {
            self.wake.notify();
        }
    }

    /// The queue this sink feeds
    pub fn queue(&self) -> &Arc<DecapQueue> {
        &self.queue
    }
}
