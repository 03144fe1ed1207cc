//! OS VPN channel contract.
//!
//! The OS owns the channel; the relay consumes it. It provides the packet
//! buffer pool, starts and stops the session, and receives diagnostics when
//! a connect attempt has to be abandoned.

use crate::assignment::{DnsAssignment, RouteAssignment};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::Arc;

/// Address assigned to the VPN client inside the tunnel
pub const CLIENT_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 3, 1);

/// MTU declared to the OS
pub const TUNNEL_MTU: u32 = 1500;

/// Largest frame the OS may hand to `encapsulate`
pub const MAX_FRAME_SIZE: u32 = 1512;

/// Packet buffer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("{len} bytes exceed buffer capacity of {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },
}

/// Channel errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to associate transport: {0}")]
    Associate(String),

    #[error("Failed to start session: {0}")]
    Start(String),

    #[error("Failed to stop session: {0}")]
    Stop(String),
}

/// Fixed-capacity packet buffer from the OS pool.
///
/// The logical length never exceeds the capacity.
#[derive(Clone, PartialEq, Eq)]
pub struct PacketBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl PacketBuffer {
    /// Create an empty buffer with `capacity` bytes of storage
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Create a buffer holding exactly `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.into(),
            len: bytes.len(),
        }
    }

    /// Storage size
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Logical length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the logical length is zero
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the logical length
    pub fn set_len(&mut self, len: usize) -> Result<(), BufferError> {
        if len > self.capacity() {
            return Err(BufferError::CapacityExceeded {
                len,
                capacity: self.capacity(),
            });
        }
        self.len = len;
        Ok(())
    }

    /// Copy `bytes` into the start of the storage and set the length.
    ///
    /// Fails without touching the buffer when `bytes` does not fit.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        if bytes.len() > self.capacity() {
            return Err(BufferError::CapacityExceeded {
                len: bytes.len(),
                capacity: self.capacity(),
            });
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        Ok(())
    }

    /// The valid bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl std::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Batch of packet buffers exchanged with the OS.
///
/// Buffers are recycled through the list rather than freed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PacketBufferList {
    buffers: VecDeque<PacketBuffer>,
}

impl PacketBufferList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Remove the first buffer
    pub fn remove_at_begin(&mut self) -> Option<PacketBuffer> {
        self.buffers.pop_front()
    }

    /// Append a buffer at the end
    pub fn append(&mut self, buffer: PacketBuffer) {
        self.buffers.push_back(buffer);
    }

    /// Iterate in order
    pub fn iter(&self) -> impl Iterator<Item = &PacketBuffer> {
        self.buffers.iter()
    }
}

impl FromIterator<PacketBuffer> for PacketBufferList {
    fn from_iter<I: IntoIterator<Item = PacketBuffer>>(iter: I) -> Self {
        Self {
            buffers: iter.into_iter().collect(),
        }
    }
}

/// Everything the OS needs to bring the tunnel up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Addresses assigned to the client
    pub assigned_addresses: Vec<IpAddr>,
    /// Routes through the tunnel
    pub routes: RouteAssignment,
    /// DNS configuration
    pub dns: DnsAssignment,
    /// Declared MTU
    pub mtu: u32,
    /// Largest frame the OS sends
    pub max_frame_size: u32,
    /// Whether the OS may reconnect in low-power mode
    pub reconnect_low_power: bool,
}

impl SessionParams {
    /// Parameters for a tunnel routing all IPv4 traffic and all DNS names
    /// through the relay
    pub fn full_tunnel(dns_servers: Vec<String>) -> Self {
        Self {
            assigned_addresses: vec![IpAddr::V4(CLIENT_ADDRESS)],
            routes: RouteAssignment::split_default(),
            dns: DnsAssignment::catch_all(dns_servers),
            mtu: TUNNEL_MTU,
            max_frame_size: MAX_FRAME_SIZE,
            reconnect_low_power: false,
        }
    }
}

/// OS VPN channel
pub trait VpnChannel: Send + Sync {
    /// Register `transport` as the channel's real transport
    fn associate_transport(&self, transport: Arc<UdpSocket>) -> Result<(), ChannelError>;

    /// Bring the session up over the associated transport
    fn start_with_main_transport(
        &self,
        params: SessionParams,
        transport: Arc<UdpSocket>,
    ) -> Result<(), ChannelError>;

    /// Tear the session down
    fn stop(&self) -> Result<(), ChannelError>;

    /// Abandon the connect attempt with a diagnostic for the user
    fn terminate_connection(&self, message: &str);

    /// Take a fresh receive buffer from the OS pool
    fn receive_packet_buffer(&self) -> PacketBuffer;
}
