//! Maple VPN - Packet relay between the OS VPN channel and leaf
//!
//! Bridges the OS VPN plugin callbacks into the leaf proxy engine through
//! a user-space network stack and a loopback socket pair standing in for
//! a TUN device.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ encapsulate ┌──────────────┐  send   ┌───────────┐
//! │              │────────────▶│              │────────▶│           │
//! │  OS VPN      │             │ PacketRelay  │         │ netstack  │──▶ leaf
//! │  channel     │◀────────────│              │         │           │
//! │              │ decapsulate │  DecapQueue  │◀────────│           │
//! └──────▲───────┘             └──────┬───────┘ deliver └───────────┘
//!        │ main          wake (1 byte)│
//!        └──────── loopback pair ◀────┘ back
//! ```
//!
//! # Guarantees
//!
//! - Packets keep their order in both directions
//! - A failed connect leaves no engine or stack handle behind
//! - Disconnect is idempotent and never fails
//! - No callback blocks on I/O while holding the queue lock

mod assignment;
#[cfg(any(feature = "leaf", test))]
mod callbacks;
mod channel;
mod engine;
mod handle;
#[cfg(feature = "leaf")]
mod leaf;
mod netif;
mod plugin;
mod queue;
mod relay;
mod settings;
#[cfg(test)]
mod testing;
mod transport;

pub use assignment::{DnsAssignment, DomainNameInfo, DomainNameType, Route, RouteAssignment};
pub use channel::{
    BufferError, ChannelError, PacketBuffer, PacketBufferList, SessionParams, VpnChannel,
    CLIENT_ADDRESS, MAX_FRAME_SIZE, TUNNEL_MTU,
};
pub use engine::{
    ConfigTestResult, EngineError, NetStack, NetStackError, ProxyEngine, CONFIG_TEST_CONFIG_ERROR,
    CONFIG_TEST_OK, SEND_OK,
};
pub use handle::{HandleSlot, SessionHandle, StackHandle};
#[cfg(feature = "leaf")]
pub use leaf::{LeafEngine, LeafNetStack};
pub use netif::Netif;
pub use plugin::{MaplePlugin, SettingsSource, VpnPlugIn};
pub use queue::{DecapQueue, PacketSink};
pub use relay::{PacketRelay, RelayError, RelayState};
pub use settings::{
    PluginSettings, SettingsError, SettingsFormat, CONFIG_PATH_SETTING_KEY, NETIF_SETTING_KEY,
};
pub use transport::{LoopbackPair, TransportError, WakeSignal};
