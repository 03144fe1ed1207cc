//! Packet Relay Core
//!
//! Joins the OS VPN channel, the user-space network stack and the proxy
//! engine.
//!
//! ```text
//!   OS ──encapsulate──▶ relay ──send──▶ netstack ──▶ engine
//!   OS ◀─decapsulate── DecapQueue ◀──deliver── netstack
//!    ▲                       │
//!    └── main ◀── wake ── back      (loopback pair)
//! ```
//!
//! # States
//!
//! `Idle` → connect → `Active` → disconnect → `Idle`. A connect that fails
//! part-way releases what it acquired and leaves the relay `Idle` before
//! returning; no other state is observable.

use crate::channel::{ChannelError, PacketBufferList, SessionParams, VpnChannel};
use crate::engine::{ConfigTestResult, EngineError, NetStack, NetStackError, ProxyEngine, SEND_OK};
use crate::handle::{HandleSlot, SessionHandle, StackHandle};
use crate::queue::{DecapQueue, PacketSink};
use crate::settings::PluginSettings;
use crate::transport::{LoopbackPair, TransportError, WakeSignal};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Relay state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// No session; all handles released
    Idle,
    /// Session running
    Active,
}

impl RelayState {
    /// Check if a session is running
    pub fn is_active(&self) -> bool {
        matches!(self, RelayState::Active)
    }
}

/// Connect failures. The display text is the diagnostic shown by the OS.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Error setting up loopback transport: {0}")]
    Transport(#[from] TransportError),

    #[error("Error initializing Leaf netstack.")]
    NetStack(#[source] NetStackError),

    #[error("Error initializing Leaf runtime.\r\nPlease check your configuration file and default interface.")]
    Engine(#[source] EngineError),

    #[error("{0}")]
    Channel(#[from] ChannelError),
}

/// Handles owned by a running session
struct Session {
    state: RelayState,
    engine: HandleSlot<SessionHandle>,
    stack: HandleSlot<StackHandle>,
    back_transport: Option<WakeSignal>,
}

impl Session {
    fn idle() -> Self {
        Self {
            state: RelayState::Idle,
            engine: HandleSlot::Empty,
            stack: HandleSlot::Empty,
            back_transport: None,
        }
    }
}

/// Packet relay between the OS channel, the network stack and the engine
pub struct PacketRelay<E: ProxyEngine, S: NetStack> {
    engine: E,
    netstack: S,
    /// Packets waiting for `decapsulate`
    queue: Arc<DecapQueue>,
    /// Session handles; read-locked by `encapsulate`, write-locked by
    /// connect and disconnect
    session: RwLock<Session>,
}

impl<E: ProxyEngine, S: NetStack> PacketRelay<E, S> {
    /// Create an idle relay
    pub fn new(engine: E, netstack: S) -> Self {
        Self {
            engine,
            netstack,
            queue: DecapQueue::new(),
            session: RwLock::new(Session::idle()),
        }
    }

    /// Current state
    pub fn state(&self) -> RelayState {
        self.session.read().state
    }

    /// Check if a session is running
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Check if an engine session handle is held
    pub fn has_engine_session(&self) -> bool {
        self.session.read().engine.is_held()
    }

    /// Check if a network stack registration is held
    pub fn has_stack_registration(&self) -> bool {
        self.session.read().stack.is_held()
    }

    /// Packets waiting to be decapsulated
    pub fn queued_packets(&self) -> usize {
        self.queue.len()
    }

    /// The decapsulation queue
    pub fn queue(&self) -> &Arc<DecapQueue> {
        &self.queue
    }

    /// The proxy engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The network stack
    pub fn netstack(&self) -> &S {
        &self.netstack
    }

    /// Validate a configuration file with the engine
    pub fn test_config(&self, config_path: &str) -> ConfigTestResult {
        self.engine.test_config(config_path)
    }

    /// Bring a session up.
    ///
    /// On failure the channel is terminated with the error's text, every
    /// partially acquired handle is released, and the relay is `Idle`.
    /// The error is returned for logging only.
    pub fn connect(
        &self,
        channel: &dyn VpnChannel,
        settings: &PluginSettings,
    ) -> Result<(), RelayError> {
        let mut session = self.session.write();

        info!(
            "Connecting (config: {}, interface: {})",
            settings.config_path,
            settings.outbound_interface().unwrap_or("default")
        );

        match self.setup(&mut session, channel, settings) {
            Ok(()) => {
                session.state = RelayState::Active;
                info!("Relay active");
                Ok(())
            }
            Err(e) => {
                error!("Connect failed: {}", e);
                channel.terminate_connection(&e.to_string());
                self.stop_leaf(&mut session);
                Err(e)
            }
        }
    }

    fn setup(
        &self,
        session: &mut Session,
        channel: &dyn VpnChannel,
        settings: &PluginSettings,
    ) -> Result<(), RelayError> {
        let (transport, wake) = LoopbackPair::bind()?.into_parts();
        channel.associate_transport(transport.clone())?;

        // Retried connects must not inherit handles or packets
        self.stop_leaf(session);
        self.queue.clear();

        session.back_transport = Some(wake.clone());
        let stack = self
            .netstack
            .register(PacketSink::new(self.queue.clone(), wake))
            .map_err(RelayError::NetStack)?;
        session.stack = HandleSlot::Held(stack);

        let mut dns_servers = Vec::new();
        let engine = self
            .engine
            .start(
                &settings.config_path,
                settings.outbound_interface(),
                &mut |dns: &str| dns_servers.push(dns.to_string()),
            )
            .map_err(RelayError::Engine)?;
        session.engine = HandleSlot::Held(engine);
        debug!("Engine reported {} DNS server(s)", dns_servers.len());

        channel.start_with_main_transport(SessionParams::full_tunnel(dns_servers), transport)?;
        Ok(())
    }

    /// Tear the session down. Always succeeds and always ends `Idle`.
    pub fn disconnect(&self, channel: &dyn VpnChannel) {
        info!("Disconnecting");

        if let Err(e) = channel.stop() {
            warn!("Channel stop failed: {}", e);
        }

        let mut session = self.session.write();
        self.stop_leaf(&mut session);
    }

    /// Drop the back transport, stop the engine session, then release the
    /// stack registration. Each release is skipped when nothing is held.
    fn stop_leaf(&self, session: &mut Session) {
        session.state = RelayState::Idle;
        session.back_transport = None;

        if session.engine.release(|h| self.engine.stop(h)).is_some() {
            debug!("Engine session stopped");
        }

        if let Some(sink) = session.stack.release(|h| self.netstack.release(h)) {
            // The returned sink holds the last stack-side reference to the
            // back transport
            drop(sink);
            debug!("Network stack released");
        }
    }

    /// Forward every packet of the batch to the network stack, in order,
    /// recycling each packet back into `packets`.
    pub fn encapsulate(&self, packets: &mut PacketBufferList) {
        let session = self.session.read();
        let stack = session.stack.get();

        for _ in 0..packets.len() {
            let Some(packet) = packets.remove_at_begin() else {
                break;
            };
            if let Some(stack) = stack {
                let code = self.netstack.send(stack, packet.as_slice());
                if code != SEND_OK {
                    debug!("Netstack rejected {} byte packet (code {})", packet.len(), code);
                }
            }
            packets.append(packet);
        }
    }

    /// Move every queued packet into OS receive buffers, appended to
    /// `decapsulated` in queue order.
    ///
    /// A packet that does not fit its receive buffer ends the pass: it is
    /// dropped, no buffer is appended for it, and later packets stay queued.
    /// The channel is woken again so it polls for them.
    ///
    /// Returns the number of packets delivered.
    pub fn decapsulate(
        &self,
        channel: &dyn VpnChannel,
        decapsulated: &mut PacketBufferList,
    ) -> usize {
        let mut aborted = false;
        let delivered = self.queue.drain_until(|packet| {
            let mut buffer = channel.receive_packet_buffer();
            match buffer.write(&packet) {
                Ok(()) => {
                    decapsulated.append(buffer);
                    true
                }
                Err(e) => {
                    warn!("Dropping decapsulated packet: {}", e);
                    aborted = true;
                    false
                }
            }
        });

        // Later pushes see a non-empty queue and send no wake of their own
        if aborted && !self.queue.is_empty() {
            self.rewake();
        }
        delivered
    }

    /// Wake the channel through the current session's back transport.
    ///
    /// Skipped while connect or disconnect holds the session; both clear or
    /// abandon the queue anyway.
    fn rewake(&self) {
        let Some(session) = self.session.try_read() else {
            return;
        };
        if let Some(wake) = &session.back_transport {
            debug!("Packets left queued, waking channel");
            wake.notify();
        }
    }
}

impl<E: ProxyEngine, S: NetStack> Drop for PacketRelay<E, S> {
    fn drop(&mut self) {
        let mut session = self.session.write();
        if session.engine.is_held() || session.stack.is_held() {
            warn!("Relay dropped with a live session, releasing it");
            self.stop_leaf(&mut session);
        }
    }
}
