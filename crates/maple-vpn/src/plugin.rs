//! VPN Plugin Adapter
//!
//! The OS drives a VPN plugin through five callbacks. [`MaplePlugin`]
//! answers them by delegating to a [`PacketRelay`]; it keeps no state of
//! its own beyond where the settings live.
//!
//! # Usage
//!
//! ```rust,ignore
//! let plugin = MaplePlugin::new(relay, settings_path);
//!
//! // Called by the OS on its own threads:
//! plugin.connect(&channel);
//! plugin.encapsulate(&channel, &mut outbound, &mut encapsulated);
//! plugin.decapsulate(&channel, &encap_buffer, &mut inbound, &mut control);
//! plugin.disconnect(&channel);
//! ```

use crate::channel::{PacketBuffer, PacketBufferList, VpnChannel};
use crate::engine::{ConfigTestResult, NetStack, ProxyEngine};
use crate::relay::{PacketRelay, RelayState};
use crate::settings::PluginSettings;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// OS-defined VPN plugin contract.
///
/// Implementations must not panic or block indefinitely; failures are
/// reported through the channel.
pub trait VpnPlugIn: Send + Sync {
    /// Bring the tunnel up
    fn connect(&self, channel: &dyn VpnChannel);

    /// Bring the tunnel down
    fn disconnect(&self, channel: &dyn VpnChannel);

    /// Fill in a custom keepalive payload, if any
    fn get_keep_alive_payload(&self, channel: &dyn VpnChannel, keep_alive: &mut Option<PacketBuffer>);

    /// Outbound packets from the client
    fn encapsulate(
        &self,
        channel: &dyn VpnChannel,
        packets: &mut PacketBufferList,
        encapsulated: &mut PacketBufferList,
    );

    /// Inbound packets for the client
    fn decapsulate(
        &self,
        channel: &dyn VpnChannel,
        encap_buffer: &PacketBuffer,
        decapsulated: &mut PacketBufferList,
        control_packets: &mut PacketBufferList,
    );
}

/// Where the plugin reads its settings from on every connect
#[derive(Debug, Clone)]
pub enum SettingsSource {
    /// Fixed values
    Static(PluginSettings),
    /// A settings file written by the app
    File(PathBuf),
}

impl SettingsSource {
    fn load(&self) -> PluginSettings {
        match self {
            SettingsSource::Static(settings) => settings.clone(),
            SettingsSource::File(path) => PluginSettings::load(path).unwrap_or_else(|e| {
                warn!("Failed to load settings from {}: {}", path.display(), e);
                PluginSettings::default()
            }),
        }
    }
}

/// The Maple VPN plugin
pub struct MaplePlugin<E: ProxyEngine, S: NetStack> {
    relay: PacketRelay<E, S>,
    settings: SettingsSource,
}

impl<E: ProxyEngine, S: NetStack> MaplePlugin<E, S> {
    /// Create a plugin reading settings from `settings_path`
    pub fn new(relay: PacketRelay<E, S>, settings_path: impl AsRef<Path>) -> Self {
        Self {
            relay,
            settings: SettingsSource::File(settings_path.as_ref().to_path_buf()),
        }
    }

    /// Create a plugin with fixed settings
    pub fn with_settings(relay: PacketRelay<E, S>, settings: PluginSettings) -> Self {
        Self {
            relay,
            settings: SettingsSource::Static(settings),
        }
    }

    /// The relay this plugin drives
    pub fn relay(&self) -> &PacketRelay<E, S> {
        &self.relay
    }

    /// Relay state
    pub fn state(&self) -> RelayState {
        self.relay.state()
    }

    /// Validate a configuration file with the engine
    pub fn test_config(&self, config_path: &str) -> ConfigTestResult {
        self.relay.test_config(config_path)
    }
}

impl<E: ProxyEngine, S: NetStack> VpnPlugIn for MaplePlugin<E, S> {
    fn connect(&self, channel: &dyn VpnChannel) {
        let settings = self.settings.load();
        if let Err(e) = self.relay.connect(channel, &settings) {
            // Already reported to the channel
            error!("VPN connect aborted: {}", e);
        }
    }

    fn disconnect(&self, channel: &dyn VpnChannel) {
        self.relay.disconnect(channel);
    }

    fn get_keep_alive_payload(&self, _channel: &dyn VpnChannel, _keep_alive: &mut Option<PacketBuffer>) {}

    fn encapsulate(
        &self,
        _channel: &dyn VpnChannel,
        packets: &mut PacketBufferList,
        _encapsulated: &mut PacketBufferList,
    ) {
        self.relay.encapsulate(packets);
    }

    fn decapsulate(
        &self,
        channel: &dyn VpnChannel,
        _encap_buffer: &PacketBuffer,
        decapsulated: &mut PacketBufferList,
        _control_packets: &mut PacketBufferList,
    ) {
        self.relay.decapsulate(channel, decapsulated);
    }
}
