//! Background task host.
//!
//! The OS runs the VPN background task once per plugin event and expects
//! the same plugin object every time, so the plugin lives in a
//! process-wide slot: created on first use, never torn down before exit.

use maple_vpn::VpnPlugIn;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use tracing::{error, info};

/// Process-wide plugin instance
static PLUGIN: OnceLock<Box<dyn VpnPlugIn>> = OnceLock::new();

/// Task host errors
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Plugin panicked while processing an event: {0}")]
    Panicked(String),
}

/// Event delivery from the OS: hands the plugin to whichever callback the
/// trigger carries.
pub trait TriggerDetails {
    /// Dispatch the pending event to `plugin`
    fn process_event(&self, plugin: &dyn VpnPlugIn);
}

/// Get the process-wide plugin, creating it with `init` on first use.
///
/// Later calls ignore `init` and return the existing instance.
pub fn plugin_instance<F>(init: F) -> &'static dyn VpnPlugIn
where
    F: FnOnce() -> Box<dyn VpnPlugIn>,
{
    let plugin = PLUGIN.get_or_init(|| {
        info!("Creating VPN plugin instance");
        init()
    });
    &**plugin
}

/// The plugin backed by leaf, reading settings from `settings_path`
#[cfg(feature = "leaf")]
pub fn leaf_plugin_instance(settings_path: &std::path::Path) -> &'static dyn VpnPlugIn {
    use maple_vpn::{LeafEngine, LeafNetStack, MaplePlugin, PacketRelay};

    plugin_instance(|| {
        Box::new(MaplePlugin::new(
            PacketRelay::new(LeafEngine, LeafNetStack),
            settings_path,
        ))
    })
}

/// The VPN background task
#[derive(Clone, Copy)]
pub struct VpnTask {
    plugin: &'static dyn VpnPlugIn,
}

impl VpnTask {
    /// Create a task driving `plugin`
    pub fn new(plugin: &'static dyn VpnPlugIn) -> Self {
        Self { plugin }
    }

    /// Process one OS event.
    ///
    /// Runs inside a panic isolation boundary: a panicking plugin is logged
    /// and reported as an error instead of unwinding into the OS host.
    pub fn run(&self, trigger: &dyn TriggerDetails) -> Result<(), TaskError> {
        let plugin = self.plugin;
        let result = panic::catch_unwind(AssertUnwindSafe(|| trigger.process_event(plugin)));

        result.map_err(|panic_info| {
            let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("VPN task panicked: {}", message);
            TaskError::Panicked(message)
        })
    }
}
