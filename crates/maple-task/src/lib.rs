//! Maple VPN background task
//!
//! Entry point the OS loads to run the VPN plugin. Owns the process-wide
//! plugin instance and shields the OS host from plugin panics.

mod host;
mod logging;

#[cfg(feature = "leaf")]
pub use host::leaf_plugin_instance;
pub use host::{plugin_instance, TaskError, TriggerDetails, VpnTask};
pub use logging::init_logging;
