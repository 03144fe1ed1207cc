//! Proxy engine and network stack interfaces.
//!
//! Both are external services. The relay only ever talks to them through
//! these two traits; the `leaf` feature provides the C ABI implementation.

use crate::handle::{SessionHandle, StackHandle};
use crate::queue::PacketSink;

/// Result code the engine uses for a valid configuration
pub const CONFIG_TEST_OK: i32 = 0;

/// Result code the engine uses for a configuration error
pub const CONFIG_TEST_CONFIG_ERROR: i32 = 2;

/// Result code of a successful `NetStack::send`
pub const SEND_OK: i32 = 0;

/// Outcome of validating a configuration file without starting a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTestResult {
    /// Configuration is valid
    Ok,
    /// Configuration was rejected
    ConfigError,
    /// Anything else went wrong (I/O, engine internals)
    OtherError(i32),
}

impl ConfigTestResult {
    /// Map an engine result code
    pub fn from_code(code: i32) -> Self {
        match code {
            CONFIG_TEST_OK => ConfigTestResult::Ok,
            CONFIG_TEST_CONFIG_ERROR => ConfigTestResult::ConfigError,
            other => ConfigTestResult::OtherError(other),
        }
    }

    /// Check if the configuration passed
    pub fn is_ok(&self) -> bool {
        matches!(self, ConfigTestResult::Ok)
    }
}

impl std::fmt::Display for ConfigTestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTestResult::Ok => write!(f, "configuration is valid"),
            ConfigTestResult::ConfigError => write!(f, "invalid configuration"),
            ConfigTestResult::OtherError(code) => write!(f, "engine error (code {})", code),
        }
    }
}

/// Engine errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Engine failed to start")]
    StartFailed,

    #[error("Invalid engine argument: {0}")]
    InvalidArgument(String),
}

/// Network stack errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetStackError {
    #[error("Network stack registration failed")]
    RegistrationFailed,
}

/// The external proxy engine
pub trait ProxyEngine: Send + Sync {
    /// Start a session.
    ///
    /// `on_dns` is called zero or more times, synchronously, before this
    /// returns, once per DNS resolver the configuration declares.
    fn start(
        &self,
        config_path: &str,
        outbound_interface: Option<&str>,
        on_dns: &mut dyn FnMut(&str),
    ) -> Result<SessionHandle, EngineError>;

    /// Release every resource of a session started by `start`
    fn stop(&self, session: SessionHandle);

    /// Validate a configuration file without starting a session
    fn test_config(&self, config_path: &str) -> ConfigTestResult;
}

/// The external user-space network stack
pub trait NetStack: Send + Sync {
    /// Register a receive path. The stack calls `sink.deliver` from its own
    /// threads for every packet leaving it.
    fn register(&self, sink: PacketSink) -> Result<StackHandle, NetStackError>;

    /// Inject an outbound packet; returns the stack's result code
    fn send(&self, stack: &StackHandle, packet: &[u8]) -> i32;

    /// Drop a registration, handing back the sink supplied to `register`
    fn release(&self, stack: StackHandle) -> Option<PacketSink>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_result_codes() {
        assert_eq!(ConfigTestResult::from_code(0), ConfigTestResult::Ok);
        assert_eq!(ConfigTestResult::from_code(2), ConfigTestResult::ConfigError);
        assert_eq!(ConfigTestResult::from_code(1), ConfigTestResult::OtherError(1));
        assert_eq!(ConfigTestResult::from_code(-5), ConfigTestResult::OtherError(-5));
    }

    #[test]
    fn test_config_result_display() {
        assert!(ConfigTestResult::Ok.is_ok());
        assert!(!ConfigTestResult::ConfigError.is_ok());
        assert_eq!(
            ConfigTestResult::OtherError(3).to_string(),
            "engine error (code 3)"
        );
    }
}
