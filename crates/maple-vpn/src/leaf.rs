//! C ABI binding to the leaf proxy engine and its network stack.
//!
//! Enabled with the `leaf` feature; the final binary must link the leaf
//! static library.

use crate::callbacks::{collect_dns, deliver_packet, reset_discovered_dns, take_discovered_dns};
use crate::engine::{ConfigTestResult, EngineError, NetStack, NetStackError, ProxyEngine};
use crate::handle::{SessionHandle, StackHandle};
use crate::queue::PacketSink;
use std::ffi::{CString, c_char, c_void};
use std::ptr;
use tracing::{debug, warn};

#[link(name = "leaf")]
unsafe extern "C" {
    fn run_leaf(
        config_path: *const c_char,
        outbound_interface: *const c_char,
        on_dns: extern "C" fn(*const c_char),
    ) -> *mut c_void;
    fn stop_leaf(leaf: *mut c_void);
    fn leaf_test_config(config_path: *const c_char) -> i32;

    fn netstack_register(
        on_receive: extern "C" fn(*mut u8, usize, *mut c_void),
        context: *mut c_void,
    ) -> *mut c_void;
    fn netstack_send(handle: *mut c_void, data: *mut u8, size: usize) -> i32;
    fn netstack_release(handle: *mut c_void) -> *mut c_void;
}

fn c_string(value: &str) -> Result<CString, EngineError> {
    CString::new(value).map_err(|_| EngineError::InvalidArgument(value.to_string()))
}

/// The leaf proxy engine
#[derive(Debug, Default, Clone, Copy)]
pub struct LeafEngine;

impl ProxyEngine for LeafEngine {
    fn start(
        &self,
        config_path: &str,
        outbound_interface: Option<&str>,
        on_dns: &mut dyn FnMut(&str),
    ) -> Result<SessionHandle, EngineError> {
        let config_path = c_string(config_path)?;
        let outbound_interface = outbound_interface.map(c_string).transpose()?;

        reset_discovered_dns();
        // SAFETY: both strings outlive the call; the callback matches the
        // declared signature
        let leaf = unsafe {
            run_leaf(
                config_path.as_ptr(),
                outbound_interface.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                collect_dns,
            )
        };

        for server in take_discovered_dns() {
            on_dns(&server);
        }

        let session = SessionHandle::from_raw(leaf as usize).ok_or(EngineError::StartFailed)?;
        debug!("Leaf started: {:?}", session);
        Ok(session)
    }

    fn stop(&self, session: SessionHandle) {
        // SAFETY: the handle came from `run_leaf` and is stopped once
        unsafe { stop_leaf(session.as_raw() as *mut c_void) };
    }

    fn test_config(&self, config_path: &str) -> ConfigTestResult {
        let Ok(config_path) = c_string(config_path) else {
            return ConfigTestResult::ConfigError;
        };
        // SAFETY: the string outlives the call
        ConfigTestResult::from_code(unsafe { leaf_test_config(config_path.as_ptr()) })
    }
}

/// The leaf user-space network stack
#[derive(Debug, Default, Clone, Copy)]
pub struct LeafNetStack;

impl NetStack for LeafNetStack {
    fn register(&self, sink: PacketSink) -> Result<StackHandle, NetStackError> {
        let context = Box::into_raw(Box::new(sink)) as *mut c_void;
        // SAFETY: the callback matches the declared signature; `context`
        // stays valid until released
        let handle = unsafe { netstack_register(deliver_packet, context) };

        match StackHandle::from_raw(handle as usize) {
            Some(handle) => Ok(handle),
            None => {
                // SAFETY: registration failed, so leaf never kept `context`
                drop(unsafe { Box::from_raw(context as *mut PacketSink) });
                Err(NetStackError::RegistrationFailed)
            }
        }
    }

    fn send(&self, stack: &StackHandle, packet: &[u8]) -> i32 {
        // SAFETY: leaf copies the packet and does not write through `data`
        unsafe {
            netstack_send(
                stack.as_raw() as *mut c_void,
                packet.as_ptr() as *mut u8,
                packet.len(),
            )
        }
    }

    fn release(&self, stack: StackHandle) -> Option<PacketSink> {
        // SAFETY: the handle came from `netstack_register` and is released once
        let context = unsafe { netstack_release(stack.as_raw() as *mut c_void) };
        if context.is_null() {
            warn!("Netstack released without a context");
            return None;
        }
        // SAFETY: `context` is the pointer boxed in `register`
        Some(*unsafe { Box::from_raw(context as *mut PacketSink) })
    }
}
