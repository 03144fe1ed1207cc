//! C callbacks handed to leaf.
//!
//! Kept apart from the `#[link]` declarations so they run without the leaf
//! library.

use crate::queue::PacketSink;
use std::cell::RefCell;
use std::ffi::{CStr, c_char, c_void};

thread_local! {
    // The DNS callback carries no context, and `run_leaf` invokes it on
    // the calling thread before returning.
    static DISCOVERED_DNS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Forget DNS servers left over from an earlier start on this thread
pub(crate) fn reset_discovered_dns() {
    DISCOVERED_DNS.with(|dns| dns.borrow_mut().clear());
}

/// Take the DNS servers reported on this thread since the last reset
pub(crate) fn take_discovered_dns() -> Vec<String> {
    DISCOVERED_DNS.with(|dns| std::mem::take(&mut *dns.borrow_mut()))
}

/// DNS report callback for `run_leaf`
pub(crate) extern "C" fn collect_dns(server: *const c_char) {
    if server.is_null() {
        return;
    }
    // SAFETY: leaf passes a NUL-terminated string valid for this call
    let server = unsafe { CStr::from_ptr(server) }.to_string_lossy().into_owned();
    DISCOVERED_DNS.with(|dns| dns.borrow_mut().push(server));
}

/// Receive callback for `netstack_register`; `context` is a `*const PacketSink`
pub(crate) extern "C" fn deliver_packet(data: *mut u8, size: usize, context: *mut c_void) {
    if data.is_null() || context.is_null() {
        return;
    }
    // SAFETY: `context` is the boxed sink passed to `netstack_register`,
    // alive until `netstack_release` hands it back
    let sink = unsafe { &*(context as *const PacketSink) };
    // SAFETY: leaf guarantees `size` readable bytes at `data` for this call
    let packet = unsafe { std::slice::from_raw_parts(data, size) };
    sink.deliver(packet);
}
