//! In-memory stand-ins for the engine, the network stack and the OS channel.

use crate::channel::{ChannelError, PacketBuffer, SessionParams, VpnChannel};
use crate::engine::{ConfigTestResult, EngineError, NetStack, NetStackError, ProxyEngine, SEND_OK};
use crate::handle::{SessionHandle, StackHandle};
use crate::queue::PacketSink;
use parking_lot::Mutex;
use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Ordered record of collaborator calls, shareable between fakes
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn record(&self, event: &str) {
        self.0.lock().push(event.to_string());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

#[derive(Default)]
pub struct FakeEngine {
    dns: Vec<String>,
    fail: bool,
    started: AtomicUsize,
    stopped: AtomicUsize,
    last_start: Mutex<Option<(String, Option<String>)>>,
    log: EventLog,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dns(servers: &[&str]) -> Self {
        Self {
            dns: servers.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn last_start(&self) -> Option<(String, Option<String>)> {
        self.last_start.lock().clone()
    }
}

impl ProxyEngine for FakeEngine {
    fn start(
        &self,
        config_path: &str,
        outbound_interface: Option<&str>,
        on_dns: &mut dyn FnMut(&str),
    ) -> Result<SessionHandle, EngineError> {
        self.log.record("engine.start");
        *self.last_start.lock() = Some((
            config_path.to_string(),
            outbound_interface.map(str::to_string),
        ));
        if self.fail {
            return Err(EngineError::StartFailed);
        }
        for server in &self.dns {
            on_dns(server);
        }
        let id = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionHandle::from_raw(0x1000 + id).expect("non-null"))
    }

    fn stop(&self, _session: SessionHandle) {
        self.log.record("engine.stop");
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn test_config(&self, config_path: &str) -> ConfigTestResult {
        if config_path.ends_with(".conf") {
            ConfigTestResult::Ok
        } else {
            ConfigTestResult::ConfigError
        }
    }
}

#[derive(Default)]
pub struct FakeNetStack {
    fail: bool,
    reject_sends: AtomicBool,
    sink: Mutex<Option<PacketSink>>,
    sent: Mutex<Vec<Vec<u8>>>,
    registered: AtomicUsize,
    released: AtomicUsize,
    log: EventLog,
}

impl FakeNetStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn reject_sends(&self, reject: bool) {
        self.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Act as the stack's receive thread handing a packet out
    pub fn receive(&self, packet: &[u8]) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.deliver(packet);
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl NetStack for FakeNetStack {
    fn register(&self, sink: PacketSink) -> Result<StackHandle, NetStackError> {
        self.log.record("netstack.register");
        if self.fail {
            return Err(NetStackError::RegistrationFailed);
        }
        *self.sink.lock() = Some(sink);
        let id = self.registered.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StackHandle::from_raw(0x2000 + id).expect("non-null"))
    }

    fn send(&self, _stack: &StackHandle, packet: &[u8]) -> i32 {
        self.sent.lock().push(packet.to_vec());
        if self.reject_sends.load(Ordering::SeqCst) {
            -1
        } else {
            SEND_OK
        }
    }

    fn release(&self, _stack: StackHandle) -> Option<PacketSink> {
        self.log.record("netstack.release");
        self.released.fetch_add(1, Ordering::SeqCst);
        self.sink.lock().take()
    }
}

pub struct FakeChannel {
    buffer_capacity: usize,
    fail_start: bool,
    fail_stop: bool,
    transport: Mutex<Option<Arc<UdpSocket>>>,
    params: Mutex<Option<SessionParams>>,
    terminations: Mutex<Vec<String>>,
    stops: AtomicUsize,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::with_buffer_capacity(1512)
    }

    pub fn with_buffer_capacity(capacity: usize) -> Self {
        Self {
            buffer_capacity: capacity,
            fail_start: false,
            fail_stop: false,
            transport: Mutex::new(None),
            params: Mutex::new(None),
            terminations: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::new()
        }
    }

    pub fn associated_transport(&self) -> Option<Arc<UdpSocket>> {
        self.transport.lock().clone()
    }

    pub fn started_params(&self) -> Option<SessionParams> {
        self.params.lock().clone()
    }

    pub fn terminations(&self) -> Vec<String> {
        self.terminations.lock().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl VpnChannel for FakeChannel {
    fn associate_transport(&self, transport: Arc<UdpSocket>) -> Result<(), ChannelError> {
        *self.transport.lock() = Some(transport);
        Ok(())
    }

    fn start_with_main_transport(
        &self,
        params: SessionParams,
        _transport: Arc<UdpSocket>,
    ) -> Result<(), ChannelError> {
        if self.fail_start {
            return Err(ChannelError::Start("access denied".into()));
        }
        *self.params.lock() = Some(params);
        Ok(())
    }

    fn stop(&self) -> Result<(), ChannelError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(ChannelError::Stop("not started".into()));
        }
        Ok(())
    }

    fn terminate_connection(&self, message: &str) {
        self.terminations.lock().push(message.to_string());
    }

    fn receive_packet_buffer(&self) -> PacketBuffer {
        PacketBuffer::with_capacity(self.buffer_capacity)
    }
}
