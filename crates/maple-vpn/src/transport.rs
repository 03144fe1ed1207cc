//! Loopback Transport Pair
//!
//! Two UDP sockets bound to `127.0.0.1` and connected to each other. The
//! main endpoint is handed to the OS VPN channel as its "real" transport;
//! the back endpoint is written to whenever decapsulated packets are
//! waiting, which wakes the channel's read loop on the other side.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use tracing::{debug, trace};

/// Payload of the wake datagram
const WAKE_PAYLOAD: [u8; 1] = [0];

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind loopback endpoint: {0}")]
    Bind(#[source] io::Error),

    #[error("Failed to connect loopback endpoints: {0}")]
    Connect(#[source] io::Error),

    #[error("Failed to configure loopback endpoint: {0}")]
    Configure(#[source] io::Error),
}

/// Cross-connected pair of localhost datagram sockets
#[derive(Debug)]
pub struct LoopbackPair {
    /// Endpoint associated with the OS channel
    main: Arc<UdpSocket>,
    /// Endpoint the receive path writes wake datagrams into
    back: Arc<UdpSocket>,
}

impl LoopbackPair {
    /// Bind both endpoints on OS-chosen ports, then connect each one to the
    /// other's resolved address.
    pub fn bind() -> Result<Self, TransportError> {
        let localhost = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));

        let main = UdpSocket::bind(localhost).map_err(TransportError::Bind)?;
        let back = UdpSocket::bind(localhost).map_err(TransportError::Bind)?;

        let main_addr = main.local_addr().map_err(TransportError::Bind)?;
        let back_addr = back.local_addr().map_err(TransportError::Bind)?;

        main.connect(back_addr).map_err(TransportError::Connect)?;
        back.connect(main_addr).map_err(TransportError::Connect)?;

        // Wake writes must never stall the netstack thread
        back.set_nonblocking(true)
            .map_err(TransportError::Configure)?;

        debug!("Loopback pair bound: {} <-> {}", main_addr, back_addr);

        Ok(Self {
            main: Arc::new(main),
            back: Arc::new(back),
        })
    }

    /// The endpoint handed to the OS channel
    pub fn main(&self) -> &Arc<UdpSocket> {
        &self.main
    }

    /// Local address of the main endpoint
    pub fn main_addr(&self) -> io::Result<SocketAddr> {
        self.main.local_addr()
    }

    /// Local address of the back endpoint
    pub fn back_addr(&self) -> io::Result<SocketAddr> {
        self.back.local_addr()
    }

    /// Output capability of the back endpoint
    pub fn wake_signal(&self) -> WakeSignal {
        WakeSignal {
            socket: self.back.clone(),
        }
    }

    /// Split into the main endpoint and the back endpoint's wake signal
    pub fn into_parts(self) -> (Arc<UdpSocket>, WakeSignal) {
        (self.main, WakeSignal { socket: self.back })
    }
}

/// Write side of the back endpoint, used to wake the OS channel.
#[derive(Debug, Clone)]
pub struct WakeSignal {
    socket: Arc<UdpSocket>,
}

impl WakeSignal {
    /// Send a single wake datagram.
    ///
    /// Send and ignore: a lost wake-up only delays delivery until the next
    /// `decapsulate` poll, which still finds the queued data.
    pub fn notify(&self) {
        if let Err(e) = self.socket.send(&WAKE_PAYLOAD) {
            trace!("Wake datagram not sent: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pair_is_cross_connected() {
        let pair = LoopbackPair::bind().unwrap();

        let main_addr = pair.main_addr().unwrap();
        let back_addr = pair.back_addr().unwrap();
        assert!(main_addr.ip().is_loopback());
        assert!(back_addr.ip().is_loopback());
        assert_ne!(main_addr.port(), 0);
        assert_ne!(back_addr.port(), 0);
        assert_eq!(pair.main().peer_addr().unwrap(), back_addr);
    }

    #[test]
    fn test_wake_signal_reaches_main() {
        let pair = LoopbackPair::bind().unwrap();
        pair.main()
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();

        pair.wake_signal().notify();

        let mut buf = [0xFFu8; 8];
        let n = pair.main().recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &WAKE_PAYLOAD);
    }

    #[test]
    fn test_notify_after_main_dropped_is_ignored() {
        let pair = LoopbackPair::bind().unwrap();
        let (main, wake) = pair.into_parts();
        drop(main);

        // May fail with ECONNREFUSED on some platforms; must not panic
        wake.notify();
        wake.notify();
    }
}
