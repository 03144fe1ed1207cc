//! Outbound interface selector.
//!
//! The engine binds its outbound sockets to an interface identified by the
//! interface's addresses: every IPv4 address first, then every IPv6
//! address, comma-separated.

use std::net::IpAddr;

/// A network interface as the settings page presents it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Netif {
    /// Human-readable description
    pub description: String,
    /// Unicast addresses in adapter order
    pub addresses: Vec<IpAddr>,
}

impl Netif {
    /// Create a new interface entry
    pub fn new(description: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        Self {
            description: description.into(),
            addresses,
        }
    }

    /// Selector string stored under the `NETIF` settings key
    pub fn selector(&self) -> String {
        let v4 = self.addresses.iter().filter(|a| a.is_ipv4());
        let v6 = self.addresses.iter().filter(|a| a.is_ipv6());
        v4.chain(v6)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Short address count, e.g. "1 IPv4 address; 2 IPv6 addresses"
    pub fn ip_summary(&self) -> String {
        let v4 = self.addresses.iter().filter(|a| a.is_ipv4()).count();
        let v6 = self.addresses.len() - v4;
        format!(
            "{} IPv4 address{}; {} IPv6 address{}",
            v4,
            if v4 > 1 { "es" } else { "" },
            v6,
            if v6 > 1 { "es" } else { "" }
        )
    }

    /// One address per line, adapter order
    pub fn ip_lines(&self) -> String {
        self.addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}
