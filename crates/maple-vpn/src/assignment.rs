//! Route and DNS assignments handed to the OS when a session starts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// An IP route (address + prefix length)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Network address
    pub address: IpAddr,
    /// Prefix length
    pub prefix: u8,
}

impl Route {
    /// Create a new route
    pub fn new(address: IpAddr, prefix: u8) -> Self {
        Self { address, prefix }
    }

    /// Create an IPv4 route
    pub fn ipv4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), prefix)
    }

    /// Check if `addr` falls inside this route
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let IpAddr::V4(network) = self.address else {
            return false;
        };
        if self.prefix == 0 {
            return true;
        }
        let mask = u32::MAX << (32 - u32::from(self.prefix.min(32)));
        (u32::from(network) & mask) == (u32::from(addr) & mask)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

/// Routes the OS sends through the tunnel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteAssignment {
    /// IPv4 routes sent through the tunnel
    pub ipv4_inclusion_routes: Vec<Route>,
    /// IPv4 routes kept off the tunnel
    pub ipv4_exclusion_routes: Vec<Route>,
    /// Keep local subnets off the tunnel
    pub exclude_local_subnets: bool,
}

impl RouteAssignment {
    /// Cover the whole IPv4 space with two /1 routes.
    ///
    /// A single 0.0.0.0/0 loops back through the loopback transport even
    /// with an outbound interface bound, so the default route is split.
    pub fn split_default() -> Self {
        Self {
            ipv4_inclusion_routes: vec![
                Route::ipv4(0, 0, 0, 0, 1),
                Route::ipv4(128, 0, 0, 0, 1),
            ],
            ipv4_exclusion_routes: Vec::new(),
            exclude_local_subnets: true,
        }
    }

    /// Check if `addr` is routed into the tunnel
    pub fn routes(&self, addr: Ipv4Addr) -> bool {
        self.ipv4_inclusion_routes.iter().any(|r| r.contains(addr))
            && !self.ipv4_exclusion_routes.iter().any(|r| r.contains(addr))
    }
}

/// How a domain-name entry matches names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainNameType {
    /// Matches the name and everything under it
    Suffix,
    /// Matches exactly one name
    FullyQualified,
}

/// One domain-name rule of a DNS assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainNameInfo {
    /// Domain name (`"."` matches everything)
    pub name: String,
    /// Match type
    pub name_type: DomainNameType,
    /// DNS servers answering for this name
    pub dns_servers: Vec<String>,
    /// Web proxies for this name
    pub web_proxy_servers: Vec<String>,
}

/// DNS configuration the OS applies while the tunnel is up
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DnsAssignment {
    /// Domain-name rules
    pub domain_names: Vec<DomainNameInfo>,
}

impl DnsAssignment {
    /// Send every name to `servers` through a single `"."` suffix rule
    pub fn catch_all(servers: Vec<String>) -> Self {
        Self {
            domain_names: vec![DomainNameInfo {
                name: ".".to_string(),
                name_type: DomainNameType::Suffix,
                dns_servers: servers,
                web_proxy_servers: Vec::new(),
            }],
        }
    }

    /// All DNS servers in rule order
    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.domain_names
            .iter()
            .flat_map(|d| d.dns_servers.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_default_covers_ipv4() {
        let routes = RouteAssignment::split_default();

        assert_eq!(routes.ipv4_inclusion_routes.len(), 2);
        assert!(routes.exclude_local_subnets);
        assert!(routes.routes(Ipv4Addr::new(0, 0, 0, 0)));
        assert!(routes.routes(Ipv4Addr::new(8, 8, 8, 8)));
        assert!(routes.routes(Ipv4Addr::new(127, 255, 255, 255)));
        assert!(routes.routes(Ipv4Addr::new(128, 0, 0, 0)));
        assert!(routes.routes(Ipv4Addr::new(255, 255, 255, 255)));
    }

    #[test]
    fn test_split_default_avoids_zero_prefix() {
        let routes = RouteAssignment::split_default();
        assert!(routes.ipv4_inclusion_routes.iter().all(|r| r.prefix == 1));
        assert_eq!(routes.ipv4_inclusion_routes[1].to_string(), "128.0.0.0/1");
    }

    #[test]
    fn test_route_contains() {
        let route = Route::ipv4(10, 0, 0, 0, 8);
        assert!(route.contains(Ipv4Addr::new(10, 1, 2, 3)));
        assert!(!route.contains(Ipv4Addr::new(11, 0, 0, 1)));
    }

    #[test]
    fn test_catch_all_dns() {
        let dns = DnsAssignment::catch_all(vec!["1.1.1.1".into(), "8.8.8.8".into()]);

        assert_eq!(dns.domain_names.len(), 1);
        assert_eq!(dns.domain_names[0].name, ".");
        assert_eq!(dns.domain_names[0].name_type, DomainNameType::Suffix);
        assert!(dns.domain_names[0].web_proxy_servers.is_empty());
        assert_eq!(dns.servers().collect::<Vec<_>>(), vec!["1.1.1.1", "8.8.8.8"]);
    }
}
