pub mod system;

pub use system::SystemTraceroute;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

/// Why a hop produced no usable reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopError {
    /// No reply within the probe deadline
    Timeout,
    /// Any other per-hop network error
    Probe(String),
}

/// Result of probing a single TTL, as reported by the probe engine
#[derive(Debug, Clone)]
pub struct ProbeHop {
    /// 1-based hop index along the path
    pub ttl: usize,
    /// Responder address, absent when the hop timed out or errored
    pub addr: Option<IpAddr>,
    /// Reverse-DNS name, possibly empty, possibly trailing-dot-terminated
    pub host: String,
    /// Measured round-trip time
    pub rtt: Duration,
    /// AS number the engine inferred from routing metadata (0 = unknown)
    pub route_as: u32,
    /// Set when the hop produced no usable reply
    pub error: Option<HopError>,
}

impl ProbeHop {
    /// A hop that never got a reply within the deadline
    pub fn timed_out(ttl: usize) -> Self {
        Self {
            ttl,
            addr: None,
            host: String::new(),
            rtt: Duration::ZERO,
            route_as: 0,
            error: Some(HopError::Timeout),
        }
    }
}

/// Unrecoverable probe-engine failure, aborts the whole run
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("cannot resolve target: {0}")]
    Resolve(String),

    #[error("trace engine i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace engine failed: {0}")]
    Engine(String),
}

/// Parameters for a single trace run
#[derive(Debug, Clone)]
pub struct TraceSpec {
    pub target: IpAddr,
    pub source: Option<Ipv4Addr>,
    pub source6: Option<Ipv6Addr>,
    pub max_rtt: Duration,
    pub max_ttl: u8,
}

/// The external probe engine, consumed as an ordered hop sequence.
///
/// The progress callback fires once per completed hop attempt, purely for
/// incremental user feedback; its result is never consulted.
pub trait ProbeEngine {
    fn run_trace(
        &self,
        spec: &TraceSpec,
        progress: &mut dyn FnMut(&ProbeHop),
    ) -> Result<Vec<ProbeHop>, TraceError>;
}

/// Resolve a target host to an IP address, preferring IPv4
pub fn resolve_target(target: &str) -> Result<IpAddr, TraceError> {
    // Try parsing as IP address first
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = format!("{}:0", target)
        .to_socket_addrs()
        .map_err(|e| TraceError::Resolve(format!("{}: {}", target, e)))?
        .map(|s| s.ip())
        .collect();

    if let Some(ipv4) = addrs.iter().find(|ip| ip.is_ipv4()) {
        return Ok(*ipv4);
    }

    addrs
        .first()
        .copied()
        .ok_or_else(|| TraceError::Resolve(format!("no addresses found for {}", target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_literal_ip() {
        let ip = resolve_target("192.0.2.7").unwrap();
        assert_eq!(ip, "192.0.2.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_resolve_literal_ipv6() {
        let ip = resolve_target("2001:db8::1").unwrap();
        assert!(ip.is_ipv6());
    }

    #[test]
    fn test_resolve_bogus_host_fails() {
        let err = resolve_target("no-such-host.invalid").unwrap_err();
        assert!(matches!(err, TraceError::Resolve(_)));
    }

    #[test]
    fn test_timed_out_hop_shape() {
        let hop = ProbeHop::timed_out(4);
        assert_eq!(hop.ttl, 4);
        assert_eq!(hop.error, Some(HopError::Timeout));
        assert!(hop.addr.is_none());
    }
}
