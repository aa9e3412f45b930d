use clap::Parser;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

/// Traceroute with per-hop GeoIP and ASN annotation from local MaxMind databases
#[derive(Parser, Debug, Clone)]
#[command(name = "geotrace")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host to trace (IP address or hostname)
    #[arg(required = true)]
    pub target: String,

    /// Path prefix to MaxMind databases
    #[arg(short = 'p', long = "path")]
    pub path: Option<PathBuf>,

    /// MaxMind GeoIP2 database file name (repeatable, tried in order)
    #[arg(short = 'g', long = "geo")]
    pub geo: Vec<String>,

    /// MaxMind ASN database file name (optional database)
    #[arg(short = 'a', long = "asn", default_value = "GeoLite2-ASN.mmdb")]
    pub asn: String,

    /// Country/City locale
    #[arg(short = 'l', long = "lang", default_value = "en")]
    pub lang: String,

    /// Maximum RTT per probe in seconds
    #[arg(short = 'r', long = "max-rtt", default_value = "5")]
    pub max_rtt: u64,

    /// Maximal TTL (hops)
    #[arg(short = 'm', long = "max-ttl", default_value = "30")]
    pub max_ttl: u8,

    /// IPv4 source address
    #[arg(short = 's', long = "source")]
    pub source: Option<Ipv4Addr>,

    /// IPv6 source address
    #[arg(short = '6', long = "source6")]
    pub source6: Option<Ipv6Addr>,
}

impl Args {
    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.max_ttl == 0 {
            return Err("Max TTL must be at least 1".into());
        }

        if self.max_rtt == 0 {
            return Err("Max RTT must be at least 1 second".into());
        }

        if self.lang.is_empty() {
            return Err("Locale cannot be empty".into());
        }

        if self.geo.iter().any(|name| name.is_empty()) {
            return Err("Geo database file names cannot be empty".into());
        }

        Ok(())
    }
}
