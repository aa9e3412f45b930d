use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit path prefix to the databases (None = search standard dirs)
    pub db_path: Option<PathBuf>,
    /// Explicit geo database file names (empty = default candidate list)
    pub geo_files: Vec<String>,
    /// ASN database file name
    pub asn_file: String,
    /// Locale for country/city names
    pub lang: String,
    /// Maximum RTT per probe
    pub max_rtt: Duration,
    /// Maximum TTL
    pub max_ttl: u8,
    /// IPv4 source address override
    pub source: Option<Ipv4Addr>,
    /// IPv6 source address override
    pub source6: Option<Ipv6Addr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            geo_files: Vec::new(),
            asn_file: "GeoLite2-ASN.mmdb".to_string(),
            lang: "en".to_string(),
            max_rtt: Duration::from_secs(5),
            max_ttl: 30,
            source: None,
            source6: None,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            db_path: args.path.clone(),
            geo_files: args.geo.clone(),
            asn_file: args.asn.clone(),
            lang: args.lang.clone(),
            max_rtt: Duration::from_secs(args.max_rtt),
            max_ttl: args.max_ttl,
            source: args.source,
            source6: args.source6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from(["geotrace", "-l", "de", "-r", "2", "-m", "15", "8.8.8.8"]);
        let config = Config::from(&args);

        assert_eq!(config.lang, "de");
        assert_eq!(config.max_rtt, Duration::from_secs(2));
        assert_eq!(config.max_ttl, 15);
        assert!(config.geo_files.is_empty());
        assert_eq!(config.asn_file, "GeoLite2-ASN.mmdb");
    }
}
