use maxminddb::{geoip2, MaxMindDBError, Reader};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use super::{sanitize_display, AsnReader, AsnRecord, LookupError};

/// Optional ASN lookup over a MaxMind GeoLite2-ASN database
pub struct AsnLookup {
    reader: Reader<Vec<u8>>,
    cache: RwLock<HashMap<IpAddr, AsnRecord>>,
}

impl AsnLookup {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, MaxMindDBError> {
        let reader = Reader::open_readfile(db_path)?;

        Ok(Self {
            reader,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn do_lookup(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
        let asn: geoip2::Asn = self.reader.lookup(ip)?;

        Ok(AsnRecord {
            number: asn.autonomous_system_number.unwrap_or(0),
            organization: asn
                .autonomous_system_organization
                .map(sanitize_display)
                .unwrap_or_default(),
        })
    }
}

impl AsnReader for AsnLookup {
    /// Lookup the AS record for an IP, using the cache
    fn lookup_asn(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
        {
            let cache = self.cache.read();
            if let Some(record) = cache.get(&ip) {
                return Ok(record.clone());
            }
        }

        let record = self.do_lookup(ip)?;
        self.cache.write().insert(ip, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        assert!(AsnLookup::open("/nonexistent/GeoLite2-ASN.mmdb").is_err());
    }
}
