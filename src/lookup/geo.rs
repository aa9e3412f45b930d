use maxminddb::{geoip2, MaxMindDBError, Reader};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use super::{sanitize_display, CityRecord, GeoReader, LookupError};

/// Mandatory geo lookup over a MaxMind GeoIP2/GeoLite2 database
pub struct GeoLookup {
    reader: Reader<Vec<u8>>,
    cache: RwLock<HashMap<IpAddr, CityRecord>>,
}

impl GeoLookup {
    /// Open a database file; the country-level databases share the City
    /// record layout, so one reader covers the whole candidate list.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, MaxMindDBError> {
        let reader = Reader::open_readfile(db_path)?;

        Ok(Self {
            reader,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn do_lookup(&self, ip: IpAddr) -> Result<CityRecord, LookupError> {
        let city: geoip2::City = self.reader.lookup(ip)?;

        let country_names = city
            .country
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .map(collect_names)
            .unwrap_or_default();

        let city_names = city
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .map(collect_names)
            .unwrap_or_default();

        Ok(CityRecord {
            country_names,
            city_names,
        })
    }
}

impl GeoReader for GeoLookup {
    /// Lookup the country/city record for an IP, using the cache.
    /// Repeated responder addresses across TTLs hit the cache.
    fn lookup_city(&self, ip: IpAddr) -> Result<CityRecord, LookupError> {
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

fn collect_names(names: &std::collections::BTreeMap<&str, &str>) -> HashMap<String, String> {
    names
        .iter()
        .map(|(lang, name)| (lang.to_string(), sanitize_display(name)))
        .collect()
}
