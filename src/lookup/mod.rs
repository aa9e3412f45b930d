pub mod asn;
pub mod geo;
pub mod resolver;

pub use asn::AsnLookup;
pub use geo::GeoLookup;
pub use resolver::{open_databases, DatabaseSet, ResolveError};

use std::collections::HashMap;
use std::net::IpAddr;

use thiserror::Error;

/// Per-hop lookup failure. Absorbed by the enrichment engine: the affected
/// field stays empty, the row is still produced.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("database lookup failed: {0}")]
    Database(#[from] maxminddb::MaxMindDBError),
}

/// Country/city record with translated names keyed by locale
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityRecord {
    pub country_names: HashMap<String, String>,
    pub city_names: HashMap<String, String>,
}

impl CityRecord {
    /// Compose the display label for a locale: `"<country>"` or
    /// `"<country>/<city>"`. Empty when the locale has no entry.
    pub fn location_label(&self, lang: &str) -> String {
        let mut label = self
            .country_names
            .get(lang)
            .cloned()
            .unwrap_or_default();

        if let Some(city) = self.city_names.get(lang) {
            if !city.is_empty() {
                label.push('/');
                label.push_str(city);
            }
        }

        label
    }
}

/// ASN record resolved from the optional database (0 = unknown number)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnRecord {
    pub number: u32,
    pub organization: String,
}

/// Offline geo database reader, as consumed by the enrichment engine
pub trait GeoReader {
    fn lookup_city(&self, ip: IpAddr) -> Result<CityRecord, LookupError>;
}

/// Offline ASN database reader, as consumed by the enrichment engine
pub trait AsnReader {
    fn lookup_asn(&self, ip: IpAddr) -> Result<AsnRecord, LookupError>;
}

/// Sanitize a string for safe terminal display by removing control characters.
///
/// Database name fields end up on the terminal verbatim, so strip anything
/// that could carry escape sequences.
pub(crate) fn sanitize_display(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}
