use std::net::IpAddr;
use std::time::Duration;

use tracing::warn;

use crate::lookup::{AsnReader, AsnRecord, GeoReader};
use crate::trace::{HopError, ProbeHop};

/// Failure marker used for hops that never answered
pub const TIMEOUT_MESSAGE: &str = "<timeout>";

/// What a hop produced: either a reply with its annotations, or a failure
/// message. Structurally one or the other, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Reply {
        /// Reverse-DNS name, trailing root-label dot already trimmed
        host: String,
        /// Round-trip time, microsecond granularity
        rtt: Duration,
        /// `"<country>"` or `"<country>/<city>"`, empty when unavailable
        location: String,
        /// Reconciled AS number (0 = unknown)
        as_number: u32,
        /// Organization for `as_number`; empty in the route-metadata
        /// fallback case
        as_org: String,
    },
    Failed {
        message: String,
    },
}

/// One table row: a probe hop merged with its database annotations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRow {
    /// 1-based hop index along the path, carried from the probe hop's TTL
    pub ordinal: usize,
    /// Responder address, absent for unanswered hops
    pub addr: Option<IpAddr>,
    pub outcome: RowOutcome,
}

/// Merge the ordered hop sequence with database lookups.
///
/// The output has the same length and ordinal order as the input: hops are
/// never filtered or reordered. All lookup failures are absorbed into the
/// affected row; nothing here aborts the run.
pub fn enrich_hops<G, A>(
    hops: &[ProbeHop],
    geo: &G,
    asn: Option<&A>,
    lang: &str,
) -> Vec<EnrichedRow>
where
    G: GeoReader,
    A: AsnReader,
{
    hops.iter()
        .map(|hop| enrich_hop(hop, geo, asn, lang))
        .collect()
}

fn enrich_hop<G, A>(hop: &ProbeHop, geo: &G, asn: Option<&A>, lang: &str) -> EnrichedRow
where
    G: GeoReader,
    A: AsnReader,
{
    if let Some(ref error) = hop.error {
        let message = match error {
            HopError::Timeout => TIMEOUT_MESSAGE.to_string(),
            HopError::Probe(text) => text.clone(),
        };
        return EnrichedRow {
            ordinal: hop.ttl,
            addr: hop.addr,
            outcome: RowOutcome::Failed { message },
        };
    }

    // A replied hop always carries an address; guard anyway so a misbehaving
    // engine degrades to a failed row instead of a bogus lookup.
    let Some(ip) = hop.addr else {
        return EnrichedRow {
            ordinal: hop.ttl,
            addr: None,
            outcome: RowOutcome::Failed {
                message: TIMEOUT_MESSAGE.to_string(),
            },
        };
    };

    let location = match geo.lookup_city(ip) {
        Ok(record) => record.location_label(lang),
        Err(e) => {
            warn!(%ip, error = %e, "geo lookup failed");
            String::new()
        }
    };

    let resolved = match asn {
        Some(reader) => match reader.lookup_asn(ip) {
            Ok(record) => record,
            Err(e) => {
                warn!(%ip, error = %e, "ASN lookup failed");
                AsnRecord::default()
            }
        },
        None => AsnRecord::default(),
    };
    let (as_number, as_org) = reconcile_as(resolved, hop.route_as);

    EnrichedRow {
        ordinal: hop.ttl,
        addr: Some(ip),
        outcome: RowOutcome::Reply {
            host: trim_root_dot(&hop.host),
            rtt: round_to_micros(hop.rtt),
            location,
            as_number,
            as_org,
        },
    }
}

/// AS reconciliation: the database number wins when non-zero; a zero
/// database number falls back to the route-inferred number, which carries
/// no organization name.
fn reconcile_as(resolved: AsnRecord, route_as: u32) -> (u32, String) {
    if resolved.number == 0 && route_as > 0 {
        (route_as, String::new())
    } else {
        (resolved.number, resolved.organization)
    }
}

/// Trim exactly one trailing `.` (DNS root-label artifact)
fn trim_root_dot(host: &str) -> String {
    host.strip_suffix('.').unwrap_or(host).to_string()
}

/// Round to the nearest microsecond for display
fn round_to_micros(rtt: Duration) -> Duration {
    let micros = (rtt.as_nanos() + 500) / 1_000;
    Duration::from_micros(micros as u64)
}
