use std::io::Write;
use std::time::Duration;

use tabled::builder::Builder;
use tabled::settings::Style;

use crate::enrich::{EnrichedRow, RowOutcome};

/// Sentinel shown when a hop has no responder address
const NO_ADDRESS: &str = "*";

/// Render the enriched rows as a table, written to the sink in one pass.
///
/// The `ASN`/`ASN Org` columns exist only when the ASN database was opened;
/// the header is fixed for the whole run regardless of per-row AS data.
pub fn render_report<W: Write>(
    rows: &[EnrichedRow],
    asn_available: bool,
    mut writer: W,
) -> std::io::Result<()> {
    let mut builder = Builder::default();

    let mut header = vec!["#", "IP", "Host", "RTT", "Country/City"];
    if asn_available {
        header.extend(["ASN", "ASN Org"]);
    }
    builder.push_record(header);

    for row in rows {
        builder.push_record(render_row(row, asn_available));
    }

    let table = builder.build().with(Style::rounded()).to_string();
    writeln!(writer, "{}", table)
}

fn render_row(row: &EnrichedRow, asn_available: bool) -> Vec<String> {
    let ip = row
        .addr
        .map(|a| a.to_string())
        .unwrap_or_else(|| NO_ADDRESS.to_string());

    match &row.outcome {
        RowOutcome::Failed { message } => {
            // Sparse row: failure message in the Host position, the
            // remaining declared columns stay blank
            vec![row.ordinal.to_string(), ip, message.clone()]
        }
        RowOutcome::Reply {
            host,
            rtt,
            location,
            as_number,
            as_org,
        } => {
            let mut cells = vec![
                row.ordinal.to_string(),
                ip,
                host.clone(),
                format_rtt(*rtt),
                location.clone(),
            ];
            if asn_available && *as_number > 0 {
                cells.push(as_number.to_string());
                cells.push(as_org.clone());
            }
            cells
        }
    }
}

fn format_rtt(rtt: Duration) -> String {
    format!("{:.3}ms", rtt.as_secs_f64() * 1000.0)
}

/// Render to a string, for tests and non-stream consumers
pub fn render_report_string(rows: &[EnrichedRow], asn_available: bool) -> String {
    let mut buf = Vec::new();
    render_report(rows, asn_available, &mut buf).expect("writing to a Vec cannot fail");
    String::from_utf8(buf).expect("table output is UTF-8")
}
