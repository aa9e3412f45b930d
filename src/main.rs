use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use geotrace::cli::Args;
use geotrace::config::Config;
use geotrace::enrich::enrich_hops;
use geotrace::lookup::open_databases;
use geotrace::report::render_report;
use geotrace::trace::{resolve_target, ProbeEngine, SystemTraceroute, TraceSpec};

// Exit codes: 0 success, 1 mandatory geo database missing, 2 fatal trace
// engine error (unresolvable target included). Fatal paths return through
// main so the open database handles are dropped on every exit.
fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::from(2);
    }
    let config = Config::from(&args);

    // Mandatory geo database: resolution failure aborts before any probing
    let db = match open_databases(&config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::from(1);
        }
    };

    let target = match resolve_target(&args.target) {
        Ok(ip) => ip,
        Err(e) => {
            eprintln!("Traceroute error: {}", e);
            return ExitCode::from(2);
        }
    };

    let spec = TraceSpec {
        target,
        source: config.source,
        source6: config.source6,
        max_rtt: config.max_rtt,
        max_ttl: config.max_ttl,
    };

    // One character per completed hop: reply marker vs generic marker
    let mut progress = |hop: &geotrace::trace::ProbeHop| {
        let mut out = std::io::stdout();
        let marker = if hop.error.is_none() { "!" } else { "*" };
        let _ = write!(out, "{}", marker);
        let _ = out.flush();
    };

    let hops = match SystemTraceroute::default().run_trace(&spec, &mut progress) {
        Ok(hops) => hops,
        Err(e) => {
            eprintln!();
            eprintln!("Traceroute error: {}", e);
            return ExitCode::from(2);
        }
    };

    // Wipe the progress markers before the table prints
    let clear_line = if cfg!(windows) { "\r" } else { "\u{1b}[2K\r" };
    print!("{}", clear_line);

    let rows = enrich_hops(&hops, &db.geo, db.asn.as_ref(), &config.lang);

    if let Err(e) = render_report(&rows, db.asn_available(), std::io::stdout().lock()) {
        eprintln!("Error: failed to write report: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
