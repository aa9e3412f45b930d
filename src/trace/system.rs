use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::net::IpAddr;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;

use super::{HopError, ProbeEngine, ProbeHop, TraceError, TraceSpec};

/// Probe engine backed by the platform `traceroute` binary.
///
/// The engine is consumed purely through its line-oriented output: one hop
/// per line, in TTL order. Probing mechanics (socket family, protocol,
/// privilege handling) stay inside the external program.
pub struct SystemTraceroute {
    program: OsString,
}

impl Default for SystemTraceroute {
    fn default() -> Self {
        Self::with_program("traceroute")
    }
}

impl SystemTraceroute {
    /// Use an alternative engine binary with traceroute-compatible output
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, spec: &TraceSpec) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-q")
            .arg("1")
            .arg("-m")
            .arg(spec.max_ttl.to_string())
            .arg("-w")
            .arg(spec.max_rtt.as_secs().max(1).to_string());

        // Source override matching the target's address family
        match spec.target {
            IpAddr::V4(_) => {
                if let Some(src) = spec.source {
                    cmd.arg("-s").arg(src.to_string());
                }
            }
            IpAddr::V6(_) => {
                if let Some(src) = spec.source6 {
                    cmd.arg("-s").arg(src.to_string());
                }
            }
        }

        cmd.arg(spec.target.to_string());
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }
}

impl ProbeEngine for SystemTraceroute {
    fn run_trace(
        &self,
        spec: &TraceSpec,
        progress: &mut dyn FnMut(&ProbeHop),
    ) -> Result<Vec<ProbeHop>, TraceError> {
        let mut child = self.command(spec).spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TraceError::Engine("trace engine produced no output stream".into()))?;

        // Drain stderr on its own thread so the engine cannot block on a
        // full stderr pipe while we are still reading hops
        let stderr_reader = child.stderr.take().map(|mut err| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                err.read_to_string(&mut buf).ok();
                buf
            })
        });

        let mut hops = Vec::new();
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            if let Some(hop) = parse_hop_line(&line) {
                progress(&hop);
                hops.push(hop);
            } else {
                debug!(line = %line, "skipping unparseable trace engine line");
            }
        }

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let status = child.wait()?;

        if hops.is_empty() {
            let reason = if stderr.trim().is_empty() {
                format!("no hops reported (exit status {})", status)
            } else {
                stderr.trim().to_string()
            };
            return Err(TraceError::Engine(reason));
        }

        Ok(hops)
    }
}

/// Parse one `traceroute -q 1` output line into a hop.
///
/// Recognized forms:
/// ```text
///  1  gateway (192.168.1.1)  0.574 ms
///  2  *
///  3  203.0.113.9  11.2 ms
///  4  r1.example.net (203.0.113.9) [AS64500]  12.345 ms
///  5  r2.example.net (203.0.113.10)  9.1 ms !H
/// ```
/// Returns None for the banner line and anything else unrecognized.
pub fn parse_hop_line(line: &str) -> Option<ProbeHop> {
    let mut tokens = line.split_whitespace();
    let ttl: usize = tokens.next()?.parse().ok()?;

    let first = tokens.next()?;
    if first == "*" {
        return Some(ProbeHop::timed_out(ttl));
    }

    let mut host = String::new();
    let mut addr: Option<IpAddr> = None;
    let mut route_as = 0u32;
    let mut rtt = Duration::ZERO;
    let mut error = None;

    // First token is either a bare address or a reverse-DNS name
    // followed by the address in parentheses.
    if let Ok(ip) = first.parse::<IpAddr>() {
        addr = Some(ip);
    } else {
        host = first.to_string();
    }

    let mut pending_ms: Option<f64> = None;
    for token in tokens {
        if let Some(inner) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            if let Ok(ip) = inner.parse::<IpAddr>() {
                addr = Some(ip);
            }
        } else if let Some(inner) = token
            .strip_prefix("[AS")
            .and_then(|t| t.strip_suffix(']'))
        {
            route_as = inner.parse().unwrap_or(0);
        } else if token == "ms" {
            if let Some(value) = pending_ms.take() {
                rtt = Duration::from_secs_f64(value / 1000.0);
            }
        } else if let Some(flag) = token.strip_prefix('!') {
            // !H, !N, !X and friends: the hop answered with an ICMP error
            error = Some(HopError::Probe(format!("!{}", flag)));
        } else if let Ok(value) = token.parse::<f64>() {
            pending_ms = Some(value);
        }
    }

    addr?;
    Some(ProbeHop {
        ttl,
        addr,
        host,
        rtt,
        route_as,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_hop() {
        let hop = parse_hop_line(" 1  _gateway (192.168.1.1)  0.574 ms").unwrap();
        assert_eq!(hop.ttl, 1);
        assert_eq!(hop.host, "_gateway");
        assert_eq!(hop.addr, Some("192.168.1.1".parse().unwrap()));
        assert_eq!(hop.rtt, Duration::from_micros(574));
        assert_eq!(hop.route_as, 0);
        assert!(hop.error.is_none());
    }

    #[test]
    fn test_parse_starred_hop() {
        let hop = parse_hop_line(" 7  *").unwrap();
        assert_eq!(hop.ttl, 7);
        assert_eq!(hop.error, Some(HopError::Timeout));
        assert!(hop.addr.is_none());
    }

    #[test]
    fn test_parse_bare_address_hop() {
        let hop = parse_hop_line(" 3  203.0.113.9  11.2 ms").unwrap();
        assert_eq!(hop.addr, Some("203.0.113.9".parse().unwrap()));
        assert!(hop.host.is_empty());
        assert_eq!(hop.rtt, Duration::from_secs_f64(0.0112));
    }

    #[test]
    fn test_parse_as_annotated_hop() {
        let hop =
            parse_hop_line(" 4  r1.example.net (203.0.113.9) [AS64500]  12.345 ms").unwrap();
        assert_eq!(hop.route_as, 64500);
        assert_eq!(hop.host, "r1.example.net");
    }

    #[test]
    fn test_parse_icmp_error_hop() {
        let hop = parse_hop_line(" 5  r2.example.net (203.0.113.10)  9.1 ms !H").unwrap();
        assert_eq!(hop.error, Some(HopError::Probe("!H".to_string())));
        assert_eq!(hop.addr, Some("203.0.113.10".parse().unwrap()));
    }

    #[test]
    fn test_banner_line_skipped() {
        let line = "traceroute to example.com (93.184.215.14), 30 hops max, 60 byte packets";
        assert!(parse_hop_line(line).is_none());
    }

    #[test]
    fn test_ipv6_hop() {
        let hop = parse_hop_line(" 2  2001:db8::1 (2001:db8::1)  3.4 ms").unwrap();
        assert_eq!(hop.addr, Some("2001:db8::1".parse().unwrap()));
    }

    #[cfg(unix)]
    fn stub_engine(dir: &std::path::Path, script: &str) -> SystemTraceroute {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("engine.sh");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        SystemTraceroute::with_program(path)
    }

    #[cfg(unix)]
    fn spec() -> TraceSpec {
        TraceSpec {
            target: "192.0.2.1".parse().unwrap(),
            source: None,
            source6: None,
            max_rtt: Duration::from_secs(1),
            max_ttl: 5,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_noisy_stderr_does_not_stall_hop_reading() {
        // Writes well past pipe capacity on stderr before the first hop line;
        // the run must still complete with both hops
        let dir = tempfile::tempdir().unwrap();
        let engine = stub_engine(
            dir.path(),
            "#!/bin/sh\n\
             head -c 262144 /dev/zero | tr '\\0' 'e' 1>&2\n\
             echo ' 1  gateway (192.168.1.1)  0.5 ms'\n\
             echo ' 2  *'\n",
        );

        let hops = engine.run_trace(&spec(), &mut |_| {}).unwrap();

        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0].addr, Some("192.168.1.1".parse().unwrap()));
        assert_eq!(hops[1].error, Some(HopError::Timeout));
    }

    #[cfg(unix)]
    #[test]
    fn test_no_hops_reports_engine_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let engine = stub_engine(
            dir.path(),
            "#!/bin/sh\n\
             echo 'engine exploded' 1>&2\n\
             exit 1\n",
        );

        let err = engine.run_trace(&spec(), &mut |_| {}).unwrap_err();

        match err {
            TraceError::Engine(reason) => assert_eq!(reason, "engine exploded"),
            other => panic!("expected engine error, got {:?}", other),
        }
    }
}
