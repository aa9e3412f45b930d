use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::{AsnLookup, GeoLookup};
use crate::config::Config;

/// Default geo database candidates, most to least specific
const DEFAULT_GEO_FILENAMES: [&str; 4] = [
    "GeoIP2-City.mmdb",
    "GeoLite2-City.mmdb",
    "GeoIP2-Country.mmdb",
    "GeoLite2-Country.mmdb",
];

/// Standard directories searched when no explicit path prefix is given,
/// current directory first
const SEARCH_DIRS: [&str; 4] = [
    ".",
    "/usr/share/GeoIP",
    "/usr/local/share/GeoIP",
    "/var/lib/GeoIP",
];

/// Fatal database resolution failure: the geo database is mandatory
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("GeoIP2 database not found")]
    GeoDatabaseNotFound,
}

/// Opened database handles for the whole run. The geo handle is always
/// present once resolution succeeds; the ASN handle may be absent.
pub struct DatabaseSet {
    pub geo: GeoLookup,
    pub asn: Option<AsnLookup>,
}

impl DatabaseSet {
    /// Whether the optional ASN database was opened. The report header is
    /// fixed for the whole run based on this flag.
    pub fn asn_available(&self) -> bool {
        self.asn.is_some()
    }
}

/// Resolve and open the databases for this run.
///
/// The first geo candidate that opens wins; later candidates are not
/// attempted. No geo candidate opening is fatal. The ASN database is opened
/// independently at the same prefix and its failure is absorbed.
pub fn open_databases(config: &Config) -> Result<DatabaseSet, ResolveError> {
    let prefix = match config.db_path {
        Some(ref path) => path.clone(),
        None => search_default_prefix(),
    };

    let candidates = geo_candidates(&prefix, &config.geo_files);
    let geo = first_openable(&candidates, |path| GeoLookup::open(path))
        .ok_or(ResolveError::GeoDatabaseNotFound)?;

    let asn_path = prefix.join(&config.asn_file);
    let asn = match AsnLookup::open(&asn_path) {
        Ok(lookup) => {
            debug!(path = %asn_path.display(), "opened ASN database");
            Some(lookup)
        }
        Err(e) => {
            // Optional database: absence degrades, never aborts
            debug!(path = %asn_path.display(), error = %e, "continuing without ASN database");
            None
        }
    };

    Ok(DatabaseSet { geo, asn })
}

/// Try candidates in order: the first successful open wins and later
/// candidates are not attempted
fn first_openable<T, E>(
    candidates: &[PathBuf],
    mut open: impl FnMut(&Path) -> Result<T, E>,
) -> Option<T>
where
    E: std::fmt::Display,
{
    for path in candidates {
        match open(path) {
            Ok(opened) => {
                debug!(path = %path.display(), "opened geo database");
                return Some(opened);
            }
            Err(e) => debug!(path = %path.display(), error = %e, "geo candidate rejected"),
        }
    }

    None
}

/// Ordered geo candidate paths under a prefix; an empty explicit list means
/// the default candidates
fn geo_candidates(prefix: &Path, explicit: &[String]) -> Vec<PathBuf> {
    let names: Vec<&str> = if explicit.is_empty() {
        DEFAULT_GEO_FILENAMES.to_vec()
    } else {
        explicit.iter().map(String::as_str).collect()
    };

    names.iter().map(|name| prefix.join(name)).collect()
}

/// First standard directory containing any `*.mmdb` entry, falling back to
/// the current directory
fn search_default_prefix() -> PathBuf {
    let dirs: Vec<PathBuf> = SEARCH_DIRS.iter().map(PathBuf::from).collect();
    first_dir_with_mmdb(&dirs).unwrap_or_else(|| PathBuf::from("."))
}

fn first_dir_with_mmdb(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter().find(|dir| contains_mmdb(dir)).cloned()
}

fn contains_mmdb(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };

    entries
        .flatten()
        .any(|entry| entry.path().extension().is_some_and(|ext| ext == "mmdb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_default_candidates_order() {
        let candidates = geo_candidates(Path::new("/var/lib/GeoIP"), &[]);
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/var/lib/GeoIP/GeoIP2-City.mmdb"),
                PathBuf::from("/var/lib/GeoIP/GeoLite2-City.mmdb"),
                PathBuf::from("/var/lib/GeoIP/GeoIP2-Country.mmdb"),
                PathBuf::from("/var/lib/GeoIP/GeoLite2-Country.mmdb"),
            ]
        );
    }

    #[test]
    fn test_explicit_candidates_keep_order() {
        let explicit = vec!["b.mmdb".to_string(), "a.mmdb".to_string()];
        let candidates = geo_candidates(Path::new("."), &explicit);
        assert_eq!(
            candidates,
            vec![PathBuf::from("./b.mmdb"), PathBuf::from("./a.mmdb")]
        );
    }

    #[test]
    fn test_first_successful_open_wins() {
        let candidates = vec![
            PathBuf::from("GeoIP2-City.mmdb"),
            PathBuf::from("GeoLite2-City.mmdb"),
            PathBuf::from("GeoIP2-Country.mmdb"),
        ];

        let mut attempted = Vec::new();
        let opened = first_openable(&candidates, |path| {
            attempted.push(path.to_path_buf());
            if path == Path::new("GeoLite2-City.mmdb") {
                Ok("city")
            } else {
                Err("invalid database")
            }
        });

        assert_eq!(opened, Some("city"));
        // Candidates after the first success are never attempted
        assert_eq!(
            attempted,
            vec![
                PathBuf::from("GeoIP2-City.mmdb"),
                PathBuf::from("GeoLite2-City.mmdb"),
            ]
        );
    }

    #[test]
    fn test_first_candidate_success_stops_immediately() {
        let candidates = vec![PathBuf::from("a.mmdb"), PathBuf::from("b.mmdb")];

        let mut attempts = 0;
        let opened = first_openable(&candidates, |_| {
            attempts += 1;
            Ok::<_, &str>(attempts)
        });

        assert_eq!(opened, Some(1));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_all_candidates_rejected_yields_none() {
        let candidates = vec![PathBuf::from("a.mmdb"), PathBuf::from("b.mmdb")];

        let opened = first_openable(&candidates, |_| Err::<(), _>("invalid database"));

        assert_eq!(opened, None);
    }

    #[test]
    fn test_search_picks_first_dir_with_mmdb() {
        let empty = tempfile::tempdir().unwrap();
        let populated = tempfile::tempdir().unwrap();
        File::create(populated.path().join("GeoLite2-City.mmdb")).unwrap();

        let dirs = vec![
            empty.path().to_path_buf(),
            populated.path().to_path_buf(),
        ];
        assert_eq!(
            first_dir_with_mmdb(&dirs),
            Some(populated.path().to_path_buf())
        );
    }

    #[test]
    fn test_search_ignores_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("GeoLite2-City.dat")).unwrap();

        assert!(!contains_mmdb(dir.path()));
    }

    #[test]
    fn test_no_openable_candidate_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        assert!(matches!(
            open_databases(&config),
            Err(ResolveError::GeoDatabaseNotFound)
        ));
    }

    #[test]
    fn test_invalid_candidate_file_is_fatal() {
        // Present but not a valid database: resolution must still fail
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("GeoLite2-City.mmdb")).unwrap();
        let config = Config {
            db_path: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        assert!(matches!(
            open_databases(&config),
            Err(ResolveError::GeoDatabaseNotFound)
        ));
    }
}
