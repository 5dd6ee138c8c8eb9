//! Input parsing: topology edge lists and BGP update dumps.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Context, Result};
use log::{error, info, warn};
use regex::Regex;

use crate::spikes::{Destination, ObserverAs, SpikeStore};
use crate::topology::{AsNumber, TopologyGraph};

/// AS numbers outside this range are treated as parse noise.
const AS_RANGE: std::ops::RangeInclusive<AsNumber> = 1..=65535;

/// Load the topology map. The first file is the base; every further file is
/// intersected into it, keeping only links corroborated by all sources.
pub fn load_topology(paths: &[PathBuf]) -> Result<TopologyGraph> {
    let mut iter = paths.iter();
    let first = iter
        .next()
        .ok_or_else(|| eyre!("no topology files given"))?;
    let mut map = load_edge_list(first)?;

    for path in iter {
        let next = load_edge_list(path)?;
        map = map.intersect_with(&next);
        info!(
            "intersected {} into the map: {} ASes, {} links remain",
            path.display(),
            map.vertex_count(),
            map.edge_count()
        );
    }

    if map.edge_count() == 0 {
        return Err(eyre!("topology map has no links after loading"));
    }
    Ok(map)
}

/// One tab-separated edge list file. Lines that do not parse are logged and
/// skipped; the file only fails as a whole on I/O errors.
fn load_edge_list(path: &Path) -> Result<TopologyGraph> {
    let file = File::open(path)
        .with_context(|| format!("failed to open topology file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut map = TopologyGraph::new();
    let mut skipped = 0usize;
    for line in reader.lines() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        match parse_edge(&line) {
            Some((a, b)) => {
                map.add_edge(a, b);
            }
            None => {
                if !line.trim().is_empty() {
                    error!("cannot parse topology line {line:?}, line will be ignored");
                    skipped += 1;
                }
            }
        }
    }

    info!(
        "loaded {}: {} ASes, {} links, {} lines skipped",
        path.display(),
        map.vertex_count(),
        map.edge_count(),
        skipped
    );
    Ok(map)
}

fn parse_edge(line: &str) -> Option<(AsNumber, AsNumber)> {
    let mut fields = line.split('\t');
    let a: AsNumber = fields.next()?.trim().parse().ok()?;
    let b: AsNumber = fields.next()?.trim().parse().ok()?;
    if !AS_RANGE.contains(&a) || !AS_RANGE.contains(&b) || a == b {
        return None;
    }
    Some((a, b))
}

/// An update line reduced to what the analysis needs.
#[derive(Debug, Clone, PartialEq)]
struct ParsedUpdate {
    time: i64,
    peer_as: AsNumber,
    destination: Destination,
}

/// Load update dumps into a spike store. The observer name for each file is
/// its stem; the monitored AS is the peer AS field of each message.
pub fn load_spike_store(paths: &[PathBuf]) -> Result<SpikeStore> {
    // BGP4MP|<time>|<A or W>|<peer-ip>|<peer-as>|<prefix/len>|<as-path>
    let line_re = Regex::new(
        r"^BGP4MP\|(\d+)\|([AW])\|[^|]*\|(\d+)\|([0-9.]+)/\d+(?:\|([^|]*))?",
    )
    .context("invalid update line pattern")?;

    let mut store = SpikeStore::new();
    for path in paths {
        let observer = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| eyre!("update file {} has no usable name", path.display()))?
            .to_string();

        let file = File::open(path)
            .with_context(|| format!("failed to open update file {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut total = 0usize;
        let mut read = 0usize;
        for line in reader.lines() {
            let line = line.with_context(|| format!("failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            total += 1;
            match parse_update(&line_re, &line) {
                Some(update) => {
                    read += 1;
                    store.record(
                        ObserverAs::new(observer.clone(), update.peer_as),
                        update.time,
                        update.destination,
                    );
                }
                None => warn!("cannot parse update message {line:?}, message will be skipped"),
            }
        }
        info!(
            "loaded {}: {read} of {total} messages used",
            path.display()
        );
    }

    if store.is_empty() {
        return Err(eyre!("no updates loaded from any input file"));
    }
    Ok(store)
}

fn parse_update(line_re: &Regex, line: &str) -> Option<ParsedUpdate> {
    let captures = line_re.captures(line)?;
    let time: i64 = captures[1].parse().ok()?;
    let kind = &captures[2];
    let peer_as: AsNumber = captures[3].parse().ok()?;
    let prefix: Ipv4Addr = captures[4].parse().ok()?;
    if !AS_RANGE.contains(&peer_as) {
        return None;
    }

    let destination = if kind == "A" {
        // Announcements carry the AS path; its last element is the origin.
        let path = captures.get(5)?.as_str();
        let origin = parse_origin(path)?;
        Destination::with_origin(prefix, origin)
    } else {
        // Withdrawals carry no path, so the origin stays unknown.
        Destination::new(prefix)
    };

    Some(ParsedUpdate {
        time,
        peer_as,
        destination,
    })
}

/// Origin AS of an AS path: the last element, which may be an AS set written
/// in braces. For a set the first member is taken.
fn parse_origin(path: &str) -> Option<AsNumber> {
    let last = path.split_whitespace().last()?;
    let last = last.trim_start_matches('{').trim_end_matches('}');
    let first = last.split(',').next()?;
    first.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_edge_list_skips_bad_lines() {
        let file = write_file("1\t2\nnot\tan\tedge\n2\t3\n70000\t2\n3\t3\n");
        let map = load_edge_list(file.path()).unwrap();
        assert_eq!(map.edge_count(), 2);
        assert!(map.contains_edge(1, 2));
        assert!(map.contains_edge(2, 3));
    }

    #[test]
    fn test_load_topology_intersects_additional_maps() {
        let base = write_file("1\t2\n2\t3\n3\t4\n");
        let other = write_file("2\t3\n3\t4\n4\t5\n");
        let paths = vec![base.path().to_path_buf(), other.path().to_path_buf()];
        let map = load_topology(&paths).unwrap();
        assert!(!map.contains_edge(1, 2));
        assert!(map.contains_edge(2, 3));
        assert!(map.contains_edge(3, 4));
        assert!(!map.contains_edge(4, 5));
    }

    #[test]
    fn test_load_topology_fails_on_empty_intersection() {
        let base = write_file("1\t2\n");
        let other = write_file("3\t4\n");
        let paths = vec![base.path().to_path_buf(), other.path().to_path_buf()];
        assert!(load_topology(&paths).is_err());
    }

    #[test]
    fn test_parse_update_announcement_and_withdrawal() {
        let re = Regex::new(
            r"^BGP4MP\|(\d+)\|([AW])\|[^|]*\|(\d+)\|([0-9.]+)/\d+(?:\|([^|]*))?",
        )
        .unwrap();

        let a = parse_update(
            &re,
            "BGP4MP|1243814456|A|192.0.2.1|29073|10.0.0.0/8|29073 3320 6939",
        )
        .unwrap();
        assert_eq!(a.time, 1243814456);
        assert_eq!(a.peer_as, 29073);
        assert_eq!(a.destination.prefix, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(a.destination.origin, Some(6939));

        let w = parse_update(&re, "BGP4MP|1243814460|W|192.0.2.1|29073|10.0.0.0/8").unwrap();
        assert_eq!(w.destination.origin, None);

        assert!(parse_update(&re, "TABLE_DUMP|1243814456|B|...").is_none());
        assert!(parse_update(&re, "BGP4MP|not-a-time|A|x|1|10.0.0.0/8|1 2").is_none());
    }

    #[test]
    fn test_parse_origin_handles_as_sets() {
        assert_eq!(parse_origin("29073 3320 6939"), Some(6939));
        assert_eq!(parse_origin("29073 3320 {6939,1299}"), Some(6939));
        assert_eq!(parse_origin(""), None);
        assert_eq!(parse_origin("29073 junk"), None);
    }

    #[test]
    fn test_load_spike_store_groups_by_second() {
        let file = write_file(concat!(
            "BGP4MP|100|A|192.0.2.1|29073|10.0.0.0/8|29073 6939\n",
            "BGP4MP|100|A|192.0.2.1|29073|10.1.0.0/16|29073 6939\n",
            "BGP4MP|101|W|192.0.2.1|29073|10.0.0.0/8\n",
            "garbage line\n",
        ));
        let store = load_spike_store(&[file.path().to_path_buf()]).unwrap();
        let observer = file
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap()
            .to_string();
        let pair = ObserverAs::new(observer, 29073);
        assert_eq!(store.spike_at(&pair, 100).unwrap().size(), 2);
        assert_eq!(store.spike_at(&pair, 101).unwrap().size(), 1);
        assert_eq!(store.update_sum(), 3);
    }
}
