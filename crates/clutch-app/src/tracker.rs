// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet, HashMap};

use url::Url;

use crate::Torrent;

/// "tracker.ubuntu.com" -> "ubuntu.com". Hosts with a single dot are kept.
pub fn domain_name(host: &str) -> &str {
    match (host.find('.'), host.rfind('.')) {
        (Some(first), Some(last)) if first != last => &host[first + 1..],
        _ => host,
    }
}

/// "ubuntu.com" -> "Ubuntu".
pub fn readable_domain(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerDomain {
    pub domain: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSummary {
    pub name: String,
    pub domain: String,
    pub count: usize,
}

/// Parses announce URLs once and remembers the result.
#[derive(Debug, Clone, Default)]
pub struct TrackerIndex {
    cache: HashMap<String, Option<TrackerDomain>>,
}

impl TrackerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, announce: &str) -> Option<&TrackerDomain> {
        self.cache
            .entry(announce.to_owned())
            .or_insert_with(|| parse_announce(announce))
            .as_ref()
    }

    pub fn torrent_has_domain(&mut self, torrent: &Torrent, domain: &str) -> bool {
        torrent.trackers().iter().any(|tracker| {
            self.resolve(&tracker.announce)
                .is_some_and(|resolved| resolved.domain == domain)
        })
    }

    /// Tracker names sorted alphabetically, each with the number of torrents
    /// announcing to it.
    pub fn summarize<'a>(
        &mut self,
        torrents: impl IntoIterator<Item = &'a Torrent>,
    ) -> Vec<TrackerSummary> {
        let mut by_name: BTreeMap<String, TrackerSummary> = BTreeMap::new();
        for torrent in torrents {
            let mut seen = BTreeSet::new();
            for tracker in torrent.trackers() {
                let Some(resolved) = self.resolve(&tracker.announce) else {
                    continue;
                };
                let entry = by_name
                    .entry(resolved.name.clone())
                    .or_insert_with(|| TrackerSummary {
                        name: resolved.name.clone(),
                        domain: resolved.domain.clone(),
                        count: 0,
                    });
                if seen.insert(resolved.name.clone()) {
                    entry.count += 1;
                }
            }
        }
        by_name.into_values().collect()
    }
}

fn parse_announce(announce: &str) -> Option<TrackerDomain> {
    let url = Url::parse(announce).ok()?;
    let host = url.host_str()?;
    let domain = domain_name(host).to_owned();
    let name = readable_domain(&domain);
    Some(TrackerDomain { domain, name })
}

#[cfg(test)]
mod tests {
    use super::{TrackerIndex, domain_name, readable_domain};
    use crate::{TorrentFields, TorrentId, TorrentStore, TorrentUpdate, Tracker};

    #[test]
    fn domain_name_strips_only_the_first_label() {
        assert_eq!(domain_name("tracker.ubuntu.com"), "ubuntu.com");
        assert_eq!(domain_name("ubuntu.com"), "ubuntu.com");
        assert_eq!(domain_name("a.b.example.org"), "b.example.org");
        assert_eq!(domain_name("localhost"), "localhost");
    }

    #[test]
    fn readable_domain_capitalizes_first_label() {
        assert_eq!(readable_domain("ubuntu.com"), "Ubuntu");
        assert_eq!(readable_domain("debian"), "Debian");
        assert_eq!(readable_domain(""), "");
    }

    #[test]
    fn unparseable_announces_have_no_domain() {
        let mut index = TrackerIndex::new();
        assert!(index.resolve("not a url").is_none());
        let resolved = index.resolve("udp://tracker.opentrackr.org:1337/announce");
        assert_eq!(
            resolved.map(|domain| domain.domain.as_str()),
            Some("opentrackr.org")
        );
    }

    fn torrent_with(store: &mut TorrentStore, id: i64, announces: &[&str]) {
        store.upsert(TorrentUpdate {
            id: TorrentId::new(id),
            fields: TorrentFields {
                trackers: Some(announces.iter().map(|a| Tracker::new(*a)).collect()),
                ..TorrentFields::default()
            },
        });
    }

    #[test]
    fn summarize_counts_each_torrent_once_per_tracker_name() {
        let mut store = TorrentStore::new();
        torrent_with(
            &mut store,
            1,
            &[
                "http://tracker.ubuntu.com/announce",
                "http://ipv6.tracker.ubuntu.com/announce",
            ],
        );
        torrent_with(&mut store, 2, &["https://torrent.debian.org:6969/announce"]);
        torrent_with(&mut store, 3, &["http://tracker.ubuntu.com/announce"]);

        let mut index = TrackerIndex::new();
        let summary = index.summarize(store.all());
        let names: Vec<_> = summary
            .iter()
            .map(|entry| (entry.name.as_str(), entry.count))
            .collect();
        assert_eq!(names, vec![("Debian", 1), ("Tracker", 1), ("Ubuntu", 2)]);
    }
}
