// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod memory;

pub use memory::{CommandRecord, MemorySession, RecordingSink};

use anyhow::{Context, Result};
use clutch_app::{TorrentFields, TorrentId, TorrentStatus, TorrentUpdate, Tracker};
use std::path::PathBuf;
use time::{Duration, OffsetDateTime, macros::datetime};

const TORRENT_NAMES: [&str; 16] = [
    "ubuntu-24.04.1-desktop-amd64.iso",
    "debian-12.7.0-amd64-netinst.iso",
    "Fedora-Workstation-Live-x86_64-41",
    "archlinux-2026.01.01-x86_64.iso",
    "linuxmint-22-cinnamon-64bit.iso",
    "openSUSE-Tumbleweed-DVD-x86_64",
    "kali-linux-2025.4-installer-amd64",
    "FreeBSD-14.1-RELEASE-amd64-dvd1",
    "alpine-standard-3.20.3-x86_64.iso",
    "Big Buck Bunny (1080p)",
    "Sintel 4K",
    "Tears of Steel",
    "Elephants Dream",
    "enwiki-20260101-pages-articles",
    "Blender Demo Files",
    "LibreOffice_24.8_Linux_x86-64_deb",
];

const TRACKERS: [&str; 6] = [
    "https://torrent.ubuntu.com/announce",
    "http://bttracker.debian.org:6969/announce",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://open.demonii.com:1337/announce",
    "http://tracker.archlinux.org:6969/announce",
    "https://academictorrents.com/announce.php",
];

const DOWNLOAD_DIRS: [&str; 3] = ["/srv/torrents", "/home/media/downloads", "/mnt/archive"];

const STATUSES: [TorrentStatus; 6] = [
    TorrentStatus::Stopped,
    TorrentStatus::Download,
    TorrentStatus::Download,
    TorrentStatus::Seed,
    TorrentStatus::Seed,
    TorrentStatus::DownloadWait,
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of plausible torrents. The same seed yields the same
/// sequence.
#[derive(Debug, Clone)]
pub struct TorrentFaker {
    rng: DeterministicRng,
    next_id: i64,
}

impl TorrentFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 0,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    /// A complete torrent record with the next free id.
    pub fn torrent(&mut self) -> TorrentUpdate {
        self.next_id += 1;
        let id = self.next_id;
        let status = self.pick(&STATUSES);
        let total_size = self.int_range_i64(50, 8_000) * 1024 * 1024;
        let percent_done = match status {
            TorrentStatus::Seed => 1.0,
            _ => self.int_range_i64(0, 99) as f64 / 100.0,
        };
        let downloading = status == TorrentStatus::Download;
        let seeding = status == TorrentStatus::Seed;
        let added = reference_now() - Duration::days(self.int_range_i64(0, 365));
        let tracker_count = 1 + self.rng.int_n(2);
        let trackers = (0..tracker_count)
            .map(|_| Tracker::new(self.pick(&TRACKERS)))
            .collect();

        TorrentUpdate {
            id: TorrentId::new(id),
            fields: TorrentFields {
                name: Some(self.pick(&TORRENT_NAMES).to_owned()),
                status: Some(status),
                hash_string: Some(format!(
                    "{:016x}{:016x}",
                    self.rng.next_u64(),
                    self.rng.next_u64()
                )),
                total_size: Some(total_size),
                percent_done: Some(percent_done),
                upload_ratio: Some(self.int_range_i64(0, 300) as f64 / 100.0),
                rate_download: Some(if downloading {
                    self.int_range_i64(10, 4_000) * 1024
                } else {
                    0
                }),
                rate_upload: Some(if seeding || downloading {
                    self.int_range_i64(0, 800) * 1024
                } else {
                    0
                }),
                queue_position: Some(id - 1),
                added_date: Some(added.unix_timestamp()),
                is_finished: Some(seeding && self.rng.bool()),
                peers_getting_from_us: Some(if seeding {
                    self.int_range_i64(0, 12)
                } else {
                    0
                }),
                peers_sending_to_us: Some(if downloading {
                    self.int_range_i64(1, 40)
                } else {
                    0
                }),
                webseeds_sending_to_us: Some(0),
                error: Some(0),
                error_string: Some(String::new()),
                download_dir: Some(self.pick(&DOWNLOAD_DIRS).to_owned()),
                metadata_percent_complete: Some(1.0),
                trackers: Some(trackers),
            },
        }
    }

    pub fn torrents(&mut self, count: usize) -> Vec<TorrentUpdate> {
        (0..count).map(|_| self.torrent()).collect()
    }

    fn pick<T: Copy>(&mut self, values: &[T]) -> T {
        values[self.rng.int_n(values.len())]
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        min + self.rng.int_n((max - min + 1) as usize) as i64
    }
}

/// Minimal ready-to-display torrent: name, status and queue position.
pub fn fixture_torrent(id: i64, name: &str, status: TorrentStatus) -> TorrentUpdate {
    TorrentUpdate {
        id: TorrentId::new(id),
        fields: TorrentFields {
            name: Some(name.to_owned()),
            status: Some(status),
            queue_position: Some(id),
            ..TorrentFields::default()
        },
    }
}

pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}

pub fn tracker_announces() -> &'static [&'static str] {
    &TRACKERS
}

fn reference_now() -> OffsetDateTime {
    datetime!(2026-01-01 0:00 UTC)
}
