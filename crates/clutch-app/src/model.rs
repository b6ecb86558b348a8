// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TorrentStatus {
    Stopped,
    CheckWait,
    Check,
    DownloadWait,
    Download,
    SeedWait,
    Seed,
}

impl TorrentStatus {
    pub const ALL: [Self; 7] = [
        Self::Stopped,
        Self::CheckWait,
        Self::Check,
        Self::DownloadWait,
        Self::Download,
        Self::SeedWait,
        Self::Seed,
    ];

    pub const fn code(self) -> i64 {
        match self {
            Self::Stopped => 0,
            Self::CheckWait => 1,
            Self::Check => 2,
            Self::DownloadWait => 3,
            Self::Download => 4,
            Self::SeedWait => 5,
            Self::Seed => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::CheckWait => "check_wait",
            Self::Check => "check",
            Self::DownloadWait => "download_wait",
            Self::Download => "download",
            Self::SeedWait => "seed_wait",
            Self::Seed => "seed",
        }
    }

    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub const fn is_checking(self) -> bool {
        matches!(self, Self::Check | Self::CheckWait)
    }

    pub const fn is_downloading(self) -> bool {
        matches!(self, Self::Download | Self::DownloadWait)
    }

    pub const fn is_seeding(self) -> bool {
        matches!(self, Self::Seed | Self::SeedWait)
    }

    pub const fn is_queued(self) -> bool {
        matches!(self, Self::CheckWait | Self::DownloadWait | Self::SeedWait)
    }
}

impl TryFrom<i64> for TorrentStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown torrent status code {code}"))
    }
}

impl From<TorrentStatus> for i64 {
    fn from(status: TorrentStatus) -> Self {
        status.code()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    pub announce: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub tier: Option<i64>,
}

impl Tracker {
    pub fn new(announce: impl Into<String>) -> Self {
        Self {
            announce: announce.into(),
            id: None,
            tier: None,
        }
    }
}

/// Wire names of the torrent fields this client knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TorrentField {
    Id,
    Name,
    Status,
    HashString,
    TotalSize,
    PercentDone,
    UploadRatio,
    RateDownload,
    RateUpload,
    QueuePosition,
    AddedDate,
    IsFinished,
    PeersGettingFromUs,
    PeersSendingToUs,
    WebseedsSendingToUs,
    Error,
    ErrorString,
    DownloadDir,
    MetadataPercentComplete,
    Trackers,
}

pub const METADATA_FIELDS: [TorrentField; 4] = [
    TorrentField::AddedDate,
    TorrentField::HashString,
    TorrentField::Name,
    TorrentField::TotalSize,
];

pub const STATS_FIELDS: [TorrentField; 15] = [
    TorrentField::DownloadDir,
    TorrentField::Error,
    TorrentField::ErrorString,
    TorrentField::IsFinished,
    TorrentField::MetadataPercentComplete,
    TorrentField::PeersGettingFromUs,
    TorrentField::PeersSendingToUs,
    TorrentField::PercentDone,
    TorrentField::QueuePosition,
    TorrentField::RateDownload,
    TorrentField::RateUpload,
    TorrentField::Status,
    TorrentField::Trackers,
    TorrentField::UploadRatio,
    TorrentField::WebseedsSendingToUs,
];

/// Fields that must be present before a torrent counts as ready.
pub const REQUIRED_FIELDS: [TorrentField; 2] = [TorrentField::Name, TorrentField::Status];

impl TorrentField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Status => "status",
            Self::HashString => "hashString",
            Self::TotalSize => "totalSize",
            Self::PercentDone => "percentDone",
            Self::UploadRatio => "uploadRatio",
            Self::RateDownload => "rateDownload",
            Self::RateUpload => "rateUpload",
            Self::QueuePosition => "queuePosition",
            Self::AddedDate => "addedDate",
            Self::IsFinished => "isFinished",
            Self::PeersGettingFromUs => "peersGettingFromUs",
            Self::PeersSendingToUs => "peersSendingToUs",
            Self::WebseedsSendingToUs => "webseedsSendingToUs",
            Self::Error => "error",
            Self::ErrorString => "errorString",
            Self::DownloadDir => "downloadDir",
            Self::MetadataPercentComplete => "metadataPercentComplete",
            Self::Trackers => "trackers",
        }
    }

    /// `id` plus metadata and stats; used for first sight of a torrent.
    pub fn full_set() -> Vec<Self> {
        let mut fields = vec![Self::Id];
        fields.extend(METADATA_FIELDS);
        fields.extend(STATS_FIELDS);
        fields
    }

    /// `id` plus stats; used by the periodic refresh.
    pub fn stats_set() -> Vec<Self> {
        let mut fields = vec![Self::Id];
        fields.extend(STATS_FIELDS);
        fields
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TorrentFields {
    pub name: Option<String>,
    pub status: Option<TorrentStatus>,
    pub hash_string: Option<String>,
    pub total_size: Option<i64>,
    pub percent_done: Option<f64>,
    pub upload_ratio: Option<f64>,
    pub rate_download: Option<i64>,
    pub rate_upload: Option<i64>,
    pub queue_position: Option<i64>,
    pub added_date: Option<i64>,
    pub is_finished: Option<bool>,
    pub peers_getting_from_us: Option<i64>,
    pub peers_sending_to_us: Option<i64>,
    pub webseeds_sending_to_us: Option<i64>,
    pub error: Option<i64>,
    pub error_string: Option<String>,
    pub download_dir: Option<String>,
    pub metadata_percent_complete: Option<f64>,
    pub trackers: Option<Vec<Tracker>>,
}

macro_rules! merge_fields {
    ($target:expr, $source:expr, $changed:ident; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $source.$field
                && $target.$field.as_ref() != Some(&value)
            {
                $target.$field = Some(value);
                $changed = true;
            }
        )+
    };
}

macro_rules! select_fields {
    ($source:expr, $wanted:expr; $($variant:ident => $field:ident),+ $(,)?) => {{
        let mut selected = TorrentFields::default();
        $(
            if $wanted.contains(&TorrentField::$variant) {
                selected.$field = $source.$field.clone();
            }
        )+
        selected
    }};
}

impl TorrentFields {
    pub fn has(&self, field: TorrentField) -> bool {
        match field {
            TorrentField::Id => true,
            TorrentField::Name => self.name.is_some(),
            TorrentField::Status => self.status.is_some(),
            TorrentField::HashString => self.hash_string.is_some(),
            TorrentField::TotalSize => self.total_size.is_some(),
            TorrentField::PercentDone => self.percent_done.is_some(),
            TorrentField::UploadRatio => self.upload_ratio.is_some(),
            TorrentField::RateDownload => self.rate_download.is_some(),
            TorrentField::RateUpload => self.rate_upload.is_some(),
            TorrentField::QueuePosition => self.queue_position.is_some(),
            TorrentField::AddedDate => self.added_date.is_some(),
            TorrentField::IsFinished => self.is_finished.is_some(),
            TorrentField::PeersGettingFromUs => self.peers_getting_from_us.is_some(),
            TorrentField::PeersSendingToUs => self.peers_sending_to_us.is_some(),
            TorrentField::WebseedsSendingToUs => self.webseeds_sending_to_us.is_some(),
            TorrentField::Error => self.error.is_some(),
            TorrentField::ErrorString => self.error_string.is_some(),
            TorrentField::DownloadDir => self.download_dir.is_some(),
            TorrentField::MetadataPercentComplete => self.metadata_percent_complete.is_some(),
            TorrentField::Trackers => self.trackers.is_some(),
        }
    }

    /// Copies every present field of `update` over `self`. Returns whether any
    /// stored value changed.
    pub fn merge(&mut self, update: TorrentFields) -> bool {
        let mut changed = false;
        merge_fields!(
            self, update, changed;
            name,
            status,
            hash_string,
            total_size,
            percent_done,
            upload_ratio,
            rate_download,
            rate_upload,
            queue_position,
            added_date,
            is_finished,
            peers_getting_from_us,
            peers_sending_to_us,
            webseeds_sending_to_us,
            error,
            error_string,
            download_dir,
            metadata_percent_complete,
            trackers,
        );
        changed
    }

    /// Copy holding only the `wanted` fields.
    pub fn select(&self, wanted: &[TorrentField]) -> TorrentFields {
        select_fields!(
            self, wanted;
            Name => name,
            Status => status,
            HashString => hash_string,
            TotalSize => total_size,
            PercentDone => percent_done,
            UploadRatio => upload_ratio,
            RateDownload => rate_download,
            RateUpload => rate_upload,
            QueuePosition => queue_position,
            AddedDate => added_date,
            IsFinished => is_finished,
            PeersGettingFromUs => peers_getting_from_us,
            PeersSendingToUs => peers_sending_to_us,
            WebseedsSendingToUs => webseeds_sending_to_us,
            Error => error,
            ErrorString => error_string,
            DownloadDir => download_dir,
            MetadataPercentComplete => metadata_percent_complete,
            Trackers => trackers,
        )
    }
}

/// One partial torrent record as delivered by the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentUpdate {
    pub id: TorrentId,
    #[serde(flatten)]
    pub fields: TorrentFields,
}

impl TorrentUpdate {
    pub fn new(id: TorrentId) -> Self {
        Self {
            id,
            fields: TorrentFields::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorrentDelta {
    pub updates: Vec<TorrentUpdate>,
    pub removed: Vec<TorrentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSelector {
    All,
    RecentlyActive,
    Ids(Vec<TorrentId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Torrent {
    id: TorrentId,
    fields: TorrentFields,
}

impl Torrent {
    pub fn new(id: TorrentId) -> Self {
        Self {
            id,
            fields: TorrentFields::default(),
        }
    }

    pub const fn id(&self) -> TorrentId {
        self.id
    }

    pub fn fields(&self) -> &TorrentFields {
        &self.fields
    }

    pub(crate) fn apply(&mut self, update: TorrentFields) -> bool {
        self.fields.merge(update)
    }

    pub fn name(&self) -> &str {
        self.fields.name.as_deref().unwrap_or("")
    }

    pub fn collated_name(&self) -> String {
        self.name().to_lowercase()
    }

    pub fn status(&self) -> Option<TorrentStatus> {
        self.fields.status
    }

    pub fn is_stopped(&self) -> bool {
        self.status().is_some_and(TorrentStatus::is_stopped)
    }

    pub fn is_checking(&self) -> bool {
        self.status().is_some_and(TorrentStatus::is_checking)
    }

    pub fn is_downloading(&self) -> bool {
        self.status().is_some_and(TorrentStatus::is_downloading)
    }

    pub fn is_seeding(&self) -> bool {
        self.status().is_some_and(TorrentStatus::is_seeding)
    }

    pub fn is_queued(&self) -> bool {
        self.status().is_some_and(TorrentStatus::is_queued)
    }

    pub fn is_finished(&self) -> bool {
        self.fields.is_finished.unwrap_or(false)
    }

    pub fn is_active(&self) -> bool {
        self.fields.peers_getting_from_us.unwrap_or(0) > 0
            || self.fields.peers_sending_to_us.unwrap_or(0) > 0
            || self.fields.webseeds_sending_to_us.unwrap_or(0) > 0
            || self.is_checking()
    }

    pub fn total_size(&self) -> Option<i64> {
        self.fields.total_size
    }

    pub fn percent_done(&self) -> Option<f64> {
        self.fields.percent_done
    }

    pub fn upload_ratio(&self) -> Option<f64> {
        self.fields.upload_ratio
    }

    pub fn upload_speed(&self) -> i64 {
        self.fields.rate_upload.unwrap_or(0)
    }

    pub fn download_speed(&self) -> i64 {
        self.fields.rate_download.unwrap_or(0)
    }

    pub fn queue_position(&self) -> Option<i64> {
        self.fields.queue_position
    }

    pub fn added_date(&self) -> Option<i64> {
        self.fields.added_date
    }

    pub fn added_at(&self) -> Option<OffsetDateTime> {
        self.added_date()
            .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
    }

    pub fn trackers(&self) -> &[Tracker] {
        self.fields.trackers.as_deref().unwrap_or(&[])
    }

    pub fn download_dir(&self) -> Option<&str> {
        self.fields.download_dir.as_deref()
    }
}

pub fn is_metadata_complete(torrent: &Torrent) -> bool {
    REQUIRED_FIELDS
        .iter()
        .all(|field| torrent.fields().has(*field))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    All,
    Active,
    Downloading,
    Seeding,
    Paused,
    Finished,
}

impl FilterMode {
    pub const ALL: [Self; 6] = [
        Self::All,
        Self::Active,
        Self::Downloading,
        Self::Seeding,
        Self::Paused,
        Self::Finished,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Downloading => "downloading",
            Self::Seeding => "seeding",
            Self::Paused => "paused",
            Self::Finished => "finished",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == value)
    }

    pub fn admits(self, torrent: &Torrent) -> bool {
        match self {
            Self::All => true,
            Self::Active => torrent.is_active(),
            Self::Downloading => torrent.is_downloading(),
            Self::Seeding => torrent.is_seeding(),
            Self::Paused => torrent.is_stopped(),
            Self::Finished => torrent.is_finished(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortMethod {
    Activity,
    Age,
    Name,
    Progress,
    Queue,
    Ratio,
    Size,
    State,
}

impl SortMethod {
    pub const ALL: [Self; 8] = [
        Self::Activity,
        Self::Age,
        Self::Name,
        Self::Progress,
        Self::Queue,
        Self::Ratio,
        Self::Size,
        Self::State,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Age => "age",
            Self::Name => "name",
            Self::Progress => "progress",
            Self::Queue => "queue",
            Self::Ratio => "ratio",
            Self::Size => "size",
            Self::State => "state",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "percent_completed" => Some(Self::Progress),
            "queue_order" => Some(Self::Queue),
            _ => Self::ALL.into_iter().find(|method| method.as_str() == value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ascending" => Some(Self::Ascending),
            "descending" => Some(Self::Descending),
            _ => None,
        }
    }

    pub const fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub mode: FilterMode,
    pub text: String,
    pub tracker_domain: Option<String>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            mode: FilterMode::All,
            text: String::new(),
            tracker_domain: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub method: SortMethod,
    pub direction: SortDirection,
}

impl SortSpec {
    pub const fn new(method: SortMethod, direction: SortDirection) -> Self {
        Self { method, direction }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::new(SortMethod::Queue, SortDirection::Ascending)
    }
}

/// Daemon settings as returned by a session query, kept as an open map.
pub type SessionInfo = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferStats {
    pub uploaded_bytes: i64,
    pub downloaded_bytes: i64,
    pub files_added: i64,
    pub session_count: i64,
    pub seconds_active: i64,
}

impl TransferStats {
    /// Upload/download ratio, or `None` when nothing was downloaded.
    pub fn ratio(&self) -> Option<f64> {
        if self.downloaded_bytes <= 0 {
            return None;
        }
        Some(self.uploaded_bytes as f64 / self.downloaded_bytes as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    #[serde(rename = "current-stats", default)]
    pub current: TransferStats,
    #[serde(rename = "cumulative-stats", default)]
    pub cumulative: TransferStats,
}
