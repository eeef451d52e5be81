//! Job records and their asset layout
//!
//! A queue envelope carries one or more records; each record body is a JSON
//! job `{"songID": int, "fileName": string, "trackID": int}`. Every path a job
//! touches is derived here, per job, so concurrent jobs never share state.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Remote key of the mastering reference, shared by every job
pub const REFERENCE_KEY: &str = "static/audio/reference.wav";

/// Prefix of the instrumental keys
pub const INSTRUMENTAL_PREFIX: &str = "static/audio";

/// Prefix under which vocal stems are published
pub const VOCALS_PREFIX: &str = "utau_inference";

/// Prefix under which mastered results are uploaded
pub const OUTPUT_PREFIX: &str = "matchering";

/// Queue message envelope
#[derive(Debug, Clone, Deserialize)]
pub struct QueueEnvelope {
    #[serde(rename = "Records")]
    pub records: Vec<QueueRecord>,
}

/// One queue record; `body` holds the job JSON as a string
#[derive(Debug, Clone, Deserialize)]
pub struct QueueRecord {
    #[serde(rename = "messageId", default)]
    pub message_id: Option<String>,
    pub body: String,
}

impl QueueEnvelope {
    /// Parse an envelope. Failure here is a setup error, not a job failure.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Envelope(e.to_string()))
    }
}

/// Job body as received, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobBody {
    #[serde(rename = "songID")]
    pub song_id: Option<i64>,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(rename = "trackID")]
    pub track_id: Option<i64>,
}

impl JobBody {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::InvalidJob(format!("unreadable body: {}", e)))
    }

    /// Song ID used for status events; 0 when the body carries none
    pub fn reported_song_id(&self) -> i64 {
        self.song_id.unwrap_or(0)
    }

    /// Validate required fields
    pub fn into_job(self) -> Result<Job> {
        let track_id = match self.track_id {
            Some(id) if id != 0 => id,
            _ => return Err(Error::InvalidJob("track ID is missing".to_string())),
        };
        let file_name = match self.file_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(Error::InvalidJob("file name is missing".to_string())),
        };
        // The vocals key must stay under its prefix
        if file_name.starts_with('/') || file_name.split('/').any(|s| s == "." || s == "..") {
            return Err(Error::InvalidJob(format!(
                "file name leaves {}/: {}",
                VOCALS_PREFIX, file_name
            )));
        }

        Ok(Job {
            song_id: self.song_id.unwrap_or(0),
            file_name,
            track_id,
        })
    }
}

/// A validated unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub song_id: i64,
    pub file_name: String,
    pub track_id: i64,
}

impl Job {
    /// Resolve every remote key and staging path for this job
    pub fn asset_paths(&self, staging_dir: &Path) -> Result<AssetPaths> {
        let instrumental_key = TrackCatalog::instrumental_key(self.track_id)?;
        let output_file_name = format!("final_song_{}_{}.wav", self.song_id, self.track_id);

        Ok(AssetPaths {
            reference_key: REFERENCE_KEY.to_string(),
            instrumental_key,
            vocals_key: format!("{}/{}", VOCALS_PREFIX, self.file_name),
            output_key: format!("{}/{}", OUTPUT_PREFIX, output_file_name),
            output_file_name,
            local_reference: staging_dir.join(format!("reference_{}.wav", self.song_id)),
            local_instrumental: staging_dir.join(format!("instrumental_{}.wav", self.song_id)),
            local_vocals: staging_dir.join(format!("vocals_{}.wav", self.song_id)),
            local_final: staging_dir.join(format!("final_song_{}.wav", self.song_id)),
        })
    }
}

/// Fixed mapping from track ID to instrumental file
pub struct TrackCatalog;

impl TrackCatalog {
    const TRACKS: &'static [(i64, &'static str)] = &[
        (1, "pop_track1.wav"),
        (2, "norteno_track2.wav"),
        (3, "urbano_track3.wav"),
    ];

    pub fn lookup(track_id: i64) -> Option<&'static str> {
        Self::TRACKS
            .iter()
            .find(|(id, _)| *id == track_id)
            .map(|(_, name)| *name)
    }

    pub fn instrumental_key(track_id: i64) -> Result<String> {
        Self::lookup(track_id)
            .map(|name| format!("{}/{}", INSTRUMENTAL_PREFIX, name))
            .ok_or(Error::UnknownTrack(track_id))
    }
}

/// The three inputs every job stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Reference,
    Instrumental,
    Vocals,
}

impl Asset {
    /// Staging order
    pub const ALL: [Asset; 3] = [Asset::Reference, Asset::Instrumental, Asset::Vocals];

    pub fn name(&self) -> &'static str {
        match self {
            Asset::Reference => "reference",
            Asset::Instrumental => "instrumental",
            Asset::Vocals => "vocals",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Remote keys and local staging paths for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub reference_key: String,
    pub instrumental_key: String,
    pub vocals_key: String,
    /// Upload key of the mastered result
    pub output_key: String,
    /// File name reported in the `end` event
    pub output_file_name: String,
    pub local_reference: PathBuf,
    pub local_instrumental: PathBuf,
    pub local_vocals: PathBuf,
    pub local_final: PathBuf,
}

impl AssetPaths {
    pub fn remote(&self, asset: Asset) -> &str {
        match asset {
            Asset::Reference => &self.reference_key,
            Asset::Instrumental => &self.instrumental_key,
            Asset::Vocals => &self.vocals_key,
        }
    }

    pub fn local(&self, asset: Asset) -> &Path {
        match asset {
            Asset::Reference => &self.local_reference,
            Asset::Instrumental => &self.local_instrumental,
            Asset::Vocals => &self.local_vocals,
        }
    }
}
