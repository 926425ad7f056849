//! Core types for the upload library.

use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::names::NickPool;
use crate::progress::ProgressTarget;

/// Highest number of attempts per file.
pub const MAX_ATTEMPTS: u32 = 10;

/// Default read buffer size for upload streams.
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 19;

/// Default backoff unit between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How long to wait for remote metadata when verifying checksums.
pub const DEFAULT_CHECKSUM_TIMEOUT: Duration = Duration::from_secs(10);

/// Order in which files are uploaded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// File name, then directory.
    #[default]
    Filename,
    /// Directory, then file name.
    Path,
    /// Size, then file name, then directory.
    Size,
    /// Keep the order given.
    None,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filename" => Ok(SortMode::Filename),
            "path" => Ok(SortMode::Path),
            "size" => Ok(SortMode::Size),
            "none" => Ok(SortMode::None),
            _ => Err(format!(
                "invalid sort mode {s:?} (expected filename, path, size or none)"
            )),
        }
    }
}

impl Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortMode::Filename => write!(f, "filename"),
            SortMode::Path => write!(f, "path"),
            SortMode::Size => write!(f, "size"),
            SortMode::None => write!(f, "none"),
        }
    }
}

/// A room to upload into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTarget {
    /// Room id, after alias resolution.
    pub id: String,
    /// Room password, if the room needs one.
    pub password: Option<String>,
}

impl RoomTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }
}

/// Settings governing one room's upload.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// User name shown in the room.
    pub user: String,
    /// Account password; login is skipped without one.
    pub passwd: Option<String>,
    /// Attempts per file, clamped into `1..=MAX_ATTEMPTS`.
    pub attempts: u32,
    /// Compare the remote checksum after each upload.
    pub verify_checksum: bool,
    /// Remove source files after a successful upload.
    pub delete_after: bool,
    /// Read buffer size for upload streams.
    pub block_size: usize,
    /// Text prepended to every file name.
    pub prefix: Option<String>,
    /// Randomize image names and rotate nicknames.
    pub spam: bool,
    /// Nicknames rotated between files in spam mode.
    pub nicks: Option<NickPool>,
    /// Backoff unit; attempt `k` waits `k * retry_delay`.
    pub retry_delay: Duration,
    /// Bound on the wait for remote file metadata.
    pub checksum_timeout: Duration,
    /// Minimum interval between progress redraws.
    pub progress_timeout: Duration,
    /// Where progress is drawn.
    pub progress: ProgressTarget,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            passwd: None,
            attempts: 1,
            verify_checksum: true,
            delete_after: false,
            block_size: DEFAULT_BLOCK_SIZE,
            prefix: None,
            spam: false,
            nicks: None,
            retry_delay: DEFAULT_RETRY_DELAY,
            checksum_timeout: DEFAULT_CHECKSUM_TIMEOUT,
            progress_timeout: crate::progress::PROGRESS_TIMEOUT,
            progress: ProgressTarget::default(),
        }
    }
}

impl UploadConfig {
    /// Attempts per file after clamping.
    pub fn effective_attempts(&self) -> u32 {
        self.attempts.clamp(1, MAX_ATTEMPTS)
    }
}

/// A file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Local source file.
    pub path: PathBuf,
    /// Name the file is uploaded under.
    pub name: String,
    /// `[NN/MM] ` serial when the batch has more than one file.
    pub serial: String,
}

/// Progress reported by the transport for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes sent since the previous report.
    pub delta: u64,
    /// Bytes sent so far.
    pub current: u64,
    /// Expected total.
    pub total: u64,
    /// Server handling the transfer.
    pub peer: Option<String>,
}

/// Buffered reader over the file being uploaded.
pub type UploadStream = tokio::io::BufReader<tokio::fs::File>;

/// What to upload.
#[derive(Debug)]
pub struct UploadRequest {
    pub name: String,
    pub size: u64,
    pub stream: UploadStream,
}

/// Result of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Remote file id.
    pub id: String,
    /// Checksum computed while sending, if the transport provides one.
    pub checksum: Option<String>,
}

/// Metadata the service reports for an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    pub id: String,
    pub name: String,
    pub size: u64,
    /// Checksum computed by the service.
    pub checksum: Option<String>,
    /// Nickname the file was uploaded under.
    pub uploader: String,
}

/// Outcome of one room's upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomSummary {
    pub room: String,
    /// Files uploaded, in upload order.
    pub uploaded: Vec<PathBuf>,
    /// Files given up on after every attempt failed.
    pub failed: Vec<PathBuf>,
    /// Failed attempts over all files.
    pub failed_attempts: usize,
    /// Whether the room stopped because of cancellation.
    pub aborted: bool,
}

impl RoomSummary {
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            ..Default::default()
        }
    }
}
