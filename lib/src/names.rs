//! Display names for uploads and nickname rotation for spam mode.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::UploadError;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Ways to invent a plausible camera or chat-export file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStrategy {
    /// 18 digit snowflake, like a chat attachment id.
    ChannelId,
    /// `IMG_1234`
    Img,
    /// `DSC_1234`
    Dsc,
    /// `image (3)`
    Image,
}

impl NameStrategy {
    pub const ALL: [NameStrategy; 4] = [
        NameStrategy::ChannelId,
        NameStrategy::Img,
        NameStrategy::Dsc,
        NameStrategy::Image,
    ];

    /// Generates a random stem.
    pub fn generate<R: Rng + ?Sized>(self, rng: &mut R) -> String {
        match self {
            NameStrategy::ChannelId => {
                rng.random_range(100_000_000_000_000_000u64..1_000_000_000_000_000_000)
                    .to_string()
            }
            NameStrategy::Img => format!("IMG_{:04}", rng.random_range(0..10_000)),
            NameStrategy::Dsc => format!("DSC_{:04}", rng.random_range(0..10_000)),
            NameStrategy::Image => format!("image ({})", rng.random_range(1..=20)),
        }
    }
}

/// Whether the path has an image-like extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Builds the name a file is uploaded under.
///
/// In spam mode image files get a random stem and keep their extension.
/// Otherwise the file name is used, after the trimmed `prefix` if any.
pub fn display_name<R: Rng + ?Sized>(
    path: &Path,
    prefix: Option<&str>,
    spam: bool,
    rng: &mut R,
) -> Result<String, UploadError> {
    let base = path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| UploadError::InvalidFile(path.to_path_buf()))?;

    if spam && is_image(path) {
        let mut strategies = NameStrategy::ALL;
        strategies.shuffle(rng);
        let stem = strategies[0].generate(rng);
        // is_image guarantees a UTF-8 extension
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        return Ok(format!("{stem}.{ext}"));
    }

    match prefix.map(str::trim).filter(|prefix| !prefix.is_empty()) {
        Some(prefix) => Ok(format!("{prefix} {base}")),
        None => Ok(base.to_string()),
    }
}

/// Rotating pool of nicknames.
#[derive(Debug, Clone, Default)]
pub struct NickPool {
    nicks: VecDeque<String>,
}

impl NickPool {
    /// Builds a pool from newline-separated text.
    ///
    /// Lines are trimmed, blank lines skipped and duplicates collapsed to
    /// their first occurrence; the result is shuffled.
    pub fn parse<R: Rng + ?Sized>(text: &str, rng: &mut R) -> Self {
        let mut seen = HashSet::new();
        let mut nicks: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| seen.insert(line.to_string()))
            .map(str::to_string)
            .collect();
        nicks.shuffle(rng);
        Self {
            nicks: nicks.into(),
        }
    }

    /// Reads a pool from a file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text, &mut rand::rng()))
    }

    pub fn len(&self) -> usize {
        self.nicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nicks.is_empty()
    }

    /// Takes the next nickname and requeues it at the back.
    pub fn rotate(&mut self) -> Option<String> {
        let nick = self.nicks.pop_front()?;
        self.nicks.push_back(nick.clone());
        Some(nick)
    }
}
