//! Volaupload library - batch uploads into rooms of an ephemeral file host.
//!
//! This library provides the upload core: ordering files, naming them,
//! pushing them through a [`RoomServiceClient`] with retries and checksum
//! verification, and rendering per-file progress with a shared rate counter.

pub mod client;
pub mod error;
pub mod format;
pub mod names;
pub mod natural;
pub mod progress;
pub mod rate;
pub mod room;
pub mod sorting;
pub mod spool;
pub mod types;

pub use client::{BoxFuture, ProgressFn, RoomServiceClient};
pub use error::{ClientError, UploadError};
pub use format::{filesize, shorten};
pub use names::{display_name, NickPool};
pub use natural::{natural_case_compare, natural_compare};
pub use progress::{ProgressReporter, ProgressTarget};
pub use rate::RateCounter;
pub use room::{upload_chain, ChainOutcome, Room};
pub use sorting::{sort_paths, sorted, sorted_by, SortKey};
pub use spool::SpoolClient;
pub use types::*;
