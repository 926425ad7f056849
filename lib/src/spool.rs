//! A room service backed by a local spool directory.
//!
//! Every room is a folder under the spool root. Uploads land as
//! `<id>_<name>` next to an `<id>.json` metadata file, which is what
//! [`RoomServiceClient::file_info`] reads back. A room folder holding a
//! `.password` file only admits clients presenting that password.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use md5::{Digest, Md5};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing::debug;

use crate::client::{BoxFuture, ProgressFn, RoomServiceClient};
use crate::error::ClientError;
use crate::types::{RemoteFileInfo, TransferProgress, UploadRequest, UploadStream, UploadedFile};

const PASSWORD_FILE: &str = ".password";
const INFO_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Peer id reported in progress updates.
pub const SPOOL_PEER: &str = "spool.local";

/// [`RoomServiceClient`] writing into a spool directory.
#[derive(Debug, Clone)]
pub struct SpoolClient {
    root: PathBuf,
    nick: String,
    room: Option<PathBuf>,
}

impl SpoolClient {
    pub fn new(root: impl Into<PathBuf>, nick: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            nick: nick.into(),
            room: None,
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Folder of the connected room.
    pub fn room_dir(&self) -> Option<&Path> {
        self.room.as_deref()
    }

    fn connected_dir(&self) -> Result<PathBuf, ClientError> {
        self.room.clone().ok_or(ClientError::NotConnected)
    }
}

/// Makes a room id or file name safe to use as a single path component.
fn path_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

async fn copy_with_progress(
    stream: &mut UploadStream,
    out: &mut tokio::fs::File,
    size: u64,
    on_progress: &mut ProgressFn<'_>,
) -> Result<(u64, String), ClientError> {
    let mut hasher = Md5::new();
    let mut current = 0u64;
    loop {
        let chunk = stream.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }
        let len = chunk.len();
        out.write_all(chunk).await?;
        hasher.update(chunk);
        stream.consume(len);
        current += len as u64;
        let flow = on_progress(TransferProgress {
            delta: len as u64,
            current,
            total: size,
            peer: Some(SPOOL_PEER.to_string()),
        });
        if flow.is_break() {
            return Err(ClientError::Aborted);
        }
    }
    out.flush().await?;
    Ok((current, hex::encode(hasher.finalize())))
}

impl RoomServiceClient for SpoolClient {
    fn connect<'a>(
        &'a mut self,
        room: &'a str,
        room_password: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(async move {
            let component = path_component(room);
            if component.is_empty() {
                return Err(ClientError::Connection(format!("invalid room {room:?}")));
            }
            let dir = self.root.join(component);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ClientError::Connection(format!("{}: {e}", dir.display())))?;
            match tokio::fs::read_to_string(dir.join(PASSWORD_FILE)).await {
                Ok(expected) => {
                    if room_password != Some(expected.trim()) {
                        return Err(ClientError::Auth(format!("wrong password for room {room}")));
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            debug!(room, dir = %dir.display(), "joined spool room");
            self.room = Some(dir);
            Ok(())
        })
    }

    fn login<'a>(&'a mut self, password: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(async move {
            if password.is_empty() {
                return Err(ClientError::Auth("empty password".into()));
            }
            debug!(nick = %self.nick, "logged in");
            Ok(())
        })
    }

    fn set_nick<'a>(&'a mut self, nick: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(async move {
            self.nick = nick.to_string();
            Ok(())
        })
    }

    fn upload_file<'a>(
        &'a mut self,
        request: UploadRequest,
        on_progress: &'a mut ProgressFn<'_>,
    ) -> BoxFuture<'a, Result<Option<UploadedFile>, ClientError>> {
        Box::pin(async move {
            let dir = self.connected_dir()?;
            let UploadRequest {
                name,
                size,
                mut stream,
            } = request;
            let id = uuid::Uuid::new_v4().simple().to_string();
            let part = dir.join(format!(".{id}.part"));
            let mut out = tokio::fs::File::create(&part).await?;

            let copied = copy_with_progress(&mut stream, &mut out, size, on_progress).await;
            drop(out);
            let (size, checksum) = match copied {
                Ok(copied) => copied,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(e);
                }
            };

            let stored = dir.join(format!("{id}_{}", path_component(&name)));
            tokio::fs::rename(&part, &stored).await?;
            let info = RemoteFileInfo {
                id: id.clone(),
                name,
                size,
                checksum: Some(checksum.clone()),
                uploader: self.nick.clone(),
            };
            tokio::fs::write(dir.join(format!("{id}.json")), serde_json::to_vec_pretty(&info)?)
                .await?;
            debug!(id, path = %stored.display(), "stored upload");
            Ok(Some(UploadedFile {
                id,
                checksum: Some(checksum),
            }))
        })
    }

    fn file_info<'a>(
        &'a mut self,
        id: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<RemoteFileInfo>, ClientError>> {
        Box::pin(async move {
            let path = self
                .connected_dir()?
                .join(format!("{}.json", path_component(id)));
            let lookup = async {
                loop {
                    match tokio::fs::read(&path).await {
                        Ok(bytes) => return Ok(serde_json::from_slice::<RemoteFileInfo>(&bytes)?),
                        Err(e) if e.kind() == ErrorKind::NotFound => {
                            tokio::time::sleep(INFO_POLL_INTERVAL).await
                        }
                        Err(e) => return Err(ClientError::from(e)),
                    }
                }
            };
            match tokio::time::timeout(timeout, lookup).await {
                Ok(info) => info.map(Some),
                Err(_) => Ok(None),
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.room = None;
            Ok(())
        })
    }
}
