//! The seam between the upload core and a room service transport.

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{RemoteFileInfo, TransferProgress, UploadRequest, UploadedFile};

/// Boxed future returned by [`RoomServiceClient`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Progress callback handed to [`RoomServiceClient::upload_file`].
///
/// Returning [`ControlFlow::Break`] asks the transport to abort the transfer.
pub type ProgressFn<'a> = dyn FnMut(TransferProgress) -> ControlFlow<()> + Send + 'a;

/// Session with a room service.
///
/// One client can be connected to several rooms in turn; session state such
/// as a login carries over between rooms.
pub trait RoomServiceClient: Send {
    /// Joins `room`, using `room_password` if the room is protected.
    fn connect<'a>(
        &'a mut self,
        room: &'a str,
        room_password: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), ClientError>>;

    /// Logs the session in.
    fn login<'a>(&'a mut self, password: &'a str) -> BoxFuture<'a, Result<(), ClientError>>;

    /// Changes the nickname shown for following uploads.
    fn set_nick<'a>(&'a mut self, nick: &'a str) -> BoxFuture<'a, Result<(), ClientError>>;

    /// Streams one file into the connected room.
    ///
    /// `Ok(None)` means nothing was uploaded.
    fn upload_file<'a>(
        &'a mut self,
        request: UploadRequest,
        on_progress: &'a mut ProgressFn<'_>,
    ) -> BoxFuture<'a, Result<Option<UploadedFile>, ClientError>>;

    /// Looks up a file, waiting at most `timeout` for it to show up.
    fn file_info<'a>(
        &'a mut self,
        id: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<RemoteFileInfo>, ClientError>>;

    /// Leaves the current room. Closing twice is fine.
    fn close(&mut self) -> BoxFuture<'_, Result<(), ClientError>>;
}
