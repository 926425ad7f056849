//! Uploading a batch of files into one room, and chaining rooms.
//!
//! Every file gets up to [`UploadConfig::effective_attempts`] tries with a
//! linear backoff between them. Cancellation is checked between files, during
//! the backoff and from inside the transfer's progress callback; once it is
//! seen the room stops and no further room of a chain is started.

use std::ops::ControlFlow;
use std::path::PathBuf;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::RoomServiceClient;
use crate::error::UploadError;
use crate::names::display_name;
use crate::progress::ProgressReporter;
use crate::rate::RateCounter;
use crate::types::{
    RoomSummary, RoomTarget, TransferProgress, UploadConfig, UploadRequest, UploadTask,
    UploadedFile,
};

/// How a single file ended up after its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Uploaded,
    Failed,
    Cancelled,
}

fn serial(index: usize, total: usize) -> String {
    if total <= 1 {
        return String::new();
    }
    let width = total.to_string().len();
    format!("[{:0width$}/{total}] ", index + 1)
}

/// One room's upload session over a borrowed client.
pub struct Room<'c, C: RoomServiceClient> {
    client: &'c mut C,
    target: RoomTarget,
    config: UploadConfig,
    cancel: CancellationToken,
    login: bool,
}

impl<'c, C: RoomServiceClient> Room<'c, C> {
    pub fn new(
        client: &'c mut C,
        target: RoomTarget,
        config: UploadConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            target,
            config,
            cancel,
            login: true,
        }
    }

    /// Whether to log in after connecting. Only happens with a password set.
    pub fn with_login(mut self, login: bool) -> Self {
        self.login = login;
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn tasks(&self, files: &[PathBuf]) -> Result<Vec<UploadTask>, UploadError> {
        let mut rng = rand::rng();
        let prefix = self.config.prefix.as_deref();
        files
            .iter()
            .enumerate()
            .map(|(idx, path)| {
                Ok(UploadTask {
                    path: path.clone(),
                    name: display_name(path, prefix, self.config.spam, &mut rng)?,
                    serial: serial(idx, files.len()),
                })
            })
            .collect()
    }

    /// Uploads `files` in the given order, counting sent bytes into `rate`.
    ///
    /// Failing files are logged and skipped. Errors are returned only for
    /// problems with the session itself or unusable file names.
    pub async fn upload(
        &mut self,
        files: &[PathBuf],
        rate: &RateCounter,
    ) -> Result<RoomSummary, UploadError> {
        let tasks = self.tasks(files)?;
        let name_max = tasks
            .iter()
            .map(|task| task.name.chars().count())
            .max()
            .unwrap_or(0);
        let mut summary = RoomSummary::new(self.target.id.clone());

        info!(room = %self.target.id, "connecting");
        self.client
            .connect(&self.target.id, self.target.password.as_deref())
            .await?;
        if self.login {
            if let Some(passwd) = self.config.passwd.clone() {
                info!(user = %self.config.user, "logging in");
                if let Err(e) = self.client.login(&passwd).await {
                    self.close().await;
                    return Err(e.into());
                }
            }
        }

        let mut nicks = self.config.nicks.clone().filter(|_| self.config.spam);
        for task in &tasks {
            if self.cancel.is_cancelled() {
                summary.aborted = true;
                break;
            }
            if let Some(nick) = nicks.as_mut().and_then(|pool| pool.rotate()) {
                if let Err(e) = self.client.set_nick(&nick).await {
                    warn!(nick = %nick, "failed to change nick: {e}");
                }
            }
            let (outcome, failures) = self.upload_with_retries(task, name_max, rate).await;
            summary.failed_attempts += failures;
            match outcome {
                FileOutcome::Uploaded => summary.uploaded.push(task.path.clone()),
                FileOutcome::Failed => summary.failed.push(task.path.clone()),
                FileOutcome::Cancelled => {
                    summary.aborted = true;
                    break;
                }
            }
        }

        self.close().await;
        Ok(summary)
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.close().await {
            warn!(room = %self.target.id, "failed to close: {e}");
        }
    }

    async fn upload_with_retries(
        &mut self,
        task: &UploadTask,
        name_max: usize,
        rate: &RateCounter,
    ) -> (FileOutcome, usize) {
        let attempts = self.config.effective_attempts();
        let mut failures = 0;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry_delay * attempt;
                tokio::select! {
                    _ = self.cancel.cancelled() => return (FileOutcome::Cancelled, failures),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            match self.attempt(task, name_max, rate).await {
                Ok(()) => return (FileOutcome::Uploaded, failures),
                Err(UploadError::Cancelled) => return (FileOutcome::Cancelled, failures),
                Err(e) => {
                    failures += 1;
                    error!(
                        attempt = attempt + 1,
                        attempts,
                        file = %task.path.display(),
                        "failed to upload: {e}"
                    );
                }
            }
        }
        (FileOutcome::Failed, failures)
    }

    async fn attempt(
        &mut self,
        task: &UploadTask,
        name_max: usize,
        rate: &RateCounter,
    ) -> Result<(), UploadError> {
        let file = tokio::fs::File::open(&task.path).await?;
        let size = file.metadata().await?.len();
        let request = UploadRequest {
            name: task.name.clone(),
            size,
            stream: BufReader::with_capacity(self.config.block_size.max(1), file),
        };

        let target = self.config.progress.clone();
        let timeout = self.config.progress_timeout;
        let new_reporter = |total: u64| {
            ProgressReporter::new(task.name.clone(), total, rate.clone(), &target)
                .with_prefix(task.serial.clone())
                .with_name_max(name_max)
                .with_timeout(timeout)
        };
        let cancel = self.cancel.clone();
        let mut reporter: Option<ProgressReporter> = None;
        let mut abort_requested = false;

        let result = {
            let mut on_progress = |progress: TransferProgress| -> ControlFlow<()> {
                rate.add(progress.delta);
                reporter
                    .get_or_insert_with(|| new_reporter(progress.total))
                    .update(progress.current, progress.total, progress.peer.as_deref());
                if cancel.is_cancelled() {
                    abort_requested = true;
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            };
            self.client.upload_file(request, &mut on_progress).await
        };

        let uploaded = match result {
            Ok(Some(uploaded)) if !abort_requested => uploaded,
            outcome => {
                if let Some(reporter) = reporter.as_mut() {
                    reporter.terminate(false);
                }
                return Err(match outcome {
                    _ if abort_requested || self.cancel.is_cancelled() => UploadError::Cancelled,
                    Ok(_) => UploadError::NoResult,
                    Err(e) => e.into(),
                });
            }
        };
        reporter
            .get_or_insert_with(|| new_reporter(size))
            .terminate(true);

        if self.config.verify_checksum {
            self.verify(&uploaded).await?;
        }
        if self.config.delete_after {
            if let Err(e) = tokio::fs::remove_file(&task.path).await {
                warn!(file = %task.path.display(), "failed to remove file: {e}");
            }
        }
        Ok(())
    }

    async fn verify(&mut self, uploaded: &UploadedFile) -> Result<(), UploadError> {
        let Some(expected) = uploaded.checksum.as_deref() else {
            debug!(id = %uploaded.id, "transport reported no checksum");
            return Ok(());
        };
        let info = self
            .client
            .file_info(&uploaded.id, self.config.checksum_timeout)
            .await?;
        let Some(info) = info else {
            warn!("failed to check checksum; no file");
            return Ok(());
        };
        let Some(actual) = info.checksum else {
            warn!("failed to check checksum; no sum");
            return Ok(());
        };
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(UploadError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }
}

/// What a chain of rooms got done.
#[derive(Debug, Default)]
pub struct ChainOutcome {
    /// Summaries of the rooms that ran, in order.
    pub summaries: Vec<RoomSummary>,
    /// Connect or login error that ended the chain early.
    pub error: Option<UploadError>,
}

impl ChainOutcome {
    /// The summaries, or the error if the chain was cut short by one.
    pub fn into_result(self) -> Result<Vec<RoomSummary>, UploadError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.summaries),
        }
    }
}

/// Uploads `files` into every room of `targets` in turn over one client.
///
/// Only the first room logs in; the session keeps the login for the rest.
/// Source files are removed only after the last room when `delete_after` is
/// set. A connect or login error or a cancelled room ends the chain; the
/// summaries of rooms that already ran are kept either way.
pub async fn upload_chain<C: RoomServiceClient>(
    client: &mut C,
    targets: &[RoomTarget],
    files: &[PathBuf],
    config: &UploadConfig,
    rate: &RateCounter,
    cancel: &CancellationToken,
) -> ChainOutcome {
    let mut outcome = ChainOutcome::default();
    for (idx, target) in targets.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let mut room_config = config.clone();
        room_config.delete_after = config.delete_after && idx + 1 == targets.len();
        let mut room = Room::new(&mut *client, target.clone(), room_config, cancel.clone())
            .with_login(idx == 0);
        match room.upload(files, rate).await {
            Ok(summary) => {
                let aborted = summary.aborted;
                outcome.summaries.push(summary);
                if aborted {
                    break;
                }
            }
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::path::Path;
    use std::time::Duration;

    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::client::{BoxFuture, ProgressFn};
    use crate::error::ClientError;
    use crate::names::NickPool;
    use crate::progress::{captured_lines, ProgressTarget, SharedBuffer};
    use crate::types::RemoteFileInfo;

    #[derive(Debug, Clone)]
    enum Step {
        Succeed,
        Fail,
        NoResult,
        CancelDuringProgress(CancellationToken),
    }

    #[derive(Default)]
    struct FakeClient {
        steps: VecDeque<Step>,
        calls: Vec<String>,
        remote_checksum: Option<Option<String>>,
        refuse: HashSet<String>,
        uploaded: Vec<(String, String)>,
    }

    impl FakeClient {
        fn with_steps(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                ..Default::default()
            }
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls.iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    fn progress(current: u64, total: u64) -> TransferProgress {
        TransferProgress {
            delta: current,
            current,
            total,
            peer: Some("dl1.example.org".to_string()),
        }
    }

    impl RoomServiceClient for FakeClient {
        fn connect<'a>(
            &'a mut self,
            room: &'a str,
            _room_password: Option<&'a str>,
        ) -> BoxFuture<'a, Result<(), ClientError>> {
            Box::pin(async move {
                self.calls.push(format!("connect {room}"));
                if self.refuse.contains(room) {
                    return Err(ClientError::Connection(format!("{room} is gone")));
                }
                Ok(())
            })
        }

        fn login<'a>(&'a mut self, password: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
            Box::pin(async move {
                self.calls.push(format!("login {password}"));
                Ok(())
            })
        }

        fn set_nick<'a>(&'a mut self, nick: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
            Box::pin(async move {
                self.calls.push(format!("nick {nick}"));
                Ok(())
            })
        }

        fn upload_file<'a>(
            &'a mut self,
            request: UploadRequest,
            on_progress: &'a mut ProgressFn<'_>,
        ) -> BoxFuture<'a, Result<Option<UploadedFile>, ClientError>> {
            Box::pin(async move {
                let UploadRequest {
                    name,
                    size,
                    mut stream,
                } = request;
                self.calls.push(format!("upload {name}"));
                let mut data = Vec::new();
                stream.read_to_end(&mut data).await?;
                let step = self.steps.pop_front().unwrap_or(Step::Succeed);
                match step {
                    Step::Fail => {
                        let _ = on_progress(progress(size / 2, size));
                        Err(ClientError::Transfer("connection reset".into()))
                    }
                    Step::NoResult => Ok(None),
                    Step::CancelDuringProgress(token) => {
                        token.cancel();
                        if on_progress(progress(size / 2, size)).is_break() {
                            return Err(ClientError::Aborted);
                        }
                        Ok(None)
                    }
                    Step::Succeed => {
                        let _ = on_progress(progress(size, size));
                        let id = format!("f{}", self.uploaded.len());
                        let checksum = format!("sum{}", data.len());
                        self.uploaded.push((id.clone(), name));
                        Ok(Some(UploadedFile {
                            id,
                            checksum: Some(checksum),
                        }))
                    }
                }
            })
        }

        fn file_info<'a>(
            &'a mut self,
            id: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<Option<RemoteFileInfo>, ClientError>> {
            Box::pin(async move {
                self.calls.push(format!("info {id}"));
                let Some((_, name)) = self.uploaded.iter().find(|(fid, _)| fid == id) else {
                    return Ok(None);
                };
                let checksum = self.remote_checksum.clone().flatten();
                Ok(Some(RemoteFileInfo {
                    id: id.to_string(),
                    name: name.clone(),
                    size: 0,
                    checksum,
                    uploader: "tester".into(),
                }))
            })
        }

        fn close(&mut self) -> BoxFuture<'_, Result<(), ClientError>> {
            Box::pin(async move {
                self.calls.push("close".to_string());
                Ok(())
            })
        }
    }

    fn test_config() -> (UploadConfig, SharedBuffer) {
        let (progress, buffer) = ProgressTarget::capture();
        let config = UploadConfig {
            user: "tester".into(),
            retry_delay: Duration::from_millis(1),
            checksum_timeout: Duration::from_millis(10),
            progress,
            ..Default::default()
        };
        (config, buffer)
    }

    fn write_files(dir: &Path, files: &[(&str, usize)]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|(name, size)| {
                let path = dir.join(name);
                std::fs::write(&path, vec![b'x'; *size]).unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn test_gives_up_after_all_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 100)]);
        let (mut config, _buffer) = test_config();
        config.attempts = 3;
        let mut client = FakeClient::with_steps([Step::Fail, Step::Fail, Step::Fail, Step::Fail]);

        let rate = RateCounter::new();
        let mut room = Room::new(
            &mut client,
            RoomTarget::new("BEEPi"),
            config,
            CancellationToken::new(),
        );
        let summary = room.upload(&files, &rate).await.unwrap();

        assert_eq!(summary.failed_attempts, 3);
        assert_eq!(summary.failed, files);
        assert!(summary.uploaded.is_empty());
        assert!(!summary.aborted);
        assert_eq!(client.count("upload"), 3);
        assert_eq!(client.calls.last().unwrap(), "close");
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 100)]);
        let (mut config, buffer) = test_config();
        config.attempts = 3;
        let mut client = FakeClient::with_steps([Step::Fail, Step::Fail, Step::Succeed]);

        let rate = RateCounter::new();
        let summary = Room::new(
            &mut client,
            RoomTarget::new("BEEPi"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &rate)
        .await
        .unwrap();

        assert_eq!(summary.failed_attempts, 2);
        assert_eq!(summary.uploaded, files);
        // two half transfers plus the full one
        assert_eq!(rate.total(), 200);
        let lines = captured_lines(&buffer);
        let last = lines.last().unwrap();
        assert!(last.starts_with("a.bin"), "{last}");
        assert!(last.contains("100.0%"), "{last}");
        assert!(last.contains(" 100B/ 100B"), "{last}");
    }

    #[tokio::test]
    async fn test_backoff_grows_linearly() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (mut config, _buffer) = test_config();
        let delay = Duration::from_millis(50);
        config.attempts = 4;
        config.retry_delay = delay;
        let mut client =
            FakeClient::with_steps([Step::Fail, Step::Fail, Step::Fail, Step::Succeed]);

        let started = std::time::Instant::now();
        let summary = Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(summary.failed_attempts, 3);
        assert_eq!(summary.uploaded, files);
        // waits of 1, 2 and 3 units before the second, third and fourth attempt
        assert!(elapsed >= delay * 6, "{elapsed:?}");
        assert!(elapsed < delay * 7, "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10), ("b.bin", 10)]);
        let (mut config, _buffer) = test_config();
        config.attempts = 3;
        config.retry_delay = Duration::from_secs(10);
        let cancel = CancellationToken::new();
        let mut client = FakeClient::with_steps([Step::Fail, Step::Succeed, Step::Succeed]);

        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
        let started = std::time::Instant::now();
        let summary = Room::new(&mut client, RoomTarget::new("r"), config, cancel)
            .upload(&files, &RateCounter::new())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(summary.aborted);
        assert_eq!(summary.failed_attempts, 1);
        assert!(summary.uploaded.is_empty());
        assert!(summary.failed.is_empty());
        assert_eq!(client.count("upload"), 1);
        assert_eq!(client.calls, vec!["connect r", "upload a.bin", "close"]);
    }

    #[tokio::test]
    async fn test_no_result_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (mut config, _buffer) = test_config();
        config.attempts = 2;
        let mut client = FakeClient::with_steps([Step::NoResult, Step::Succeed]);

        let summary = Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();
        assert_eq!(summary.failed_attempts, 1);
        assert_eq!(summary.uploaded.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_file_and_room() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 100), ("b.bin", 100)]);
        let (mut config, _buffer) = test_config();
        config.attempts = 5;
        let cancel = CancellationToken::new();
        let mut client = FakeClient::with_steps([Step::CancelDuringProgress(cancel.clone())]);

        let mut room = Room::new(&mut client, RoomTarget::new("r"), config, cancel.clone());
        let summary = room.upload(&files, &RateCounter::new()).await.unwrap();
        assert!(room.is_aborted());

        assert!(summary.aborted);
        assert!(summary.uploaded.is_empty());
        assert!(summary.failed.is_empty());
        assert_eq!(summary.failed_attempts, 0);
        assert_eq!(client.calls, vec!["connect r", "upload a.bin", "close"]);
    }

    #[tokio::test]
    async fn test_cancel_ends_chain() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (config, _buffer) = test_config();
        let cancel = CancellationToken::new();
        let mut client = FakeClient::with_steps([Step::CancelDuringProgress(cancel.clone())]);

        let targets = [RoomTarget::new("one"), RoomTarget::new("two")];
        let summaries = upload_chain(
            &mut client,
            &targets,
            &files,
            &config,
            &RateCounter::new(),
            &cancel,
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].aborted);
        assert_eq!(client.count("connect"), 1);
    }

    #[tokio::test]
    async fn test_serials_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("b.bin", 3), ("a.bin", 2)]);
        let (config, buffer) = test_config();
        let mut client = FakeClient::default();

        let summary = Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();

        assert_eq!(summary.uploaded, files);
        let lines = captured_lines(&buffer);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[1/2] b.bin"), "{}", lines[0]);
        assert!(lines[1].starts_with("[2/2] a.bin"), "{}", lines[1]);
    }

    #[test]
    fn test_serial_is_zero_padded() {
        assert_eq!(serial(0, 1), "");
        assert_eq!(serial(0, 2), "[1/2] ");
        assert_eq!(serial(4, 12), "[05/12] ");
        assert_eq!(serial(99, 100), "[100/100] ");
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (mut config, _buffer) = test_config();
        config.attempts = 2;
        let mut client = FakeClient {
            remote_checksum: Some(Some("deadbeef".into())),
            ..Default::default()
        };

        let summary = Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();
        assert_eq!(summary.failed_attempts, 2);
        assert_eq!(summary.failed, files);
        assert_eq!(client.count("info"), 2);
    }

    #[tokio::test]
    async fn test_checksum_matches_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (config, _buffer) = test_config();
        let mut client = FakeClient {
            remote_checksum: Some(Some("SUM10".into())),
            ..Default::default()
        };
        let summary = Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();
        assert_eq!(summary.uploaded.len(), 1);
        assert_eq!(summary.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_missing_remote_sum_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (config, _buffer) = test_config();
        let mut client = FakeClient::default();
        let summary = Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();
        assert_eq!(summary.uploaded.len(), 1);
    }

    #[tokio::test]
    async fn test_checksum_skipped_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (mut config, _buffer) = test_config();
        config.verify_checksum = false;
        let mut client = FakeClient {
            remote_checksum: Some(Some("deadbeef".into())),
            ..Default::default()
        };
        let summary = Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();
        assert_eq!(summary.uploaded.len(), 1);
        assert_eq!(client.count("info"), 0);
    }

    #[tokio::test]
    async fn test_delete_after_last_room_only() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10), ("b.bin", 20)]);
        let (mut config, _buffer) = test_config();
        config.delete_after = true;
        config.passwd = Some("hunter2".into());
        let mut client = FakeClient::default();

        let targets = [RoomTarget::new("one"), RoomTarget::new("two")];
        let summaries = upload_chain(
            &mut client,
            &targets,
            &files,
            &config,
            &RateCounter::new(),
            &CancellationToken::new(),
        )
        .await
        .into_result()
        .unwrap();

        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.uploaded.len() == 2));
        assert!(files.iter().all(|f| !f.exists()));
        assert_eq!(client.count("upload"), 4);
        assert_eq!(client.count("login"), 1);
        let login = client.calls.iter().position(|c| c == "login hunter2").unwrap();
        assert_eq!(client.calls[login - 1], "connect one");
    }

    #[tokio::test]
    async fn test_files_kept_without_delete_after() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (config, _buffer) = test_config();
        let mut client = FakeClient::default();
        upload_chain(
            &mut client,
            &[RoomTarget::new("one")],
            &files,
            &config,
            &RateCounter::new(),
            &CancellationToken::new(),
        )
        .await
        .into_result()
        .unwrap();
        assert!(files[0].exists());
        assert_eq!(client.count("login"), 0);
    }

    #[tokio::test]
    async fn test_connect_error_ends_chain() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 10)]);
        let (config, _buffer) = test_config();
        let mut client = FakeClient {
            refuse: HashSet::from(["two".to_string()]),
            ..Default::default()
        };

        let targets = [
            RoomTarget::new("one"),
            RoomTarget::new("two"),
            RoomTarget::new("three"),
        ];
        let outcome = upload_chain(
            &mut client,
            &targets,
            &files,
            &config,
            &RateCounter::new(),
            &CancellationToken::new(),
        )
        .await;
        assert!(outcome.error.as_ref().unwrap().is_session_error());
        // the room finished before the error is still reported
        assert_eq!(outcome.summaries.len(), 1);
        assert_eq!(outcome.summaries[0].room, "one");
        assert_eq!(outcome.summaries[0].uploaded, files);
        assert_eq!(client.count("upload"), 1);
        assert_eq!(client.count("connect three"), 0);
        assert!(outcome.into_result().is_err());
    }

    #[tokio::test]
    async fn test_nicks_rotate_in_spam_mode() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.txt", 1), ("b.txt", 1), ("c.txt", 1)]);
        let (mut config, _buffer) = test_config();
        config.spam = true;
        config.nicks = Some(NickPool::parse("n1\nn2", &mut rand::rng()));
        let mut client = FakeClient::default();

        Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();

        let nicks: Vec<&String> = client.calls.iter().filter(|c| c.starts_with("nick")).collect();
        assert_eq!(nicks.len(), 3);
        assert_ne!(nicks[0], nicks[1]);
        assert_eq!(nicks[0], nicks[2]);
    }

    #[tokio::test]
    async fn test_prefix_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("a.bin", 1)]);
        let (mut config, _buffer) = test_config();
        config.prefix = Some(" [mirror] ".into());
        let mut client = FakeClient::default();
        Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();
        assert!(client.calls.contains(&"upload [mirror] a.bin".to_string()));
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = write_files(dir.path(), &[("a.bin", 1)]);
        files.insert(0, dir.path().join("gone.bin"));
        let (mut config, _buffer) = test_config();
        config.attempts = 2;
        let mut client = FakeClient::default();
        let summary = Room::new(
            &mut client,
            RoomTarget::new("r"),
            config,
            CancellationToken::new(),
        )
        .upload(&files, &RateCounter::new())
        .await
        .unwrap();
        assert_eq!(summary.failed, vec![dir.path().join("gone.bin")]);
        assert_eq!(summary.failed_attempts, 2);
        assert_eq!(summary.uploaded.len(), 1);
    }
}
